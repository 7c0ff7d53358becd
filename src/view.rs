use crate::models::Task;
use crate::navigation::Route;
use crate::state::{DashboardState, EditState, ReadyState};

const TITLE_PLACEHOLDER: &str = "Enter task title...";
const SEARCH_PLACEHOLDER: &str = "Search tasks...";

/// Renders the dashboard as plain text lines.
pub fn render(state: &DashboardState) -> Vec<String> {
    match state {
        DashboardState::Unauthenticated => vec![format!("Redirecting to {}", Route::Login)],
        DashboardState::LoadingProfile => vec!["Loading...".to_string()],
        DashboardState::Ready(ready) => render_ready(ready),
    }
}

fn render_ready(ready: &ReadyState) -> Vec<String> {
    let mut lines = vec![
        format!("Welcome, {}  [Logout]", ready.profile.name),
        String::new(),
        "Create Task".to_string(),
        format!("  {}  [Add]", input_or_placeholder(&ready.title_input, TITLE_PLACEHOLDER)),
        String::new(),
        format!(
            "Search: {}",
            input_or_placeholder(&ready.search_query, SEARCH_PLACEHOLDER)
        ),
        String::new(),
        "Your Tasks".to_string(),
    ];

    let visible = ready.tasks.visible();
    if ready.tasks.is_loading() {
        lines.push("Loading tasks...".to_string());
    } else if visible.is_empty() {
        lines.push("No tasks found.".to_string());
    }
    lines.extend(visible.iter().map(|task| render_task(task, &ready.editing)));
    lines
}

fn render_task(task: &Task, editing: &EditState) -> String {
    match editing {
        EditState::Editing { task_id, draft } if *task_id == task.id => {
            format!("  > {draft}  [Save]  (id: {})", task.id)
        }
        _ => format!("  {}  [Edit] [Delete]  (id: {})", task.title, task.id),
    }
}

fn input_or_placeholder<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    if value.is_empty() {
        placeholder
    } else {
        value
    }
}
