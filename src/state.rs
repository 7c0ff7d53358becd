use crate::models::{Task, UserProfile};

/// Everything the dashboard renders. Each variant carries only the data that
/// is meaningful in it, so e.g. a task list cannot exist without a profile.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DashboardState {
    Unauthenticated,
    #[default]
    LoadingProfile,
    Ready(ReadyState),
}

impl DashboardState {
    pub fn ready(&self) -> Option<&ReadyState> {
        match self {
            DashboardState::Ready(ready) => Some(ready),
            _ => None,
        }
    }

    pub fn ready_mut(&mut self) -> Option<&mut ReadyState> {
        match self {
            DashboardState::Ready(ready) => Some(ready),
            _ => None,
        }
    }

    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, DashboardState::Unauthenticated)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadyState {
    pub profile: UserProfile,
    pub tasks: TaskList,
    pub editing: EditState,
    pub title_input: String,
    pub search_query: String,
}

impl ReadyState {
    pub fn new(profile: UserProfile) -> Self {
        Self {
            profile,
            tasks: TaskList::Loading { stale: None },
            editing: EditState::Idle,
            title_input: String::new(),
            search_query: String::new(),
        }
    }

    pub fn find_task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.visible().iter().find(|task| task.id == task_id)
    }
}

/// Either a request is outstanding or the list is a complete snapshot from
/// the last successful fetch. `stale` is that snapshot while a newer one is
/// pending or after a fetch failed.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskList {
    Loading { stale: Option<Vec<Task>> },
    Loaded(Vec<Task>),
    Failed { stale: Option<Vec<Task>> },
}

impl TaskList {
    pub fn is_loading(&self) -> bool {
        matches!(self, TaskList::Loading { .. })
    }

    pub fn visible(&self) -> &[Task] {
        match self {
            TaskList::Loaded(tasks) => tasks,
            TaskList::Loading { stale } | TaskList::Failed { stale } => {
                stale.as_deref().unwrap_or(&[])
            }
        }
    }

    /// Marks a new fetch as outstanding, keeping whatever snapshot is shown.
    pub fn begin_reload(&mut self) {
        let stale = self.take_snapshot();
        *self = TaskList::Loading { stale };
    }

    pub fn fail(&mut self) {
        let stale = self.take_snapshot();
        *self = TaskList::Failed { stale };
    }

    fn take_snapshot(&mut self) -> Option<Vec<Task>> {
        match std::mem::replace(self, TaskList::Loading { stale: None }) {
            TaskList::Loaded(tasks) => Some(tasks),
            TaskList::Loading { stale } | TaskList::Failed { stale } => stale,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum EditState {
    #[default]
    Idle,
    Editing { task_id: String, draft: String },
}

impl EditState {
    pub fn editing_id(&self) -> Option<&str> {
        match self {
            EditState::Editing { task_id, .. } => Some(task_id.as_str()),
            EditState::Idle => None,
        }
    }
}
