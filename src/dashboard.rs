//! Dashboard state transitions.
//!
//! `Dashboard::handle` is pure: it mutates the view state and returns the
//! effects to run. Request results come back later as events. A task-list
//! result is applied only if it answers the most recent list request, so an
//! older search finishing late cannot overwrite a newer one.
//!
//! Search and refresh list with the current query. A successful write lists
//! everything again; the search box keeps its text.

use crate::api::ApiError;
use crate::events::{Effect, Event, LoadSeq};
use crate::models::{Task, UserProfile};
use crate::navigation::Route;
use crate::session::CredentialStatus;
use crate::state::{DashboardState, EditState, ReadyState, TaskList};

#[derive(Debug, Default)]
pub struct Dashboard {
    state: DashboardState,
    latest_seq: LoadSeq,
}

impl Dashboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    pub fn latest_seq(&self) -> LoadSeq {
        self.latest_seq
    }

    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        if self.state.is_unauthenticated() {
            log::debug!("ignoring event after sign-out event={event:?}");
            return Vec::new();
        }
        match event {
            Event::Mounted(status) => self.on_mounted(status),
            Event::ProfileLoaded(result) => self.on_profile_loaded(result),
            Event::TasksLoaded { seq, result } => {
                self.on_tasks_loaded(seq, result);
                Vec::new()
            }
            Event::TitleInputChanged(value) => {
                if let Some(ready) = self.state.ready_mut() {
                    ready.title_input = value;
                }
                Vec::new()
            }
            Event::CreateRequested => self.create_task(),
            Event::TaskCreated(result) => self.on_task_created(result),
            Event::SearchChanged(query) => self.search(query),
            Event::RefreshRequested => self.reload(),
            Event::EditRequested(task_id) => {
                self.start_edit(&task_id);
                Vec::new()
            }
            Event::EditDraftChanged(value) => {
                if let Some(ready) = self.state.ready_mut() {
                    if let EditState::Editing { draft, .. } = &mut ready.editing {
                        *draft = value;
                    }
                }
                Vec::new()
            }
            Event::SaveRequested => self.save_edit(),
            Event::TaskUpdated { id, result } => self.on_task_updated(&id, result),
            Event::DeleteRequested(id) => self.delete_task(id),
            Event::TaskDeleted { id, result } => self.on_task_deleted(&id, result),
            Event::LogoutRequested => {
                log::info!("logout requested");
                self.sign_out()
            }
            Event::SessionExpired => {
                log::warn!("session expired; returning to login");
                self.sign_out()
            }
        }
    }

    fn on_mounted(&mut self, status: CredentialStatus) -> Vec<Effect> {
        match status {
            CredentialStatus::Missing => {
                log::info!("no stored credential; redirecting to login");
                self.state = DashboardState::Unauthenticated;
                vec![Effect::Navigate(Route::Login)]
            }
            CredentialStatus::Expired => {
                log::info!("stored credential expired; redirecting to login");
                self.sign_out()
            }
            CredentialStatus::Present => {
                self.state = DashboardState::LoadingProfile;
                vec![Effect::FetchProfile]
            }
        }
    }

    fn on_profile_loaded(&mut self, result: Result<UserProfile, ApiError>) -> Vec<Effect> {
        if !matches!(self.state, DashboardState::LoadingProfile) {
            log::debug!("profile result arrived outside profile loading; ignored");
            return Vec::new();
        }
        match result {
            Ok(profile) => {
                log::info!("profile loaded name={}", profile.name);
                self.state = DashboardState::Ready(ReadyState::new(profile));
                self.load_tasks(String::new())
            }
            Err(err) => {
                log::warn!("profile fetch failed; clearing credential err={err}");
                self.sign_out()
            }
        }
    }

    fn sign_out(&mut self) -> Vec<Effect> {
        self.state = DashboardState::Unauthenticated;
        vec![Effect::ClearCredential, Effect::Navigate(Route::Login)]
    }

    /// Re-runs the current search.
    fn reload(&mut self) -> Vec<Effect> {
        let Some(query) = self.state.ready().map(|ready| ready.search_query.clone()) else {
            return Vec::new();
        };
        self.load_tasks(query)
    }

    fn load_tasks(&mut self, query: String) -> Vec<Effect> {
        let Some(ready) = self.state.ready_mut() else {
            return Vec::new();
        };
        self.latest_seq += 1;
        ready.tasks.begin_reload();
        vec![Effect::FetchTasks {
            seq: self.latest_seq,
            query,
        }]
    }

    fn on_tasks_loaded(&mut self, seq: LoadSeq, result: Result<Vec<Task>, ApiError>) {
        let latest = self.latest_seq;
        let Some(ready) = self.state.ready_mut() else {
            return;
        };
        if seq != latest {
            log::debug!("dropping superseded task list seq={seq} latest={latest}");
            return;
        }
        match result {
            Ok(tasks) => {
                log::debug!("task list loaded seq={seq} count={}", tasks.len());
                ready.tasks = TaskList::Loaded(tasks);
            }
            Err(err) => {
                log::error!("failed to load tasks seq={seq} err={err}");
                ready.tasks.fail();
            }
        }
    }

    fn search(&mut self, query: String) -> Vec<Effect> {
        let Some(ready) = self.state.ready_mut() else {
            return Vec::new();
        };
        ready.search_query = query;
        self.reload()
    }

    fn create_task(&mut self) -> Vec<Effect> {
        let Some(ready) = self.state.ready() else {
            return Vec::new();
        };
        if ready.title_input.trim().is_empty() {
            return Vec::new();
        }
        vec![Effect::CreateTask {
            title: ready.title_input.clone(),
        }]
    }

    fn on_task_created(&mut self, result: Result<(), ApiError>) -> Vec<Effect> {
        match result {
            Ok(()) => {
                log::info!("task created");
                if let Some(ready) = self.state.ready_mut() {
                    ready.title_input.clear();
                }
                self.load_tasks(String::new())
            }
            Err(err) => {
                log::error!("failed to create task err={err}");
                Vec::new()
            }
        }
    }

    fn start_edit(&mut self, task_id: &str) {
        let Some(ready) = self.state.ready_mut() else {
            return;
        };
        let Some(title) = ready.find_task(task_id).map(|task| task.title.clone()) else {
            log::debug!("edit requested for unknown task id={task_id}");
            return;
        };
        ready.editing = EditState::Editing {
            task_id: task_id.to_string(),
            draft: title,
        };
    }

    fn save_edit(&mut self) -> Vec<Effect> {
        let Some(ready) = self.state.ready() else {
            return Vec::new();
        };
        match &ready.editing {
            EditState::Editing { task_id, draft } if !draft.trim().is_empty() => {
                vec![Effect::UpdateTask {
                    id: task_id.clone(),
                    title: draft.clone(),
                }]
            }
            _ => Vec::new(),
        }
    }

    fn on_task_updated(&mut self, id: &str, result: Result<(), ApiError>) -> Vec<Effect> {
        if let Err(err) = result {
            log::error!("failed to update task id={id} err={err}");
            return Vec::new();
        }
        log::info!("task updated id={id}");
        if let Some(ready) = self.state.ready_mut() {
            ready.editing = EditState::Idle;
        }
        self.load_tasks(String::new())
    }

    fn delete_task(&mut self, id: String) -> Vec<Effect> {
        if self.state.ready().is_none() {
            return Vec::new();
        }
        vec![Effect::DeleteTask { id }]
    }

    fn on_task_deleted(&mut self, id: &str, result: Result<(), ApiError>) -> Vec<Effect> {
        match result {
            Ok(()) => {
                log::info!("task deleted id={id}");
                self.load_tasks(String::new())
            }
            Err(err) => {
                log::error!("failed to delete task id={id} err={err}");
                Vec::new()
            }
        }
    }
}
