use crate::api::ApiError;
use crate::models::{Task, UserProfile};
use crate::navigation::Route;
use crate::session::CredentialStatus;

/// Sequence number attached to every task-list request.
pub type LoadSeq = u64;

/// Inputs to the dashboard: user interactions and request completions.
#[derive(Debug)]
pub enum Event {
    Mounted(CredentialStatus),
    ProfileLoaded(Result<UserProfile, ApiError>),
    TasksLoaded {
        seq: LoadSeq,
        result: Result<Vec<Task>, ApiError>,
    },
    TitleInputChanged(String),
    CreateRequested,
    TaskCreated(Result<(), ApiError>),
    SearchChanged(String),
    RefreshRequested,
    EditRequested(String),
    EditDraftChanged(String),
    SaveRequested,
    TaskUpdated {
        id: String,
        result: Result<(), ApiError>,
    },
    DeleteRequested(String),
    TaskDeleted {
        id: String,
        result: Result<(), ApiError>,
    },
    LogoutRequested,
    SessionExpired,
}

impl Event {
    /// True for events produced by a finished request.
    pub fn is_completion(&self) -> bool {
        matches!(
            self,
            Event::ProfileLoaded(_)
                | Event::TasksLoaded { .. }
                | Event::TaskCreated(_)
                | Event::TaskUpdated { .. }
                | Event::TaskDeleted { .. }
        )
    }
}

/// Side effects requested by the dashboard; executed by the runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    FetchProfile,
    FetchTasks { seq: LoadSeq, query: String },
    CreateTask { title: String },
    UpdateTask { id: String, title: String },
    DeleteTask { id: String },
    ClearCredential,
    Navigate(Route),
}

impl Effect {
    pub fn needs_session(&self) -> bool {
        matches!(
            self,
            Effect::FetchProfile
                | Effect::FetchTasks { .. }
                | Effect::CreateTask { .. }
                | Effect::UpdateTask { .. }
                | Effect::DeleteTask { .. }
        )
    }
}
