pub mod api;
#[cfg(feature = "app")]
mod app;
pub mod config;
pub mod dashboard;
pub mod events;
pub mod input;
pub mod logging;
pub mod models;
pub mod navigation;
pub mod runtime;
pub mod session;
pub mod state;
pub mod storage;
pub mod view;

#[cfg(feature = "app")]
pub use app::{run, AppError, Cli};
