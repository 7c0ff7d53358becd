use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::api::{ApiError, RestClient};
use crate::config::{resolve_data_dir, ConfigError, ENV_API_URL, ENV_DATA_DIR};
use crate::input::{parse_command, Command, HELP};
use crate::logging::init_logging;
use crate::navigation::Route;
use crate::runtime::{Completions, Runtime, StorageCtx};
use crate::session::Session;
use crate::state::DashboardState;
use crate::storage::{Storage, StorageError};
use crate::view::render;

const SIGN_IN_HINT: &str =
    "Signed out. Sign in again with `task-dashboard --token <TOKEN>` to open the dashboard.";

#[derive(Debug, Parser)]
#[command(name = "task-dashboard", version, about = "Your tasks, in the terminal")]
pub struct Cli {
    /// Where the credential, config and logs are kept.
    #[arg(long, env = ENV_DATA_DIR)]
    pub data_dir: Option<PathBuf>,
    /// Base URL of the task API, e.g. http://localhost:5000/api
    #[arg(long, env = ENV_API_URL)]
    pub api_url: Option<String>,
    /// Stores this bearer token before opening the dashboard.
    #[arg(long)]
    pub token: Option<String>,
    /// Marks the stored token as expiring after this many minutes.
    #[arg(long, requires = "token")]
    pub token_ttl_mins: Option<u32>,
}

impl Cli {
    /// Credential to store before mounting, if a non-blank token was given.
    pub fn credential(&self, now: DateTime<Utc>) -> Option<Session> {
        let token = self.token.as_deref().map(str::trim).filter(|t| !t.is_empty())?;
        let session = match self.token_ttl_mins {
            Some(mins) => Session::with_ttl(token, now, Duration::minutes(i64::from(mins))),
            None => Session::new(token),
        };
        Some(session)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("logger error: {0}")]
    Logging(#[from] flexi_logger::FlexiLoggerError),
    #[error("api client error: {0}")]
    Api(#[from] ApiError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();

    // clap already folded the environment variables into the flags.
    let storage = Storage::new(resolve_data_dir(cli.data_dir.clone(), None)?);
    storage.ensure_dirs()?;
    let config = storage
        .load_config()?
        .with_overrides(None, cli.api_url.clone());
    config.validate()?;

    let _logger = init_logging(storage.root(), config.log_spec.as_deref())?;
    log::info!(
        "starting api={} data_dir={}",
        config.api_base_url,
        storage.root().display()
    );

    if let Some(session) = cli.credential(Utc::now()) {
        storage.save_session(&session)?;
        log::info!("stored credential from --token expires_at={:?}", session.expires_at());
    }

    let client = RestClient::new(&config)?;
    let tokio_rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    tokio_rt.block_on(async {
        let (mut runtime, mut completions) =
            Runtime::new(Arc::new(client), StorageCtx::new(storage));
        event_loop(&mut runtime, &mut completions).await
    })
}

async fn event_loop(
    runtime: &mut Runtime<RestClient, StorageCtx>,
    completions: &mut Completions,
) -> Result<(), AppError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    runtime.mount();
    print_screen(runtime.state());

    loop {
        if runtime.ctx().current_route() == Route::Login {
            println!("{SIGN_IN_HINT}");
            return Ok(());
        }

        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    log::debug!("stdin closed");
                    return Ok(());
                };
                match parse_command(&line) {
                    Ok(Command::Dispatch(events)) => {
                        for event in events {
                            runtime.dispatch(event);
                        }
                        print_screen(runtime.state());
                    }
                    Ok(Command::Help) => println!("{HELP}"),
                    Ok(Command::Quit) => return Ok(()),
                    Ok(Command::Empty) => {}
                    Err(err) => println!("{err}\n{HELP}"),
                }
            }
            Some(event) = completions.recv() => {
                runtime.dispatch(event);
                print_screen(runtime.state());
            }
        }
    }
}

fn print_screen(state: &DashboardState) {
    println!("{}", "-".repeat(40));
    for line in render(state) {
        println!("{line}");
    }
}
