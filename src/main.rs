use std::process::ExitCode;

fn main() -> ExitCode {
    match task_dashboard_lib::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("fatal err={err}");
            eprintln!("task-dashboard: {err}");
            ExitCode::FAILURE
        }
    }
}
