use std::path::Path;

pub const LOG_FILE_BASENAME: &str = "task-dashboard";
pub const LOG_FILE_SUFFIX: &str = "log";
pub const LOG_ROTATE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
pub const LOG_ROTATE_KEEP_FILES: usize = 10;
pub const ENV_LOG: &str = "TASKDASH_LOG";

/// Log files live next to the stored credential and config.
pub fn log_directory(data_dir: &Path) -> &Path {
    data_dir
}

/// `TASKDASH_LOG`, then `RUST_LOG`, then the config file, then the build default.
pub fn resolve_log_spec(
    app_env: Option<String>,
    rust_env: Option<String>,
    configured: Option<&str>,
) -> String {
    let default_spec = if cfg!(debug_assertions) {
        "warn,task_dashboard_lib=debug"
    } else {
        "warn,task_dashboard_lib=info"
    };
    app_env
        .filter(|value| !value.trim().is_empty())
        .or_else(|| rust_env.filter(|value| !value.trim().is_empty()))
        .or_else(|| {
            configured
                .map(str::to_string)
                .filter(|value| !value.trim().is_empty())
        })
        .unwrap_or_else(|| default_spec.to_string())
}

#[cfg(feature = "app")]
pub fn init_logging(
    data_dir: &Path,
    configured: Option<&str>,
) -> Result<flexi_logger::LoggerHandle, flexi_logger::FlexiLoggerError> {
    use flexi_logger::{
        detailed_format, Cleanup, Criterion, Duplicate, FileSpec, Logger, Naming, WriteMode,
    };

    std::fs::create_dir_all(data_dir)?;

    let spec = resolve_log_spec(
        std::env::var(ENV_LOG).ok(),
        std::env::var("RUST_LOG").ok(),
        configured,
    );

    // stdout belongs to the dashboard screen; problems go to stderr as well.
    let handle = Logger::try_with_str(spec)?
        .log_to_file(
            FileSpec::default()
                .directory(log_directory(data_dir))
                .basename(LOG_FILE_BASENAME)
                .suffix(LOG_FILE_SUFFIX),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .format_for_files(detailed_format)
        .rotate(
            Criterion::Size(LOG_ROTATE_SIZE_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(LOG_ROTATE_KEEP_FILES),
        )
        .duplicate_to_stderr(Duplicate::Warn)
        .start()?;

    install_panic_hook();

    log::info!(
        "logger initialized dir={} rotate_size_bytes={} keep_files={}",
        log_directory(data_dir).display(),
        LOG_ROTATE_SIZE_BYTES,
        LOG_ROTATE_KEEP_FILES
    );
    Ok(handle)
}

#[cfg(feature = "app")]
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info: &std::panic::PanicHookInfo<'_>| {
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| info.payload().downcast_ref::<String>().map(|s| s.as_str()))
            .unwrap_or("<non-string panic payload>");
        let location = info
            .location()
            .map(|loc| format!("{loc}"))
            .unwrap_or_else(|| "<unknown>".to_string());
        let backtrace = std::backtrace::Backtrace::force_capture();

        log::error!("panic: payload={payload} location={location}\nbacktrace:\n{backtrace}");
        default_hook(info);
    }));
}
