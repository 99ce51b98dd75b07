use std::path::PathBuf;

use snafu::{ResultExt, Snafu};
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Registry,
    filter::ParseError,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
};

pub mod controller;
mod k8s_events;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to initialize the default log level"))]
    DefaultFilter { source: ParseError },

    #[snafu(display("failed to initialize the rolling file appender in {directory:?}"))]
    FileAppender {
        directory: PathBuf,
        source: InitError,
    },

    #[snafu(display("failed to install the global tracing subscriber"))]
    InstallSubscriber { source: TryInitError },
}

/// Initializes `tracing` logging with options from the environment variable
/// given in the `env` parameter, e.g. `KRAFTNETES_OPERATOR_LOG`.
///
/// If the variable is not set, the maximum log level is INFO.
///
/// Log output is copied to a file when `{env}_DIRECTORY` (e.g.
/// `KRAFTNETES_OPERATOR_LOG_DIRECTORY`) names a directory. The file is rotated
/// hourly and only the last six are kept.
pub fn initialize_logging(env: &str, app_name: &str) -> Result<(), Error> {
    let filter = match EnvFilter::try_from_env(env) {
        Ok(env_filter) => env_filter,
        _ => EnvFilter::try_new(tracing::Level::INFO.to_string()).context(DefaultFilterSnafu)?,
    };

    let file_appender_directory = std::env::var_os(format!("{env}_DIRECTORY")).map(PathBuf::from);
    let file_appender = file_appender_directory
        .as_deref()
        .map(|log_dir| {
            RollingFileAppender::builder()
                .rotation(Rotation::HOURLY)
                .filename_suffix(format!("{app_name}.log"))
                .max_log_files(6)
                .build(log_dir)
                .context(FileAppenderSnafu { directory: log_dir })
        })
        .transpose()?;

    let file_layer = file_appender.map(|appender| {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(appender)
    });
    Registry::default()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout))
        .with(file_layer)
        .try_init()
        .context(InstallSubscriberSnafu)?;

    // need to delay logging until after tracing is initialized
    match file_appender_directory {
        Some(dir) => tracing::info!(directory = %dir.display(), "file logging enabled"),
        None => tracing::debug!("file logging disabled, because no log directory set"),
    }
    Ok(())
}
