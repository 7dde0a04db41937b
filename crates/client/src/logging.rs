use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::paths;

const DEFAULT_FILTER: &str = "info,hyper=warn,reqwest=warn";
const LOG_FILE: &str = "client.log";

pub const LOG_FILTER_ENV: &str = "SUPERAI_LOG_FILTER";
pub const LOG_FORMAT_ENV: &str = "SUPERAI_LOG_FORMAT";
pub const TRUNCATE_LOG_ENV: &str = "SUPERAI_TRUNCATE_LOG_ON_START";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    fn from_env_value(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("pretty") => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

pub struct LoggingHandle {
    pub run_id: String,
    pub guard: WorkerGuard,
}

/// Filter directive in priority order: `SUPERAI_LOG_FILTER`, `RUST_LOG`,
/// then the built-in default. Unparseable values fall through.
fn filter_directive(lookup: impl Fn(&str) -> Option<String>) -> String {
    [LOG_FILTER_ENV, "RUST_LOG"]
        .into_iter()
        .filter_map(&lookup)
        .find(|value| EnvFilter::try_new(value).is_ok())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

pub fn init_logging(data_dir: &Path) -> anyhow::Result<LoggingHandle> {
    let log_dir = paths::log_dir(data_dir);
    std::fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join(LOG_FILE);

    if std::env::var(TRUNCATE_LOG_ENV).as_deref() == Ok("1") {
        let _ = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&log_path)?;
    }

    let directive = filter_directive(|key| std::env::var(key).ok());
    let filter = EnvFilter::try_new(&directive)?;

    let file_appender = tracing_appender::rolling::never(&log_dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    let format = LogFormat::from_env_value(std::env::var(LOG_FORMAT_ENV).ok().as_deref());

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .pretty()
                    .with_file(true)
                    .with_line_number(true)
                    .with_target(true),
            )
            .try_init()?,
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .json()
                    .flatten_event(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_target(true)
                    .with_current_span(true),
            )
            .try_init()?,
    }

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let run_id = format!("pid-{}-{}", std::process::id(), now);

    tracing::info!(
        component = "logging",
        event = "logging.initialized",
        log_path = %log_path.display(),
        format = ?format,
        filter = %directive,
        run_id = %run_id,
    );

    Ok(LoggingHandle { run_id, guard })
}
