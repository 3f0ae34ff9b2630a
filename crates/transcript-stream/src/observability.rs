//! Process-wide `tracing` setup for hosts of the transcript pipeline.
//!
//! Rendered HTML goes to stdout, so console logs are written to stderr.

use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

static INIT: OnceCell<LogSink> = OnceCell::new();

const DEFAULT_JSON_LOG_FILE: &str = "transcript.logs.jsonl";

/// Where log lines end up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogSink {
    Disabled,
    /// Compact human-readable lines on stderr.
    Console,
    /// JSON lines appended to `dir/file_name`.
    JsonFile { dir: PathBuf, file_name: String },
}

/// Maps a `-v` count to a default filter directive.
pub fn verbosity_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn parse_bool_env(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

fn observability_enabled() -> bool {
    for key in ["TRANSCRIPT_OBSERVABILITY_ENABLED", "TRANSCRIPT_OBSERVABILITY"] {
        if let Ok(value) = std::env::var(key) {
            return parse_bool_env(&value).unwrap_or(true);
        }
    }
    true
}

fn resolve_env_filter(default_filter: &str) -> tracing_subscriber::EnvFilter {
    if let Ok(level) = std::env::var("TRANSCRIPT_LOG_LEVEL")
        && let Ok(filter) = tracing_subscriber::EnvFilter::try_new(level)
    {
        return filter;
    }
    tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
}

/// Picks the sink for an optional JSON log path.
///
/// Falls back to the console, with a note on stderr, when the log directory
/// cannot be created.
fn resolve_log_sink(json_log_path: Option<&Path>) -> LogSink {
    let Some(path) = json_log_path else {
        return LogSink::Console;
    };
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    if let Err(err) = std::fs::create_dir_all(dir) {
        eprintln!(
            "transcript: cannot create log directory {}: {err}; logging to stderr instead",
            dir.display()
        );
        return LogSink::Console;
    }
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_JSON_LOG_FILE)
        .to_string();
    LogSink::JsonFile {
        dir: dir.to_path_buf(),
        file_name,
    }
}

/// Initialize logging once per process and return the sink in use.
///
/// `default_filter` applies when neither `TRANSCRIPT_LOG_LEVEL` nor `RUST_LOG`
/// holds a valid directive; hosts usually derive it from a verbosity flag via
/// [`verbosity_filter`].
///
/// Environment variables:
/// - `TRANSCRIPT_OBSERVABILITY_ENABLED` / `TRANSCRIPT_OBSERVABILITY`: optional enable/disable flag (default enabled).
/// - `TRANSCRIPT_LOG_LEVEL`: optional level/filter override.
/// - `TRANSCRIPT_JSON_LOG_PATH`: optional JSONL log file path instead of stderr.
/// - `RUST_LOG`: optional filter override.
pub fn init_observability(default_filter: &str) -> &'static LogSink {
    INIT.get_or_init(|| {
        if !observability_enabled() {
            return LogSink::Disabled;
        }

        let env_filter = resolve_env_filter(default_filter);
        let json_path = std::env::var_os("TRANSCRIPT_JSON_LOG_PATH").map(PathBuf::from);
        let sink = resolve_log_sink(json_path.as_deref());
        match &sink {
            LogSink::JsonFile { dir, file_name } => {
                let writer = tracing_appender::rolling::never(dir, file_name);
                let json_layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(false)
                    .with_writer(writer);
                let _ = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(json_layer)
                    .try_init();
            }
            LogSink::Console => {
                let console_layer = tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr);
                let _ = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(console_layer)
                    .try_init();
            }
            LogSink::Disabled => {}
        }
        sink
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_flags_accept_common_spellings() {
        assert_eq!(parse_bool_env(" On "), Some(true));
        assert_eq!(parse_bool_env("disabled"), Some(false));
        assert_eq!(parse_bool_env("maybe"), None);
    }

    #[test]
    fn verbosity_raises_the_default_level() {
        assert_eq!(verbosity_filter(0), "warn");
        assert_eq!(verbosity_filter(1), "info");
        assert_eq!(verbosity_filter(2), "debug");
        assert_eq!(verbosity_filter(9), "trace");
    }

    #[test]
    fn json_path_creates_missing_log_directory() {
        let root = tempfile::tempdir().expect("tempdir");
        let path = root.path().join("logs/nested/run.jsonl");
        assert_eq!(
            resolve_log_sink(Some(&path)),
            LogSink::JsonFile {
                dir: root.path().join("logs/nested"),
                file_name: "run.jsonl".to_string(),
            }
        );
        assert!(root.path().join("logs/nested").is_dir());
    }

    #[test]
    fn uncreatable_log_directory_falls_back_to_console() {
        let root = tempfile::tempdir().expect("tempdir");
        let blocker = root.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").expect("write");
        let path = blocker.join("run.jsonl");
        assert_eq!(resolve_log_sink(Some(&path)), LogSink::Console);
    }

    #[test]
    fn no_json_path_means_console() {
        assert_eq!(resolve_log_sink(None), LogSink::Console);
    }

    #[test]
    fn init_is_idempotent() {
        let first = init_observability("debug");
        let second = init_observability("trace");
        assert!(std::ptr::eq(first, second));
    }
}
