//! Unified logging module for modlens tools
//!
//! Console output always goes to stderr; stdout is reserved for the tools'
//! structured output. An optional daily rolling file receives the same
//! events through a non-blocking writer.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::Writer, FmtContext, FormatEvent, FormatFields},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::error::{Error, Result};

/// Custom format for log level with brackets: `[INFO]`, `[WARN]`, etc.
fn format_level(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "[TRACE]",
        Level::DEBUG => "[DEBUG]",
        Level::INFO => "[INFO]",
        Level::WARN => "[WARN]",
        Level::ERROR => "[ERROR]",
    }
}

fn level_color(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "\x1b[35m", // magenta
        Level::DEBUG => "\x1b[34m", // blue
        Level::INFO => "\x1b[32m",  // green
        Level::WARN => "\x1b[33m",  // yellow
        Level::ERROR => "\x1b[31m", // red
    }
}

/// Event formatter producing `timestamp [LEVEL] message`
///
/// Example output: `2026-03-02T10:15:44.809120Z [WARN] Frame #3 rejected: ...`
pub struct BracketedLevelFormat;

impl<S, N> FormatEvent<S, N> for BracketedLevelFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = chrono::Utc::now();
        write!(writer, "{} ", now.format("%Y-%m-%dT%H:%M:%S%.6fZ"))?;

        let level = event.metadata().level();
        if writer.has_ansi_escapes() {
            write!(writer, "{}{}\x1b[0m ", level_color(level), format_level(level))?;
        } else {
            write!(writer, "{} ", format_level(level))?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Console output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// `timestamp [LEVEL] message`
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// Logger configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`info`, `debug`, `info,modlens_decode=trace`, ...)
    pub level: String,
    pub format: LogFormat,
    /// Directory for daily rolling log files; console only when unset
    pub dir: Option<PathBuf>,
    /// Log file name prefix inside `dir`
    pub file_prefix: String,
    /// Colour the console level tags
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            dir: None,
            file_prefix: "modlens.log".to_string(),
            ansi: true,
        }
    }
}

/// Filter directive for a `-v` count: 0 keeps `default`, 1 is debug, 2+ trace
pub fn level_for_verbosity(verbosity: u8, default: &str) -> String {
    match verbosity {
        0 => default.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

fn parse_filter(level: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(level)
        .map_err(|e| Error::Config(format!("Invalid log level '{}': {}", level, e)))
}

/// `RUST_LOG` when set, otherwise the configured level
fn build_filter(level: &str) -> Result<EnvFilter> {
    match std::env::var("RUST_LOG") {
        Ok(env_str) if !env_str.trim().is_empty() => parse_filter(&env_str),
        _ => parse_filter(level),
    }
}

// ============================================================================
// Initialisation
// ============================================================================

/// Install the global subscriber.
///
/// Returns the file writer guard when file logging is enabled; the caller
/// must hold it until exit or buffered lines are lost.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = build_filter(&config.level)?;

    let console_layer = match config.format {
        LogFormat::Text => fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(config.ansi)
            .event_format(BracketedLevelFormat)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
    };

    let (file_layer, guard) = match &config.dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, &config.file_prefix);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .event_format(BracketedLevelFormat)
                .boxed();
            (Some(layer), Some(guard))
        },
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))?;

    if let Some(dir) = &config.dir {
        tracing::debug!("File logging: {}/{}.*", dir.display(), config.file_prefix);
    }

    Ok(guard)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Capture {
        type Writer = Capture;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_bracketed_format() {
        let capture = Capture::default();
        let subscriber = tracing_subscriber::registry().with(
            fmt::layer()
                .with_writer(capture.clone())
                .with_ansi(false)
                .event_format(BracketedLevelFormat),
        );

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!("Frame #3 rejected");
            tracing::info!(count = 2, "Parsed transactions");
        });

        let output = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("[WARN] Frame #3 rejected"));
        assert!(lines[1].contains("[INFO] Parsed transactions count=2"));
        assert!(!output.contains("\x1b["));
    }

    #[test]
    fn test_format_level() {
        assert_eq!(format_level(&Level::ERROR), "[ERROR]");
        assert_eq!(format_level(&Level::TRACE), "[TRACE]");
    }

    #[test]
    fn test_parse_filter() {
        assert!(parse_filter("info").is_ok());
        assert!(parse_filter("warn,modlens_decode=trace").is_ok());
        assert!(matches!(
            parse_filter("info,modlens_decode=loud"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_level_for_verbosity() {
        assert_eq!(level_for_verbosity(0, "warn"), "warn");
        assert_eq!(level_for_verbosity(1, "warn"), "debug");
        assert_eq!(level_for_verbosity(5, "warn"), "trace");
    }

    // Only test in this binary that installs the global subscriber
    #[test]
    fn test_init_creates_log_dir_and_refuses_second_init() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = LoggingConfig {
            dir: Some(tmp.path().join("logs")),
            ansi: false,
            ..LoggingConfig::default()
        };

        let guard = init_logging(&config).unwrap();
        assert!(guard.is_some());
        assert!(tmp.path().join("logs").is_dir());

        assert!(matches!(
            init_logging(&LoggingConfig::default()),
            Err(Error::Logging(_))
        ));
    }

    #[test]
    fn test_config_defaults_from_partial_document() {
        let config: LoggingConfig =
            serde_json::from_str(r#"{"format": "json", "dir": "/tmp/modlens"}"#).unwrap();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.dir, Some(PathBuf::from("/tmp/modlens")));
        assert!(config.ansi);
    }
}
