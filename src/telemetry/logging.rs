//! Subscriber setup for the player's tracing events
//!
//! One output layer (compact text or JSON, on stderr or in a file) behind an
//! env filter. `AV1_PLAYER_LOG` and `AV1_PLAYER_LOG_FORMAT` override the
//! configured level and format.

use std::fs::File;
use std::path::PathBuf;

use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry};

pub use tracing_appender::non_blocking::WorkerGuard as LogGuard;

type OutputLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// How log lines are rendered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    /// Parse "compact" or "json", ignoring case
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" | "text" => Some(Self::Compact),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Filter used when neither `AV1_PLAYER_LOG` nor `RUST_LOG` is set
    pub default_level: String,
    pub format: LogFormat,
    /// Write to this file through a background writer instead of stderr
    pub file_path: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_level: "info".to_string(),
            format: LogFormat::Compact,
            file_path: None,
        }
    }
}

impl LogConfig {
    /// Format after applying `AV1_PLAYER_LOG_FORMAT`
    fn effective_format(&self) -> LogFormat {
        std::env::var("AV1_PLAYER_LOG_FORMAT")
            .ok()
            .and_then(|v| LogFormat::parse(&v))
            .unwrap_or(self.format)
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_env("AV1_PLAYER_LOG")
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new(&self.default_level))
    }
}

/// Install the global subscriber
///
/// With a `file_path`, keep the returned guard alive until shutdown so
/// buffered lines reach the file. Fails if a subscriber is already set.
pub fn init_logging(config: &LogConfig) -> Result<Option<LogGuard>, Box<dyn std::error::Error + Send + Sync>> {
    let format = config.effective_format();

    let (output, guard) = match &config.file_path {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(File::create(path)?);
            (output_layer(format, writer, false), Some(guard))
        }
        None => (output_layer(format, std::io::stderr, true), None),
    };

    tracing_subscriber::registry()
        .with(output.with_filter(config.env_filter()))
        .try_init()?;

    tracing::debug!(?format, file = ?config.file_path, "av1-player logging ready");
    Ok(guard)
}

fn output_layer<W>(format: LogFormat, writer: W, ansi: bool) -> OutputLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer().with_writer(writer).with_ansi(ansi).with_target(true);
    match format {
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Json => layer.json().with_current_span(false).boxed(),
    }
}
