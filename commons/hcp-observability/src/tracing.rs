use std::str::FromStr;
use tracing_subscriber::{EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Output encoding of the fmt layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

impl FromStr for LogFormat {
    type Err = TracingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "plain" | "text" => Ok(LogFormat::Plain),
            "json" => Ok(LogFormat::Json),
            other => Err(TracingError::Format(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub service_name: String,
    pub log_level: String,
    pub format: LogFormat,
}

/// `RUST_LOG` wins over the configured level; an unparsable level falls
/// back to `info`.
fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn setup_tracing(config: TracingConfig) -> Result<(), TracingError> {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_line_number(true);
    let fmt_layer = match config.format {
        LogFormat::Json => fmt_layer.json().flatten_event(true).boxed(),
        LogFormat::Plain => fmt_layer.boxed(),
    };

    Registry::default()
        .with(env_filter(&config.log_level))
        .with(fmt_layer)
        .try_init()
        .map_err(|e| TracingError::Setup(e.to_string()))?;

    tracing::debug!(service = %config.service_name, format = ?config.format, "tracing initialized");
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("Tracing setup error: {0}")]
    Setup(String),
    #[error("unknown log format '{0}'")]
    Format(String),
}
