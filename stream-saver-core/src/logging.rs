use tracing::Level;
use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::LoggingConfig;

/// Initialize structured logging based on configuration
///
/// `compact` (default) suits an interactive terminal, `pretty` is verbose
/// multi-line output for debugging, `json` is for log shippers. `RUST_LOG`
/// overrides the configured level.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let log_level = parse_log_level(&config.level)?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level.to_string().to_lowercase()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    let file = match &config.file_path {
        Some(file_path) => Some(std::sync::Arc::new(
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file_path)?,
        )),
        None => None,
    };

    match (config.format.as_str(), file) {
        ("json", Some(file)) => {
            let layer = fmt::layer()
                .json()
                .with_current_span(true)
                .with_target(true)
                .with_writer(file);
            registry.with(layer).try_init()?;
        }
        ("json", None) => {
            let layer = fmt::layer().json().with_current_span(true).with_target(true);
            registry.with(layer).try_init()?;
        }
        ("pretty", Some(file)) => {
            let layer = fmt::layer()
                .pretty()
                .with_ansi(false)
                .with_line_number(true)
                .with_writer(file);
            registry.with(layer).try_init()?;
        }
        ("pretty", None) => {
            let layer = fmt::layer().pretty().with_line_number(true);
            registry.with(layer).try_init()?;
        }
        (_, Some(file)) => {
            let layer = fmt::layer()
                .compact()
                .with_ansi(false)
                .with_target(false)
                .with_writer(file);
            registry.with(layer).try_init()?;
        }
        (_, None) => {
            let layer = fmt::layer().compact().with_target(false);
            registry.with(layer).try_init()?;
        }
    }

    Ok(())
}

/// Parse log level string to tracing Level
fn parse_log_level(level: &str) -> anyhow::Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(anyhow::anyhow!("Invalid log level: {level}")),
    }
}
