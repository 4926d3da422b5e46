use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// `[logging]` section of the engine configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,  // trace|debug|info|warn|error
    pub format: String, // text|json
    pub no_ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "text".to_string(),
            no_ansi: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl From<&LogConfig> for (LogLevel, LogFormat) {
    fn from(cfg: &LogConfig) -> Self {
        let level = match cfg.level.to_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "error" => LogLevel::Error,
            _ => LogLevel::Warn,
        };
        let format = if cfg.format.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        };
        (level, format)
    }
}

impl LogLevel {
    fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Install the global tracing subscriber. `RUST_LOG` takes precedence over
/// the configured level. Logs go to stderr so report output stays clean.
/// Calling this more than once is harmless.
pub fn init_tracing_with(cfg: &LogConfig) {
    let (level, format): (LogLevel, LogFormat) = cfg.into();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let base = fmt::layer()
        .with_target(true)
        .with_ansi(!cfg.no_ansi)
        .with_writer(std::io::stderr);
    let fmt_layer = match format {
        LogFormat::Json => base.json().boxed(),
        LogFormat::Text => base.boxed(),
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_level_and_format() {
        let cfg = LogConfig {
            level: "DEBUG".into(),
            format: "Json".into(),
            no_ansi: true,
        };
        let (level, format): (LogLevel, LogFormat) = (&cfg).into();
        assert_eq!(level, LogLevel::Debug);
        assert_eq!(format, LogFormat::Json);
    }

    #[test]
    fn unknown_values_fall_back_to_defaults() {
        let cfg = LogConfig {
            level: "loud".into(),
            format: "yaml".into(),
            no_ansi: false,
        };
        let (level, format): (LogLevel, LogFormat) = (&cfg).into();
        assert_eq!(level, LogLevel::Warn);
        assert_eq!(format, LogFormat::Text);
    }

    #[test]
    fn init_is_idempotent() {
        init_tracing_with(&LogConfig::default());
        init_tracing_with(&LogConfig::default());
    }
}
