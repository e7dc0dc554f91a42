//! Logging integration
//!
//! Every function command can carry a `--trace|--debug|--warn|--info`
//! group. The subscriber is installed once per process with a reloadable
//! filter, so the level picked on a command line (or on a shell line)
//! takes effect immediately.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

use crate::constraint::ConstFlag;
use crate::error::{Error, Result};
use crate::spec::{Action, ArgumentSpec};
use crate::value::{ParamType, Value};

/// Parameter name the log level is parsed into
pub const LOG_LEVEL: &str = "log_level";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Warn,
    Info,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Warn => "warn",
            Self::Info => "info",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "warn" | "warning" => Some(Self::Warn),
            "info" => Some(Self::Info),
            _ => None,
        }
    }

    pub fn all() -> &'static [Self] {
        &[Self::Trace, Self::Debug, Self::Warn, Self::Info]
    }

    fn description(&self) -> &'static str {
        match self {
            Self::Trace => "Set log level to trace",
            Self::Debug => "Set log level to debug",
            Self::Warn => "Set log level to warning",
            Self::Info => "Set log level to info",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The mutually exclusive log level flags, as one spec
pub fn log_level_spec() -> ArgumentSpec {
    let dest = "__log-level";
    let flags = LogLevel::all()
        .iter()
        .map(|level| ConstFlag {
            id: format!("{}:{}", dest, level),
            label: level.to_string(),
            long: Some(level.to_string()),
            short: None,
            value: Value::from(level.as_str()),
            help: level.description().to_string(),
        })
        .collect();

    ArgumentSpec {
        dest: dest.to_string(),
        param: LOG_LEVEL.to_string(),
        ty: ParamType::Str,
        long: None,
        short: None,
        help: "Log level".to_string(),
        required: false,
        default: None,
        action: Action::Exclusive(flags),
    }
}

/// Handle to the installed subscriber's filter
pub struct LogHandle {
    handle: reload::Handle<EnvFilter, Registry>,
}

impl LogHandle {
    pub fn set_level(&self, level: LogLevel) -> Result<()> {
        self.handle
            .reload(EnvFilter::new(level.as_str()))
            .map_err(|e| Error::Logging(e.to_string()))
    }
}

/// Install the process-wide subscriber
///
/// The starting filter comes from `RUST_LOG`, falling back to `warn`.
/// Returns `None` when a subscriber is already installed.
pub fn init() -> Option<LogHandle> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let (layer, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(layer)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .ok()?;

    Some(LogHandle { handle })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_round_trip_names() {
        for level in LogLevel::all() {
            assert_eq!(LogLevel::from_str(level.as_str()), Some(*level));
        }
        assert_eq!(LogLevel::from_str("WARNING"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::from_str("loud"), None);
    }

    #[test]
    fn test_log_level_spec() {
        let spec = log_level_spec();
        assert_eq!(spec.param, LOG_LEVEL);
        let Action::Exclusive(flags) = &spec.action else {
            panic!("expected exclusive group");
        };
        let longs: Vec<_> = flags.iter().filter_map(|f| f.long.as_deref()).collect();
        assert_eq!(longs, vec!["trace", "debug", "warn", "info"]);
        assert!(flags.iter().all(|f| f.short.is_none()));
        assert!(!spec.required);
    }
}
