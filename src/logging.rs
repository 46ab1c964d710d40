// Copyright (c) 2025 - Cowboy AI, Inc.
//! Structured logging for the event pipeline
//!
//! The pipeline only knows the [`Logger`] contract. [`TracingLogger`] is the
//! default and forwards to `tracing`; tests inject a recorder instead.

use std::fmt;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Log severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// Structured log sink
pub trait Logger: Send + Sync {
    fn log(&self, level: LogLevel, message: &str, fields: &[(&str, String)]);
}

/// Keys the pipeline logs, each emitted as its own `tracing` field
const KNOWN_FIELDS: [&str; 11] = [
    "route", "event_id", "resource", "error", "steps", "from", "to", "saved", "incoming",
    "versions", "routes",
];

/// Forwards to the global `tracing` subscriber under the `powerapp` target.
///
/// Known keys become separate fields so subscribers can filter on them;
/// anything else is collected into `extra`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

macro_rules! emit {
    ($level:ident, $fields:expr, $message:expr) => {{
        let fields = $fields;
        let extra = render_extra(fields);
        $level!(
            target: "powerapp",
            route = field(fields, "route"),
            event_id = field(fields, "event_id"),
            resource = field(fields, "resource"),
            error = field(fields, "error"),
            steps = field(fields, "steps"),
            from = field(fields, "from"),
            to = field(fields, "to"),
            saved = field(fields, "saved"),
            incoming = field(fields, "incoming"),
            versions = field(fields, "versions"),
            routes = field(fields, "routes"),
            extra = extra.as_deref(),
            "{}",
            $message
        )
    }};
}

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, message: &str, fields: &[(&str, String)]) {
        match level {
            LogLevel::Debug => emit!(debug, fields, message),
            LogLevel::Info => emit!(info, fields, message),
            LogLevel::Warn => emit!(warn, fields, message),
            LogLevel::Error => emit!(error, fields, message),
        }
    }
}

fn field<'a>(fields: &'a [(&str, String)], name: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.as_str())
}

/// `k=v` pairs for keys outside [`KNOWN_FIELDS`], or `None` when there are none
fn render_extra(fields: &[(&str, String)]) -> Option<String> {
    let extra: Vec<String> = fields
        .iter()
        .filter(|(key, _)| !KNOWN_FIELDS.contains(key))
        .map(|(key, value)| format!("{key}={value}"))
        .collect();
    (!extra.is_empty()).then(|| extra.join(" "))
}

/// Install a `fmt` subscriber filtered by `RUST_LOG`, defaulting to INFO.
///
/// Safe to call more than once; later calls leave the first subscriber in
/// place.
pub fn init_tracing() {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_fields_are_looked_up_by_key() {
        let fields = [
            ("event_id", "ev-1".to_string()),
            ("resource", "power-item:op-1".to_string()),
        ];
        assert_eq!(field(&fields, "resource"), Some("power-item:op-1"));
        assert_eq!(field(&fields, "route"), None);
        assert_eq!(render_extra(&fields), None);
    }

    #[test]
    fn test_unknown_fields_go_to_extra() {
        let rendered = render_extra(&[
            ("route", "page/p/request".to_string()),
            ("n", "2".into()),
            ("user", "u-1".into()),
        ]);
        assert_eq!(rendered.as_deref(), Some("n=2 user=u-1"));
    }

    #[test]
    fn test_level_order() {
        assert!(LogLevel::Debug < LogLevel::Error);
        assert_eq!(LogLevel::Warn.to_string(), "warn");
    }

    #[test]
    fn test_init_tracing_twice() {
        init_tracing();
        init_tracing();
        TracingLogger.log(LogLevel::Info, "hello", &[("k", "v".to_string())]);
    }
}
