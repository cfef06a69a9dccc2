//! Structured logging (§3's `LogEntry`) with KV mirroring for WARN/ERROR.
//!
//! `init_logging` wires a `tracing_subscriber::fmt` layer (written
//! synchronously to stderr) alongside a [`KvMirrorLayer`] that captures any
//! WARN-or-above event into a [`LogEntry`] and hands it to a sink closure.
//! Wiring the mirror as a `tracing_subscriber::Layer` means every WARN/ERROR
//! in the process reaches the KV, not just call sites that remember to log
//! twice.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer};
use uuid::Uuid;

/// Mirrors [`tracing::Level`] without requiring callers to depend on `tracing`
/// directly for the bits of §3's data model that outlive the log line itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One structured log record, as described by §3's data model.
///
/// `LogEntry::kv_key` is the `logs_{iso}_{rand}` shape named in §6's
/// persisted-state layout; entries are written with a 7-day TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    pub context: Value,
    pub error: Option<String>,
    pub duration_ms: Option<u64>,
}

impl LogEntry {
    /// 7 days, matching §6 (`logs_{iso}_{rand}` → 7-day TTL).
    pub const KV_TTL_SECS: u64 = 7 * 24 * 60 * 60;

    pub fn kv_key(&self) -> String {
        format!(
            "logs_{}_{}",
            self.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            &self.id.simple().to_string()[..8]
        )
    }
}

/// Receives every WARN/ERROR [`LogEntry`] produced anywhere in the process.
pub trait LogSink: Send + Sync + 'static {
    fn record(&self, entry: LogEntry);
}

impl<F: Fn(LogEntry) + Send + Sync + 'static> LogSink for F {
    fn record(&self, entry: LogEntry) {
        self(entry)
    }
}

/// A `tracing_subscriber::Layer` that turns WARN/ERROR events into
/// [`LogEntry`] values and forwards them to a [`LogSink`].
pub struct KvMirrorLayer<S: LogSink> {
    sink: S,
}

impl<S: LogSink> KvMirrorLayer<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }
}

#[derive(Default)]
struct FieldCollector {
    message: String,
    context: serde_json::Map<String, Value>,
}

impl Visit for FieldCollector {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let rendered = format!("{value:?}");
        if field.name() == "message" {
            self.message = rendered;
        } else {
            self.context
                .insert(field.name().to_string(), Value::String(rendered));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.context
                .insert(field.name().to_string(), Value::String(value.to_string()));
        }
    }
}

impl<S, L> Layer<L> for KvMirrorLayer<S>
where
    S: LogSink,
    L: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, L>) {
        let level = match *event.metadata().level() {
            Level::ERROR => LogLevel::Error,
            Level::WARN => LogLevel::Warn,
            _ => return,
        };

        let mut collector = FieldCollector::default();
        event.record(&mut collector);

        let entry = LogEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            level,
            message: collector.message,
            context: Value::Object(collector.context),
            error: None,
            duration_ms: None,
        };
        self.sink.record(entry);
    }
}

/// Initializes the global tracing subscriber: `fmt` to stderr, filtered by
/// `RUST_LOG` (defaulting to `info`), plus the KV mirror layer.
///
/// Call exactly once, at process start.
pub fn init_logging<S: LogSink>(sink: S) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer();
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(KvMirrorLayer::new(sink));
    tracing::subscriber::set_global_default(subscriber)
        .expect("init_logging must be called exactly once per process");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn kv_key_has_logs_prefix() {
        let entry = LogEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            level: LogLevel::Warn,
            message: "x".into(),
            context: Value::Null,
            error: None,
            duration_ms: None,
        };
        assert!(entry.kv_key().starts_with("logs_"));
    }

    #[test]
    fn mirror_layer_captures_warn_not_debug() {
        let captured: Arc<Mutex<Vec<LogEntry>>> = Arc::new(Mutex::new(Vec::new()));
        let sink_captured = captured.clone();
        let layer = KvMirrorLayer::new(move |entry: LogEntry| {
            sink_captured.lock().unwrap().push(entry);
        });
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!("ignored");
            tracing::warn!(code = "UPSTREAM_API_ERROR", "slow upstream");
        });

        let entries = captured.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, LogLevel::Warn);
        assert_eq!(entries[0].message, "slow upstream");
    }
}
