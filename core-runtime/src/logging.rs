//! # Logging
//!
//! One call to [`init_logging`] installs the process-wide `tracing`
//! subscriber: an `EnvFilter`, a formatter writing to stdout and a
//! [`LoggerSinkLayer`] that mirrors every surviving event into the host's
//! [`LoggerSink`]. The sink is how warnings such as failed downloads or
//! engine start failures reach the host's error reporting.
//!
//! ```ignore
//! use bridge_traits::time::{ConsoleLogger, LogLevel};
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//! use std::sync::Arc;
//!
//! init_logging(
//!     LoggingConfig::default()
//!         .with_format(LogFormat::Compact)
//!         .with_level(LogLevel::Debug)
//!         .with_logger_sink(Arc::new(ConsoleLogger::default())),
//! )?;
//! ```
//!
//! Download URLs are usually signed. Log them through [`redact_url`] and
//! cached files through [`strip_path`]; the sink layer additionally redacts
//! any field that looks like a credential or a URL.

use crate::error::{Error, Result};
use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// Targets that follow the configured level when no custom filter is set.
const WORKSPACE_TARGETS: &[&str] = &[
    "bridge_desktop",
    "bridge_traits",
    "core_playback",
    "core_runtime",
    "core_service",
];

/// Noisy dependencies pinned to `warn`.
const QUIET_TARGETS: &[&str] = &["h2", "hyper", "reqwest", "rustls", "symphonia"];

/// Field names whose values never reach the sink.
const SENSITIVE_MARKERS: &[&str] = &[
    "authorization",
    "bearer",
    "password",
    "secret",
    "signature",
    "token",
    "api_key",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, colored output for local development.
    Pretty,
    /// One JSON object per line.
    Json,
    /// Single-line text.
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: LogLevel,
    /// Full `EnvFilter` directive string, replacing the per-crate defaults.
    pub filter: Option<String>,
    pub logger_sink: Option<Arc<dyn LoggerSink>>,
    /// Redact credentials and URL query strings before they reach the sink.
    pub redact_pii: bool,
    pub enable_spans: bool,
    pub display_target: bool,
    pub display_thread_info: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            filter: None,
            logger_sink: None,
            redact_pii: true,
            enable_spans: true,
            display_target: true,
            display_thread_info: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    pub fn with_pii_redaction(mut self, redact: bool) -> Self {
        self.redact_pii = redact;
        self
    }

    pub fn with_spans(mut self, enable: bool) -> Self {
        self.enable_spans = enable;
        self
    }

    pub fn with_target(mut self, display: bool) -> Self {
        self.display_target = display;
        self
    }

    pub fn with_thread_info(mut self, display: bool) -> Self {
        self.display_thread_info = display;
        self
    }

    /// The `EnvFilter` directives this configuration installs.
    pub fn filter_directives(&self) -> String {
        if let Some(custom) = &self.filter {
            return custom.clone();
        }
        let level = level_name(self.level);
        std::iter::once(level.to_string())
            .chain(WORKSPACE_TARGETS.iter().map(|t| format!("{t}={level}")))
            .chain(QUIET_TARGETS.iter().map(|t| format!("{t}=warn")))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// [`Error::Config`] for an unparsable filter, or when a global subscriber
/// is already installed (a second call always fails).
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = build_filter(&config)?;
    let threads = config.display_thread_info;
    let spans = if config.enable_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let pretty = (config.format == LogFormat::Pretty).then(|| {
        tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(config.display_target)
            .with_thread_names(threads)
            .with_span_events(spans.clone())
    });
    let compact = (config.format == LogFormat::Compact).then(|| {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_target(config.display_target)
            .with_thread_names(threads)
    });
    let json = (config.format == LogFormat::Json).then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(config.enable_spans)
            .with_span_list(false)
            .with_target(config.display_target)
            .with_thread_names(threads)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(LoggerSinkLayer::new(config.logger_sink.clone(), config.redact_pii))
        .with(pretty)
        .with(compact)
        .with(json)
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    EnvFilter::try_new(config.filter_directives())
        .map_err(|e| Error::Config(format!("Invalid log filter: {}", e)))
}

fn level_name(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Trace => "trace",
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    }
}

fn log_level(level: &tracing::Level) -> LogLevel {
    match *level {
        tracing::Level::ERROR => LogLevel::Error,
        tracing::Level::WARN => LogLevel::Warn,
        tracing::Level::INFO => LogLevel::Info,
        tracing::Level::DEBUG => LogLevel::Debug,
        tracing::Level::TRACE => LogLevel::Trace,
    }
}

/// `tracing` layer mirroring events into a host [`LoggerSink`].
///
/// Delivery is asynchronous on the current tokio runtime when there is one
/// and blocking otherwise. Sink failures go to stderr, never back into
/// `tracing`.
pub struct LoggerSinkLayer {
    sink: Option<Arc<dyn LoggerSink>>,
    redact: bool,
}

impl LoggerSinkLayer {
    pub fn new(sink: Option<Arc<dyn LoggerSink>>, redact: bool) -> Self {
        Self { sink, redact }
    }

    fn entry_for<S>(&self, event: &Event<'_>, ctx: &Context<'_, S>) -> LogEntry
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        let metadata = event.metadata();
        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        let message = fields
            .message
            .take()
            .unwrap_or_else(|| metadata.name().to_string());
        let mut entry = LogEntry::new(log_level(metadata.level()), metadata.target(), message);
        for (name, value) in fields.values {
            let value = if self.redact {
                redact_if_sensitive(&name, &value)
            } else {
                value
            };
            entry = entry.with_field(name, value);
        }
        if let Some(span) = ctx.lookup_current() {
            entry = entry.with_span_id(span.name());
        }
        entry
    }
}

impl<S> Layer<S> for LoggerSinkLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let Some(sink) = &self.sink else {
            return;
        };
        if log_level(event.metadata().level()) < sink.min_level() {
            return;
        }

        let entry = self.entry_for(event, &ctx);
        let sink = Arc::clone(sink);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(e) = sink.log(entry).await {
                        eprintln!("LoggerSink error: {}", e);
                    }
                });
            }
            Err(_) => {
                if let Err(e) = futures::executor::block_on(sink.log(entry)) {
                    eprintln!("LoggerSink error: {}", e);
                }
            }
        }
    }
}

/// Collects an event's message and fields as strings.
#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    values: HashMap<String, String>,
}

impl FieldCollector {
    fn insert(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            name => {
                self.values.insert(name.to_string(), value);
            }
        }
    }
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, format!("{:?}", value));
    }
}

/// Redact `value` when its field name marks a credential, and strip the
/// query string of anything that looks like a URL.
///
/// ```ignore
/// use core_runtime::logging::redact_if_sensitive;
///
/// assert_eq!(redact_if_sensitive("api_token", "abc"), "[REDACTED]");
/// ```
pub fn redact_if_sensitive(field_name: &str, value: &str) -> String {
    let name = field_name.to_ascii_lowercase();
    if SENSITIVE_MARKERS.iter().any(|marker| name.contains(marker)) {
        return "[REDACTED]".to_string();
    }
    if value.contains("://") {
        return redact_url(value);
    }
    value.to_string()
}

/// Drop the query string and fragment of a URL.
pub fn redact_url(url: &str) -> String {
    match url.find(['?', '#']) {
        Some(index) => format!("{}?[REDACTED]", &url[..index]),
        None => url.to_string(),
    }
}

/// Basename of a path, for logging cache files without the user's home.
pub fn strip_path(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}
