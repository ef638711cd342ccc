//! Logging setup for Parley bots.
//!
//! [`LoggingConfig`] is the single description of how a bot logs;
//! [`LoggingBuilder`] starts from it (or from defaults), lets code adjust it,
//! and installs one `fmt` layer plus an `EnvFilter` on the global registry.
//!
//! ```rust,ignore
//! use parley_runtime::config::{LogFormat, LogLevel};
//! use parley_runtime::logging::LoggingBuilder;
//!
//! LoggingBuilder::from_config(&config.logging)
//!     .level(LogLevel::Debug)
//!     .directive("parley_framework=trace")
//!     .init();
//! ```

use std::path::{Path, PathBuf};

use tracing::{Subscriber, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use crate::config::{LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, SpanEventConfig};

/// Initializes logging from a [`LoggingConfig`].
///
/// Does nothing if a global subscriber is already installed.
pub fn init_from_config(config: &LoggingConfig) {
    let _ = LoggingBuilder::from_config(config).try_init();
}

/// Maps configured span events onto `fmt`'s span flags.
pub fn fmt_span(events: &SpanEventConfig) -> FmtSpan {
    [
        (events.new, FmtSpan::NEW),
        (events.enter, FmtSpan::ENTER),
        (events.exit, FmtSpan::EXIT),
        (events.close, FmtSpan::CLOSE),
    ]
    .into_iter()
    .filter(|(on, _)| *on)
    .fold(FmtSpan::NONE, |acc, (_, flag)| acc | flag)
}

/// Where log lines end up once the configuration has been checked.
#[derive(Debug, PartialEq, Eq)]
enum Sink<'a> {
    Stdout,
    Stderr,
    File(&'a Path),
}

/// Adjusts a [`LoggingConfig`] and installs it as the global subscriber.
#[derive(Debug, Clone, Default)]
pub struct LoggingBuilder {
    config: LoggingConfig,
    directives: Vec<String>,
}

impl LoggingBuilder {
    /// Compact lines at `info` to stdout.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &LoggingConfig) -> Self {
        Self {
            config: config.clone(),
            directives: Vec::new(),
        }
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.config.level = level;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.config.output = output;
        self
    }

    /// Logs to `path`, rotated by `rotation`.
    pub fn file(mut self, path: impl Into<PathBuf>, rotation: LogRotation) -> Self {
        self.config.output = LogOutput::File;
        self.config.file_path = Some(path.into());
        self.config.rotation = rotation;
        self
    }

    pub fn span_events(mut self, events: SpanEventConfig) -> Self {
        self.config.span_events = events;
        self
    }

    /// Adds a raw filter directive such as `parley_framework=trace`, applied
    /// after the configured per-module levels.
    pub fn directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    /// `RUST_LOG` replaces the configured base level; per-module levels and
    /// directives apply on top of either. Unparseable directives are skipped.
    fn filter(&self) -> EnvFilter {
        let base = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.config.level.as_str()));

        let mut modules: Vec<_> = self.config.filters.iter().collect();
        modules.sort_by(|a, b| a.0.cmp(b.0));
        modules
            .into_iter()
            .map(|(module, level)| format!("{module}={level}"))
            .chain(self.directives.iter().cloned())
            .filter_map(|directive| directive.parse().ok())
            .fold(base, EnvFilter::add_directive)
    }

    fn sink(&self) -> Sink<'_> {
        match (self.config.output, self.config.file_path.as_deref()) {
            (LogOutput::Stdout, _) | (LogOutput::File, None) => Sink::Stdout,
            (LogOutput::Stderr, _) => Sink::Stderr,
            (LogOutput::File, Some(path)) => Sink::File(path),
        }
    }

    fn rolling_file(&self, path: &Path) -> Option<BoxMakeWriter> {
        let rotation = match self.config.rotation {
            LogRotation::Never => Rotation::NEVER,
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Daily => Rotation::DAILY,
        };
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let prefix = path
            .file_name()
            .map_or_else(|| "parley.log".into(), |name| name.to_string_lossy().into_owned());

        RollingFileAppender::builder()
            .rotation(rotation)
            .filename_prefix(prefix)
            .build(dir)
            .ok()
            .map(BoxMakeWriter::new)
    }

    fn fmt_layer<S>(&self, writer: BoxMakeWriter) -> Box<dyn Layer<S> + Send + Sync>
    where
        S: Subscriber + for<'a> LookupSpan<'a> + 'static,
    {
        let layer = fmt::layer()
            .with_writer(writer)
            .with_span_events(fmt_span(&self.config.span_events))
            .with_thread_ids(self.config.thread_ids)
            .with_file(self.config.file_location)
            .with_line_number(self.config.file_location);

        match self.config.format {
            LogFormat::Compact => layer.compact().boxed(),
            LogFormat::Pretty => layer.pretty().boxed(),
            #[cfg(feature = "json-log")]
            LogFormat::Json => layer.json().boxed(),
            // Full, and Json when the json-log feature is off.
            _ => layer.boxed(),
        }
    }

    /// Installs the global subscriber, ignoring failure.
    pub fn init(self) {
        let _ = self.try_init();
    }

    /// Installs the global subscriber.
    pub fn try_init(self) -> Result<(), TryInitError> {
        let mut notes = Vec::new();
        let writer = match self.sink() {
            Sink::Stdout => BoxMakeWriter::new(std::io::stdout),
            Sink::Stderr => BoxMakeWriter::new(std::io::stderr),
            Sink::File(path) => self.rolling_file(path).unwrap_or_else(|| {
                notes.push("could not open log file, logging to stdout");
                BoxMakeWriter::new(std::io::stdout)
            }),
        };
        if self.config.output == LogOutput::File && self.config.file_path.is_none() {
            notes.push("file output without a file path, logging to stdout");
        }
        #[cfg(not(feature = "json-log"))]
        if self.config.format == LogFormat::Json {
            notes.push("json log format needs the json-log feature, using full format");
        }

        tracing_subscriber::registry()
            .with(self.fmt_layer(writer))
            .with(self.filter())
            .try_init()?;

        for note in notes {
            warn!("{note}");
        }
        Ok(())
    }
}
