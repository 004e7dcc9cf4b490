use std::{fmt, path::PathBuf, sync::Arc};

use anyhow::Result;
use serde_json::Value;
use shared_event_bus::{EventPublisher, EventRecord};
use shared_logging::{JsonLogger, LogLevel, LogRecord};
use tokio::runtime::Handle;

/// Builder for hearth telemetry sinks.
pub struct HearthTelemetryBuilder {
    module: String,
    log_path: Option<PathBuf>,
    min_level: LogLevel,
    event_publisher: Option<Arc<dyn EventPublisher>>,
}

impl HearthTelemetryBuilder {
    /// Creates the builder.
    #[must_use]
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            log_path: None,
            min_level: LogLevel::Debug,
            event_publisher: None,
        }
    }

    /// Sets the JSON-lines log path.
    #[must_use]
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Drops records below `level`.
    #[must_use]
    pub const fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Sets the event publisher.
    #[must_use]
    pub fn event_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.event_publisher = Some(publisher);
        self
    }

    /// Builds the telemetry handle.
    pub fn build(self) -> Result<HearthTelemetry> {
        let logger = match self.log_path {
            Some(path) => Some(Arc::new(JsonLogger::with_min_level(path, self.min_level)?)),
            None => None,
        };
        Ok(HearthTelemetry {
            inner: Arc::new(TelemetryInner {
                module: self.module,
                logger,
                publisher: self.event_publisher,
            }),
        })
    }
}

/// Telemetry handle shared by the backend, pipeline and family components.
///
/// Every record is also forwarded to `tracing`, so a subscriber installed by
/// the binary sees the same stream as the JSON log.
#[derive(Clone)]
pub struct HearthTelemetry {
    inner: Arc<TelemetryInner>,
}

impl fmt::Debug for HearthTelemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HearthTelemetry")
            .field("module", &self.inner.module)
            .field("log", &self.inner.logger.as_ref().map(|logger| logger.path()))
            .field("events", &self.inner.publisher.is_some())
            .finish()
    }
}

struct TelemetryInner {
    module: String,
    logger: Option<Arc<JsonLogger>>,
    publisher: Option<Arc<dyn EventPublisher>>,
}

impl HearthTelemetry {
    /// Returns a builder.
    #[must_use]
    pub fn builder(module: impl Into<String>) -> HearthTelemetryBuilder {
        HearthTelemetryBuilder::new(module)
    }

    /// Handle with no sinks besides `tracing`.
    #[must_use]
    pub fn disabled(module: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(TelemetryInner {
                module: module.into(),
                logger: None,
                publisher: None,
            }),
        }
    }

    /// Same sinks under another module name.
    #[must_use]
    pub fn scoped(&self, module: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(TelemetryInner {
                module: module.into(),
                logger: self.inner.logger.clone(),
                publisher: self.inner.publisher.clone(),
            }),
        }
    }

    /// Module name stamped on records.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.inner.module
    }

    /// Logs structured metadata.
    pub fn log(&self, level: LogLevel, message: &str, metadata: Value) -> Result<()> {
        let module = self.inner.module.as_str();
        match level {
            LogLevel::Debug => tracing::debug!(module, %metadata, "{message}"),
            LogLevel::Info => tracing::info!(module, %metadata, "{message}"),
            LogLevel::Warn => tracing::warn!(module, %metadata, "{message}"),
            LogLevel::Error => tracing::error!(module, %metadata, "{message}"),
        }
        if let Some(logger) = &self.inner.logger {
            logger.log(&LogRecord::new(module, level, message).with_metadata(&metadata))?;
        }
        Ok(())
    }

    /// Emits an event on the bus.
    ///
    /// Inside a runtime the publish is spawned; outside one it runs to
    /// completion on the calling thread.
    pub fn event(&self, event_type: &str, payload: Value) -> Result<()> {
        let Some(publisher) = &self.inner.publisher else {
            return Ok(());
        };
        let record = EventRecord::new(self.inner.module.clone(), event_type, payload);
        if let Ok(handle) = Handle::try_current() {
            let publisher = Arc::clone(publisher);
            handle.spawn(async move {
                if let Err(err) = publisher.publish(record).await {
                    tracing::warn!(error = ?err, "telemetry event publish failed");
                }
            });
            Ok(())
        } else {
            futures::executor::block_on(publisher.publish(record))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_event_bus::MemoryEventBus;
    use tempfile::tempdir;

    #[test]
    fn telemetry_writes_log_and_event() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("hearth.log");
        let bus = Arc::new(MemoryEventBus::new(16));
        let telemetry = HearthTelemetry::builder("backend")
            .log_path(&path)
            .event_publisher(bus.clone())
            .build()
            .unwrap();
        telemetry
            .log(LogLevel::Warn, "backend.fallback", json!({ "operation": "get_doors" }))
            .unwrap();
        telemetry
            .event("backend.fallback", json!({ "operation": "get_doors" }))
            .unwrap();
        let records = shared_logging::read_records(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].module, "backend");
        assert_eq!(bus.of_type("backend.fallback").len(), 1);
    }

    #[test]
    fn scoped_handle_shares_sinks() {
        let bus = Arc::new(MemoryEventBus::new(16));
        let telemetry = HearthTelemetry::builder("runtime")
            .event_publisher(bus.clone())
            .build()
            .unwrap();
        let pipeline = telemetry.scoped("pipeline");
        pipeline.event("pipeline.executed", json!({})).unwrap();
        let events = bus.snapshot();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].source, "pipeline");
    }

    #[test]
    fn disabled_handle_is_a_no_op() {
        let telemetry = HearthTelemetry::disabled("quiet");
        telemetry.log(LogLevel::Error, "x", json!(null)).unwrap();
        telemetry.event("x", json!(null)).unwrap();
        assert_eq!(telemetry.module(), "quiet");
    }
}
