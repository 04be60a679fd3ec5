//! ## fixpool-telemetry::logging
//! **Structured logging with `tracing`**
//!
//! `PoolLogger::init` installs the process-wide subscriber; `log_event`
//! records allocator events (exhaustion, layout dumps) with
//! OpenTelemetry-style key/value metadata.

use opentelemetry::KeyValue;
use tracing::info_span;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone)]
pub struct PoolLogger;

impl PoolLogger {
    /// Installs the global subscriber. `RUST_LOG` wins over `default_level`.
    ///
    /// Safe to call more than once; later calls are ignored.
    pub fn init(default_level: &str) {
        let _ = fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new(default_level)),
            )
            .with_thread_names(true)
            .with_span_events(FmtSpan::ENTER)
            .try_init();
    }

    #[inline]
    pub fn log_event(event_type: &str, metadata: Vec<KeyValue>) {
        let span = info_span!("pool_event", event_type = event_type, otel.kind = "INTERNAL");
        let _guard = span.enter();
        tracing::info!(metadata = ?metadata, "Allocator event occurred");
    }
}
