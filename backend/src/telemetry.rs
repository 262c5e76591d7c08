//! Tracing initialisation and the default operation-log sink.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::domain::ports::OperationLog;
use crate::domain::{EntityName, RequestId};

/// Initialise the global tracing subscriber.
///
/// Reads the filter from `RUST_LOG` and emits JSON lines. Safe to call
/// more than once; a second initialisation logs a warning instead of
/// failing.
pub fn init_tracing() {
    let result = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init();
    if let Err(err) = result {
        warn!(error = %err, "tracing subscriber already initialised");
    }
}

/// Operation log that emits one structured `info` event per repository
/// operation.
#[derive(Debug, Clone, Default)]
pub struct TracingOperationLog;

impl TracingOperationLog {
    /// Shared handle suitable for handing to a repository registry.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self)
    }
}

impl OperationLog for TracingOperationLog {
    fn record(
        &self,
        operation: &str,
        entity: EntityName,
        duration: Duration,
        request_id: Option<RequestId>,
    ) {
        let duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        match request_id {
            Some(request_id) => info!(
                operation,
                entity = %entity,
                duration_ms,
                request_id = %request_id,
                "repository operation completed"
            ),
            None => info!(
                operation,
                entity = %entity,
                duration_ms,
                "repository operation completed"
            ),
        }
    }
}
