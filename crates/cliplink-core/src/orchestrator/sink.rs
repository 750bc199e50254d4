//! Where navigation failures end up.

use crate::error::FlowError;
use crate::location::Location;

/// Receives every failure the orchestrator does not recover from. Reporting
/// never stops the navigation loop.
pub trait ErrorSink: Send + Sync {
    fn report(&self, location: &Location, error: &FlowError);
}

/// Default sink: one `error!` event per failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn report(&self, location: &Location, error: &FlowError) {
        if error.is_timeout() {
            tracing::error!(%location, "clip link unavailable for this page: {error}");
        } else {
            tracing::error!(%location, "clip link failed: {error}");
        }
    }
}
