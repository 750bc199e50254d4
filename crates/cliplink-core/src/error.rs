//! Error type for one navigation's resolve-and-inject flow.

use crate::dom::{DomError, SelectorError};
use crate::location::Location;
use crate::watch::WatchError;

/// Anything that can stop a navigation from getting its download link.
/// Stale matches are not errors; they never reach this type.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error(transparent)]
    Watch(#[from] WatchError),
    #[error("document update failed: {0}")]
    Dom(#[from] DomError),
    #[error(transparent)]
    Selector(#[from] SelectorError),
    #[error("matched media element has no {attr} attribute")]
    MissingSource { attr: String },
    /// The page moved on while the media was being discovered.
    #[error("navigation to {location} was superseded before its media was recorded")]
    Superseded { location: Location },
}

impl FlowError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FlowError::Watch(WatchError::Timeout { .. }))
    }

    /// Cancelled by its token, or overtaken by a newer navigation.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            FlowError::Watch(WatchError::Cancelled { .. }) | FlowError::Superseded { .. }
        )
    }
}
