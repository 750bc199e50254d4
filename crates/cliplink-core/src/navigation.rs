//! Navigation change detection for single-page applications.
//!
//! Programmatic history changes fire no event, but a client-side route change
//! always ends up mutating the document. The detector subscribes to child-list
//! mutations across the whole document and, per batch, compares the location
//! captured at delivery time with the session's CurrentLocation.
//!
//! The first batch after subscribing always reports a transition, with
//! `old = None`.

use tokio::task::JoinHandle;

use crate::location::Location;
use crate::page::{MutationObserver, ObserveOptions, Page};
use crate::session::Session;

/// A route transition: `old` is `None` for the first one observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub new: Location,
    pub old: Option<Location>,
}

pub struct NavigationDetector {
    session: Session,
    observer: MutationObserver,
}

impl NavigationDetector {
    /// Start observing. Mutations made after this call are seen.
    pub fn subscribe(page: &Page, session: &Session) -> Self {
        let observer = page.observe(page.document(), ObserveOptions::child_list_subtree());
        Self {
            session: session.clone(),
            observer,
        }
    }

    /// Next distinct transition; `None` once the page is reloaded or dropped.
    pub async fn next(&mut self) -> Option<Navigation> {
        loop {
            let batch = self.observer.recv().await?;
            if let Some(nav) = self.session.observe_location(&batch.location) {
                tracing::debug!(new = %nav.new, old = ?nav.old, "location changed");
                return Some(nav);
            }
        }
    }
}

/// Invoke `callback(navigation)` for every distinct transition, in order.
pub fn on_location_change<F>(page: &Page, session: &Session, mut callback: F) -> JoinHandle<()>
where
    F: FnMut(Navigation) + Send + 'static,
{
    let mut detector = NavigationDetector::subscribe(page, session);
    tokio::spawn(async move {
        while let Some(nav) = detector.next().await {
            callback(nav);
        }
    })
}
