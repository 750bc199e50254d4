//! Wires detector, resolver and injector into one long-running loop.
//!
//! Each navigation gets its own task (resolve, then inject) and its own
//! cancellation token, a child of the shutdown token. With
//! `cancel_superseded` on, a newer navigation cancels the previous one's
//! token; otherwise older tasks run to completion and rely on the staleness
//! predicate and the injector's location re-check.

mod outcome;
mod sink;

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::config::CliplinkConfig;
use crate::dom::SelectorError;
use crate::error::FlowError;
use crate::inject::{Injection, LinkInjector};
use crate::navigation::{Navigation, NavigationDetector};
use crate::page::Page;
use crate::resolve::{resolve_navigation, ClipMatcher};
use crate::session::Session;

pub use outcome::NavigationOutcome;
pub use sink::{ErrorSink, TracingSink};

pub struct Orchestrator {
    page: Page,
    session: Session,
    matcher: ClipMatcher,
    injector: LinkInjector,
    cancel_superseded: bool,
    sink: Arc<dyn ErrorSink>,
    outcomes: Option<UnboundedSender<NavigationOutcome>>,
}

impl Orchestrator {
    pub fn new(page: Page, session: Session, cfg: &CliplinkConfig) -> Result<Self, SelectorError> {
        Ok(Self {
            page,
            session,
            matcher: ClipMatcher::from_config(cfg)?,
            injector: LinkInjector::from_config(cfg)?,
            cancel_superseded: cfg.cancel_superseded,
            sink: Arc::new(TracingSink),
            outcomes: None,
        })
    }

    pub fn with_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Report every finished navigation on `tx`.
    pub fn with_outcomes(mut self, tx: UnboundedSender<NavigationOutcome>) -> Self {
        self.outcomes = Some(tx);
        self
    }

    /// Subscribe to the page and spawn the navigation loop.
    ///
    /// The subscription is in place when this returns, so any mutation made
    /// afterwards is seen.
    pub fn start(self) -> Running {
        let detector = NavigationDetector::subscribe(&self.page, &self.session);
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(Arc::new(self).run(detector, shutdown.clone()));
        Running { shutdown, handle }
    }

    async fn run(self: Arc<Self>, mut detector: NavigationDetector, shutdown: CancellationToken) {
        let mut tasks = JoinSet::new();
        let mut in_flight: Option<CancellationToken> = None;
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!("navigation task ended abnormally: {e}");
                    }
                }
                next = detector.next() => {
                    let Some(nav) = next else {
                        tracing::debug!("page detached, navigation loop ending");
                        break;
                    };
                    let token = shutdown.child_token();
                    if let Some(previous) = in_flight.replace(token.clone()) {
                        if self.cancel_superseded {
                            previous.cancel();
                        }
                    }
                    tasks.spawn(self.clone().handle_navigation(nav, token));
                }
            }
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!("navigation task ended abnormally: {e}");
            }
        }
    }

    async fn handle_navigation(self: Arc<Self>, nav: Navigation, cancel: CancellationToken) {
        let outcome = match self.resolve_and_inject(&nav, &cancel).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => {
                tracing::debug!(location = %nav.new, "navigation superseded before resolution");
                NavigationOutcome::Cancelled { location: nav.new }
            }
            Err(e) => {
                self.sink.report(&nav.new, &e);
                NavigationOutcome::Failed {
                    location: nav.new,
                    error: e.to_string(),
                }
            }
        };
        if let Some(tx) = &self.outcomes {
            let _ = tx.send(outcome);
        }
    }

    async fn resolve_and_inject(
        &self,
        nav: &Navigation,
        cancel: &CancellationToken,
    ) -> Result<NavigationOutcome, FlowError> {
        let resolution =
            resolve_navigation(&self.page, &self.session, &self.matcher, nav, Some(cancel.clone())).await?;
        let injection = self
            .injector
            .apply(
                &self.page,
                &self.session,
                &resolution.resource,
                &resolution.location,
                Some(cancel.clone()),
            )
            .await?;
        Ok(match injection {
            Injection::Applied { .. } => NavigationOutcome::Applied {
                location: resolution.location,
                resource: resolution.resource,
                source: resolution.source,
            },
            Injection::Abandoned { .. } => NavigationOutcome::Abandoned {
                location: resolution.location,
                resource: resolution.resource,
            },
        })
    }
}

/// Handle to a started [`Orchestrator`].
pub struct Running {
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl Running {
    /// Cancel every in-flight navigation and wait for the loop to drain.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        self.join().await;
    }

    /// Wait for the loop to end on its own (page reloaded or dropped).
    pub async fn join(self) {
        if let Err(e) = self.handle.await {
            tracing::error!("navigation loop ended abnormally: {e}");
        }
    }
}
