//! Turn the page title into a download link for the resolved clip.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::CliplinkConfig;
use crate::dom::{Dom, DomError, NodeId, Selector, SelectorError};
use crate::error::FlowError;
use crate::location::Location;
use crate::page::Page;
use crate::session::{ResourceRef, Session};
use crate::watch::Watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Injection {
    /// The title now holds `<a download href=..>{title}</a>`.
    Applied { title: String },
    /// The user moved on before the title appeared; nothing was touched.
    Abandoned { current: Option<Location> },
}

#[derive(Debug, Clone)]
pub struct LinkInjector {
    title: Selector,
    fallback_title: String,
    timeout: Option<Duration>,
}

impl LinkInjector {
    pub fn new(title: Selector, fallback_title: &str) -> Self {
        Self {
            title,
            fallback_title: fallback_title.to_string(),
            timeout: None,
        }
    }

    pub fn from_config(cfg: &CliplinkConfig) -> Result<Self, SelectorError> {
        Ok(Self::new(cfg.title_selector.parse()?, &cfg.fallback_title).with_timeout(cfg.title_timeout()))
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Wait for the title element, then link it to `resource` if the page
    /// is still showing `for_location`.
    ///
    /// Both the session's CurrentLocation and the live page location are
    /// checked; the live check and the rewrite share one mutation turn.
    pub async fn apply(
        &self,
        page: &Page,
        session: &Session,
        resource: &ResourceRef,
        for_location: &Location,
        cancel: Option<CancellationToken>,
    ) -> Result<Injection, FlowError> {
        let mut watch = Watch::new(self.title.clone()).with_timeout(self.timeout);
        if let Some(token) = cancel {
            watch = watch.cancel_on(token);
        }
        let title = watch.wait(page).await?;

        let current = session.current_location();
        if current.as_ref() != Some(for_location) {
            tracing::debug!(location = %for_location, current = ?current, "navigation superseded, leaving title untouched");
            return Ok(Injection::Abandoned { current });
        }

        let applied = page.mutate_at(for_location, |dom| {
            let node = self.locate_title(dom, title.node)?;
            self.link_title(dom, node, resource)
        });
        match applied {
            None => {
                let current = Some(page.location());
                tracing::debug!(location = %for_location, current = ?current, "page moved on, leaving title untouched");
                Ok(Injection::Abandoned { current })
            }
            Some(Err(e)) => Err(e.into()),
            Some(Ok(text)) => {
                tracing::info!(location = %for_location, %resource, title = %text, "download link applied");
                Ok(Injection::Applied { title: text })
            }
        }
    }

    /// The matched node, or a fresh match if the page replaced it meanwhile.
    fn locate_title(&self, dom: &Dom, matched: NodeId) -> Result<NodeId, DomError> {
        if dom.is_connected(matched) {
            return Ok(matched);
        }
        dom.query_selector(&self.title)
            .ok_or(DomError::Detached(matched))
    }

    fn link_title(&self, dom: &mut Dom, node: NodeId, resource: &ResourceRef) -> Result<String, DomError> {
        let text = dom.text_content(node);
        let text = match text.trim() {
            "" => self.fallback_title.clone(),
            trimmed => trimmed.to_string(),
        };
        let anchor = dom.create_element("a", [("download", ""), ("href", resource.as_str())]);
        let label = dom.create_text(text.clone());
        dom.append_child(anchor, label)?;
        dom.replace_children(node, vec![anchor])?;
        Ok(text)
    }
}

/// One-shot form of [`LinkInjector::apply`] built from configuration.
pub async fn apply_download_link(
    page: &Page,
    session: &Session,
    resource: &ResourceRef,
    for_location: &Location,
    cfg: &CliplinkConfig,
) -> Result<Injection, FlowError> {
    LinkInjector::from_config(cfg)?
        .apply(page, session, resource, for_location, None)
        .await
}
