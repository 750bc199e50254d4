//! Resolve a navigation to the clip resource shown on the new page.
//!
//! A cached entry for the new location short-circuits the search. Otherwise
//! the media element is watched for with a two-part predicate: its address
//! must match the clip prefix, and it must not be the resource recorded for
//! the location we just left. The second part rejects a player that still
//! shows the previous clip because the application has changed the URL but
//! not yet swapped the content.

use serde::Serialize;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::CliplinkConfig;
use crate::dom::{Selector, SelectorError};
use crate::error::FlowError;
use crate::location::Location;
use crate::navigation::Navigation;
use crate::page::Page;
use crate::session::{ResourceRef, Session};
use crate::watch::{ElementRef, Watch};

/// Recognition rule for the clip's media element.
#[derive(Debug, Clone)]
pub struct ClipMatcher {
    selector: Selector,
    source_attr: String,
    prefix: String,
    timeout: Option<Duration>,
}

impl ClipMatcher {
    pub fn new(selector: Selector, source_attr: &str, prefix: &str) -> Self {
        Self {
            selector,
            source_attr: source_attr.to_string(),
            prefix: prefix.to_string(),
            timeout: None,
        }
    }

    pub fn from_config(cfg: &CliplinkConfig) -> Result<Self, SelectorError> {
        Ok(Self::new(
            cfg.media_selector.parse()?,
            &cfg.media_source_attr,
            &cfg.clip_url_prefix,
        )
        .with_timeout(cfg.watch_timeout()))
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_clip(&self, address: &str) -> bool {
        is_clip_address(&self.prefix, address)
    }
}

fn is_clip_address(prefix: &str, address: &str) -> bool {
    !prefix.is_empty() && address.starts_with(prefix)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    Cache,
    Discovered,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub location: Location,
    pub resource: ResourceRef,
    pub source: ResolutionSource,
}

pub async fn resolve_navigation(
    page: &Page,
    session: &Session,
    matcher: &ClipMatcher,
    nav: &Navigation,
    cancel: Option<CancellationToken>,
) -> Result<Resolution, FlowError> {
    if let Some(resource) = session.lookup(&nav.new) {
        tracing::debug!(location = %nav.new, %resource, "clip resource cached for location");
        return Ok(Resolution {
            location: nav.new.clone(),
            resource,
            source: ResolutionSource::Cache,
        });
    }

    let predicate = {
        let session = session.clone();
        let source_attr = matcher.source_attr.clone();
        let prefix = matcher.prefix.clone();
        let new = nav.new.clone();
        let old = nav.old.clone();
        move |el: &ElementRef<'_>| {
            let Some(address) = el.attr(&source_attr) else {
                return false;
            };
            if !is_clip_address(&prefix, address) {
                return false;
            }
            let candidate = ResourceRef::new(address);
            if session.is_stale_candidate(&candidate, &new, old.as_ref()) {
                tracing::trace!(location = %new, %candidate, "ignoring media left over from previous location");
                return false;
            }
            true
        }
    };

    let mut watch = Watch::new(matcher.selector.clone())
        .filter(predicate)
        .with_timeout(matcher.timeout);
    if let Some(token) = cancel {
        watch = watch.cancel_on(token);
    }
    let found = watch.wait(page).await?;

    let address = found
        .attr(&matcher.source_attr)
        .ok_or_else(|| FlowError::MissingSource {
            attr: matcher.source_attr.clone(),
        })?;
    let resource = ResourceRef::new(address);
    if session.record_if_current(&nav.new, &resource).is_none() {
        tracing::debug!(location = %nav.new, %resource, "navigation superseded, not caching");
        return Err(FlowError::Superseded {
            location: nav.new.clone(),
        });
    }
    Ok(Resolution {
        location: nav.new.clone(),
        resource,
        source: ResolutionSource::Discovered,
    })
}
