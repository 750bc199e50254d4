//! Element watcher: resolve once an element matching a selector and predicate
//! exists in the page.
//!
//! The page is scanned once up front and then again after every child-list
//! mutation batch under `<body>`. Only node insertions/removals trigger a
//! rescan; attribute-only changes are picked up by the next child-list batch.
//! Exactly one outcome is produced per watch, and the mutation subscription
//! and timer are both released as soon as it is.

mod matched;

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::dom::{Selector, SelectorError};
use crate::page::{ObserveOptions, Page};

pub use matched::{ElementRef, MatchedElement};

/// Side-effect free test over a candidate element.
pub type Predicate = Box<dyn Fn(&ElementRef<'_>) -> bool + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("timeout waiting for selector {selector} after {waited:?}")]
    Timeout { selector: String, waited: Duration },
    #[error("watch for selector {selector} was cancelled")]
    Cancelled { selector: String },
    #[error("page was reloaded while waiting for selector {selector}")]
    Detached { selector: String },
    #[error(transparent)]
    Selector(#[from] SelectorError),
}

/// A pending wait, configured builder-style and consumed by [`Watch::wait`].
pub struct Watch {
    selector: Selector,
    predicate: Option<Predicate>,
    timeout: Option<Duration>,
    cancel: Option<CancellationToken>,
}

impl Watch {
    pub fn new(selector: Selector) -> Self {
        Self {
            selector,
            predicate: None,
            timeout: None,
            cancel: None,
        }
    }

    pub fn parse(selector: &str) -> Result<Self, SelectorError> {
        Ok(Self::new(selector.parse()?))
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&ElementRef<'_>) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Box::new(predicate));
        self
    }

    /// `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: impl Into<Option<Duration>>) -> Self {
        self.timeout = timeout.into();
        self
    }

    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// First element in document order that matches the selector and predicate.
    fn scan(&self, page: &Page) -> Option<MatchedElement> {
        page.read(|dom| {
            dom.query_selector_all(&self.selector)
                .into_iter()
                .map(|node| ElementRef::new(dom, node))
                .find(|el| self.predicate.as_ref().map_or(true, |p| p(el)))
                .map(|el| el.snapshot())
        })
    }

    pub async fn wait(self, page: &Page) -> Result<MatchedElement, WatchError> {
        let mut observer = page.observe(page.body(), ObserveOptions::child_list_subtree());
        if let Some(found) = self.scan(page) {
            tracing::debug!(selector = %self.selector, node = %found.node, "matched element immediately");
            return Ok(found);
        }

        let started = Instant::now();
        let deadline = self.timeout.map(|t| started + t);
        loop {
            tokio::select! {
                biased;
                _ = cancelled(self.cancel.as_ref()) => {
                    tracing::debug!(selector = %self.selector, "watch cancelled");
                    return Err(WatchError::Cancelled {
                        selector: self.selector.to_string(),
                    });
                }
                _ = expire(deadline) => {
                    return Err(WatchError::Timeout {
                        selector: self.selector.to_string(),
                        waited: started.elapsed(),
                    });
                }
                batch = observer.recv() => {
                    if batch.is_none() {
                        return Err(WatchError::Detached {
                            selector: self.selector.to_string(),
                        });
                    }
                    if let Some(found) = self.scan(page) {
                        tracing::debug!(selector = %self.selector, node = %found.node, "matched element after mutation");
                        return Ok(found);
                    }
                }
            }
        }
    }
}

/// Wait for an element matching `selector` (and `predicate`, if any).
///
/// Fails with [`WatchError::Timeout`] if `timeout` elapses first.
pub async fn wait_for_match(
    page: &Page,
    selector: &str,
    predicate: Option<Predicate>,
    timeout: Option<Duration>,
) -> Result<MatchedElement, WatchError> {
    let mut watch = Watch::parse(selector)?.with_timeout(timeout);
    watch.predicate = predicate;
    watch.wait(page).await
}

async fn expire(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn cancelled(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::NodeId;

    fn add_video(page: &Page, src: &str) -> NodeId {
        page.mutate(|dom| {
            let body = dom.body();
            let v = dom.create_element("video", [("src", src)]);
            dom.append_child(body, v).unwrap();
            v
        })
    }

    fn src_starts_with(prefix: &'static str) -> Predicate {
        Box::new(move |el: &ElementRef<'_>| el.attr("src").is_some_and(|s| s.starts_with(prefix)))
    }

    async fn until_watching(page: &Page, count: usize) {
        while page.observer_count() < count {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn resolves_immediately_with_first_document_order_match() {
        let page = Page::new("/");
        add_video(&page, "blob:ad");
        let first = add_video(&page, "cdn://clip1");
        add_video(&page, "cdn://clip2");

        let found = wait_for_match(&page, "video", Some(src_starts_with("cdn://")), None)
            .await
            .unwrap();
        assert_eq!(found.node, first);
        assert_eq!(found.attr("src"), Some("cdn://clip1"));
        assert_eq!(page.observer_count(), 0);
    }

    #[tokio::test]
    async fn resolves_after_insertion_and_stops_observing() {
        let page = Page::new("/");
        let watcher = {
            let page = page.clone();
            tokio::spawn(async move {
                Watch::parse("video")
                    .unwrap()
                    .filter(|el| el.attr("src").is_some_and(|s| s.starts_with("cdn://")))
                    .wait(&page)
                    .await
            })
        };
        until_watching(&page, 1).await;

        add_video(&page, "blob:ad");
        tokio::task::yield_now().await;
        assert_eq!(page.observer_count(), 1);

        let (late, early) = page.mutate(|dom| {
            let body = dom.body();
            let late = dom.create_element("video", [("src", "cdn://b")]);
            dom.append_child(body, late).unwrap();
            let early = dom.create_element("video", [("src", "cdn://a")]);
            let first = dom.children(body)[0];
            dom.insert_before(body, early, first).unwrap();
            (late, early)
        });
        let found = watcher.await.unwrap().unwrap();
        assert_eq!(found.node, early);
        assert_ne!(found.node, late);
        assert_eq!(page.observer_count(), 0);
    }

    #[tokio::test]
    async fn predicate_sees_tag_and_text() {
        let page = Page::new("/");
        page.mutate(|dom| {
            let body = dom.body();
            for title in ["Loading", "Clip X"] {
                let h = dom.create_element("h2", [("data-a-target", "stream-title")]);
                let t = dom.create_text(title);
                dom.append_child(h, t).unwrap();
                dom.append_child(body, h).unwrap();
            }
        });
        let found = Watch::parse("[data-a-target]")
            .unwrap()
            .filter(|el| el.tag_name() == "h2" && el.text() != "Loading")
            .wait(&page)
            .await
            .unwrap();
        assert_eq!(found.tag_name, "h2");
        assert_eq!(found.text, "Clip X");
    }

    #[tokio::test]
    async fn attribute_change_alone_does_not_rescan() {
        let page = Page::new("/");
        let video = add_video(&page, "blob:placeholder");
        let watcher = {
            let page = page.clone();
            tokio::spawn(async move {
                wait_for_match(&page, "video", Some(src_starts_with("cdn://")), None).await
            })
        };
        until_watching(&page, 1).await;

        page.mutate(|dom| dom.set_attribute(video, "src", "cdn://clip1").unwrap());
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
        assert!(!watcher.is_finished());

        page.mutate(|dom| {
            let body = dom.body();
            let spinner = dom.create_element("div", [("class", "spinner")]);
            dom.append_child(body, spinner).unwrap();
        });
        assert_eq!(watcher.await.unwrap().unwrap().node, video);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_and_releases_subscription() {
        let page = Page::new("/");
        let err = wait_for_match(
            &page,
            "[data-a-target=\"stream-title\"]",
            None,
            Some(Duration::from_secs(180)),
        )
        .await
        .unwrap_err();
        match err {
            WatchError::Timeout { selector, waited } => {
                assert_eq!(selector, "[data-a-target=\"stream-title\"]");
                assert!(waited >= Duration::from_secs(180));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(page.observer_count(), 0);

        // Nothing is left listening after the timeout.
        add_video(&page, "cdn://late");
        assert_eq!(page.observer_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn match_before_deadline_wins() {
        let page = Page::new("/");
        let watcher = {
            let page = page.clone();
            tokio::spawn(async move {
                Watch::parse("video")
                    .unwrap()
                    .with_timeout(Duration::from_secs(10))
                    .wait(&page)
                    .await
            })
        };
        until_watching(&page, 1).await;
        tokio::time::advance(Duration::from_secs(9)).await;
        add_video(&page, "cdn://clip1");
        assert!(watcher.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn cancellation_ends_the_watch() {
        let page = Page::new("/");
        let token = CancellationToken::new();
        let watcher = {
            let page = page.clone();
            let token = token.clone();
            tokio::spawn(async move { Watch::parse("video").unwrap().cancel_on(token).wait(&page).await })
        };
        until_watching(&page, 1).await;
        token.cancel();
        assert!(matches!(
            watcher.await.unwrap(),
            Err(WatchError::Cancelled { .. })
        ));
        assert_eq!(page.observer_count(), 0);
    }

    #[tokio::test]
    async fn reload_detaches_pending_watch() {
        let page = Page::new("/");
        let watcher = {
            let page = page.clone();
            tokio::spawn(async move { wait_for_match(&page, "video", None, None).await })
        };
        until_watching(&page, 1).await;
        page.reload("/again");
        assert!(matches!(
            watcher.await.unwrap(),
            Err(WatchError::Detached { .. })
        ));
    }

    #[tokio::test]
    async fn invalid_selector_is_reported() {
        let page = Page::new("/");
        assert!(matches!(
            wait_for_match(&page, "video[", None, None).await,
            Err(WatchError::Selector(_))
        ));
    }
}
