//! Shared handle over the host document, its location and its observers.
//!
//! `Page` is what the watcher, detector and injector see of the host:
//! - the tree, read through [`Page::read`] and changed through [`Page::mutate`]
//!   (one mutation turn = one observer batch);
//! - the location, which programmatic history changes update silently, with
//!   no notification of any kind;
//! - mutation subscriptions via [`Page::observe`].
//!
//! Lock order is dom -> history -> observers; no lock is held across an await.

mod observer;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::dom::{Dom, NodeId};
use crate::location::Location;

pub use observer::{MutationBatch, MutationObserver, ObserveOptions};

use observer::ObserverRegistry;

#[derive(Debug)]
struct History {
    entries: Vec<Location>,
    index: usize,
}

impl History {
    fn new(location: Location) -> Self {
        Self {
            entries: vec![location],
            index: 0,
        }
    }

    fn current(&self) -> &Location {
        &self.entries[self.index]
    }
}

struct PageInner {
    dom: RwLock<Dom>,
    history: RwLock<History>,
    observers: Mutex<ObserverRegistry>,
}

impl PageInner {
    fn read_dom(&self) -> RwLockReadGuard<'_, Dom> {
        self.dom.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_dom(&self) -> RwLockWriteGuard<'_, Dom> {
        self.dom.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_history(&self) -> RwLockReadGuard<'_, History> {
        self.history.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_history(&self) -> RwLockWriteGuard<'_, History> {
        self.history.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_observers(&self) -> MutexGuard<'_, ObserverRegistry> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Clone)]
pub struct Page {
    inner: Arc<PageInner>,
}

impl Page {
    pub fn new(location: impl Into<Location>) -> Self {
        Self {
            inner: Arc::new(PageInner {
                dom: RwLock::new(Dom::new()),
                history: RwLock::new(History::new(location.into())),
                observers: Mutex::new(ObserverRegistry::default()),
            }),
        }
    }

    pub fn location(&self) -> Location {
        self.inner.read_history().current().clone()
    }

    /// Programmatic navigation (`history.pushState`): drops forward entries.
    pub fn push_location(&self, location: impl Into<Location>) {
        let mut history = self.inner.write_history();
        let next = history.index + 1;
        history.entries.truncate(next);
        history.entries.push(location.into());
        history.index = next;
    }

    /// Programmatic navigation (`history.replaceState`).
    pub fn replace_location(&self, location: impl Into<Location>) {
        let mut history = self.inner.write_history();
        let index = history.index;
        history.entries[index] = location.into();
    }

    /// Returns false when already at the oldest entry.
    pub fn back(&self) -> bool {
        let mut history = self.inner.write_history();
        if history.index == 0 {
            return false;
        }
        history.index -= 1;
        true
    }

    /// Returns false when already at the newest entry.
    pub fn forward(&self) -> bool {
        let mut history = self.inner.write_history();
        if history.index + 1 >= history.entries.len() {
            return false;
        }
        history.index += 1;
        true
    }

    pub fn document(&self) -> NodeId {
        self.inner.read_dom().document()
    }

    pub fn body(&self) -> NodeId {
        self.inner.read_dom().body()
    }

    pub fn read<R>(&self, f: impl FnOnce(&Dom) -> R) -> R {
        f(&self.inner.read_dom())
    }

    /// Run one mutation turn; everything `f` changes is delivered as one batch.
    pub fn mutate<R>(&self, f: impl FnOnce(&mut Dom) -> R) -> R {
        let mut dom = self.inner.write_dom();
        let out = f(&mut dom);
        self.flush(&mut dom);
        out
    }

    /// Like [`Page::mutate`], but only runs `f` if the page is still at
    /// `location`. The check and the mutation happen under the same lock.
    pub fn mutate_at<R>(&self, location: &Location, f: impl FnOnce(&mut Dom) -> R) -> Option<R> {
        let mut dom = self.inner.write_dom();
        if self.inner.read_history().current() != location {
            return None;
        }
        let out = f(&mut dom);
        self.flush(&mut dom);
        Some(out)
    }

    fn flush(&self, dom: &mut Dom) {
        let records = dom.take_records();
        if records.is_empty() {
            return;
        }
        let location = self.location();
        self.inner
            .lock_observers()
            .dispatch(dom, &records, &location);
    }

    pub fn observe(&self, root: NodeId, options: ObserveOptions) -> MutationObserver {
        let (id, rx) = self.inner.lock_observers().register(root, options);
        MutationObserver::new(id, rx, Arc::downgrade(&self.inner))
    }

    /// Number of live subscriptions.
    pub fn observer_count(&self) -> usize {
        self.inner.lock_observers().len()
    }

    /// Full page load: fresh document and history; every subscription ends.
    pub fn reload(&self, location: impl Into<Location>) {
        let mut dom = self.inner.write_dom();
        *dom = Dom::new();
        *self.inner.write_history() = History::new(location.into());
        self.inner.lock_observers().clear();
        tracing::debug!("page reloaded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::MutationRecord;

    fn empty() -> Vec<(&'static str, &'static str)> {
        Vec::new()
    }

    #[test]
    fn mutation_turn_is_one_batch_with_location_snapshot() {
        let page = Page::new("https://example.com/");
        let mut observer = page.observe(page.document(), ObserveOptions::child_list_subtree());
        page.push_location("https://example.com/clip/x");
        page.mutate(|dom| {
            let body = dom.body();
            let a = dom.create_element("div", empty());
            let b = dom.create_element("div", empty());
            dom.append_child(body, a).unwrap();
            dom.append_child(body, b).unwrap();
        });
        let batch = observer.try_recv().expect("one batch");
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.location.as_str(), "https://example.com/clip/x");
        assert!(observer.try_recv().is_none());
    }

    #[test]
    fn location_changes_alone_notify_nobody() {
        let page = Page::new("/a");
        let mut observer = page.observe(page.document(), ObserveOptions::child_list_subtree());
        page.push_location("/b");
        page.replace_location("/c");
        assert!(observer.try_recv().is_none());
        assert_eq!(page.location().as_str(), "/c");
        assert!(page.back());
        assert_eq!(page.location().as_str(), "/a");
        assert!(!page.back());
        assert!(page.forward());
        assert_eq!(page.location().as_str(), "/c");
    }

    #[test]
    fn delivery_respects_scope_and_kind() {
        let page = Page::new("/");
        let (outside, inside) = page.mutate(|dom| {
            let body = dom.body();
            let outside = dom.create_element("aside", empty());
            let inside = dom.create_element("main", empty());
            dom.append_child(body, outside).unwrap();
            dom.append_child(body, inside).unwrap();
            (outside, inside)
        });
        let mut shallow = page.observe(inside, ObserveOptions::default().with_attributes());
        let mut deep = page.observe(inside, ObserveOptions::child_list_subtree());

        page.mutate(|dom| {
            let p = dom.create_element("p", empty());
            dom.append_child(outside, p).unwrap();
        });
        assert!(shallow.try_recv().is_none());
        assert!(deep.try_recv().is_none());

        let nested = page.mutate(|dom| {
            let section = dom.create_element("section", empty());
            dom.append_child(inside, section).unwrap();
            section
        });
        assert!(shallow.try_recv().is_none());
        assert!(deep.try_recv().is_some());

        page.mutate(|dom| dom.set_attribute(inside, "class", "x").unwrap());
        assert!(matches!(
            shallow.try_recv().unwrap().records[0],
            MutationRecord::Attributes { .. }
        ));
        assert!(deep.try_recv().is_none());

        page.mutate(|dom| {
            let p = dom.create_element("p", empty());
            dom.append_child(nested, p).unwrap();
        });
        assert!(deep.try_recv().is_some());
    }

    #[test]
    fn dropping_observer_deregisters() {
        let page = Page::new("/");
        let observer = page.observe(page.body(), ObserveOptions::child_list_subtree());
        assert_eq!(page.observer_count(), 1);
        observer.disconnect();
        assert_eq!(page.observer_count(), 0);
    }

    #[test]
    fn mutate_at_skips_when_location_moved() {
        let page = Page::new("/z");
        page.push_location("/w");
        let ran = page.mutate_at(&Location::from("/z"), |_| ());
        assert!(ran.is_none());
        assert_eq!(page.mutate_at(&Location::from("/w"), |_| 7), Some(7));
    }

    #[tokio::test]
    async fn reload_ends_subscriptions() {
        let page = Page::new("/");
        let mut observer = page.observe(page.body(), ObserveOptions::child_list_subtree());
        page.reload("/fresh");
        assert_eq!(page.observer_count(), 0);
        assert!(observer.recv().await.is_none());
        assert_eq!(page.location().as_str(), "/fresh");
    }
}
