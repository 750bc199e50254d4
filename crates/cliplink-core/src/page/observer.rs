//! Mutation observer registry and subscriptions.
//!
//! Each subscription owns the receiving half of an unbounded channel; the
//! page keeps the sending half and delivers one [`MutationBatch`] per mutation
//! turn. Dropping the [`MutationObserver`] deregisters it.

use std::sync::Weak;

use tokio::sync::mpsc;

use crate::dom::{Dom, MutationRecord, NodeId};
use crate::location::Location;

use super::PageInner;

/// Which mutations a subscription cares about, and how deep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ObserveOptions {
    pub child_list: bool,
    pub attributes: bool,
    pub subtree: bool,
}

impl ObserveOptions {
    /// Node insertions/removals anywhere below the observed root.
    pub const fn child_list_subtree() -> Self {
        Self {
            child_list: true,
            attributes: false,
            subtree: true,
        }
    }

    pub const fn with_attributes(mut self) -> Self {
        self.attributes = true;
        self
    }

    fn wants(&self, record: &MutationRecord) -> bool {
        match record {
            MutationRecord::ChildList { .. } => self.child_list,
            MutationRecord::Attributes { .. } => self.attributes,
        }
    }
}

/// Records delivered together, plus the page location at delivery time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationBatch {
    pub records: Vec<MutationRecord>,
    pub location: Location,
}

struct Registration {
    id: u64,
    root: NodeId,
    options: ObserveOptions,
    tx: mpsc::UnboundedSender<MutationBatch>,
}

#[derive(Default)]
pub(super) struct ObserverRegistry {
    next_id: u64,
    entries: Vec<Registration>,
}

impl ObserverRegistry {
    pub(super) fn register(
        &mut self,
        root: NodeId,
        options: ObserveOptions,
    ) -> (u64, mpsc::UnboundedReceiver<MutationBatch>) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.next_id += 1;
        let id = self.next_id;
        self.entries.push(Registration {
            id,
            root,
            options,
            tx,
        });
        (id, rx)
    }

    pub(super) fn unregister(&mut self, id: u64) {
        self.entries.retain(|r| r.id != id);
    }

    pub(super) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(super) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Deliver the records each observer is scoped to; drops registrations
    /// whose receiver has gone away.
    pub(super) fn dispatch(&mut self, dom: &Dom, records: &[MutationRecord], location: &Location) {
        self.entries.retain(|reg| {
            let scoped: Vec<MutationRecord> = records
                .iter()
                .filter(|r| reg.options.wants(r))
                .filter(|r| {
                    let target = r.target();
                    target == reg.root || (reg.options.subtree && dom.is_ancestor(reg.root, target))
                })
                .cloned()
                .collect();
            if scoped.is_empty() {
                return !reg.tx.is_closed();
            }
            reg.tx
                .send(MutationBatch {
                    records: scoped,
                    location: location.clone(),
                })
                .is_ok()
        });
    }
}

/// Live subscription returned by [`Page::observe`](super::Page::observe).
pub struct MutationObserver {
    id: u64,
    rx: mpsc::UnboundedReceiver<MutationBatch>,
    page: Weak<PageInner>,
}

impl MutationObserver {
    pub(super) fn new(
        id: u64,
        rx: mpsc::UnboundedReceiver<MutationBatch>,
        page: Weak<PageInner>,
    ) -> Self {
        Self { id, rx, page }
    }

    /// Next batch, or `None` once the page has been reloaded or dropped.
    pub async fn recv(&mut self) -> Option<MutationBatch> {
        self.rx.recv().await
    }

    /// Next already-delivered batch, without waiting.
    pub fn try_recv(&mut self) -> Option<MutationBatch> {
        self.rx.try_recv().ok()
    }

    pub fn disconnect(self) {}
}

impl Drop for MutationObserver {
    fn drop(&mut self) {
        if let Some(page) = self.page.upgrade() {
            page.lock_observers().unregister(self.id);
        }
    }
}
