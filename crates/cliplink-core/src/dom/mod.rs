//! In-memory host document.
//!
//! The host page's tree is an external collaborator; this module models the
//! parts the watcher and injector rely on: selector queries in document order,
//! text and attribute access, and a journal of child-list and attribute
//! mutations that the page turns into observer batches.

mod error;
mod record;
mod selector;
mod tree;

pub use error::DomError;
pub use record::MutationRecord;
pub use selector::{Selector, SelectorError};
pub use tree::{Dom, Element, NodeId};
