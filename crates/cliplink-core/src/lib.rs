//! Download links for clip pages in a single-page application.
//!
//! The crate watches a host document for route changes, finds the media
//! element that belongs to the new route, and rewrites the page title into a
//! download link for it.

pub mod config;
pub mod logging;

pub mod dom;
pub mod error;
pub mod inject;
pub mod location;
pub mod navigation;
pub mod orchestrator;
pub mod page;
pub mod resolve;
pub mod session;
pub mod watch;

pub use error::FlowError;
pub use location::Location;
pub use page::Page;
pub use session::{ResourceRef, Session};
