//! Monitor roster ingestion and usable-monitor selection.
mod roster;
mod selector;
pub use roster::*;
pub use selector::*;
