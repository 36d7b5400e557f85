//! Helpers shared by the unit tests: logger setup, polling waits and an
//! in-memory probing daemon.
mod common;
mod fake_daemon;

pub use common::*;
pub use fake_daemon::*;
