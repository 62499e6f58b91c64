//! Daemon library for the URL pinger
//!
//! The binary in `main.rs` is a thin CLI over [`bootstrap`].

pub mod bootstrap;
pub mod simple_error;


pub use simple_error::{DaemonError, Result};
