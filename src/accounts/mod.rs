//! Configured Loggamera accounts
//!
//! - `manager`: Setup, registry and unload of per-account coordinators

pub mod manager;

pub use manager::{AccountHandle, AccountManager};
