//! Helpers for code built on top of sessions.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `debounce` | Trailing-edge debouncing of bursty triggers |

/// Trailing-edge debouncing.
pub mod debounce;

pub use debounce::{DEFAULT_DEBOUNCE_DELAY, Debouncer};
