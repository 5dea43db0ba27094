//! Shared types and utilities for hookwatch
//!
//! This crate contains the event categories, caller identity and event
//! record types used by the probe engine and anything that consumes its
//! output.

pub mod types;
pub mod utils;

// Re-export commonly used types
pub use types::{category::*, events::*};
