//! Action triggers
//!
//! Policies attached to individual entry handlers that act on the live
//! system: a counted recovery spawn on `do_execve`, a capability drop and
//! init restart on `sys_reboot`, and the caller filter for analyze events.

pub mod analyze;
pub mod execute;
pub mod restart;

pub use analyze::AnalyzeFilter;
pub use execute::{ExecuteTrigger, Observation};
pub use restart::{RestartOutcome, RestartTrigger};
