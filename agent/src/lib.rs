//! hookwatch agent library
//!
//! Entry/exit probes on a fixed catalogue of target operations, a runtime
//! category filter, per-caller correlation of entry and exit, and the action
//! triggers attached to `do_execve` and `sys_reboot`.

pub mod config;
pub mod correlation;
pub mod engine;
pub mod filter;
pub mod host;
pub mod probes;
pub mod reporter;
pub mod trace;
pub mod triggers;

pub use config::Config;
pub use engine::{Control, Engine, EngineBuilder};
pub use probes::{EntryArgs, ExitArgs, ProbeDescriptor, ProbeRegistry, RegistrationError, CATALOGUE};
pub use reporter::{Reporter, ReporterStats};
