//! Host facilities
//!
//! The engine never redirects control flow, writes logs, starts processes or
//! touches credentials itself. Each of those is a narrow trait implemented by
//! the host the engine is embedded in.

pub mod caps;
pub mod procfs;
pub mod replay;
pub mod sink;
pub mod spawn;

use hookwatch_shared::{Caller, EventRecord, Pid};
use serde::Serialize;

use crate::probes::{EntryHandler, ExitHandler};

/// Failure reported by a host facility
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("symbol already probed: {0}")]
    Duplicate(String),

    #[error("symbol not found: {0}")]
    Unresolved(String),

    #[error("host rejected probe on {symbol} ({code})")]
    Rejected { symbol: String, code: i32 },

    #[error("no probe installed on {0}")]
    NotInstalled(String),

    #[error("failed to spawn {path}: {source}")]
    Spawn {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Registration boundary of the tracing facility
///
/// Removing a symbol that was never installed must be a no-op.
pub trait ProbeHost {
    fn install(
        &mut self,
        symbol: &'static str,
        entry: EntryHandler,
        exit: Option<ExitHandler>,
    ) -> Result<(), HostError>;

    fn remove(&mut self, symbol: &'static str);
}

/// Severity of a sink write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
}

/// Logging sink
///
/// Writes are fire-and-forget: implementations must not block and must
/// swallow their own failures.
pub trait EventSink: Send + Sync {
    fn write(&self, severity: Severity, message: &str);

    /// Structured variant used for event records. Sinks that only deal in
    /// text get the rendered line.
    fn write_record(&self, record: &EventRecord<'_>) {
        self.write(Severity::Info, &record.to_string());
    }
}

/// Starts a process without waiting for it
pub trait ProcessSpawner: Send + Sync {
    fn spawn(&self, path: &str, argv: &[String], envp: &[String]) -> Result<(), HostError>;
}

/// Resolves the locally bound port of a socket descriptor owned by `pid`
pub trait SocketResolver: Send + Sync {
    fn bound_port(&self, pid: Pid, fd: i32) -> Option<u16>;
}

/// Index of CAP_SYS_BOOT
pub const CAP_SYS_BOOT: u8 = 22;

/// Capability bitmask, one bit per capability index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct CapMask(pub u64);

impl CapMask {
    pub fn has(self, cap: u8) -> bool {
        self.0 & (1u64 << cap) != 0
    }

    pub fn lower(&mut self, cap: u8) {
        self.0 &= !(1u64 << cap);
    }

    pub fn is_subset_of(self, other: CapMask) -> bool {
        self.0 & !other.0 == 0
    }
}

/// Effective, inheritable and permitted sets of one task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CapabilitySets {
    pub effective: CapMask,
    pub inheritable: CapMask,
    pub permitted: CapMask,
}

impl CapabilitySets {
    /// Clear `cap` in all three sets
    pub fn lower_all(&mut self, cap: u8) {
        self.effective.lower(cap);
        self.inheritable.lower(cap);
        self.permitted.lower(cap);
    }

    /// Check that moving from `self` to `new` only drops privileges
    pub fn permits(&self, new: &CapabilitySets) -> Result<(), CapabilityError> {
        if !new.permitted.is_subset_of(self.permitted) {
            return Err(CapabilityError::Set("permitted set may not grow".into()));
        }
        if !new.effective.is_subset_of(new.permitted) {
            return Err(CapabilityError::Set(
                "effective set must be a subset of permitted".into(),
            ));
        }
        if !new
            .inheritable
            .is_subset_of(CapMask(self.inheritable.0 | self.permitted.0))
        {
            return Err(CapabilityError::Set("inheritable set may not grow".into()));
        }
        Ok(())
    }
}

/// Credentials being prepared for a commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub pid: Pid,
    pub sets: CapabilitySets,
}

/// Failure of a capability operation
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("capget failed: {0}")]
    Read(String),

    #[error("prepare_creds failed: {0}")]
    Prepare(String),

    #[error("capset failed: {0}")]
    Set(String),

    #[error("commit failed: {0}")]
    Commit(String),

    #[error("cannot change credentials of foreign task {0}")]
    ForeignTask(Pid),
}

/// Credential facility used by the privileged restart trigger
pub trait CapabilityFacility: Send + Sync {
    /// Read the capability sets of `caller`
    fn capget(&self, caller: &Caller) -> Result<CapabilitySets, CapabilityError>;

    /// Copy the caller's current credentials for modification
    fn prepare(&self, caller: &Caller) -> Result<Credentials, CapabilityError>;

    /// Install `sets` into `new`, validated against `reference`
    fn capset(
        &self,
        new: &mut Credentials,
        reference: &CapabilitySets,
        sets: CapabilitySets,
    ) -> Result<(), CapabilityError>;

    /// Make `new` the caller's credentials
    fn commit(&self, new: Credentials) -> Result<(), CapabilityError>;

    /// Discard prepared credentials
    fn abort(&self, _new: Credentials) {}
}
