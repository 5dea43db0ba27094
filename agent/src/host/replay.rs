//! In-process probe host
//!
//! Keeps the installed handlers in a table and invokes them when a recorded
//! probe firing is replayed. Symbols can be marked unresolvable or rejected
//! to exercise partial registration.

use std::collections::{HashMap, HashSet};

use hookwatch_shared::Caller;
use tracing::trace;

use super::{HostError, ProbeHost};
use crate::engine::Engine;
use crate::probes::{EntryArgs, EntryHandler, ExitArgs, ExitHandler};

struct InstalledProbe {
    entry: EntryHandler,
    exit: Option<ExitHandler>,
}

/// Probe host driven by replayed firings
#[derive(Default)]
pub struct ReplayHost {
    probes: HashMap<&'static str, InstalledProbe>,
    unresolved: HashSet<String>,
    rejected: HashMap<String, i32>,
    install_calls: usize,
    remove_calls: usize,
}

impl ReplayHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend `symbol` does not exist in the target
    pub fn with_unresolved(mut self, symbol: impl Into<String>) -> Self {
        self.unresolved.insert(symbol.into());
        self
    }

    /// Refuse probes on `symbol` with the given error code
    pub fn with_rejected(mut self, symbol: impl Into<String>, code: i32) -> Self {
        self.rejected.insert(symbol.into(), code);
        self
    }

    pub fn is_installed(&self, symbol: &str) -> bool {
        self.probes.contains_key(symbol)
    }

    pub fn installed(&self) -> usize {
        self.probes.len()
    }

    pub fn install_calls(&self) -> usize {
        self.install_calls
    }

    pub fn remove_calls(&self) -> usize {
        self.remove_calls
    }

    /// Invoke the entry handler installed on `symbol`
    pub fn fire_entry(
        &self,
        engine: &Engine,
        symbol: &str,
        caller: &Caller,
        args: &EntryArgs,
    ) -> Result<(), HostError> {
        let probe = self
            .probes
            .get(symbol)
            .ok_or_else(|| HostError::NotInstalled(symbol.to_string()))?;
        trace!(symbol, pid = caller.pid, "entry");
        (probe.entry)(engine, caller, args);
        Ok(())
    }

    /// Invoke the exit handler installed on `symbol`
    pub fn fire_exit(
        &self,
        engine: &Engine,
        symbol: &str,
        caller: &Caller,
        ret: &ExitArgs,
    ) -> Result<(), HostError> {
        let exit = self
            .probes
            .get(symbol)
            .and_then(|p| p.exit)
            .ok_or_else(|| HostError::NotInstalled(format!("{}:return", symbol)))?;
        trace!(symbol, pid = caller.pid, retval = ret.retval, "exit");
        exit(engine, caller, ret);
        Ok(())
    }
}

impl ProbeHost for ReplayHost {
    fn install(
        &mut self,
        symbol: &'static str,
        entry: EntryHandler,
        exit: Option<ExitHandler>,
    ) -> Result<(), HostError> {
        self.install_calls += 1;

        if self.unresolved.contains(symbol) {
            return Err(HostError::Unresolved(symbol.to_string()));
        }
        if let Some(&code) = self.rejected.get(symbol) {
            return Err(HostError::Rejected {
                symbol: symbol.to_string(),
                code,
            });
        }
        if self.probes.contains_key(symbol) {
            return Err(HostError::Duplicate(symbol.to_string()));
        }

        self.probes.insert(symbol, InstalledProbe { entry, exit });
        Ok(())
    }

    fn remove(&mut self, symbol: &'static str) {
        self.remove_calls += 1;
        self.probes.remove(symbol);
    }
}
