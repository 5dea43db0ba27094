//! Counted recovery trigger
//!
//! While armed, every `do_execve` entry is counted. The entry that takes the
//! count past the threshold resets it to zero and spawns the recovery
//! console. A target stuck re-executing the same command is recovered this
//! way without operator involvement.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use tracing::debug;

use crate::host::ProcessSpawner;
use crate::reporter::Reporter;

/// Result of counting one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    Disarmed,
    /// Counter value after this entry
    Counted(u32),
    Fired,
}

#[derive(Debug)]
pub struct ExecuteTrigger {
    armed: AtomicBool,
    counter: AtomicU32,
    threshold: u32,
    recovery_path: String,
    env: Vec<String>,
}

impl ExecuteTrigger {
    pub fn new(threshold: u32, recovery_path: String, env: Vec<String>) -> Self {
        Self {
            armed: AtomicBool::new(false),
            counter: AtomicU32::new(0),
            threshold,
            recovery_path,
            env,
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Relaxed)
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::Relaxed);
    }

    /// Stop counting; the current count is kept
    pub fn disarm(&self) {
        self.armed.store(false, Ordering::Relaxed);
    }

    pub fn counter(&self) -> u32 {
        self.counter.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        self.counter.store(0, Ordering::Release);
    }

    /// Count one qualifying entry. Exactly one concurrent caller observes
    /// `Fired` per round.
    pub fn observe(&self) -> Observation {
        if !self.is_armed() {
            return Observation::Disarmed;
        }

        let threshold = self.threshold;
        let previous = self
            .counter
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                Some(if count >= threshold { 0 } else { count + 1 })
            })
            .unwrap_or_else(|count| count);

        if previous >= threshold {
            Observation::Fired
        } else {
            Observation::Counted(previous + 1)
        }
    }

    /// Count the entry and spawn the recovery console if the threshold was
    /// exceeded
    pub fn on_entry(&self, spawner: &dyn ProcessSpawner, reporter: &Reporter) -> Observation {
        let observation = self.observe();
        if observation != Observation::Fired {
            return observation;
        }

        reporter.info(&format!("do_execve: {}", self.recovery_path));
        let argv = [self.recovery_path.clone()];
        match spawner.spawn(&self.recovery_path, &argv, &self.env) {
            Ok(()) => debug!(path = %self.recovery_path, "recovery console started"),
            Err(e) => reporter.warn(&format!("do_execve: {}", e)),
        }

        observation
    }
}
