//! Privileged restart trigger
//!
//! When enabled, a reboot request (other than toggling Ctrl-Alt-Del
//! handling) costs the caller CAP_SYS_BOOT and starts a replacement init, so
//! an emulated target that tries to reboot keeps running instead.

use std::sync::atomic::{AtomicBool, Ordering};

use hookwatch_shared::Caller;

use crate::host::{CapabilityError, CapabilityFacility, ProcessSpawner, CAP_SYS_BOOT};
use crate::reporter::Reporter;

/// `LINUX_REBOOT_CMD_CAD_OFF`
pub const REBOOT_CMD_CAD_OFF: u32 = 0x0000_0000;
/// `LINUX_REBOOT_CMD_CAD_ON`
pub const REBOOT_CMD_CAD_ON: u32 = 0x89AB_CDEF;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartOutcome {
    Disabled,
    /// Ctrl-Alt-Del toggles are left alone
    Ignored,
    /// A step before commit failed and credentials are unchanged, or
    /// commit failed and only some of the sets may have been written
    Aborted(CapabilityError),
    /// CAP_SYS_BOOT dropped; `spawned` tells whether init was started
    Restarted { spawned: bool },
}

#[derive(Debug)]
pub struct RestartTrigger {
    enabled: AtomicBool,
    init_path: String,
    env: Vec<String>,
}

impl RestartTrigger {
    pub fn new(enabled: bool, init_path: String, env: Vec<String>) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            init_path,
            env,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn on_reboot(
        &self,
        caller: &Caller,
        cmd: u32,
        caps: &dyn CapabilityFacility,
        spawner: &dyn ProcessSpawner,
        reporter: &Reporter,
    ) -> RestartOutcome {
        if !self.is_enabled() {
            return RestartOutcome::Disabled;
        }
        if cmd == REBOOT_CMD_CAD_OFF || cmd == REBOOT_CMD_CAD_ON {
            return RestartOutcome::Ignored;
        }

        if let Err(e) = drop_sys_boot(caller, caps) {
            reporter.warn(&format!("sys_reboot: {}", e));
            return RestartOutcome::Aborted(e);
        }

        reporter.info("sys_reboot: removed CAP_SYS_BOOT, starting init...");

        let argv = [self.init_path.clone()];
        let spawned = match spawner.spawn(&self.init_path, &argv, &self.env) {
            Ok(()) => true,
            Err(e) => {
                reporter.warn(&format!("sys_reboot: {}", e));
                false
            }
        };

        RestartOutcome::Restarted { spawned }
    }
}

fn drop_sys_boot(caller: &Caller, caps: &dyn CapabilityFacility) -> Result<(), CapabilityError> {
    let current = caps.capget(caller)?;
    let mut new = caps.prepare(caller)?;

    let mut lowered = current;
    lowered.lower_all(CAP_SYS_BOOT);

    if let Err(e) = caps.capset(&mut new, &current, lowered) {
        caps.abort(new);
        return Err(e);
    }

    caps.commit(new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::CategoryFilter;
    use crate::host::sink::MemorySink;
    use crate::host::{CapMask, CapabilitySets, Credentials, HostError, Severity};
    use hookwatch_shared::CategoryMask;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct FakeCaps {
        fail_capget: bool,
        fail_capset: bool,
        committed: Mutex<Option<CapabilitySets>>,
        aborted: Mutex<u32>,
    }

    impl CapabilityFacility for FakeCaps {
        fn capget(&self, _: &Caller) -> Result<CapabilitySets, CapabilityError> {
            if self.fail_capget {
                return Err(CapabilityError::Read("EPERM".into()));
            }
            let all = CapMask(u64::MAX >> 23);
            Ok(CapabilitySets {
                effective: all,
                inheritable: CapMask(0),
                permitted: all,
            })
        }

        fn prepare(&self, caller: &Caller) -> Result<Credentials, CapabilityError> {
            Ok(Credentials {
                pid: caller.pid,
                sets: self.capget(caller)?,
            })
        }

        fn capset(
            &self,
            new: &mut Credentials,
            reference: &CapabilitySets,
            sets: CapabilitySets,
        ) -> Result<(), CapabilityError> {
            if self.fail_capset {
                return Err(CapabilityError::Set("EINVAL".into()));
            }
            reference.permits(&sets)?;
            new.sets = sets;
            Ok(())
        }

        fn commit(&self, new: Credentials) -> Result<(), CapabilityError> {
            *self.committed.lock().unwrap() = Some(new.sets);
            Ok(())
        }

        fn abort(&self, _: Credentials) {
            *self.aborted.lock().unwrap() += 1;
        }
    }

    #[derive(Default)]
    struct CountingSpawner {
        calls: Mutex<Vec<String>>,
    }

    impl ProcessSpawner for CountingSpawner {
        fn spawn(&self, path: &str, _: &[String], _: &[String]) -> Result<(), HostError> {
            self.calls.lock().unwrap().push(path.to_string());
            Ok(())
        }
    }

    fn reporter(sink: Arc<MemorySink>) -> Reporter {
        Reporter::new(CategoryFilter::new(CategoryMask::EMPTY), sink)
    }

    #[test]
    fn test_restart_drops_sys_boot_and_spawns_init() {
        let trigger = RestartTrigger::new(true, "/sbin/init".into(), vec![]);
        let caps = FakeCaps::default();
        let spawner = CountingSpawner::default();
        let sink = Arc::new(MemorySink::new());
        let caller = Caller::new(1, "reboot");

        let outcome = trigger.on_reboot(&caller, 0x0123_4567, &caps, &spawner, &reporter(sink));
        assert_eq!(outcome, RestartOutcome::Restarted { spawned: true });

        let committed = caps.committed.lock().unwrap().unwrap();
        assert!(!committed.effective.has(CAP_SYS_BOOT));
        assert!(!committed.permitted.has(CAP_SYS_BOOT));
        assert!(committed.permitted.has(CAP_SYS_BOOT - 1));
        assert_eq!(*spawner.calls.lock().unwrap(), vec!["/sbin/init".to_string()]);
    }

    #[test]
    fn test_cad_commands_ignored() {
        let trigger = RestartTrigger::new(true, "/sbin/init".into(), vec![]);
        let caps = FakeCaps::default();
        let spawner = CountingSpawner::default();
        let r = reporter(Arc::new(MemorySink::new()));
        let caller = Caller::new(1, "init");

        for cmd in [REBOOT_CMD_CAD_ON, REBOOT_CMD_CAD_OFF] {
            assert_eq!(
                trigger.on_reboot(&caller, cmd, &caps, &spawner, &r),
                RestartOutcome::Ignored
            );
        }
        assert!(spawner.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_capset_failure_aborts_credentials() {
        let trigger = RestartTrigger::new(true, "/sbin/init".into(), vec![]);
        let caps = FakeCaps {
            fail_capset: true,
            ..Default::default()
        };
        let spawner = CountingSpawner::default();
        let sink = Arc::new(MemorySink::new());
        let caller = Caller::new(1, "reboot");

        let outcome = trigger.on_reboot(&caller, 0x0123_4567, &caps, &spawner, &reporter(sink.clone()));
        assert!(matches!(outcome, RestartOutcome::Aborted(CapabilityError::Set(_))));
        assert_eq!(*caps.aborted.lock().unwrap(), 1);
        assert!(caps.committed.lock().unwrap().is_none());
        assert!(spawner.calls.lock().unwrap().is_empty());
        assert_eq!(sink.messages(Severity::Warning).len(), 1);
    }

    #[test]
    fn test_disabled_does_nothing() {
        let trigger = RestartTrigger::new(false, "/sbin/init".into(), vec![]);
        let caps = FakeCaps::default();
        let spawner = CountingSpawner::default();
        let r = reporter(Arc::new(MemorySink::new()));
        assert_eq!(
            trigger.on_reboot(&Caller::new(1, "reboot"), 1, &caps, &spawner, &r),
            RestartOutcome::Disabled
        );
        trigger.set_enabled(true);
        assert!(trigger.is_enabled());
    }
}
