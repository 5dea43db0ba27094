//! Capability facility backed by the `caps` crate
//!
//! Sets can be read for any task, but only the current process can have its
//! own credentials replaced.

use caps::{CapSet, Capability, CapsHashSet};
use hookwatch_shared::Caller;
use tracing::debug;

use super::{CapMask, CapabilityError, CapabilityFacility, CapabilitySets, Credentials};

/// Capability facility for the running process
#[derive(Debug, Default, Clone, Copy)]
pub struct CapsFacility;

fn to_mask(set: &CapsHashSet) -> CapMask {
    CapMask(set.iter().fold(0u64, |acc, cap| acc | cap.bitmask()))
}

fn to_set(mask: CapMask) -> CapsHashSet {
    caps::all()
        .into_iter()
        .filter(|cap: &Capability| mask.has(cap.index()))
        .collect()
}

fn is_self(caller: &Caller) -> bool {
    caller.pid == 0 || caller.pid == std::process::id() as i32
}

impl CapabilityFacility for CapsFacility {
    fn capget(&self, caller: &Caller) -> Result<CapabilitySets, CapabilityError> {
        let tid = if is_self(caller) { None } else { Some(caller.pid) };
        let read = |set: CapSet| {
            caps::read(tid, set)
                .map(|s| to_mask(&s))
                .map_err(|e| CapabilityError::Read(e.to_string()))
        };

        Ok(CapabilitySets {
            effective: read(CapSet::Effective)?,
            inheritable: read(CapSet::Inheritable)?,
            permitted: read(CapSet::Permitted)?,
        })
    }

    fn prepare(&self, caller: &Caller) -> Result<Credentials, CapabilityError> {
        if !is_self(caller) {
            return Err(CapabilityError::ForeignTask(caller.pid));
        }
        let sets = self
            .capget(caller)
            .map_err(|e| CapabilityError::Prepare(e.to_string()))?;
        Ok(Credentials {
            pid: caller.pid,
            sets,
        })
    }

    fn capset(
        &self,
        new: &mut Credentials,
        reference: &CapabilitySets,
        sets: CapabilitySets,
    ) -> Result<(), CapabilityError> {
        reference.permits(&sets)?;
        new.sets = sets;
        Ok(())
    }

    fn commit(&self, new: Credentials) -> Result<(), CapabilityError> {
        // Effective must shrink before permitted or the kernel refuses the
        // intermediate state.
        let steps = [
            (CapSet::Effective, new.sets.effective),
            (CapSet::Inheritable, new.sets.inheritable),
            (CapSet::Permitted, new.sets.permitted),
        ];
        for (set, mask) in steps {
            caps::set(None, set, &to_set(mask))
                .map_err(|e| CapabilityError::Commit(format!("{:?}: {}", set, e)))?;
        }
        debug!(pid = new.pid, "committed credentials");
        Ok(())
    }
}
