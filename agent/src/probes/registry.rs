//! Batch registration of the catalogue

use tracing::{debug, info, warn};

use super::{ProbeDescriptor, CATALOGUE};
use crate::host::ProbeHost;

/// Some descriptors could not be installed; the rest are live
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{failures} of {total} probes failed to register")]
pub struct RegistrationError {
    pub failures: usize,
    pub total: usize,
}

/// Owns the lifecycle of a descriptor table
pub struct ProbeRegistry {
    descriptors: &'static [ProbeDescriptor],
}

impl Default for ProbeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProbeRegistry {
    /// Registry over the full catalogue
    pub fn new() -> Self {
        Self::with_catalogue(&CATALOGUE)
    }

    pub fn with_catalogue(descriptors: &'static [ProbeDescriptor]) -> Self {
        Self { descriptors }
    }

    pub fn descriptors(&self) -> &'static [ProbeDescriptor] {
        self.descriptors
    }

    /// Install every descriptor. A failure is logged and counted; it never
    /// stops the remaining installs.
    pub fn register_all<H: ProbeHost + ?Sized>(&self, host: &mut H) -> Result<(), RegistrationError> {
        let mut failures = 0;

        for desc in self.descriptors {
            match host.install(desc.symbol, desc.entry, desc.exit) {
                Ok(()) => debug!(symbol = desc.symbol, ret = desc.exit.is_some(), "probe registered"),
                Err(e) => {
                    warn!("Failed to register probe {}: {}", desc.symbol, e);
                    failures += 1;
                }
            }
        }

        let total = self.descriptors.len();
        info!("Registered {} of {} probes", total - failures, total);

        if failures == 0 {
            Ok(())
        } else {
            Err(RegistrationError { failures, total })
        }
    }

    /// Remove every descriptor, installed or not
    pub fn unregister_all<H: ProbeHost + ?Sized>(&self, host: &mut H) {
        for desc in self.descriptors {
            host.remove(desc.symbol);
        }
        info!("Unregistered {} probes", self.descriptors.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::replay::ReplayHost;

    #[test]
    fn test_register_all_installs_catalogue() {
        let mut host = ReplayHost::new();
        let registry = ProbeRegistry::new();

        registry.register_all(&mut host).unwrap();
        assert_eq!(host.installed(), CATALOGUE.len());

        registry.unregister_all(&mut host);
        assert_eq!(host.installed(), 0);
        assert_eq!(host.remove_calls(), CATALOGUE.len());
    }

    #[test]
    fn test_second_registration_reports_duplicates() {
        let mut host = ReplayHost::new();
        let registry = ProbeRegistry::new();
        registry.register_all(&mut host).unwrap();

        let err = registry.register_all(&mut host).unwrap_err();
        assert_eq!(err.failures, CATALOGUE.len());
        assert_eq!(host.installed(), CATALOGUE.len());
    }

    #[test]
    fn test_partial_failure_counted() {
        let mut host = ReplayHost::new()
            .with_unresolved("br_add_if")
            .with_rejected("do_fork", -16);

        let err = ProbeRegistry::new().register_all(&mut host).unwrap_err();
        assert_eq!(
            err,
            RegistrationError {
                failures: 2,
                total: 21
            }
        );
        assert_eq!(host.install_calls(), 21);
        assert!(!host.is_installed("do_fork"));
        assert!(host.is_installed("do_exit"));
    }
}
