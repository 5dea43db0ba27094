//! Analyze-class caller filter
//!
//! Boot scripts and the kernel's usermode helper execute a steady stream of
//! uninteresting commands, as do `[ ... ]` test invocations. Those are kept
//! out of the analyze log.

use hookwatch_shared::Caller;

/// Callers whose commands are never analyzed
pub const SUPPRESSED_CALLERS: [&str; 5] = [
    "khelper",
    "rcS",
    "preInit.sh",
    "network.sh",
    "run_service.sh",
];

#[derive(Debug, Clone)]
pub struct AnalyzeFilter {
    suppressed: &'static [&'static str],
}

impl Default for AnalyzeFilter {
    fn default() -> Self {
        Self {
            suppressed: &SUPPRESSED_CALLERS,
        }
    }
}

impl AnalyzeFilter {
    /// Whether a command executed by `caller` with `argv` should be analyzed
    pub fn admits(&self, caller: &Caller, argv: &[String]) -> bool {
        if self.suppressed.contains(&caller.comm.as_str()) {
            return false;
        }
        !argv.first().is_some_and(|arg0| arg0.starts_with('['))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_suppressed_callers() {
        let filter = AnalyzeFilter::default();
        for name in SUPPRESSED_CALLERS {
            assert!(!filter.admits(&Caller::new(5, name), &argv(&["/bin/ls"])));
        }
    }

    #[test]
    fn test_bracket_commands_suppressed() {
        let filter = AnalyzeFilter::default();
        let caller = Caller::new(5, "httpd");
        assert!(!filter.admits(&caller, &argv(&["[", "-f", "/tmp/x", "]"])));
        assert!(filter.admits(&caller, &argv(&["/bin/sh", "-c", "ping"])));
    }

    #[test]
    fn test_empty_argv_admitted() {
        let filter = AnalyzeFilter::default();
        assert!(filter.admits(&Caller::new(5, "httpd"), &[]));
        assert!(filter.admits(&Caller::new(5, "httpd"), &argv(&[""])));
    }
}
