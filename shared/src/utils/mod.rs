//! Utility functions and helpers

pub mod time;

/// Split a Linux `dev_t` (kernel internal encoding) into major and minor
pub fn dev_major_minor(dev: u32) -> (u32, u32) {
    const MINOR_BITS: u32 = 20;
    (dev >> MINOR_BITS, dev & ((1 << MINOR_BITS) - 1))
}

/// Whether a `KEY=VALUE` environment entry is well formed
pub fn is_env_entry(entry: &str) -> bool {
    matches!(entry.split_once('='), Some((key, _)) if !key.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dev_major_minor() {
        assert_eq!(dev_major_minor((4 << 20) | 64), (4, 64));
        assert_eq!(dev_major_minor(0), (0, 0));
    }

    #[test]
    fn test_is_env_entry() {
        assert!(is_env_entry("HOME=/"));
        assert!(is_env_entry("EMPTY="));
        assert!(!is_env_entry("=value"));
        assert!(!is_env_entry("HOME"));
    }
}
