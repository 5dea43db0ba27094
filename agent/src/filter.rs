//! Category filter
//!
//! Holds the operator-controlled category mask. Reads are relaxed: a handler
//! may observe a mask one update stale.

use std::sync::atomic::{AtomicU32, Ordering};

use hookwatch_shared::{Category, CategoryMask};

#[derive(Debug, Default)]
pub struct CategoryFilter {
    bits: AtomicU32,
}

impl CategoryFilter {
    pub fn new(mask: CategoryMask) -> Self {
        Self {
            bits: AtomicU32::new(mask.bits()),
        }
    }

    pub fn is_enabled(&self, category: Category) -> bool {
        self.mask().contains(category)
    }

    pub fn mask(&self) -> CategoryMask {
        CategoryMask::from_bits(self.bits.load(Ordering::Relaxed))
    }

    pub fn set_mask(&self, mask: CategoryMask) {
        self.bits.store(mask.bits(), Ordering::Relaxed);
    }

    pub fn enable(&self, category: Category) {
        self.bits.fetch_or(category.bit(), Ordering::Relaxed);
    }

    pub fn disable(&self, category: Category) {
        self.bits.fetch_and(!category.bit(), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_categories() {
        let filter = CategoryFilter::new(CategoryMask::EMPTY);
        assert!(!filter.is_enabled(Category::Network));

        filter.enable(Category::Network);
        filter.enable(Category::Exec);
        assert!(filter.is_enabled(Category::Network));
        assert!(filter.is_enabled(Category::Exec));

        filter.disable(Category::Network);
        assert!(!filter.is_enabled(Category::Network));
        assert_eq!(filter.mask().bits(), Category::Exec.bit());
    }

    #[test]
    fn test_set_mask_replaces() {
        let filter = CategoryFilter::new(CategoryMask::ALL);
        filter.set_mask(CategoryMask::EMPTY.with(Category::FsRead));
        assert!(filter.is_enabled(Category::FsRead));
        assert!(!filter.is_enabled(Category::System));
    }
}
