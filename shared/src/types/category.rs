//! Event categories and the category mask
//!
//! Every probe in the catalogue is tagged with exactly one category. The
//! operator selects which categories are logged through a bitmask.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Class of an observed event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Network operations; e.g. bind, accept
    Network,
    /// System operations; e.g. reboot, mount, ioctl, execve
    System,
    /// Filesystem write operations; e.g. unlink, mknod
    FsWrite,
    /// Filesystem read operations; e.g. open, close
    FsRead,
    /// Process execution operations; e.g. mmap, fork
    Exec,
    /// Process execution checker; full argv/envp of executed commands
    Analyze,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Network,
        Category::System,
        Category::FsWrite,
        Category::FsRead,
        Category::Exec,
        Category::Analyze,
    ];

    /// Bit of this category inside a [`CategoryMask`]
    pub const fn bit(self) -> u32 {
        match self {
            Category::Network => 1 << 0,
            Category::System => 1 << 1,
            Category::FsWrite => 1 << 2,
            Category::FsRead => 1 << 3,
            Category::Exec => 1 << 4,
            Category::Analyze => 1 << 5,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Category::Network => "network",
            Category::System => "system",
            Category::FsWrite => "fs_write",
            Category::FsRead => "fs_read",
            Category::Exec => "exec",
            Category::Analyze => "analyze",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Category {
    type Err = MaskParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "network" | "net" => Ok(Category::Network),
            "system" | "sys" => Ok(Category::System),
            "fs_write" | "fs_w" => Ok(Category::FsWrite),
            "fs_read" | "fs_r" => Ok(Category::FsRead),
            "exec" => Ok(Category::Exec),
            "analyze" => Ok(Category::Analyze),
            other => Err(MaskParseError::UnknownCategory(other.to_string())),
        }
    }
}

/// Error returned when a category list cannot be parsed
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MaskParseError {
    #[error("unknown event category: {0}")]
    UnknownCategory(String),

    #[error("invalid numeric mask: {0}")]
    InvalidBits(String),
}

/// Set of enabled categories
///
/// Bits outside the defined categories are preserved but never match a
/// category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryMask(u32);

impl CategoryMask {
    pub const EMPTY: CategoryMask = CategoryMask(0);
    pub const ALL: CategoryMask = CategoryMask(0x3f);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, category: Category) -> bool {
        self.0 & category.bit() != 0
    }

    pub fn with(self, category: Category) -> Self {
        Self(self.0 | category.bit())
    }

    pub fn without(self, category: Category) -> Self {
        Self(self.0 & !category.bit())
    }

    /// Enabled categories in declaration order
    pub fn categories(self) -> impl Iterator<Item = Category> {
        Category::ALL.into_iter().filter(move |c| self.contains(*c))
    }
}

impl FromIterator<Category> for CategoryMask {
    fn from_iter<I: IntoIterator<Item = Category>>(iter: I) -> Self {
        iter.into_iter().fold(CategoryMask::EMPTY, CategoryMask::with)
    }
}

/// Parse a mask given either as numeric bits (`"3"`, `"0x21"`), as `"all"` /
/// `"none"`, or as a comma separated category list (`"network,system"`).
impl FromStr for CategoryMask {
    type Err = MaskParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_lowercase().as_str() {
            "" | "none" => return Ok(CategoryMask::EMPTY),
            "all" => return Ok(CategoryMask::ALL),
            _ => {}
        }

        if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            return u32::from_str_radix(hex, 16)
                .map(CategoryMask)
                .map_err(|_| MaskParseError::InvalidBits(s.to_string()));
        }

        if s.chars().all(|c| c.is_ascii_digit()) {
            return s
                .parse::<u32>()
                .map(CategoryMask)
                .map_err(|_| MaskParseError::InvalidBits(s.to_string()));
        }

        s.split(',')
            .filter(|part| !part.trim().is_empty())
            .map(str::parse::<Category>)
            .collect()
    }
}

impl fmt::Display for CategoryMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.categories().map(Category::name).collect();
        if names.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&names.join(","))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_match_levels() {
        assert_eq!(Category::Network.bit(), 0x01);
        assert_eq!(Category::System.bit(), 0x02);
        assert_eq!(Category::FsWrite.bit(), 0x04);
        assert_eq!(Category::FsRead.bit(), 0x08);
        assert_eq!(Category::Exec.bit(), 0x10);
        assert_eq!(Category::Analyze.bit(), 0x20);
    }

    #[test]
    fn test_parse_mask_forms() {
        assert_eq!("all".parse::<CategoryMask>().unwrap(), CategoryMask::ALL);
        assert_eq!("none".parse::<CategoryMask>().unwrap(), CategoryMask::EMPTY);
        assert_eq!("3".parse::<CategoryMask>().unwrap().bits(), 3);
        assert_eq!("0x21".parse::<CategoryMask>().unwrap().bits(), 0x21);

        let mask: CategoryMask = "network, fs-read".parse().unwrap();
        assert!(mask.contains(Category::Network));
        assert!(mask.contains(Category::FsRead));
        assert!(!mask.contains(Category::System));
    }

    #[test]
    fn test_parse_mask_rejects_unknown() {
        assert_eq!(
            "network,bogus".parse::<CategoryMask>(),
            Err(MaskParseError::UnknownCategory("bogus".to_string()))
        );
        assert!("0xzz".parse::<CategoryMask>().is_err());
    }

    #[test]
    fn test_undefined_bits_never_match() {
        let mask = CategoryMask::from_bits(1 << 12);
        assert!(Category::ALL.iter().all(|c| !mask.contains(*c)));
        assert_eq!(mask.to_string(), "none");
    }

    #[test]
    fn test_display_roundtrip() {
        let mask = CategoryMask::EMPTY
            .with(Category::Exec)
            .with(Category::Network);
        assert_eq!(mask.to_string(), "network,exec");
        assert_eq!(mask.to_string().parse::<CategoryMask>().unwrap(), mask);
        assert_eq!(mask.without(Category::Exec).to_string(), "network");
    }
}
