//! Firmware version comparison
//!
//! Release identifiers are free-form: `v2.7.9.a1b2c3d`, `2.8.0-alpha`,
//! `tastic-v0.0.3`. Only the leading numeric triple is significant; any
//! leading marker and any pre-release or build suffix is ignored.

use core::fmt;

/// First firmware release that ships the new 8MB partition table
pub const NEW_8MB_PARTITION_MIN_VERSION: FirmwareVersion = FirmwareVersion::new(2, 7, 9);

/// A normalized `major.minor.patch` firmware version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FirmwareVersion {
    /// Major version
    pub major: u32,
    /// Minor version
    pub minor: u32,
    /// Patch version
    pub patch: u32,
}

impl FirmwareVersion {
    /// Create a version from its components
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a free-form version token
    ///
    /// Everything before the first digit is skipped. Up to three
    /// dot-separated numeric components are read; a component that carries a
    /// suffix (`0-alpha`) ends parsing after its digits. Missing components
    /// are zero. Returns `None` when the token has no digits at all or a
    /// component overflows.
    pub fn parse(token: &str) -> Option<Self> {
        let start = token.find(|c: char| c.is_ascii_digit())?;
        let mut parts = [0u32; 3];

        for (slot, part) in parts.iter_mut().zip(token[start..].split('.')) {
            let digits = part.bytes().take_while(u8::is_ascii_digit).count();
            if digits == 0 {
                break;
            }
            *slot = part[..digits].parse().ok()?;
            if digits != part.len() {
                break;
            }
        }

        Some(Self::new(parts[0], parts[1], parts[2]))
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Check whether a firmware version ships the new 8MB partition table
///
/// Unparseable or missing versions resolve to `false`, which keeps the
/// legacy layout.
pub fn supports_new_8mb_partition_table(version: &str) -> bool {
    FirmwareVersion::parse(version).is_some_and(|v| v >= NEW_8MB_PARTITION_MIN_VERSION)
}
