//! Partition scheme selection and clean-install planning

use core::convert::Infallible;
use core::fmt;
use core::str::FromStr;

use super::types::{FlashImage, FlashPlan};
use crate::device::DeviceProfile;
use crate::version::supports_new_8mb_partition_table;

/// Partition scheme chosen for a clean install
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PartitionScheme {
    /// 4MB layout
    #[default]
    Default,
    /// 8MB layout
    EightMb,
    /// 16MB layout
    SixteenMb,
}

impl PartitionScheme {
    /// Parse a scheme selector; anything unrecognized is [`PartitionScheme::Default`]
    pub fn parse(s: &str) -> Self {
        match s {
            "8MB" => Self::EightMb,
            "16MB" => Self::SixteenMb,
            _ => Self::Default,
        }
    }

    /// Selector string as used in telemetry and on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::EightMb => "8MB",
            Self::SixteenMb => "16MB",
        }
    }
}

impl FromStr for PartitionScheme {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for PartitionScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Byte offsets of the three clean-install images
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionOffsets {
    /// Application (factory) image
    pub app: u32,
    /// OTA loader image
    pub ota: u32,
    /// Filesystem image
    pub filesystem: u32,
}

/// Concrete partition table a plan is laid out with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartitionTable {
    /// 4MB table
    Default,
    /// 8MB table used before the companion UI needed more room
    EightMbLegacy,
    /// 8MB table for companion-UI devices on newer firmware
    EightMbNew,
    /// 16MB table
    SixteenMb,
}

impl PartitionTable {
    /// Pick the table for a scheme, device and firmware version
    ///
    /// The new 8MB table is used only when the device has the companion UI
    /// and the firmware version supports it; otherwise 8MB stays legacy.
    pub fn select(scheme: PartitionScheme, device: &DeviceProfile, firmware_version: &str) -> Self {
        match scheme {
            PartitionScheme::Default => Self::Default,
            PartitionScheme::EightMb => {
                if device.has_mui && supports_new_8mb_partition_table(firmware_version) {
                    Self::EightMbNew
                } else {
                    Self::EightMbLegacy
                }
            }
            PartitionScheme::SixteenMb => Self::SixteenMb,
        }
    }

    /// Offsets of this table
    pub const fn offsets(self) -> PartitionOffsets {
        let (ota, filesystem) = match self {
            Self::Default => (0x260000, 0x300000),
            Self::EightMbLegacy => (0x340000, 0x670000),
            Self::EightMbNew => (0x5D0000, 0x670000),
            Self::SixteenMb => (0x650000, 0xC90000),
        };
        PartitionOffsets {
            app: 0x000000,
            ota,
            filesystem,
        }
    }

    /// Partition-table variant label reported with flash telemetry
    pub fn variant_label(self) -> &'static str {
        match self {
            Self::EightMbNew => "new-8mb",
            _ => "legacy",
        }
    }
}

/// Payloads of a clean install
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanImages {
    /// Application (factory) image
    pub app: Vec<u8>,
    /// OTA loader image
    pub ota: Vec<u8>,
    /// Filesystem image
    pub filesystem: Vec<u8>,
}

/// Lay out a clean install
///
/// Never fails: unknown schemes were already mapped to the default table by
/// [`PartitionScheme::parse`].
pub fn plan(
    scheme: PartitionScheme,
    device: &DeviceProfile,
    firmware_version: &str,
    images: PlanImages,
) -> FlashPlan {
    let table = PartitionTable::select(scheme, device, firmware_version);
    let offsets = table.offsets();

    log::debug!(
        "Partition scheme {}: has_mui={}, firmware={}, table={:?} (ota=0x{:X}, fs=0x{:X})",
        scheme,
        device.has_mui,
        firmware_version,
        table,
        offsets.ota,
        offsets.filesystem
    );

    FlashPlan::with_table(
        vec![
            FlashImage::new("app", offsets.app, images.app),
            FlashImage::new("ota", offsets.ota, images.ota),
            FlashImage::new("filesystem", offsets.filesystem, images.filesystem),
        ],
        table,
    )
}
