//! Target device description
//!
//! Profiles come from an external hardware catalog and are read-only here.
//! They are passed explicitly to every operation that depends on the target.

use serde::{Deserialize, Serialize};

/// Support level reported when the catalog does not provide one
pub const DEFAULT_SUPPORT_LEVEL: u8 = 3;

/// Hardware profile of the device being flashed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceProfile {
    /// PlatformIO build target, used in release file names (e.g. `tbeam`)
    pub platformio_target: String,
    /// Numeric hardware model identifier
    pub hw_model: u32,
    /// Hardware model slug (e.g. `TBEAM`)
    pub hw_model_slug: String,
    /// Chip architecture (e.g. `esp32`, `esp32-s3`)
    pub architecture: String,
    /// Catalog support level
    pub support_level: Option<u8>,
    /// Whether the device can run the on-device companion UI
    pub has_mui: bool,
}

impl DeviceProfile {
    /// Support level, falling back to [`DEFAULT_SUPPORT_LEVEL`]
    pub fn support_level_or_default(&self) -> u8 {
        self.support_level.unwrap_or(DEFAULT_SUPPORT_LEVEL)
    }

    /// Whether a PlatformIO target is known for this device
    pub fn has_target(&self) -> bool {
        !self.platformio_target.is_empty()
    }
}
