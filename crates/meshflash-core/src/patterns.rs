//! Release file-name patterns
//!
//! Fetches are requested by pattern, not by exact name: the version part is a
//! regular expression (`.+` when no release is selected) so the same pattern
//! can match inside any archive for the target.

/// Suffix that marks an update (OTA) image
pub const UPDATE_SUFFIX: &str = "update.bin";

/// Version placeholder when no online release is selected
pub const ANY_VERSION: &str = ".+";

/// Pattern for a single-image update
pub fn update_pattern(target: &str, version: &str) -> String {
    format!("firmware-{}-{}-{}", target, version, UPDATE_SUFFIX)
}

/// Pattern for the application (factory) image of a clean install
pub fn app_pattern(target: &str, version: &str) -> String {
    format!("firmware-{}-{}.bin", target, version)
}

/// Pattern for the OTA loader image of a clean install
pub fn ota_pattern(architecture: &str) -> String {
    match architecture {
        "esp32-s3" | "esp32s3" => "bleota-s3.bin".into(),
        "esp32-c3" | "esp32c3" => "bleota-c3.bin".into(),
        _ => "bleota.bin".into(),
    }
}

/// Pattern for the filesystem image of a clean install
pub fn filesystem_pattern(target: &str, version: &str) -> String {
    format!("littlefs-{}-{}.bin", target, version)
}

/// Whether a pattern or file name denotes an update image
pub fn is_update_name(name: &str) -> bool {
    name.ends_with(UPDATE_SUFFIX)
}
