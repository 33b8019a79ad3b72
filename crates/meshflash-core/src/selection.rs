//! Selection state
//!
//! Exactly one of an online release or a local file is selected at a time.
//! Changing the selection clears the install options that depend on it, with
//! one exception: the companion UI flag survives a selection change.

use std::path::Path;

use crate::device::DeviceProfile;
use crate::partition::PartitionScheme;
use crate::patterns::ANY_VERSION;
use crate::release::FirmwareArtifact;
use crate::telemetry::TelemetrySink;

/// Archive extension
pub const ARCHIVE_SUFFIX: &str = ".zip";
/// Suffix of a complete single-image factory binary
pub const FACTORY_SUFFIX: &str = ".factory.bin";

/// A user-supplied firmware file held in memory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalFile {
    /// File name without directories
    pub name: String,
    /// File contents
    pub contents: Vec<u8>,
}

impl LocalFile {
    /// Create a local file from a name and its contents
    pub fn new(name: impl Into<String>, contents: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            contents,
        }
    }

    /// Read a file from disk
    pub fn read(path: &Path) -> std::io::Result<Self> {
        let contents = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { name, contents })
    }

    /// Whether the file is an archive
    pub fn is_archive(&self) -> bool {
        self.name.ends_with(ARCHIVE_SUFFIX)
    }

    /// Whether the file is a single factory image
    pub fn is_single_image(&self) -> bool {
        self.name.ends_with(FACTORY_SUFFIX)
    }
}

/// What the user picked to flash
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    /// Nothing selected yet
    #[default]
    None,
    /// An online release
    Firmware(FirmwareArtifact),
    /// A local file
    File(LocalFile),
}

impl Selection {
    /// The selected release, if any
    pub fn firmware(&self) -> Option<&FirmwareArtifact> {
        match self {
            Selection::Firmware(f) => Some(f),
            _ => None,
        }
    }

    /// The selected local file, if any
    pub fn file(&self) -> Option<&LocalFile> {
        match self {
            Selection::File(f) => Some(f),
            _ => None,
        }
    }
}

/// Install options that depend on the current selection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallOptions {
    /// Erase and write all images instead of a single update image
    pub clean_install: bool,
    /// Bundle the web UI in the filesystem image
    pub bundle_web_ui: bool,
    /// Install the companion UI
    pub install_mui: bool,
    /// Install the e-ink HUD
    pub install_ink_hud: bool,
    /// Partition scheme for a clean install
    pub partition_scheme: Option<PartitionScheme>,
}

impl InstallOptions {
    /// Partition scheme to plan with
    pub fn scheme(&self) -> PartitionScheme {
        self.partition_scheme.unwrap_or_default()
    }
}

/// Current selection plus the state derived from it
#[derive(Debug, Clone)]
pub struct SelectionState {
    archive_base: String,
    selection: Selection,
    /// Install options for the next session
    pub options: InstallOptions,
    /// Whether the release notes of the current release were acknowledged
    pub has_seen_release_notes: bool,
    /// Whether preview releases are offered (kept for the life of the process)
    pub prerelease_unlocked: bool,
}

impl SelectionState {
    /// Create an empty selection; `archive_base` is where release archives live
    pub fn new(archive_base: impl Into<String>) -> Self {
        Self {
            archive_base: archive_base.into(),
            selection: Selection::None,
            options: InstallOptions::default(),
            has_seen_release_notes: false,
            prerelease_unlocked: false,
        }
    }

    /// Current selection
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Select an online release
    ///
    /// Reselecting the release that is already selected only refreshes its
    /// archive URL for `device`.
    pub fn select_firmware(
        &mut self,
        artifact: FirmwareArtifact,
        device: Option<&DeviceProfile>,
        telemetry: &dyn TelemetrySink,
    ) {
        let already_selected = self
            .selection
            .firmware()
            .is_some_and(|current| current.id == artifact.id);
        if already_selected {
            log::debug!("Release {} already selected", artifact.id);
            self.update_zip_url(device);
            return;
        }

        log::debug!("Selecting release {}", artifact.id);
        telemetry.set_context("firmware_version", &artifact.id);
        self.selection = Selection::Firmware(artifact);
        self.has_seen_release_notes = false;
        self.clear_state();
        self.update_zip_url(device);
    }

    /// Select a local file
    pub fn select_file(&mut self, file: LocalFile) {
        log::debug!("Selecting local file {}", file.name);
        self.selection = Selection::File(file);
        self.clear_state();
    }

    /// Point the selected release at the archive for the device's target
    ///
    /// Does nothing without a selected release or without a known target.
    pub fn update_zip_url(&mut self, device: Option<&DeviceProfile>) {
        let Selection::Firmware(artifact) = &self.selection else {
            return;
        };
        let Some(device) = device.filter(|d| d.has_target()) else {
            log::debug!("No device target, keeping archive URL of {}", artifact.id);
            return;
        };
        let zip_url = artifact.device_zip_url(&self.archive_base, &device.platformio_target);
        log::debug!("Archive URL for {}: {}", device.platformio_target, zip_url);
        self.selection = Selection::Firmware(artifact.with_zip_url(zip_url));
    }

    /// Reset the selection-dependent install options, keeping `install_mui`
    pub fn clear_state(&mut self) {
        self.options = InstallOptions {
            install_mui: self.options.install_mui,
            ..InstallOptions::default()
        };
    }

    /// Acknowledge the release notes
    pub fn continue_to_flash(&mut self) {
        self.has_seen_release_notes = true;
    }

    /// Whether an online release is selected
    pub fn has_online_firmware(&self) -> bool {
        self.selection.firmware().is_some_and(|f| !f.id.is_empty())
    }

    /// Whether a local file is selected
    pub fn has_local_file(&self) -> bool {
        self.selection.file().is_some_and(|f| !f.name.is_empty())
    }

    /// Whether the selected local file is an archive
    pub fn is_archive_file(&self) -> bool {
        self.selection.file().is_some_and(LocalFile::is_archive)
    }

    /// Whether the selected local file is a single factory image
    pub fn is_single_image_file(&self) -> bool {
        self.selection.file().is_some_and(LocalFile::is_single_image)
    }

    /// Version used in file-name patterns
    ///
    /// The release id without a leading `v`, or a wildcard when no release is
    /// selected.
    pub fn firmware_version(&self) -> String {
        match self.selection.firmware() {
            Some(f) if !f.id.is_empty() => f.id.strip_prefix('v').unwrap_or(&f.id).to_string(),
            _ => ANY_VERSION.to_string(),
        }
    }

    /// Whether a flash can be offered for the selected release
    pub fn can_show_flash(&self) -> bool {
        self.has_online_firmware()
    }

    /// Release id of the current selection, empty for local files
    pub fn release_id(&self) -> &str {
        self.selection.firmware().map(|f| f.id.as_str()).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{FlashEvent, NoopTelemetry};
    use std::sync::Mutex;

    const BASE: &str = "https://example.org/releases/download";

    #[derive(Default)]
    struct ContextRecorder(Mutex<Vec<(String, String)>>);

    impl TelemetrySink for ContextRecorder {
        fn set_context(&self, key: &str, value: &str) {
            self.0.lock().unwrap().push((key.into(), value.into()));
        }

        fn flash_completed(&self, _event: &FlashEvent) {}
    }

    fn device(target: &str) -> DeviceProfile {
        DeviceProfile {
            platformio_target: target.into(),
            ..DeviceProfile::default()
        }
    }

    fn all_options() -> InstallOptions {
        InstallOptions {
            clean_install: true,
            bundle_web_ui: true,
            install_mui: true,
            install_ink_hud: true,
            partition_scheme: Some(PartitionScheme::EightMb),
        }
    }

    #[test]
    fn test_firmware_then_file_clears_firmware() {
        let mut state = SelectionState::new(BASE);
        state.select_firmware(FirmwareArtifact::from_id("v2.8.0"), None, &NoopTelemetry);
        assert!(state.has_online_firmware());

        state.select_file(LocalFile::new("fw.bin", vec![1, 2, 3]));
        assert!(!state.has_online_firmware());
        assert!(state.has_local_file());
        assert_eq!(state.release_id(), "");
    }

    #[test]
    fn test_file_then_firmware_clears_file() {
        let mut state = SelectionState::new(BASE);
        state.select_file(LocalFile::new("fw.zip", vec![]));
        assert!(state.is_archive_file());

        state.select_firmware(FirmwareArtifact::from_id("v2.8.0"), None, &NoopTelemetry);
        assert!(!state.has_local_file());
        assert!(!state.is_archive_file());
        assert!(state.has_online_firmware());
    }

    #[test]
    fn test_reselect_preserves_only_mui_flag() {
        let mut state = SelectionState::new(BASE);
        state.select_firmware(FirmwareArtifact::from_id("v2.7.0"), None, &NoopTelemetry);
        state.options = all_options();

        state.select_firmware(FirmwareArtifact::from_id("v2.8.0"), None, &NoopTelemetry);
        assert_eq!(
            state.options,
            InstallOptions {
                install_mui: true,
                ..InstallOptions::default()
            }
        );
    }

    #[test]
    fn test_select_file_clears_options() {
        let mut state = SelectionState::new(BASE);
        state.options = all_options();
        state.options.install_mui = false;
        state.select_file(LocalFile::new("a.factory.bin", vec![]));
        assert_eq!(state.options, InstallOptions::default());
        assert!(state.is_single_image_file());
    }

    #[test]
    fn test_device_specific_zip_url() {
        let mut state = SelectionState::new(BASE);
        let target = device("heltec-v3");
        state.select_firmware(
            FirmwareArtifact::from_id("v2.8.0"),
            Some(&target),
            &NoopTelemetry,
        );
        assert_eq!(
            state.selection().firmware().unwrap().zip_url,
            "https://example.org/releases/download/v2.8.0/firmware-heltec-v3-v2.8.0.zip"
        );
    }

    #[test]
    fn test_zip_url_kept_without_target() {
        let mut state = SelectionState::new(BASE);
        let artifact = FirmwareArtifact::from_id("v2.8.0").with_zip_url("orig.zip".into());
        state.select_firmware(artifact, Some(&device("")), &NoopTelemetry);
        assert_eq!(state.selection().firmware().unwrap().zip_url, "orig.zip");
    }

    #[test]
    fn test_same_release_is_idempotent() {
        let telemetry = ContextRecorder::default();
        let mut state = SelectionState::new(BASE);
        state.select_firmware(FirmwareArtifact::from_id("v2.8.0"), None, &telemetry);
        state.continue_to_flash();
        state.options.clean_install = true;

        state.select_firmware(FirmwareArtifact::from_id("v2.8.0"), None, &telemetry);
        assert!(state.has_seen_release_notes);
        assert!(state.options.clean_install);
        assert_eq!(telemetry.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_telemetry_context() {
        let telemetry = ContextRecorder::default();
        let mut state = SelectionState::new(BASE);
        state.select_firmware(FirmwareArtifact::from_id("v2.8.0"), None, &telemetry);
        assert_eq!(
            telemetry.0.lock().unwrap().as_slice(),
            &[("firmware_version".to_string(), "v2.8.0".to_string())]
        );
    }

    #[test]
    fn test_release_notes_reset_on_new_release() {
        let mut state = SelectionState::new(BASE);
        state.select_firmware(FirmwareArtifact::from_id("v2.7.0"), None, &NoopTelemetry);
        state.continue_to_flash();
        assert!(state.has_seen_release_notes);
        state.select_firmware(FirmwareArtifact::from_id("v2.8.0"), None, &NoopTelemetry);
        assert!(!state.has_seen_release_notes);
    }

    #[test]
    fn test_firmware_version() {
        let mut state = SelectionState::new(BASE);
        assert_eq!(state.firmware_version(), ".+");
        assert!(!state.can_show_flash());

        state.select_firmware(FirmwareArtifact::from_id("v2.8.0.abc"), None, &NoopTelemetry);
        assert_eq!(state.firmware_version(), "2.8.0.abc");
        assert!(state.can_show_flash());

        state.select_firmware(FirmwareArtifact::from_id("tastic-v0.0.3"), None, &NoopTelemetry);
        assert_eq!(state.firmware_version(), "tastic-v0.0.3");
    }

    #[test]
    fn test_empty_names_are_not_selections() {
        let mut state = SelectionState::new(BASE);
        state.select_file(LocalFile::new("", vec![1]));
        assert!(!state.has_local_file());
        state.select_firmware(FirmwareArtifact::default(), None, &NoopTelemetry);
        assert!(!state.has_online_firmware());
    }
}
