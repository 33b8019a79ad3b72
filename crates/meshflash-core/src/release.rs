//! Firmware releases and the release list
//!
//! The release list document has the shape
//! `{ "releases": { "stable": [...], "alpha": [...] }, "pullRequests": [...] }`.
//! Only the newest few stable and alpha releases are offered.

use serde::{Deserialize, Serialize};

/// Number of stable and alpha releases kept from the release list
pub const RELEASES_PER_CHANNEL: usize = 4;

/// A published firmware release
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FirmwareArtifact {
    /// Release identifier, also the version string (e.g. `v2.8.0.abcdef0`)
    pub id: String,
    /// Human-readable title
    pub title: String,
    /// Release page
    pub page_url: String,
    /// Archive with all images of the release
    pub zip_url: String,
    /// Release notes (markdown)
    pub release_notes: String,
}

impl FirmwareArtifact {
    /// Create a release record that only carries an id
    pub fn from_id(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            id,
            ..Self::default()
        }
    }

    /// Copy of this release pointing at a device-specific archive
    pub fn with_zip_url(&self, zip_url: String) -> Self {
        Self {
            zip_url,
            ..self.clone()
        }
    }

    /// Device-specific archive URL:
    /// `<archive-base>/<id>/firmware-<target>-<id>.zip`
    pub fn device_zip_url(&self, archive_base: &str, platformio_target: &str) -> String {
        format!(
            "{}/{}/firmware-{}-{}.zip",
            archive_base.trim_end_matches('/'),
            self.id,
            platformio_target,
            self.id
        )
    }

    /// Release used when the release list cannot be fetched
    pub fn placeholder() -> Self {
        Self {
            id: "tastic-v0.0.3".into(),
            title: "Tastic Mesh Firmware v0.0.3".into(),
            page_url: "https://github.com/roperscrossroads/tasticfw/releases/tag/tastic-v0.0.3"
                .into(),
            zip_url: "https://github.com/roperscrossroads/tasticfw/releases/download/tastic-v0.0.3/firmware-tracker-t1000-e-tastic-v0.0.3.zip".into(),
            release_notes: "Fallback firmware".into(),
        }
    }
}

/// Release channels as published
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReleaseChannels {
    /// Stable releases, newest first
    pub stable: Vec<FirmwareArtifact>,
    /// Alpha releases, newest first
    pub alpha: Vec<FirmwareArtifact>,
}

/// The fetched release list document
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseDocument {
    /// Release channels
    pub releases: ReleaseChannels,
    /// Builds from open pull requests
    #[serde(rename = "pullRequests", default)]
    pub pull_requests: Option<Vec<FirmwareArtifact>>,
}

/// Releases offered for selection
#[derive(Debug, Clone, Default)]
pub struct ReleaseList {
    /// Newest stable releases
    pub stable: Vec<FirmwareArtifact>,
    /// Newest alpha releases
    pub alpha: Vec<FirmwareArtifact>,
    /// Preview builds, shown only when advanced features are unlocked
    pub previews: Vec<FirmwareArtifact>,
    /// Pull request builds
    pub pull_requests: Vec<FirmwareArtifact>,
    /// Set when the list could not be fetched and the placeholder is shown
    pub could_not_fetch: bool,
}

impl ReleaseList {
    /// Build the list from a fetched document
    pub fn from_document(doc: ReleaseDocument, previews: Vec<FirmwareArtifact>) -> Self {
        let ReleaseDocument {
            releases,
            pull_requests,
        } = doc;
        Self {
            stable: releases
                .stable
                .into_iter()
                .take(RELEASES_PER_CHANNEL)
                .collect(),
            alpha: releases
                .alpha
                .into_iter()
                .take(RELEASES_PER_CHANNEL)
                .collect(),
            previews,
            pull_requests: pull_requests.unwrap_or_default(),
            could_not_fetch: false,
        }
    }

    /// List holding only the placeholder release
    pub fn fallback(previews: Vec<FirmwareArtifact>) -> Self {
        Self {
            stable: vec![FirmwareArtifact::placeholder()],
            previews,
            could_not_fetch: true,
            ..Self::default()
        }
    }

    /// Find a release by id in every channel
    pub fn find(&self, id: &str) -> Option<&FirmwareArtifact> {
        self.stable
            .iter()
            .chain(&self.alpha)
            .chain(&self.previews)
            .chain(&self.pull_requests)
            .find(|r| r.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release(id: &str) -> FirmwareArtifact {
        FirmwareArtifact::from_id(id)
    }

    #[test]
    fn test_device_zip_url() {
        let fw = release("v2.8.0");
        assert_eq!(
            fw.device_zip_url("https://host/releases/download/", "tbeam"),
            "https://host/releases/download/v2.8.0/firmware-tbeam-v2.8.0.zip"
        );
    }

    #[test]
    fn test_from_document_truncates_channels() {
        let json = r#"{
            "releases": {
                "stable": [{"id": "s1"}, {"id": "s2"}, {"id": "s3"}, {"id": "s4"}, {"id": "s5"}],
                "alpha": [{"id": "a1"}]
            }
        }"#;
        let doc: ReleaseDocument = serde_json::from_str(json).unwrap();
        let list = ReleaseList::from_document(doc, vec![release("p1")]);
        assert_eq!(list.stable.len(), 4);
        assert_eq!(list.stable[3].id, "s4");
        assert_eq!(list.alpha.len(), 1);
        assert!(list.pull_requests.is_empty());
        assert!(!list.could_not_fetch);
        assert!(list.find("p1").is_some());
        assert!(list.find("s5").is_none());
    }

    #[test]
    fn test_fallback_has_placeholder() {
        let list = ReleaseList::fallback(Vec::new());
        assert!(list.could_not_fetch);
        assert_eq!(list.stable.len(), 1);
        assert_eq!(list.stable[0].id, "tastic-v0.0.3");
        assert_eq!(list.stable[0].release_notes, "Fallback firmware");
    }
}
