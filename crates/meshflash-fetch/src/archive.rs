//! Archive reading and entry matching
//!
//! Release archives hold every image of a build for one target. Entries are
//! found by regular expression, with two extra rules:
//!
//! - an update image pattern (ending in `update.bin`) only matches update
//!   entries, and any other pattern never matches an update entry
//! - a `firmware-tbeam-.` pattern never matches entries containing `s3`, so
//!   the plain T-Beam does not pick up T-Beam S3 images

use std::io::{Cursor, Read};

use meshflash_core::patterns::is_update_name;
use meshflash_core::FetchError;
use regex::Regex;
use zip::ZipArchive;

/// Pattern prefix that excludes S3 variants
const TBEAM_PREFIX: &str = "firmware-tbeam-.";

/// Largest entry worth reading: the size of the biggest supported flash
pub const MAX_ENTRY_SIZE: u64 = 16 * 1024 * 1024;

/// Random access to the entries of an opened archive
///
/// Dropping the reader closes the archive.
pub trait ArchiveReader {
    /// Names of all file entries in archive order
    fn entries(&mut self) -> Result<Vec<String>, FetchError>;

    /// Read one entry completely
    fn read(&mut self, name: &str) -> Result<Vec<u8>, FetchError>;
}

/// Opens archive bytes for reading
pub trait ArchiveFormat {
    /// Open an in-memory archive
    fn open(&self, bytes: Vec<u8>) -> Result<Box<dyn ArchiveReader>, FetchError>;
}

/// Zip archives
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipFormat;

impl ArchiveFormat for ZipFormat {
    fn open(&self, bytes: Vec<u8>) -> Result<Box<dyn ArchiveReader>, FetchError> {
        let archive =
            ZipArchive::new(Cursor::new(bytes)).map_err(|e| FetchError::Archive(e.to_string()))?;
        Ok(Box::new(ZipArchiveReader { archive }))
    }
}

struct ZipArchiveReader {
    archive: ZipArchive<Cursor<Vec<u8>>>,
}

impl ArchiveReader for ZipArchiveReader {
    fn entries(&mut self) -> Result<Vec<String>, FetchError> {
        let mut names = Vec::with_capacity(self.archive.len());
        for index in 0..self.archive.len() {
            let entry = self
                .archive
                .by_index(index)
                .map_err(|e| FetchError::Archive(e.to_string()))?;
            if !entry.is_dir() {
                names.push(entry.name().to_string());
            }
        }
        Ok(names)
    }

    fn read(&mut self, name: &str) -> Result<Vec<u8>, FetchError> {
        let mut entry = self
            .archive
            .by_name(name)
            .map_err(|e| FetchError::Archive(format!("{}: {}", name, e)))?;
        let declared = entry.size();
        if declared > MAX_ENTRY_SIZE {
            return Err(FetchError::Archive(format!(
                "{}: {} bytes does not fit in flash",
                name, declared
            )));
        }

        // The header size is only a hint; cap what is actually inflated
        let mut data = Vec::with_capacity(declared as usize);
        (&mut entry).take(MAX_ENTRY_SIZE + 1).read_to_end(&mut data)?;
        if data.len() as u64 > MAX_ENTRY_SIZE {
            return Err(FetchError::Archive(format!(
                "{}: entry inflates beyond {} bytes",
                name, MAX_ENTRY_SIZE
            )));
        }
        Ok(data)
    }
}

/// Compiled archive entry matcher for one file pattern
#[derive(Debug, Clone)]
pub struct EntryMatcher {
    pattern: String,
    regex: Regex,
    wants_update: bool,
    exclude_s3: bool,
}

impl EntryMatcher {
    /// Compile `pattern` as an unanchored regular expression
    pub fn new(pattern: &str) -> Result<Self, FetchError> {
        let regex = Regex::new(pattern).map_err(|e| FetchError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
            wants_update: is_update_name(pattern),
            exclude_s3: pattern.starts_with(TBEAM_PREFIX),
        })
    }

    /// The source pattern
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether `name` is the entry this pattern asks for
    pub fn matches(&self, name: &str) -> bool {
        if self.exclude_s3 && name.contains("s3") {
            return false;
        }
        self.regex.is_match(name) && is_update_name(name) == self.wants_update
    }
}

/// Read the first entry that matches `matcher`
pub fn extract(reader: &mut dyn ArchiveReader, matcher: &EntryMatcher) -> Result<Vec<u8>, FetchError> {
    let entries = reader.entries()?;
    log::debug!("Archive entries: {:?}", entries);

    let name = entries
        .iter()
        .find(|name| matcher.matches(name))
        .ok_or_else(|| FetchError::NotFound {
            pattern: matcher.pattern().to_string(),
        })?;

    log::debug!("Found {} for pattern {}", name, matcher.pattern());
    reader.read(name)
}

/// Open `bytes` with `format` and extract the entry matching `pattern`
///
/// The archive is closed before returning, on success and on failure.
pub fn extract_from(
    format: &dyn ArchiveFormat,
    bytes: Vec<u8>,
    pattern: &str,
) -> Result<Vec<u8>, FetchError> {
    let matcher = EntryMatcher::new(pattern)?;
    let mut reader = format.open(bytes)?;
    extract(reader.as_mut(), &matcher)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    pub(crate) fn zip_fixture(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            writer
                .start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_tbeam_excludes_s3() {
        let matcher = EntryMatcher::new("firmware-tbeam-.*").unwrap();
        assert!(!matcher.matches("firmware-tbeam-s3-1.0.zip"));
        assert!(matcher.matches("firmware-tbeam-1.0.zip"));
    }

    #[test]
    fn test_update_classification_must_agree() {
        let update = EntryMatcher::new("firmware-heltec-v3-.+-update.bin").unwrap();
        assert!(update.matches("firmware-heltec-v3-2.8.0-update.bin"));

        // Regex matches, classification does not
        let app = EntryMatcher::new("firmware-heltec-v3-.+").unwrap();
        assert!(!app.matches("firmware-heltec-v3-2.8.0-update.bin"));
        assert!(app.matches("firmware-heltec-v3-2.8.0.bin"));

        let loose = EntryMatcher::new("update.bin").unwrap();
        assert!(!loose.matches("update.bin.sig"));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = EntryMatcher::new("firmware-(").unwrap_err();
        assert!(matches!(err, FetchError::InvalidPattern { .. }));
    }

    #[test]
    fn test_extract_from_zip() {
        let bytes = zip_fixture(&[
            ("firmware-tbeam-s3-core-2.8.0.bin", "s3".as_bytes()),
            ("firmware-tbeam-2.8.0-update.bin", "update".as_bytes()),
            ("firmware-tbeam-2.8.0.bin", "factory".as_bytes()),
        ]);
        let data = extract_from(&ZipFormat, bytes.clone(), "firmware-tbeam-.+.bin").unwrap();
        assert_eq!(data, b"factory");

        let data = extract_from(&ZipFormat, bytes, "firmware-tbeam-.+-update.bin").unwrap();
        assert_eq!(data, b"update");
    }

    /// Overwrite the uncompressed size of the only entry in `bytes`
    fn forge_size(mut bytes: Vec<u8>, size: u32) -> Vec<u8> {
        let local = bytes.windows(4).position(|w| w == b"PK\x03\x04").unwrap();
        bytes[local + 22..local + 26].copy_from_slice(&size.to_le_bytes());
        let central = bytes.windows(4).position(|w| w == b"PK\x01\x02").unwrap();
        bytes[central + 24..central + 28].copy_from_slice(&size.to_le_bytes());
        bytes
    }

    #[test]
    fn test_oversized_entry_is_an_error() {
        let bytes = forge_size(
            zip_fixture(&[("firmware-x-2.8.0.bin", "tiny".as_bytes())]),
            0x7FFF_0000,
        );
        let mut reader = ZipFormat.open(bytes).unwrap();
        assert_eq!(reader.entries().unwrap(), vec!["firmware-x-2.8.0.bin"]);
        assert!(matches!(
            reader.read("firmware-x-2.8.0.bin"),
            Err(FetchError::Archive(_))
        ));
    }

    #[test]
    fn test_entry_up_to_flash_size_is_read() {
        let image = vec![0x5A; 0x4000];
        let bytes = zip_fixture(&[("littlefs-x-2.8.0.bin", &image)]);
        let mut reader = ZipFormat.open(bytes).unwrap();
        assert_eq!(reader.read("littlefs-x-2.8.0.bin").unwrap(), image);
    }

    #[test]
    fn test_extract_not_found() {
        let bytes = zip_fixture(&[("littlefs-heltec-v3-2.8.0.bin", "fs".as_bytes())]);
        let err = extract_from(&ZipFormat, bytes, "bleota.bin").unwrap_err();
        assert!(matches!(err, FetchError::NotFound { pattern } if pattern == "bleota.bin"));
    }

    #[test]
    fn test_not_an_archive() {
        let err = extract_from(&ZipFormat, b"not a zip".to_vec(), ".+").unwrap_err();
        assert!(matches!(err, FetchError::Archive(_)));
    }

    #[test]
    fn test_bytes_are_verbatim() {
        let payload: Vec<u8> = (0..=255).collect();
        let bytes = zip_fixture(&[("raw.bin", payload.as_slice())]);
        assert_eq!(extract_from(&ZipFormat, bytes, "raw").unwrap(), payload);
    }
}
