//! Extract command

use std::error::Error;
use std::path::{Path, PathBuf};

use meshflash_core::FetchError;
use meshflash_fetch::{ArchiveFormat, EntryMatcher, ZipFormat};

/// Find the entry matching `pattern` and return its name and contents
fn extract_entry(archive: Vec<u8>, pattern: &str) -> Result<(String, Vec<u8>), FetchError> {
    let matcher = EntryMatcher::new(pattern)?;
    let mut reader = ZipFormat.open(archive)?;
    let name = reader
        .entries()?
        .into_iter()
        .find(|name| matcher.matches(name))
        .ok_or_else(|| FetchError::NotFound {
            pattern: pattern.to_string(),
        })?;
    let data = reader.read(&name)?;
    Ok((name, data))
}

pub fn run(file: &Path, pattern: &str, output: Option<&Path>) -> Result<(), Box<dyn Error>> {
    let archive = std::fs::read(file)?;
    let (name, data) = extract_entry(archive, pattern)?;

    let output = match output {
        Some(path) => path.to_path_buf(),
        None => Path::new(&name)
            .file_name()
            .map(PathBuf::from)
            .ok_or("archive entry has no file name")?,
    };
    std::fs::write(&output, &data)?;
    println!("Extracted {} ({} bytes) to {:?}", name, data.len(), output);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    fn archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
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
    fn test_extract_entry() {
        let bytes = archive(&[
            ("firmware-heltec-v3-2.8.0-update.bin", "update".as_bytes()),
            ("firmware-heltec-v3-2.8.0.bin", "factory".as_bytes()),
        ]);
        let (name, data) = extract_entry(bytes, "firmware-heltec-v3-.+.bin").unwrap();
        assert_eq!(name, "firmware-heltec-v3-2.8.0.bin");
        assert_eq!(data, b"factory");
    }

    #[test]
    fn test_extract_missing_entry() {
        let bytes = archive(&[("littlefs-heltec-v3-2.8.0.bin", "fs".as_bytes())]);
        assert!(matches!(
            extract_entry(bytes, "bleota.bin"),
            Err(FetchError::NotFound { .. })
        ));
    }
}
