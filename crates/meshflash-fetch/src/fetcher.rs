//! Tiered binary fetcher

use meshflash_core::release::FirmwareArtifact;
use meshflash_core::selection::{LocalFile, Selection};
use meshflash_core::source::BinarySource;
use meshflash_core::FetchError;

use crate::archive::{extract_from, ArchiveFormat, ZipFormat};
use crate::http::HttpClient;

/// Path fragment that identifies a release-hosting archive URL
const RELEASE_ARCHIVE_MARKER: &str = "/releases/download/";

/// [`BinarySource`] that tries the static host, then the release archive or
/// its mirror, then the local file
pub struct BinaryFetcher<H, A = ZipFormat> {
    http: H,
    archive: A,
    static_host_base: String,
    mirror_base: String,
}

impl<H: HttpClient, A: ArchiveFormat> BinaryFetcher<H, A> {
    /// Create a fetcher
    pub fn new(
        http: H,
        archive: A,
        static_host_base: impl Into<String>,
        mirror_base: impl Into<String>,
    ) -> Self {
        Self {
            http,
            archive,
            static_host_base: static_host_base.into(),
            mirror_base: mirror_base.into(),
        }
    }

    /// The underlying HTTP client
    pub fn http(&self) -> &H {
        &self.http
    }

    /// Static host URL of one file of a release
    pub fn static_url(&self, release_id: &str, file_name: &str) -> String {
        format!(
            "{}/{}/{}",
            self.static_host_base.trim_end_matches('/'),
            release_id,
            file_name
        )
    }

    /// Mirror URL of one file of a non-release archive
    ///
    /// The mirror keeps each archive's files in a directory named after the
    /// archive without its `.zip` extension.
    pub fn mirror_url(&self, zip_url: &str, file_name: &str) -> String {
        let last = zip_url.rsplit('/').next().unwrap_or(zip_url);
        let stem = last.strip_suffix(".zip").unwrap_or(last);
        format!(
            "{}/{}/{}",
            self.mirror_base.trim_end_matches('/'),
            stem,
            file_name
        )
    }

    async fn fetch_release(
        &self,
        pattern: &str,
        firmware: &FirmwareArtifact,
    ) -> Result<Vec<u8>, FetchError> {
        if !firmware.id.is_empty() {
            if let Some(data) = self.fetch_static(&firmware.id, pattern).await {
                return Ok(data);
            }
        }

        if firmware.zip_url.is_empty() {
            return Err(FetchError::NoSourceAvailable);
        }

        if firmware.zip_url.contains(RELEASE_ARCHIVE_MARKER) {
            self.fetch_release_archive(&firmware.zip_url, pattern).await
        } else {
            self.fetch_mirror(&firmware.zip_url, pattern).await
        }
    }

    /// Tier 1; every failure is a miss
    async fn fetch_static(&self, release_id: &str, pattern: &str) -> Option<Vec<u8>> {
        let url = self.static_url(release_id, pattern);
        match self.http.get(&url).await {
            Ok(response) if response.is_success() => {
                log::debug!("Fetched {} bytes from {}", response.body.len(), url);
                Some(response.body)
            }
            Ok(response) => {
                log::debug!("Static host answered HTTP {} for {}", response.status, url);
                None
            }
            Err(e) => {
                log::warn!("Static host fetch failed, trying archive: {}", e);
                None
            }
        }
    }

    /// Tier 2
    async fn fetch_release_archive(&self, zip_url: &str, pattern: &str) -> Result<Vec<u8>, FetchError> {
        log::debug!("Downloading release archive {}", zip_url);
        let body = self.get_ok(zip_url).await?;
        log::debug!("Downloaded {} bytes, looking for {}", body.len(), pattern);
        extract_from(&self.archive, body, pattern)
    }

    /// Tier 3
    async fn fetch_mirror(&self, zip_url: &str, pattern: &str) -> Result<Vec<u8>, FetchError> {
        let url = self.mirror_url(zip_url, pattern);
        log::debug!("Fetching {} from mirror", url);
        self.get_ok(&url).await
    }

    async fn get_ok(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.http.get(url).await?;
        if !response.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: response.status,
            });
        }
        Ok(response.body)
    }

    /// Tiers 4 and 5
    fn fetch_local(&self, pattern: &str, file: &LocalFile) -> Result<Vec<u8>, FetchError> {
        if file.is_archive() {
            log::debug!("Looking for {} in {}", pattern, file.name);
            extract_from(&self.archive, file.contents.clone(), pattern)
        } else {
            log::debug!("Using {} verbatim", file.name);
            Ok(file.contents.clone())
        }
    }
}

impl<H: HttpClient, A: ArchiveFormat> BinarySource for BinaryFetcher<H, A> {
    async fn fetch(&self, pattern: &str, selection: &Selection) -> Result<Vec<u8>, FetchError> {
        match selection {
            Selection::Firmware(firmware) => self.fetch_release(pattern, firmware).await,
            Selection::File(file) if !file.name.is_empty() => self.fetch_local(pattern, file),
            _ => Err(FetchError::NoSourceAvailable),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::tests::zip_fixture;
    use crate::archive::ArchiveReader;
    use crate::http::HttpResponse;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    const STATIC: &str = "https://static.example/firmware";
    const MIRROR: &str = "https://mirror.example/master";
    const RELEASE_ZIP: &str =
        "https://github.com/org/fw/releases/download/v2.8.0/firmware-tbeam-v2.8.0.zip";

    #[derive(Default)]
    struct FakeHttp {
        routes: HashMap<String, HttpResponse>,
        broken: Vec<String>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeHttp {
        fn route(mut self, url: &str, status: u16, body: &[u8]) -> Self {
            self.routes.insert(
                url.to_string(),
                HttpResponse {
                    status,
                    body: body.to_vec(),
                },
            );
            self
        }

        fn broken(mut self, url: &str) -> Self {
            self.broken.push(url.to_string());
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl HttpClient for FakeHttp {
        async fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
            self.calls.lock().unwrap().push(url.to_string());
            if self.broken.iter().any(|u| u == url) {
                return Err(FetchError::Http {
                    url: url.to_string(),
                    reason: "connection refused".into(),
                });
            }
            Ok(self.routes.get(url).cloned().unwrap_or(HttpResponse {
                status: 404,
                body: Vec::new(),
            }))
        }
    }

    #[derive(Default, Clone)]
    struct CountingFormat {
        opened: Arc<AtomicUsize>,
        closed: Arc<AtomicUsize>,
    }

    struct CountingReader {
        inner: Box<dyn ArchiveReader>,
        closed: Arc<AtomicUsize>,
    }

    impl ArchiveReader for CountingReader {
        fn entries(&mut self) -> Result<Vec<String>, FetchError> {
            self.inner.entries()
        }

        fn read(&mut self, name: &str) -> Result<Vec<u8>, FetchError> {
            self.inner.read(name)
        }
    }

    impl Drop for CountingReader {
        fn drop(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl ArchiveFormat for CountingFormat {
        fn open(&self, bytes: Vec<u8>) -> Result<Box<dyn ArchiveReader>, FetchError> {
            let inner = ZipFormat.open(bytes)?;
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(CountingReader {
                inner,
                closed: self.closed.clone(),
            }))
        }
    }

    impl CountingFormat {
        fn counts(&self) -> (usize, usize) {
            (
                self.opened.load(Ordering::SeqCst),
                self.closed.load(Ordering::SeqCst),
            )
        }
    }

    fn fetcher(http: FakeHttp, format: CountingFormat) -> BinaryFetcher<FakeHttp, CountingFormat> {
        BinaryFetcher::new(http, format, STATIC, MIRROR)
    }

    fn release(zip_url: &str) -> Selection {
        Selection::Firmware(FirmwareArtifact::from_id("v2.8.0").with_zip_url(zip_url.to_string()))
    }

    fn release_zip() -> Vec<u8> {
        zip_fixture(&[
            ("firmware-tbeam-s3-core-2.8.0.bin", "s3".as_bytes()),
            ("firmware-tbeam-2.8.0-update.bin", "from archive".as_bytes()),
        ])
    }

    #[tokio::test]
    async fn test_static_host_short_circuits() {
        let static_url = format!("{}/v2.8.0/firmware-tbeam-2.8.0-update.bin", STATIC);
        let http = FakeHttp::default()
            .route(&static_url, 200, b"from static")
            .route(RELEASE_ZIP, 200, &release_zip());
        let format = CountingFormat::default();
        let fetcher = fetcher(http, format.clone());

        let data = fetcher
            .fetch("firmware-tbeam-2.8.0-update.bin", &release(RELEASE_ZIP))
            .await
            .unwrap();
        assert_eq!(data, b"from static");
        assert_eq!(fetcher.http().calls(), vec![static_url]);
        assert_eq!(format.counts(), (0, 0));
    }

    #[tokio::test]
    async fn test_static_miss_falls_through_to_archive() {
        let http = FakeHttp::default().route(RELEASE_ZIP, 200, &release_zip());
        let format = CountingFormat::default();
        let fetcher = fetcher(http, format.clone());

        let data = fetcher
            .fetch("firmware-tbeam-.+-update.bin", &release(RELEASE_ZIP))
            .await
            .unwrap();
        assert_eq!(data, b"from archive");
        assert_eq!(
            fetcher.http().calls(),
            vec![
                format!("{}/v2.8.0/firmware-tbeam-.+-update.bin", STATIC),
                RELEASE_ZIP.to_string()
            ]
        );
        assert_eq!(format.counts(), (1, 1));
    }

    #[tokio::test]
    async fn test_static_network_error_is_swallowed() {
        let static_url = format!("{}/v2.8.0/firmware-tbeam-2.8.0-update.bin", STATIC);
        let http = FakeHttp::default()
            .broken(&static_url)
            .route(RELEASE_ZIP, 200, &release_zip());
        let fetcher = fetcher(http, CountingFormat::default());

        let data = fetcher
            .fetch("firmware-tbeam-2.8.0-update.bin", &release(RELEASE_ZIP))
            .await
            .unwrap();
        assert_eq!(data, b"from archive");
    }

    #[tokio::test]
    async fn test_archive_miss_is_not_found_and_closes() {
        let http = FakeHttp::default().route(RELEASE_ZIP, 200, &release_zip());
        let format = CountingFormat::default();
        let fetcher = fetcher(http, format.clone());

        let err = fetcher
            .fetch("littlefs-tbeam-2.8.0.bin", &release(RELEASE_ZIP))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::NotFound { .. }));
        assert_eq!(format.counts(), (1, 1));
        // The mirror is not a fallback for release archives
        assert_eq!(fetcher.http().calls().len(), 2);
    }

    #[tokio::test]
    async fn test_archive_http_error() {
        let http = FakeHttp::default().route(RELEASE_ZIP, 500, b"");
        let format = CountingFormat::default();
        let fetcher = fetcher(http, format.clone());

        let err = fetcher
            .fetch("bleota.bin", &release(RELEASE_ZIP))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::HttpStatus { status: 500, .. }));
        assert_eq!(format.counts(), (0, 0));
    }

    #[tokio::test]
    async fn test_mirror_for_non_release_archive() {
        let zip_url = "https://example.org/builds/firmware-2.8.0.zip";
        let mirror_url = format!("{}/firmware-2.8.0/bleota.bin", MIRROR);
        let http = FakeHttp::default().route(&mirror_url, 200, b"ota");
        let format = CountingFormat::default();
        let fetcher = fetcher(http, format.clone());

        let data = fetcher.fetch("bleota.bin", &release(zip_url)).await.unwrap();
        assert_eq!(data, b"ota");
        assert_eq!(
            fetcher.http().calls(),
            vec![format!("{}/v2.8.0/bleota.bin", STATIC), mirror_url]
        );
        assert_eq!(format.counts(), (0, 0));
    }

    #[tokio::test]
    async fn test_release_without_archive() {
        let fetcher = fetcher(FakeHttp::default(), CountingFormat::default());
        let selection = Selection::Firmware(FirmwareArtifact::from_id("v2.8.0"));
        let err = fetcher.fetch("bleota.bin", &selection).await.unwrap_err();
        assert!(matches!(err, FetchError::NoSourceAvailable));
    }

    #[tokio::test]
    async fn test_local_archive() {
        let format = CountingFormat::default();
        let fetcher = fetcher(FakeHttp::default(), format.clone());
        let selection = Selection::File(LocalFile::new("firmware-tbeam-2.8.0.zip", release_zip()));

        let data = fetcher
            .fetch("firmware-tbeam-.+-update.bin", &selection)
            .await
            .unwrap();
        assert_eq!(data, b"from archive");
        assert!(fetcher.http().calls().is_empty());
        assert_eq!(format.counts(), (1, 1));

        let err = fetcher.fetch("bleota.bin", &selection).await.unwrap_err();
        assert!(matches!(err, FetchError::NotFound { .. }));
        assert_eq!(format.counts(), (2, 2));
    }

    #[tokio::test]
    async fn test_local_raw_file() {
        let fetcher = fetcher(FakeHttp::default(), CountingFormat::default());
        let payload: Vec<u8> = (0..=255).rev().collect();
        let selection = Selection::File(LocalFile::new("custom.factory.bin", payload.clone()));

        let data = fetcher.fetch("anything", &selection).await.unwrap();
        assert_eq!(data, payload);
        assert!(fetcher.http().calls().is_empty());
    }

    #[tokio::test]
    async fn test_nothing_selected() {
        let fetcher = fetcher(FakeHttp::default(), CountingFormat::default());
        let err = fetcher.fetch(".+", &Selection::None).await.unwrap_err();
        assert!(matches!(err, FetchError::NoSourceAvailable));
        assert!(fetcher.http().calls().is_empty());
    }

    #[test]
    fn test_urls() {
        let fetcher = BinaryFetcher::new(FakeHttp::default(), ZipFormat, "https://h/fw/", MIRROR);
        assert_eq!(fetcher.static_url("v1", "a.bin"), "https://h/fw/v1/a.bin");
        assert_eq!(
            fetcher.mirror_url("https://x/y/firmware-1.0.zip", "a.bin"),
            format!("{}/firmware-1.0/a.bin", MIRROR)
        );
    }
}
