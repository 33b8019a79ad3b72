//! Release list fetching

use meshflash_core::release::{FirmwareArtifact, ReleaseDocument, ReleaseList};
use meshflash_core::FetchError;

use crate::http::HttpClient;

/// Fetch the release list
///
/// Never fails: on any error the list holds only the placeholder release and
/// `could_not_fetch` is set.
pub async fn fetch_release_list<H: HttpClient>(
    http: &H,
    url: &str,
    previews: Vec<FirmwareArtifact>,
) -> ReleaseList {
    match fetch_document(http, url).await {
        Ok(doc) => {
            let list = ReleaseList::from_document(doc, previews);
            log::debug!(
                "Fetched {} stable, {} alpha and {} pull request releases",
                list.stable.len(),
                list.alpha.len(),
                list.pull_requests.len()
            );
            list
        }
        Err(e) => {
            log::error!("Error fetching firmware list: {}", e);
            ReleaseList::fallback(previews)
        }
    }
}

async fn fetch_document<H: HttpClient>(http: &H, url: &str) -> Result<ReleaseDocument, FetchError> {
    let response = http.get(url).await?;
    if !response.is_success() {
        return Err(FetchError::HttpStatus {
            url: url.to_string(),
            status: response.status,
        });
    }
    serde_json::from_slice(&response.body).map_err(|e| FetchError::Http {
        url: url.to_string(),
        reason: format!("invalid release list: {}", e),
    })
}
