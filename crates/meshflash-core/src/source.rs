//! Binary source interface

use crate::error::FetchError;
use crate::selection::Selection;

/// Resolves a file-name pattern plus the current selection into bytes
pub trait BinarySource {
    /// Fetch the payload matching `pattern`
    ///
    /// The returned bytes are written verbatim, one unit per byte.
    async fn fetch(&self, pattern: &str, selection: &Selection) -> Result<Vec<u8>, FetchError>;
}
