//! meshflash-fetch - Firmware binary acquisition
//!
//! This crate turns a file-name pattern plus the current selection into the
//! bytes of one flash image.
//!
//! # Resolution order
//!
//! 1. Static host: `<static-host-base>/<release-id>/<pattern>`
//! 2. Release archive: download the release zip and scan its entries
//! 3. Mirror: for archives that are not release archives, fetch the file
//!    from `<mirror-base>/<archive stem>/<pattern>`
//! 4. Local archive: scan the entries of a user-supplied zip
//! 5. Local raw file: the user-supplied file verbatim
//!
//! Tiers 1 to 3 apply to release selections, tiers 4 and 5 to local files.
//! Only the last applicable tier raises; earlier misses are logged.
//!
//! # Example
//!
//! ```no_run
//! use meshflash_core::release::FirmwareArtifact;
//! use meshflash_core::selection::Selection;
//! use meshflash_core::source::BinarySource;
//! use meshflash_fetch::{BinaryFetcher, ReqwestClient, ZipFormat};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = BinaryFetcher::new(
//!     ReqwestClient::new()?,
//!     ZipFormat,
//!     "https://roperscrossroads.github.io/tasticfw/firmware",
//!     "https://raw.githubusercontent.com/meshtastic/meshtastic.github.io/master",
//! );
//! let selection = Selection::Firmware(FirmwareArtifact::from_id("v2.8.0"));
//! let bytes = fetcher
//!     .fetch("firmware-heltec-v3-2.8.0-update.bin", &selection)
//!     .await?;
//! println!("{} bytes", bytes.len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![allow(async_fn_in_trait)]

pub mod archive;
pub mod catalog;
pub mod fetcher;
pub mod http;

pub use archive::{ArchiveFormat, ArchiveReader, EntryMatcher, ZipFormat};
pub use catalog::fetch_release_list;
pub use fetcher::BinaryFetcher;
pub use http::{HttpClient, HttpResponse, ReqwestClient};
