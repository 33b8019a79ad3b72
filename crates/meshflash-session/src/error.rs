//! Error types for flash sessions

use meshflash_core::{BootloaderError, FetchError, PlanError, TransportError};
use thiserror::Error;

/// Result type for session operations
pub type Result<T> = core::result::Result<T, SessionError>;

/// Reasons a flash session ends early
#[derive(Debug, Error)]
pub enum SessionError {
    /// The serial port request was denied or no port is present
    #[error("Serial port unavailable: {0}")]
    TransportUnavailable(#[source] TransportError),

    /// The bootloader handshake failed; nothing was written
    #[error("Failed to identify device: {0}")]
    DeviceIdentificationFailed(#[source] BootloaderError),

    /// An image could not be fetched; nothing was written
    #[error("{0}")]
    Fetch(#[from] FetchError),

    /// The plan would overwrite one image with another; nothing was written
    #[error("Invalid flash plan: {0}")]
    InvalidPlan(#[from] PlanError),

    /// Writing failed; images before `image` stay written
    #[error("Failed to write image {image}: {source}")]
    TransmissionFailed {
        /// Index of the image being written
        image: usize,
        /// Bootloader failure
        #[source]
        source: BootloaderError,
    },

    /// The reset pulse could not be sent
    #[error("Failed to reset device: {0}")]
    Reset(#[source] BootloaderError),
}
