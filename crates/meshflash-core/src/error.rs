//! Error types for meshflash-core
//!
//! One enum per concern. Session-level failures are classified in
//! `meshflash-session`, which wraps the errors defined here.

use thiserror::Error;

/// Errors raised while turning a file pattern into a payload
#[derive(Debug, Error)]
pub enum FetchError {
    /// No archive entry matched the requested pattern
    #[error("Could not find file with pattern {pattern} in archive")]
    NotFound {
        /// The pattern that was searched for
        pattern: String,
    },

    /// Nothing is selected, or the selection cannot serve this request
    #[error("Cannot fetch binary content without a file or firmware selected")]
    NoSourceAvailable,

    /// The file pattern is not a valid regular expression
    #[error("Invalid file pattern {pattern}: {reason}")]
    InvalidPattern {
        /// The offending pattern
        pattern: String,
        /// Parser message
        reason: String,
    },

    /// The request failed before a response arrived
    #[error("HTTP request to {url} failed: {reason}")]
    Http {
        /// Requested URL
        url: String,
        /// Client error message
        reason: String,
    },

    /// The server answered with a non-success status
    #[error("HTTP {status} for {url}")]
    HttpStatus {
        /// Requested URL
        url: String,
        /// Status code
        status: u16,
    },

    /// The archive could not be opened or an entry could not be read
    #[error("Archive error: {0}")]
    Archive(String),

    /// Local I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from a byte transport to the device
#[derive(Debug, Error)]
pub enum TransportError {
    /// The port request was denied or no port is present
    #[error("Serial port unavailable: {0}")]
    Unavailable(String),

    /// The device went away
    #[error("Serial port disconnected")]
    Disconnected,

    /// The transport cannot perform this operation
    #[error("Operation not supported by transport: {0}")]
    Unsupported(&'static str),

    /// I/O error during communication
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        TransportError::Io(e.to_string())
    }
}

/// Errors reported by a bootloader client
#[derive(Debug, Error)]
pub enum BootloaderError {
    /// The bootloader never answered the synchronisation handshake
    #[error("Failed to connect to the bootloader: {0}")]
    SyncFailed(String),

    /// No response arrived in time
    #[error("Timed out waiting for response to command 0x{command:02X}")]
    Timeout {
        /// Command opcode
        command: u8,
    },

    /// A response could not be decoded
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The bootloader rejected a command
    #[error("Command 0x{command:02X} failed with error 0x{error:02X}")]
    CommandFailed {
        /// Command opcode
        command: u8,
        /// Error code from the status bytes
        error: u8,
    },

    /// The device does not support the request
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Device-side failure without a protocol error code
    #[error("Device error: {0}")]
    Device(String),

    /// Underlying transport failure
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Errors found when validating a flash plan
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// Two images would be written over the same bytes
    #[error("image {first} (0x{first_end:08X}) overlaps image {second} (0x{second_start:08X})")]
    OverlappingImages {
        /// Index of the earlier image
        first: usize,
        /// Exclusive end address of the earlier image
        first_end: u32,
        /// Index of the later image
        second: usize,
        /// Start address of the later image
        second_start: u32,
    },

    /// An image does not fit in the 32-bit address space
    #[error("image {index} at 0x{address:08X} with {len} bytes exceeds the address space")]
    ImageTooLarge {
        /// Index of the image
        index: usize,
        /// Start address
        address: u32,
        /// Payload length
        len: usize,
    },
}

/// Errors while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is malformed
    #[error("failed to parse config: {0}")]
    Parse(String),
}
