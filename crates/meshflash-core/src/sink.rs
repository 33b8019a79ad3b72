//! User-visible session log
//!
//! This is the terminal the user watches during a session: bootloader chatter,
//! error lines and the device's serial output after reset. Diagnostics for
//! developers go through the `log` crate instead.

use std::fmt::Display;
use std::sync::Arc;

/// ANSI sequence that starts an error line (bright red)
pub const ERROR_MARKER_START: &str = "\x1b[38;5;9m";
/// ANSI sequence that ends an error line
pub const ERROR_MARKER_END: &str = "\x1b[0m";

/// Output side of a terminal widget
pub trait LogSink: Send + Sync {
    /// Clear the terminal
    fn clear(&self);

    /// Write a full line
    fn write_line(&self, text: &str);

    /// Write text without a line break
    fn write(&self, text: &str);
}

/// A log sink shared between the session controller and the bootloader client
pub type SharedLogSink = Arc<dyn LogSink>;

/// Wrap an error message in the error marker
pub fn error_line(error: &dyn Display) -> String {
    format!("{}{}{}", ERROR_MARKER_START, error, ERROR_MARKER_END)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_line() {
        let err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        assert_eq!(error_line(&err), "\x1b[38;5;9mboom\x1b[0m");
    }
}
