//! meshflash-session - Flash session orchestration
//!
//! [`FlashSession`] drives one session end to end: it requests a transport,
//! hands it to a bootloader client for identification, fetches every image,
//! writes the plan while folding progress reports into [`SessionState`],
//! pulses the reset line and returns a [`SerialMonitor`] that forwards the
//! device's output to the log sink.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use meshflash_core::device::DeviceProfile;
//! use meshflash_core::selection::{LocalFile, SelectionState};
//! use meshflash_core::sink::LogSink;
//! use meshflash_dummy::{EmulatedBootloader, EmulatedPort, EmulatedProvider, EmulatorConfig};
//! use meshflash_session::{FlashSession, SessionOutcome};
//! # use meshflash_core::source::BinarySource;
//! # use meshflash_core::selection::Selection;
//! # struct Source;
//! # impl BinarySource for Source {
//! #     async fn fetch(&self, _: &str, _: &Selection) -> Result<Vec<u8>, meshflash_core::FetchError> {
//! #         Ok(vec![0; 16])
//! #     }
//! # }
//! # struct Stdout;
//! # impl LogSink for Stdout {
//! #     fn clear(&self) {}
//! #     fn write_line(&self, text: &str) { println!("{}", text) }
//! #     fn write(&self, text: &str) { print!("{}", text) }
//! # }
//!
//! # async fn demo() {
//! let port = EmulatedPort::new(EmulatorConfig::default());
//! let mut session: FlashSession<_, EmulatedBootloader, _> =
//!     FlashSession::new(EmulatedProvider::new(port), Source, Arc::new(Stdout), 115_200);
//!
//! let mut selection = SelectionState::new("https://example.org/releases/download");
//! selection.select_file(LocalFile::new("firmware.bin", vec![0; 16]));
//!
//! if let SessionOutcome::Monitoring(monitor) = session
//!     .update_flash("firmware.bin", &selection, &DeviceProfile::default())
//!     .await
//! {
//!     monitor.run().await;
//! }
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod controller;
pub mod error;
mod monitor;
pub mod progress;
mod state;

pub use controller::{CleanInstallFiles, FlashSession, SessionOutcome, RESET_PULSE};
pub use error::{Result, SessionError};
pub use monitor::{SerialMonitor, POLL_INTERVAL};
pub use progress::{FlashProgress, NoProgress};
pub use state::{ProgressUpdate, SessionPhase, SessionSnapshot, SessionState};
