//! CLI command implementations
//!
//! ## Session commands
//!
//! `flash` and `monitor` open a transport, either a serial port driven by the
//! ESP ROM loader or the emulated device (`--port dummy`), and hand it to a
//! `FlashSession`. Output of the session goes to a [`terminal::TerminalSink`]
//! and progress to indicatif bars.
//!
//! ## Offline commands
//!
//! `releases`, `plan`, `extract` and `ports` never talk to a device.

pub mod extract;
pub mod flash;
pub mod monitor;
pub mod plan;
pub mod ports;
pub mod releases;
pub mod terminal;
