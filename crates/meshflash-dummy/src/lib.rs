//! meshflash-dummy - Emulated device for testing
//!
//! This crate provides an in-memory device that speaks just enough to stand
//! in for a real board: a transport with control lines and a disconnect
//! trigger, a bootloader client that writes into emulated flash, and sinks
//! that record what a session printed and reported. It's useful for tests
//! and for `--port dummy` without real hardware.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![allow(async_fn_in_trait)]

mod device;
mod loader;
mod recording;
mod transport;

pub use device::{EmulatedPort, EmulatorConfig, Faults, WrittenImage};
pub use loader::EmulatedBootloader;
pub use recording::{RecordingSink, RecordingTelemetry};
pub use transport::{EmulatedProvider, EmulatedTransport};
