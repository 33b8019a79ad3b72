//! meshflash-esp - ESP32 ROM bootloader client
//!
//! [`EspLoader`] implements [`meshflash_core::bootloader::BootloaderClient`]
//! over any transport: it resets the chip into download mode with the
//! DTR/RTS lines, synchronizes with the mask ROM, detects the chip family
//! from its magic register, switches to the requested baud rate with
//! `CHANGE_BAUDRATE` and writes plans with `FLASH_BEGIN` / `FLASH_DATA` /
//! `FLASH_END`. The port is opened at the ROM's default rate and left there
//! after writing, so the firmware console can be read right away.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use meshflash_core::bootloader::{BootloaderClient, LoaderOptions};
//! use meshflash_core::partition::FlashPlan;
//! use meshflash_core::transport::{TransportProvider, DEFAULT_BAUD_RATE};
//! use meshflash_esp::EspLoader;
//! use meshflash_serial::SerialProvider;
//! # use meshflash_core::sink::LogSink;
//! # struct Stdout;
//! # impl LogSink for Stdout {
//! #     fn clear(&self) {}
//! #     fn write_line(&self, text: &str) { println!("{}", text) }
//! #     fn write(&self, text: &str) { print!("{}", text) }
//! # }
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = SerialProvider::new(Some("/dev/ttyUSB0".into()), DEFAULT_BAUD_RATE)
//!     .request()
//!     .await?;
//! let mut loader = EspLoader::attach(LoaderOptions {
//!     transport,
//!     baud_rate: 921_600,
//!     log: Arc::new(Stdout),
//! });
//! let chip = loader.identify().await?;
//! println!("Found {}", chip.name);
//!
//! let plan = FlashPlan::update(std::fs::read("firmware-update.bin")?);
//! loader.write_flash(&plan, &mut |_| {}).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod loader;
pub mod protocol;
pub mod slip;

pub use loader::{EspLoader, SYNC_ATTEMPTS};
pub use protocol::ChipFamily;
