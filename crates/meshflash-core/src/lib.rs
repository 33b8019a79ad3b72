//! meshflash-core - Core library for firmware flashing
//!
//! This crate holds everything about a flashing session that does not touch
//! the network or a serial port: the release and device model, the selection
//! state, the version comparator, the partition planner and the traits that
//! the I/O crates implement.
//!
//! # Collaborators
//!
//! The session is driven through a small set of seams:
//!
//! - [`transport::Transport`] / [`transport::TransportProvider`] - a duplex byte
//!   stream to the device with control lines and a disconnect notification
//! - [`bootloader::BootloaderClient`] - talks to the ROM bootloader over a transport
//! - [`source::BinarySource`] - turns a file pattern and a selection into bytes
//! - [`sink::LogSink`] / [`telemetry::TelemetrySink`] - user-visible output
//!
//! # Example
//!
//! ```
//! use meshflash_core::device::DeviceProfile;
//! use meshflash_core::partition::{plan, PartitionScheme, PlanImages};
//!
//! let device = DeviceProfile {
//!     has_mui: true,
//!     ..DeviceProfile::default()
//! };
//! let images = PlanImages {
//!     app: vec![0u8; 16],
//!     ota: vec![1u8; 16],
//!     filesystem: vec![2u8; 16],
//! };
//! let plan = plan(PartitionScheme::EightMb, &device, "2.8.0", images);
//! assert_eq!(plan.images()[1].address, 0x5D0000);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
// Transport, bootloader and source traits use async fn with static dispatch
#![allow(async_fn_in_trait)]

pub mod bootloader;
pub mod config;
pub mod device;
pub mod error;
pub mod partition;
pub mod patterns;
pub mod release;
pub mod selection;
pub mod sink;
pub mod source;
pub mod telemetry;
pub mod transport;
pub mod version;

pub use error::{BootloaderError, ConfigError, FetchError, PlanError, TransportError};
