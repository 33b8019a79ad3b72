//! meshflash-serial - Native serial port transport
//!
//! [`SerialProvider`] opens a serial port by name, or picks the only
//! attached USB-serial bridge known to sit in front of ESP32 boards.
//! [`SerialTransport`] implements [`meshflash_core::transport::Transport`]
//! over it. Reads only take the bytes the driver already buffered, so an
//! empty port reads as "nothing yet"; any read or write failure is a
//! disconnect.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod ports;
mod transport;

pub use ports::{available_ports, PortInfo, KNOWN_BRIDGES};
pub use transport::{SerialProvider, SerialTransport, PORT_TIMEOUT};
