//! Transport layer abstraction
//!
//! A transport is the duplex byte stream to the device plus its modem control
//! lines. The session owns exactly one transport at a time: it is handed to
//! the bootloader client for flashing and taken back for monitoring.

use crate::error::TransportError;

/// Line speed of the ESP ROM bootloader and of the firmware console
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Modem control lines used to reset the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// Request To Send, wired to the chip enable line on most boards
    RequestToSend,
    /// Data Terminal Ready, wired to the boot-mode strapping pin
    DataTerminalReady,
}

/// Callback fired when the device disappears
///
/// May be called from any thread at any time, possibly more than once.
pub type DisconnectHandler = Box<dyn Fn() + Send + Sync>;

/// Duplex byte stream to a device
pub trait Transport {
    /// Read available bytes into `buf`
    ///
    /// Returns `Ok(0)` when nothing arrived within the transport's short poll
    /// interval. An error means the transport is no longer readable.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Write all of `data`
    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Drive a control line
    async fn set_signal(&mut self, signal: Signal, level: bool) -> Result<(), TransportError>;

    /// Change the line speed of the open transport
    async fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), TransportError>;

    /// Drop any bytes waiting to be read
    async fn clear_input(&mut self) -> Result<(), TransportError>;

    /// Register the disconnect callback, replacing any previous one
    fn set_disconnect_handler(&mut self, handler: DisconnectHandler);
}

/// Source of transports, e.g. a port picker
pub trait TransportProvider {
    /// Transport handed out by this provider
    type Transport: Transport;

    /// Request a transport from the host environment
    async fn request(&mut self) -> Result<Self::Transport, TransportError>;
}
