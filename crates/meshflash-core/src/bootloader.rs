//! Bootloader client interface
//!
//! The client owns the transport while it talks to the ROM bootloader and
//! gives it back afterwards so the session can monitor the device.

use crate::error::BootloaderError;
use crate::partition::FlashPlan;
use crate::sink::SharedLogSink;
use crate::transport::{Signal, Transport};

/// Everything a client needs to attach to a device
pub struct LoaderOptions<T> {
    /// Transport to the device
    pub transport: T,
    /// Serial speed for the session
    pub baud_rate: u32,
    /// Where to print bootloader output
    pub log: SharedLogSink,
}

/// Description of an identified chip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChipDescriptor {
    /// Chip family (e.g. `ESP32-S3`)
    pub name: String,
    /// Free-form details reported by the bootloader
    pub description: String,
}

/// One progress report from a flash write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageProgress {
    /// Index of the image in the plan
    pub image_index: usize,
    /// Bytes of this image written so far
    pub bytes_written: usize,
    /// Size of this image
    pub bytes_total: usize,
}

/// Protocol client for the device's ROM or flash bootloader
pub trait BootloaderClient: Sized {
    /// Transport type this client drives
    type Transport: Transport;

    /// Attach to a transport without talking to the device yet
    fn attach(options: LoaderOptions<Self::Transport>) -> Self;

    /// Put the device in bootloader mode and identify the chip
    async fn identify(&mut self) -> Result<ChipDescriptor, BootloaderError>;

    /// Write every image of the plan in order
    ///
    /// `on_progress` is invoked zero or more times per image. Images already
    /// written when an error occurs stay written.
    async fn write_flash(
        &mut self,
        plan: &FlashPlan,
        on_progress: &mut dyn FnMut(ImageProgress),
    ) -> Result<(), BootloaderError>;

    /// Drive a transport control line
    async fn set_signal(&mut self, signal: Signal, level: bool) -> Result<(), BootloaderError>;

    /// Detach and return the transport
    fn into_transport(self) -> Self::Transport;
}
