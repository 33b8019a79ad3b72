//! Shared state of the emulated device

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use meshflash_core::transport::{Signal, DEFAULT_BAUD_RATE};

use crate::transport::EmulatedTransport;

/// Configuration for the emulated device
#[derive(Debug, Clone)]
pub struct EmulatorConfig {
    /// Chip name reported on identification
    pub chip_name: String,
    /// Flash size in bytes
    pub flash_size: usize,
    /// Bytes written between two progress reports
    pub block_size: usize,
    /// Serial output produced after each reset
    pub boot_log: Vec<u8>,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            chip_name: "ESP32-S3".into(),
            flash_size: 16 * 1024 * 1024,
            block_size: 0x400,
            boot_log: b"ESP-ROM:esp32s3-20210327\r\nBooting emulated device\r\n".to_vec(),
        }
    }
}

/// Failures to inject
#[derive(Debug, Clone, Default)]
pub struct Faults {
    /// The port request is denied
    pub deny_port: bool,
    /// The bootloader never answers
    pub fail_identify: bool,
    /// Writing the image with this index fails after its first block
    pub fail_write_image: Option<usize>,
}

/// One image as it was written to emulated flash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenImage {
    /// Start address
    pub address: u32,
    /// Bytes written
    pub len: usize,
}

pub(crate) struct DeviceState {
    pub(crate) config: EmulatorConfig,
    pub(crate) faults: Faults,
    pub(crate) flash: Vec<u8>,
    pub(crate) connected: bool,
    pub(crate) rx: VecDeque<u8>,
    pub(crate) tx: Vec<u8>,
    pub(crate) signals: Vec<(Signal, bool)>,
    pub(crate) baud_rate: u32,
    pub(crate) written: Vec<WrittenImage>,
    pub(crate) chip_erased: bool,
    pub(crate) disconnect_handler: Option<Arc<dyn Fn() + Send + Sync>>,
}

/// Handle to an emulated device
///
/// Clones share the same device. Tests keep one handle to inspect flash,
/// recorded signals and output while the session owns the transport.
#[derive(Clone)]
pub struct EmulatedPort {
    inner: Arc<Mutex<DeviceState>>,
}

impl EmulatedPort {
    /// Create a device with the given configuration
    pub fn new(config: EmulatorConfig) -> Self {
        Self::with_faults(config, Faults::default())
    }

    /// Create a device that fails as described by `faults`
    pub fn with_faults(config: EmulatorConfig, faults: Faults) -> Self {
        let flash = vec![0xFF; config.flash_size];
        Self {
            inner: Arc::new(Mutex::new(DeviceState {
                config,
                faults,
                flash,
                connected: true,
                rx: VecDeque::new(),
                tx: Vec::new(),
                signals: Vec::new(),
                baud_rate: DEFAULT_BAUD_RATE,
                written: Vec::new(),
                chip_erased: false,
                disconnect_handler: None,
            })),
        }
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, DeviceState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a transport to this device
    pub fn transport(&self) -> EmulatedTransport {
        EmulatedTransport::new(self.clone())
    }

    /// Queue serial output from the device
    pub fn push_output(&self, data: &[u8]) {
        self.state().rx.extend(data);
    }

    /// Unplug the device and fire the disconnect handler
    pub fn disconnect(&self) {
        let handler = {
            let mut state = self.state();
            state.connected = false;
            state.disconnect_handler.clone()
        };
        log::debug!("Emulated device disconnected");
        if let Some(handler) = handler {
            handler();
        }
    }

    /// Whether the device is still plugged in
    pub fn is_connected(&self) -> bool {
        self.state().connected
    }

    /// Control-line changes in order
    pub fn signals(&self) -> Vec<(Signal, bool)> {
        self.state().signals.clone()
    }

    /// Line speed the host last set
    pub fn baud_rate(&self) -> u32 {
        self.state().baud_rate
    }

    /// Bytes the host wrote to the device
    pub fn host_output(&self) -> Vec<u8> {
        self.state().tx.clone()
    }

    /// Images written so far, in order
    pub fn written_images(&self) -> Vec<WrittenImage> {
        self.state().written.clone()
    }

    /// Whether the whole chip was erased
    pub fn chip_erased(&self) -> bool {
        self.state().chip_erased
    }

    /// Copy of `len` bytes of flash at `address`
    pub fn read_flash(&self, address: u32, len: usize) -> Vec<u8> {
        let state = self.state();
        let start = (address as usize).min(state.flash.len());
        let end = start.saturating_add(len).min(state.flash.len());
        state.flash[start..end].to_vec()
    }
}
