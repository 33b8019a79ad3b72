//! Emulated transport and port picker

use std::sync::Arc;

use meshflash_core::transport::{DisconnectHandler, Signal, Transport, TransportProvider};
use meshflash_core::TransportError;

use crate::device::EmulatedPort;

/// Transport to an [`EmulatedPort`]
pub struct EmulatedTransport {
    port: EmulatedPort,
    rts: bool,
}

impl EmulatedTransport {
    pub(crate) fn new(port: EmulatedPort) -> Self {
        Self { port, rts: false }
    }

    /// The device behind this transport
    pub fn port(&self) -> &EmulatedPort {
        &self.port
    }

    fn ensure_connected(&self) -> Result<(), TransportError> {
        if self.port.is_connected() {
            Ok(())
        } else {
            Err(TransportError::Disconnected)
        }
    }
}

impl Transport for EmulatedTransport {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let mut state = self.port.state();
        if !state.connected {
            return Err(TransportError::Disconnected);
        }
        let n = buf.len().min(state.rx.len());
        for (dst, src) in buf.iter_mut().zip(state.rx.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.ensure_connected()?;
        self.port.state().tx.extend_from_slice(data);
        Ok(())
    }

    async fn set_signal(&mut self, signal: Signal, level: bool) -> Result<(), TransportError> {
        self.ensure_connected()?;
        let mut state = self.port.state();
        state.signals.push((signal, level));

        // Releasing the enable line boots the application
        if signal == Signal::RequestToSend {
            if self.rts && !level {
                let boot_log = state.config.boot_log.clone();
                state.rx.extend(boot_log);
            }
            self.rts = level;
        }
        Ok(())
    }

    async fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), TransportError> {
        self.ensure_connected()?;
        self.port.state().baud_rate = baud_rate;
        Ok(())
    }

    async fn clear_input(&mut self) -> Result<(), TransportError> {
        self.ensure_connected()?;
        self.port.state().rx.clear();
        Ok(())
    }

    fn set_disconnect_handler(&mut self, handler: DisconnectHandler) {
        self.port.state().disconnect_handler = Some(Arc::from(handler));
    }
}

/// Port picker that always offers the same emulated device
pub struct EmulatedProvider {
    port: EmulatedPort,
}

impl EmulatedProvider {
    /// Offer `port`
    pub fn new(port: EmulatedPort) -> Self {
        Self { port }
    }
}

impl TransportProvider for EmulatedProvider {
    type Transport = EmulatedTransport;

    async fn request(&mut self) -> Result<EmulatedTransport, TransportError> {
        if self.port.state().faults.deny_port {
            return Err(TransportError::Unavailable("no port selected".into()));
        }
        log::debug!("Opened emulated port");
        Ok(self.port.transport())
    }
}
