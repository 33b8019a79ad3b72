//! Serial port transport

use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use meshflash_core::transport::{DisconnectHandler, Signal, Transport, TransportProvider};
use meshflash_core::TransportError;
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};

use crate::ports::{available_ports, pick_port};

/// Upper bound for a blocking port operation
///
/// Reads only ask for bytes the driver already holds, so they return at once
/// and the async runtime is never parked on the port.
pub const PORT_TIMEOUT: Duration = Duration::from_millis(10);

/// Serial port transport
pub struct SerialTransport {
    name: String,
    port: Box<dyn SerialPort>,
    on_disconnect: Option<DisconnectHandler>,
    disconnected: bool,
}

impl SerialTransport {
    /// Open a serial port with the specified baud rate
    pub fn open(name: &str, baud_rate: u32) -> Result<Self, TransportError> {
        let port = serialport::new(name, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(PORT_TIMEOUT)
            .open()
            .map_err(|e| TransportError::Unavailable(format!("{}: {}", name, e)))?;

        log::info!("Opened serial port {} at {} baud", name, baud_rate);
        Ok(Self::from_port(name, port))
    }

    fn from_port(name: &str, port: Box<dyn SerialPort>) -> Self {
        Self {
            name: name.to_string(),
            port,
            on_disconnect: None,
            disconnected: false,
        }
    }

    /// Name the port was opened with
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fire the disconnect handler once and build the error to return
    fn fail(&mut self, reason: String) -> TransportError {
        if !self.disconnected {
            self.disconnected = true;
            log::debug!("Serial port {} failed: {}", self.name, reason);
            if let Some(handler) = &self.on_disconnect {
                handler();
            }
        }
        TransportError::Io(reason)
    }
}

impl Transport for SerialTransport {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        if self.disconnected {
            return Err(TransportError::Disconnected);
        }
        let available = match self.port.bytes_to_read() {
            Ok(n) => n as usize,
            Err(e) => return Err(self.fail(e.to_string())),
        };
        if available == 0 {
            return Ok(0);
        }
        let len = available.min(buf.len());
        match self.port.read(&mut buf[..len]) {
            Ok(n) => Ok(n),
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => Ok(0),
            Err(e) if e.kind() == ErrorKind::Interrupted => Ok(0),
            Err(e) => Err(self.fail(e.to_string())),
        }
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if self.disconnected {
            return Err(TransportError::Disconnected);
        }
        self.port
            .write_all(data)
            .and_then(|()| self.port.flush())
            .map_err(|e| self.fail(e.to_string()))
    }

    async fn set_signal(&mut self, signal: Signal, level: bool) -> Result<(), TransportError> {
        let result = match signal {
            Signal::RequestToSend => self.port.write_request_to_send(level),
            Signal::DataTerminalReady => self.port.write_data_terminal_ready(level),
        };
        result.map_err(|e| self.fail(e.to_string()))
    }

    async fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), TransportError> {
        log::debug!("Serial port {} now at {} baud", self.name, baud_rate);
        self.port
            .set_baud_rate(baud_rate)
            .map_err(|e| self.fail(e.to_string()))
    }

    async fn clear_input(&mut self) -> Result<(), TransportError> {
        self.port
            .clear(ClearBuffer::Input)
            .map_err(|e| self.fail(e.to_string()))
    }

    fn set_disconnect_handler(&mut self, handler: DisconnectHandler) {
        self.on_disconnect = Some(handler);
    }
}

/// Opens serial ports for flashing sessions
#[derive(Debug, Clone)]
pub struct SerialProvider {
    port: Option<String>,
    baud_rate: u32,
}

impl SerialProvider {
    /// Open `port`, or auto-detect one when `None`
    pub fn new(port: Option<String>, baud_rate: u32) -> Self {
        Self { port, baud_rate }
    }
}

impl TransportProvider for SerialProvider {
    type Transport = SerialTransport;

    async fn request(&mut self) -> Result<SerialTransport, TransportError> {
        let name = match &self.port {
            Some(name) => name.clone(),
            None => {
                let ports = available_ports()?;
                let port = pick_port(&ports)?;
                log::info!("Using serial port {} ({})", port.name, port.description);
                port.name.clone()
            }
        };
        SerialTransport::open(&name, self.baud_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Line {
        rx: VecDeque<u8>,
        baud_rate: u32,
        unplugged: bool,
    }

    /// Port whose `read` refuses to block
    #[derive(Clone, Default)]
    struct FakePort(Arc<Mutex<Line>>);

    impl FakePort {
        fn line(&self) -> std::sync::MutexGuard<'_, Line> {
            self.0.lock().unwrap()
        }

        fn check(&self) -> serialport::Result<()> {
            if self.line().unplugged {
                Err(serialport::Error::new(serialport::ErrorKind::NoDevice, "unplugged"))
            } else {
                Ok(())
            }
        }
    }

    impl io::Read for FakePort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let mut line = self.line();
            assert!(!line.rx.is_empty(), "read would block");
            let n = buf.len().min(line.rx.len());
            for (dst, src) in buf.iter_mut().zip(line.rx.drain(..n)) {
                *dst = src;
            }
            Ok(n)
        }
    }

    impl io::Write for FakePort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SerialPort for FakePort {
        fn name(&self) -> Option<String> {
            Some("fake".into())
        }
        fn baud_rate(&self) -> serialport::Result<u32> {
            Ok(self.line().baud_rate)
        }
        fn data_bits(&self) -> serialport::Result<DataBits> {
            Ok(DataBits::Eight)
        }
        fn flow_control(&self) -> serialport::Result<FlowControl> {
            Ok(FlowControl::None)
        }
        fn parity(&self) -> serialport::Result<Parity> {
            Ok(Parity::None)
        }
        fn stop_bits(&self) -> serialport::Result<StopBits> {
            Ok(StopBits::One)
        }
        fn timeout(&self) -> Duration {
            PORT_TIMEOUT
        }
        fn set_baud_rate(&mut self, baud_rate: u32) -> serialport::Result<()> {
            self.line().baud_rate = baud_rate;
            Ok(())
        }
        fn set_data_bits(&mut self, _: DataBits) -> serialport::Result<()> {
            Ok(())
        }
        fn set_flow_control(&mut self, _: FlowControl) -> serialport::Result<()> {
            Ok(())
        }
        fn set_parity(&mut self, _: Parity) -> serialport::Result<()> {
            Ok(())
        }
        fn set_stop_bits(&mut self, _: StopBits) -> serialport::Result<()> {
            Ok(())
        }
        fn set_timeout(&mut self, _: Duration) -> serialport::Result<()> {
            Ok(())
        }
        fn write_request_to_send(&mut self, _: bool) -> serialport::Result<()> {
            Ok(())
        }
        fn write_data_terminal_ready(&mut self, _: bool) -> serialport::Result<()> {
            Ok(())
        }
        fn read_clear_to_send(&mut self) -> serialport::Result<bool> {
            Ok(false)
        }
        fn read_data_set_ready(&mut self) -> serialport::Result<bool> {
            Ok(false)
        }
        fn read_ring_indicator(&mut self) -> serialport::Result<bool> {
            Ok(false)
        }
        fn read_carrier_detect(&mut self) -> serialport::Result<bool> {
            Ok(false)
        }
        fn bytes_to_read(&self) -> serialport::Result<u32> {
            self.check()?;
            Ok(self.line().rx.len() as u32)
        }
        fn bytes_to_write(&self) -> serialport::Result<u32> {
            Ok(0)
        }
        fn clear(&self, buffer_to_clear: ClearBuffer) -> serialport::Result<()> {
            if matches!(buffer_to_clear, ClearBuffer::Input | ClearBuffer::All) {
                self.line().rx.clear();
            }
            Ok(())
        }
        fn try_clone(&self) -> serialport::Result<Box<dyn SerialPort>> {
            Ok(Box::new(self.clone()))
        }
        fn set_break(&self) -> serialport::Result<()> {
            Ok(())
        }
        fn clear_break(&self) -> serialport::Result<()> {
            Ok(())
        }
    }

    fn transport() -> (SerialTransport, FakePort) {
        let port = FakePort::default();
        port.line().baud_rate = 115_200;
        (SerialTransport::from_port("fake", Box::new(port.clone())), port)
    }

    #[tokio::test]
    async fn test_read_only_takes_available_bytes() {
        let (mut transport, port) = transport();
        let mut buf = [0u8; 16];
        assert_eq!(transport.read(&mut buf).await.unwrap(), 0);

        port.line().rx.extend(b"boot");
        assert_eq!(transport.read(&mut buf).await.unwrap(), 4);
        assert_eq!(&buf[..4], b"boot");
        assert_eq!(transport.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_baud_rate_and_clear_input() {
        let (mut transport, port) = transport();
        transport.set_baud_rate(921_600).await.unwrap();
        assert_eq!(port.line().baud_rate, 921_600);

        port.line().rx.extend(b"garbage");
        transport.clear_input().await.unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(transport.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unplugged_port_disconnects_once() {
        let (mut transport, port) = transport();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        transport.set_disconnect_handler(Box::new(move || {
            assert!(!flag.swap(true, Ordering::SeqCst), "handler fired twice");
        }));

        port.line().unplugged = true;
        let mut buf = [0u8; 4];
        assert!(matches!(transport.read(&mut buf).await, Err(TransportError::Io(_))));
        assert!(fired.load(Ordering::SeqCst));
        assert!(matches!(
            transport.read(&mut buf).await,
            Err(TransportError::Disconnected)
        ));
    }
}
