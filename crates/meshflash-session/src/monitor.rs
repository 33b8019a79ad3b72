//! Post-flash serial monitor

use std::time::Duration;

use meshflash_core::sink::SharedLogSink;
use meshflash_core::transport::Transport;
use meshflash_core::TransportError;

/// Delay between two reads
pub const POLL_INTERVAL: Duration = Duration::from_millis(5);

const READ_CHUNK: usize = 256;

/// Forwards serial output from the device to the log sink
///
/// The monitor owns the transport. It runs until the transport becomes
/// unreadable; callers that need to continue should race it against their
/// own shutdown signal or drop it.
pub struct SerialMonitor<T> {
    transport: T,
    log: SharedLogSink,
    decoder: Utf8Decoder,
    poll_interval: Duration,
}

impl<T: Transport> SerialMonitor<T> {
    /// Monitor `transport`, writing decoded text to `log`
    pub fn new(transport: T, log: SharedLogSink) -> Self {
        Self {
            transport,
            log,
            decoder: Utf8Decoder::default(),
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Change the delay between two reads
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Read once and forward whatever arrived
    pub async fn poll_once(&mut self) -> Result<usize, TransportError> {
        let mut buf = [0u8; READ_CHUNK];
        let n = self.transport.read(&mut buf).await?;
        if n > 0 {
            let text = self.decoder.decode(&buf[..n]);
            if !text.is_empty() {
                self.log.write(&text);
            }
        }
        Ok(n)
    }

    /// Forward output until the transport fails, returning that failure
    pub async fn run(mut self) -> TransportError {
        log::debug!("Monitoring serial output");
        loop {
            if let Err(e) = self.poll_once().await {
                let rest = self.decoder.flush();
                if !rest.is_empty() {
                    self.log.write(&rest);
                }
                log::debug!("Serial monitor stopped: {}", e);
                return e;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Stop monitoring and return the transport
    pub fn into_transport(self) -> T {
        self.transport
    }
}

/// Streaming UTF-8 decoder that holds back incomplete sequences
#[derive(Debug, Default)]
struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(s) => {
                    out.push_str(s);
                    self.pending.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                        None => {
                            // Incomplete sequence at the end, wait for more
                            self.pending.drain(..valid);
                            return out;
                        }
                    }
                }
            }
        }
    }

    fn flush(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}
