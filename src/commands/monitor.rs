//! Monitor command

use std::error::Error;
use std::sync::Arc;

use indicatif::MultiProgress;
use meshflash_core::bootloader::BootloaderClient;
use meshflash_core::selection::Selection;
use meshflash_core::source::BinarySource;
use meshflash_core::transport::{Transport, TransportProvider};
use meshflash_core::FetchError;
use meshflash_dummy::{EmulatedBootloader, EmulatedPort, EmulatedProvider, EmulatorConfig};
use meshflash_esp::EspLoader;
use meshflash_serial::{SerialProvider, SerialTransport};
use meshflash_session::{FlashSession, SerialMonitor, SessionOutcome};

use super::terminal::TerminalSink;
use crate::cli::DUMMY_PORT;

/// Source for sessions that never fetch
struct NoSource;

impl BinarySource for NoSource {
    async fn fetch(&self, _pattern: &str, _selection: &Selection) -> Result<Vec<u8>, FetchError> {
        Err(FetchError::NoSourceAvailable)
    }
}

/// Forward serial output until Ctrl-C or until the port goes away
pub async fn watch<T: Transport>(monitor: SerialMonitor<T>) -> Result<(), Box<dyn Error>> {
    println!("Monitoring serial output, press Ctrl-C to stop");
    tokio::select! {
        e = monitor.run() => {
            log::info!("Serial port closed: {}", e);
            Ok(())
        }
        r = tokio::signal::ctrl_c() => {
            r?;
            println!();
            log::info!("Stopped monitoring");
            Ok(())
        }
    }
}

pub async fn run(port: Option<String>, baud_rate: u32) -> Result<(), Box<dyn Error>> {
    let sink = Arc::new(TerminalSink::new(MultiProgress::new()));

    if port.as_deref() == Some(DUMMY_PORT) {
        let provider = EmulatedProvider::new(EmulatedPort::new(EmulatorConfig::default()));
        let session: FlashSession<_, EmulatedBootloader, _> =
            FlashSession::new(provider, NoSource, sink, baud_rate);
        monitor(session).await
    } else {
        let provider = SerialProvider::new(port, baud_rate);
        let session: FlashSession<_, EspLoader<SerialTransport>, _> =
            FlashSession::new(provider, NoSource, sink, baud_rate);
        monitor(session).await
    }
}

async fn monitor<P, B, S>(mut session: FlashSession<P, B, S>) -> Result<(), Box<dyn Error>>
where
    P: TransportProvider,
    B: BootloaderClient<Transport = P::Transport>,
    S: BinarySource,
{
    match session.monitor_only().await {
        SessionOutcome::Monitoring(serial) => watch(serial).await,
        SessionOutcome::Aborted(_) => Err("Could not open the serial port".into()),
    }
}
