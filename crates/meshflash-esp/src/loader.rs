//! ROM bootloader client

use std::collections::VecDeque;
use std::time::Duration;

use meshflash_core::bootloader::{BootloaderClient, ChipDescriptor, ImageProgress, LoaderOptions};
use meshflash_core::partition::FlashPlan;
use meshflash_core::sink::SharedLogSink;
use meshflash_core::transport::{Signal, Transport, DEFAULT_BAUD_RATE};
use meshflash_core::BootloaderError;
use tokio::time::Instant;

use crate::protocol::*;
use crate::slip;

/// Reset attempts before giving up on `SYNC`
pub const SYNC_ATTEMPTS: usize = 7;

/// How long the enable line is held low while entering the bootloader
const RESET_HOLD: Duration = Duration::from_millis(100);
/// How long IO0 is held low after releasing enable
const BOOT_HOLD: Duration = Duration::from_millis(50);
/// Time the ROM needs to switch its UART to a new rate
const BAUD_SETTLE: Duration = Duration::from_millis(50);

const READ_CHUNK: usize = 512;
/// Pause between reads while waiting for a response
const IDLE_POLL: Duration = Duration::from_millis(1);

/// Client for the ESP32 family ROM bootloader
///
/// Talks to the mask ROM directly; no flasher stub is uploaded, so payloads
/// are sent uncompressed in 1 KiB blocks.
pub struct EspLoader<T> {
    transport: T,
    baud_rate: u32,
    line_rate: u32,
    log: SharedLogSink,
    decoder: slip::Decoder,
    frames: VecDeque<Vec<u8>>,
    family: Option<ChipFamily>,
    sync_attempts: usize,
}

impl<T: Transport> EspLoader<T> {
    /// Change how many reset and `SYNC` rounds are tried
    pub fn with_sync_attempts(mut self, attempts: usize) -> Self {
        self.sync_attempts = attempts.max(1);
        self
    }

    /// The chip family, once identified
    pub fn family(&self) -> Option<ChipFamily> {
        self.family
    }

    /// Pull the chip into download mode with the classic DTR/RTS sequence
    ///
    /// RTS drives EN and DTR drives IO0 through the usual two-transistor
    /// circuit, both inverted.
    async fn enter_bootloader(&mut self) -> Result<(), BootloaderError> {
        log::debug!("Resetting into bootloader");
        self.transport.set_signal(Signal::DataTerminalReady, false).await?;
        self.transport.set_signal(Signal::RequestToSend, true).await?;
        tokio::time::sleep(RESET_HOLD).await;
        self.transport.set_signal(Signal::DataTerminalReady, true).await?;
        self.transport.set_signal(Signal::RequestToSend, false).await?;
        tokio::time::sleep(BOOT_HOLD).await;
        self.transport.set_signal(Signal::DataTerminalReady, false).await?;
        Ok(())
    }

    async fn sync(&mut self) -> Result<(), BootloaderError> {
        let mut last_error = String::from("no attempt made");
        for attempt in 1..=self.sync_attempts {
            self.enter_bootloader().await?;
            self.frames.clear();
            match self.command(ESP_SYNC, &sync_payload(), 0, SYNC_TIMEOUT).await {
                Ok(_) => {
                    log::debug!("Synchronized after {} attempt(s)", attempt);
                    return Ok(());
                }
                Err(BootloaderError::Transport(e)) => return Err(e.into()),
                Err(e) => {
                    log::debug!("Sync attempt {} failed: {}", attempt, e);
                    last_error = e.to_string();
                }
            }
        }
        Err(BootloaderError::SyncFailed(last_error))
    }

    /// Move the ROM and the host port to the session's baud rate
    async fn change_baud(&mut self, family: ChipFamily) -> Result<(), BootloaderError> {
        if self.baud_rate == self.line_rate {
            return Ok(());
        }
        if family == ChipFamily::Esp8266 {
            log::warn!(
                "ESP8266 ROM cannot change the baud rate, staying at {}",
                self.line_rate
            );
            return Ok(());
        }

        self.log
            .write_line(&format!("Changing baud rate to {}", self.baud_rate));
        self.command(
            ESP_CHANGE_BAUDRATE,
            &change_baudrate_payload(self.baud_rate),
            0,
            DEFAULT_TIMEOUT,
        )
        .await?;
        self.switch_line_rate(self.baud_rate).await
    }

    /// Set the host side of the line and drop whatever arrived at the old rate
    async fn switch_line_rate(&mut self, baud_rate: u32) -> Result<(), BootloaderError> {
        self.transport.set_baud_rate(baud_rate).await?;
        tokio::time::sleep(BAUD_SETTLE).await;
        self.transport.clear_input().await?;
        self.decoder = slip::Decoder::default();
        self.frames.clear();
        self.line_rate = baud_rate;
        Ok(())
    }

    async fn read_reg(&mut self, address: u32) -> Result<u32, BootloaderError> {
        let response = self
            .command(ESP_READ_REG, &read_reg_payload(address), 0, DEFAULT_TIMEOUT)
            .await?;
        Ok(response.value)
    }

    /// Send one command and wait for its response
    ///
    /// Responses to other opcodes (e.g. the extra replies the ROM sends to
    /// `SYNC`) are skipped.
    async fn command(
        &mut self,
        op: u8,
        data: &[u8],
        checksum: u32,
        timeout: Duration,
    ) -> Result<Response, BootloaderError> {
        let frame = slip::encode(&command_packet(op, data, checksum));
        self.transport.write(&frame).await?;

        let deadline = Instant::now() + timeout;
        loop {
            while let Some(packet) = self.frames.pop_front() {
                let response = match Response::parse(&packet) {
                    Ok(response) => response,
                    Err(e) => {
                        log::trace!("Ignoring frame: {}", e);
                        continue;
                    }
                };
                if response.op != op {
                    log::trace!("Skipping response to 0x{:02X}", response.op);
                    continue;
                }
                response.check_status()?;
                return Ok(response);
            }

            if Instant::now() >= deadline {
                return Err(BootloaderError::Timeout { command: op });
            }
            self.fill().await?;
        }
    }

    /// Read whatever arrived and decode it into frames
    async fn fill(&mut self) -> Result<(), BootloaderError> {
        let mut buf = [0u8; READ_CHUNK];
        let n = self.transport.read(&mut buf).await?;
        if n == 0 {
            tokio::time::sleep(IDLE_POLL).await;
            return Ok(());
        }
        self.frames.extend(self.decoder.extend(&buf[..n]));
        Ok(())
    }

    async fn write_image(
        &mut self,
        family: ChipFamily,
        index: usize,
        address: u32,
        payload: &[u8],
        on_progress: &mut dyn FnMut(ImageProgress),
    ) -> Result<(), BootloaderError> {
        let total = payload.len();
        if total == 0 {
            on_progress(ImageProgress {
                image_index: index,
                bytes_written: 0,
                bytes_total: 0,
            });
            return Ok(());
        }

        let blocks = total.div_ceil(FLASH_BLOCK_SIZE) as u32;
        let erase_size = total as u32;
        self.log.write_line(&format!(
            "Writing {} bytes at 0x{:08X}...",
            total, address
        ));
        self.command(
            ESP_FLASH_BEGIN,
            &flash_begin_payload(family, erase_size, blocks, address),
            0,
            erase_timeout(erase_size),
        )
        .await?;

        let mut written = 0;
        for (sequence, block) in payload.chunks(FLASH_BLOCK_SIZE).enumerate() {
            let (data, sum) = flash_data_payload(block, sequence as u32);
            self.command(ESP_FLASH_DATA, &data, sum, DEFAULT_TIMEOUT).await?;
            written += block.len();
            on_progress(ImageProgress {
                image_index: index,
                bytes_written: written,
                bytes_total: total,
            });
        }

        self.log.write_line(&format!(
            "Wrote {} bytes at 0x{:08X}",
            total, address
        ));
        Ok(())
    }

    /// Erase `0..end` with a data-less `FLASH_BEGIN`
    ///
    /// The ROM has no chip erase, so this clears everything up to the end of
    /// the last image instead.
    async fn erase_span(&mut self, family: ChipFamily, end: u32) -> Result<(), BootloaderError> {
        self.log.write_line(&format!(
            "Erasing flash 0x00000000-0x{:08X} (this may take a while)...",
            end
        ));
        self.command(
            ESP_FLASH_BEGIN,
            &flash_begin_payload(family, end, 0, 0),
            0,
            erase_timeout(end),
        )
        .await?;
        Ok(())
    }
}

impl<T: Transport> BootloaderClient for EspLoader<T> {
    type Transport = T;

    fn attach(options: LoaderOptions<T>) -> Self {
        Self {
            transport: options.transport,
            baud_rate: options.baud_rate,
            line_rate: DEFAULT_BAUD_RATE,
            log: options.log,
            decoder: slip::Decoder::default(),
            frames: VecDeque::new(),
            family: None,
            sync_attempts: SYNC_ATTEMPTS,
        }
    }

    async fn identify(&mut self) -> Result<ChipDescriptor, BootloaderError> {
        self.log.clear();
        if self.line_rate != DEFAULT_BAUD_RATE {
            self.switch_line_rate(DEFAULT_BAUD_RATE).await?;
        }
        self.log
            .write_line(&format!("Connecting at {} baud...", self.line_rate));
        self.sync().await?;

        let magic = self.read_reg(CHIP_DETECT_MAGIC_REG).await?;
        let family = ChipFamily::from_magic(magic).ok_or_else(|| {
            BootloaderError::Unsupported(format!("unknown chip (magic 0x{:08X})", magic))
        })?;
        self.family = Some(family);
        log::debug!("Chip magic 0x{:08X} is {}", magic, family);

        if family.needs_spi_attach() {
            self.command(ESP_SPI_ATTACH, &spi_attach_payload(), 0, DEFAULT_TIMEOUT)
                .await?;
        }
        self.change_baud(family).await?;

        self.log.write_line(&format!("Chip is {}", family));
        Ok(ChipDescriptor {
            name: family.name().to_string(),
            description: format!("{} (ROM bootloader, magic 0x{:08X})", family, magic),
        })
    }

    async fn write_flash(
        &mut self,
        plan: &FlashPlan,
        on_progress: &mut dyn FnMut(ImageProgress),
    ) -> Result<(), BootloaderError> {
        let family = self
            .family
            .ok_or_else(|| BootloaderError::Device("chip not identified".into()))?;

        let options = plan.options();
        if options.compress {
            log::debug!("ROM loader writes uncompressed data");
        }
        if options.flash_size.is_some() || options.flash_mode.is_some() || options.flash_freq.is_some() {
            log::warn!("Flash size, mode and frequency overrides are not applied by the ROM loader");
        }
        if options.erase_all {
            let end = plan
                .images()
                .iter()
                .map(|image| image.end())
                .max()
                .unwrap_or(0);
            let end = u32::try_from(end).map_err(|_| {
                BootloaderError::Device(format!("plan ends beyond 4 GiB (0x{:X})", end))
            })?;
            if end > 0 {
                self.erase_span(family, end).await?;
            }
        }

        for (index, image) in plan.images().iter().enumerate() {
            self.write_image(family, index, image.address, &image.payload, on_progress)
                .await?;
        }

        self.command(ESP_FLASH_END, &flash_end_payload(false), 0, DEFAULT_TIMEOUT)
            .await?;

        // The firmware console runs at the default rate
        if self.line_rate != DEFAULT_BAUD_RATE {
            self.switch_line_rate(DEFAULT_BAUD_RATE).await?;
        }
        Ok(())
    }

    async fn set_signal(&mut self, signal: Signal, level: bool) -> Result<(), BootloaderError> {
        self.transport.set_signal(signal, level).await?;
        Ok(())
    }

    fn into_transport(self) -> T {
        self.transport
    }
}
