//! Emulated bootloader client

use meshflash_core::bootloader::{BootloaderClient, ChipDescriptor, ImageProgress, LoaderOptions};
use meshflash_core::partition::FlashPlan;
use meshflash_core::sink::SharedLogSink;
use meshflash_core::transport::{Signal, Transport};
use meshflash_core::{BootloaderError, TransportError};

use crate::device::WrittenImage;
use crate::transport::EmulatedTransport;

/// Bootloader client that writes into the emulated device's flash
pub struct EmulatedBootloader {
    transport: EmulatedTransport,
    baud_rate: u32,
    log: SharedLogSink,
}

impl BootloaderClient for EmulatedBootloader {
    type Transport = EmulatedTransport;

    fn attach(options: LoaderOptions<EmulatedTransport>) -> Self {
        Self {
            transport: options.transport,
            baud_rate: options.baud_rate,
            log: options.log,
        }
    }

    async fn identify(&mut self) -> Result<ChipDescriptor, BootloaderError> {
        self.log.clear();
        self.log.write_line(&format!("Connecting at {} baud...", self.baud_rate));
        let state = self.transport.port().state();
        if !state.connected {
            return Err(TransportError::Disconnected.into());
        }
        if state.faults.fail_identify {
            return Err(BootloaderError::SyncFailed(
                "no response from emulated bootloader".into(),
            ));
        }

        let chip = ChipDescriptor {
            name: state.config.chip_name.clone(),
            description: format!(
                "{} (emulated, {} MiB flash)",
                state.config.chip_name,
                state.config.flash_size / (1024 * 1024)
            ),
        };
        drop(state);

        self.log.write_line(&format!("Chip is {}", chip.description));
        Ok(chip)
    }

    async fn write_flash(
        &mut self,
        plan: &FlashPlan,
        on_progress: &mut dyn FnMut(ImageProgress),
    ) -> Result<(), BootloaderError> {
        let port = self.transport.port().clone();

        if plan.options().erase_all {
            self.log.write_line("Erasing flash (this may take a while)...");
            let mut state = port.state();
            state.flash.fill(0xFF);
            state.chip_erased = true;
        }

        for (index, image) in plan.images().iter().enumerate() {
            let total = image.len();
            let start = image.address as usize;
            {
                let state = port.state();
                if start.saturating_add(total) > state.flash.len() {
                    return Err(BootloaderError::Device(format!(
                        "image at 0x{:08X} does not fit in flash",
                        image.address
                    )));
                }
            }

            self.log.write_line(&format!(
                "Writing {} bytes at 0x{:08X}...",
                total, image.address
            ));

            if total == 0 {
                on_progress(ImageProgress {
                    image_index: index,
                    bytes_written: 0,
                    bytes_total: 0,
                });
            }

            let block_size = port.state().config.block_size.max(1);
            let mut written = 0;
            for (block_index, block) in image.payload.chunks(block_size).enumerate() {
                let fail_here = {
                    let mut state = port.state();
                    if !state.connected {
                        return Err(TransportError::Disconnected.into());
                    }
                    let fail = state.faults.fail_write_image == Some(index) && block_index == 1;
                    if !fail {
                        let offset = start + written;
                        state.flash[offset..offset + block.len()].copy_from_slice(block);
                    }
                    fail
                };
                if fail_here {
                    return Err(BootloaderError::Device(format!(
                        "write of image {} failed at 0x{:08X}",
                        index,
                        start + written
                    )));
                }

                written += block.len();
                on_progress(ImageProgress {
                    image_index: index,
                    bytes_written: written,
                    bytes_total: total,
                });
                // Let a disconnect or other queued work run between blocks
                tokio::task::yield_now().await;
            }

            port.state().written.push(WrittenImage {
                address: image.address,
                len: total,
            });
            self.log.write_line(&format!(
                "Wrote {} bytes at 0x{:08X}",
                total, image.address
            ));
        }

        Ok(())
    }

    async fn set_signal(&mut self, signal: Signal, level: bool) -> Result<(), BootloaderError> {
        Ok(self.transport.set_signal(signal, level).await?)
    }

    fn into_transport(self) -> EmulatedTransport {
        self.transport
    }
}
