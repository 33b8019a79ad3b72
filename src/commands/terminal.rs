//! Terminal output: the session log sink and progress bars

use std::io::Write;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use meshflash_core::bootloader::ChipDescriptor;
use meshflash_core::partition::FlashPlan;
use meshflash_core::sink::LogSink;
use meshflash_session::FlashProgress;

/// Create a progress bar with custom phase message
fn create_progress_bar_with_phase(
    total: u64,
    phase: &str,
) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}, {{eta}}) {}",
                phase
            ))?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Session log written to stdout
///
/// Lines are printed above any active progress bars.
#[derive(Clone)]
pub struct TerminalSink {
    multi: MultiProgress,
}

impl TerminalSink {
    pub fn new(multi: MultiProgress) -> Self {
        Self { multi }
    }
}

impl LogSink for TerminalSink {
    fn clear(&self) {
        // Scrollback is kept
    }

    fn write_line(&self, text: &str) {
        self.multi.suspend(|| println!("{}", text));
    }

    fn write(&self, text: &str) {
        self.multi.suspend(|| {
            let mut stdout = std::io::stdout().lock();
            let _ = stdout.write_all(text.as_bytes());
            let _ = stdout.flush();
        });
    }
}

/// Progress reporter using one indicatif bar per image
pub struct IndicatifProgress {
    multi: MultiProgress,
    bars: Vec<ProgressBar>,
}

impl IndicatifProgress {
    pub fn new(multi: MultiProgress) -> Self {
        Self {
            multi,
            bars: Vec::new(),
        }
    }
}

impl FlashProgress for IndicatifProgress {
    fn identified(&mut self, chip: &ChipDescriptor) {
        log::debug!("Identified {}", chip.description);
    }

    fn writing(&mut self, plan: &FlashPlan) {
        self.bars = plan
            .images()
            .iter()
            .map(|image| {
                let total = image.len() as u64;
                let phase = format!("{} @ 0x{:06X}", image.name, image.address);
                self.multi.add(
                    create_progress_bar_with_phase(total, &phase)
                        .unwrap_or_else(|_| ProgressBar::new(total)),
                )
            })
            .collect();
    }

    fn image_progress(&mut self, image_index: usize, bytes_written: usize, bytes_total: usize) {
        let Some(pb) = self.bars.get(image_index) else {
            return;
        };
        pb.set_position(bytes_written as u64);
        if bytes_written == bytes_total && !pb.is_finished() {
            pb.finish();
        }
    }

    fn complete(&mut self) {
        for pb in self.bars.drain(..) {
            if !pb.is_finished() {
                pb.finish();
            }
        }
        let _ = self.multi.println("Done flashing!");
    }
}
