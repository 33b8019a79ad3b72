//! Progress reporting for flash sessions

use meshflash_core::bootloader::ChipDescriptor;
use meshflash_core::partition::FlashPlan;

/// Progress callback interface for flash sessions
pub trait FlashProgress {
    /// Called once the bootloader identified the chip
    fn identified(&mut self, chip: &ChipDescriptor);

    /// Called when all images are fetched and writing starts
    fn writing(&mut self, plan: &FlashPlan);

    /// Called for every progress report of the bootloader client
    fn image_progress(&mut self, image_index: usize, bytes_written: usize, bytes_total: usize);

    /// Called once the last image is fully written
    fn complete(&mut self);
}

/// A no-op progress reporter
pub struct NoProgress;

impl FlashProgress for NoProgress {
    fn identified(&mut self, _chip: &ChipDescriptor) {}
    fn writing(&mut self, _plan: &FlashPlan) {}
    fn image_progress(&mut self, _image_index: usize, _bytes_written: usize, _bytes_total: usize) {}
    fn complete(&mut self) {}
}
