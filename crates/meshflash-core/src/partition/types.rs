//! Flash plan types

use crate::error::PlanError;

/// Offset of the application partition, where single-image updates go
pub const UPDATE_OFFSET: u32 = 0x10000;

/// One payload to be written at a flash address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashImage {
    /// Short label used in logs (`app`, `ota`, `filesystem`)
    pub name: String,
    /// Flash byte offset
    pub address: u32,
    /// Raw bytes, one unit per byte, written verbatim
    pub payload: Vec<u8>,
}

impl FlashImage {
    /// Create a new image
    pub fn new(name: impl Into<String>, address: u32, payload: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            address,
            payload,
        }
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Exclusive end address, computed without truncation
    pub fn end(&self) -> u64 {
        self.address as u64 + self.payload.len() as u64
    }

    /// Check if this image overlaps with another
    pub fn overlaps(&self, other: &FlashImage) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && (self.address as u64) < other.end()
            && (other.address as u64) < self.end()
    }
}

/// Flash-tool level options that travel with a plan
///
/// Size, mode and frequency are `None` to keep what the image header says.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashOptions {
    /// Erase the whole chip before writing
    pub erase_all: bool,
    /// Ask the bootloader client to compress payloads in transit
    pub compress: bool,
    /// Flash size override
    pub flash_size: Option<String>,
    /// Flash mode override
    pub flash_mode: Option<String>,
    /// Flash frequency override
    pub flash_freq: Option<String>,
}

impl FlashOptions {
    /// Options for a single-image update
    pub fn update() -> Self {
        Self {
            erase_all: false,
            compress: true,
            flash_size: None,
            flash_mode: None,
            flash_freq: None,
        }
    }

    /// Options for a clean install
    pub fn clean_install() -> Self {
        Self {
            erase_all: true,
            ..Self::update()
        }
    }
}

/// An ordered set of images plus the options to write them with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashPlan {
    images: Vec<FlashImage>,
    options: FlashOptions,
    table: Option<super::PartitionTable>,
}

impl FlashPlan {
    /// Single-image update: the payload always goes to [`UPDATE_OFFSET`]
    pub fn update(payload: Vec<u8>) -> Self {
        Self {
            images: vec![FlashImage::new("app", UPDATE_OFFSET, payload)],
            options: FlashOptions::update(),
            table: None,
        }
    }

    /// Multi-image plan laid out by a partition table
    pub(crate) fn with_table(images: Vec<FlashImage>, table: super::PartitionTable) -> Self {
        Self {
            images,
            options: FlashOptions::clean_install(),
            table: Some(table),
        }
    }

    /// Images in write order
    pub fn images(&self) -> &[FlashImage] {
        &self.images
    }

    /// Write options
    pub fn options(&self) -> &FlashOptions {
        &self.options
    }

    /// Partition table that produced this plan, `None` for an update
    pub fn table(&self) -> Option<super::PartitionTable> {
        self.table
    }

    /// Number of images
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Whether the plan has no images
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Index of the image whose completion completes the plan
    pub fn last_index(&self) -> usize {
        self.images.len().saturating_sub(1)
    }

    /// Total payload bytes
    pub fn total_bytes(&self) -> usize {
        self.images.iter().map(FlashImage::len).sum()
    }

    /// Check that no two images overlap and that all fit in 32-bit space
    pub fn validate(&self) -> Result<(), PlanError> {
        for (index, image) in self.images.iter().enumerate() {
            if image.end() > u32::MAX as u64 + 1 {
                return Err(PlanError::ImageTooLarge {
                    index,
                    address: image.address,
                    len: image.len(),
                });
            }
        }

        let mut order: Vec<usize> = (0..self.images.len()).collect();
        order.sort_by_key(|&i| self.images[i].address);
        for pair in order.windows(2) {
            let (a, b) = (&self.images[pair[0]], &self.images[pair[1]]);
            if a.overlaps(b) {
                return Err(PlanError::OverlappingImages {
                    first: pair[0],
                    first_end: a.end() as u32,
                    second: pair[1],
                    second_start: b.address,
                });
            }
        }

        Ok(())
    }
}
