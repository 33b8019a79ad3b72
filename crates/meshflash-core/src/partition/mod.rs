//! Flash memory layout planning
//!
//! A flashing session writes either one image (an update at the application
//! offset) or three images (application, OTA loader and filesystem) for a
//! clean install. Where the OTA and filesystem images land depends on the
//! partition scheme, and for 8MB devices also on whether the device runs the
//! companion UI and whether the firmware ships the newer partition table.
//!
//! ```ignore
//! let plan = plan(PartitionScheme::SixteenMb, &device, "2.8.0", images);
//! plan.validate()?;
//! ```

mod planner;
mod types;

pub use planner::*;
pub use types::*;
