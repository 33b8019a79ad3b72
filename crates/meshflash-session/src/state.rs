//! Session state and progress aggregation

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use meshflash_core::bootloader::ImageProgress;

/// Step of the session state machine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    /// No session, or the last one ended
    #[default]
    Idle,
    /// Waiting for a transport
    Connecting,
    /// Talking to the bootloader
    Identifying,
    /// Writing images
    Flashing,
    /// Pulsing the reset line
    Resetting,
    /// Forwarding serial output
    Monitoring,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Identifying => "identifying",
            Self::Flashing => "flashing",
            Self::Resetting => "resetting",
            Self::Monitoring => "monitoring",
        };
        f.write_str(name)
    }
}

/// Outcome of one progress report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressUpdate {
    /// The report referred to an image already passed and was dropped
    Stale,
    /// Progress within the plan
    Advanced,
    /// The last image is fully written
    Completed,
}

/// State of the current session
///
/// `connected` is shared with the transport's disconnect handler, which may
/// clear it at any time. Everything else is only changed by the session.
#[derive(Debug, Default)]
pub struct SessionState {
    connected: Arc<AtomicBool>,
    phase: SessionPhase,
    flashing: bool,
    percent_done: u8,
    current_image_index: usize,
    completed: bool,
}

/// Copy of the session state at one point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Current phase; [`SessionPhase::Idle`] once the device is gone
    pub phase: SessionPhase,
    /// Whether the transport is connected
    pub connected: bool,
    /// Whether images are being written
    pub flashing: bool,
    /// Progress of the current image, 0 to 100
    pub percent_done: u8,
    /// Index of the image being written
    pub current_image_index: usize,
}

impl SessionSnapshot {
    /// Progress as shown to the user (`"42%"`)
    pub fn percent_label(&self) -> String {
        format!("{}%", self.percent_done)
    }
}

impl SessionState {
    /// Flag the disconnect handler clears
    pub fn connected_flag(&self) -> Arc<AtomicBool> {
        self.connected.clone()
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub(crate) fn set_phase(&mut self, phase: SessionPhase) {
        log::debug!("Session phase: {} -> {}", self.phase, phase);
        self.phase = phase;
    }

    /// Start writing a new plan
    pub(crate) fn begin_flashing(&mut self) {
        self.flashing = true;
        self.percent_done = 0;
        self.current_image_index = 0;
        self.completed = false;
    }

    /// Fold one progress report into the state
    ///
    /// The image index never goes back and the percentage never drops within
    /// one image. The plan completes when `last_index` is fully written.
    pub(crate) fn record_progress(&mut self, progress: ImageProgress, last_index: usize) -> ProgressUpdate {
        if progress.image_index < self.current_image_index {
            log::trace!("Dropping stale progress for image {}", progress.image_index);
            return ProgressUpdate::Stale;
        }

        let percent = percent_of(progress.bytes_written, progress.bytes_total);
        if progress.image_index > self.current_image_index {
            self.current_image_index = progress.image_index;
            self.percent_done = percent;
        } else {
            self.percent_done = self.percent_done.max(percent);
        }

        let done = progress.bytes_written == progress.bytes_total;
        if done && progress.image_index == last_index && !self.completed {
            self.completed = true;
            self.flashing = false;
            return ProgressUpdate::Completed;
        }
        ProgressUpdate::Advanced
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> SessionSnapshot {
        let connected = self.connected.load(Ordering::SeqCst);
        let phase = match self.phase {
            SessionPhase::Idle | SessionPhase::Connecting => self.phase,
            _ if !connected => SessionPhase::Idle,
            phase => phase,
        };
        SessionSnapshot {
            phase,
            connected,
            flashing: self.flashing,
            percent_done: self.percent_done,
            current_image_index: self.current_image_index,
        }
    }
}

/// `round(written / total * 100)`, an empty image counts as done
fn percent_of(written: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let percent = (written as f64 / total as f64 * 100.0).round();
    percent.clamp(0.0, 100.0) as u8
}
