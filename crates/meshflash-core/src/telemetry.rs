//! Best-effort flash telemetry
//!
//! Telemetry never influences a session: sinks take events by reference,
//! return nothing and swallow their own failures. The default sink drops
//! everything.

use serde::Serialize;

/// Structured event emitted once the last image of a plan is written
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlashEvent {
    /// Release id, empty for local files
    pub firmware_version: String,
    /// Numeric hardware model
    pub hw_model: u32,
    /// Hardware model slug
    pub hw_model_slug: String,
    /// PlatformIO target
    pub platformio_target: String,
    /// Chip architecture
    pub architecture: String,
    /// Whether the session was a clean install
    pub clean_install: bool,
    /// Catalog support level
    pub support_level: u8,
    /// Whether the device has the companion UI
    pub has_mui: bool,
    /// Partition scheme selector
    pub partition_scheme: String,
    /// Partition-table variant (`new-8mb` or `legacy`)
    pub partition_table_version: String,
    /// RFC 3339 timestamp
    pub timestamp: String,
}

/// Receiver of telemetry
pub trait TelemetrySink: Send + Sync {
    /// Record a context property that applies to later events
    fn set_context(&self, _key: &str, _value: &str) {}

    /// Record a completed flash
    fn flash_completed(&self, event: &FlashEvent);
}

/// Sink that drops every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn flash_completed(&self, _event: &FlashEvent) {}
}

/// Sink that writes events to the `log` facade as JSON under the `telemetry` target
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTelemetry;

impl TelemetrySink for LogTelemetry {
    fn set_context(&self, key: &str, value: &str) {
        log::debug!(target: "telemetry", "context {}={}", key, value);
    }

    fn flash_completed(&self, event: &FlashEvent) {
        match serde_json::to_string(event) {
            Ok(json) => log::info!(target: "telemetry", "firmware_flash {}", json),
            Err(e) => log::warn!(target: "telemetry", "could not encode flash event: {}", e),
        }
    }
}
