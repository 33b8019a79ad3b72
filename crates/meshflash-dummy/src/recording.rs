//! Recording log and telemetry sinks

use std::sync::{Mutex, MutexGuard, PoisonError};

use meshflash_core::sink::{LogSink, ERROR_MARKER_START};
use meshflash_core::telemetry::{FlashEvent, TelemetrySink};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Log sink that keeps everything written to it
#[derive(Debug, Default)]
pub struct RecordingSink {
    lines: Mutex<Vec<String>>,
    text: Mutex<String>,
    clears: Mutex<usize>,
}

impl RecordingSink {
    /// Lines written with `write_line`
    pub fn lines(&self) -> Vec<String> {
        lock(&self.lines).clone()
    }

    /// Lines wrapped in the error marker
    pub fn error_lines(&self) -> Vec<String> {
        lock(&self.lines)
            .iter()
            .filter(|l| l.starts_with(ERROR_MARKER_START))
            .cloned()
            .collect()
    }

    /// Everything written, in order, with lines terminated by `\n`
    pub fn text(&self) -> String {
        lock(&self.text).clone()
    }

    /// Number of times the sink was cleared
    pub fn clear_count(&self) -> usize {
        *lock(&self.clears)
    }
}

impl LogSink for RecordingSink {
    fn clear(&self) {
        *lock(&self.clears) += 1;
    }

    fn write_line(&self, text: &str) {
        lock(&self.lines).push(text.to_string());
        let mut all = lock(&self.text);
        all.push_str(text);
        all.push('\n');
    }

    fn write(&self, text: &str) {
        lock(&self.text).push_str(text);
    }
}

/// Telemetry sink that keeps every event and context property
#[derive(Debug, Default)]
pub struct RecordingTelemetry {
    events: Mutex<Vec<FlashEvent>>,
    context: Mutex<Vec<(String, String)>>,
}

impl RecordingTelemetry {
    /// Flash events received
    pub fn events(&self) -> Vec<FlashEvent> {
        lock(&self.events).clone()
    }

    /// Context properties received
    pub fn context(&self) -> Vec<(String, String)> {
        lock(&self.context).clone()
    }
}

impl TelemetrySink for RecordingTelemetry {
    fn set_context(&self, key: &str, value: &str) {
        lock(&self.context).push((key.to_string(), value.to_string()));
    }

    fn flash_completed(&self, event: &FlashEvent) {
        lock(&self.events).push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshflash_core::sink::error_line;

    #[test]
    fn test_recording_sink() {
        let sink = RecordingSink::default();
        sink.clear();
        sink.write("boot ");
        sink.write_line("ok");
        sink.write_line(&error_line(&"failed"));

        assert_eq!(sink.clear_count(), 1);
        assert_eq!(sink.lines().len(), 2);
        assert_eq!(sink.error_lines(), vec!["\x1b[38;5;9mfailed\x1b[0m".to_string()]);
        assert!(sink.text().starts_with("boot ok\n"));
    }
}
