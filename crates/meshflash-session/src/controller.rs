//! Flash session controller
//!
//! A session walks `Idle -> Connecting -> Identifying -> Flashing ->
//! Resetting -> Monitoring`. Any failure before `Monitoring` is written to
//! the log sink once, marked as an error, and returns the session to `Idle`.
//! The `connected` and `flashing` flags are left as they were; an aborted
//! session needs a fresh connect.

use std::marker::PhantomData;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use meshflash_core::bootloader::{BootloaderClient, ImageProgress, LoaderOptions};
use meshflash_core::device::DeviceProfile;
use meshflash_core::partition::{plan, FlashPlan, PartitionTable, PlanImages};
use meshflash_core::selection::SelectionState;
use meshflash_core::sink::{error_line, SharedLogSink};
use meshflash_core::source::BinarySource;
use meshflash_core::telemetry::{FlashEvent, NoopTelemetry, TelemetrySink};
use meshflash_core::transport::{Signal, Transport, TransportProvider};
use meshflash_core::{BootloaderError, TransportError};

use crate::error::{Result, SessionError};
use crate::monitor::SerialMonitor;
use crate::progress::{FlashProgress, NoProgress};
use crate::state::{ProgressUpdate, SessionPhase, SessionSnapshot, SessionState};

/// How long the reset line is held high
pub const RESET_PULSE: Duration = Duration::from_millis(100);

/// File patterns of the three clean-install images
#[derive(Debug, Clone, Copy)]
pub struct CleanInstallFiles<'a> {
    /// Application (factory) image pattern
    pub app: &'a str,
    /// OTA loader image pattern
    pub ota: &'a str,
    /// Filesystem image pattern
    pub filesystem: &'a str,
}

/// How a session ended
pub enum SessionOutcome<T> {
    /// Flashing and reset succeeded; the device is being monitored
    Monitoring(SerialMonitor<T>),
    /// The session stopped early; the error was already written to the log sink
    Aborted(SessionError),
}

impl<T> SessionOutcome<T> {
    /// Convert to a `Result`
    pub fn into_result(self) -> Result<SerialMonitor<T>> {
        match self {
            Self::Monitoring(monitor) => Ok(monitor),
            Self::Aborted(e) => Err(e),
        }
    }
}

enum Job<'a> {
    Update(&'a str),
    CleanInstall(CleanInstallFiles<'a>),
}

impl Job<'_> {
    fn is_clean_install(&self) -> bool {
        matches!(self, Job::CleanInstall(_))
    }
}

/// Orchestrates one flashing session at a time
///
/// Every session operation takes `&mut self`, so a second session cannot
/// start while one is in progress.
pub struct FlashSession<P, B, S> {
    provider: P,
    source: S,
    log: SharedLogSink,
    telemetry: Arc<dyn TelemetrySink>,
    progress: Box<dyn FlashProgress + Send>,
    baud_rate: u32,
    state: SessionState,
    _client: PhantomData<fn() -> B>,
}

impl<P, B, S> FlashSession<P, B, S>
where
    P: TransportProvider,
    B: BootloaderClient<Transport = P::Transport>,
    S: BinarySource,
{
    /// Create an idle session controller
    pub fn new(provider: P, source: S, log: SharedLogSink, baud_rate: u32) -> Self {
        Self {
            provider,
            source,
            log,
            telemetry: Arc::new(NoopTelemetry),
            progress: Box::new(NoProgress),
            baud_rate,
            state: SessionState::default(),
            _client: PhantomData,
        }
    }

    /// Send flash-completion events to `telemetry`
    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Report progress to `progress`
    pub fn with_progress(mut self, progress: Box<dyn FlashProgress + Send>) -> Self {
        self.progress = progress;
        self
    }

    /// Copy of the session state
    pub fn state(&self) -> SessionSnapshot {
        self.state.snapshot()
    }

    /// The binary source
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Write a single update image at 0x10000, reset and start monitoring
    pub async fn update_flash(
        &mut self,
        pattern: &str,
        selection: &SelectionState,
        device: &DeviceProfile,
    ) -> SessionOutcome<P::Transport> {
        self.run(Job::Update(pattern), selection, device).await
    }

    /// Erase the chip, write app, OTA and filesystem images, reset and start
    /// monitoring
    pub async fn clean_install_flash(
        &mut self,
        files: CleanInstallFiles<'_>,
        selection: &SelectionState,
        device: &DeviceProfile,
    ) -> SessionOutcome<P::Transport> {
        self.run(Job::CleanInstall(files), selection, device).await
    }

    /// Reset the device and monitor it without flashing
    pub async fn monitor_only(&mut self) -> SessionOutcome<P::Transport> {
        match self.try_monitor().await {
            Ok(monitor) => SessionOutcome::Monitoring(monitor),
            Err(e) => self.abort(e),
        }
    }

    async fn run(
        &mut self,
        job: Job<'_>,
        selection: &SelectionState,
        device: &DeviceProfile,
    ) -> SessionOutcome<P::Transport> {
        match self.try_run(&job, selection, device).await {
            Ok(monitor) => SessionOutcome::Monitoring(monitor),
            Err(e) => self.abort(e),
        }
    }

    fn abort(&mut self, error: SessionError) -> SessionOutcome<P::Transport> {
        log::error!("Flash session failed: {}", error);
        self.log.write_line("");
        self.log.write_line(&error_line(&error));
        self.state.set_phase(SessionPhase::Idle);
        SessionOutcome::Aborted(error)
    }

    async fn connect(&mut self) -> Result<P::Transport> {
        self.state.set_phase(SessionPhase::Connecting);
        let mut transport = self
            .provider
            .request()
            .await
            .map_err(SessionError::TransportUnavailable)?;

        self.state.set_connected(true);
        let connected = self.state.connected_flag();
        transport.set_disconnect_handler(Box::new(move || {
            log::info!("Serial port disconnected");
            connected.store(false, Ordering::SeqCst);
        }));
        Ok(transport)
    }

    async fn try_monitor(&mut self) -> Result<SerialMonitor<P::Transport>> {
        let mut transport = self.connect().await?;

        self.state.set_phase(SessionPhase::Resetting);
        reset_transport(&mut transport)
            .await
            .map_err(|e| SessionError::Reset(e.into()))?;

        self.state.set_phase(SessionPhase::Monitoring);
        Ok(SerialMonitor::new(transport, self.log.clone()))
    }

    async fn try_run(
        &mut self,
        job: &Job<'_>,
        selection: &SelectionState,
        device: &DeviceProfile,
    ) -> Result<SerialMonitor<P::Transport>> {
        let transport = self.connect().await?;

        self.state.set_phase(SessionPhase::Identifying);
        let mut client = B::attach(LoaderOptions {
            transport,
            baud_rate: self.baud_rate,
            log: self.log.clone(),
        });
        let chip = client
            .identify()
            .await
            .map_err(SessionError::DeviceIdentificationFailed)?;
        log::info!("Detected chip: {}", chip.name);
        self.progress.identified(&chip);

        let plan = self.prepare_plan(job, selection, device).await?;
        self.write(&mut client, &plan, job, selection, device).await?;

        self.state.set_phase(SessionPhase::Resetting);
        reset(&mut client).await.map_err(SessionError::Reset)?;

        self.state.set_phase(SessionPhase::Monitoring);
        Ok(SerialMonitor::new(client.into_transport(), self.log.clone()))
    }

    /// Enter the flashing phase and fetch a checked plan
    async fn prepare_plan(
        &mut self,
        job: &Job<'_>,
        selection: &SelectionState,
        device: &DeviceProfile,
    ) -> Result<FlashPlan> {
        self.state.set_phase(SessionPhase::Flashing);
        let plan = self.build_plan(job, selection, device).await?;
        plan.validate()?;
        Ok(plan)
    }

    /// Fetch every image before anything is written
    async fn build_plan(
        &self,
        job: &Job<'_>,
        selection: &SelectionState,
        device: &DeviceProfile,
    ) -> Result<FlashPlan> {
        let source = selection.selection();
        match job {
            Job::Update(pattern) => {
                log::info!("Fetching {}", pattern);
                let payload = self.source.fetch(pattern, source).await?;
                Ok(FlashPlan::update(payload))
            }
            Job::CleanInstall(files) => {
                log::info!("Fetching {}, {} and {}", files.app, files.ota, files.filesystem);
                let images = PlanImages {
                    app: self.source.fetch(files.app, source).await?,
                    ota: self.source.fetch(files.ota, source).await?,
                    filesystem: self.source.fetch(files.filesystem, source).await?,
                };
                Ok(plan(
                    selection.options.scheme(),
                    device,
                    &selection.firmware_version(),
                    images,
                ))
            }
        }
    }

    async fn write(
        &mut self,
        client: &mut B,
        plan: &FlashPlan,
        job: &Job<'_>,
        selection: &SelectionState,
        device: &DeviceProfile,
    ) -> Result<()> {
        let last_index = plan.last_index();
        let event = (!device.hw_model_slug.is_empty())
            .then(|| EventTemplate::new(selection, device, job.is_clean_install()));

        self.state.begin_flashing();
        self.progress.writing(plan);
        log::info!(
            "Writing {} image(s), {} bytes total",
            plan.len(),
            plan.total_bytes()
        );

        let state = &mut self.state;
        let progress = &mut self.progress;
        let telemetry = &self.telemetry;
        let mut on_progress = |report: ImageProgress| {
            progress.image_progress(report.image_index, report.bytes_written, report.bytes_total);
            if state.record_progress(report, last_index) == ProgressUpdate::Completed {
                log::info!("Done flashing!");
                progress.complete();
                if let Some(event) = &event {
                    telemetry.flash_completed(&event.finish());
                }
            }
        };

        let result = client.write_flash(plan, &mut on_progress).await;
        result.map_err(|source| SessionError::TransmissionFailed {
            image: self.state.snapshot().current_image_index,
            source,
        })
    }
}

/// Pulse the enable line: high, wait, low
async fn reset<B: BootloaderClient>(client: &mut B) -> core::result::Result<(), BootloaderError> {
    client.set_signal(Signal::RequestToSend, true).await?;
    tokio::time::sleep(RESET_PULSE).await;
    client.set_signal(Signal::RequestToSend, false).await
}

async fn reset_transport<T: Transport>(transport: &mut T) -> core::result::Result<(), TransportError> {
    transport.set_signal(Signal::RequestToSend, true).await?;
    tokio::time::sleep(RESET_PULSE).await;
    transport.set_signal(Signal::RequestToSend, false).await
}

/// Everything of a flash event that is known before writing starts
struct EventTemplate {
    firmware_version: String,
    hw_model: u32,
    hw_model_slug: String,
    platformio_target: String,
    architecture: String,
    clean_install: bool,
    support_level: u8,
    has_mui: bool,
    partition_scheme: String,
    partition_table_version: &'static str,
}

impl EventTemplate {
    fn new(selection: &SelectionState, device: &DeviceProfile, clean_install: bool) -> Self {
        let scheme = selection.options.scheme();
        let table = PartitionTable::select(scheme, device, &selection.firmware_version());
        Self {
            firmware_version: selection.release_id().to_string(),
            hw_model: device.hw_model,
            hw_model_slug: device.hw_model_slug.clone(),
            platformio_target: device.platformio_target.clone(),
            architecture: device.architecture.clone(),
            clean_install,
            support_level: device.support_level_or_default(),
            has_mui: device.has_mui,
            partition_scheme: scheme.to_string(),
            partition_table_version: table.variant_label(),
        }
    }

    fn finish(&self) -> FlashEvent {
        FlashEvent {
            firmware_version: self.firmware_version.clone(),
            hw_model: self.hw_model,
            hw_model_slug: self.hw_model_slug.clone(),
            platformio_target: self.platformio_target.clone(),
            architecture: self.architecture.clone(),
            clean_install: self.clean_install,
            support_level: self.support_level,
            has_mui: self.has_mui,
            partition_scheme: self.partition_scheme.clone(),
            partition_table_version: self.partition_table_version.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        }
    }
}
