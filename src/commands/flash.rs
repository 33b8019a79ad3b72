//! Flash command

use std::error::Error;
use std::sync::Arc;

use indicatif::MultiProgress;
use meshflash_core::bootloader::BootloaderClient;
use meshflash_core::config::FlasherConfig;
use meshflash_core::device::DeviceProfile;
use meshflash_core::patterns;
use meshflash_core::release::FirmwareArtifact;
use meshflash_core::selection::{LocalFile, SelectionState};
use meshflash_core::source::BinarySource;
use meshflash_core::telemetry::LogTelemetry;
use meshflash_core::transport::{TransportProvider, DEFAULT_BAUD_RATE};
use meshflash_dummy::{EmulatedBootloader, EmulatedPort, EmulatedProvider, EmulatorConfig};
use meshflash_esp::EspLoader;
use meshflash_fetch::{fetch_release_list, BinaryFetcher, ReqwestClient, ZipFormat};
use meshflash_serial::{SerialProvider, SerialTransport};
use meshflash_session::{CleanInstallFiles, FlashSession, SessionOutcome};

use super::monitor::watch;
use super::terminal::{IndicatifProgress, TerminalSink};
use crate::cli::{FlashArgs, DUMMY_PORT};

/// Target placeholder when no board is given (local archives only)
const ANY_TARGET: &str = ".+";

/// File patterns for one session
#[derive(Debug, Clone, PartialEq, Eq)]
enum Job {
    Update(String),
    CleanInstall {
        app: String,
        ota: String,
        filesystem: String,
    },
}

impl Job {
    /// Default patterns for `device` and `version`, with overrides applied
    fn resolve(args: &FlashArgs, device: &DeviceProfile, version: &str) -> Self {
        let target = if device.has_target() {
            device.platformio_target.as_str()
        } else {
            ANY_TARGET
        };

        if args.clean_install {
            Job::CleanInstall {
                app: args
                    .app_pattern
                    .clone()
                    .unwrap_or_else(|| patterns::app_pattern(target, version)),
                ota: args
                    .ota_pattern
                    .clone()
                    .unwrap_or_else(|| patterns::ota_pattern(&device.architecture)),
                filesystem: args
                    .fs_pattern
                    .clone()
                    .unwrap_or_else(|| patterns::filesystem_pattern(target, version)),
            }
        } else {
            Job::Update(
                args.update_pattern
                    .clone()
                    .unwrap_or_else(|| patterns::update_pattern(target, version)),
            )
        }
    }
}

pub async fn run(args: &FlashArgs, config: &FlasherConfig) -> Result<(), Box<dyn Error>> {
    let device = args.device.profile();
    let fetcher = BinaryFetcher::new(
        ReqwestClient::new()?,
        ZipFormat,
        config.static_host_base.as_str(),
        config.mirror_base.as_str(),
    );

    let mut selection = SelectionState::new(config.archive_base.as_str());
    selection.prerelease_unlocked = args.unlock_prerelease;

    if let Some(id) = &args.release {
        if !device.has_target() {
            return Err("--target is required to flash a release".into());
        }
        let previews = if selection.prerelease_unlocked {
            config.preview_releases.clone()
        } else {
            Vec::new()
        };
        let releases = fetch_release_list(fetcher.http(), &config.release_list_url, previews).await;
        let artifact = releases.find(id).cloned().unwrap_or_else(|| {
            log::warn!("Release {} is not in the release list, using it as is", id);
            FirmwareArtifact::from_id(id.as_str())
        });

        println!("Release: {}", artifact.title);
        selection.select_firmware(artifact, Some(&device), &LogTelemetry);
        selection.continue_to_flash();
    } else if let Some(path) = &args.file {
        let file = LocalFile::read(path)?;
        println!("Read {} bytes from {:?}", file.contents.len(), path);
        selection.select_file(file);
        if args.clean_install && !selection.is_archive_file() {
            return Err("A clean install needs a release or a .zip archive".into());
        }
    }

    selection.options.clean_install = args.clean_install;
    selection.options.install_mui = args.install_mui;
    selection.options.partition_scheme = args.scheme;

    let job = Job::resolve(args, &device, &selection.firmware_version());
    log::debug!("Session job: {:?}", job);

    let baud_rate = args.baud.unwrap_or(config.baud_rate);
    let multi = MultiProgress::new();
    let sink = Arc::new(TerminalSink::new(multi.clone()));

    if args.port.as_deref() == Some(DUMMY_PORT) {
        log::info!("Using the emulated device");
        let provider = EmulatedProvider::new(EmulatedPort::new(EmulatorConfig::default()));
        let session: FlashSession<_, EmulatedBootloader, _> =
            FlashSession::new(provider, fetcher, sink, baud_rate);
        drive(session, multi, &job, &selection, &device, !args.no_monitor).await
    } else {
        // The ROM answers at the default speed; the loader switches to `baud_rate`
        let provider = SerialProvider::new(args.port.clone(), DEFAULT_BAUD_RATE);
        let session: FlashSession<_, EspLoader<SerialTransport>, _> =
            FlashSession::new(provider, fetcher, sink, baud_rate);
        drive(session, multi, &job, &selection, &device, !args.no_monitor).await
    }
}

async fn drive<P, B, S>(
    session: FlashSession<P, B, S>,
    multi: MultiProgress,
    job: &Job,
    selection: &SelectionState,
    device: &DeviceProfile,
    monitor: bool,
) -> Result<(), Box<dyn Error>>
where
    P: TransportProvider,
    B: BootloaderClient<Transport = P::Transport>,
    S: BinarySource,
{
    let mut session = session
        .with_telemetry(Arc::new(LogTelemetry))
        .with_progress(Box::new(IndicatifProgress::new(multi)));

    let outcome = match job {
        Job::Update(pattern) => session.update_flash(pattern, selection, device).await,
        Job::CleanInstall {
            app,
            ota,
            filesystem,
        } => {
            let files = CleanInstallFiles {
                app,
                ota,
                filesystem,
            };
            session.clean_install_flash(files, selection, device).await
        }
    };

    let serial = match outcome {
        SessionOutcome::Monitoring(serial) => serial,
        // Already written to the session log
        SessionOutcome::Aborted(_) => return Err("Flash session aborted".into()),
    };

    let state = session.state();
    log::debug!("Session state after reset: {:?}", state);
    if !monitor {
        println!("Device reset ({} written)", state.percent_label());
        return Ok(());
    }
    watch(serial).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;

    fn flash_args(extra: &[&str]) -> FlashArgs {
        let mut argv = vec!["meshflash", "flash"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Commands::Flash(args) => args,
            _ => panic!("expected flash command"),
        }
    }

    #[test]
    fn test_update_job() {
        let args = flash_args(&["--release", "v2.8.0", "--target", "heltec-v3"]);
        let job = Job::resolve(&args, &args.device.profile(), "2.8.0");
        assert_eq!(job, Job::Update("firmware-heltec-v3-2.8.0-update.bin".into()));
    }

    #[test]
    fn test_clean_install_job() {
        let args = flash_args(&[
            "--release",
            "v2.8.0",
            "--target",
            "t-deck",
            "--arch",
            "esp32-s3",
            "--clean-install",
            "--fs-pattern",
            "littlefs-custom.bin",
        ]);
        let job = Job::resolve(&args, &args.device.profile(), "2.8.0");
        assert_eq!(
            job,
            Job::CleanInstall {
                app: "firmware-t-deck-2.8.0.bin".into(),
                ota: "bleota-s3.bin".into(),
                filesystem: "littlefs-custom.bin".into(),
            }
        );
    }

    #[test]
    fn test_job_without_target() {
        let args = flash_args(&["--file", "firmware.zip"]);
        let job = Job::resolve(&args, &args.device.profile(), ".+");
        assert_eq!(job, Job::Update("firmware-.+-.+-update.bin".into()));
    }
}
