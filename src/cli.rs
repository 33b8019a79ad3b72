//! CLI argument parsing

use clap::{Parser, Subcommand};
use meshflash_core::device::DeviceProfile;
use meshflash_core::partition::PartitionScheme;
use std::path::PathBuf;

/// Port name that selects the emulated device
pub const DUMMY_PORT: &str = "dummy";

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

fn parse_scheme(s: &str) -> Result<PartitionScheme, String> {
    match s {
        "default" | "8MB" | "16MB" => Ok(PartitionScheme::parse(s)),
        _ => Err(format!("Unknown partition scheme '{}' (default, 8MB, 16MB)", s)),
    }
}

#[derive(Parser)]
#[command(name = "meshflash")]
#[command(author, version, about = "Mesh radio firmware flasher", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file (TOML format)
    /// Defaults to ./meshflash.toml, then /etc/meshflash/config.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Target device description
#[derive(clap::Args, Debug, Clone, Default)]
pub struct DeviceArgs {
    /// PlatformIO target of the board (e.g. heltec-v3)
    #[arg(long, default_value = "")]
    pub target: String,

    /// Numeric hardware model
    #[arg(long, default_value_t = 0)]
    pub hw_model: u32,

    /// Hardware model slug (e.g. HELTEC_V3); telemetry is only sent when set
    #[arg(long, default_value = "")]
    pub hw_model_slug: String,

    /// Chip architecture (esp32, esp32-s3, esp32-c3, ...)
    #[arg(long, default_value = "esp32")]
    pub arch: String,

    /// Support level of the board (1 = best)
    #[arg(long)]
    pub support_level: Option<u8>,

    /// The board supports the companion UI
    #[arg(long)]
    pub mui: bool,
}

impl DeviceArgs {
    pub fn profile(&self) -> DeviceProfile {
        DeviceProfile {
            platformio_target: self.target.clone(),
            hw_model: self.hw_model,
            hw_model_slug: self.hw_model_slug.clone(),
            architecture: self.arch.clone(),
            support_level: self.support_level,
            has_mui: self.mui,
        }
    }
}

/// Options of the flash command
#[derive(clap::Args, Debug, Clone)]
pub struct FlashArgs {
    /// Release id to flash (e.g. v2.8.0.abcdef0)
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    pub release: Option<String>,

    /// Local firmware file (.bin or .zip)
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Offer preview releases when looking up --release
    #[arg(long)]
    pub unlock_prerelease: bool,

    #[command(flatten)]
    pub device: DeviceArgs,

    /// Serial port, or "dummy" for the emulated device (auto-detected if not specified)
    #[arg(short, long)]
    pub port: Option<String>,

    /// Serial speed while flashing (overrides the config file)
    #[arg(long)]
    pub baud: Option<u32>,

    /// Erase the flash and write app, OTA and filesystem images
    #[arg(long)]
    pub clean_install: bool,

    /// Partition scheme for a clean install
    #[arg(long, value_parser = parse_scheme)]
    pub scheme: Option<PartitionScheme>,

    /// Install the companion UI
    #[arg(long)]
    pub install_mui: bool,

    /// Override the update image pattern
    #[arg(long)]
    pub update_pattern: Option<String>,

    /// Override the application image pattern
    #[arg(long)]
    pub app_pattern: Option<String>,

    /// Override the OTA image pattern
    #[arg(long)]
    pub ota_pattern: Option<String>,

    /// Override the filesystem image pattern
    #[arg(long)]
    pub fs_pattern: Option<String>,

    /// Exit after reset instead of monitoring the serial output
    #[arg(long)]
    pub no_monitor: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List available firmware releases
    Releases {
        /// Also list preview releases from the config file
        #[arg(long)]
        unlock_prerelease: bool,
    },

    /// Flash a release or a local file
    Flash(FlashArgs),

    /// Show the offsets a clean install would use
    Plan {
        /// Partition scheme
        #[arg(long, value_parser = parse_scheme, default_value = "default")]
        scheme: PartitionScheme,

        /// Firmware version (e.g. 2.7.9)
        #[arg(long)]
        version: String,

        /// The board supports the companion UI
        #[arg(long)]
        mui: bool,

        /// Payload size used for the overlap check (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32)]
        app_size: Option<u32>,
    },

    /// Extract one image from a local release archive
    Extract {
        /// Archive file (.zip)
        #[arg(short, long)]
        file: PathBuf,

        /// Entry pattern (regular expression)
        #[arg(long)]
        pattern: String,

        /// Output file path (defaults to the entry name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Reset the device and show its serial output
    Monitor {
        /// Serial port, or "dummy" for the emulated device (auto-detected if not specified)
        #[arg(short, long)]
        port: Option<String>,

        /// Console speed (115200 if not specified)
        #[arg(long)]
        baud: Option<u32>,
    },

    /// List serial ports
    Ports,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_u32() {
        assert_eq!(parse_hex_u32("0x10000"), Ok(0x10000));
        assert_eq!(parse_hex_u32("4096"), Ok(4096));
        assert!(parse_hex_u32("0xZZ").is_err());
    }

    #[test]
    fn test_parse_scheme() {
        assert_eq!(parse_scheme("8MB"), Ok(PartitionScheme::EightMb));
        assert_eq!(parse_scheme("default"), Ok(PartitionScheme::Default));
        assert!(parse_scheme("32MB").is_err());
    }

    #[test]
    fn test_flash_args() {
        let cli = Cli::parse_from([
            "meshflash",
            "flash",
            "--release",
            "v2.8.0",
            "--target",
            "t-deck",
            "--arch",
            "esp32-s3",
            "--mui",
            "--clean-install",
            "--scheme",
            "8MB",
            "--port",
            "dummy",
        ]);
        let Commands::Flash(args) = cli.command else {
            panic!("expected flash command");
        };
        assert_eq!(args.release.as_deref(), Some("v2.8.0"));
        assert_eq!(args.scheme, Some(PartitionScheme::EightMb));
        assert_eq!(args.port.as_deref(), Some(DUMMY_PORT));
        let device = args.device.profile();
        assert!(device.has_mui);
        assert_eq!(device.architecture, "esp32-s3");
    }

    #[test]
    fn test_flash_needs_selection() {
        assert!(Cli::try_parse_from(["meshflash", "flash", "--target", "t-deck"]).is_err());
        assert!(Cli::try_parse_from([
            "meshflash",
            "flash",
            "--release",
            "v2.8.0",
            "--file",
            "fw.bin"
        ])
        .is_err());
    }
}
