//! meshflash - Mesh radio firmware flasher
//!
//! Flashes firmware releases or local images onto ESP32-based mesh radios
//! over a serial port.
//!
//! # Architecture
//!
//! A `FlashSession` drives every device operation through three seams:
//! - **Transport** - a serial port (or the emulated device with `--port dummy`)
//! - **Bootloader client** - the ESP ROM loader protocol spoken over the transport
//! - **Binary source** - the tiered fetcher that resolves file patterns against
//!   the static host, release archives, the mirror or a local file
//!
//! Commands that do not talk to a device (`releases`, `plan`, `extract`,
//! `ports`) use the same library crates without a session.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use meshflash_core::config::FlasherConfig;
use meshflash_core::transport::DEFAULT_BAUD_RATE;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let config = match FlasherConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let result = match cli.command {
        Commands::Releases { unlock_prerelease } => {
            runtime.block_on(commands::releases::run(&config, unlock_prerelease))
        }
        Commands::Flash(args) => runtime.block_on(commands::flash::run(&args, &config)),
        Commands::Plan {
            scheme,
            version,
            mui,
            app_size,
        } => commands::plan::run(scheme, &version, mui, app_size),
        Commands::Extract {
            file,
            pattern,
            output,
        } => commands::extract::run(&file, &pattern, output.as_deref()),
        Commands::Monitor { port, baud } => runtime.block_on(commands::monitor::run(
            port,
            baud.unwrap_or(DEFAULT_BAUD_RATE),
        )),
        Commands::Ports => commands::ports::run(),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}
