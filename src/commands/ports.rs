//! Ports command

use std::error::Error;

pub fn run() -> Result<(), Box<dyn Error>> {
    let ports = meshflash_serial::available_ports()?;
    if ports.is_empty() {
        println!("No serial ports found");
        return Ok(());
    }

    println!("Serial ports:");
    for port in &ports {
        let marker = if port.is_known_bridge() { "*" } else { " " };
        println!("  {} {:20} {}", marker, port.name, port.description);
    }
    println!();
    println!("* USB-serial bridge used on ESP32 boards");
    Ok(())
}
