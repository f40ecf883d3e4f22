//! `--list-ports`

use lo_devices::{PortRole, PortScanner, SerialPortInfo};

use crate::error::CliError;

/// Print every serial port with its likely role
pub fn list_ports() -> Result<(), CliError> {
    let ports = PortScanner::new().enumerate_ports()?;
    if ports.is_empty() {
        println!("No serial ports found");
        return Ok(());
    }

    println!("Available serial ports:");
    for info in &ports {
        println!("  {}", format_port(info));
    }

    let analyzers = ports
        .iter()
        .filter(|p| p.role() == PortRole::Analyzer)
        .count();
    if analyzers == 0 {
        println!("\nNo tinySA found; pass --tinysa <port> explicitly");
    }
    Ok(())
}

fn format_port(info: &SerialPortInfo) -> String {
    format!(
        "{:<20} {:<24} {}",
        info.port,
        info.role().to_string(),
        info.description()
    )
}
