//! Serial port scanner
//!
//! Enumerates serial ports and guesses which instrument sits behind each.

use std::fmt;

use serialport::{available_ports, SerialPortType};
use tracing::{debug, info};

use crate::error::DeviceError;
use crate::usb_ids::{self, TINYSA};

/// What a port most likely connects to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortRole {
    /// tinySA USB ID
    Analyzer,
    /// USB-serial bridge commonly used by Arduino boards
    Oscillator(&'static str),
    Unknown,
}

impl fmt::Display for PortRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Analyzer => f.write_str("tinySA"),
            Self::Oscillator(bridge) => write!(f, "oscillator? ({})", bridge),
            Self::Unknown => f.write_str("-"),
        }
    }
}

/// Information about a serial port
#[derive(Debug, Clone)]
pub struct SerialPortInfo {
    /// Port name (e.g., /dev/ttyUSB0, COM3)
    pub port: String,
    /// USB Vendor ID (if USB)
    pub vid: Option<u16>,
    /// USB Product ID (if USB)
    pub pid: Option<u16>,
    /// USB manufacturer string
    pub manufacturer: Option<String>,
    /// USB product string
    pub product: Option<String>,
}

impl SerialPortInfo {
    fn from_serialport(name: String, port_type: &SerialPortType) -> Self {
        match port_type {
            SerialPortType::UsbPort(usb) => Self {
                port: name,
                vid: Some(usb.vid),
                pid: Some(usb.pid),
                manufacturer: usb.manufacturer.clone(),
                product: usb.product.clone(),
            },
            _ => Self {
                port: name,
                vid: None,
                pid: None,
                manufacturer: None,
                product: None,
            },
        }
    }

    /// Best guess at the instrument behind this port
    pub fn role(&self) -> PortRole {
        let Some(vid) = self.vid else {
            return PortRole::Unknown;
        };
        if vid == TINYSA.vid && self.pid == Some(TINYSA.pid) {
            return PortRole::Analyzer;
        }
        if let Some(bridge) = usb_ids::oscillator_bridge(vid) {
            return PortRole::Oscillator(bridge);
        }

        let product = self.product.as_deref().unwrap_or_default().to_lowercase();
        match usb_ids::OSCILLATOR_KEYWORDS
            .iter()
            .find(|keyword| product.contains(*keyword))
        {
            Some(_) => PortRole::Oscillator("USB serial"),
            None => PortRole::Unknown,
        }
    }

    /// One-line description for listings
    pub fn description(&self) -> String {
        match (self.vid, self.pid) {
            (Some(vid), Some(pid)) => format!(
                "{} [{:04x}:{:04x}]",
                self.product.as_deref().unwrap_or("USB device"),
                vid,
                pid
            ),
            _ => "non-USB".to_string(),
        }
    }
}

/// Serial port scanner
#[derive(Debug, Clone)]
pub struct PortScanner {
    /// Skip ports whose name contains any of these
    skip_patterns: Vec<String>,
}

impl PortScanner {
    pub fn new() -> Self {
        Self {
            skip_patterns: vec![
                // Bluetooth ports on macOS
                "Bluetooth".to_string(),
                "debug".to_string(),
            ],
        }
    }

    /// Enumerate all available serial ports
    pub fn enumerate_ports(&self) -> Result<Vec<SerialPortInfo>, DeviceError> {
        debug!("Enumerating serial ports");
        let ports = available_ports()?;

        let result: Vec<_> = ports
            .into_iter()
            .map(|p| SerialPortInfo::from_serialport(p.port_name, &p.port_type))
            .filter(|p| !self.should_skip_port(p))
            .collect();

        info!("Found {} serial port(s)", result.len());
        Ok(result)
    }

    /// First port with the tinySA USB ID
    pub fn find_analyzer(&self) -> Result<SerialPortInfo, DeviceError> {
        self.enumerate_ports()?
            .into_iter()
            .find(|p| p.role() == PortRole::Analyzer)
            .ok_or(DeviceError::PortNotFound("tinySA"))
    }

    /// Ports that look like an oscillator bridge
    pub fn oscillator_candidates(&self) -> Result<Vec<SerialPortInfo>, DeviceError> {
        Ok(self
            .enumerate_ports()?
            .into_iter()
            .filter(|p| matches!(p.role(), PortRole::Oscillator(_)))
            .collect())
    }

    fn should_skip_port(&self, port: &SerialPortInfo) -> bool {
        self.skip_patterns
            .iter()
            .any(|pattern| port.port.contains(pattern.as_str()))
    }
}

impl Default for PortScanner {
    fn default() -> Self {
        Self::new()
    }
}
