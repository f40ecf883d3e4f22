//! USB Vendor/Product IDs of the bench hardware
//!
//! The oscillator sits behind whatever USB-serial bridge the Arduino board
//! uses; the tinySA enumerates as an STM32 virtual COM port.

/// USB Vendor ID / Product ID pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsbId {
    pub vid: u16,
    pub pid: u16,
}

impl UsbId {
    pub const fn new(vid: u16, pid: u16) -> Self {
        Self { vid, pid }
    }
}

/// tinySA / tinySA ULTRA (STMicroelectronics virtual COM port)
pub const TINYSA: UsbId = UsbId::new(0x0483, 0x5740);

/// Arduino boards with native USB or 16U2 bridge
pub const ARDUINO_VID: u16 = 0x2341;

/// WCH CH340/CH341, common on Arduino clones
pub const CH340_VID: u16 = 0x1A86;

/// Silicon Labs CP210x
pub const CP210X_VID: u16 = 0x10C4;

/// FTDI
pub const FTDI_VID: u16 = 0x0403;

/// Vendors of bridges likely to carry the oscillator, with display names
pub const OSCILLATOR_BRIDGES: &[(u16, &str)] = &[
    (ARDUINO_VID, "Arduino"),
    (CH340_VID, "CH340"),
    (CP210X_VID, "CP210x"),
    (FTDI_VID, "FTDI"),
];

/// Product string keywords for oscillator bridges
pub const OSCILLATOR_KEYWORDS: &[&str] = &["arduino", "ch340", "cp210", "ft232", "usb-serial"];

/// Bridge name for a vendor ID, if it is a known oscillator bridge
pub fn oscillator_bridge(vid: u16) -> Option<&'static str> {
    OSCILLATOR_BRIDGES
        .iter()
        .find(|(known, _)| *known == vid)
        .map(|(_, name)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oscillator_bridge_lookup() {
        assert_eq!(oscillator_bridge(0x1A86), Some("CH340"));
        assert_eq!(oscillator_bridge(0x2341), Some("Arduino"));
        assert_eq!(oscillator_bridge(TINYSA.vid), None);
    }
}
