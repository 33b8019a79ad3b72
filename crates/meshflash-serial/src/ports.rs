//! Serial port discovery

use meshflash_core::TransportError;
use serialport::{SerialPortInfo, SerialPortType};

/// USB vendor IDs of bridges found on ESP32 boards
pub const KNOWN_BRIDGES: &[(u16, &str)] = &[
    (0x303A, "Espressif USB-JTAG/Serial"),
    (0x10C4, "Silicon Labs CP210x"),
    (0x1A86, "WCH CH34x"),
    (0x0403, "FTDI"),
];

/// A serial port found on the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Name to open the port with (e.g. `/dev/ttyUSB0`)
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// USB vendor ID, if the port is a USB device
    pub vid: Option<u16>,
    /// USB product ID, if the port is a USB device
    pub pid: Option<u16>,
}

impl PortInfo {
    /// Whether the port is behind a bridge known from ESP32 boards
    pub fn is_known_bridge(&self) -> bool {
        self.vid
            .is_some_and(|vid| KNOWN_BRIDGES.iter().any(|(known, _)| *known == vid))
    }
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        match info.port_type {
            SerialPortType::UsbPort(usb) => {
                let bridge = KNOWN_BRIDGES
                    .iter()
                    .find(|(vid, _)| *vid == usb.vid)
                    .map(|(_, name)| *name);
                let description = match (usb.product, bridge) {
                    (Some(product), _) => product,
                    (None, Some(bridge)) => bridge.to_string(),
                    (None, None) => "USB serial".to_string(),
                };
                Self {
                    name: info.port_name,
                    description: format!("{} ({:04x}:{:04x})", description, usb.vid, usb.pid),
                    vid: Some(usb.vid),
                    pid: Some(usb.pid),
                }
            }
            SerialPortType::PciPort => Self::other(info.port_name, "PCI serial"),
            SerialPortType::BluetoothPort => Self::other(info.port_name, "Bluetooth serial"),
            SerialPortType::Unknown => Self::other(info.port_name, "serial"),
        }
    }
}

impl PortInfo {
    fn other(name: String, description: &str) -> Self {
        Self {
            name,
            description: description.to_string(),
            vid: None,
            pid: None,
        }
    }
}

/// List the serial ports on the host
pub fn available_ports() -> Result<Vec<PortInfo>, TransportError> {
    let ports = serialport::available_ports()
        .map_err(|e| TransportError::Unavailable(format!("cannot list serial ports: {}", e)))?;
    Ok(ports.into_iter().map(PortInfo::from).collect())
}

/// Pick the only port behind a known bridge
pub(crate) fn pick_port(ports: &[PortInfo]) -> Result<&PortInfo, TransportError> {
    let mut candidates = ports.iter().filter(|p| p.is_known_bridge());
    match (candidates.next(), candidates.next()) {
        (Some(port), None) => Ok(port),
        (None, _) => Err(TransportError::Unavailable(
            "no ESP32 serial port found, pass one with --port".into(),
        )),
        (Some(_), Some(_)) => Err(TransportError::Unavailable(
            "several serial ports found, pick one with --port".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialport::UsbPortInfo;

    fn usb(name: &str, vid: u16, product: Option<&str>) -> PortInfo {
        PortInfo::from(SerialPortInfo {
            port_name: name.to_string(),
            port_type: SerialPortType::UsbPort(UsbPortInfo {
                vid,
                pid: 0x1001,
                serial_number: None,
                manufacturer: None,
                product: product.map(str::to_string),
            }),
        })
    }

    #[test]
    fn test_usb_description() {
        let port = usb("/dev/ttyACM0", 0x303A, None);
        assert_eq!(port.description, "Espressif USB-JTAG/Serial (303a:1001)");
        assert!(port.is_known_bridge());

        let port = usb("/dev/ttyUSB0", 0x1234, Some("Widget"));
        assert_eq!(port.description, "Widget (1234:1001)");
        assert!(!port.is_known_bridge());
    }

    #[test]
    fn test_pick_single_bridge() {
        let ports = vec![
            PortInfo::other("/dev/ttyS0".into(), "serial"),
            usb("/dev/ttyUSB0", 0x10C4, None),
        ];
        assert_eq!(pick_port(&ports).unwrap().name, "/dev/ttyUSB0");
    }

    #[test]
    fn test_pick_ambiguous_or_missing() {
        let ports = vec![usb("/dev/ttyUSB0", 0x10C4, None), usb("/dev/ttyUSB1", 0x1A86, None)];
        assert!(matches!(pick_port(&ports), Err(TransportError::Unavailable(_))));
        assert!(matches!(pick_port(&[]), Err(TransportError::Unavailable(_))));
    }
}
