//! ROM bootloader protocol constants and packet encoding
//!
//! Commands are sent as `[0x00, op, len:u16, checksum:u32, data..]` and
//! answered with `[0x01, op, len:u16, value:u32, data..]`, both SLIP framed
//! and little-endian. The last status bytes of a response's data hold the
//! status and error code.

use core::fmt;
use std::time::Duration;

use meshflash_core::BootloaderError;

/// Direction byte of a request
pub const DIR_REQUEST: u8 = 0x00;
/// Direction byte of a response
pub const DIR_RESPONSE: u8 = 0x01;

// Command opcodes
/// Begin a flash download
pub const ESP_FLASH_BEGIN: u8 = 0x02;
/// One block of flash data
pub const ESP_FLASH_DATA: u8 = 0x03;
/// Finish a flash download
pub const ESP_FLASH_END: u8 = 0x04;
/// Synchronize with the bootloader
pub const ESP_SYNC: u8 = 0x08;
/// Read a 32-bit register
pub const ESP_READ_REG: u8 = 0x0A;
/// Attach the SPI flash
pub const ESP_SPI_ATTACH: u8 = 0x0D;
/// Switch the loader to another baud rate
pub const ESP_CHANGE_BAUDRATE: u8 = 0x0F;

/// Seed of the data checksum
pub const CHECKSUM_SEED: u8 = 0xEF;

/// Size of one `FLASH_DATA` block in ROM mode
pub const FLASH_BLOCK_SIZE: usize = 0x400;

/// Register holding the chip detection magic value
pub const CHIP_DETECT_MAGIC_REG: u32 = 0x4000_1000;

/// Response timeout for ordinary commands
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);
/// Response timeout for one `SYNC` attempt
pub const SYNC_TIMEOUT: Duration = Duration::from_millis(100);
/// Erase time allowed per megabyte on `FLASH_BEGIN`
pub const ERASE_TIMEOUT_PER_MB: Duration = Duration::from_secs(30);

/// Chip families the ROM client can talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChipFamily {
    /// ESP8266
    Esp8266,
    /// ESP32
    Esp32,
    /// ESP32-S2
    Esp32s2,
    /// ESP32-S3
    Esp32s3,
    /// ESP32-C2
    Esp32c2,
    /// ESP32-C3
    Esp32c3,
    /// ESP32-C6
    Esp32c6,
}

impl ChipFamily {
    /// Identify a chip by the value of [`CHIP_DETECT_MAGIC_REG`]
    pub fn from_magic(magic: u32) -> Option<Self> {
        match magic {
            0xFFF0_C101 => Some(Self::Esp8266),
            0x00F0_1D83 => Some(Self::Esp32),
            0x0000_07C6 => Some(Self::Esp32s2),
            0x0000_0009 => Some(Self::Esp32s3),
            0x6F51_306F | 0x7C41_A06F => Some(Self::Esp32c2),
            0x6921_506F | 0x1B31_506F | 0x4881_606F | 0x4361_606F => Some(Self::Esp32c3),
            0x2CE0_806F => Some(Self::Esp32c6),
            _ => None,
        }
    }

    /// Display name
    pub fn name(self) -> &'static str {
        match self {
            Self::Esp8266 => "ESP8266",
            Self::Esp32 => "ESP32",
            Self::Esp32s2 => "ESP32-S2",
            Self::Esp32s3 => "ESP32-S3",
            Self::Esp32c2 => "ESP32-C2",
            Self::Esp32c3 => "ESP32-C3",
            Self::Esp32c6 => "ESP32-C6",
        }
    }

    /// Whether the ROM needs `SPI_ATTACH` before flash commands
    pub fn needs_spi_attach(self) -> bool {
        self != Self::Esp8266
    }

    /// Whether `FLASH_BEGIN` carries the trailing encryption word
    pub fn has_encrypted_flag(self) -> bool {
        !matches!(self, Self::Esp8266 | Self::Esp32)
    }
}

impl fmt::Display for ChipFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// XOR checksum over a `FLASH_DATA` payload
pub fn checksum(data: &[u8]) -> u32 {
    data.iter().fold(CHECKSUM_SEED, |acc, b| acc ^ b) as u32
}

/// Encode a request packet (before SLIP framing)
pub fn command_packet(op: u8, data: &[u8], checksum: u32) -> Vec<u8> {
    let mut packet = Vec::with_capacity(8 + data.len());
    packet.push(DIR_REQUEST);
    packet.push(op);
    packet.extend_from_slice(&(data.len() as u16).to_le_bytes());
    packet.extend_from_slice(&checksum.to_le_bytes());
    packet.extend_from_slice(data);
    packet
}

/// Payload of `SYNC`
pub fn sync_payload() -> Vec<u8> {
    let mut data = vec![0x07, 0x07, 0x12, 0x20];
    data.extend_from_slice(&[0x55; 32]);
    data
}

/// Payload of `READ_REG`
pub fn read_reg_payload(address: u32) -> Vec<u8> {
    address.to_le_bytes().to_vec()
}

/// Payload of `SPI_ATTACH` for the ROM: default pins, not legacy mode
pub fn spi_attach_payload() -> Vec<u8> {
    vec![0; 8]
}

/// Payload of `CHANGE_BAUDRATE`: the new rate, then 0 for the ROM's current
/// rate
pub fn change_baudrate_payload(baud_rate: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity(8);
    data.extend_from_slice(&baud_rate.to_le_bytes());
    data.extend_from_slice(&0u32.to_le_bytes());
    data
}

pub fn flash_begin_payload(family: ChipFamily, erase_size: u32, blocks: u32, offset: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity(20);
    for word in [erase_size, blocks, FLASH_BLOCK_SIZE as u32, offset] {
        data.extend_from_slice(&word.to_le_bytes());
    }
    if family.has_encrypted_flag() {
        data.extend_from_slice(&0u32.to_le_bytes());
    }
    data
}

/// Payload of `FLASH_DATA`, padding `block` with `0xFF`
///
/// Returns the payload and the checksum of the padded block.
pub fn flash_data_payload(block: &[u8], sequence: u32) -> (Vec<u8>, u32) {
    let mut padded = block.to_vec();
    padded.resize(FLASH_BLOCK_SIZE, 0xFF);

    let mut data = Vec::with_capacity(16 + FLASH_BLOCK_SIZE);
    for word in [padded.len() as u32, sequence, 0, 0] {
        data.extend_from_slice(&word.to_le_bytes());
    }
    let sum = checksum(&padded);
    data.extend_from_slice(&padded);
    (data, sum)
}

/// Payload of `FLASH_END`
pub fn flash_end_payload(reboot: bool) -> Vec<u8> {
    // The ROM takes "stay in loader", the inverse of reboot
    u32::from(!reboot).to_le_bytes().to_vec()
}

/// Erase timeout for `size` bytes, never below [`DEFAULT_TIMEOUT`]
pub fn erase_timeout(size: u32) -> Duration {
    let scaled = ERASE_TIMEOUT_PER_MB.mul_f64(f64::from(size) / (1024.0 * 1024.0));
    scaled.max(DEFAULT_TIMEOUT)
}

/// A decoded response packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Opcode the response belongs to
    pub op: u8,
    /// 32-bit value field (register contents for `READ_REG`)
    pub value: u32,
    /// Data including the trailing status bytes
    pub data: Vec<u8>,
}

impl Response {
    /// Decode an unframed response packet
    pub fn parse(packet: &[u8]) -> Result<Self, BootloaderError> {
        if packet.len() < 8 {
            return Err(BootloaderError::InvalidResponse(format!(
                "packet too short ({} bytes)",
                packet.len()
            )));
        }
        if packet[0] != DIR_RESPONSE {
            return Err(BootloaderError::InvalidResponse(format!(
                "unexpected direction 0x{:02X}",
                packet[0]
            )));
        }
        let size = u16::from_le_bytes([packet[2], packet[3]]) as usize;
        let data = &packet[8..];
        if data.len() < size {
            return Err(BootloaderError::InvalidResponse(format!(
                "truncated packet: {} of {} data bytes",
                data.len(),
                size
            )));
        }
        Ok(Self {
            op: packet[1],
            value: u32::from_le_bytes([packet[4], packet[5], packet[6], packet[7]]),
            data: data[..size].to_vec(),
        })
    }

    /// Check the status bytes
    ///
    /// ESP32-class ROMs append four status bytes and the ESP8266 two; the
    /// first is non-zero on failure and the second holds the error code.
    pub fn check_status(&self) -> Result<(), BootloaderError> {
        let status_len = if self.data.len() >= 4 { 4 } else { 2 };
        if self.data.len() < status_len {
            return Err(BootloaderError::InvalidResponse(format!(
                "missing status bytes for command 0x{:02X}",
                self.op
            )));
        }
        let status = &self.data[self.data.len() - status_len..];
        if status[0] != 0 {
            return Err(BootloaderError::CommandFailed {
                command: self.op,
                error: status[1],
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_packet_layout() {
        let packet = command_packet(ESP_READ_REG, &read_reg_payload(CHIP_DETECT_MAGIC_REG), 0);
        assert_eq!(
            packet,
            vec![0x00, 0x0A, 0x04, 0x00, 0, 0, 0, 0, 0x00, 0x10, 0x00, 0x40]
        );
    }

    #[test]
    fn test_sync_payload() {
        let data = sync_payload();
        assert_eq!(data.len(), 36);
        assert_eq!(&data[..4], &[0x07, 0x07, 0x12, 0x20]);
        assert!(data[4..].iter().all(|&b| b == 0x55));
    }

    #[test]
    fn test_checksum() {
        assert_eq!(checksum(&[]), 0xEF);
        assert_eq!(checksum(&[0xEF]), 0);
        assert_eq!(checksum(&[0x01, 0x02, 0x04]), 0xEF ^ 0x07);
    }

    #[test]
    fn test_flash_data_pads_block() {
        let (data, sum) = flash_data_payload(&[0xAA, 0x55], 7);
        assert_eq!(data.len(), 16 + FLASH_BLOCK_SIZE);
        assert_eq!(&data[0..4], &(FLASH_BLOCK_SIZE as u32).to_le_bytes());
        assert_eq!(&data[4..8], &7u32.to_le_bytes());
        assert_eq!(&data[16..18], &[0xAA, 0x55]);
        assert!(data[18..].iter().all(|&b| b == 0xFF));
        // 0xFF pads cancel out in pairs (0x3FE of them)
        assert_eq!(sum, (0xEF ^ 0xAA ^ 0x55) as u32);
    }

    #[test]
    fn test_flash_begin_encrypted_word() {
        assert_eq!(flash_begin_payload(ChipFamily::Esp32, 10, 1, 0x1000).len(), 16);
        let data = flash_begin_payload(ChipFamily::Esp32s3, 10, 1, 0x1000);
        assert_eq!(data.len(), 20);
        assert_eq!(&data[8..12], &0x400u32.to_le_bytes());
        assert_eq!(&data[12..16], &0x1000u32.to_le_bytes());
    }

    #[test]
    fn test_change_baudrate_payload() {
        assert_eq!(
            change_baudrate_payload(921_600),
            vec![0x00, 0x10, 0x0E, 0x00, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_flash_end_stays_in_loader() {
        assert_eq!(flash_end_payload(false), vec![1, 0, 0, 0]);
        assert_eq!(flash_end_payload(true), vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_from_magic() {
        assert_eq!(ChipFamily::from_magic(0x0000_0009), Some(ChipFamily::Esp32s3));
        assert_eq!(ChipFamily::from_magic(0x00F0_1D83), Some(ChipFamily::Esp32));
        assert_eq!(ChipFamily::from_magic(0x1B31_506F), Some(ChipFamily::Esp32c3));
        assert_eq!(ChipFamily::from_magic(0xDEAD_BEEF), None);
    }

    #[test]
    fn test_erase_timeout() {
        assert_eq!(erase_timeout(0x1000), DEFAULT_TIMEOUT);
        assert_eq!(erase_timeout(4 * 1024 * 1024), Duration::from_secs(120));
    }

    #[test]
    fn test_response_status() {
        let ok = Response::parse(&[0x01, 0x02, 4, 0, 0, 0, 0, 0, 0, 0, 0, 0]).unwrap();
        assert!(ok.check_status().is_ok());

        let failed = Response::parse(&[0x01, 0x03, 4, 0, 0, 0, 0, 0, 1, 0x07, 0, 0]).unwrap();
        assert!(matches!(
            failed.check_status(),
            Err(BootloaderError::CommandFailed { command: 0x03, error: 0x07 })
        ));

        let reg = Response::parse(&[0x01, 0x0A, 2, 0, 0x09, 0, 0, 0, 0, 0]).unwrap();
        assert_eq!(reg.value, 9);
        assert!(reg.check_status().is_ok());
    }

    #[test]
    fn test_response_rejects_garbage() {
        assert!(Response::parse(&[0x01, 0x02]).is_err());
        assert!(Response::parse(&[0x00, 0x02, 0, 0, 0, 0, 0, 0]).is_err());
        assert!(Response::parse(&[0x01, 0x02, 8, 0, 0, 0, 0, 0, 0]).is_err());
    }
}
