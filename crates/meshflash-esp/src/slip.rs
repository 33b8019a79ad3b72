//! SLIP framing (RFC 1055) as used by the ROM bootloader

/// Frame delimiter
pub const END: u8 = 0xC0;
/// Escape byte
pub const ESC: u8 = 0xDB;
/// Escaped `END`
pub const ESC_END: u8 = 0xDC;
/// Escaped `ESC`
pub const ESC_ESC: u8 = 0xDD;

/// Wrap `packet` in a SLIP frame
pub fn encode(packet: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(packet.len() + 8);
    frame.push(END);
    for &b in packet {
        match b {
            END => frame.extend_from_slice(&[ESC, ESC_END]),
            ESC => frame.extend_from_slice(&[ESC, ESC_ESC]),
            _ => frame.push(b),
        }
    }
    frame.push(END);
    frame
}

/// Incremental SLIP decoder
///
/// Bytes outside a frame (boot messages printed by the ROM) are dropped.
#[derive(Debug, Default)]
pub struct Decoder {
    frame: Vec<u8>,
    in_frame: bool,
    escape: bool,
}

impl Decoder {
    /// Feed one byte, returning a frame once it is complete
    pub fn push(&mut self, byte: u8) -> Option<Vec<u8>> {
        if !self.in_frame {
            if byte == END {
                self.in_frame = true;
                self.frame.clear();
            }
            return None;
        }

        if self.escape {
            self.escape = false;
            match byte {
                ESC_END => self.frame.push(END),
                ESC_ESC => self.frame.push(ESC),
                other => {
                    log::trace!("Invalid SLIP escape 0x{:02X}, dropping frame", other);
                    self.in_frame = false;
                }
            }
            return None;
        }

        match byte {
            // Back-to-back delimiters: treat the second one as a frame start
            END if self.frame.is_empty() => None,
            END => {
                self.in_frame = false;
                Some(core::mem::take(&mut self.frame))
            }
            ESC => {
                self.escape = true;
                None
            }
            _ => {
                self.frame.push(byte);
                None
            }
        }
    }

    /// Feed a buffer, collecting every completed frame
    pub fn extend(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        bytes.iter().filter_map(|&b| self.push(b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_escapes() {
        assert_eq!(
            encode(&[0x01, END, 0x02, ESC]),
            vec![END, 0x01, ESC, ESC_END, 0x02, ESC, ESC_ESC, END]
        );
    }

    #[test]
    fn test_decode_skips_noise() {
        let mut decoder = Decoder::default();
        let mut input = b"ets Jun  8 2016 00:22:57\r\n".to_vec();
        input.extend(encode(&[1, END, 3]));
        assert_eq!(decoder.extend(&input), vec![vec![1, END, 3]]);
    }

    #[test]
    fn test_decode_split_frames() {
        let mut decoder = Decoder::default();
        let mut input = encode(&[ESC, 9]);
        input.extend(encode(&[7]));
        let (a, b) = input.split_at(3);
        assert!(decoder.extend(a).is_empty());
        assert_eq!(decoder.extend(b), vec![vec![ESC, 9], vec![7]]);
    }

    #[test]
    fn test_decode_bad_escape() {
        let mut decoder = Decoder::default();
        let frames = decoder.extend(&[END, 1, ESC, 0x00, 2, END, END, 5, END]);
        assert_eq!(frames, vec![vec![5]]);
    }
}
