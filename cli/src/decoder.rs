// Device description files are stored as 16 bit text with an optional byte order mark. Only
// the low byte of each unit is kept, so anything outside ISO 8859-1 comes out mangled.
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::io::{self, Write};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

/// Decodes fragments while remembering the last byte order mark seen, across every buffer
/// passed to the same decoder.
#[derive(Debug, Default)]
pub struct FragmentDecoder {
    endianness: Endianness,
}

impl FragmentDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, buffer: &[u8]) -> String {
        buffer
            .chunks_exact(2)
            .filter_map(|unit| self.decode_unit(unit))
            .collect()
    }

    /// Writes the decoded text followed by a single newline.
    pub fn dump<W: Write>(&mut self, buffer: &[u8], out: &mut W) -> io::Result<()> {
        let text = self.decode(buffer);
        writeln!(out, "{}", text)
    }

    fn decode_unit(&mut self, unit: &[u8]) -> Option<char> {
        match unit {
            [0xff, 0xfe] => {
                self.endianness = Endianness::Little;
                None
            }
            [0xfe, 0xff] => {
                self.endianness = Endianness::Big;
                None
            }
            _ => {
                let value = match self.endianness {
                    Endianness::Little => LittleEndian::read_u16(unit),
                    Endianness::Big => BigEndian::read_u16(unit),
                };
                Some(char::from(value as u8))
            }
        }
    }
}
