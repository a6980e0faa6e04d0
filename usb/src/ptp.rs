// PTP containers as they travel over the USB bulk pipes, and the datasets carried inside
// them. Everything on the wire is little endian.
use crate::error::CommandError;
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use std::io::{Cursor, Error as IoError, ErrorKind as IoErrorKind};

pub const HEADER_LENGTH: usize = 12;
pub const RESPONSE_OK: u16 = 0x2001;

pub const ALL_STORAGE: u32 = 0xffff_ffff;
pub const FORMAT_ASSOCIATION: u16 = 0x3001;

// Data type codes used by device property datasets
pub const TYPE_INT8: u16 = 0x0001;
pub const TYPE_UINT8: u16 = 0x0002;
pub const TYPE_INT16: u16 = 0x0003;
pub const TYPE_UINT16: u16 = 0x0004;
pub const TYPE_INT32: u16 = 0x0005;
pub const TYPE_UINT32: u16 = 0x0006;
pub const TYPE_INT64: u16 = 0x0007;
pub const TYPE_UINT64: u16 = 0x0008;

pub(crate) const FORM_RANGE: u8 = 0x01;
pub(crate) const FORM_ENUMERATION: u8 = 0x02;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ContainerType {
    Command,
    Data,
    Response,
    Event,
}

impl ContainerType {
    pub fn id(&self) -> u16 {
        match self {
            ContainerType::Command => 1,
            ContainerType::Data => 2,
            ContainerType::Response => 3,
            ContainerType::Event => 4,
        }
    }

    fn from_id(id: u16) -> Option<Self> {
        match id {
            1 => Some(ContainerType::Command),
            2 => Some(ContainerType::Data),
            3 => Some(ContainerType::Response),
            4 => Some(ContainerType::Event),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ContainerHeader {
    pub length: u32,
    pub kind: ContainerType,
    pub code: u16,
    pub transaction_id: u32,
}

impl ContainerHeader {
    pub fn parse(bytes: &[u8]) -> Result<Self, CommandError> {
        if bytes.len() < HEADER_LENGTH {
            return Err(malformed("container shorter than its header"));
        }
        let length = LittleEndian::read_u32(&bytes[0..4]);
        let kind = ContainerType::from_id(LittleEndian::read_u16(&bytes[4..6]))
            .ok_or_else(|| malformed("unknown container type"))?;
        if (length as usize) < HEADER_LENGTH {
            return Err(malformed("container length shorter than its header"));
        }

        Ok(Self {
            length,
            kind,
            code: LittleEndian::read_u16(&bytes[6..8]),
            transaction_id: LittleEndian::read_u32(&bytes[8..12]),
        })
    }
}

fn encode(kind: ContainerType, code: u16, transaction_id: u32, body: &[u8]) -> Vec<u8> {
    let mut container = vec![0; HEADER_LENGTH];
    LittleEndian::write_u32(&mut container[0..4], (HEADER_LENGTH + body.len()) as u32);
    LittleEndian::write_u16(&mut container[4..6], kind.id());
    LittleEndian::write_u16(&mut container[6..8], code);
    LittleEndian::write_u32(&mut container[8..12], transaction_id);
    container.extend_from_slice(body);
    container
}

pub fn encode_command(code: u16, transaction_id: u32, params: &[u32]) -> Vec<u8> {
    let mut body = vec![0; params.len() * 4];
    LittleEndian::write_u32_into(params, &mut body);
    encode(ContainerType::Command, code, transaction_id, &body)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    pub code: u16,
    pub transaction_id: u32,
    pub params: Vec<u32>,
}

impl Response {
    pub fn parse(bytes: &[u8]) -> Result<Self, CommandError> {
        let header = ContainerHeader::parse(bytes)?;
        if header.kind != ContainerType::Response {
            return Err(malformed("expected a response container"));
        }
        let end = (header.length as usize).min(bytes.len());
        let params = bytes[HEADER_LENGTH..end]
            .chunks_exact(4)
            .map(LittleEndian::read_u32)
            .collect();

        Ok(Self {
            code: header.code,
            transaction_id: header.transaction_id,
            params,
        })
    }

    pub fn is_ok(&self) -> bool {
        self.code == RESPONSE_OK
    }
}

fn malformed(reason: &str) -> CommandError {
    CommandError::MalformedResponse(IoError::new(IoErrorKind::InvalidData, reason.to_string()))
}

/// Sequential reader over a dataset returned in a data phase.
pub struct DatasetReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> DatasetReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(bytes),
        }
    }

    pub fn read_u8(&mut self) -> Result<u8, CommandError> {
        Ok(self.cursor.read_u8()?)
    }

    pub fn read_u16(&mut self) -> Result<u16, CommandError> {
        Ok(self.cursor.read_u16::<LittleEndian>()?)
    }

    pub fn read_u32(&mut self) -> Result<u32, CommandError> {
        Ok(self.cursor.read_u32::<LittleEndian>()?)
    }

    pub fn read_u64(&mut self) -> Result<u64, CommandError> {
        Ok(self.cursor.read_u64::<LittleEndian>()?)
    }

    pub fn read_u16_array(&mut self) -> Result<Vec<u16>, CommandError> {
        let count = self.read_u32()?;
        (0..count).map(|_| self.read_u16()).collect()
    }

    pub fn read_u32_array(&mut self) -> Result<Vec<u32>, CommandError> {
        let count = self.read_u32()?;
        (0..count).map(|_| self.read_u32()).collect()
    }

    // A PTP string is a character count (terminator included) followed by UCS-2 units.
    pub fn read_string(&mut self) -> Result<String, CommandError> {
        let count = self.read_u8()?;
        let units = (0..count)
            .map(|_| self.read_u16())
            .collect::<Result<Vec<u16>, CommandError>>()?;
        Ok(decode_units(&units))
    }

    /// Reads an integer of the given PTP data type, widened to 64 bits.
    pub fn read_integer(&mut self, data_type: u16) -> Result<u64, CommandError> {
        Ok(match data_type {
            TYPE_INT8 | TYPE_UINT8 => u64::from(self.read_u8()?),
            TYPE_INT16 | TYPE_UINT16 => u64::from(self.read_u16()?),
            TYPE_INT32 | TYPE_UINT32 => u64::from(self.read_u32()?),
            TYPE_INT64 | TYPE_UINT64 => self.read_u64()?,
            _ => return Err(malformed("unsupported property data type")),
        })
    }
}

/// Converts UCS-2 / UTF-16 units into a string, stopping at the first terminator.
pub fn decode_units(units: &[u16]) -> String {
    let end = units.iter().position(|&u| u == 0).unwrap_or(units.len());
    char::decode_utf16(units[..end].iter().copied())
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub standard_version: u16,
    pub vendor_extension_id: u32,
    pub vendor_extension_version: u16,
    pub vendor_extension_desc: String,
    pub functional_mode: u16,
    pub operations_supported: Vec<u16>,
    pub events_supported: Vec<u16>,
    pub properties_supported: Vec<u16>,
    pub capture_formats: Vec<u16>,
    pub playback_formats: Vec<u16>,
    pub manufacturer: String,
    pub model: String,
    pub device_version: String,
    pub serial_number: String,
}

impl DeviceInfo {
    pub fn parse(bytes: &[u8]) -> Result<Self, CommandError> {
        let mut reader = DatasetReader::new(bytes);
        Ok(Self {
            standard_version: reader.read_u16()?,
            vendor_extension_id: reader.read_u32()?,
            vendor_extension_version: reader.read_u16()?,
            vendor_extension_desc: reader.read_string()?,
            functional_mode: reader.read_u16()?,
            operations_supported: reader.read_u16_array()?,
            events_supported: reader.read_u16_array()?,
            properties_supported: reader.read_u16_array()?,
            capture_formats: reader.read_u16_array()?,
            playback_formats: reader.read_u16_array()?,
            manufacturer: reader.read_string()?,
            model: reader.read_string()?,
            device_version: reader.read_string()?,
            serial_number: reader.read_string()?,
        })
    }

    pub fn supports_property(&self, code: u16) -> bool {
        self.properties_supported.contains(&code)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectInfo {
    pub storage_id: u32,
    pub format: u16,
    pub compressed_size: u32,
    pub parent: u32,
    pub filename: String,
}

impl ObjectInfo {
    pub fn parse(bytes: &[u8]) -> Result<Self, CommandError> {
        let mut reader = DatasetReader::new(bytes);
        let storage_id = reader.read_u32()?;
        let format = reader.read_u16()?;
        let _protection = reader.read_u16()?;
        let compressed_size = reader.read_u32()?;

        // Thumbnail and image geometry, unused here
        let _thumb_format = reader.read_u16()?;
        for _ in 0..6 {
            reader.read_u32()?;
        }

        let parent = reader.read_u32()?;
        let _association_type = reader.read_u16()?;
        let _association_desc = reader.read_u32()?;
        let _sequence_number = reader.read_u32()?;
        let filename = reader.read_string()?;

        Ok(Self {
            storage_id,
            format,
            compressed_size,
            parent,
            filename,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PropertyForm {
    None,
    Range { minimum: u64, maximum: u64, step: u64 },
    Enumeration(Vec<u64>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyDesc {
    pub code: u16,
    pub data_type: u16,
    pub writable: bool,
    pub factory_default: u64,
    pub current: u64,
    pub form: PropertyForm,
}

impl PropertyDesc {
    /// Parses a DevicePropDesc dataset for an integer typed property.
    pub fn parse(bytes: &[u8]) -> Result<Self, CommandError> {
        let mut reader = DatasetReader::new(bytes);
        let code = reader.read_u16()?;
        let data_type = reader.read_u16()?;
        let writable = reader.read_u8()? == 1;
        let factory_default = reader.read_integer(data_type)?;
        let current = reader.read_integer(data_type)?;

        let form = match reader.read_u8()? {
            FORM_RANGE => PropertyForm::Range {
                minimum: reader.read_integer(data_type)?,
                maximum: reader.read_integer(data_type)?,
                step: reader.read_integer(data_type)?,
            },
            FORM_ENUMERATION => {
                let count = reader.read_u16()?;
                let values = (0..count)
                    .map(|_| reader.read_integer(data_type))
                    .collect::<Result<Vec<u64>, CommandError>>()?;
                PropertyForm::Enumeration(values)
            }
            _ => PropertyForm::None,
        };

        Ok(Self {
            code,
            data_type,
            writable,
            factory_default,
            current,
            form,
        })
    }
}

/// Builds datasets in the wire layout, for faking device replies.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct DatasetWriter {
    bytes: Vec<u8>,
}

#[cfg(test)]
impl DatasetWriter {
    pub fn u8(mut self, value: u8) -> Self {
        self.bytes.push(value);
        self
    }

    pub fn u16(mut self, value: u16) -> Self {
        let mut buf = [0; 2];
        LittleEndian::write_u16(&mut buf, value);
        self.bytes.extend_from_slice(&buf);
        self
    }

    pub fn u32(mut self, value: u32) -> Self {
        let mut buf = [0; 4];
        LittleEndian::write_u32(&mut buf, value);
        self.bytes.extend_from_slice(&buf);
        self
    }

    pub fn u16_array(self, values: &[u16]) -> Self {
        values
            .iter()
            .fold(self.u32(values.len() as u32), |w, v| w.u16(*v))
    }

    pub fn u32_array(self, values: &[u32]) -> Self {
        values
            .iter()
            .fold(self.u32(values.len() as u32), |w, v| w.u32(*v))
    }

    pub fn string(self, value: &str) -> Self {
        if value.is_empty() {
            return self.u8(0);
        }
        let units: Vec<u16> = value.encode_utf16().chain(std::iter::once(0)).collect();
        units
            .iter()
            .fold(self.u8(units.len() as u8), |w, u| w.u16(*u))
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }
}
