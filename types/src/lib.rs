use std::fmt::Formatter;
use strum::Display;

mod codes;
pub use codes::{OperationCode, PropertyCode, ResponseCode};

/// Object formats understood by the tool, mapped from the PTP / MTP object format codes.
#[derive(Copy, Clone, Debug, Display, PartialEq, Eq, Hash)]
pub enum FileType {
    Folder,
    Wav,
    Mp3,
    Wma,
    Ogg,
    Audible,
    Mp4,
    UndefAudio,
    Wmv,
    Avi,
    Mpeg,
    Asf,
    Qt,
    UndefVideo,
    Jpeg,
    Jfif,
    Tiff,
    Bmp,
    Gif,
    Pict,
    Png,
    VCalendar1,
    VCalendar2,
    VCard2,
    VCard3,
    WindowsImageFormat,
    WinExec,
    Text,
    Html,
    Firmware,
    Aac,
    MediaCard,
    Flac,
    Mp2,
    M4a,
    Doc,
    Xml,
    Xls,
    Ppt,
    Mht,
    Jp2,
    Jpx,
    Album,
    Playlist,
    Unknown,
}

impl FileType {
    pub fn from_format_code(code: u16) -> Self {
        match code {
            0x3001 => FileType::Folder,
            0x3003 => FileType::WinExec,
            0x3004 => FileType::Text,
            0x3005 => FileType::Html,
            0x3008 => FileType::Wav,
            0x3009 => FileType::Mp3,
            0x300a => FileType::Avi,
            0x300b => FileType::Mpeg,
            0x300c => FileType::Asf,
            0x300d => FileType::Qt,
            0x3801 => FileType::Jpeg,
            0x3802 | 0x380d => FileType::Tiff,
            0x3804 => FileType::Bmp,
            0x3807 => FileType::Gif,
            0x3808 => FileType::Jfif,
            0x380a => FileType::Pict,
            0x380b => FileType::Png,
            0x380f => FileType::Jp2,
            0x3810 => FileType::Jpx,
            0xb211 => FileType::MediaCard,
            0xb215 => FileType::M4a,
            0xb802 => FileType::Firmware,
            0xb881 => FileType::WindowsImageFormat,
            0xb900 => FileType::UndefAudio,
            0xb901 => FileType::Wma,
            0xb902 => FileType::Ogg,
            0xb903 => FileType::Aac,
            0xb904 => FileType::Audible,
            0xb906 => FileType::Flac,
            0xb980 => FileType::UndefVideo,
            0xb981 => FileType::Wmv,
            0xb982 => FileType::Mp4,
            0xb983 => FileType::Mp2,
            0xba03 => FileType::Album,
            0xba05 | 0xb909 => FileType::Playlist,
            0xba82 => FileType::Xml,
            0xba83 => FileType::Doc,
            0xba84 => FileType::Mht,
            0xba85 => FileType::Xls,
            0xba86 => FileType::Ppt,
            0xbb82 => FileType::VCard2,
            0xbb83 => FileType::VCard3,
            0xbe02 => FileType::VCalendar1,
            0xbe03 => FileType::VCalendar2,
            0xbe80 => FileType::WinExec,
            _ => FileType::Unknown,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            FileType::Folder => "Folder",
            FileType::Wav => "RIFF WAVE file",
            FileType::Mp3 => "ISO MPEG-1 Audio Layer 3",
            FileType::Wma => "Microsoft Windows Media Audio",
            FileType::Ogg => "Ogg container format",
            FileType::Audible => "Audible.com Audio Codec",
            FileType::Mp4 => "MPEG-4 Part 14 Container Format (Audio+Video Emphasis)",
            FileType::UndefAudio => "Undefined audio file",
            FileType::Wmv => "Microsoft Windows Media Video",
            FileType::Avi => "Audio Video Interleave",
            FileType::Mpeg => "MPEG video stream",
            FileType::Asf => "Microsoft Advanced Systems Format",
            FileType::Qt => "Apple Quicktime container format",
            FileType::UndefVideo => "Undefined video file",
            FileType::Jpeg => "JPEG file",
            FileType::Jfif => "JFIF file",
            FileType::Tiff => "TIFF bitmap file",
            FileType::Bmp => "BMP bitmap file",
            FileType::Gif => "GIF bitmap file",
            FileType::Pict => "PICT bitmap file",
            FileType::Png => "Portable Network Graphics",
            FileType::VCalendar1 => "vCalendar version 1",
            FileType::VCalendar2 => "vCalendar version 2",
            FileType::VCard2 => "vCard version 2",
            FileType::VCard3 => "vCard version 3",
            FileType::WindowsImageFormat => "Microsoft Windows Image Format",
            FileType::WinExec => "Undefined Windows executable file",
            FileType::Text => "Text file",
            FileType::Html => "HTML file",
            FileType::Firmware => "Firmware file",
            FileType::Aac => "Advanced Audio Coding (AAC)/MPEG-2 Part 7/MPEG-4 Part 3",
            FileType::MediaCard => "MediaCard file",
            FileType::Flac => "Free Lossless Audio Codec (FLAC)",
            FileType::Mp2 => "ISO MPEG-1 Audio Layer 2",
            FileType::M4a => "MPEG-4 Part 14 Container Format (Audio Emphasis)",
            FileType::Doc => "Microsoft Word Document",
            FileType::Xml => "XML file",
            FileType::Xls => "Microsoft Excel Spreadsheet (.xls)",
            FileType::Ppt => "Microsoft Powerpoint (.ppt)",
            FileType::Mht => "MHT Compiled HTML Document",
            FileType::Jp2 => "JPEG 2000 file",
            FileType::Jpx => "JPEG 2000 file",
            FileType::Album => "Abstract Album file",
            FileType::Playlist => "Abstract Playlist file",
            FileType::Unknown => "Unknown filetype",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BatteryLevel {
    pub current: u8,
    pub maximum: u8,
}

impl BatteryLevel {
    /// Charge as a rounded percentage of the maximum, `None` when the maximum is zero.
    pub fn percentage(&self) -> Option<u8> {
        if self.maximum == 0 {
            return None;
        }
        let ratio = f64::from(self.current) / f64::from(self.maximum) * 100.0;
        Some(ratio.round().clamp(0.0, 100.0) as u8)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VendorProduct {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl std::fmt::Display for VendorProduct {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "VID:{:04x}, PID:{:04X}", self.vendor_id, self.product_id)
    }
}

/// One file object as reported by a device listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileRecord {
    pub id: u32,
    pub filename: String,
    pub size: u64,
    pub file_type: FileType,
    pub storage_id: u32,
    pub parent_id: u32,
}

// Identity and capability data gathered from the USB descriptor and the MTP DeviceInfo dataset.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceSummary {
    pub vendor_id: u16,
    pub product_id: u16,
    pub bus_number: u8,
    pub address: u8,
    pub standard_version: u16,
    pub vendor_extension_id: u32,
    pub vendor_extension_version: u16,
    pub vendor_extension_desc: String,
    pub manufacturer: String,
    pub model: String,
    pub device_version: String,
    pub serial_number: String,
    pub operations_supported: Vec<u16>,
    pub events_supported: Vec<u16>,
    pub properties_supported: Vec<u16>,
}

impl std::fmt::Display for DeviceSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "USB low-level info:")?;
        writeln!(
            f,
            "   Vendor ID: 0x{:04x}, Product ID: 0x{:04x}",
            self.vendor_id, self.product_id
        )?;
        writeln!(f, "   Bus: {}, Address: {}", self.bus_number, self.address)?;
        writeln!(f, "Device info:")?;
        writeln!(f, "   Manufacturer: {}", self.manufacturer)?;
        writeln!(f, "   Model: {}", self.model)?;
        writeln!(f, "   Device version: {}", self.device_version)?;
        writeln!(f, "   Serial number: {}", self.serial_number)?;
        writeln!(
            f,
            "   Vendor extension ID: 0x{:08x}",
            self.vendor_extension_id
        )?;
        writeln!(
            f,
            "   Vendor extension description: {}",
            self.vendor_extension_desc
        )?;
        writeln!(
            f,
            "   Standard version: {}.{:02}",
            self.standard_version / 100,
            self.standard_version % 100
        )?;

        writeln!(f, "Supported operations:")?;
        for code in &self.operations_supported {
            match OperationCode::from_repr(*code) {
                Some(operation) => writeln!(f, "   {:04x}: {}", code, operation)?,
                None => writeln!(f, "   {:04x}: (unknown)", code)?,
            }
        }

        writeln!(f, "Events supported:")?;
        if self.events_supported.is_empty() {
            writeln!(f, "   None.")?;
        }
        for code in &self.events_supported {
            writeln!(f, "   0x{:04x}", code)?;
        }

        writeln!(f, "Device Properties Supported:")?;
        for code in &self.properties_supported {
            match PropertyCode::from_repr(*code) {
                Some(property) => writeln!(f, "   0x{:04x}: {}", code, property)?,
                None => writeln!(f, "   0x{:04x}: (unknown)", code)?,
            }
        }
        Ok(())
    }
}
