use mtp_detect_types::ResponseCode;

#[derive(thiserror::Error, Debug)]
pub enum ConnectError {
    #[error("No MTP device was found")]
    NoDeviceAttached,

    #[error("Unable to connect to the device: {0}")]
    Connecting(String),

    #[error("Memory allocation failed while connecting")]
    MemoryAllocation,

    #[error("Unexpected error: {0}")]
    General(String),
}

impl From<rusb::Error> for ConnectError {
    fn from(error: rusb::Error) -> Self {
        match error {
            rusb::Error::NoMem => ConnectError::MemoryAllocation,
            rusb::Error::NoDevice => ConnectError::NoDeviceAttached,
            rusb::Error::Io
            | rusb::Error::Access
            | rusb::Error::Busy
            | rusb::Error::Timeout
            | rusb::Error::Pipe
            | rusb::Error::NotFound => ConnectError::Connecting(error.to_string()),
            _ => ConnectError::General(error.to_string()),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum CommandError {
    #[error("USB error: {0}")]
    UsbError(#[from] rusb::Error),

    #[error("Malformed response from device")]
    MalformedResponse(#[from] std::io::Error),

    #[error("Device responded with {0}")]
    Response(ResponseDisplay),

    #[error("{0} is not supported by this device")]
    Unsupported(&'static str),

    #[error("No MTP session is open")]
    NoSession,

    #[error("Unable to write transferred data: {0}")]
    WriteFailed(std::io::Error),
}

impl CommandError {
    pub fn response(code: u16) -> Self {
        CommandError::Response(ResponseDisplay(code))
    }
}

/// A PTP response code, shown by name where one is known.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ResponseDisplay(pub u16);

impl std::fmt::Display for ResponseDisplay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match ResponseCode::from_repr(self.0) {
            Some(code) => write!(f, "{} (0x{:04x})", code, self.0),
            None => write!(f, "unknown response 0x{:04x}", self.0),
        }
    }
}
