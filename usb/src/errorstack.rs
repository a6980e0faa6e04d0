// Every device carries a stack of error records. The transport pushes a record whenever an
// operation fails, and the caller is expected to drain (or clear) the stack before issuing the
// next operation, so a stale error is never attributed to a later request.
use crate::error::CommandError;
use strum::Display;

#[derive(Copy, Clone, Debug, Display, PartialEq, Eq)]
pub enum ErrorKind {
    General,
    PtpLayer,
    UsbLayer,
    MemoryAllocation,
    NoDeviceAttached,
    StorageFull,
    Connecting,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorRecord {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn from_command_error(context: &str, error: &CommandError) -> Self {
        let kind = match error {
            CommandError::UsbError(rusb::Error::NoMem) => ErrorKind::MemoryAllocation,
            CommandError::UsbError(rusb::Error::NoDevice) => ErrorKind::NoDeviceAttached,
            CommandError::UsbError(_) => ErrorKind::UsbLayer,
            CommandError::Response(code) if code.0 == 0x200c => ErrorKind::StorageFull,
            CommandError::Response(code) if code.0 == 0x201f => ErrorKind::Cancelled,
            CommandError::Response(_) | CommandError::MalformedResponse(_) => ErrorKind::PtpLayer,
            CommandError::Unsupported(_)
            | CommandError::NoSession
            | CommandError::WriteFailed(_) => ErrorKind::General,
        };
        Self::new(kind, format!("{}: {}", context, error))
    }
}

impl std::fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

#[derive(Debug, Default)]
pub struct ErrorStack {
    records: Vec<ErrorRecord>,
}

impl ErrorStack {
    pub fn push(&mut self, record: ErrorRecord) {
        self.records.push(record);
    }

    /// Removes and returns every pending record, oldest first.
    pub fn drain(&mut self) -> Vec<ErrorRecord> {
        std::mem::take(&mut self.records)
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
