// A scripted Device Service, so the walker can be exercised without hardware.
use mtp_detect_types::{BatteryLevel, DeviceSummary, FileRecord, FileType, VendorProduct};
use mtp_detect_usb::error::{CommandError, ConnectError};
use mtp_detect_usb::errorstack::{ErrorKind, ErrorRecord};
use mtp_detect_usb::service::{DeviceList, DeviceService};
use std::collections::HashMap;
use std::io::Write;

#[derive(Clone, Debug)]
pub enum Scripted<T> {
    Value(T),
    Fail,
}

pub struct MockDevice {
    pub name: &'static str,
    pub errors: Vec<ErrorRecord>,
    pub summary: Scripted<DeviceSummary>,
    pub friendly_name: Scripted<Option<String>>,
    pub sync_partner: Scripted<Option<String>>,
    pub battery: Scripted<BatteryLevel>,
    pub file_types: Scripted<Vec<FileType>>,
    pub secure_time: Scripted<Option<String>>,
    pub certificate: Scripted<Option<String>>,
    pub files: Scripted<Vec<FileRecord>>,
    pub contents: HashMap<u32, Vec<u8>>,
}

impl MockDevice {
    pub fn healthy(name: &'static str) -> Self {
        Self {
            name,
            errors: vec![],
            summary: Scripted::Value(DeviceSummary {
                manufacturer: "ACME".to_string(),
                model: "Jukebox".to_string(),
                ..Default::default()
            }),
            friendly_name: Scripted::Value(Some(name.to_string())),
            sync_partner: Scripted::Value(None),
            battery: Scripted::Value(BatteryLevel {
                current: 2,
                maximum: 3,
            }),
            file_types: Scripted::Value(vec![FileType::Mp3]),
            secure_time: Scripted::Value(Some("<SecureTime/>".to_string())),
            certificate: Scripted::Value(Some("<Cert/>".to_string())),
            files: Scripted::Value(vec![]),
            contents: HashMap::new(),
        }
    }

    fn answer<T: Clone>(
        &mut self,
        probe: &'static str,
        script: &Scripted<T>,
    ) -> Result<T, CommandError> {
        match script {
            Scripted::Value(value) => Ok(value.clone()),
            Scripted::Fail => {
                self.errors.push(ErrorRecord::new(
                    ErrorKind::PtpLayer,
                    format!("{}:{}", self.name, probe),
                ));
                Err(CommandError::Unsupported(probe))
            }
        }
    }
}

#[derive(Default)]
pub struct MockService {
    pub enumeration: Option<Result<Vec<MockDevice>, ConnectError>>,
    pub presence: Option<VendorProduct>,

    pub calls: Vec<String>,
    pub drained: Vec<ErrorRecord>,
    pub clears: usize,
    pub released_files: usize,
    pub released_devices: usize,
    pub fetched: Vec<u32>,
}

impl MockService {
    pub fn with_devices(devices: Vec<MockDevice>) -> Self {
        Self {
            enumeration: Some(Ok(devices)),
            ..Default::default()
        }
    }

    pub fn failing(error: ConnectError) -> Self {
        Self {
            enumeration: Some(Err(error)),
            ..Default::default()
        }
    }

    fn record(&mut self, handle: &MockDevice, probe: &str) {
        self.calls.push(format!("{}:{}", handle.name, probe));
    }
}

impl DeviceService for MockService {
    type Handle = MockDevice;

    fn enumerate(&mut self) -> Result<DeviceList<MockDevice>, ConnectError> {
        match self.enumeration.take() {
            Some(Ok(devices)) => Ok(DeviceList::new(devices)),
            Some(Err(error)) => Err(error),
            None => Err(ConnectError::General("enumerated twice".to_string())),
        }
    }

    fn release(&mut self, devices: DeviceList<MockDevice>) {
        self.released_devices += devices.len();
    }

    fn drain_errors(&mut self, handle: &mut MockDevice) -> Vec<ErrorRecord> {
        let records = std::mem::take(&mut handle.errors);
        self.drained.extend(records.iter().cloned());
        records
    }

    fn clear_errors(&mut self, handle: &mut MockDevice) {
        self.clears += 1;
        handle.errors.clear();
    }

    fn device_info(&mut self, handle: &mut MockDevice) -> Result<DeviceSummary, CommandError> {
        self.record(handle, "device_info");
        let script = handle.summary.clone();
        handle.answer("device_info", &script)
    }

    fn friendly_name(&mut self, handle: &mut MockDevice) -> Result<Option<String>, CommandError> {
        self.record(handle, "friendly_name");
        let script = handle.friendly_name.clone();
        handle.answer("friendly_name", &script)
    }

    fn sync_partner(&mut self, handle: &mut MockDevice) -> Result<Option<String>, CommandError> {
        self.record(handle, "sync_partner");
        let script = handle.sync_partner.clone();
        handle.answer("sync_partner", &script)
    }

    fn battery_level(&mut self, handle: &mut MockDevice) -> Result<BatteryLevel, CommandError> {
        self.record(handle, "battery_level");
        let script = handle.battery.clone();
        handle.answer("battery_level", &script)
    }

    fn supported_file_types(
        &mut self,
        handle: &mut MockDevice,
    ) -> Result<Vec<FileType>, CommandError> {
        self.record(handle, "supported_file_types");
        let script = handle.file_types.clone();
        handle.answer("supported_file_types", &script)
    }

    fn secure_time(&mut self, handle: &mut MockDevice) -> Result<Option<String>, CommandError> {
        self.record(handle, "secure_time");
        let script = handle.secure_time.clone();
        handle.answer("secure_time", &script)
    }

    fn device_certificate(
        &mut self,
        handle: &mut MockDevice,
    ) -> Result<Option<String>, CommandError> {
        self.record(handle, "device_certificate");
        let script = handle.certificate.clone();
        handle.answer("device_certificate", &script)
    }

    fn list_files(&mut self, handle: &mut MockDevice) -> Result<Vec<FileRecord>, CommandError> {
        self.record(handle, "list_files");
        let script = handle.files.clone();
        handle.answer("list_files", &script)
    }

    fn release_file(&mut self, _file: FileRecord) {
        self.released_files += 1;
    }

    fn fetch_file(
        &mut self,
        handle: &mut MockDevice,
        id: u32,
        sink: &mut dyn Write,
    ) -> Result<(), CommandError> {
        self.record(handle, "fetch_file");
        self.fetched.push(id);

        match handle.contents.get(&id) {
            Some(contents) => sink.write_all(contents).map_err(CommandError::WriteFailed),
            None => {
                handle.errors.push(ErrorRecord::new(
                    ErrorKind::PtpLayer,
                    format!("{}:fetch_file GetObject failed for {}", handle.name, id),
                ));
                Err(CommandError::response(0x2009))
            }
        }
    }

    fn detect_presence(&mut self) -> Option<VendorProduct> {
        self.presence
    }
}
