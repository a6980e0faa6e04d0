// The Device Service is the seam between the diagnostics walk and the hardware. Everything the
// walker needs from a device goes through here, so it can be driven by libusb in production and
// by a scripted fake in tests.
use crate::device::base::FullMtpDevice;
use crate::device::{detect_descriptor, find_devices, from_device};
use crate::error::{CommandError, ConnectError};
use crate::errorstack::ErrorRecord;
use log::{debug, info, warn};
use mtp_detect_types::{BatteryLevel, DeviceSummary, FileRecord, FileType, VendorProduct};
use std::io::Write;

/// Connected devices, in the order they were enumerated.
pub struct DeviceList<H> {
    devices: Vec<H>,
}

impl<H> DeviceList<H> {
    pub fn new(devices: Vec<H>) -> Self {
        Self { devices }
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, H> {
        self.devices.iter_mut()
    }
}

pub trait DeviceService {
    type Handle;

    fn enumerate(&mut self) -> Result<DeviceList<Self::Handle>, ConnectError>;
    fn release(&mut self, devices: DeviceList<Self::Handle>);

    fn drain_errors(&mut self, handle: &mut Self::Handle) -> Vec<ErrorRecord>;
    fn clear_errors(&mut self, handle: &mut Self::Handle);

    fn device_info(&mut self, handle: &mut Self::Handle) -> Result<DeviceSummary, CommandError>;
    fn friendly_name(&mut self, handle: &mut Self::Handle) -> Result<Option<String>, CommandError>;
    fn sync_partner(&mut self, handle: &mut Self::Handle) -> Result<Option<String>, CommandError>;
    fn battery_level(&mut self, handle: &mut Self::Handle) -> Result<BatteryLevel, CommandError>;
    fn supported_file_types(
        &mut self,
        handle: &mut Self::Handle,
    ) -> Result<Vec<FileType>, CommandError>;

    fn describe_file_type(&self, file_type: FileType) -> &'static str {
        file_type.description()
    }

    fn secure_time(&mut self, handle: &mut Self::Handle) -> Result<Option<String>, CommandError>;
    fn device_certificate(
        &mut self,
        handle: &mut Self::Handle,
    ) -> Result<Option<String>, CommandError>;

    fn list_files(&mut self, handle: &mut Self::Handle) -> Result<Vec<FileRecord>, CommandError>;
    fn release_file(&mut self, file: FileRecord);
    fn fetch_file(
        &mut self,
        handle: &mut Self::Handle,
        id: u32,
        sink: &mut dyn Write,
    ) -> Result<(), CommandError>;

    fn detect_presence(&mut self) -> Option<VendorProduct>;
}

/// The libusb backed service.
#[derive(Default)]
pub struct UsbDeviceService;

impl UsbDeviceService {
    pub fn new() -> Self {
        Self
    }
}

impl DeviceService for UsbDeviceService {
    type Handle = Box<dyn FullMtpDevice>;

    fn enumerate(&mut self) -> Result<DeviceList<Self::Handle>, ConnectError> {
        let candidates = find_devices()?;
        if candidates.is_empty() {
            return Err(ConnectError::NoDeviceAttached);
        }

        let mut devices = Vec::with_capacity(candidates.len());
        let mut last_error = None;
        for candidate in candidates {
            let location = (candidate.bus_number(), candidate.address());
            match from_device(candidate) {
                Ok(device) => devices.push(device),
                Err(error) => {
                    warn!(
                        "Unable to open device at bus {:03} address {:03}: {}",
                        location.0, location.1, error
                    );
                    last_error = Some(error);
                }
            }
        }

        if devices.is_empty() {
            return Err(match last_error {
                Some(ConnectError::MemoryAllocation) => ConnectError::MemoryAllocation,
                Some(error) => ConnectError::Connecting(error.to_string()),
                None => ConnectError::NoDeviceAttached,
            });
        }

        info!("Connected to {} MTP device(s)", devices.len());
        Ok(DeviceList::new(devices))
    }

    fn release(&mut self, devices: DeviceList<Self::Handle>) {
        debug!("Releasing {} device(s)", devices.len());
        drop(devices);
    }

    fn drain_errors(&mut self, handle: &mut Self::Handle) -> Vec<ErrorRecord> {
        handle.error_stack().drain()
    }

    fn clear_errors(&mut self, handle: &mut Self::Handle) {
        handle.error_stack().clear();
    }

    fn device_info(&mut self, handle: &mut Self::Handle) -> Result<DeviceSummary, CommandError> {
        handle.device_summary()
    }

    fn friendly_name(&mut self, handle: &mut Self::Handle) -> Result<Option<String>, CommandError> {
        handle.friendly_name()
    }

    fn sync_partner(&mut self, handle: &mut Self::Handle) -> Result<Option<String>, CommandError> {
        handle.sync_partner()
    }

    fn battery_level(&mut self, handle: &mut Self::Handle) -> Result<BatteryLevel, CommandError> {
        handle.battery_level()
    }

    fn supported_file_types(
        &mut self,
        handle: &mut Self::Handle,
    ) -> Result<Vec<FileType>, CommandError> {
        handle.supported_file_types()
    }

    fn secure_time(&mut self, handle: &mut Self::Handle) -> Result<Option<String>, CommandError> {
        handle.secure_time()
    }

    fn device_certificate(
        &mut self,
        handle: &mut Self::Handle,
    ) -> Result<Option<String>, CommandError> {
        handle.device_certificate()
    }

    fn list_files(&mut self, handle: &mut Self::Handle) -> Result<Vec<FileRecord>, CommandError> {
        handle.list_files()
    }

    fn release_file(&mut self, file: FileRecord) {
        drop(file);
    }

    fn fetch_file(
        &mut self,
        handle: &mut Self::Handle,
        id: u32,
        sink: &mut dyn Write,
    ) -> Result<(), CommandError> {
        handle.fetch_file(id, sink)
    }

    fn detect_presence(&mut self) -> Option<VendorProduct> {
        detect_descriptor()
    }
}
