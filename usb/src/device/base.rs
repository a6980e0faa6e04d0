use crate::error::{CommandError, ConnectError};
use crate::errorstack::{ErrorRecord, ErrorStack};
use crate::ptp::{
    decode_units, DatasetReader, DeviceInfo, ObjectInfo, PropertyDesc, PropertyForm, Response,
    ALL_STORAGE, FORMAT_ASSOCIATION,
};
use log::debug;
use mtp_detect_types::{
    BatteryLevel, DeviceSummary, FileRecord, FileType, OperationCode, PropertyCode, VendorProduct,
};
use std::io::Write;

const SESSION_ID: u32 = 1;
const RESPONSE_SESSION_ALREADY_OPEN: u16 = 0x201e;

// This is a basic SuperTrait which defines all the 'Parts' of an MTP device for use.
pub trait FullMtpDevice: AttachMtp + MtpCommands {}

pub trait AttachMtp {
    fn from_device(device: MtpDevice) -> Result<Box<dyn FullMtpDevice>, ConnectError>
    where
        Self: Sized;
}

pub struct Transaction {
    pub response: Response,
    pub data: Vec<u8>,
}

pub trait ExecutableMtp {
    /// Performs one PTP transaction: the command phase, any incoming data phase, and the
    /// response phase.
    fn transact(
        &mut self,
        operation: OperationCode,
        params: &[u32],
    ) -> Result<Transaction, CommandError>;

    fn descriptor(&self) -> &MtpDevice;
    fn error_stack(&mut self) -> &mut ErrorStack;
    fn cached_device_info(&self) -> Option<&DeviceInfo>;
    fn store_device_info(&mut self, info: DeviceInfo);
}

// Everything the tool asks of a device, built on top of transact.
pub trait MtpCommands: ExecutableMtp {
    fn record_error(&mut self, context: &str, error: CommandError) -> CommandError {
        let record = ErrorRecord::from_command_error(context, &error);
        debug!("Recording device error: {}", record);
        self.error_stack().push(record);
        error
    }

    fn request_data(
        &mut self,
        operation: OperationCode,
        params: &[u32],
    ) -> Result<Vec<u8>, CommandError> {
        let error = match self.transact(operation, params) {
            Ok(transaction) if transaction.response.is_ok() => return Ok(transaction.data),
            Ok(transaction) => CommandError::response(transaction.response.code),
            Err(error) => error,
        };
        Err(self.record_error(&operation.to_string(), error))
    }

    fn unsupported(&mut self, what: &'static str) -> CommandError {
        self.record_error(what, CommandError::Unsupported(what))
    }

    fn supports_property(&self, property: PropertyCode) -> bool {
        self.cached_device_info()
            .is_some_and(|info| info.supports_property(property.id()))
    }

    fn open_session(&mut self) -> Result<(), CommandError> {
        let transaction = self.transact(OperationCode::OpenSession, &[SESSION_ID])?;
        if !transaction.response.is_ok()
            && transaction.response.code != RESPONSE_SESSION_ALREADY_OPEN
        {
            return Err(CommandError::response(transaction.response.code));
        }
        Ok(())
    }

    fn close_session(&mut self) -> Result<(), CommandError> {
        self.request_data(OperationCode::CloseSession, &[])?;
        Ok(())
    }

    fn get_device_info(&mut self) -> Result<DeviceInfo, CommandError> {
        let operation = OperationCode::GetDeviceInfo;
        let data = self.request_data(operation, &[])?;
        let info = DeviceInfo::parse(&data)
            .map_err(|error| self.record_error(&operation.to_string(), error))?;
        self.store_device_info(info.clone());
        Ok(info)
    }

    fn get_property_desc(&mut self, property: PropertyCode) -> Result<PropertyDesc, CommandError> {
        let operation = OperationCode::GetDevicePropDesc;
        let data = self.request_data(operation, &[property.id() as u32])?;
        PropertyDesc::parse(&data)
            .map_err(|error| self.record_error(&operation.to_string(), error))
    }

    fn get_property_string(&mut self, property: PropertyCode) -> Result<String, CommandError> {
        let operation = OperationCode::GetDevicePropValue;
        let data = self.request_data(operation, &[property.id() as u32])?;
        DatasetReader::new(&data)
            .read_string()
            .map_err(|error| self.record_error(&operation.to_string(), error))
    }

    // The device certificate is sent as an AUINT16 array rather than a string.
    fn get_property_unicode(&mut self, property: PropertyCode) -> Result<String, CommandError> {
        let operation = OperationCode::GetDevicePropValue;
        let data = self.request_data(operation, &[property.id() as u32])?;
        match DatasetReader::new(&data).read_u16_array() {
            Ok(units) => Ok(decode_units(&units)),
            Err(error) => Err(self.record_error(&operation.to_string(), error)),
        }
    }

    fn get_object_handles(
        &mut self,
        storage: u32,
        format: u16,
        parent: u32,
    ) -> Result<Vec<u32>, CommandError> {
        let operation = OperationCode::GetObjectHandles;
        let data = self.request_data(operation, &[storage, format as u32, parent])?;
        DatasetReader::new(&data)
            .read_u32_array()
            .map_err(|error| self.record_error(&operation.to_string(), error))
    }

    fn get_object_info(&mut self, handle: u32) -> Result<ObjectInfo, CommandError> {
        let operation = OperationCode::GetObjectInfo;
        let data = self.request_data(operation, &[handle])?;
        ObjectInfo::parse(&data)
            .map_err(|error| self.record_error(&operation.to_string(), error))
    }

    fn get_object(&mut self, handle: u32) -> Result<Vec<u8>, CommandError> {
        self.request_data(OperationCode::GetObject, &[handle])
    }

    fn device_summary(&mut self) -> Result<DeviceSummary, CommandError> {
        let info = self.get_device_info()?;
        let device = self.descriptor();
        Ok(DeviceSummary {
            vendor_id: device.vendor_id,
            product_id: device.product_id,
            bus_number: device.bus_number,
            address: device.address,
            standard_version: info.standard_version,
            vendor_extension_id: info.vendor_extension_id,
            vendor_extension_version: info.vendor_extension_version,
            vendor_extension_desc: info.vendor_extension_desc,
            manufacturer: info.manufacturer,
            model: info.model,
            device_version: info.device_version,
            serial_number: info.serial_number,
            operations_supported: info.operations_supported,
            events_supported: info.events_supported,
            properties_supported: info.properties_supported,
        })
    }

    fn friendly_name(&mut self) -> Result<Option<String>, CommandError> {
        if !self.supports_property(PropertyCode::DeviceFriendlyName) {
            return Ok(None);
        }
        self.get_property_string(PropertyCode::DeviceFriendlyName)
            .map(Some)
    }

    fn sync_partner(&mut self) -> Result<Option<String>, CommandError> {
        if !self.supports_property(PropertyCode::SynchronizationPartner) {
            return Ok(None);
        }
        self.get_property_string(PropertyCode::SynchronizationPartner)
            .map(Some)
    }

    fn secure_time(&mut self) -> Result<Option<String>, CommandError> {
        if !self.supports_property(PropertyCode::SecureTime) {
            return Ok(None);
        }
        self.get_property_string(PropertyCode::SecureTime).map(Some)
    }

    fn device_certificate(&mut self) -> Result<Option<String>, CommandError> {
        if !self.supports_property(PropertyCode::DeviceCertificate) {
            return Ok(None);
        }
        self.get_property_unicode(PropertyCode::DeviceCertificate)
            .map(Some)
    }

    fn battery_level(&mut self) -> Result<BatteryLevel, CommandError> {
        if !self.supports_property(PropertyCode::BatteryLevel) {
            return Err(self.unsupported("Battery level"));
        }

        let desc = self.get_property_desc(PropertyCode::BatteryLevel)?;
        let maximum = match desc.form {
            PropertyForm::Range { maximum, .. } => maximum,
            PropertyForm::Enumeration(values) => values.into_iter().max().unwrap_or(0),
            PropertyForm::None => return Err(self.unsupported("Battery level range")),
        };

        Ok(BatteryLevel {
            current: u8::try_from(desc.current).unwrap_or(u8::MAX),
            maximum: u8::try_from(maximum).unwrap_or(u8::MAX),
        })
    }

    fn supported_file_types(&mut self) -> Result<Vec<FileType>, CommandError> {
        let formats = match self.cached_device_info() {
            Some(info) => info.playback_formats.clone(),
            None => self.get_device_info()?.playback_formats,
        };

        Ok(formats
            .into_iter()
            .map(FileType::from_format_code)
            .filter(|file_type| *file_type != FileType::Unknown)
            .collect())
    }

    /// Lists every non-folder object on every storage. Objects whose info can't be read are
    /// left on the error stack and skipped.
    fn list_files(&mut self) -> Result<Vec<FileRecord>, CommandError> {
        let handles = self.get_object_handles(ALL_STORAGE, 0, 0)?;
        let mut files = Vec::with_capacity(handles.len());

        for handle in handles {
            let info = match self.get_object_info(handle) {
                Ok(info) => info,
                Err(error) => {
                    debug!("Skipping object {:08x}: {}", handle, error);
                    continue;
                }
            };
            if info.format == FORMAT_ASSOCIATION {
                continue;
            }

            files.push(FileRecord {
                id: handle,
                filename: info.filename,
                size: u64::from(info.compressed_size),
                file_type: FileType::from_format_code(info.format),
                storage_id: info.storage_id,
                parent_id: info.parent,
            });
        }
        Ok(files)
    }

    fn fetch_file(&mut self, handle: u32, sink: &mut dyn Write) -> Result<(), CommandError> {
        let data = self.get_object(handle)?;
        sink.write_all(&data)
            .and_then(|_| sink.flush())
            .map_err(|error| self.record_error("GetObject", CommandError::WriteFailed(error)))
    }
}

// Where an MTP interface lives on the bus, and the pipes used to talk to it.
#[derive(Debug, Clone)]
pub struct MtpDevice {
    pub(crate) bus_number: u8,
    pub(crate) address: u8,
    pub(crate) vendor_id: u16,
    pub(crate) product_id: u16,
    pub(crate) interface: u8,
    pub(crate) bulk_in: u8,
    pub(crate) bulk_out: u8,
}

impl MtpDevice {
    pub fn bus_number(&self) -> u8 {
        self.bus_number
    }
    pub fn address(&self) -> u8 {
        self.address
    }
    pub fn vendor_product(&self) -> VendorProduct {
        VendorProduct {
            vendor_id: self.vendor_id,
            product_id: self.product_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errorstack::ErrorKind;
    use crate::ptp::{DatasetWriter, FORM_ENUMERATION, FORM_RANGE, TYPE_UINT8};
    use std::io;

    enum Reply {
        Data(Vec<u8>),
        Status(u16),
    }

    // Answers each transaction from a script keyed on the operation and its first parameter.
    struct ScriptedMtp {
        device: MtpDevice,
        errors: ErrorStack,
        info: Option<DeviceInfo>,
        script: Vec<(OperationCode, u32, Reply)>,
        sent: Vec<OperationCode>,
    }

    impl ScriptedMtp {
        fn new(properties: &[PropertyCode]) -> Self {
            Self {
                device: MtpDevice {
                    bus_number: 1,
                    address: 4,
                    vendor_id: 0x045e,
                    product_id: 0x0710,
                    interface: 0,
                    bulk_in: 0x81,
                    bulk_out: 0x02,
                },
                errors: ErrorStack::default(),
                info: Some(DeviceInfo {
                    properties_supported: properties.iter().map(|p| p.id()).collect(),
                    ..Default::default()
                }),
                script: vec![],
                sent: vec![],
            }
        }

        fn reply(mut self, operation: OperationCode, param: u32, reply: Reply) -> Self {
            self.script.push((operation, param, reply));
            self
        }
    }

    impl ExecutableMtp for ScriptedMtp {
        fn transact(
            &mut self,
            operation: OperationCode,
            params: &[u32],
        ) -> Result<Transaction, CommandError> {
            self.sent.push(operation);
            let first = params.first().copied().unwrap_or(0);
            let reply = self
                .script
                .iter()
                .find(|(op, param, _)| *op == operation && *param == first)
                .map(|(_, _, reply)| reply);

            let (code, data) = match reply {
                Some(Reply::Data(data)) => (0x2001, data.clone()),
                Some(Reply::Status(code)) => (*code, vec![]),
                None => (0x2005, vec![]),
            };
            Ok(Transaction {
                response: Response {
                    code,
                    transaction_id: 1,
                    params: vec![],
                },
                data,
            })
        }

        fn descriptor(&self) -> &MtpDevice {
            &self.device
        }

        fn error_stack(&mut self) -> &mut ErrorStack {
            &mut self.errors
        }

        fn cached_device_info(&self) -> Option<&DeviceInfo> {
            self.info.as_ref()
        }

        fn store_device_info(&mut self, info: DeviceInfo) {
            self.info = Some(info);
        }
    }

    impl MtpCommands for ScriptedMtp {}

    struct BrokenSink;

    impl Write for BrokenSink {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn battery_desc(current: u8, form: DatasetWriter) -> Vec<u8> {
        let header = DatasetWriter::default()
            .u16(PropertyCode::BatteryLevel.id())
            .u16(TYPE_UINT8)
            .u8(0)
            .u8(100)
            .u8(current)
            .build();
        [header, form.build()].concat()
    }

    fn object_info(format: u16, filename: &str) -> Vec<u8> {
        let mut writer = DatasetWriter::default()
            .u32(0x0001_0001)
            .u16(format)
            .u16(0)
            .u32(64)
            .u16(0);
        for _ in 0..6 {
            writer = writer.u32(0);
        }
        writer
            .u32(0)
            .u16(0)
            .u32(0)
            .u32(0)
            .string(filename)
            .build()
    }

    #[test]
    fn truncated_device_info_is_recorded() {
        let mut device = ScriptedMtp::new(&[]).reply(
            OperationCode::GetDeviceInfo,
            0,
            Reply::Data(vec![0x64, 0x00, 0x06]),
        );
        device.info = None;

        let result = device.supported_file_types();
        assert!(matches!(result, Err(CommandError::MalformedResponse(_))));

        let records = device.errors.drain();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, ErrorKind::PtpLayer);
        assert!(records[0].message.starts_with("GetDeviceInfo: "));
    }

    #[test]
    fn malformed_property_value_is_recorded() {
        let mut device = ScriptedMtp::new(&[PropertyCode::DeviceCertificate]).reply(
            OperationCode::GetDevicePropValue,
            PropertyCode::DeviceCertificate.id() as u32,
            Reply::Data(vec![0x05, 0x00, 0x00, 0x00, 0x41]),
        );

        assert!(device.device_certificate().is_err());
        let records = device.errors.drain();
        assert_eq!(records.len(), 1);
        assert!(records[0].message.starts_with("GetDevicePropValue: "));
    }

    #[test]
    fn unlisted_properties() {
        let mut device = ScriptedMtp::new(&[]);

        assert_eq!(device.friendly_name().unwrap(), None);
        assert_eq!(device.sync_partner().unwrap(), None);
        assert_eq!(device.secure_time().unwrap(), None);
        assert_eq!(device.device_certificate().unwrap(), None);
        assert!(device.sent.is_empty());
        assert!(device.errors.drain().is_empty());

        assert!(matches!(
            device.battery_level(),
            Err(CommandError::Unsupported(_))
        ));
        assert!(device.sent.is_empty());
        assert_eq!(device.errors.drain().len(), 1);
    }

    #[test]
    fn string_properties() {
        let name = PropertyCode::DeviceFriendlyName;
        let time = PropertyCode::SecureTime;
        let mut device = ScriptedMtp::new(&[name, time])
            .reply(
                OperationCode::GetDevicePropValue,
                name.id() as u32,
                Reply::Data(DatasetWriter::default().string("Jukebox").build()),
            )
            .reply(
                OperationCode::GetDevicePropValue,
                time.id() as u32,
                Reply::Data(DatasetWriter::default().string("<SecureTime/>").build()),
            );

        assert_eq!(device.friendly_name().unwrap().as_deref(), Some("Jukebox"));
        assert_eq!(device.secure_time().unwrap().as_deref(), Some("<SecureTime/>"));
    }

    #[test]
    fn certificate_is_read_as_unit_array() {
        let certificate = PropertyCode::DeviceCertificate;
        let units: Vec<u16> = "<Cert/>".encode_utf16().collect();
        let mut device = ScriptedMtp::new(&[certificate]).reply(
            OperationCode::GetDevicePropValue,
            certificate.id() as u32,
            Reply::Data(DatasetWriter::default().u16_array(&units).build()),
        );

        assert_eq!(device.device_certificate().unwrap().as_deref(), Some("<Cert/>"));
    }

    #[test]
    fn battery_maximum_from_range() {
        let form = DatasetWriter::default().u8(FORM_RANGE).u8(0).u8(100).u8(1);
        let mut device = ScriptedMtp::new(&[PropertyCode::BatteryLevel]).reply(
            OperationCode::GetDevicePropDesc,
            PropertyCode::BatteryLevel.id() as u32,
            Reply::Data(battery_desc(40, form)),
        );

        let level = device.battery_level().unwrap();
        assert_eq!(level.current, 40);
        assert_eq!(level.maximum, 100);
    }

    #[test]
    fn battery_maximum_from_enumeration() {
        let form = DatasetWriter::default()
            .u8(FORM_ENUMERATION)
            .u16(3)
            .u8(0)
            .u8(3)
            .u8(2);
        let mut device = ScriptedMtp::new(&[PropertyCode::BatteryLevel]).reply(
            OperationCode::GetDevicePropDesc,
            PropertyCode::BatteryLevel.id() as u32,
            Reply::Data(battery_desc(2, form)),
        );

        let level = device.battery_level().unwrap();
        assert_eq!(level.current, 2);
        assert_eq!(level.maximum, 3);
    }

    #[test]
    fn battery_without_a_form_fails() {
        let form = DatasetWriter::default().u8(0);
        let mut device = ScriptedMtp::new(&[PropertyCode::BatteryLevel]).reply(
            OperationCode::GetDevicePropDesc,
            PropertyCode::BatteryLevel.id() as u32,
            Reply::Data(battery_desc(50, form)),
        );

        assert!(matches!(
            device.battery_level(),
            Err(CommandError::Unsupported(_))
        ));
        assert_eq!(device.errors.drain().len(), 1);
    }

    #[test]
    fn listing_skips_folders_and_unreadable_objects() {
        let mut device = ScriptedMtp::new(&[])
            .reply(
                OperationCode::GetObjectHandles,
                ALL_STORAGE,
                Reply::Data(DatasetWriter::default().u32_array(&[1, 2, 3]).build()),
            )
            .reply(
                OperationCode::GetObjectInfo,
                1,
                Reply::Data(object_info(FORMAT_ASSOCIATION, "Music")),
            )
            .reply(OperationCode::GetObjectInfo, 2, Reply::Status(0x2009))
            .reply(
                OperationCode::GetObjectInfo,
                3,
                Reply::Data(object_info(0x3009, "WMPInfo.xml")),
            );

        let files = device.list_files().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].id, 3);
        assert_eq!(files[0].filename, "WMPInfo.xml");
        assert_eq!(files[0].file_type, FileType::Mp3);
        assert_eq!(files[0].size, 64);

        let records = device.errors.drain();
        assert_eq!(records.len(), 1);
        assert!(records[0].message.contains("InvalidObjectHandle"));
    }

    #[test]
    fn failed_object_read_is_recorded() {
        let mut device =
            ScriptedMtp::new(&[]).reply(OperationCode::GetObject, 9, Reply::Status(0x2009));
        let mut sink = Vec::new();

        assert!(matches!(
            device.fetch_file(9, &mut sink),
            Err(CommandError::Response(_))
        ));
        assert!(sink.is_empty());
        assert_eq!(
            device.errors.drain()[0].to_string(),
            "PtpLayer: GetObject: Device responded with InvalidObjectHandle (0x2009)"
        );
    }

    #[test]
    fn sink_failure_is_recorded() {
        let mut device =
            ScriptedMtp::new(&[]).reply(OperationCode::GetObject, 9, Reply::Data(vec![1, 2, 3]));

        assert!(matches!(
            device.fetch_file(9, &mut BrokenSink),
            Err(CommandError::WriteFailed(_))
        ));
        let records = device.errors.drain();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, ErrorKind::General);
        assert!(records[0].message.starts_with("GetObject: "));
    }
}
