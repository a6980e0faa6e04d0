use crate::device::base::{
    AttachMtp, ExecutableMtp, FullMtpDevice, MtpCommands, MtpDevice, Transaction,
};
use crate::error::{CommandError, ConnectError};
use crate::errorstack::ErrorStack;
use crate::ptp::{encode_command, ContainerHeader, ContainerType, DeviceInfo, Response};
use log::{debug, info, warn};
use mtp_detect_types::{OperationCode, VendorProduct};
use rusb::{
    ConfigDescriptor, Device, DeviceHandle, Direction, GlobalContext, InterfaceDescriptor,
    TransferType,
};
use std::time::Duration;

const CLASS_STILL_IMAGE: u8 = 0x06;
const CLASS_VENDOR_SPECIFIC: u8 = 0xff;
const MICROSOFT_OS_DESCRIPTOR: u8 = 0xee;

// Must be a multiple of every bulk max packet size we'll meet.
const READ_CHUNK: usize = 0x4000;

pub struct MtpUsb {
    handle: DeviceHandle<GlobalContext>,
    device: MtpDevice,

    transaction_id: u32,
    session_open: bool,
    device_info: Option<DeviceInfo>,
    errors: ErrorStack,

    max_packet_size: usize,
    timeout: Duration,
}

impl MtpUsb {
    fn find_device(device: &MtpDevice) -> Result<Device<GlobalContext>, ConnectError> {
        for usb_device in rusb::devices()?.iter() {
            if usb_device.bus_number() == device.bus_number
                && usb_device.address() == device.address
            {
                return Ok(usb_device);
            }
        }
        Err(ConnectError::NoDeviceAttached)
    }

    fn next_transaction_id(&mut self, operation: OperationCode) -> u32 {
        if operation == OperationCode::OpenSession {
            self.transaction_id = 0;
        } else if self.transaction_id >= 0xffff_fffe {
            self.transaction_id = 1;
        } else {
            self.transaction_id += 1;
        }
        self.transaction_id
    }

    fn write_container(&mut self, container: &[u8]) -> Result<(), CommandError> {
        let written = self
            .handle
            .write_bulk(self.device.bulk_out, container, self.timeout)?;
        if written != container.len() {
            return Err(CommandError::UsbError(rusb::Error::Io));
        }

        // A transfer that fills its last packet exactly has to be terminated by a short one.
        if container.len() % self.max_packet_size == 0 {
            self.handle
                .write_bulk(self.device.bulk_out, &[], self.timeout)?;
        }
        Ok(())
    }

    fn read_container(&mut self) -> Result<(ContainerHeader, Vec<u8>), CommandError> {
        let mut buf = vec![0; READ_CHUNK];

        // Skip any zero length packet left over from the previous data phase.
        let mut received = 0;
        for _ in 0..3 {
            received = self
                .handle
                .read_bulk(self.device.bulk_in, &mut buf, self.timeout)?;
            if received > 0 {
                break;
            }
        }

        let header = ContainerHeader::parse(&buf[..received])?;
        let mut container = Vec::with_capacity(header.length as usize);
        container.extend_from_slice(&buf[..received]);

        while container.len() < header.length as usize {
            let read = self
                .handle
                .read_bulk(self.device.bulk_in, &mut buf, self.timeout)?;
            if read == 0 {
                break;
            }
            container.extend_from_slice(&buf[..read]);
        }

        if container.len() < header.length as usize {
            warn!(
                "Short container from device, expected {} bytes but received {}",
                header.length,
                container.len()
            );
            return Err(CommandError::UsbError(rusb::Error::Io));
        }
        container.truncate(header.length as usize);
        Ok((header, container))
    }
}

impl AttachMtp for MtpUsb {
    fn from_device(device: MtpDevice) -> Result<Box<dyn FullMtpDevice>, ConnectError> {
        let usb_device = MtpUsb::find_device(&device)?;
        let handle = usb_device.open()?;

        info!(
            "Connected to possible MTP device at bus {:03} address {:03}",
            device.bus_number, device.address
        );

        // Not every platform lets us detach the kernel driver, carry on regardless.
        if let Err(error) = handle.set_auto_detach_kernel_driver(true) {
            debug!("Kernel driver auto-detach unavailable: {}", error);
        }
        handle.claim_interface(device.interface)?;

        let max_packet_size = max_packet_size(&usb_device, &device).unwrap_or(512);

        let mut mtp = Self {
            handle,
            device,
            transaction_id: 0,
            session_open: false,
            device_info: None,
            errors: ErrorStack::default(),
            max_packet_size,
            timeout: Duration::from_secs(5),
        };

        debug!("Opening MTP session..");
        mtp.open_session()
            .map_err(|error| ConnectError::Connecting(error.to_string()))?;
        mtp.session_open = true;

        debug!("Fetching device info..");
        mtp.get_device_info()
            .map_err(|error| ConnectError::Connecting(error.to_string()))?;
        mtp.errors.clear();

        Ok(Box::new(mtp))
    }
}

impl ExecutableMtp for MtpUsb {
    fn transact(
        &mut self,
        operation: OperationCode,
        params: &[u32],
    ) -> Result<Transaction, CommandError> {
        let needs_session =
            operation != OperationCode::OpenSession && operation != OperationCode::GetDeviceInfo;
        if needs_session && !self.session_open {
            return Err(CommandError::NoSession);
        }

        let transaction_id = self.next_transaction_id(operation);
        debug!(
            "Sending {} (transaction {}) with {:x?}",
            operation, transaction_id, params
        );

        let command = encode_command(operation.id(), transaction_id, params);
        self.write_container(&command)?;

        let mut data = vec![];
        let (mut header, mut container) = self.read_container()?;
        if header.kind == ContainerType::Data {
            data = container.split_off(crate::ptp::HEADER_LENGTH);
            (header, container) = self.read_container()?;
        }

        if header.kind != ContainerType::Response {
            warn!("Expected a response to {}, got {:?}", operation, header.kind);
            return Err(CommandError::UsbError(rusb::Error::Other));
        }

        let response = Response::parse(&container)?;
        if response.transaction_id != transaction_id {
            debug!(
                "Mismatched transaction ids, expected {} received {}",
                transaction_id, response.transaction_id
            );
        }
        debug!(
            "{} answered 0x{:04x} with {} bytes of data",
            operation,
            response.code,
            data.len()
        );

        Ok(Transaction { response, data })
    }

    fn descriptor(&self) -> &MtpDevice {
        &self.device
    }

    fn error_stack(&mut self) -> &mut ErrorStack {
        &mut self.errors
    }

    fn cached_device_info(&self) -> Option<&DeviceInfo> {
        self.device_info.as_ref()
    }

    fn store_device_info(&mut self, info: DeviceInfo) {
        self.device_info = Some(info);
    }
}

impl MtpCommands for MtpUsb {}
impl FullMtpDevice for MtpUsb {}

impl Drop for MtpUsb {
    fn drop(&mut self) {
        if self.session_open {
            if let Err(error) = self.close_session() {
                debug!("Unable to close MTP session cleanly: {}", error);
            }
            self.session_open = false;
        }
        if let Err(error) = self.handle.release_interface(self.device.interface) {
            debug!("Unable to release interface: {}", error);
        }
        debug!(
            "Released MTP device at bus {:03} address {:03}",
            self.device.bus_number, self.device.address
        );
    }
}

fn max_packet_size(device: &Device<GlobalContext>, mtp: &MtpDevice) -> Option<usize> {
    let config = device.active_config_descriptor().ok()?;
    config
        .interfaces()
        .flat_map(|interface| interface.descriptors())
        .flat_map(|descriptor| descriptor.endpoint_descriptors())
        .find(|endpoint| endpoint.address() == mtp.bulk_out)
        .map(|endpoint| endpoint.max_packet_size() as usize)
        .filter(|size| *size > 0)
}

struct Pipes {
    bulk_in: u8,
    bulk_out: u8,
}

fn pipes(descriptor: &InterfaceDescriptor) -> Option<Pipes> {
    let mut bulk_in = None;
    let mut bulk_out = None;

    for endpoint in descriptor.endpoint_descriptors() {
        match (endpoint.transfer_type(), endpoint.direction()) {
            (TransferType::Bulk, Direction::In) => bulk_in = Some(endpoint.address()),
            (TransferType::Bulk, Direction::Out) => bulk_out = Some(endpoint.address()),
            _ => {}
        }
    }

    Some(Pipes {
        bulk_in: bulk_in?,
        bulk_out: bulk_out?,
    })
}

// Vendor specific interfaces only count when the device answers the Microsoft OS descriptor
// request, which is how MTP devices without a PTP class interface identify themselves.
fn has_microsoft_os_descriptor(device: &Device<GlobalContext>) -> bool {
    let Ok(handle) = device.open() else {
        return false;
    };
    match handle.read_string_descriptor_ascii(MICROSOFT_OS_DESCRIPTOR) {
        Ok(descriptor) => descriptor.starts_with("MSFT100"),
        Err(_) => false,
    }
}

fn find_mtp_interface(
    device: &Device<GlobalContext>,
    config: &ConfigDescriptor,
) -> Option<(u8, Pipes)> {
    let mut vendor_candidate = None;

    for interface in config.interfaces() {
        for descriptor in interface.descriptors() {
            let Some(pipes) = pipes(&descriptor) else {
                continue;
            };

            if descriptor.class_code() == CLASS_STILL_IMAGE
                && descriptor.sub_class_code() == 0x01
                && descriptor.protocol_code() == 0x01
            {
                return Some((descriptor.interface_number(), pipes));
            }

            if descriptor.class_code() == CLASS_VENDOR_SPECIFIC && vendor_candidate.is_none() {
                vendor_candidate = Some((descriptor.interface_number(), pipes));
            }
        }
    }

    match vendor_candidate {
        Some(candidate) if has_microsoft_os_descriptor(device) => Some(candidate),
        _ => None,
    }
}

/// Scans the bus for anything exposing an MTP (or plain PTP) interface.
pub fn find_devices() -> Result<Vec<MtpDevice>, rusb::Error> {
    let mut found_devices: Vec<MtpDevice> = Vec::new();

    for device in rusb::devices()?.iter() {
        let Ok(descriptor) = device.device_descriptor() else {
            continue;
        };
        let config = match device.active_config_descriptor() {
            Ok(config) => config,
            Err(_) => match device.config_descriptor(0) {
                Ok(config) => config,
                Err(error) => {
                    debug!("No configuration for {:?}: {}", device, error);
                    continue;
                }
            },
        };

        if let Some((interface, pipes)) = find_mtp_interface(&device, &config) {
            debug!(
                "Found MTP interface {} on {:04x}:{:04x}",
                interface,
                descriptor.vendor_id(),
                descriptor.product_id()
            );
            found_devices.push(MtpDevice {
                bus_number: device.bus_number(),
                address: device.address(),
                vendor_id: descriptor.vendor_id(),
                product_id: descriptor.product_id(),
                interface,
                bulk_in: pipes.bulk_in,
                bulk_out: pipes.bulk_out,
            });
        }
    }

    Ok(found_devices)
}

pub fn detect_descriptor() -> Option<VendorProduct> {
    match find_devices() {
        Ok(devices) => devices.first().map(MtpDevice::vendor_product),
        Err(error) => {
            debug!("Unable to scan the bus: {}", error);
            None
        }
    }
}
