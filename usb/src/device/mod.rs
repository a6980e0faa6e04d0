// This file wraps the libusb backend into a few plain functions, so the rest of the crate
// never has to know how devices are located, opened or spoken to.
use crate::device::base::{AttachMtp, FullMtpDevice, MtpDevice};
use crate::error::ConnectError;
use mtp_detect_types::VendorProduct;

pub mod base;

mod libusb;
use crate::device::libusb::device;

pub fn find_devices() -> Result<Vec<MtpDevice>, ConnectError> {
    Ok(device::find_devices()?)
}

pub fn detect_descriptor() -> Option<VendorProduct> {
    device::detect_descriptor()
}

pub fn from_device(device: MtpDevice) -> Result<Box<dyn FullMtpDevice>, ConnectError> {
    device::MtpUsb::from_device(device)
}
