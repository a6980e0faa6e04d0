use crate::decoder::FragmentDecoder;
use anyhow::Result;
use log::{debug, error, info, warn};
use mtp_detect_usb::error::{CommandError, ConnectError};
use mtp_detect_usb::service::DeviceService;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::process::ExitCode;

pub const DEFAULT_FRAGMENT_NAME: &str = "WMPInfo.xml";
pub const FRAGMENT_CAPACITY: usize = 0x10000;

#[derive(Debug, Clone)]
pub struct WalkerConfig {
    pub fragment_name: String,
    pub fragment_capacity: usize,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            fragment_name: DEFAULT_FRAGMENT_NAME.to_string(),
            fragment_capacity: FRAGMENT_CAPACITY,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Failure,
}

impl ExitStatus {
    pub fn code(&self) -> u8 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::Failure => 1,
        }
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status.code())
    }
}

/// Walks every connected device through the fixed list of probes, writing the report to `out`.
///
/// Probes are independent: a failing probe has its errors cleared (and, for some, dumped) and
/// the walk carries on with the next one. The decoder lives as long as the walker, so a byte
/// order mark seen in one device's fragment still applies to the next.
pub struct SessionWalker<S: DeviceService, W: Write> {
    service: S,
    out: W,
    decoder: FragmentDecoder,
    config: WalkerConfig,
}

impl<S: DeviceService, W: Write> SessionWalker<S, W> {
    pub fn new(service: S, out: W, config: WalkerConfig) -> Self {
        Self {
            service,
            out,
            decoder: FragmentDecoder::new(),
            config,
        }
    }

    #[cfg(test)]
    pub fn into_parts(self) -> (S, W) {
        (self.service, self.out)
    }

    pub fn run_probe(&mut self) -> Result<ExitStatus> {
        match self.service.detect_presence() {
            Some(device) => {
                writeln!(self.out, "DETECTED MTP DEVICE WITH {}", device)?;
                Ok(ExitStatus::Success)
            }
            None => {
                info!("No MTP device detected");
                Ok(ExitStatus::Failure)
            }
        }
    }

    pub fn run_diagnostics(&mut self) -> Result<ExitStatus> {
        writeln!(self.out, "Attempting to connect device(s)")?;

        let mut devices = match self.service.enumerate() {
            Ok(devices) => devices,
            Err(ConnectError::NoDeviceAttached) => {
                writeln!(self.out, "Detect: No Devices have been found")?;
                return Ok(ExitStatus::Success);
            }
            Err(ConnectError::Connecting(reason)) => {
                debug!("Connection failure: {}", reason);
                error!("Detect: There has been an error connecting. Exiting");
                return Ok(ExitStatus::Failure);
            }
            Err(ConnectError::MemoryAllocation) => {
                error!("Detect: Encountered a Memory Allocation Error. Exiting");
                return Ok(ExitStatus::Failure);
            }
            Err(ConnectError::General(reason)) => {
                // Enumeration only produces the errors above, getting here is a bug.
                error!(
                    "Detect: There has been an unknown error, please report this to the developers: {}",
                    reason
                );
                return Ok(ExitStatus::Failure);
            }
        };

        if devices.is_empty() {
            writeln!(self.out, "Detect: No Devices have been found")?;
            self.service.release(devices);
            return Ok(ExitStatus::Success);
        }

        writeln!(self.out, "Detect: Successfully connected")?;
        self.out.flush()?;

        let result = devices
            .iter_mut()
            .try_for_each(|handle| self.walk_device(handle));
        self.service.release(devices);
        result?;

        writeln!(self.out, "OK.")?;
        self.out.flush()?;
        Ok(ExitStatus::Success)
    }

    fn walk_device(&mut self, handle: &mut S::Handle) -> Result<()> {
        self.dump_errors(handle);

        match self.service.device_info(handle) {
            Ok(summary) => write!(self.out, "{}", summary)?,
            Err(error) => {
                warn!("Unable to read device info: {}", error);
                self.dump_errors(handle);
            }
        }

        writeln!(self.out, "MTP-specific device properties:")?;
        let name = self.service.friendly_name(handle);
        self.print_property(handle, "Friendly name", name)?;
        let partner = self.service.sync_partner(handle);
        self.print_property(handle, "Synchronization partner", partner)?;

        self.print_battery(handle)?;
        self.print_file_types(handle)?;

        let secure_time = self.service.secure_time(handle);
        self.print_xml(handle, "Secure Time", secure_time)?;
        let certificate = self.service.device_certificate(handle);
        self.print_xml(handle, "Device Certificate", certificate)?;

        if let Some(id) = self.find_fragment(handle) {
            self.print_fragment(handle, id)?;
        }
        Ok(())
    }

    fn dump_errors(&mut self, handle: &mut S::Handle) {
        for record in self.service.drain_errors(handle) {
            error!("{}", record);
        }
        self.service.clear_errors(handle);
    }

    fn print_property(
        &mut self,
        handle: &mut S::Handle,
        label: &str,
        result: Result<Option<String>, CommandError>,
    ) -> Result<()> {
        let value = match result {
            Ok(value) => value,
            Err(error) => {
                debug!("{} unavailable: {}", label, error);
                self.service.clear_errors(handle);
                None
            }
        };
        writeln!(
            self.out,
            "   {}: {}",
            label,
            value.as_deref().unwrap_or("(NULL)")
        )?;
        Ok(())
    }

    // Plenty of devices can't report a battery level, so failures here stay quiet.
    fn print_battery(&mut self, handle: &mut S::Handle) -> Result<()> {
        let level = match self.service.battery_level(handle) {
            Ok(level) => level,
            Err(error) => {
                debug!("Battery level unavailable: {}", error);
                self.service.clear_errors(handle);
                return Ok(());
            }
        };

        match level.percentage() {
            Some(percent) => writeln!(
                self.out,
                "   Battery level {} of {} ({}%)",
                level.current, level.maximum, percent
            )?,
            None => {
                debug!("Battery reported a maximum level of zero");
                self.service.clear_errors(handle);
            }
        }
        Ok(())
    }

    fn print_file_types(&mut self, handle: &mut S::Handle) -> Result<()> {
        match self.service.supported_file_types(handle) {
            Ok(file_types) => {
                writeln!(self.out, "Supported (playable) filetypes:")?;
                for file_type in file_types {
                    let description = self.service.describe_file_type(file_type);
                    writeln!(self.out, "   {}", description)?;
                }
            }
            Err(error) => {
                warn!("Unable to read supported file types: {}", error);
                self.dump_errors(handle);
            }
        }
        Ok(())
    }

    fn print_xml(
        &mut self,
        handle: &mut S::Handle,
        title: &str,
        result: Result<Option<String>, CommandError>,
    ) -> Result<()> {
        match result {
            Ok(Some(xml)) if !xml.is_empty() => writeln!(self.out, "\n{}:\n{}", title, xml)?,
            Ok(_) => self.service.clear_errors(handle),
            Err(error) => {
                debug!("{} unavailable: {}", title, error);
                self.service.clear_errors(handle);
            }
        }
        Ok(())
    }

    // Every record goes back to the service, whether or not it matched.
    fn find_fragment(&mut self, handle: &mut S::Handle) -> Option<u32> {
        let files = match self.service.list_files(handle) {
            Ok(files) => files,
            Err(error) => {
                debug!("Unable to list files: {}", error);
                self.service.clear_errors(handle);
                return None;
            }
        };

        debug!("Device lists {} file(s)", files.len());
        let mut found = None;
        for file in files {
            if file.filename == self.config.fragment_name {
                found = Some(file.id);
            }
            self.service.release_file(file);
        }

        // Objects that couldn't be described are left behind on the stack.
        self.service.clear_errors(handle);
        found
    }

    fn print_fragment(&mut self, handle: &mut S::Handle, id: u32) -> Result<()> {
        let name = self.config.fragment_name.clone();
        let capacity = self.config.fragment_capacity;

        let mut spool = match tempfile::tempfile() {
            Ok(spool) => spool,
            Err(error) => {
                warn!("Unable to create a temporary file for {}: {}", name, error);
                return Ok(());
            }
        };

        if let Err(error) = self.service.fetch_file(handle, id, &mut spool) {
            warn!("Unable to fetch {}: {}", name, error);
            self.dump_errors(handle);
            return Ok(());
        }

        let buffer = match read_fragment(&mut spool, capacity) {
            Ok(buffer) => buffer,
            Err(error) => {
                warn!("Unable to read back {}: {}", name, error);
                return Ok(());
            }
        };

        if buffer.len() < 2 || buffer.len() >= capacity {
            debug!(
                "Ignoring {} of {} bytes, expected between 2 and {}",
                name,
                buffer.len(),
                capacity - 1
            );
            return Ok(());
        }

        writeln!(self.out, "\nDevice description {} file:", name)?;
        self.decoder.dump(&buffer, &mut self.out)?;
        Ok(())
    }
}

/// Rewinds the spool and reads at most `capacity` bytes from it.
pub fn read_fragment<R: Read + Seek>(spool: &mut R, capacity: usize) -> io::Result<Vec<u8>> {
    spool.seek(SeekFrom::Start(0))?;
    let mut buffer = Vec::with_capacity(capacity);
    spool.by_ref().take(capacity as u64).read_to_end(&mut buffer)?;
    Ok(buffer)
}
