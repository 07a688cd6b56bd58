use std::ffi::{CString, NulError};

use hidapi::{HidApi, HidDevice, HidError};
use tracing::{debug, info, trace};

use crate::protocol::{self, COMMAND_LENGTH, MalformedResponse, Operation, Request};
use crate::registers::RegisterIndex;

/// USB IDs of the C-Media CM6206.
pub const VENDOR_ID: u16 = 0x0d8c;
pub const PRODUCT_ID: u16 = 0x0102;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("could not initialize the HID library")]
    InitHidApi(#[source] HidError),
    #[error("could not open the USB device {1:04x}:{2:04x}")]
    Open(#[source] HidError, u16, u16),
    #[error("{1:?} is not a valid device path")]
    InvalidPath(#[source] NulError, String),
    #[error("could not open the HID device at {1:?}")]
    OpenPath(#[source] HidError, String),
}

#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("could not send the {operation} command for register {register}")]
    Send {
        operation: Operation,
        register: RegisterIndex,
        #[source]
        source: HidError,
    },
    #[error("the {operation} command for register {register} was cut short ({written} of 5 bytes sent)")]
    ShortWrite { operation: Operation, register: RegisterIndex, written: usize },
    #[error("could not receive the value of register {register}")]
    Receive {
        register: RegisterIndex,
        #[source]
        source: HidError,
    },
    #[error("the device sent a malformed response when reading register {register}")]
    Malformed {
        register: RegisterIndex,
        #[source]
        source: MalformedResponse,
    },
}

impl TransportError {
    pub fn register(&self) -> RegisterIndex {
        match *self {
            Self::Send { register, .. }
            | Self::ShortWrite { register, .. }
            | Self::Receive { register, .. }
            | Self::Malformed { register, .. } => register,
        }
    }

    pub fn is_malformed_response(&self) -> bool {
        matches!(self, Self::Malformed { .. })
    }
}

/// Register level access to a device.
pub trait Transport {
    fn read(&mut self, register: RegisterIndex) -> Result<u16, TransportError>;
    fn write(&mut self, register: RegisterIndex, value: u16) -> Result<(), TransportError>;
}

#[derive(clap::Parser, Clone)]
#[group(id = "device::Args")]
pub struct Args {
    /// USB vendor ID of the sound card.
    #[arg(long, default_value = "0x0d8c", value_parser = crate::parse_u16)]
    vendor_id: u16,

    /// USB product ID of the sound card.
    #[arg(long, default_value = "0x0102", value_parser = crate::parse_u16)]
    product_id: u16,

    /// Open the HID device at this path rather than the first device with matching IDs.
    ///
    /// See the `devices` command for a list of paths.
    #[arg(long)]
    path: Option<String>,

    /// Consider a register read failed if the device does not respond in this amount of time.
    #[arg(long, default_value = "1s")]
    read_timeout: humantime::Duration,
}

impl Args {
    pub fn ids(&self) -> (u16, u16) {
        (self.vendor_id, self.product_id)
    }
}

pub struct HidTransport {
    device: HidDevice,
    read_timeout_ms: i32,
    // The device handle must not outlive the library context.
    _api: HidApi,
}

impl HidTransport {
    pub fn open(args: &Args) -> Result<Self, Error> {
        let api = HidApi::new().map_err(Error::InitHidApi)?;
        let device = match &args.path {
            Some(path) => {
                let cpath =
                    CString::new(path.as_str()).map_err(|e| Error::InvalidPath(e, path.clone()))?;
                info!(message = "opening device", %path);
                api.open_path(&cpath).map_err(|e| Error::OpenPath(e, path.clone()))?
            }
            None => {
                info!(
                    message = "opening device",
                    vendor_id = args.vendor_id,
                    product_id = args.product_id
                );
                api.open(args.vendor_id, args.product_id)
                    .map_err(|e| Error::Open(e, args.vendor_id, args.product_id))?
            }
        };
        let read_timeout_ms = i32::try_from(args.read_timeout.as_millis()).unwrap_or(i32::MAX);
        Ok(Self { device, read_timeout_ms, _api: api })
    }

    fn send(&self, request: &Request) -> Result<(), TransportError> {
        let buffer = request.encode();
        let operation = request.operation();
        let register = request.register;
        let written = self
            .device
            .write(&buffer)
            .map_err(|source| TransportError::Send { operation, register, source })?;
        if written != COMMAND_LENGTH {
            return Err(TransportError::ShortWrite { operation, register, written });
        }
        Ok(())
    }
}

impl Transport for HidTransport {
    fn read(&mut self, register: RegisterIndex) -> Result<u16, TransportError> {
        self.send(&Request::read(register))?;
        let mut buffer = [0u8; COMMAND_LENGTH];
        let received = self
            .device
            .read_timeout(&mut buffer, self.read_timeout_ms)
            .map_err(|source| TransportError::Receive { register, source })?;
        trace!(message = "received response", register = register.as_u8(), buffer = ?&buffer[..received]);
        let value = protocol::decode_read_response(register, &buffer[..received])
            .map_err(|source| TransportError::Malformed { register, source })?;
        debug!(message = "read register", register = register.as_u8(), value);
        Ok(value)
    }

    fn write(&mut self, register: RegisterIndex, value: u16) -> Result<(), TransportError> {
        debug!(message = "writing register", register = register.as_u8(), value);
        self.send(&Request::write(register, value))
    }
}

#[derive(serde::Serialize, Debug, Clone)]
pub struct DeviceSummary {
    pub path: String,
    pub serial: Option<String>,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
}

/// HID devices with the given USB IDs that are currently attached.
pub fn list_devices(vendor_id: u16, product_id: u16) -> Result<Vec<DeviceSummary>, Error> {
    let api = HidApi::new().map_err(Error::InitHidApi)?;
    let devices = api
        .device_list()
        .filter(|d| d.vendor_id() == vendor_id && d.product_id() == product_id)
        .map(|d| DeviceSummary {
            path: d.path().to_string_lossy().into_owned(),
            serial: d.serial_number().map(str::to_owned),
            manufacturer: d.manufacturer_string().map(str::to_owned),
            product: d.product_string().map(str::to_owned),
        })
        .collect::<Vec<_>>();
    debug!(message = "enumerated devices", count = devices.len());
    Ok(devices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser as _;

    #[test]
    fn defaults_to_cm6206() {
        let args = Args::try_parse_from(["t"]).unwrap();
        assert_eq!(args.ids(), (VENDOR_ID, PRODUCT_ID));
        assert_eq!(*args.read_timeout, std::time::Duration::from_secs(1));
        let args = Args::try_parse_from(["t", "--product-id", "0x0103", "--read-timeout", "250ms"]);
        let args = args.unwrap();
        assert_eq!(args.ids(), (VENDOR_ID, 0x0103));
        assert_eq!(*args.read_timeout, std::time::Duration::from_millis(250));
    }

    #[test]
    fn errors_name_the_register() {
        let register = RegisterIndex::new(4).unwrap();
        let error = TransportError::ShortWrite { operation: Operation::Write, register, written: 2 };
        assert_eq!(error.register(), register);
        assert_eq!(
            error.to_string(),
            "the write command for register 4 was cut short (2 of 5 bytes sent)"
        );
        assert!(!error.is_malformed_response());
    }
}
