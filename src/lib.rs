pub mod commands;
pub mod device;
pub mod output;
pub mod protocol;
pub mod registers;
pub mod render;
pub mod store;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NumberError {
    #[error("{0:?} is not a number")]
    Parse(String),
    #[error("{0:#x} is out of range [0;0xFFFF]")]
    TooLarge(u64),
    #[error(transparent)]
    Register(#[from] registers::OutOfRange),
}

/// Parse an unsigned number written in C notation: `0x` hexadecimal, `0` octal or decimal.
pub fn parse_number(s: &str) -> Result<u64, NumberError> {
    let trimmed = s.trim();
    let (digits, radix) = if let Some(hex) =
        trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X"))
    {
        (hex, 16)
    } else if let Some(octal) = trimmed.strip_prefix("0o") {
        (octal, 8)
    } else if trimmed.len() > 1 && trimmed.starts_with('0') {
        (&trimmed[1..], 8)
    } else {
        (trimmed, 10)
    };
    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return Err(NumberError::Parse(s.to_string()));
    }
    u64::from_str_radix(digits, radix).map_err(|_| NumberError::Parse(s.to_string()))
}

/// [`parse_number`] limited to a 16 bit register value or mask.
pub fn parse_u16(s: &str) -> Result<u16, NumberError> {
    let value = parse_number(s)?;
    u16::try_from(value).map_err(|_| NumberError::TooLarge(value))
}

/// Process exit status for a failure.
pub trait ExitStatus {
    fn exit_status(&self) -> i32;
}

pub mod exit_status {
    /// Invalid command line, reported by `clap`.
    pub const USAGE: i32 = 2;
    pub const OPEN_DEVICE: i32 = 3;
    pub const DEVICE_IO: i32 = 4;
    pub const MALFORMED_RESPONSE: i32 = 5;
    pub const OUTPUT: i32 = 6;
}

impl ExitStatus for device::Error {
    fn exit_status(&self) -> i32 {
        exit_status::OPEN_DEVICE
    }
}

impl ExitStatus for device::TransportError {
    fn exit_status(&self) -> i32 {
        if self.is_malformed_response() {
            exit_status::MALFORMED_RESPONSE
        } else {
            exit_status::DEVICE_IO
        }
    }
}

impl ExitStatus for output::Error {
    fn exit_status(&self) -> i32 {
        exit_status::OUTPUT
    }
}
