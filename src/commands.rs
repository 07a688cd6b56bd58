use std::io::Write;

use crate::device::{self, HidTransport, Transport, TransportError};
use crate::registers::{REGISTER_COUNT, RegisterIndex};
use crate::store::RegisterStore;
use crate::{ExitStatus, output};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("could not open the sound card")]
    Open(#[source] device::Error),
    #[error("could not list the attached sound cards")]
    Enumerate(#[source] device::Error),
    #[error("could not read the registers")]
    Refresh(#[source] TransportError),
    #[error("could not write to register {1}")]
    Write(#[source] TransportError, RegisterIndex),
    #[error("could not initialize the registers")]
    Init(#[source] TransportError),
    #[error("could not output the result")]
    Output(#[source] output::Error),
}

impl ExitStatus for Error {
    fn exit_status(&self) -> i32 {
        match self {
            Error::Open(e) | Error::Enumerate(e) => e.exit_status(),
            Error::Refresh(e) | Error::Write(e, _) | Error::Init(e) => e.exit_status(),
            Error::Output(e) => e.exit_status(),
        }
    }
}

fn stdout_error(e: std::io::Error) -> Error {
    Error::Output(output::Error::WriteStdout(e))
}

fn open(args: &device::Args) -> Result<HidTransport, Error> {
    HidTransport::open(args).map_err(Error::Open)
}

/// Read all registers of the device.
///
/// Every command starts here, so the returned store is always valid and matches `values`.
fn connect<T: Transport>(
    transport: &mut T,
) -> Result<(RegisterStore, [u16; REGISTER_COUNT]), Error> {
    let mut store = RegisterStore::new();
    let values = store.refresh_all(transport).map_err(Error::Refresh)?;
    Ok((store, values))
}

fn write_access<W: Write>(
    out: &mut W,
    verb: &str,
    register: RegisterIndex,
    value: u16,
    mask: u16,
) -> Result<(), Error> {
    writeln!(out, "{verb} Register {register}, Value 0x{value:04X}, Mask 0x{mask:04X}")
        .map_err(stdout_error)
}

pub mod read {
    use super::*;

    /// Read a register, or some of its bits.
    #[derive(clap::Parser)]
    pub struct Args {
        #[clap(flatten)]
        device: device::Args,
        /// Register number, 0 to 5.
        register: RegisterIndex,
        /// Only report the bits set in this mask (e.g. 0x6000).
        #[arg(long, short = 'm', default_value = "0xFFFF", value_parser = crate::parse_u16)]
        mask: u16,
        /// Only output the value.
        #[arg(long, short = 'q')]
        quiet: bool,
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let mut transport = open(&args.device)?;
        execute(&args, &mut transport, &mut std::io::stdout().lock())
    }

    pub fn execute<T: Transport, W: Write>(
        args: &Args,
        transport: &mut T,
        out: &mut W,
    ) -> Result<(), Error> {
        let (_store, values) = connect(transport)?;
        let value = values[args.register.as_usize()];
        if !args.quiet {
            write_access(out, "Reading from", args.register, value, args.mask)?;
        }
        writeln!(out, "{}", value & args.mask).map_err(stdout_error)
    }
}

pub mod write {
    use super::*;
    use crate::store::WriteRequest;

    /// Change some or all bits of a register, leaving the others as they are.
    #[derive(clap::Parser)]
    pub struct Args {
        #[clap(flatten)]
        device: device::Args,
        /// Register number, 0 to 5.
        register: RegisterIndex,
        /// New value for the bits selected by the mask.
        #[arg(value_parser = crate::parse_u16)]
        value: u16,
        /// Only write the bits set in this mask (e.g. 0x8000).
        #[arg(long, short = 'm', default_value = "0xFFFF", value_parser = crate::parse_u16)]
        mask: u16,
        /// Only output the resulting value.
        #[arg(long, short = 'q')]
        quiet: bool,
    }

    impl Args {
        fn request(&self) -> WriteRequest {
            WriteRequest { register: self.register, mask: self.mask, bits: self.value }
        }
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let mut transport = open(&args.device)?;
        execute(&args, &mut transport, &mut std::io::stdout().lock())
    }

    pub fn execute<T: Transport, W: Write>(
        args: &Args,
        transport: &mut T,
        out: &mut W,
    ) -> Result<(), Error> {
        execute_request(args.request(), args.quiet, transport, out)
    }

    /// Perform the masked write and report the masked value read back from the device.
    pub(crate) fn execute_request<T: Transport, W: Write>(
        request: WriteRequest,
        quiet: bool,
        transport: &mut T,
        out: &mut W,
    ) -> Result<(), Error> {
        let (mut store, _) = connect(transport)?;
        if !quiet {
            write_access(out, "Writing to", request.register, request.bits, request.mask)?;
        }
        let value = store
            .write_masked(transport, request)
            .map_err(|e| Error::Write(e, request.register))?;
        if !quiet {
            write_access(out, "Reading from", request.register, value, request.mask)?;
        }
        writeln!(out, "{}", value & request.mask).map_err(stdout_error)
    }
}

pub mod dma {
    use super::*;
    use crate::store::WriteRequest;

    const DMA_MASTER_BIT: u16 = 0x8000;

    #[derive(clap::ValueEnum, Clone, Copy, Debug)]
    pub enum Master {
        /// Stream to the SPDIF output.
        Spdif,
        /// Stream to the analog outputs.
        Dac,
    }

    /// Select where the playback stream goes. Shortcut for `write 0 <0x8000|0> -m 0x8000`.
    #[derive(clap::Parser)]
    pub struct Args {
        #[clap(flatten)]
        device: device::Args,
        #[arg(value_enum)]
        master: Master,
        /// Only output the resulting value.
        #[arg(long, short = 'q')]
        quiet: bool,
    }

    pub fn request(master: Master) -> WriteRequest {
        let bits = match master {
            Master::Spdif => DMA_MASTER_BIT,
            Master::Dac => 0,
        };
        WriteRequest { register: RegisterIndex::SPDIF_OUT, mask: DMA_MASTER_BIT, bits }
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let mut transport = open(&args.device)?;
        execute(&args, &mut transport, &mut std::io::stdout().lock())
    }

    pub fn execute<T: Transport, W: Write>(
        args: &Args,
        transport: &mut T,
        out: &mut W,
    ) -> Result<(), Error> {
        super::write::execute_request(request(args.master), args.quiet, transport, out)
    }
}

pub mod init {
    use super::*;

    /// Initialize all registers to the values the Linux driver uses.
    #[derive(clap::Parser)]
    pub struct Args {
        #[clap(flatten)]
        device: device::Args,
        /// Do not output anything.
        #[arg(long, short = 'q')]
        quiet: bool,
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let mut transport = open(&args.device)?;
        execute(&args, &mut transport, &mut std::io::stdout().lock())
    }

    pub fn execute<T: Transport, W: Write>(
        args: &Args,
        transport: &mut T,
        out: &mut W,
    ) -> Result<(), Error> {
        let (mut store, _) = connect(transport)?;
        if !args.quiet {
            writeln!(out, "Initializing registers...").map_err(stdout_error)?;
        }
        let values = store.apply_init(transport).map_err(Error::Init)?;
        if !args.quiet {
            for register in RegisterIndex::all() {
                let value = values[register.as_usize()];
                writeln!(out, "Register {register}: 0x{value:04X}").map_err(stdout_error)?;
            }
        }
        Ok(())
    }
}

pub mod dump {
    use super::*;
    use crate::render::{RegisterReport, TextStyle};

    #[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
    pub enum Color {
        /// Highlight when writing to a terminal.
        Auto,
        Always,
        Never,
    }

    /// Decode the content of all registers.
    ///
    /// Fields that differ from their reset value are highlighted.
    #[derive(clap::Parser)]
    pub struct Args {
        #[clap(flatten)]
        device: device::Args,
        #[clap(flatten)]
        output: output::Args,
        /// List all possible values next to each field.
        #[arg(long, short = 'v')]
        verbose: bool,
        /// Leave out register headers.
        #[arg(long, short = 'q')]
        quiet: bool,
        #[arg(long, value_enum, default_value_t = Color::Auto)]
        color: Color,
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let mut transport = open(&args.device)?;
        let (_store, values) = connect(&mut transport)?;
        let style = TextStyle {
            ansi: match args.color {
                Color::Auto => args.output.is_terminal(),
                Color::Always => true,
                Color::Never => false,
            },
            verbose: args.verbose,
            quiet: args.quiet,
        };
        let reports = RegisterIndex::all()
            .map(|r| RegisterReport::new(r, values[r.as_usize()]))
            .collect::<Vec<_>>();
        let mut output = args.output.to_output().map_err(Error::Output)?;
        write_reports(&mut output, &style, &reports).map_err(Error::Output)?;
        output.commit().map_err(Error::Output)
    }

    pub fn write_reports(
        output: &mut output::Output,
        style: &TextStyle,
        reports: &[RegisterReport],
    ) -> Result<(), output::Error> {
        if output.is_text() {
            for report in reports {
                output.text(&style.render(report))?;
            }
            return Ok(());
        }
        output.table_headers(vec!["Register", "Bits", "Field", "Value", "Text", "Default"])?;
        for report in reports {
            for field in &report.fields {
                output.result(
                    || {
                        vec![
                            field.register.to_string(),
                            field.bits.clone(),
                            field.name.to_string(),
                            field.value.to_string(),
                            field.text.clone(),
                            if field.is_default { "yes" } else { "no" }.to_string(),
                        ]
                    },
                    || field,
                )?;
            }
        }
        Ok(())
    }
}

pub mod fields {
    use super::*;
    use crate::registers::{FieldKind, REGISTERS};

    /// Search and output the known register fields.
    #[derive(clap::Parser)]
    pub struct Args {
        #[clap(flatten)]
        output: output::Args,
        /// Only list fields whose name contains this text, or fields of this register number.
        filter: Option<String>,
    }

    #[derive(serde::Serialize)]
    pub struct FieldSchema {
        pub register: u8,
        pub bits: String,
        pub name: &'static str,
        pub kind: &'static str,
        pub default: u16,
        pub choices: Vec<(u16, &'static str)>,
        pub fallback: Option<&'static str>,
    }

    impl FieldSchema {
        pub fn all_fields() -> impl Iterator<Item = Self> {
            REGISTERS.iter().flat_map(|register| {
                register.fields.iter().map(move |field| {
                    let (choices, fallback) = match field.kind {
                        FieldKind::Flag { on, off } => (vec![(0, off), (1, on)], None),
                        FieldKind::Enum { labels, fallback } => (labels.to_vec(), Some(fallback)),
                        FieldKind::Range | FieldKind::Reserved => (Vec::new(), None),
                    };
                    FieldSchema {
                        register: register.index.as_u8(),
                        bits: field.bits(),
                        name: field.name,
                        kind: field.kind.name(),
                        default: field.extract(register.default_value),
                        choices,
                        fallback,
                    }
                })
            })
        }

        pub fn is_match(&self, pattern: &str) -> bool {
            if self.name.to_uppercase().contains(&pattern.to_uppercase()) {
                return true;
            }
            crate::parse_number(pattern).is_ok_and(|n| n == u64::from(self.register))
        }

        fn choices_text(&self) -> String {
            let mut text = self
                .choices
                .iter()
                .map(|(v, l)| format!("{v}=\"{l}\""))
                .collect::<Vec<_>>()
                .join(", ");
            if let Some(fallback) = self.fallback {
                text.push_str(&format!(", else \"{fallback}\""));
            }
            text
        }
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let mut output = args.output.to_output().map_err(Error::Output)?;
        output
            .table_headers(vec!["Register", "Bits", "Name", "Kind", "Default", "Choices"])
            .map_err(Error::Output)?;
        for field in FieldSchema::all_fields() {
            if let Some(pattern) = &args.filter {
                if !field.is_match(pattern) {
                    continue;
                }
            }
            output
                .result(
                    || {
                        vec![
                            field.register.to_string(),
                            field.bits.clone(),
                            field.name.to_string(),
                            field.kind.to_string(),
                            field.default.to_string(),
                            field.choices_text(),
                        ]
                    },
                    || &field,
                )
                .map_err(Error::Output)?;
        }
        output.commit().map_err(Error::Output)
    }
}

pub mod devices {
    use super::*;

    /// List attached sound cards.
    #[derive(clap::Parser)]
    pub struct Args {
        #[clap(flatten)]
        device: device::Args,
        #[clap(flatten)]
        output: output::Args,
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let (vendor_id, product_id) = args.device.ids();
        let devices = device::list_devices(vendor_id, product_id).map_err(Error::Enumerate)?;
        let mut output = args.output.to_output().map_err(Error::Output)?;
        if devices.is_empty() && output.is_text() {
            output
                .text(&format!("Found no USB devices with ID {vendor_id:04X}:{product_id:04X}\n"))
                .map_err(Error::Output)?;
        }
        output
            .table_headers(vec!["Path", "Serial", "Manufacturer", "Product"])
            .map_err(Error::Output)?;
        for d in &devices {
            output
                .result(
                    || {
                        vec![
                            d.path.clone(),
                            d.serial.clone().unwrap_or_default(),
                            d.manufacturer.clone().unwrap_or_default(),
                            d.product.clone().unwrap_or_default(),
                        ]
                    },
                    || d,
                )
                .map_err(Error::Output)?;
        }
        output.commit().map_err(Error::Output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{RegisterReport, TextStyle};

    #[test]
    fn dma_shortcuts() {
        let spdif = dma::request(dma::Master::Spdif);
        assert_eq!((spdif.register.as_u8(), spdif.mask, spdif.bits), (0, 0x8000, 0x8000));
        let dac = dma::request(dma::Master::Dac);
        assert_eq!((dac.register.as_u8(), dac.mask, dac.bits), (0, 0x8000, 0x0000));
    }

    #[test]
    fn field_filter() {
        let matching = fields::FieldSchema::all_fields()
            .filter(|f| f.is_match("gpio5"))
            .map(|f| f.bits)
            .collect::<Vec<_>>();
        assert_eq!(matching, ["[01]", "[00]"]);
        assert_eq!(fields::FieldSchema::all_fields().filter(|f| f.is_match("3")).count(), 14);
        let total = fields::FieldSchema::all_fields().count();
        assert_eq!(total, 7 + 16 + 14 + 12 + 16 + 12);
    }

    #[test]
    fn cli_parses() {
        use clap::Parser as _;

        #[derive(clap::Parser)]
        enum Cli {
            Read(read::Args),
            Write(write::Args),
            Dump(dump::Args),
        }

        assert!(Cli::try_parse_from(["t", "read", "2", "-m", "0x6000", "-q"]).is_ok());
        assert!(Cli::try_parse_from(["t", "write", "0", "0x8000", "-m", "0x8000"]).is_ok());
        assert!(Cli::try_parse_from(["t", "dump", "-v", "--color", "never", "-f", "jsonl"]).is_ok());
        let Err(error) = Cli::try_parse_from(["t", "read", "6"]) else {
            panic!("register 6 was accepted");
        };
        assert_eq!(error.exit_code(), crate::exit_status::USAGE);
        assert!(Cli::try_parse_from(["t", "read", "1", "-m", "0x10000"]).is_err());
        assert!(Cli::try_parse_from(["t", "write", "1", "70000"]).is_err());
    }

    #[test]
    fn structured_dump_has_a_row_per_field() {
        let reports = RegisterIndex::all()
            .map(|r| RegisterReport::new(r, r.register().default_value))
            .collect::<Vec<_>>();
        let path = std::env::temp_dir().join(format!("cm6206-dump-{}.jsonl", std::process::id()));
        let args = <output::Args as clap::Parser>::try_parse_from([
            "t",
            "-f",
            "jsonl",
            "-o",
            path.to_str().unwrap(),
        ])
        .unwrap();
        let mut output = args.to_output().unwrap();
        dump::write_reports(&mut output, &TextStyle::default(), &reports).unwrap();
        output.commit().unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(text.lines().count(), 77);
        let first: serde_json::Value = serde_json::from_str(text.lines().next().unwrap()).unwrap();
        assert_eq!(first["name"], "DMA Master");
        assert_eq!(first["text"], "DAC");
        assert_eq!(first["is_default"], true);
    }
}
