use std::path::PathBuf;

use csv_core::WriteResult;

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    /// Human readable text.
    Text,
    Table,
    Jsonl,
    Csv,
}

#[derive(clap::Parser)]
#[group(id = "output::Args")]
pub struct Args {
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,
    #[arg(long, short = 'f', value_enum, default_value_t = Format::Text)]
    format: Format,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("could not open the specified output file at {1:?}")]
    OpenOutputFile(#[source] std::io::Error, PathBuf),
    #[error("could not write data to the output file at {1:?}")]
    WriteFile(#[source] std::io::Error, PathBuf),
    #[error("could not write data to the terminal")]
    WriteStdout(#[source] std::io::Error),
    #[error("could not serialize the result to JSON")]
    SerializeJson(#[source] serde_json::Error),
}

impl Args {
    /// Whether the output ends up on an interactive terminal.
    pub fn is_terminal(&self) -> bool {
        use std::io::IsTerminal as _;
        self.output.is_none() && std::io::stdout().is_terminal()
    }

    pub fn to_output(self) -> Result<Output, Error> {
        let io = match &self.output {
            None => Box::new(std::io::stdout().lock()) as Box<_>,
            Some(path) => Box::new(
                std::fs::OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(path)
                    .map_err(|e| Error::OpenOutputFile(e, path.clone()))?,
            ) as Box<_>,
        };
        let formatter = match &self.format {
            Format::Text => Formatter::Text,
            Format::Table => {
                let mut comfy = comfy_table::Table::new();
                comfy.set_content_arrangement(comfy_table::ContentArrangement::Dynamic);
                Formatter::Table { comfy }
            }
            Format::Jsonl => Formatter::Jsonl,
            Format::Csv => Formatter::Csv { written_records: false },
        };
        Ok(Output { path: self.output, io, formatter })
    }
}

pub struct Output {
    path: Option<PathBuf>,
    io: Box<dyn std::io::Write>,
    formatter: Formatter,
}

enum Formatter {
    Text,
    Csv { written_records: bool },
    Table { comfy: comfy_table::Table },
    Jsonl,
}

impl Output {
    pub fn is_text(&self) -> bool {
        matches!(self.formatter, Formatter::Text)
    }

    pub fn table_headers(&mut self, hdrs: Vec<&'static str>) -> Result<(), Error> {
        match &mut self.formatter {
            Formatter::Csv { written_records } => {
                if *written_records {
                    panic!("table headers for csv must be written very first!");
                }
                *written_records = true;
                self.write_csv_row(&hdrs)?;
            }
            Formatter::Table { comfy } => {
                comfy.set_header(hdrs);
            }
            Formatter::Text | Formatter::Jsonl => {}
        }
        Ok(())
    }

    fn write_csv_row<V: std::ops::Deref<Target = str>>(
        &mut self,
        values: &[V],
    ) -> Result<(), Error> {
        let max_len = 2 + 2 * values.iter().map(|v| v.len()).max().unwrap_or(0);
        let mut output = vec![0; max_len];
        let mut writer = csv_core::Writer::new();
        for (idx, value) in values.iter().enumerate() {
            if idx != 0 {
                let (WriteResult::InputEmpty, ob) = writer.delimiter(&mut output) else {
                    panic!("something wrong with csv output");
                };
                self.io.write_all(&output[..ob]).map_err(|e| self.write_error(e))?;
            }
            let inp = value.as_bytes();
            let (WriteResult::InputEmpty, ib, ob) = writer.field(inp, &mut output) else {
                panic!("something wrong with csv output");
            };
            assert_eq!(value.len(), ib);
            self.io.write_all(&output[..ob]).map_err(|e| self.write_error(e))?;
        }
        let (WriteResult::InputEmpty, ob) = writer.terminator(&mut output) else {
            panic!("something wrong with csv output");
        };
        self.io.write_all(&output[..ob]).map_err(|e| self.write_error(e))
    }

    /// Emit one record. Text output prints the table row separated by tabs.
    pub fn result<R: serde::Serialize>(
        &mut self,
        table_row: impl FnOnce() -> Vec<String>,
        serde_record: impl FnOnce() -> R,
    ) -> Result<(), Error> {
        match &mut self.formatter {
            Formatter::Text => {
                let line = table_row().join("\t");
                writeln!(self.io, "{line}").map_err(|e| self.write_error(e))?
            }
            Formatter::Csv { written_records } => {
                *written_records = true;
                let values = table_row();
                self.write_csv_row(&values)?;
            }
            Formatter::Table { comfy } => {
                comfy.add_row(table_row());
            }
            Formatter::Jsonl => {
                serde_json::to_writer(&mut self.io, &serde_record())
                    .map_err(Error::SerializeJson)?;
                writeln!(self.io).map_err(|e| self.write_error(e))?
            }
        }
        Ok(())
    }

    /// Write preformatted text. Ignored by the structured formats.
    pub fn text(&mut self, text: &str) -> Result<(), Error> {
        if let Formatter::Text = self.formatter {
            self.io.write_all(text.as_bytes()).map_err(|e| self.write_error(e))?;
        }
        Ok(())
    }

    fn write_error(&self, e: std::io::Error) -> Error {
        match &self.path {
            None => Error::WriteStdout(e),
            Some(p) => Error::WriteFile(e, p.into()),
        }
    }

    pub fn commit(mut self) -> Result<(), Error> {
        match &self.formatter {
            Formatter::Text | Formatter::Csv { written_records: _ } | Formatter::Jsonl => {}
            Formatter::Table { comfy } => {
                self.io.write_fmt(format_args!("{}\n", comfy)).map_err(|e| self.write_error(e))?;
            }
        }
        self.io.flush().map_err(|e| self.write_error(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default)]
    struct Shared(std::rc::Rc<std::cell::RefCell<Vec<u8>>>);

    impl std::io::Write for Shared {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn output(formatter: Formatter) -> (Output, Shared) {
        let sink = Shared::default();
        (Output { path: None, io: Box::new(sink.clone()), formatter }, sink)
    }

    fn contents(sink: &Shared) -> String {
        String::from_utf8(sink.0.borrow().clone()).unwrap()
    }

    #[derive(serde::Serialize)]
    struct Record {
        register: u8,
        name: &'static str,
    }

    fn emit(out: &mut Output) {
        out.table_headers(vec!["Register", "Name"]).unwrap();
        out.result(
            || vec!["0".to_string(), "DMA Master".to_string()],
            || Record { register: 0, name: "DMA Master" },
        )
        .unwrap();
        out.result(
            || vec!["2".to_string(), "Mute \"Center\"".to_string()],
            || Record { register: 2, name: "Mute \"Center\"" },
        )
        .unwrap();
    }

    #[test]
    fn csv_quotes() {
        let (mut out, sink) = output(Formatter::Csv { written_records: false });
        emit(&mut out);
        out.commit().unwrap();
        assert_eq!(
            contents(&sink),
            "Register,Name\n0,DMA Master\n2,\"Mute \"\"Center\"\"\"\n"
        );
    }

    #[test]
    fn jsonl_one_record_per_line() {
        let (mut out, sink) = output(Formatter::Jsonl);
        emit(&mut out);
        out.text("ignored").unwrap();
        out.commit().unwrap();
        let text = contents(&sink);
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], r#"{"register":0,"name":"DMA Master"}"#);
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn text_rows_are_tab_separated() {
        let (mut out, sink) = output(Formatter::Text);
        emit(&mut out);
        out.text("raw\n").unwrap();
        out.commit().unwrap();
        assert_eq!(contents(&sink), "0\tDMA Master\n2\tMute \"Center\"\nraw\n");
    }
}
