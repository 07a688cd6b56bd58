//! Decoding of register values into per-field reports and their textual form.

use crate::registers::{Field, FieldKind, Register, RegisterIndex};

mod ansi {
    pub const HEADER: &str = "\x1b[36m";
    pub const BOLD: &str = "\x1b[1m";
    pub const RESET: &str = "\x1b[0m";
}

/// Column (1-based) at which field values are printed.
const VALUE_COLUMN: usize = 43;
/// Column (1-based) at which the list of choices is printed in verbose mode.
const CHOICES_COLUMN: usize = 67;

/// One value a field can take.
#[derive(serde::Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub value: u16,
    pub label: &'static str,
    pub selected: bool,
}

#[derive(serde::Serialize, Debug, Clone)]
pub struct FieldReport {
    pub register: u8,
    pub bits: String,
    pub name: &'static str,
    pub kind: &'static str,
    pub value: u16,
    pub text: String,
    pub is_default: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Choice>,
}

impl FieldReport {
    pub fn new(register: &Register, field: &Field, register_value: u16) -> Self {
        let value = field.extract(register_value);
        let text = match field.kind {
            FieldKind::Range => value.to_string(),
            FieldKind::Reserved => String::new(),
            FieldKind::Flag { .. } | FieldKind::Enum { .. } => {
                field.label_of(value).unwrap_or_default().to_string()
            }
        };
        let choices = match field.kind {
            FieldKind::Flag { on, off } => vec![
                Choice { value: 0, label: off, selected: value == 0 },
                Choice { value: 1, label: on, selected: value == 1 },
            ],
            FieldKind::Enum { labels, .. } => {
                let selected = labels.iter().rposition(|(v, _)| *v == value);
                labels
                    .iter()
                    .enumerate()
                    .map(|(i, &(v, label))| Choice { value: v, label, selected: Some(i) == selected })
                    .collect()
            }
            FieldKind::Range | FieldKind::Reserved => Vec::new(),
        };
        Self {
            register: register.index.as_u8(),
            bits: field.bits(),
            name: field.name,
            kind: field.kind.name(),
            value,
            text,
            is_default: register.is_field_default(register_value, field),
            choices,
        }
    }
}

#[derive(serde::Serialize, Debug, Clone)]
pub struct RegisterReport {
    pub register: u8,
    pub value: u16,
    pub default_value: u16,
    pub is_default: bool,
    pub fields: Vec<FieldReport>,
}

impl RegisterReport {
    pub fn new(index: RegisterIndex, value: u16) -> Self {
        let register = Register::get(index);
        Self {
            register: index.as_u8(),
            value,
            default_value: register.default_value,
            is_default: register.is_default(value),
            fields: register.fields.iter().map(|f| FieldReport::new(register, f, value)).collect(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldReport> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// How [`RegisterReport`]s are turned into text for a terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextStyle {
    /// Use escape codes for highlighting and column alignment.
    pub ansi: bool,
    /// List every choice next to enumerated fields and flags.
    pub verbose: bool,
    /// Leave out the register headers.
    pub quiet: bool,
}

impl TextStyle {
    fn highlight(&self, bold: bool) -> &'static str {
        if self.ansi && bold { ansi::BOLD } else { "" }
    }

    fn reset(&self) -> &'static str {
        if self.ansi { ansi::RESET } else { "" }
    }

    /// Continue `line` at the given 1-based column.
    fn move_to_column(&self, line: &mut String, visible_len: usize, column: usize) -> usize {
        if self.ansi {
            line.push_str(&format!("\x1b[{column}G"));
        } else {
            let padding = (column - 1).saturating_sub(visible_len);
            line.extend(std::iter::repeat_n(' ', padding));
        }
        visible_len.max(column - 1)
    }

    pub fn render_header(&self, report: &RegisterReport) -> String {
        let (header, reset) = if self.ansi { (ansi::HEADER, ansi::RESET) } else { ("", "") };
        let highlight = self.highlight(!report.is_default);
        format!(
            "{header}== REG{} =={reset}\n\
             {highlight}Raw value: 0x{:04X}{reset}       (Reset value: 0x{:04X})\n",
            report.register, report.value, report.default_value,
        )
    }

    pub fn render_field(&self, field: &FieldReport) -> String {
        let mut line = String::from(self.highlight(!field.is_default));
        let label = format!("{} {}", field.bits, field.name);
        line.push_str(&label);
        let mut visible = label.chars().count();
        visible = self.move_to_column(&mut line, visible, VALUE_COLUMN);
        line.push(' ');
        line.push_str(&field.text);
        visible += 1 + field.text.chars().count();
        if self.verbose && !field.choices.is_empty() {
            self.move_to_column(&mut line, visible, CHOICES_COLUMN);
            let choices = field
                .choices
                .iter()
                .map(|c| format!("{}=\"{}\"", c.value, c.label))
                .collect::<Vec<_>>()
                .join(", ");
            line.push_str(&format!(" {{{choices}}}"));
        }
        line.push_str(self.reset());
        line.push('\n');
        line
    }

    pub fn render(&self, report: &RegisterReport) -> String {
        let mut text = String::new();
        if !self.quiet {
            text.push_str(&self.render_header(report));
        }
        for field in &report.fields {
            text.push_str(&self.render_field(field));
        }
        text
    }
}
