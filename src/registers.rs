//! Static description of the six CM6206 control registers.
//!
//! Field declaration order and label text are what `dump` prints and what scripts match on.
//! Do not reorder or reword entries.

pub const REGISTER_COUNT: usize = 6;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("register {0} is out of range [0;5]")]
pub struct OutOfRange(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct RegisterIndex(u8);

impl RegisterIndex {
    /// Register 0 holds the SPDIF output and DMA master settings.
    pub const SPDIF_OUT: Self = Self(0);

    pub fn new(index: u64) -> Result<Self, OutOfRange> {
        if index < REGISTER_COUNT as u64 {
            Ok(Self(index as u8))
        } else {
            Err(OutOfRange(index))
        }
    }

    pub fn all() -> impl Iterator<Item = Self> {
        (0..REGISTER_COUNT as u8).map(Self)
    }

    pub const fn as_u8(self) -> u8 {
        self.0
    }

    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    pub fn register(self) -> &'static Register {
        &REGISTERS[self.as_usize()]
    }
}

impl std::fmt::Display for RegisterIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RegisterIndex {
    type Err = crate::NumberError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = crate::parse_number(s)?;
        Ok(Self::new(value)?)
    }
}

/// How a field's extracted value turns into text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum FieldKind {
    /// A single bit; `on` is shown when the bit is set.
    Flag { on: &'static str, off: &'static str },
    /// Plain decimal value.
    Range,
    /// Value looked up in `labels`, `fallback` for anything not listed. If a value is listed
    /// more than once the last entry wins.
    Enum { labels: &'static [(u16, &'static str)], fallback: &'static str },
    /// Documented as reserved. Shown without a value.
    Reserved,
}

impl FieldKind {
    pub fn name(&self) -> &'static str {
        self.into()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Field {
    pub first_bit: u8,
    pub width: u8,
    pub name: &'static str,
    pub kind: FieldKind,
}

impl Field {
    const fn flag(bit: u8, name: &'static str, on: &'static str, off: &'static str) -> Self {
        Self { first_bit: bit, width: 1, name, kind: FieldKind::Flag { on, off } }
    }

    const fn yes_no(bit: u8, name: &'static str) -> Self {
        Self::flag(bit, name, "Yes", "No")
    }

    const fn range(first_bit: u8, width: u8, name: &'static str) -> Self {
        Self { first_bit, width, name, kind: FieldKind::Range }
    }

    const fn labels(
        first_bit: u8,
        width: u8,
        name: &'static str,
        labels: &'static [(u16, &'static str)],
        fallback: &'static str,
    ) -> Self {
        Self { first_bit, width, name, kind: FieldKind::Enum { labels, fallback } }
    }

    const fn reserved(first_bit: u8, width: u8) -> Self {
        Self { first_bit, width, name: "<Reserved>", kind: FieldKind::Reserved }
    }

    /// Bits covered by this field, in place.
    pub const fn mask(&self) -> u16 {
        (u16::MAX >> (16 - self.width as u32)) << self.first_bit
    }

    pub const fn last_bit(&self) -> u8 {
        self.first_bit + self.width - 1
    }

    /// The field's value shifted down to bit 0.
    pub const fn extract(&self, register_value: u16) -> u16 {
        (register_value & self.mask()) >> self.first_bit
    }

    /// Bit position as printed in front of the field name: `[07]` or `[14:12]`.
    pub fn bits(&self) -> String {
        if self.width == 1 {
            format!("[{:02}]", self.first_bit)
        } else {
            format!("[{:02}:{:02}]", self.last_bit(), self.first_bit)
        }
    }

    /// Label for `value`, for fields that have labels at all.
    pub fn label_of(&self, value: u16) -> Option<&'static str> {
        match self.kind {
            FieldKind::Flag { on, off } => Some(if value & 1 == 1 { on } else { off }),
            FieldKind::Enum { labels, fallback } => Some(
                labels.iter().rev().find(|(v, _)| *v == value).map_or(fallback, |(_, l)| *l),
            ),
            FieldKind::Range | FieldKind::Reserved => None,
        }
    }
}

#[derive(Debug)]
pub struct Register {
    pub index: RegisterIndex,
    /// Value after hardware reset.
    pub default_value: u16,
    /// Value written by `init` (same table the Linux driver uses).
    pub init_value: u16,
    pub fields: &'static [Field],
}

impl Register {
    pub fn get(index: RegisterIndex) -> &'static Register {
        index.register()
    }

    pub const fn is_default(&self, value: u16) -> bool {
        value == self.default_value
    }

    pub const fn is_field_default(&self, value: u16, field: &Field) -> bool {
        field.extract(value) == field.extract(self.default_value)
    }
}

// Rates 0 and 3 are marked reserved in the datasheet, but work.
const SPDIF_OUT_RATES: &[(u16, &str)] =
    &[(0, "44.1 kHz"), (2, "48 kHz"), (3, "32 kHz"), (6, "96 kHz")];
const SPDIF_IN_RATES: &[(u16, &str)] = &[(0, "44.1 kHz"), (2, "48 kHz"), (3, "32 kHz")];
const HEADPHONE_SOURCES: &[(u16, &str)] =
    &[(0, "Side"), (1, "Rear"), (2, "Center/Subwoofer"), (3, "Front")];
const MCU_CLOCK_FREQUENCIES: &[(u16, &str)] = &[(0, "1.5 MHz"), (1, "3 MHz")];
const SPDIF_OUT_CHANNELS: &[(u16, &str)] = &[(0, "Front"), (1, "Side"), (2, "Center"), (3, "Rear")];
const AD_FILTER_SOURCES: &[(u16, &str)] =
    &[(0, "Normal"), (4, "Front"), (5, "Side"), (6, "Center"), (7, "Rear")];

pub const REGISTERS: [Register; REGISTER_COUNT] = [
    Register {
        index: RegisterIndex(0),
        default_value: 0x2000,
        // Do not assert copyright.
        init_value: 0x2004,
        fields: &[
            Field::flag(15, "DMA Master", "SPDIF Out", "DAC"),
            Field::labels(12, 3, "SPDIF Out sample rate", SPDIF_OUT_RATES, "Reserved"),
            Field::range(4, 8, "Category code"),
            Field::flag(3, "Emphasis", "CD_Type", "None"),
            Field::flag(2, "Copyright", "Not Asserted", "Asserted"),
            Field::flag(1, "Non-audio", "non-PCM (e.g. AC3)", "PCM"),
            Field::flag(0, "Professional/Consumer", "Professional", "Consumer"),
        ],
    },
    Register {
        index: RegisterIndex(1),
        default_value: 0x3002,
        // Enable SPDIF Out.
        init_value: 0x3000,
        fields: &[
            Field::reserved(15, 1),
            Field::flag(14, "SEL Clk (test)", "22.58 MHz", "24.576 MHz"),
            Field::yes_no(13, "PLL binary search Enable"),
            Field::yes_no(12, "Soft Mute Enable"),
            Field::yes_no(11, "GPIO4 Out Status"),
            Field::yes_no(10, "GPIO4 Out Enable"),
            Field::yes_no(9, "GPIO3 Out Status"),
            Field::yes_no(8, "GPIO3 Out Enable"),
            Field::yes_no(7, "GPIO2 Out Status"),
            Field::yes_no(6, "GPIO2 Out Enable"),
            Field::yes_no(5, "GPIO1 Out Status"),
            Field::yes_no(4, "GPIO1 Out Enable"),
            Field::yes_no(3, "SPDIF Out Valid"),
            Field::yes_no(2, "SPDIF Loop-back Enable"),
            Field::yes_no(1, "SPDIF Out Disable"),
            Field::yes_no(0, "SPDIF In Mix Enable"),
        ],
    },
    Register {
        index: RegisterIndex(2),
        default_value: 0x6004,
        // Enable drivers, mute headphone, disable BTL.
        init_value: 0xF800,
        fields: &[
            Field::yes_no(15, "Driver On"),
            Field::labels(13, 2, "Headphone Source channels", HEADPHONE_SOURCES, "<Reserved>"),
            Field::yes_no(12, "Mute Headphone Right"),
            Field::yes_no(11, "Mute Headphone Left"),
            Field::yes_no(10, "Mute Rear Surround Right"),
            Field::yes_no(9, "Mute Rear Surround Left"),
            Field::yes_no(8, "Mute Side Surround Right"),
            Field::yes_no(7, "Mute Side Surround Left"),
            Field::yes_no(6, "Mute Subwoofer"),
            Field::yes_no(5, "Mute Center"),
            Field::yes_no(4, "Mute Front Right"),
            Field::yes_no(3, "Mute Front Left"),
            Field::yes_no(2, "BTL mode enable"),
            Field::labels(0, 2, "MCU Clock Frequency", MCU_CLOCK_FREQUENCIES, "<Reserved>"),
        ],
    },
    Register {
        index: RegisterIndex(3),
        default_value: 0x147F,
        init_value: 0x147F,
        fields: &[
            Field::reserved(14, 2),
            // Older tools printed bits 13:11 here, so a set bit 13 showed up in this value.
            Field::range(11, 2, "Sensitivity to FLY tuner volume"),
            Field::flag(10, "Microphone bias voltage", "2.25 V", "4.5 V"),
            Field::flag(9, "Mix MIC/Line In to", "All 8 Channels", "Front Out Only"),
            Field::labels(7, 2, "SPDIF In sample rate", SPDIF_IN_RATES, "Reserved"),
            Field::flag(6, "Package size", "48 pins", "100 pins"),
            Field::yes_no(5, "Front Out Enable"),
            Field::yes_no(4, "Rear Out Enable"),
            Field::yes_no(3, "Center Out Enable"),
            Field::yes_no(2, "Line Out Enable"),
            Field::yes_no(1, "Headphone Out Enable"),
            Field::yes_no(0, "SPDIF In can be recorded"),
        ],
    },
    Register {
        index: RegisterIndex(4),
        default_value: 0x0000,
        init_value: 0x0000,
        fields: &[
            Field::yes_no(15, "GPIO12 Out Status"),
            Field::yes_no(14, "GPIO12 Out Enable"),
            Field::yes_no(13, "GPIO11 Out Status"),
            Field::yes_no(12, "GPIO11 Out Enable"),
            Field::yes_no(11, "GPIO10 Out Status"),
            Field::yes_no(10, "GPIO10 Out Enable"),
            Field::yes_no(9, "GPIO9 Out Status"),
            Field::yes_no(8, "GPIO9 Out Enable"),
            Field::yes_no(7, "GPIO8 Out Status"),
            Field::yes_no(6, "GPIO8 Out Enable"),
            Field::yes_no(5, "GPIO7 Out Status"),
            Field::yes_no(4, "GPIO7 Out Enable"),
            Field::yes_no(3, "GPIO6 Out Status"),
            Field::yes_no(2, "GPIO6 Out Enable"),
            // NB: GPIO5 has status and enable the other way around.
            Field::yes_no(1, "GPIO5 Out Enable"),
            Field::yes_no(0, "GPIO5 Out Status"),
        ],
    },
    Register {
        index: RegisterIndex(5),
        default_value: 0x3000,
        init_value: 0x3000,
        fields: &[
            Field::reserved(14, 2),
            Field::yes_no(13, "DAC Not Reset"),
            Field::yes_no(12, "ADC Not Reset"),
            Field::yes_no(11, "ADC to SPDIF Out"),
            Field::labels(9, 2, "SPDIF Out select", SPDIF_OUT_CHANNELS, "<Reserved>"),
            Field::flag(8, "USB/CODEC Mode", "CODEC", "USB"),
            Field::yes_no(7, "DAC high pass filter"),
            Field::yes_no(6, "Loopback ADC to Rear DAC"),
            Field::yes_no(5, "Loopback ADC to Center DAC"),
            Field::yes_no(4, "Loopback ADC to Side DAC"),
            Field::yes_no(3, "Loopback ADC to Front DAC"),
            Field::labels(0, 3, "Input source to AD digital filter", AD_FILTER_SOURCES, "<Reserved>"),
        ],
    },
];

const _ASSERT_FIELDS_WELL_FORMED: () = const {
    let mut idx = 0;
    while idx < REGISTERS.len() {
        let register = &REGISTERS[idx];
        assert!(register.index.0 as usize == idx, "register table is out of order");
        let mut covered = 0u16;
        let mut field_idx = 0;
        while field_idx < register.fields.len() {
            let field = &register.fields[field_idx];
            assert!(field.width >= 1, "fields must be at least one bit wide");
            assert!(field.first_bit as u32 + field.width as u32 <= 16, "field exceeds 16 bits");
            match field.kind {
                FieldKind::Flag { .. } => assert!(field.width == 1, "flags are a single bit"),
                FieldKind::Range => assert!(field.width > 1, "ranges span several bits"),
                FieldKind::Enum { .. } | FieldKind::Reserved => {}
            }
            assert!(covered & field.mask() == 0, "fields of a register overlap");
            covered |= field.mask();
            field_idx += 1;
        }
        idx += 1;
    }
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_default_in_every_field() {
        for register in &REGISTERS {
            for field in register.fields {
                assert!(
                    register.is_field_default(register.default_value, field),
                    "REG{} {}",
                    register.index,
                    field.name
                );
            }
        }
    }

    #[test]
    fn extract_and_mask() {
        let rate = &REGISTERS[0].fields[1];
        assert_eq!(rate.mask(), 0x7000);
        assert_eq!(rate.extract(0x2000), 2);
        assert_eq!(rate.extract(0xFFFF), 7);
        let whole = Field::range(0, 16, "whole");
        assert_eq!(whole.mask(), 0xFFFF);
        assert_eq!(whole.extract(0xBEEF), 0xBEEF);
    }

    #[test]
    fn field_defaults_are_evaluated_independently() {
        let reg0 = RegisterIndex::new(0).unwrap().register();
        let value = 0xA000;
        assert!(!reg0.is_default(value));
        assert!(!reg0.is_field_default(value, &reg0.fields[0]));
        assert!(reg0.is_field_default(value, &reg0.fields[1]));
    }

    #[test]
    fn bit_positions() {
        assert_eq!(REGISTERS[0].fields[0].bits(), "[15]");
        assert_eq!(REGISTERS[0].fields[1].bits(), "[14:12]");
        assert_eq!(REGISTERS[0].fields[2].bits(), "[11:04]");
        assert_eq!(REGISTERS[5].fields.last().unwrap().bits(), "[02:00]");
    }

    #[test]
    fn enum_labels_fall_back() {
        let rate = &REGISTERS[0].fields[1];
        assert_eq!(rate.label_of(2), Some("48 kHz"));
        assert_eq!(rate.label_of(6), Some("96 kHz"));
        assert_eq!(rate.label_of(1), Some("Reserved"));
        assert_eq!(rate.label_of(7), Some("Reserved"));
        assert_eq!(REGISTERS[0].fields[2].label_of(3), None);
    }

    #[test]
    fn duplicate_labels_last_wins() {
        let field = Field::labels(0, 2, "dup", &[(1, "first"), (1, "second")], "none");
        assert_eq!(field.label_of(1), Some("second"));
        assert_eq!(field.label_of(0), Some("none"));
    }

    #[test]
    fn index_bounds() {
        assert_eq!(RegisterIndex::new(5).map(RegisterIndex::as_u8), Ok(5));
        assert_eq!(RegisterIndex::new(6), Err(OutOfRange(6)));
        assert_eq!("0x2".parse::<RegisterIndex>().map(RegisterIndex::as_u8).ok(), Some(2));
        assert!("7".parse::<RegisterIndex>().is_err());
        assert_eq!(RegisterIndex::all().count(), REGISTER_COUNT);
    }
}
