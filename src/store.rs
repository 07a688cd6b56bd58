use tracing::{debug, info};

use crate::device::{Transport, TransportError};
use crate::registers::{REGISTER_COUNT, RegisterIndex};

/// `old` with the bits selected by `mask` replaced by the same bits of `bits`.
pub const fn masked_value(old: u16, mask: u16, bits: u16) -> u16 {
    (old & !mask) | (bits & mask)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRequest {
    pub register: RegisterIndex,
    pub mask: u16,
    pub bits: u16,
}

/// Our view of the device registers.
///
/// Values are only ever known for all registers at once: they become known after a complete
/// refresh and are all forgotten when a refresh fails part way through.
#[derive(Debug, Clone)]
pub struct RegisterStore {
    values: [u16; REGISTER_COUNT],
    valid: bool,
}

impl RegisterStore {
    pub fn new() -> Self {
        Self { values: [0; REGISTER_COUNT], valid: false }
    }

    pub fn from_values(values: [u16; REGISTER_COUNT]) -> Self {
        Self { values, valid: true }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn get(&self, register: RegisterIndex) -> Option<u16> {
        self.valid.then(|| self.values[register.as_usize()])
    }

    pub fn values(&self) -> Option<[u16; REGISTER_COUNT]> {
        self.valid.then_some(self.values)
    }

    /// Read all registers, in order, and return their values.
    pub fn refresh_all<T: Transport>(
        &mut self,
        transport: &mut T,
    ) -> Result<[u16; REGISTER_COUNT], TransportError> {
        self.valid = false;
        let mut values = [0; REGISTER_COUNT];
        for register in RegisterIndex::all() {
            values[register.as_usize()] = transport.read(register)?;
        }
        debug!(message = "refreshed registers", ?values);
        self.values = values;
        self.valid = true;
        Ok(values)
    }

    /// Change only the bits of `request.mask` in the target register.
    ///
    /// Returns the register value read back after the write.
    pub fn write_masked<T: Transport>(
        &mut self,
        transport: &mut T,
        request: WriteRequest,
    ) -> Result<u16, TransportError> {
        let register = request.register;
        let old = match self.get(register) {
            Some(v) => v,
            None => self.refresh_all(transport)?[register.as_usize()],
        };
        let new = masked_value(old, request.mask, request.bits);
        info!(
            message = "writing register",
            register = register.as_u8(),
            old,
            new,
            mask = request.mask
        );
        self.valid = false;
        transport.write(register, new)?;
        Ok(self.refresh_all(transport)?[register.as_usize()])
    }

    /// Write the init value of every register, in order, then read everything back.
    pub fn apply_init<T: Transport>(
        &mut self,
        transport: &mut T,
    ) -> Result<[u16; REGISTER_COUNT], TransportError> {
        self.valid = false;
        for register in RegisterIndex::all() {
            transport.write(register, register.register().init_value)?;
        }
        self.refresh_all(transport)
    }
}

impl Default for RegisterStore {
    fn default() -> Self {
        Self::new()
    }
}
