//! Main memory.
use crate::{constants::*, error::RuntimeError, font::*};

/// Flat byte addressable memory, with the glyph tables installed below the program origin.
///
/// Every access is bounds checked. Addresses are never wrapped or clamped, so a
/// program reaching outside of memory faults instead of corrupting other state.
pub struct Memory {
    ram: Box<[u8; MEM_SIZE]>,
}

impl Default for Memory {
    fn default() -> Self {
        let mut memory = Self {
            ram: Box::new([0; MEM_SIZE]),
        };
        memory.reset();
        memory
    }
}

impl Memory {
    pub fn new() -> Self {
        Default::default()
    }

    /// Erase memory and reinstall the built-in fonts.
    pub fn reset(&mut self) {
        self.ram.fill(0);
        self.load_font(SMALL_FONT_ADDRESS, &SMALL_FONT);
        self.load_font(LARGE_FONT_ADDRESS, &LARGE_FONT);
    }

    fn load_font(&mut self, address: usize, fontset: &[u8]) {
        self.ram[address..address + fontset.len()].copy_from_slice(fontset);
    }

    #[inline]
    pub fn read(&self, address: usize) -> Result<u8, RuntimeError> {
        self.ram
            .get(address)
            .copied()
            .ok_or(RuntimeError::OutOfBounds { address })
    }

    #[cfg(test)]
    pub fn write(&mut self, address: usize, value: u8) -> Result<(), RuntimeError> {
        match self.ram.get_mut(address) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(RuntimeError::OutOfBounds { address }),
        }
    }

    /// Borrow `len` bytes starting at `address`.
    ///
    /// Fails with the first address that falls outside of memory.
    pub fn slice(&self, address: usize, len: usize) -> Result<&[u8], RuntimeError> {
        if address >= self.ram.len() {
            return Err(RuntimeError::OutOfBounds { address });
        }
        let end = address + len;
        if end > self.ram.len() {
            return Err(RuntimeError::OutOfBounds {
                address: self.ram.len(),
            });
        }
        Ok(&self.ram[address..end])
    }

    /// Copy `data` into memory starting at `address`.
    ///
    /// Nothing is written unless the whole range is inside memory.
    pub fn write_slice(&mut self, address: usize, data: &[u8]) -> Result<(), RuntimeError> {
        if address >= self.ram.len() {
            return Err(RuntimeError::OutOfBounds { address });
        }
        let end = address + data.len();
        if end > self.ram.len() {
            return Err(RuntimeError::OutOfBounds {
                address: self.ram.len(),
            });
        }
        self.ram[address..end].copy_from_slice(data);
        Ok(())
    }

    /// Copy a program into memory at the program origin.
    ///
    /// The caller is responsible for validating the program size.
    pub(crate) fn load_program(&mut self, bytecode: &[u8]) {
        debug_assert!(bytecode.len() <= MAX_PROGRAM_SIZE);
        self.ram[MEM_START..MEM_START + bytecode.len()].copy_from_slice(bytecode);
    }

    /// Fetch the two byte instruction at `address`, most significant byte first.
    #[inline]
    pub fn fetch(&self, address: usize) -> Result<u16, RuntimeError> {
        let msb = self.read(address)?;
        let lsb = self.read(address + 1)?;
        Ok(assemble_instr(msb, lsb))
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.ram[..]
    }
}

/// Combine two bytes into an instruction word.
#[inline(always)]
pub fn assemble_instr(msb: u8, lsb: u8) -> u16 {
    ((msb as u16) << 8) | lsb as u16
}
