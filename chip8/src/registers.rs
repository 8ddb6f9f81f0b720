//! Register file.
use crate::constants::*;

/// General purpose registers `V0`-`VF` and the address register `I`.
///
/// Register `VF` doubles as the carry, borrow and collision flag.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Registers {
    v: [u8; REGISTER_COUNT],
    /// Pointer register used for temporarily storing an address. Since addresses are 12 bits, only the
    /// lowest (rightmost) bits are meaningful.
    i: Address,
}

impl Registers {
    pub fn new() -> Self {
        Default::default()
    }

    /// Value of register `Vx`. Only the low nibble of `index` selects the register.
    #[inline(always)]
    pub fn get(&self, index: u8) -> u8 {
        self.v[index as usize & 0xF]
    }

    #[inline(always)]
    pub fn set(&mut self, index: u8, value: u8) {
        self.v[index as usize & 0xF] = value;
    }

    #[inline(always)]
    pub fn flag(&self) -> u8 {
        self.v[FLAG_REGISTER]
    }

    #[inline(always)]
    pub fn set_flag(&mut self, set: bool) {
        self.v[FLAG_REGISTER] = set as u8;
    }

    #[inline(always)]
    pub fn address(&self) -> Address {
        self.i
    }

    #[inline(always)]
    pub fn set_address(&mut self, address: Address) {
        self.i = address;
    }

    pub fn as_array(&self) -> [u8; REGISTER_COUNT] {
        self.v
    }

    /// Registers `V0` through `Vx` inclusive.
    pub fn range(&self, x: u8) -> &[u8] {
        &self.v[..=(x as usize & 0xF)]
    }

    pub fn range_mut(&mut self, x: u8) -> &mut [u8] {
        &mut self.v[..=(x as usize & 0xF)]
    }

    pub fn reset(&mut self) {
        self.v.fill(0);
        self.i = 0;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_registers() {
        let mut regs = Registers::new();
        regs.set(0x3, 0x42);
        regs.set_flag(true);
        regs.set_address(0xFFF);

        assert_eq!(regs.get(0x3), 0x42);
        assert_eq!(regs.get(0xF), 1);
        assert_eq!(regs.flag(), 1);
        assert_eq!(regs.address(), 0xFFF);
        assert_eq!(regs.range(0x3), &[0, 0, 0, 0x42]);

        regs.reset();
        assert_eq!(regs.as_array(), [0; REGISTER_COUNT]);
        assert_eq!(regs.address(), 0);
    }
}
