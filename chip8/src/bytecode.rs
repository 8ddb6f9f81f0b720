//! Helpers for extracting operands from instruction words.
//!
//! Each instruction is two bytes, with the opcode identity in the first 4-bit nibble.
//!
//! - `nnn` 12-bit address in the low three nibbles
//! - `nn` 8-bit immediate in the low byte
//! - `n` 4-bit immediate in the low nibble
//! - `x` register in the second nibble
//! - `y` register in the third nibble

/// Extract opcode family from the instruction.
#[inline(always)]
pub fn op_code(instr: u16) -> u8 {
    ((instr & 0xF000) >> 12) as u8
}

/// Extract operand NNN from the instruction.
#[inline(always)]
pub fn op_nnn(instr: u16) -> u16 {
    instr & 0x0FFF
}

/// Extract operand NN from the instruction.
#[inline(always)]
pub fn op_nn(instr: u16) -> u8 {
    (instr & 0x00FF) as u8
}

/// Extract operand VX from the instruction.
#[inline(always)]
pub fn op_x(instr: u16) -> u8 {
    ((instr & 0x0F00) >> 8) as u8
}

/// Extract operand VY from the instruction.
#[inline(always)]
pub fn op_y(instr: u16) -> u8 {
    ((instr & 0x00F0) >> 4) as u8
}

/// Extract operand N from the instruction.
#[inline(always)]
pub fn op_n(instr: u16) -> u8 {
    (instr & 0x000F) as u8
}

/// Extract operands VX, VY and N from the instruction.
#[inline(always)]
pub fn op_xyn(instr: u16) -> (u8, u8, u8) {
    (op_x(instr), op_y(instr), op_n(instr))
}
