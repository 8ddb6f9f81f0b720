//! Bytecode interpreter.
//!
//! Every cycle fetches the instruction at the program counter, executes it,
//! counts down the timers and then unconditionally advances the program
//! counter by 2.
//!
//! Instructions that land on an exact address (`JP`, `CALL`, `RET`) store the
//! target minus 2, and the end of the cycle completes the transition. Skip
//! instructions add an extra 2 on top of the regular advance.
use log::{debug, warn};
use rand::Rng;

use crate::{
    constants::*,
    cpu::Chip8Cpu,
    disasm::Op,
    error::RuntimeError,
    font::{large_glyph_address, small_glyph_address},
};

/// Control flow signal returned by each interpreter cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Ok,
    /// Program counter has jumped to a new address.
    ///
    /// This is returned when the interpreter encounters:
    ///
    /// - 1nnn (`JP addr`)
    /// - 2nnn (`CALL addr`)
    /// - 00EE (`RET`)
    /// - Bnnn (`JP V0, addr`)
    Jump,
    /// The display buffer changed.
    Draw,
    /// Wait for a keypress.
    ///
    /// This is triggered by the opcode `Fx0A` (`LD Vx, K`) when no key went
    /// down since the wait started. The program counter is left on the
    /// instruction, so the wait continues on the next cycle.
    KeyWait,
    /// The instruction word did not decode to a known instruction, and was skipped.
    Unknown,
}

impl Chip8Cpu {
    /// Fetch, decode and execute the instruction at the program counter.
    ///
    /// Never blocks. While `Fx0A` has no key to take the cycle yields
    /// [`Flow::KeyWait`], and the caller decides how to suspend.
    ///
    /// A fatal error leaves the program counter on the faulting instruction.
    pub(crate) fn cycle(&mut self) -> Result<Flow, RuntimeError> {
        let instr = self.memory.fetch(self.pc as usize)?;
        self.cycle_with(instr)
    }

    /// Run a cycle with the given instruction instead of fetching one from memory.
    pub(crate) fn cycle_with(&mut self, instr: u16) -> Result<Flow, RuntimeError> {
        let flow = self.exec(instr)?;

        self.tick_timers();
        self.pc = self.pc.wrapping_add(2);
        self.publish();

        Ok(flow)
    }

    fn exec(&mut self, instr: u16) -> Result<Flow, RuntimeError> {
        let op = Op::decode(instr);
        op_trace(self.pc, instr, &op);

        let mut control_flow = Flow::Ok;

        match op {
            // ----------------------------------------------------------------
            // Display
            Op::ClearScreen => {
                self.display.clear();
                control_flow = Flow::Draw;
            }
            Op::ScrollDown { n } => {
                self.display.scroll_down(n as usize);
                control_flow = Flow::Draw;
            }
            Op::ScrollRight => {
                self.display.scroll_right(SCROLL_STEP);
                control_flow = Flow::Draw;
            }
            Op::ScrollLeft => {
                self.display.scroll_left(SCROLL_STEP);
                control_flow = Flow::Draw;
            }
            Op::LowRes => {
                self.display.set_low_res();
                control_flow = Flow::Draw;
            }
            Op::HighRes => {
                self.display.set_high_res();
                control_flow = Flow::Draw;
            }
            // ----------------------------------------------------------------
            // Control flow
            Op::Return => {
                let address = self.pop_return()?;
                self.pc = address.wrapping_sub(2);
                control_flow = Flow::Jump;
            }
            Op::JumpAddress { address } => {
                self.pc = address.wrapping_sub(2);
                control_flow = Flow::Jump;
            }
            Op::Call { address } => {
                // Return to the instruction after the call.
                self.push_return(self.pc.wrapping_add(2))?;
                self.pc = address.wrapping_sub(2);
                control_flow = Flow::Jump;
            }
            Op::Jump_V0 { address } => {
                let target = address.wrapping_add(self.registers.get(0) as Address);
                self.pc = target.wrapping_sub(2);
                control_flow = Flow::Jump;
            }
            Op::Skip_Eq_Byte { vx, nn } => {
                self.skip_if(self.registers.get(vx) == nn);
            }
            Op::Skip_NotEq_Byte { vx, nn } => {
                self.skip_if(self.registers.get(vx) != nn);
            }
            Op::Skip_Eq { vx, vy } => {
                self.skip_if(self.registers.get(vx) == self.registers.get(vy));
            }
            Op::Skip_NotEq { vx, vy } => {
                self.skip_if(self.registers.get(vx) != self.registers.get(vy));
            }
            // ----------------------------------------------------------------
            // Registers
            Op::Load_Byte { vx, nn } => {
                self.registers.set(vx, nn);
            }
            Op::Add_Byte { vx, nn } => {
                let x = self.registers.get(vx);
                self.registers.set(vx, x.wrapping_add(nn));
            }
            Op::Load_Address { address } => {
                self.registers.set_address(address);
            }
            Op::Random { vx, nn } => {
                let value = self.rng.gen::<u8>();
                self.registers.set(vx, value & nn);
            }
            // ----------------------------------------------------------------
            // Math
            Op::Load_Vx_Vy { .. }
            | Op::Or_Vx_Vy { .. }
            | Op::And_Vx_Vy { .. }
            | Op::Xor_Vx_Vy { .. }
            | Op::Add_Vx_Vy { .. }
            | Op::Sub_Vx_Vy { .. }
            | Op::ShiftRight { .. }
            | Op::SubReverse_Vx_Vy { .. }
            | Op::ShiftLeft { .. } => self.exec_math(op),
            // ----------------------------------------------------------------
            // Sprites
            Op::Draw { vx, vy, n } => {
                let (x, y) = (
                    self.registers.get(vx) as usize,
                    self.registers.get(vy) as usize,
                );
                let sprite = self
                    .memory
                    .slice(self.registers.address() as usize, n as usize)?;

                let mut is_erased = false;
                for (r, row) in sprite.iter().enumerate() {
                    is_erased |= self.display.draw(x, y + r, *row);
                }

                // If a pixel was erased, then a collision occurred.
                self.registers.set_flag(is_erased);
                control_flow = Flow::Draw;
            }
            Op::DrawExtended { vx, vy } => {
                let (x, y) = (
                    self.registers.get(vx) as usize,
                    self.registers.get(vy) as usize,
                );
                let sprite = self.memory.slice(
                    self.registers.address() as usize,
                    EXTENDED_SPRITE_SIZE * 2,
                )?;

                let is_erased = self.display.draw_extended(x, y, sprite);
                self.registers.set_flag(is_erased);
                control_flow = Flow::Draw;
            }
            // ----------------------------------------------------------------
            // Keyboard
            Op::Skip_Key { vx } => {
                let key_id = self.registers.get(vx);
                self.skip_if(self.keypad.is_down(key_id));
            }
            Op::Skip_NotKey { vx } => {
                let key_id = self.registers.get(vx);
                self.skip_if(!self.keypad.is_down(key_id));
            }
            Op::Wait_Key { vx } => {
                // Resuming an interrupted wait must not forget a key
                // that was pressed while the machine was suspended.
                if !self.keypad.is_waiting() {
                    debug!("waiting for key press at 0x{:04X}", self.pc);
                    self.keypad.arm_wait();
                }

                match self.keypad.take_key() {
                    Some(key_id) => self.registers.set(vx, key_id),
                    None => {
                        // rewind the program counter to stall the machine
                        self.pc = self.pc.wrapping_sub(2);
                        control_flow = Flow::KeyWait;
                    }
                }
            }
            // ----------------------------------------------------------------
            // Miscellaneous
            Op::Load_Vx_Delay { vx } => {
                self.registers.set(vx, self.delay_timer.get());
            }
            Op::Load_Delay_Vx { vx } => {
                self.delay_timer.set(self.registers.get(vx));
            }
            Op::Load_Sound_Vx { vx } => {
                self.sound_timer.set(self.registers.get(vx));
            }
            Op::Add_Address { vx } => {
                let address = self.registers.address();
                self.registers
                    .set_address(address.wrapping_add(self.registers.get(vx) as Address));
            }
            Op::Load_Glyph { vx } => {
                let address = small_glyph_address(self.registers.get(vx));
                self.registers.set_address(address as Address);
            }
            Op::Load_LargeGlyph { vx } => {
                let address = large_glyph_address(self.registers.get(vx));
                self.registers.set_address(address as Address);
            }
            Op::Bcd { vx } => {
                let x = self.registers.get(vx);
                let digits = [x / 100, (x / 10) % 10, x % 10];
                self.memory
                    .write_slice(self.registers.address() as usize, &digits)?;
            }
            Op::Store_Registers { vx } => {
                // I is left unchanged.
                self.memory.write_slice(
                    self.registers.address() as usize,
                    self.registers.range(vx),
                )?;
            }
            Op::Load_Registers { vx } => {
                let count = vx as usize + 1;
                let data = self
                    .memory
                    .slice(self.registers.address() as usize, count)?;
                self.registers.range_mut(vx).copy_from_slice(data);
            }
            // ----------------------------------------------------------------
            // Unsupported operation.
            Op::Unknown(instr) => {
                match (self.pc as usize).checked_sub(MEM_START) {
                    Some(offset) => warn!(
                        "unknown opcode 0x{instr:04X} at 0x{:04X} (program offset 0x{offset:X})",
                        self.pc
                    ),
                    None => warn!("unknown opcode 0x{instr:04X} at 0x{:04X}", self.pc),
                }
                control_flow = Flow::Unknown;
            }
        }

        Ok(control_flow)
    }

    /// Execute an arithmetic instruction
    ///
    /// The flag register is written before the result, so when `Vx` is `VF`
    /// the result wins.
    #[inline]
    fn exec_math(&mut self, op: Op) {
        match op {
            // 8XY0 (LD Vx, Vy)
            //
            // Store the value of register VY in register VX.
            Op::Load_Vx_Vy { vx, vy } => {
                self.registers.set(vx, self.registers.get(vy));
            }
            // 8XY1 (OR Vx, Vy)
            Op::Or_Vx_Vy { vx, vy } => {
                let (x, y) = (self.registers.get(vx), self.registers.get(vy));
                self.registers.set(vx, x | y);
            }
            // 8XY2 (AND Vx, Vy)
            Op::And_Vx_Vy { vx, vy } => {
                let (x, y) = (self.registers.get(vx), self.registers.get(vy));
                self.registers.set(vx, x & y);
            }
            // 8XY3 (XOR Vx, Vy)
            Op::Xor_Vx_Vy { vx, vy } => {
                let (x, y) = (self.registers.get(vx), self.registers.get(vy));
                self.registers.set(vx, x ^ y);
            }
            // 8XY4 (ADD Vx, Vy)
            //
            // If overflow, set VF to 1, else 0.
            Op::Add_Vx_Vy { vx, vy } => {
                let (x, y) = (self.registers.get(vx), self.registers.get(vy));
                let (result, carry) = x.overflowing_add(y);
                self.registers.set_flag(carry);
                self.registers.set(vx, result);
            }
            // 8XY5 (SUB Vx, Vy)
            //
            // VF is set to 0 when there is a borrow, set to 1 when there isn't.
            Op::Sub_Vx_Vy { vx, vy } => {
                let (x, y) = (self.registers.get(vx), self.registers.get(vy));
                self.registers.set_flag(x >= y);
                self.registers.set(vx, x.wrapping_sub(y));
            }
            // 8XY6 (SHR Vx)
            //
            // VF is set to the least-significant bit before the shift.
            Op::ShiftRight { vx } => {
                let x = self.registers.get(vx);
                self.registers.set(FLAG_REGISTER as u8, x & 1);
                self.registers.set(vx, x >> 1);
            }
            // 8XY7 (SUBN Vx, Vy)
            //
            // Subtracts VX from VY, and stores the result in VX.
            Op::SubReverse_Vx_Vy { vx, vy } => {
                let (x, y) = (self.registers.get(vx), self.registers.get(vy));
                self.registers.set_flag(y >= x);
                self.registers.set(vx, y.wrapping_sub(x));
            }
            // 8XYE (SHL Vx)
            //
            // VF is set to the most-significant bit before the shift.
            Op::ShiftLeft { vx } => {
                let x = self.registers.get(vx);
                self.registers.set(FLAG_REGISTER as u8, (x >> 7) & 1);
                self.registers.set(vx, x << 1);
            }
            _ => unreachable!("not an arithmetic instruction: {op:?}"),
        }
    }

    /// Skip the next instruction when the condition holds.
    #[inline(always)]
    fn skip_if(&mut self, condition: bool) {
        if condition {
            self.pc = self.pc.wrapping_add(2);
        }
    }
}

#[cfg(feature = "op_trace")]
#[inline]
fn op_trace(pc: Address, instr: u16, op: &Op) {
    log::trace!("{pc:04X}: {instr:04X} {op}");
}

#[cfg(not(feature = "op_trace"))]
#[inline]
fn op_trace(_: Address, _: u16, _: &Op) {}
