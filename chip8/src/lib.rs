//! Chip-8 virtual machine, with the SUPER-CHIP display extensions.
mod bytecode;
mod clock;
pub mod constants;
mod cpu;
mod devices;
mod disasm;
mod display;
mod error;
mod font;
mod interp;
mod memory;
mod registers;
mod rom;
mod timer;
mod vm;

pub use self::{
    clock::{Clock, ManualClock, SystemClock},
    devices::{InvalidKeyCode, KeyCode, Keypad, Monitor},
    display::{FrameView, Resolution},
    error::{Fault, RuntimeError},
    interp::Flow,
    registers::Registers,
    rom::Rom,
    vm::{Hz, MachineState},
};

/// Version of the interpreter.
pub const IMPL_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod prelude {
    pub use super::{
        disasm::{Disassembler, Op},
        error::{Chip8Error, Chip8Result, Fault, RuntimeError},
        interp::Flow,
        vm::{Chip8Conf, Chip8Vm, Hz, MachineState},
        FrameView, KeyCode, Keypad, Monitor, Rom,
    };
}
