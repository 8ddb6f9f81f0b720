//! Result and errors.
use std::{
    fmt::{self, Display, Formatter},
    path::PathBuf,
};

use crate::{constants::Address, vm::MachineState};

pub type Chip8Result<T> = std::result::Result<T, Chip8Error>;

#[derive(Debug)]
pub enum Chip8Error {
    /// ROM file path does not resolve to an existing file.
    RomNotFound(PathBuf),
    /// Attempt to load a bytecode program that can't fit in memory.
    LargeProgram { size: usize, max: usize },
    /// VM error during interpreter loop.
    Runtime(RuntimeError),
    /// Lifecycle operation is not allowed in the current machine state.
    InvalidState {
        op: &'static str,
        state: MachineState,
    },
    Io(std::io::Error),
    Fmt(fmt::Error),
}

impl Display for Chip8Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::RomNotFound(path) => write!(f, "rom file not found: {}", path.display()),
            Self::LargeProgram { size, max } => write!(
                f,
                "program too large for VM memory: {size} bytes, maximum is {max}"
            ),
            Self::Runtime(err) => write!(f, "runtime error: {err}"),
            Self::InvalidState { op, state } => {
                write!(f, "cannot {op} while the machine is {state:?}")
            }
            Self::Io(err) => write!(f, "{}", err),
            Self::Fmt(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for Chip8Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Runtime(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Fmt(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RuntimeError> for Chip8Error {
    fn from(err: RuntimeError) -> Self {
        Chip8Error::Runtime(err)
    }
}

impl From<std::io::Error> for Chip8Error {
    fn from(err: std::io::Error) -> Self {
        Chip8Error::Io(err)
    }
}

impl From<fmt::Error> for Chip8Error {
    fn from(err: fmt::Error) -> Self {
        Chip8Error::Fmt(err)
    }
}

/// Fatal condition raised by a single instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeError {
    /// Memory access outside of `[0, MEM_SIZE)`.
    OutOfBounds { address: usize },
    /// `RET` executed with an empty call stack.
    StackUnderflow,
    /// `CALL` executed with a full call stack.
    StackOverflow { depth: usize },
}

impl Display for RuntimeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfBounds { address } => {
                write!(f, "memory access out of bounds at 0x{address:04X}")
            }
            Self::StackUnderflow => write!(f, "call stack underflow"),
            Self::StackOverflow { depth } => {
                write!(f, "call stack overflow, nesting is limited to {depth} levels")
            }
        }
    }
}

impl std::error::Error for RuntimeError {}

/// Snapshot of the instruction that halted the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fault {
    pub error: RuntimeError,
    /// Program counter of the faulting instruction.
    pub pc: Address,
    /// Raw instruction word, if it could be fetched.
    pub instr: Option<u16>,
}

impl Display for Fault {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.instr {
            Some(instr) => write!(f, "{} (0x{instr:04X} at 0x{:04X})", self.error, self.pc),
            None => write!(f, "{} (at 0x{:04X})", self.error, self.pc),
        }
    }
}
