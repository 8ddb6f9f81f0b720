//! Constant values of the Chip-8 architecture.
use std::time::Duration;

/// Number of general purpose registers.
pub const REGISTER_COUNT: usize = 0x10; // 16

/// Register used as the implicit flag output of arithmetic, shift and draw instructions.
pub const FLAG_REGISTER: usize = 0xF;

/// The lower memory space was historically used for the interpreter itself,
/// but is now used for fonts.
pub const MEM_START: usize = 0x200; // 512
pub const MEM_SIZE: usize = 0x1000; // 4096

/// Largest program that fits between the program origin and the end of memory.
pub const MAX_PROGRAM_SIZE: usize = MEM_SIZE - MEM_START;

/// Levels of nesting allowed in the call stack.
///
/// The original RCA 1802 implementation allocated 48 bytes
/// for up to 12 levels of nesting. Later interpreters allowed 16.
pub const STACK_SIZE: usize = 16;

/// Low resolution display mode.
pub const DISPLAY_WIDTH: usize = 64;
pub const DISPLAY_HEIGHT: usize = 32;

/// Extended (high resolution) display mode.
pub const HIRES_DISPLAY_WIDTH: usize = 128;
pub const HIRES_DISPLAY_HEIGHT: usize = 64;

/// Each sprite row is one byte, which is 8 pixels wide.
pub const SPRITE_WIDTH: usize = 8;

/// Extended sprites are 16x16 pixels, stored as two bytes per row.
pub const EXTENDED_SPRITE_SIZE: usize = 16;

/// Number of pixels the horizontal scroll instructions shift by.
pub const SCROLL_STEP: usize = 4;

/// Small hexadecimal glyphs, 5 bytes each, loaded at the start of memory.
pub const SMALL_FONT_ADDRESS: usize = 0x000;
pub const SMALL_GLYPH_SIZE: usize = 5;

/// Large hexadecimal glyphs, 10 bytes each, loaded directly after the small font.
pub const LARGE_FONT_ADDRESS: usize = 0x050;
pub const LARGE_GLYPH_SIZE: usize = 10;

/// Number of glyphs in each font table.
pub const GLYPH_COUNT: usize = 16;

/// Number of clock cycles in a second that delay timers count down.
pub const DELAY_FREQUENCY: u64 = 60;

/// Number of nanoseconds in a second
#[doc(hidden)]
pub const NANOS_IN_SECOND: u64 = 1_000_000_000;

/// Time in nanoseconds a single timer cycle takes, precalculated.
pub const TIMER_CYCLE_TIME: u64 = NANOS_IN_SECOND / DELAY_FREQUENCY;

/// Instruction throughput used when the configuration does not specify one.
pub const DEFAULT_CLOCK_FREQUENCY: u64 = 1000;

/// Interval at which a blocked key wait re-checks whether it was interrupted.
pub const KEY_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Default time `pause` and `stop` wait for the execution thread to exit.
pub const DEFAULT_JOIN_TIMEOUT_MS: u64 = 100;

/// Number of keys ob the keyboard (0x0-0xF)
pub const KEY_COUNT: u8 = 16;

/// Type for storing the 12-bit memory addresses.
pub type Address = u16;
