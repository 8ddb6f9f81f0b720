//! CPU and memory state.
use std::sync::Arc;

use rand::{rngs::StdRng, SeedableRng};

use crate::{
    clock::Clock,
    constants::*,
    devices::{Keypad, Monitor},
    display::Framebuffer,
    error::RuntimeError,
    memory::Memory,
    registers::Registers,
    timer::Timer,
};

/// Core state for a chip8 interpreter.
///
/// All machine state is mutated by a single owner at a time. Only the keypad
/// and monitor handles are shared with host collaborators.
pub struct Chip8Cpu {
    // ------------------------------------------------------------------------
    // Registers
    /// Program counter pointing to the current position in the bytecode.
    pub(crate) pc: Address,
    /// General purpose registers `V0`-`VF` and the address register `I`.
    pub(crate) registers: Registers,
    /// (DT) Delay timer that counts down to 0.
    pub(crate) delay_timer: Timer,
    /// (ST) Sound timer that counts down to 0. When it has a non-zero value, a beep is played.
    pub(crate) sound_timer: Timer,

    // ------------------------------------------------------------------------
    // Memory
    /// Main memory storage space.
    pub(crate) memory: Memory,
    /// Stack of return addresses used for jumping when a routine call finishes.
    pub(crate) stack: Vec<Address>,
    /// Maximum nesting of the call stack.
    pub(crate) stack_depth: usize,
    /// Screen buffer that is drawn to.
    pub(crate) display: Framebuffer,

    // ------------------------------------------------------------------------
    // Devices
    pub(crate) keypad: Keypad,
    pub(crate) monitor: Monitor,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) rng: StdRng,
    rng_seed: Option<u64>,
}

impl Chip8Cpu {
    pub fn new(clock: Arc<dyn Clock>, stack_depth: usize, rng_seed: Option<u64>) -> Self {
        let mut cpu = Self {
            pc: MEM_START as Address,
            registers: Registers::new(),
            delay_timer: Timer::new(),
            sound_timer: Timer::new(),

            memory: Memory::new(),
            stack: Vec::with_capacity(stack_depth),
            stack_depth,
            display: Framebuffer::default(),

            keypad: Keypad::new(),
            monitor: Monitor::new(),
            clock,
            rng: new_rng(rng_seed),
            rng_seed,
        };
        cpu.reset();
        cpu
    }

    /// Return every part of the machine to its power-on state.
    ///
    /// Memory is erased and the fonts reinstalled. The keypad and monitor
    /// handles stay connected to their collaborators.
    pub fn reset(&mut self) {
        let now = self.clock.now();

        self.pc = MEM_START as Address;
        self.registers.reset();
        self.delay_timer.reset(now);
        self.sound_timer.reset(now);
        self.memory.reset();
        self.stack.clear();
        self.display.set_low_res();
        self.keypad.reset();
        self.rng = new_rng(self.rng_seed);

        self.publish();
    }

    /// Copy a program to the program origin and prepare for execution.
    pub(crate) fn load_program(&mut self, bytecode: &[u8]) {
        // Start with clean memory to avoid leaking previous program.
        self.reset();
        self.memory.load_program(bytecode);
    }

    /// Count down both timers.
    #[inline]
    pub(crate) fn tick_timers(&mut self) {
        let now = self.clock.now();
        self.delay_timer.tick(now);
        self.sound_timer.tick(now);
    }

    /// Make fresh output visible to host collaborators.
    pub(crate) fn publish(&mut self) {
        if self.display.take_dirty() {
            self.monitor.publish_frame(self.display.view());
        }

        // Buzzer should be on while sound timer counts down,
        // then turned off when the timer reaches zero.
        self.monitor.set_buzzer(self.sound_timer.get() > 0);
    }

    #[inline]
    pub(crate) fn push_return(&mut self, address: Address) -> Result<(), RuntimeError> {
        if self.stack.len() >= self.stack_depth {
            return Err(RuntimeError::StackOverflow {
                depth: self.stack_depth,
            });
        }
        self.stack.push(address);
        Ok(())
    }

    #[inline]
    pub(crate) fn pop_return(&mut self) -> Result<Address, RuntimeError> {
        self.stack.pop().ok_or(RuntimeError::StackUnderflow)
    }

    #[inline(always)]
    pub fn pc(&self) -> Address {
        self.pc
    }

    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn display(&self) -> &Framebuffer {
        &self.display
    }

    pub fn delay_timer(&self) -> u8 {
        self.delay_timer.get()
    }

    pub fn sound_timer(&self) -> u8 {
        self.sound_timer.get()
    }

    pub fn stack(&self) -> &[Address] {
        &self.stack
    }
}

fn new_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}
