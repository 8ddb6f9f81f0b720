//! Virtual machine.
use std::{
    fmt::{self, Write},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use log::{debug, error, info, warn};

use crate::{
    clock::{Clock, SystemClock, Throttle},
    constants::*,
    cpu::Chip8Cpu,
    devices::{Keypad, Monitor},
    display::{FrameView, Resolution},
    error::{Chip8Error, Chip8Result, Fault, RuntimeError},
    interp::Flow,
    registers::Registers,
    rom::{check_program_size, Rom},
};

/// Lifecycle controller for a chip8 interpreter.
///
/// Programs either run on a dedicated execution thread, started with
/// [`Chip8Vm::play`], or are stepped synchronously from the calling thread.
pub struct Chip8Vm {
    cpu: Arc<Mutex<Chip8Cpu>>,
    conf: Chip8Conf,
    clock: Arc<dyn Clock>,
    keypad: Keypad,
    monitor: Monitor,
    state: MachineState,
    session: Option<Session>,
    /// Written by the execution thread when an instruction fails.
    fault: Arc<Mutex<Option<Fault>>>,
}

/// Handle to a running execution thread.
///
/// Every run gets a fresh flag, so a thread that outlived a timed out join
/// can never be revived by a later run.
struct Session {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Lifecycle state of the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineState {
    /// No program loaded.
    Idle,
    /// Program copied into memory, ready to run from the origin.
    Loaded,
    /// The execution thread is cycling.
    Running,
    /// The execution thread is suspended on `Fx0A` until a key goes down.
    WaitingForKey,
    /// Execution stopped, machine state intact.
    Paused,
    /// An instruction failed. See [`Chip8Vm::fault`].
    Halted,
}

impl Chip8Vm {
    pub fn new(conf: Chip8Conf) -> Self {
        Self::with_clock(conf, Arc::new(SystemClock::new()))
    }

    /// Create a VM that measures time with the given clock.
    pub fn with_clock(conf: Chip8Conf, clock: Arc<dyn Clock>) -> Self {
        let cpu = Chip8Cpu::new(clock.clone(), conf.stack_depth, conf.rng_seed);
        let keypad = cpu.keypad.clone();
        let monitor = cpu.monitor.clone();

        Chip8Vm {
            cpu: Arc::new(Mutex::new(cpu)),
            conf,
            clock,
            keypad,
            monitor,
            state: MachineState::Idle,
            session: None,
            fault: Arc::new(Mutex::new(None)),
        }
    }

    /// Configuration that was used to instantiate the VM.
    pub fn config(&self) -> &Chip8Conf {
        &self.conf
    }

    /// Copy a program into memory at the program origin.
    ///
    /// Any running program is stopped first, and the machine is reset.
    pub fn load_program(&mut self, bytecode: &[u8]) -> Chip8Result<()> {
        if !check_program_size(bytecode) {
            return Err(Chip8Error::LargeProgram {
                size: bytecode.len(),
                max: MAX_PROGRAM_SIZE,
            });
        }

        self.join_session();
        *lock(&self.fault) = None;
        lock(&self.cpu).load_program(bytecode);
        self.state = MachineState::Loaded;

        info!("loaded program, {} bytes", bytecode.len());
        Ok(())
    }

    pub fn load_rom(&mut self, rom: &Rom) -> Chip8Result<()> {
        self.load_program(rom.as_bytes())
    }

    /// Start executing on a dedicated thread.
    ///
    /// A paused machine continues where it left off. Calling this while the
    /// machine is already running does nothing.
    pub fn play(&mut self) -> Chip8Result<()> {
        self.sync_state();

        match self.state {
            MachineState::Loaded | MachineState::Paused => self.spawn_session("play"),
            MachineState::Running | MachineState::WaitingForKey => Ok(()),
            state @ (MachineState::Idle | MachineState::Halted) => {
                Err(Chip8Error::InvalidState { op: "play", state })
            }
        }
    }

    /// Signal the execution thread to stop, keeping the machine state intact.
    ///
    /// A thread suspended on a key wait notices the request within one poll
    /// interval. Pausing a machine that is not running does nothing.
    pub fn pause(&mut self) -> Chip8Result<()> {
        self.sync_state();

        if self.state == MachineState::Running {
            self.join_session();

            // The thread may have faulted before it saw the request.
            self.state = if lock(&self.fault).is_some() {
                MachineState::Halted
            } else {
                MachineState::Paused
            };

            info!("paused at 0x{:04X}", self.pc());
        }

        Ok(())
    }

    /// Continue execution after [`Chip8Vm::pause`].
    pub fn resume(&mut self) -> Chip8Result<()> {
        self.sync_state();

        match self.state {
            MachineState::Paused | MachineState::Loaded => self.spawn_session("resume"),
            MachineState::Running | MachineState::WaitingForKey => Ok(()),
            state @ (MachineState::Idle | MachineState::Halted) => {
                Err(Chip8Error::InvalidState { op: "resume", state })
            }
        }
    }

    /// Stop execution and reset the machine, unloading the program.
    ///
    /// The machine is reset even when the execution thread does not exit
    /// within the configured join timeout.
    pub fn stop(&mut self) {
        self.join_session();
        *lock(&self.fault) = None;
        lock(&self.cpu).reset();
        self.state = MachineState::Idle;

        info!("stopped");
    }

    /// Fetch, decode and execute a single instruction on the calling thread.
    ///
    /// A key wait never blocks here. The machine stays on the `Fx0A`
    /// instruction and [`Flow::KeyWait`] is returned until a key goes down.
    pub fn step_one_cycle(&mut self) -> Chip8Result<Flow> {
        self.ensure_steppable("step")?;
        self.run_cycle(None)
    }

    /// Run one full cycle with the given instruction in place of the fetch.
    ///
    /// Timers tick and the program counter advances as usual. This is
    /// allowed without a loaded program.
    pub fn execute_raw_instruction(&mut self, instr: u16) -> Chip8Result<Flow> {
        self.sync_state();

        match self.state {
            MachineState::Idle | MachineState::Loaded | MachineState::Paused => {
                self.run_cycle(Some(instr))
            }
            state => Err(Chip8Error::InvalidState {
                op: "execute instruction",
                state,
            }),
        }
    }

    /// Run a batch of cycles on the calling thread, as fast as possible.
    ///
    /// Returns the control flow of the last executed cycle.
    pub fn run_steps(&mut self, step_count: usize) -> Chip8Result<Flow> {
        self.ensure_steppable("run steps")?;

        let mut flow = Flow::Ok;
        for _ in 0..step_count {
            flow = self.run_cycle(None)?;
        }

        Ok(flow)
    }

    /// Latest published frame.
    pub fn framebuffer_view(&self) -> FrameView {
        self.monitor.frame()
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    /// Shared handle for feeding key events into the machine.
    pub fn keypad(&self) -> &Keypad {
        &self.keypad
    }

    pub fn state(&self) -> MachineState {
        match self.state {
            MachineState::Running if lock(&self.fault).is_some() => MachineState::Halted,
            MachineState::Running if self.keypad.is_waiting() => MachineState::WaitingForKey,
            state => state,
        }
    }

    /// The error that halted the machine, if any.
    pub fn fault(&self) -> Option<Fault> {
        *lock(&self.fault)
    }

    fn ensure_steppable(&mut self, op: &'static str) -> Chip8Result<()> {
        self.sync_state();

        match self.state {
            MachineState::Loaded | MachineState::Paused => Ok(()),
            state => Err(Chip8Error::InvalidState { op, state }),
        }
    }

    /// Execute a cycle on the calling thread, halting the machine on error.
    fn run_cycle(&mut self, instr: Option<u16>) -> Chip8Result<Flow> {
        let mut cpu = lock(&self.cpu);

        let result = match instr {
            Some(instr) => cpu.cycle_with(instr),
            None => cpu.cycle(),
        };

        match result {
            Ok(flow) => Ok(flow),
            Err(error) => {
                let pc = cpu.pc();
                let fault = Fault {
                    error,
                    pc,
                    instr: instr.or_else(|| cpu.memory().fetch(pc as usize).ok()),
                };
                drop(cpu);

                error!("machine halted: {fault}");
                *lock(&self.fault) = Some(fault);
                self.state = MachineState::Halted;
                Err(Chip8Error::Runtime(error))
            }
        }
    }

    /// Observe a fault raised by the execution thread.
    fn sync_state(&mut self) {
        if self.state == MachineState::Running && lock(&self.fault).is_some() {
            self.join_session();
            self.state = MachineState::Halted;
        }
    }

    fn spawn_session(&mut self, op: &'static str) -> Chip8Result<()> {
        let running = Arc::new(AtomicBool::new(true));
        let runner = Runner {
            cpu: self.cpu.clone(),
            clock: self.clock.clone(),
            keypad: self.keypad.clone(),
            fault: self.fault.clone(),
            running: running.clone(),
            interval: self.conf.cycle_interval(),
        };

        let handle = thread::Builder::new()
            .name("chip8-cpu".to_string())
            .spawn(move || runner.run())?;

        self.session = Some(Session { running, handle });
        self.state = MachineState::Running;

        info!("{op}: running at 0x{:04X}", self.pc());
        Ok(())
    }

    /// Signal the execution thread to exit, and wait a bounded time for it.
    fn join_session(&mut self) {
        let Some(Session { running, handle }) = self.session.take() else {
            return;
        };

        running.store(false, Ordering::Release);

        let timeout = Duration::from_millis(self.conf.join_timeout_ms);
        let deadline = Instant::now() + timeout;
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }

        if handle.is_finished() {
            if handle.join().is_err() {
                error!("execution thread panicked");
            }
        } else {
            // Detached. Its run flag is cleared, so it exits after the current cycle.
            warn!(
                "execution thread did not exit within {} ms",
                self.conf.join_timeout_ms
            );
        }
    }
}

impl Drop for Chip8Vm {
    fn drop(&mut self) {
        self.join_session();
    }
}

/// Read only inspection of machine state.
impl Chip8Vm {
    pub fn pc(&self) -> Address {
        lock(&self.cpu).pc()
    }

    pub fn registers(&self) -> Registers {
        lock(&self.cpu).registers().clone()
    }

    /// Value of the address register `I`.
    pub fn address(&self) -> Address {
        lock(&self.cpu).registers().address()
    }

    pub fn delay_timer(&self) -> u8 {
        lock(&self.cpu).delay_timer()
    }

    pub fn sound_timer(&self) -> u8 {
        lock(&self.cpu).sound_timer()
    }

    pub fn resolution(&self) -> Resolution {
        lock(&self.cpu).display().resolution()
    }

    /// Number of return addresses on the call stack.
    pub fn stack_depth(&self) -> usize {
        lock(&self.cpu).stack().len()
    }

    /// Copy `len` bytes of memory starting at `address`.
    pub fn read_memory(&self, address: usize, len: usize) -> Chip8Result<Vec<u8>> {
        Ok(lock(&self.cpu).memory().slice(address, len)?.to_vec())
    }
}

/// Troubleshooting
impl Chip8Vm {
    /// Returns the program memory as a human readable string, one word per line.
    pub fn dump_ram(&self, count: usize) -> Result<String, fmt::Error> {
        let cpu = lock(&self.cpu);
        let ram = cpu.memory().as_slice();
        let end = (MEM_START + count).min(ram.len());
        let mut buf = String::new();

        for (i, word) in ram[MEM_START..end].chunks(2).enumerate() {
            write!(buf, "{:04X}: ", MEM_START + i * 2)?;
            for byte in word {
                write!(buf, "{byte:02X}")?;
            }
            writeln!(buf)?;
        }

        Ok(buf)
    }

    pub fn dump_display(&self) -> Result<String, fmt::Error> {
        let mut buf = String::new();
        write!(buf, "{}", self.framebuffer_view())?;
        Ok(buf)
    }

    pub fn dump_keys(&self) -> Result<String, fmt::Error> {
        let mut buf = String::new();

        if self.keypad.any_key() {
            write!(buf, "keys: ")?;
            for i in 0..KEY_COUNT {
                if self.keypad.is_down(i) {
                    write!(buf, "k{i:x}")?;
                }
            }
        }

        Ok(buf)
    }
}

/// Body of the execution thread.
struct Runner {
    cpu: Arc<Mutex<Chip8Cpu>>,
    clock: Arc<dyn Clock>,
    keypad: Keypad,
    fault: Arc<Mutex<Option<Fault>>>,
    running: Arc<AtomicBool>,
    interval: Duration,
}

impl Runner {
    fn run(self) {
        let mut throttle = Throttle::new(self.interval, &*self.clock);

        while self.running.load(Ordering::Acquire) {
            // Suspend outside of the CPU lock, so the machine can be
            // inspected while it waits.
            if self.keypad.is_waiting() && !self.keypad.wait_key_down(&self.running) {
                debug!("key wait interrupted");
                break;
            }

            throttle.wait(&*self.clock);

            let mut cpu = lock(&self.cpu);
            if !self.running.load(Ordering::Acquire) {
                break;
            }

            if let Err(error) = cpu.cycle() {
                self.halt(&cpu, error);
                break;
            }

            if self.interval.is_zero() {
                drop(cpu);
                thread::yield_now();
            }
        }
    }

    fn halt(&self, cpu: &Chip8Cpu, error: RuntimeError) {
        let pc = cpu.pc();
        let fault = Fault {
            error,
            pc,
            instr: cpu.memory().fetch(pc as usize).ok(),
        };

        error!("machine halted: {fault}");
        *lock(&self.fault) = Some(fault);
        self.running.store(false, Ordering::Release);
    }
}

#[inline]
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// VM Configuration Parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Chip8Conf {
    /// Instruction throughput. `None` uses the default of 1000 Hz, and
    /// `Hz(0)` runs unthrottled.
    pub clock_frequency: Option<Hz>,
    /// Maximum nesting of subroutine calls.
    pub stack_depth: usize,
    /// Seed for `Cxnn`. Random when not set.
    pub rng_seed: Option<u64>,
    /// Time `pause` and `stop` wait for the execution thread to exit.
    pub join_timeout_ms: u64,
}

impl Default for Chip8Conf {
    fn default() -> Self {
        Self {
            clock_frequency: None,
            stack_depth: STACK_SIZE,
            rng_seed: None,
            join_timeout_ms: DEFAULT_JOIN_TIMEOUT_MS,
        }
    }
}

impl Chip8Conf {
    /// Time between the start of two cycles.
    pub fn cycle_interval(&self) -> Duration {
        self.clock_frequency
            .unwrap_or(Hz(DEFAULT_CLOCK_FREQUENCY))
            .into()
    }
}

/// CPU clock frequency, in hertz (per second)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct Hz(pub u64);

impl From<Hz> for Duration {
    fn from(freq: Hz) -> Self {
        if freq.0 == 0 {
            Duration::from_nanos(0)
        } else {
            Duration::from_nanos(NANOS_IN_SECOND / freq.0)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{clock::ManualClock, devices::KeyCode};

    const ORIGIN: Address = MEM_START as Address;

    fn vm() -> Chip8Vm {
        let conf = Chip8Conf {
            rng_seed: Some(1),
            ..Default::default()
        };
        Chip8Vm::with_clock(conf, Arc::new(ManualClock::new()))
    }

    #[test]
    fn test_clock_hz() {
        let interval: Duration = Hz(60).into();
        assert_eq!(interval.as_millis(), 16);

        let interval: Duration = Hz(0).into();
        assert!(interval.is_zero());

        assert_eq!(
            Chip8Conf::default().cycle_interval(),
            Duration::from_millis(1)
        );
    }

    /// Fx0A (LD Vx, K)
    ///
    /// Wait for a keypress, then store the key value in Vx.
    /// The VM must stall while waiting, and signal the state to the outer executer.
    #[test]
    #[rustfmt::skip]
    fn test_key_wait() {
        let mut vm = vm();
        vm.load_program(&[
            0xF1, 0x0A, // LD v1, K
            0x62, 0x42  // LD v2, 0x42  ; sentinal
        ]).unwrap();

        // machine must stall
        for _ in 0..6 {
            assert_eq!(vm.step_one_cycle().unwrap(), Flow::KeyWait);
            assert_eq!(vm.pc(), ORIGIN);
        }

        // machine has yielded, waiting for any key to be pressed.
        vm.keypad().set_down(KeyCode::Key5, true);

        // machine will now advance
        vm.step_one_cycle().unwrap();
        assert_eq!(vm.pc(), ORIGIN + 2);
        assert!(vm.keypad().is_down(0x05));
        assert_eq!(vm.registers().get(1), 0x05);

        // Ensure the machine is continuing
        vm.step_one_cycle().unwrap();
        assert_eq!(vm.pc(), ORIGIN + 4);
        assert_eq!(vm.registers().get(2), 0x42); // sentinal
    }

    #[test]
    fn test_lifecycle_rules() {
        let mut vm = vm();
        assert_eq!(vm.state(), MachineState::Idle);

        assert!(matches!(
            vm.play(),
            Err(Chip8Error::InvalidState {
                op: "play",
                state: MachineState::Idle
            })
        ));
        assert!(vm.resume().is_err());
        assert!(vm.step_one_cycle().is_err());

        // Pausing an idle machine does nothing.
        vm.pause().unwrap();
        assert_eq!(vm.state(), MachineState::Idle);

        vm.load_program(&[0x12, 0x00]).unwrap();
        assert_eq!(vm.state(), MachineState::Loaded);
        assert_eq!(vm.step_one_cycle().unwrap(), Flow::Jump);

        vm.execute_raw_instruction(0x00FF).unwrap();
        assert_eq!(vm.resolution(), Resolution::High);

        vm.stop();
        assert_eq!(vm.state(), MachineState::Idle);
        assert_eq!(vm.resolution(), Resolution::Low);
        assert_eq!(vm.read_memory(MEM_START, 2).unwrap(), vec![0, 0]);
    }

    #[test]
    fn test_load_too_large() {
        let mut vm = vm();
        let program = vec![0; MAX_PROGRAM_SIZE + 1];

        assert!(matches!(
            vm.load_program(&program),
            Err(Chip8Error::LargeProgram { size, max }) if size == MAX_PROGRAM_SIZE + 1 && max == MAX_PROGRAM_SIZE
        ));
        assert_eq!(vm.state(), MachineState::Idle);

        // Largest program still fits.
        vm.load_program(&program[1..]).unwrap();
        assert_eq!(vm.state(), MachineState::Loaded);
    }

    #[test]
    fn test_execute_raw_instruction() {
        let mut vm = vm();

        assert_eq!(vm.execute_raw_instruction(0x6A2C).unwrap(), Flow::Ok);
        assert_eq!(vm.registers().get(0xA), 0x2C);
        assert_eq!(vm.pc(), ORIGIN + 2);

        vm.execute_raw_instruction(0xA300).unwrap();
        assert_eq!(vm.address(), 0x300);

        vm.execute_raw_instruction(0x2400).unwrap();
        assert_eq!(vm.pc(), 0x400);
        assert_eq!(vm.stack_depth(), 1);

        // Raw instructions do not load a program.
        assert_eq!(vm.state(), MachineState::Idle);
    }

    #[test]
    fn test_fault_halts_machine() {
        let mut vm = vm();
        vm.load_program(&[0x60, 0x01, 0x00, 0xEE]).unwrap();

        vm.step_one_cycle().unwrap();
        assert!(matches!(
            vm.step_one_cycle(),
            Err(Chip8Error::Runtime(RuntimeError::StackUnderflow))
        ));

        assert_eq!(vm.state(), MachineState::Halted);
        assert_eq!(
            vm.fault(),
            Some(Fault {
                error: RuntimeError::StackUnderflow,
                pc: ORIGIN + 2,
                instr: Some(0x00EE),
            })
        );

        // Machine is left diagnosable.
        assert_eq!(vm.registers().get(0), 1);
        assert!(vm.step_one_cycle().is_err());
        assert!(vm.play().is_err());

        vm.stop();
        assert_eq!(vm.state(), MachineState::Idle);
        assert_eq!(vm.fault(), None);
    }

    #[test]
    fn test_run_steps() {
        let mut vm = vm();
        vm.load_program(&[0x60, 0x05, 0x70, 0x03, 0x12, 0x00]).unwrap();

        assert_eq!(vm.run_steps(30).unwrap(), Flow::Jump);
        assert_eq!(vm.registers().get(0), 8);
        assert_eq!(vm.pc(), ORIGIN);
    }

    #[test]
    fn test_dumps() {
        let mut vm = vm();
        vm.load_program(&[0x60, 0x05, 0x70]).unwrap();

        assert_eq!(vm.dump_ram(3).unwrap(), "0200: 6005\n0202: 70\n");

        let display = vm.dump_display().unwrap();
        assert_eq!(display.lines().count(), DISPLAY_HEIGHT);
        assert!(display.lines().all(|line| line == ".".repeat(DISPLAY_WIDTH)));

        assert_eq!(vm.dump_keys().unwrap(), "");
        vm.keypad().set_down(KeyCode::Key1, true);
        vm.keypad().set_down(KeyCode::KeyF, true);
        assert_eq!(vm.dump_keys().unwrap(), "keys: k1kf");
    }
}
