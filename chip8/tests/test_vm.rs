use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use chip8::{constants::*, prelude::*, ManualClock, RuntimeError};

const ORIGIN: u16 = MEM_START as u16;

/// Poll until the condition holds, giving up after a generous deadline.
fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

fn threaded_vm() -> Chip8Vm {
    let conf = Chip8Conf {
        clock_frequency: Some(Hz(0)),
        rng_seed: Some(42),
        join_timeout_ms: 500,
        ..Default::default()
    };
    Chip8Vm::with_clock(conf, Arc::new(ManualClock::new()))
}

#[test]
fn test_end_to_end_loop() {
    let mut vm = Chip8Vm::new(Chip8Conf::default());
    vm.load_rom(&Rom::from_bytes([0x60, 0x05, 0x70, 0x03, 0x12, 0x00]).unwrap())
        .unwrap();

    for n in 3..10 {
        vm.stop();
        vm.load_program(&[0x60, 0x05, 0x70, 0x03, 0x12, 0x00])
            .unwrap();
        vm.run_steps(n).unwrap();

        assert_eq!(vm.registers().get(0), 8);
        assert_eq!(vm.pc(), ORIGIN);
    }
}

#[test]
fn test_play_pause_resume_stop() {
    let mut vm = threaded_vm();
    #[rustfmt::skip]
    vm.load_program(&[
        0x71, 0x01, // ADD v1, 1
        0x12, 0x00, // JP 0x200
    ]).unwrap();

    vm.play().unwrap();
    assert!(wait_until(|| vm.registers().get(1) > 10));

    // Already running.
    vm.play().unwrap();
    vm.resume().unwrap();

    vm.pause().unwrap();
    assert_eq!(vm.state(), MachineState::Paused);
    let snapshot = vm.registers();
    thread::sleep(Duration::from_millis(20));
    assert_eq!(vm.registers(), snapshot);

    // Stepping is allowed while paused.
    vm.step_one_cycle().unwrap();

    vm.resume().unwrap();
    assert!(matches!(
        vm.step_one_cycle(),
        Err(Chip8Error::InvalidState {
            state: MachineState::Running,
            ..
        })
    ));
    assert!(vm.execute_raw_instruction(0x6000).is_err());

    vm.stop();
    assert_eq!(vm.state(), MachineState::Idle);
    assert_eq!(vm.registers().get(1), 0);
    assert_eq!(vm.pc(), ORIGIN);
}

#[test]
fn test_play_from_paused_resumes() {
    let mut vm = threaded_vm();
    vm.load_program(&[0x71, 0x01, 0x12, 0x00]).unwrap();

    vm.play().unwrap();
    vm.pause().unwrap();
    let before = vm.registers().get(1);

    vm.play().unwrap();
    assert_eq!(vm.state(), MachineState::Running);
    assert!(wait_until(|| vm.registers().get(1) != before));
    vm.pause().unwrap();
}

#[test]
#[rustfmt::skip]
fn test_waiting_for_key() {
    let mut vm = threaded_vm();
    vm.load_program(&[
        0xF1, 0x0A, // LD v1, K
        0x62, 0x42, // LD v2, 0x42
        0x12, 0x04, // JP 0x204
    ]).unwrap();

    vm.play().unwrap();
    assert!(wait_until(|| vm.state() == MachineState::WaitingForKey));
    assert_eq!(vm.pc(), ORIGIN);

    // A pause while suspended is honoured, and the wait survives it.
    vm.pause().unwrap();
    assert_eq!(vm.state(), MachineState::Paused);
    assert!(vm.keypad().is_waiting());

    vm.keypad().set_down(KeyCode::KeyB, true);
    vm.resume().unwrap();

    assert!(wait_until(|| vm.registers().get(2) == 0x42));
    assert_eq!(vm.registers().get(1), 0xB);
    assert_eq!(vm.state(), MachineState::Running);

    vm.stop();
    assert!(!vm.keypad().is_waiting());
}

#[test]
fn test_fault_on_execution_thread() {
    let mut vm = threaded_vm();
    // RET with an empty stack.
    vm.load_program(&[0x00, 0xEE]).unwrap();

    vm.play().unwrap();
    assert!(wait_until(|| vm.state() == MachineState::Halted));

    let fault = vm.fault().unwrap();
    assert_eq!(fault.error, RuntimeError::StackUnderflow);
    assert_eq!(fault.pc, ORIGIN);
    assert_eq!(fault.instr, Some(0x00EE));

    assert!(matches!(
        vm.play(),
        Err(Chip8Error::InvalidState {
            state: MachineState::Halted,
            ..
        })
    ));

    vm.stop();
    assert_eq!(vm.state(), MachineState::Idle);
}

#[test]
fn test_draw_publishes_frame() {
    let mut vm = threaded_vm();
    #[rustfmt::skip]
    vm.load_program(&[
        0x60, 0x0A, // LD v0, 10
        0xF0, 0x29, // LD F, v0
        0xD1, 0x15, // DRW v1, v1, 5
        0x12, 0x06, // JP 0x206
    ]).unwrap();

    let monitor = vm.monitor().clone();
    vm.play().unwrap();
    assert!(wait_until(|| monitor.frame().lit() > 0));
    vm.pause().unwrap();

    // Glyph "A" is 0xF0 0x90 0xF0 0x90 0x90.
    assert_eq!(monitor.frame().lit(), 4 + 2 + 4 + 2 + 2);
    assert_eq!(vm.framebuffer_view(), monitor.frame());

    // Stopping clears the screen, and observers see it.
    vm.stop();
    assert_eq!(monitor.frame().lit(), 0);
}

#[test]
fn test_stop_after_join_timeout() {
    // Cycles are half a second apart, so the thread is asleep when stopped.
    let conf = Chip8Conf {
        clock_frequency: Some(Hz(2)),
        join_timeout_ms: 10,
        ..Default::default()
    };
    let mut vm = Chip8Vm::new(conf);
    #[rustfmt::skip]
    vm.load_program(&[
        0x71, 0x01, // ADD v1, 1
        0x12, 0x00, // JP 0x200
    ]).unwrap();

    vm.play().unwrap();
    vm.stop();

    let check_reset = |vm: &Chip8Vm| {
        assert_eq!(vm.state(), MachineState::Idle);
        assert_eq!(vm.pc(), ORIGIN);
        assert_eq!(vm.registers().get(1), 0);
        assert_eq!(vm.read_memory(MEM_START, 4).unwrap(), vec![0; 4]);
    };
    check_reset(&vm);

    // The abandoned thread wakes up, and must not touch the machine.
    thread::sleep(Duration::from_millis(700));
    check_reset(&vm);

    #[rustfmt::skip]
    vm.load_program(&[
        0x72, 0x01, // ADD v2, 1
        0x12, 0x00, // JP 0x200
    ]).unwrap();
    vm.play().unwrap();

    assert!(wait_until(|| vm.registers().get(2) > 0));
    vm.pause().unwrap();
    assert_eq!(vm.registers().get(1), 0);
}

#[test]
fn test_rom_errors() {
    let err = Rom::load("definitely/not/a/rom.ch8").unwrap_err();
    assert!(matches!(err, Chip8Error::RomNotFound(_)));

    let err = Rom::from_bytes(vec![0; MAX_PROGRAM_SIZE + 1]).unwrap_err();
    assert!(matches!(
        err,
        Chip8Error::LargeProgram {
            max: MAX_PROGRAM_SIZE,
            ..
        }
    ));
}

#[test]
fn test_disassemble_listing() {
    let mut listing = String::new();
    Disassembler::new(&[0x00, 0xE0, 0xD1, 0x20, 0xF3, 0x30])
        .disassemble(&mut listing)
        .unwrap();

    assert_eq!(
        listing,
        "0200: 00E0  CLS\n0202: D120  DRW v1, v2, 0\n0204: F330  LD HF, v3\n"
    );
}
