//! Entrypoint for CLI
use std::{
    env,
    error::Error,
    io::{self, BufRead},
    sync::mpsc,
    thread,
    time::{Duration, Instant},
};

use chip8::{prelude::*, Registers, IMPL_VERSION};
use log::{info, LevelFilter};

mod config;
mod error;
mod input;

use self::{config::CliConfig, error::CliError};

static USAGE: &str = r#"
usage: chip8 CMD [ARGS]

commands:
    run ROM [--config FILE] [--seconds N]
            Run the target ROM file. Key events are read from
            standard input: `+w` press, `-w` release, `w` tap.
    steps ROM N
            Run N cycles as fast as possible and print the display
    dis ROM
            Disassemble the target ROM into readable assembly
    exec
            Execute hexadecimal instruction words read from standard input

examples:
    chip8 run breakout.ch8 --seconds 30
    chip8 steps maze.ch8 1000
    chip8 dis breakout.ch8
    echo "6A2C A300 FA33" | chip8 exec
"#;

/// Interval at which the run command checks whether the machine halted.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

fn run_rom(
    filepath: &str,
    config_path: Option<&str>,
    seconds: Option<u64>,
) -> Result<(), CliError> {
    let config = match config_path {
        Some(path) => CliConfig::from_file(path)?,
        None => CliConfig::default(),
    };
    let keymap = config.keymap();

    let rom = Rom::load(filepath)?;
    let mut vm = Chip8Vm::new(config.vm.clone());
    vm.load_rom(&rom)?;

    let (done_tx, done_rx) = mpsc::channel();
    {
        let keypad = vm.keypad().clone();
        thread::Builder::new()
            .name("stdin-keys".to_string())
            .spawn(move || {
                input::feed_keys(io::stdin().lock(), &keymap, &keypad);
                // Receiver is gone when the time limit was reached first.
                let _ = done_tx.send(());
            })?;
    }

    vm.play()?;
    let start = Instant::now();
    let deadline = seconds.map(|secs| start + Duration::from_secs(secs));

    loop {
        if vm.state() == MachineState::Halted {
            break;
        }

        match deadline {
            Some(deadline) if Instant::now() >= deadline => break,
            // Without a time limit, run until input is closed.
            None if done_rx.try_recv().is_ok() => break,
            _ => thread::sleep(POLL_INTERVAL),
        }
    }

    vm.pause()?;
    info!("ran for {:.2}s", start.elapsed().as_secs_f64());

    println!("{}", vm.dump_display()?);
    if let Some(fault) = vm.fault() {
        println!("halted: {fault}");
    }

    vm.stop();
    Ok(())
}

fn run_steps(filepath: &str, step_count: usize) -> Result<(), CliError> {
    let rom = Rom::load(filepath)?;
    let mut vm = Chip8Vm::new(Chip8Conf::default());
    vm.load_rom(&rom)?;

    let start = Instant::now();
    let result = vm.run_steps(step_count);
    let end = Instant::now();

    println!(
        "time taken: {}ms",
        end.duration_since(start).as_nanos() as f64 / 1000000.0
    ); // to millis
    println!("{}", vm.dump_display()?);
    println!("{}", format_registers(vm.pc(), &vm.registers()));

    result?;

    Ok(())
}

fn run_disassembler(filepath: &str) -> Result<(), CliError> {
    let rom = Rom::load(filepath)?;
    Disassembler::new(rom.as_bytes()).print_bytecode()?;
    Ok(())
}

/// Interactive opcode evaluation.
fn run_exec(reader: impl BufRead) -> Result<(), CliError> {
    let mut vm = Chip8Vm::new(Chip8Conf::default());

    for line in reader.lines() {
        let line = line?;

        for token in line.split_whitespace() {
            let instr = parse_instr(token)?;
            let flow = vm.execute_raw_instruction(instr)?;

            println!("{instr:04X}  {:<16} {flow:?}", Op::decode(instr).to_string());
            println!("{}", format_registers(vm.pc(), &vm.registers()));
        }
    }

    Ok(())
}

fn parse_instr(token: &str) -> Result<u16, CliError> {
    let digits = token.trim_start_matches("0x").trim_start_matches("0X");
    u16::from_str_radix(digits, 16)
        .map_err(|err| CliError::parse(format!("invalid instruction '{token}': {err}")))
}

fn format_registers(pc: u16, registers: &Registers) -> String {
    let mut buf = format!("PC={pc:04X} I={:04X}", registers.address());
    for (i, value) in registers.as_array().iter().enumerate() {
        buf.push_str(&format!(" v{i:X}={value:02X}"));
    }
    buf
}

fn main() -> Result<(), Box<dyn Error>> {
    simple_logger::SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .env()
        .init()?;

    match parse_args(env::args().skip(1)) {
        Some(Cmd::Run {
            filepath,
            config,
            seconds,
        }) => run_rom(&filepath, config.as_deref(), seconds)?,
        Some(Cmd::Steps {
            filepath,
            step_count,
        }) => run_steps(&filepath, step_count)?,
        Some(Cmd::Dis { filepath }) => run_disassembler(&filepath)?,
        Some(Cmd::Exec) => run_exec(io::stdin().lock())?,
        None => {
            print_usage();
            // FreeBSD EX_USAGE (64)
            std::process::exit(64)
        }
    }

    Ok(())
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Option<Cmd> {
    let cmd = args.next()?;

    match cmd.as_str() {
        "run" => {
            let filepath = args.next()?;
            let mut config = None;
            let mut seconds = None;

            while let Some(flag) = args.next() {
                match flag.as_str() {
                    "--config" => config = Some(args.next()?),
                    "--seconds" => seconds = Some(args.next()?.parse().ok()?),
                    _ => return None,
                }
            }

            Some(Cmd::Run {
                filepath,
                config,
                seconds,
            })
        }
        "steps" => Some(Cmd::Steps {
            filepath: args.next()?,
            step_count: args.next()?.parse().ok()?,
        }),
        "dis" => Some(Cmd::Dis {
            filepath: args.next()?,
        }),
        "exec" => Some(Cmd::Exec),
        _ => None,
    }
}

fn print_usage() {
    println!("Chip8 v{IMPL_VERSION}");
    println!("{USAGE}");
}

#[derive(Debug, PartialEq, Eq)]
enum Cmd {
    /// Run file on the execution thread
    Run {
        filepath: String,
        config: Option<String>,
        seconds: Option<u64>,
    },
    /// Run a fixed number of cycles
    Steps { filepath: String, step_count: usize },
    /// Disassemble
    Dis { filepath: String },
    /// Evaluate instructions
    Exec,
}

#[cfg(test)]
mod test {
    use super::*;

    fn args(line: &str) -> impl Iterator<Item = String> + '_ {
        line.split_whitespace().map(String::from)
    }

    #[test]
    fn test_parse_args() {
        assert_eq!(
            parse_args(args("run pong.ch8 --seconds 5 --config keys.yaml")),
            Some(Cmd::Run {
                filepath: "pong.ch8".to_string(),
                config: Some("keys.yaml".to_string()),
                seconds: Some(5),
            })
        );
        assert_eq!(
            parse_args(args("steps maze.ch8 100")),
            Some(Cmd::Steps {
                filepath: "maze.ch8".to_string(),
                step_count: 100,
            })
        );
        assert_eq!(parse_args(args("exec")), Some(Cmd::Exec));

        assert_eq!(parse_args(args("")), None);
        assert_eq!(parse_args(args("run")), None);
        assert_eq!(parse_args(args("run pong.ch8 --seconds")), None);
        assert_eq!(parse_args(args("steps maze.ch8 many")), None);
        assert_eq!(parse_args(args("asm game.asm")), None);
    }

    #[test]
    fn test_parse_instr() {
        assert_eq!(parse_instr("6A2C").unwrap(), 0x6A2C);
        assert_eq!(parse_instr("0x00e0").unwrap(), 0x00E0);
        assert!(parse_instr("G000").is_err());
        assert!(parse_instr("12345").is_err());
    }

    #[test]
    fn test_exec_reports_faults() {
        assert!(run_exec("6A2C A300\nF333".as_bytes()).is_ok());
        assert!(run_exec("00EE".as_bytes()).is_err());
    }

    #[test]
    fn test_format_registers() {
        let mut registers = Registers::new();
        registers.set(0xA, 0x2C);
        registers.set_address(0x300);

        let text = format_registers(0x202, &registers);
        assert!(text.starts_with("PC=0202 I=0300 v0=00"));
        assert!(text.contains(" vA=2C "));
        assert!(text.ends_with(" vF=00"));
    }
}
