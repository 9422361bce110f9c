//! CLI command implementations.

use std::fs;

use retrace_common::instruction::literal;
use retrace_common::{Program, Value};
use retrace_vm::{Machine, RuntimeError};
use tracing::debug;

/// Flags shared by `run` and `trace`.
#[derive(Debug, Default, PartialEq)]
struct Options {
    input: Vec<String>,
    max_steps: Option<usize>,
    back: usize,
}

/// Assemble, build and run a program to completion.
pub fn run(args: &[String]) -> Result<(), i32> {
    if args.is_empty() {
        eprintln!("error: run requires an input file");
        eprintln!("Usage: retrace run <file.rasm> [--input LINE]... [--max-steps N]");
        return Err(1);
    }

    let path = &args[0];
    let options = parse_options(&args[1..], false)?;
    let mut machine = load(path, &options)?;

    let outcome = drive(&mut machine, options.max_steps, |_| {});
    print!("{}", machine.console_text());
    if let Some(frame) = machine.stack().top() {
        for value in &frame.operands {
            println!("=> {}", show(value));
        }
    }
    finish(outcome)
}

/// Print each step as it executes, then step back `--back` times.
pub fn trace(args: &[String]) -> Result<(), i32> {
    if args.is_empty() {
        eprintln!("error: trace requires an input file");
        eprintln!(
            "Usage: retrace trace <file.rasm> [--input LINE]... [--max-steps N] [--back N]"
        );
        return Err(1);
    }

    let path = &args[0];
    let options = parse_options(&args[1..], true)?;
    let mut machine = load(path, &options)?;

    let outcome = drive(&mut machine, options.max_steps, |m| {
        println!("{}", step_line('+', m, previous_ip(m)));
    });

    // A failed step is never recorded, so every outcome rewinds the same way.
    for _ in 0..options.back {
        if !machine.can_reverse() {
            break;
        }
        machine.step_backward().map_err(|e| {
            eprintln!("runtime error: {e}");
            3
        })?;
        let at = machine.current_instruction_pointer();
        println!("{}", step_line('-', &machine, at));
    }

    if !machine.console_text().is_empty() {
        println!("console: {}", literal(&Value::Text(machine.console_text().to_string())));
    }
    finish(outcome)
}

/// Print the canonical assembly of a program.
pub fn disassemble(args: &[String]) -> Result<(), i32> {
    if args.is_empty() {
        eprintln!("error: disassemble requires an input file");
        eprintln!("Usage: retrace disassemble <file.rasm>");
        return Err(1);
    }

    let program = read_program(&args[0])?;
    print!("{}", retrace_assembler::disassemble(&program));
    Ok(())
}

// --- Helpers ---

/// Why stepping stopped early.
#[derive(Debug)]
enum Stop {
    Runtime(RuntimeError),
    Budget { at: usize, steps: usize },
}

/// Step forward until halted, an error, or `max_steps` steps.
fn drive(
    machine: &mut Machine,
    max_steps: Option<usize>,
    mut on_step: impl FnMut(&Machine),
) -> Result<usize, Stop> {
    let mut steps = 0;
    while machine.can_continue() {
        if max_steps.is_some_and(|max| steps >= max) {
            return Err(Stop::Budget {
                at: machine.current_instruction_pointer(),
                steps,
            });
        }
        machine.step_forward().map_err(Stop::Runtime)?;
        steps += 1;
        on_step(machine);
    }
    Ok(steps)
}

/// Report how stepping ended and map it to an exit code.
fn finish(outcome: Result<usize, Stop>) -> Result<(), i32> {
    match outcome {
        Ok(steps) => {
            debug!(target: "retrace::cli", steps, "halted");
            eprintln!("halted after {steps} steps");
            Ok(())
        }
        Err(Stop::Runtime(e)) => {
            eprintln!("runtime error: {e}");
            Err(3)
        }
        Err(Stop::Budget { at, steps }) => {
            eprintln!("error: step budget exhausted at instruction {at} after {steps} steps");
            Err(4)
        }
    }
}

/// Read, assemble and build, queueing `--input` lines.
fn load(path: &str, options: &Options) -> Result<Machine, i32> {
    let program = read_program(path)?;
    let mut machine = Machine::from_program(program).map_err(|e| {
        eprintln!("error: {e}");
        2
    })?;
    for line in &options.input {
        machine.push_input(line.as_str());
    }
    Ok(machine)
}

/// Read and assemble a .rasm text file.
fn read_program(path: &str) -> Result<Program, i32> {
    let text = fs::read_to_string(path).map_err(|e| {
        eprintln!("error: cannot read '{path}': {e}");
        1
    })?;
    let program = retrace_assembler::assemble(&text).map_err(|e| {
        eprintln!("error: {path}: {e}");
        1
    })?;
    debug!(
        target: "retrace::cli",
        path,
        instructions = program.len(),
        labels = program.labels.len(),
        "assembled"
    );
    Ok(program)
}

/// Parse `--input`, `--max-steps` and (for `trace`) `--back`.
fn parse_options(args: &[String], allow_back: bool) -> Result<Options, i32> {
    let mut options = Options::default();
    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        let value = || {
            args.get(i + 1).ok_or_else(|| {
                eprintln!("error: {flag} requires a value");
                1
            })
        };
        match flag {
            "--input" => options.input.push(value()?.clone()),
            "--max-steps" => options.max_steps = Some(parse_count(flag, value()?)?),
            "--back" if allow_back => options.back = parse_count(flag, value()?)?,
            other => {
                eprintln!("error: unexpected argument '{other}'");
                return Err(1);
            }
        }
        i += 2;
    }
    Ok(options)
}

fn parse_count(flag: &str, value: &str) -> Result<usize, i32> {
    value.parse().map_err(|_| {
        eprintln!("error: {flag} expects a non-negative integer, got '{value}'");
        1
    })
}

/// The index of the instruction the last forward step executed.
fn previous_ip(machine: &Machine) -> usize {
    let last = machine.history().last().map_or(0, |change| change.ip_delta);
    machine
        .current_instruction_pointer()
        .checked_add_signed(-last)
        .unwrap_or_default()
}

/// One trace line: direction, step count, instruction index and text,
/// then the top frame's operands.
fn step_line(direction: char, machine: &Machine, at: usize) -> String {
    let instruction = machine
        .instructions()
        .get(at)
        .map(|i| i.to_string())
        .unwrap_or_default();
    let operands = machine
        .stack()
        .top()
        .map(|frame| {
            frame
                .operands
                .iter()
                .map(show)
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default();
    format!(
        "{direction}{:>5} {at:>4}  {instruction:<24} [{operands}]",
        machine.instruction_count()
    )
}

/// Numbers and booleans as printed by the console, text quoted.
fn show(value: &Value) -> String {
    match value {
        Value::Text(_) => literal(value),
        other => other.to_string(),
    }
}
