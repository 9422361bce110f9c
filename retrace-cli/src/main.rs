//! retrace CLI: run, trace and disassemble assembly programs.
//!
//! Exit codes:
//! - 0: Success
//! - 1: Input/assembly error
//! - 2: Label resolution error
//! - 3: Runtime error
//! - 4: Step budget exhausted

mod commands;

use std::process;

use tracing_subscriber::EnvFilter;

fn main() {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let verbosity = take_verbosity(&mut args);
    init_logging(verbosity);

    if args.is_empty() {
        print_usage();
        process::exit(1);
    }

    let result = match args[0].as_str() {
        "run" => commands::run(&args[1..]),
        "trace" => commands::trace(&args[1..]),
        "disassemble" => commands::disassemble(&args[1..]),
        "--help" | "-h" | "help" => {
            print_usage();
            process::exit(0);
        }
        other => {
            eprintln!("error: unknown command '{other}'");
            eprintln!();
            print_usage();
            process::exit(1);
        }
    };

    if let Err(code) = result {
        process::exit(code);
    }
}

/// Strip the `-v`/`-vv`/`--verbose` flags that precede the command word.
/// Later arguments belong to the command, option values included.
fn take_verbosity(args: &mut Vec<String>) -> usize {
    let mut verbosity = 0;
    let mut taken = 0;
    for arg in args.iter() {
        match arg.as_str() {
            "-v" | "--verbose" => verbosity += 1,
            "-vv" => verbosity += 2,
            _ => break,
        }
        taken += 1;
    }
    args.drain(..taken);
    verbosity
}

/// Log to stderr. `RETRACE_LOG` takes precedence over `-v`.
fn init_logging(verbosity: usize) {
    let default = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("RETRACE_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

fn print_usage() {
    eprintln!("Usage: retrace [-v] <command> [args]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  run <file.rasm> [--input LINE]... [--max-steps N]");
    eprintln!("                                 Run to completion, print console and stack");
    eprintln!("  trace <file.rasm> [--input LINE]... [--max-steps N] [--back N]");
    eprintln!("                                 Print every step, then step back N times");
    eprintln!("  disassemble <file.rasm>        Print the canonical assembly");
    eprintln!();
    eprintln!("Logging: -v (debug), -vv (trace), or RETRACE_LOG=<filter>");
}
