//! retrace assembler: text assembly <-> [`Program`].
//!
//! The assembler is a mechanical 1:1 translation: one line per instruction
//! or label declaration, no macros, no sugar.
//!
//! # Usage
//!
//! ```
//! use retrace_assembler::{assemble, disassemble};
//!
//! let text = "frame.push\npush 2.0\npush 3.0\nbuiltin add\nhalt\n";
//! let program = assemble(text).unwrap();
//! assert_eq!(program.instructions.len(), 5);
//! assert_eq!(disassemble(&program), text);
//! ```
//!
//! # Syntax
//!
//! ```text
//! ; comment
//! square:              ; global label, bound to the next instruction
//!   bind x
//!   get x
//!   get x
//!   builtin mul
//!   ret.value
//! end#3:               ; local label owned by node 3
//!   push "text\n"
//!   set "my var"       ; names that are not bare words are quoted
//! "f#1":               ; a global label whose name holds '#'
//! ```
//!
//! # Roundtrip Guarantee
//!
//! `assemble(disassemble(program))` reproduces the instructions and label
//! declarations of any program whose labels are declared in index order.
//! Node ranges are not part of the text format.

pub mod error;

mod disassembler;
mod lexer;
mod parser;

pub use error::AsmError;

use lexer::tokenize_line;
use parser::parse_line;
use retrace_common::Program;

/// Assemble text into a program.
///
/// Returns the first error encountered. Labels are not resolved here:
/// duplicates and dangling references are reported when a machine is built.
pub fn assemble(text: &str) -> Result<Program, AsmError> {
    let mut program = Program::default();

    for (idx, line) in text.lines().enumerate() {
        let line_num = idx + 1;
        let tokens = tokenize_line(line, line_num)?;
        let parsed = parse_line(&tokens, line_num)?;
        for label in parsed.labels {
            program.declare(label);
        }
        if let Some(instr) = parsed.instruction {
            program.push(instr);
        }
    }

    Ok(program)
}

/// Disassemble a program into canonical assembly text.
pub fn disassemble(program: &Program) -> String {
    disassembler::disassemble(program)
}
