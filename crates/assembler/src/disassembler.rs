//! Disassembler: program -> canonical assembly text.
//!
//! Output format is flat text, one label declaration or instruction per
//! line. Labels come on their own line directly before the instruction
//! they are bound to; labels bound past the last instruction close the
//! listing.

use retrace_common::Program;

/// Disassemble a program into canonical assembly text.
///
/// For programs whose label declarations are in index order (everything
/// the emitter or the assembler produces), the output reassembles to an
/// identical instruction sequence and label list.
pub fn disassemble(program: &Program) -> String {
    let mut out = String::new();
    for (index, instr) in program.instructions.iter().enumerate() {
        write_labels(&mut out, program, index);
        out.push_str(&instr.to_string());
        out.push('\n');
    }
    write_labels(&mut out, program, program.len());
    out
}

fn write_labels(out: &mut String, program: &Program, index: usize) {
    for label in program.labels_at(index) {
        out.push_str(&label.to_string());
        out.push_str(":\n");
    }
}
