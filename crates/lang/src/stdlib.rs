//! Runtime routines every program can call.
//!
//! The routines are plain instruction blocks behind global labels, emitted
//! by [`standard_library`] after the program's own code.

use retrace_common::{Instruction, Value};
use retrace_vm::{CodegenError, Emitter};

/// Names and arities of the standard routines.
pub const ROUTINES: [(&str, usize); 3] = [("print", 1), ("write", 1), ("input", 0)];

/// Parameter name used inside the routines. The `$` keeps it clear of
/// program variables that dynamic lookup would otherwise find.
const ARGUMENT: &str = "$value";

/// Arity of the standard routine `name`, if there is one.
pub fn arity_of(name: &str) -> Option<usize> {
    ROUTINES
        .iter()
        .find(|(routine, _)| *routine == name)
        .map(|(_, arity)| *arity)
}

/// Language initializer passed to [`retrace_vm::Machine::from_ast`].
pub fn standard_library(emitter: &mut Emitter) -> Result<(), CodegenError> {
    console_out(emitter, "print", true)?;
    console_out(emitter, "write", false)?;
    emitter.with_range("routine", |e, _| {
        e.add_global_label("input");
        e.add_instruction(Instruction::ConsoleRead);
        e.add_instruction(Instruction::Return { has_value: true });
        Ok(())
    })?;
    Ok(())
}

/// `name(value)`: write the value to the console and yield `undefined`.
fn console_out(emitter: &mut Emitter, name: &str, newline: bool) -> Result<(), CodegenError> {
    emitter.with_range("routine", |e, _| {
        e.add_global_label(name);
        e.add_instruction(Instruction::BindArgs(vec![ARGUMENT.to_string()]));
        e.add_instruction(Instruction::GetVariable(ARGUMENT.to_string()));
        e.add_instruction(Instruction::ConsoleWrite { newline });
        e.add_instruction(Instruction::PushValue(Value::Undefined));
        e.add_instruction(Instruction::Return { has_value: true });
        Ok(())
    })?;
    Ok(())
}
