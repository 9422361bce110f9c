//! The retrace instruction set.
//!
//! Instructions are immutable descriptions of an operation. They never
//! touch machine state themselves: the VM asks each one for the change it
//! would make and applies that change separately.

use std::borrow::Cow;
use std::fmt;

use crate::builtin::Builtin;
use crate::label::Label;
use crate::value::Value;

/// A single VM operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Push a constant onto the top frame's operand stack.
    PushValue(Value),
    /// Discard the top operand.
    PopValue,
    /// Push a copy of the top operand.
    DuplicateTop,
    /// Push an empty frame with no arguments and no return address.
    PushStackFrame,
    /// Pop the top frame, discarding its operands and bindings.
    PopStackFrame,
    /// Pop `builtin.arity()` operands and push the result.
    CallBuiltin(Builtin),
    /// Jump to `target`, moving `arity` operands into a new frame's arguments.
    MethodCall { target: Label, arity: usize },
    /// Pop the current frame and resume after the caller's call site.
    Return { has_value: bool },
    /// Unconditional jump.
    Goto(Label),
    /// Pop the top operand and jump if it is truthy.
    IfGoto(Label),
    /// Pop the top operand and store it under `key`.
    SetVariable(String),
    /// Push the value bound to `key`, or `undefined`.
    GetVariable(String),
    /// Bind the top frame's arguments to names, in order.
    BindArgs(Vec<String>),
    /// Take one line of console input and push it as text.
    ConsoleRead,
    /// Pop the top operand and append it to the console text.
    ConsoleWrite { newline: bool },
    /// Execution is complete when the instruction pointer rests here.
    Terminate,
    /// Marker declaring a label at its own index. No runtime effect.
    Label(Label),
}

impl Instruction {
    /// Assembly mnemonic for this instruction.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instruction::PushValue(_) => "push",
            Instruction::PopValue => "pop",
            Instruction::DuplicateTop => "dup",
            Instruction::PushStackFrame => "frame.push",
            Instruction::PopStackFrame => "frame.pop",
            Instruction::CallBuiltin(_) => "builtin",
            Instruction::MethodCall { .. } => "call",
            Instruction::Return { has_value: false } => "ret",
            Instruction::Return { has_value: true } => "ret.value",
            Instruction::Goto(_) => "goto",
            Instruction::IfGoto(_) => "ifgoto",
            Instruction::SetVariable(_) => "set",
            Instruction::GetVariable(_) => "get",
            Instruction::BindArgs(_) => "bind",
            Instruction::ConsoleRead => "read",
            Instruction::ConsoleWrite { newline: false } => "write",
            Instruction::ConsoleWrite { newline: true } => "writeln",
            Instruction::Terminate => "halt",
            Instruction::Label(_) => "mark",
        }
    }

    /// The label this instruction jumps to, if it is a jump.
    pub fn jump_target(&self) -> Option<&Label> {
        match self {
            Instruction::MethodCall { target, .. } => Some(target),
            Instruction::Goto(label) | Instruction::IfGoto(label) => Some(label),
            _ => None,
        }
    }

    /// Returns true for [`Instruction::Terminate`].
    pub fn is_terminate(&self) -> bool {
        matches!(self, Instruction::Terminate)
    }
}

/// Render a value as an assembly literal (text is quoted and escaped).
pub fn literal(value: &Value) -> String {
    match value {
        Value::Text(s) => quoted(s),
        Value::Number(n) => format!("{n:?}"),
        other => other.to_string(),
    }
}

/// Quote `text` with the escapes string literals use.
pub fn quoted(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// True iff `name` reads back as the same single word when written bare.
///
/// Empty names and names holding whitespace, `;`, `"`, `#` or `:` would be
/// split, dropped or read as a scope or a declaration.
pub fn is_bare_name(name: &str) -> bool {
    !name.is_empty()
        && !name
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, ';' | '"' | '#' | ':'))
}

/// A variable or label name as written in assembly: bare when possible,
/// otherwise quoted.
pub fn name_token(name: &str) -> Cow<'_, str> {
    if is_bare_name(name) {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(quoted(name))
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.mnemonic();
        match self {
            Instruction::PushValue(v) => write!(f, "{m} {}", literal(v)),
            Instruction::CallBuiltin(b) => write!(f, "{m} {}", b.mnemonic()),
            Instruction::MethodCall { target, arity } => write!(f, "{m} {target} {arity}"),
            Instruction::Goto(label) | Instruction::IfGoto(label) | Instruction::Label(label) => {
                write!(f, "{m} {label}")
            }
            Instruction::SetVariable(key) | Instruction::GetVariable(key) => {
                write!(f, "{m} {}", name_token(key))
            }
            Instruction::BindArgs(names) => {
                write!(f, "{m}")?;
                for name in names {
                    write!(f, " {}", name_token(name))?;
                }
                Ok(())
            }
            _ => write!(f, "{m}"),
        }
    }
}
