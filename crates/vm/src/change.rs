//! Machine changes: first-class, invertible descriptions of one step.
//!
//! Every instruction produces a [`MachineChange`] instead of mutating the
//! machine. The machine applies the change and keeps it in its history;
//! stepping backward applies [`MachineChange::inverted`].
//!
//! Application order is fixed: operand pops, frame edits, global edits,
//! frame pops, frame pushes, operand pushes, console, input, instruction
//! pointer. Inversion swaps every pushed/popped pair, swaps before/after in
//! every edit, reverses the edit order and negates the pointer delta. Two
//! constraints keep that order self-inverse:
//!
//! - a change never pops operands and frames together;
//! - frame edits only address frames that survive the change.

use retrace_common::Value;

use crate::frame::StackFrame;

/// What a frame edit touches, with its value before and after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameField {
    /// A binding in the frame's environment.
    Variable {
        key: String,
        before: Value,
        after: Value,
    },
    /// The frame's recorded call site.
    ReturnAddress {
        before: Option<usize>,
        after: Option<usize>,
    },
}

/// A field change on the frame at index `frame` (0 = outermost).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameEdit {
    pub frame: usize,
    pub field: FrameField,
}

impl FrameEdit {
    /// Bind `key` in frame `frame`.
    pub fn variable(frame: usize, key: impl Into<String>, before: Value, after: Value) -> Self {
        Self {
            frame,
            field: FrameField::Variable {
                key: key.into(),
                before,
                after,
            },
        }
    }

    /// Record a call site on frame `frame`.
    pub fn return_address(frame: usize, before: Option<usize>, after: Option<usize>) -> Self {
        Self {
            frame,
            field: FrameField::ReturnAddress { before, after },
        }
    }

    fn inverted(&self) -> Self {
        let field = match &self.field {
            FrameField::Variable { key, before, after } => FrameField::Variable {
                key: key.clone(),
                before: after.clone(),
                after: before.clone(),
            },
            FrameField::ReturnAddress { before, after } => FrameField::ReturnAddress {
                before: *after,
                after: *before,
            },
        };
        Self {
            frame: self.frame,
            field,
        }
    }
}

/// A binding change in the global environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvEdit {
    pub key: String,
    pub before: Value,
    pub after: Value,
}

impl EnvEdit {
    fn inverted(&self) -> Self {
        Self {
            key: self.key.clone(),
            before: self.after.clone(),
            after: self.before.clone(),
        }
    }
}

/// Text removed from the end of the console, then text appended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsoleChange {
    pub appended: String,
    pub removed: String,
}

impl ConsoleChange {
    fn inverted(&self) -> Self {
        Self {
            appended: self.removed.clone(),
            removed: self.appended.clone(),
        }
    }
}

/// Everything one step altered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineChange {
    /// Operands removed from the top frame, in stack order (deepest first).
    pub stack_popped: Vec<Value>,
    /// Operands pushed onto the top frame, in push order.
    pub stack_pushed: Vec<Value>,
    /// Frames removed, as they were when removed (topmost last).
    pub frames_popped: Vec<StackFrame>,
    /// Frames pushed, in push order.
    pub frames_pushed: Vec<StackFrame>,
    /// Field changes on surviving frames, in application order.
    pub frame_edits: Vec<FrameEdit>,
    /// Global environment changes, in application order.
    pub global_edits: Vec<EnvEdit>,
    /// Console text change.
    pub console: Option<ConsoleChange>,
    /// Line taken from the front of the input queue.
    pub input_consumed: Option<String>,
    /// Line put back at the front of the input queue.
    pub input_restored: Option<String>,
    /// Signed instruction pointer movement.
    pub ip_delta: isize,
}

impl Default for MachineChange {
    fn default() -> Self {
        Self::advance()
    }
}

impl MachineChange {
    /// A change that only moves to the next instruction.
    pub fn advance() -> Self {
        Self::jump(1)
    }

    /// A change that only moves the instruction pointer by `ip_delta`.
    pub fn jump(ip_delta: isize) -> Self {
        Self {
            stack_popped: Vec::new(),
            stack_pushed: Vec::new(),
            frames_popped: Vec::new(),
            frames_pushed: Vec::new(),
            frame_edits: Vec::new(),
            global_edits: Vec::new(),
            console: None,
            input_consumed: None,
            input_restored: None,
            ip_delta,
        }
    }

    /// The change that exactly undoes this one.
    pub fn inverted(&self) -> Self {
        Self {
            stack_popped: self.stack_pushed.clone(),
            stack_pushed: self.stack_popped.clone(),
            frames_popped: self.frames_pushed.clone(),
            frames_pushed: self.frames_popped.clone(),
            frame_edits: self.frame_edits.iter().rev().map(FrameEdit::inverted).collect(),
            global_edits: self.global_edits.iter().rev().map(EnvEdit::inverted).collect(),
            console: self.console.as_ref().map(ConsoleChange::inverted),
            input_consumed: self.input_restored.clone(),
            input_restored: self.input_consumed.clone(),
            ip_delta: -self.ip_delta,
        }
    }

    /// Returns true if the change does nothing at all.
    pub fn is_noop(&self) -> bool {
        *self == Self::jump(0)
    }
}
