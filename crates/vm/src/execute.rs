//! Instruction semantics: what each instruction would change.
//!
//! Nothing here mutates the machine. Each instruction reads the current
//! state and describes its effect as a [`MachineChange`]; the driver in
//! `machine.rs` checks and applies it.

use retrace_common::{Builtin, Instruction, Label, Value, TERMINATE_LABEL};

use crate::change::{ConsoleChange, EnvEdit, FrameEdit, FrameField, MachineChange};
use crate::error::RuntimeError;
use crate::frame::StackFrame;
use crate::machine::Machine;

impl Machine {
    /// Compute the change `instr` makes when executed at the current pointer.
    pub(crate) fn change_for(&self, instr: &Instruction) -> Result<MachineChange, RuntimeError> {
        match instr {
            Instruction::PushValue(value) => self.exec_push_value(value),
            Instruction::PopValue => self.exec_pop_value(),
            Instruction::DuplicateTop => self.exec_duplicate_top(),
            Instruction::PushStackFrame => Ok(MachineChange {
                frames_pushed: vec![StackFrame::new()],
                ..MachineChange::advance()
            }),
            Instruction::PopStackFrame => Ok(MachineChange {
                frames_popped: vec![self.top_frame()?.clone()],
                ..MachineChange::advance()
            }),
            Instruction::CallBuiltin(builtin) => self.exec_call_builtin(*builtin),
            Instruction::MethodCall { target, arity } => self.exec_method_call(target, *arity),
            Instruction::Return { has_value } => self.exec_return(*has_value),
            Instruction::Goto(label) => Ok(MachineChange::jump(self.delta_to(label)?)),
            Instruction::IfGoto(label) => self.exec_if_goto(label),
            Instruction::SetVariable(key) => self.exec_set_variable(key),
            Instruction::GetVariable(key) => self.exec_get_variable(key),
            Instruction::BindArgs(names) => self.exec_bind_args(names),
            Instruction::ConsoleRead => self.exec_console_read(),
            Instruction::ConsoleWrite { newline } => self.exec_console_write(*newline),
            Instruction::Terminate => Ok(MachineChange::jump(0)),
            Instruction::Label(_) => Ok(MachineChange::advance()),
        }
    }

    // ---- Helpers ----

    fn top_frame(&self) -> Result<&StackFrame, RuntimeError> {
        self.state.stack.top().ok_or(RuntimeError::NoFrame { at: self.state.ip })
    }

    /// The top `n` operands of the top frame, without removing them.
    fn peek_operands(&self, n: usize) -> Result<&[Value], RuntimeError> {
        let frame = self.top_frame()?;
        frame.peek(n).ok_or(RuntimeError::OperandUnderflow {
            at: self.state.ip,
            needed: n,
            available: frame.operands.len(),
        })
    }

    fn peek_top(&self) -> Result<Value, RuntimeError> {
        Ok(self.peek_operands(1)?[0].clone())
    }

    fn index_of(&self, label: &Label) -> Result<usize, RuntimeError> {
        self.labels.get(label).ok_or_else(|| RuntimeError::UnresolvedLabel {
            at: self.state.ip,
            label: label.clone(),
        })
    }

    fn delta_to(&self, label: &Label) -> Result<isize, RuntimeError> {
        let target = self.index_of(label)?;
        Ok(offset(self.state.ip, target))
    }

    // ---- Operand stack ----

    fn exec_push_value(&self, value: &Value) -> Result<MachineChange, RuntimeError> {
        self.top_frame()?;
        Ok(MachineChange {
            stack_pushed: vec![value.clone()],
            ..MachineChange::advance()
        })
    }

    fn exec_pop_value(&self) -> Result<MachineChange, RuntimeError> {
        Ok(MachineChange {
            stack_popped: vec![self.peek_top()?],
            ..MachineChange::advance()
        })
    }

    fn exec_duplicate_top(&self) -> Result<MachineChange, RuntimeError> {
        Ok(MachineChange {
            stack_pushed: vec![self.peek_top()?],
            ..MachineChange::advance()
        })
    }

    fn exec_call_builtin(&self, builtin: Builtin) -> Result<MachineChange, RuntimeError> {
        let operands = self.peek_operands(builtin.arity())?;
        let result = builtin
            .apply(operands)
            .map_err(|source| RuntimeError::Builtin {
                at: self.state.ip,
                source,
            })?;
        Ok(MachineChange {
            stack_popped: operands.to_vec(),
            stack_pushed: vec![result],
            ..MachineChange::advance()
        })
    }

    // ---- Control flow ----

    fn exec_if_goto(&self, label: &Label) -> Result<MachineChange, RuntimeError> {
        let condition = self.peek_top()?;
        let ip_delta = if condition.is_truthy() {
            self.delta_to(label)?
        } else {
            1
        };
        Ok(MachineChange {
            stack_popped: vec![condition],
            ..MachineChange::jump(ip_delta)
        })
    }

    fn exec_method_call(
        &self,
        target: &Label,
        arity: usize,
    ) -> Result<MachineChange, RuntimeError> {
        let ip_delta = self.delta_to(target)?;
        let args = self.peek_operands(arity)?.to_vec();
        let caller = self.top_frame()?;
        let caller_index = self.state.stack.depth() - 1;
        Ok(MachineChange {
            stack_popped: args.clone(),
            frame_edits: vec![FrameEdit::return_address(
                caller_index,
                caller.return_address,
                Some(self.state.ip),
            )],
            frames_pushed: vec![StackFrame::with_args(args)],
            ..MachineChange::jump(ip_delta)
        })
    }

    fn exec_return(&self, has_value: bool) -> Result<MachineChange, RuntimeError> {
        let at = self.state.ip;
        let returning = self.top_frame()?.clone();
        let value = if has_value {
            Some(self.peek_top()?)
        } else {
            None
        };

        let depth = self.state.stack.depth();
        let caller = depth
            .checked_sub(2)
            .and_then(|index| self.state.stack.get(index));
        let (target, stack_pushed): (usize, Vec<Value>) = match caller {
            Some(caller) => {
                let call_site = caller
                    .return_address
                    .ok_or(RuntimeError::MissingReturnAddress { at })?;
                (call_site + 1, value.into_iter().collect())
            }
            // Returning from the outermost frame ends the program; the
            // value has no frame to land in.
            None => {
                let terminate = self
                    .labels
                    .global(TERMINATE_LABEL)
                    .ok_or(RuntimeError::NoTerminateLabel { at })?;
                (terminate, Vec::new())
            }
        };

        Ok(MachineChange {
            frames_popped: vec![returning],
            stack_pushed,
            ..MachineChange::jump(offset(at, target))
        })
    }

    // ---- Variables ----

    fn exec_set_variable(&self, key: &str) -> Result<MachineChange, RuntimeError> {
        let value = self.peek_top()?;
        let stack = &self.state.stack;
        let mut change = MachineChange {
            stack_popped: vec![value.clone()],
            ..MachineChange::advance()
        };

        if let Some(holder) = stack.holder_of(key) {
            let before = stack.frames()[holder].env.value_of(key);
            change.frame_edits.push(FrameEdit::variable(holder, key, before, value));
        } else if self.state.globals.contains(key) {
            change.global_edits.push(EnvEdit {
                key: key.to_string(),
                before: self.state.globals.value_of(key),
                after: value,
            });
        } else {
            // Unbound names are created in the executing frame.
            let top = stack.depth() - 1;
            change
                .frame_edits
                .push(FrameEdit::variable(top, key, Value::Undefined, value));
        }
        Ok(change)
    }

    fn exec_get_variable(&self, key: &str) -> Result<MachineChange, RuntimeError> {
        self.top_frame()?;
        let value = self.lookup(key);
        Ok(MachineChange {
            stack_pushed: vec![value],
            ..MachineChange::advance()
        })
    }

    fn exec_bind_args(&self, names: &[String]) -> Result<MachineChange, RuntimeError> {
        let frame = self.top_frame()?;
        let index = self.state.stack.depth() - 1;
        let mut edits: Vec<FrameEdit> = Vec::with_capacity(names.len());

        for (position, name) in names.iter().enumerate() {
            // A repeated name sees the value bound earlier in this same step.
            let before = edits
                .iter()
                .rev()
                .find_map(|edit| match &edit.field {
                    FrameField::Variable { key, after, .. } if key == name => {
                        Some(after.clone())
                    }
                    _ => None,
                })
                .unwrap_or_else(|| frame.env.value_of(name));
            let after = frame.args.get(position).cloned().unwrap_or_default();
            edits.push(FrameEdit::variable(index, name.as_str(), before, after));
        }

        Ok(MachineChange {
            frame_edits: edits,
            ..MachineChange::advance()
        })
    }

    // ---- Console ----

    fn exec_console_read(&self) -> Result<MachineChange, RuntimeError> {
        self.top_frame()?;
        let line = self
            .state
            .console
            .next_input()
            .ok_or(RuntimeError::InputExhausted { at: self.state.ip })?;
        Ok(MachineChange {
            stack_pushed: vec![Value::Text(line.to_string())],
            input_consumed: Some(line.to_string()),
            ..MachineChange::advance()
        })
    }

    fn exec_console_write(&self, newline: bool) -> Result<MachineChange, RuntimeError> {
        let value = self.peek_top()?;
        let mut appended = value.to_string();
        if newline {
            appended.push('\n');
        }
        Ok(MachineChange {
            stack_popped: vec![value],
            console: Some(ConsoleChange {
                appended,
                removed: String::new(),
            }),
            ..MachineChange::advance()
        })
    }
}

/// Signed distance from `from` to `to`.
fn offset(from: usize, to: usize) -> isize {
    to as isize - from as isize
}
