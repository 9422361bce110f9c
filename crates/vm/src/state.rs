//! Mutable machine state and the application of changes to it.

use std::collections::{HashMap, VecDeque};

use retrace_common::Value;

use crate::change::{FrameField, MachineChange};
use crate::error::RuntimeError;
use crate::frame::{Environment, Stack};

/// Console output text and queued input lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Console {
    text: String,
    input: VecDeque<String>,
}

impl Console {
    /// Everything written so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Input lines not yet read, next line first.
    pub fn pending_input(&self) -> impl Iterator<Item = &str> {
        self.input.iter().map(String::as_str)
    }

    /// The line the next `ConsoleRead` will take.
    pub fn next_input(&self) -> Option<&str> {
        self.input.front().map(String::as_str)
    }

    pub(crate) fn queue_input(&mut self, line: String) {
        self.input.push_back(line);
    }
}

/// Everything a step can change. Two states compare equal when their
/// pointer, frames, globals and console all match by value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct State {
    /// Index of the next instruction to execute.
    pub ip: usize,
    /// The frame stack.
    pub stack: Stack,
    /// Program-wide bindings.
    pub globals: Environment,
    /// Console text and pending input.
    pub console: Console,
}

impl State {
    /// Verify that `change` fits this state without touching it.
    pub(crate) fn check(&self, change: &MachineChange) -> Result<(), RuntimeError> {
        let corrupt = |reason| RuntimeError::CorruptChange {
            at: self.ip,
            reason,
        };

        if !change.stack_popped.is_empty() && !change.frames_popped.is_empty() {
            return Err(corrupt("change pops operands and frames together"));
        }

        if !change.stack_popped.is_empty() {
            let top = self
                .stack
                .top()
                .ok_or_else(|| corrupt("no frame to pop operands from"))?;
            if top.peek(change.stack_popped.len()) != Some(&change.stack_popped[..]) {
                return Err(corrupt("popped operands do not match the top frame"));
            }
        }

        let depth = self.stack.depth();
        let survivors = depth
            .checked_sub(change.frames_popped.len())
            .ok_or_else(|| corrupt("not enough frames to pop"))?;
        if self.stack.frames()[survivors..] != change.frames_popped[..] {
            return Err(corrupt("popped frames do not match the stack"));
        }

        let mut pending_vars: HashMap<(usize, &str), &Value> = HashMap::new();
        let mut pending_returns: HashMap<usize, Option<usize>> = HashMap::new();
        for edit in &change.frame_edits {
            if edit.frame >= survivors {
                return Err(corrupt("frame edit addresses a frame that does not survive"));
            }
            let frame = &self.stack.frames()[edit.frame];
            match &edit.field {
                FrameField::Variable { key, before, after } => {
                    let slot = (edit.frame, key.as_str());
                    let current = match pending_vars.get(&slot) {
                        Some(value) => (*value).clone(),
                        None => frame.env.value_of(key),
                    };
                    if current != *before {
                        return Err(corrupt("frame variable does not hold the expected value"));
                    }
                    pending_vars.insert(slot, after);
                }
                FrameField::ReturnAddress { before, after } => {
                    let current = pending_returns
                        .get(&edit.frame)
                        .copied()
                        .unwrap_or(frame.return_address);
                    if current != *before {
                        return Err(corrupt("return address does not hold the expected value"));
                    }
                    pending_returns.insert(edit.frame, *after);
                }
            }
        }

        let mut pending_globals: HashMap<&str, &Value> = HashMap::new();
        for edit in &change.global_edits {
            let current = match pending_globals.get(edit.key.as_str()) {
                Some(value) => (*value).clone(),
                None => self.globals.value_of(&edit.key),
            };
            if current != edit.before {
                return Err(corrupt("global does not hold the expected value"));
            }
            pending_globals.insert(&edit.key, &edit.after);
        }

        if !change.stack_pushed.is_empty() && survivors + change.frames_pushed.len() == 0 {
            return Err(corrupt("no frame to push operands onto"));
        }

        if let Some(console) = &change.console {
            if !self.console.text.ends_with(&console.removed) {
                return Err(corrupt("console text does not end with the removed text"));
            }
        }

        if let Some(consumed) = &change.input_consumed {
            let front = change
                .input_restored
                .as_deref()
                .or_else(|| self.console.next_input());
            if front != Some(consumed.as_str()) {
                return Err(corrupt("consumed input is not next in the queue"));
            }
        }

        if self.ip.checked_add_signed(change.ip_delta).is_none() {
            return Err(corrupt("instruction pointer would become negative"));
        }

        Ok(())
    }

    /// Apply a change that passed [`State::check`].
    pub(crate) fn apply(&mut self, change: &MachineChange) {
        if let Some(top) = self.stack.top_mut() {
            let keep = top.operands.len().saturating_sub(change.stack_popped.len());
            top.operands.truncate(keep);
        }

        for edit in &change.frame_edits {
            if let Some(frame) = self.stack.get_mut(edit.frame) {
                match &edit.field {
                    FrameField::Variable { key, after, .. } => {
                        frame.env.set(key, after.clone());
                    }
                    FrameField::ReturnAddress { after, .. } => frame.return_address = *after,
                }
            }
        }

        for edit in &change.global_edits {
            self.globals.set(&edit.key, edit.after.clone());
        }

        for _ in &change.frames_popped {
            self.stack.pop();
        }
        for frame in &change.frames_pushed {
            self.stack.push(frame.clone());
        }

        if let Some(top) = self.stack.top_mut() {
            top.operands.extend(change.stack_pushed.iter().cloned());
        }

        if let Some(console) = &change.console {
            let keep = self.console.text.len() - console.removed.len();
            self.console.text.truncate(keep);
            self.console.text.push_str(&console.appended);
        }

        if let Some(line) = &change.input_restored {
            self.console.input.push_front(line.clone());
        }
        if change.input_consumed.is_some() {
            self.console.input.pop_front();
        }

        self.ip = self.ip.saturating_add_signed(change.ip_delta);
    }
}
