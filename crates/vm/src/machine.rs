//! The machine driver: construction, stepping in both directions, and
//! read-only inspection.

use retrace_common::{Instruction, Label, NodeId, NodeRange, Program, Value};
use tracing::{debug, trace};

use crate::change::MachineChange;
use crate::codegen::{Codegen, Emitter};
use crate::error::{BuildError, CodegenError, ConfigError, RuntimeError};
use crate::frame::{Environment, Stack};
use crate::labels::LabelTable;
use crate::state::{Console, State};

/// Coarse execution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Nothing executed yet: pointer at 0 and empty history.
    Ready,
    /// The current instruction can be executed.
    Running,
    /// The pointer rests on `Terminate` or past the last instruction.
    Halted,
}

/// A reversible virtual machine over a fixed instruction sequence.
#[derive(Debug, Clone)]
pub struct Machine {
    /// Immutable once the machine is built.
    pub(crate) instructions: Vec<Instruction>,
    pub(crate) labels: LabelTable,
    pub(crate) ranges: Vec<NodeRange>,
    pub(crate) state: State,
    /// Applied changes, oldest first.
    pub(crate) history: Vec<MachineChange>,
    pub(crate) steps: usize,
}

impl Machine {
    /// Build a machine from an unresolved program.
    pub fn from_program(program: Program) -> Result<Self, ConfigError> {
        let labels = LabelTable::resolve(&program)?;
        debug!(
            target: "retrace::vm",
            instructions = program.instructions.len(),
            ranges = program.ranges.len(),
            "machine built"
        );
        Ok(Self {
            instructions: program.instructions,
            labels,
            ranges: program.ranges,
            state: State::default(),
            history: Vec::new(),
            steps: 0,
        })
    }

    /// Compile `root`, run the language initializer, then resolve labels.
    ///
    /// The initializer runs after the root's code, so it can append runtime
    /// routines (and their global labels) that the program calls.
    pub fn from_ast<N, F>(root: &N, init: F) -> Result<Self, BuildError>
    where
        N: Codegen + ?Sized,
        F: FnOnce(&mut Emitter) -> Result<(), CodegenError>,
    {
        let mut emitter = Emitter::new();
        root.codegen(&mut emitter)?;
        init(&mut emitter)?;
        let program = emitter.finish()?;
        Ok(Self::from_program(program)?)
    }

    /// Seed a global binding before the first step.
    ///
    /// Seeding is not recorded, so it is rejected once the history holds a
    /// change: a recorded global edit would no longer match the state.
    pub fn define_global(&mut self, key: &str, value: Value) -> Result<(), RuntimeError> {
        if !self.history.is_empty() {
            return Err(RuntimeError::HistoryNotEmpty {
                key: key.to_string(),
                steps: self.history.len(),
            });
        }
        self.state.globals.set(key, value);
        Ok(())
    }

    /// Queue one line of console input.
    pub fn push_input(&mut self, line: impl Into<String>) {
        self.state.console.queue_input(line.into());
    }

    // ---- Execution ----

    /// Execute the current instruction.
    ///
    /// On error nothing is applied: the machine stays as it was after the
    /// previous step.
    pub fn step_forward(&mut self) -> Result<&MachineChange, RuntimeError> {
        let at = self.state.ip;
        let instr = match self.instructions.get(at) {
            Some(instr) if !instr.is_terminate() => instr,
            _ => return Err(RuntimeError::Halted { at }),
        };

        let change = self.change_for(instr)?;
        self.state.check(&change)?;
        trace!(
            target: "retrace::vm::step",
            ip = at,
            instruction = %instr,
            ip_delta = change.ip_delta,
            "step forward"
        );
        self.state.apply(&change);
        self.history.push(change);
        self.steps += 1;
        Ok(&self.history[self.history.len() - 1])
    }

    /// Undo the most recent step, returning the change that was undone.
    pub fn step_backward(&mut self) -> Result<MachineChange, RuntimeError> {
        let change = self.history.last().ok_or(RuntimeError::NothingToReverse)?;
        let inverse = change.inverted();
        self.state.check(&inverse)?;
        trace!(
            target: "retrace::vm::step",
            ip = self.state.ip,
            ip_delta = inverse.ip_delta,
            "step backward"
        );
        self.state.apply(&inverse);
        self.steps -= 1;
        self.history.pop().ok_or(RuntimeError::NothingToReverse)
    }

    /// Step forward until halted, returning the number of steps taken.
    ///
    /// There is no iteration cap: a program that never terminates never
    /// returns. Callers that need a budget should drive `step_forward`.
    pub fn run(&mut self) -> Result<usize, RuntimeError> {
        let start = self.steps;
        while self.can_continue() {
            self.step_forward()?;
        }
        debug!(target: "retrace::vm", steps = self.steps, ip = self.state.ip, "halted");
        Ok(self.steps - start)
    }

    /// Undo every step in the history.
    pub fn rewind(&mut self) -> Result<usize, RuntimeError> {
        let mut undone = 0;
        while self.can_reverse() {
            self.step_backward()?;
            undone += 1;
        }
        Ok(undone)
    }

    /// True iff the pointer is in bounds and not resting on `Terminate`.
    pub fn can_continue(&self) -> bool {
        self.instructions
            .get(self.state.ip)
            .is_some_and(|instr| !instr.is_terminate())
    }

    /// True iff there is a step to undo.
    pub fn can_reverse(&self) -> bool {
        !self.history.is_empty()
    }

    /// Current execution status.
    pub fn status(&self) -> Status {
        if !self.can_continue() {
            Status::Halted
        } else if self.history.is_empty() && self.state.ip == 0 {
            Status::Ready
        } else {
            Status::Running
        }
    }

    // ---- Inspection ----

    /// Index of the next instruction to execute.
    pub fn current_instruction_pointer(&self) -> usize {
        self.state.ip
    }

    /// The instruction at the pointer, if in bounds.
    pub fn current_instruction(&self) -> Option<&Instruction> {
        self.instructions.get(self.state.ip)
    }

    /// Number of steps executed (forward steps minus backward steps).
    pub fn instruction_count(&self) -> usize {
        self.steps
    }

    /// The full instruction sequence.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Resolved labels.
    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    /// Each instruction with the labels resolved to its index.
    pub fn listing(&self) -> impl Iterator<Item = (usize, &Instruction, &[Label])> {
        self.instructions
            .iter()
            .enumerate()
            .map(|(index, instr)| (index, instr, self.labels.labels_at(index)))
    }

    /// Instruction ranges recorded during code generation.
    pub fn ranges(&self) -> &[NodeRange] {
        &self.ranges
    }

    /// The instruction range node `node` produced.
    pub fn range_of(&self, node: NodeId) -> Option<&NodeRange> {
        self.ranges.iter().find(|range| range.node == node)
    }

    /// The innermost recorded node whose range covers `index`.
    pub fn node_at(&self, index: usize) -> Option<&NodeRange> {
        self.ranges
            .iter()
            .filter(|r| r.range.contains(&index))
            .min_by_key(|r| r.range.len())
    }

    /// The complete mutable state.
    pub fn state(&self) -> &State {
        &self.state
    }

    /// The frame stack.
    pub fn stack(&self) -> &Stack {
        &self.state.stack
    }

    /// Program-wide bindings.
    pub fn globals(&self) -> &Environment {
        &self.state.globals
    }

    /// Console output and pending input.
    pub fn console(&self) -> &Console {
        &self.state.console
    }

    /// Console text written so far.
    pub fn console_text(&self) -> &str {
        self.state.console.text()
    }

    /// Applied changes, oldest first.
    pub fn history(&self) -> &[MachineChange] {
        &self.history
    }

    /// The value `GetVariable(key)` would push: innermost frame binding,
    /// then the global environment, else `Undefined`.
    pub fn lookup(&self, key: &str) -> Value {
        match self.state.stack.holder_of(key) {
            Some(holder) => self.state.stack.frames()[holder].env.value_of(key),
            None => self.state.globals.value_of(key),
        }
    }
}
