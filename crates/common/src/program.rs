//! Program representation: the hand-off between code generation or the
//! assembler and the machine.
//!
//! A program is an instruction sequence plus the label declarations made
//! while emitting it. Labels are still symbolic here; the machine resolves
//! them when it is built.

use std::ops::Range;

use crate::instruction::Instruction;
use crate::label::{Label, NodeId};

/// The instruction-index range a node produced during code generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRange {
    /// The node (or region) the range belongs to.
    pub node: NodeId,
    /// Short name of the node kind, e.g. `"while"`.
    pub kind: &'static str,
    /// Half-open range `[start, end)` of emitted instruction indices.
    pub range: Range<usize>,
}

/// An unresolved program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    /// The instruction stream.
    pub instructions: Vec<Instruction>,
    /// Label declarations, each bound to the index of the next instruction
    /// appended after it. Several labels may share an index.
    pub labels: Vec<(Label, usize)>,
    /// Per-node instruction ranges, for tooling.
    pub ranges: Vec<NodeRange>,
}

impl Program {
    /// Create a program with no label declarations.
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self {
            instructions,
            labels: Vec::new(),
            ranges: Vec::new(),
        }
    }

    /// Append an instruction, returning its index.
    pub fn push(&mut self, instruction: Instruction) -> usize {
        self.instructions.push(instruction);
        self.instructions.len() - 1
    }

    /// Declare `label` at the index of the next instruction to be appended.
    pub fn declare(&mut self, label: Label) -> usize {
        let at = self.instructions.len();
        self.labels.push((label, at));
        at
    }

    /// Labels declared at `index`, in declaration order.
    pub fn labels_at(&self, index: usize) -> impl Iterator<Item = &Label> {
        self.labels
            .iter()
            .filter(move |(_, at)| *at == index)
            .map(|(label, _)| label)
    }

    /// Number of instructions in the program.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns true if the program has no instructions.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}
