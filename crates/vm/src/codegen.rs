//! The code generation contract.
//!
//! Anything that can be compiled implements [`Codegen`] and writes into an
//! [`Emitter`]. The emitter is the only mutation point available to
//! generators: it appends instructions, declares labels and records the
//! instruction range each node produced.

use retrace_common::{Instruction, Label, NodeId, NodeRange, Program};

use crate::error::CodegenError;

/// A node that can emit instructions.
pub trait Codegen {
    /// Append this node's instructions to `emitter`.
    fn codegen(&self, emitter: &mut Emitter) -> Result<(), CodegenError>;
}

impl<T: Codegen + ?Sized> Codegen for Box<T> {
    fn codegen(&self, emitter: &mut Emitter) -> Result<(), CodegenError> {
        (**self).codegen(emitter)
    }
}

impl<T: Codegen> Codegen for [T] {
    fn codegen(&self, emitter: &mut Emitter) -> Result<(), CodegenError> {
        self.iter().try_for_each(|node| node.codegen(emitter))
    }
}

/// Accumulates a [`Program`] during code generation.
#[derive(Debug, Default)]
pub struct Emitter {
    program: Program,
    open: Vec<(NodeId, &'static str, usize)>,
    next_node: u32,
}

impl Emitter {
    /// Create an empty emitter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an instruction, returning its index.
    pub fn add_instruction(&mut self, instruction: Instruction) -> usize {
        self.program.push(instruction)
    }

    /// Declare a label owned by `owner` at the next instruction index.
    pub fn add_label(&mut self, owner: NodeId, name: &str) -> Label {
        let label = Label::local(owner, name);
        self.program.declare(label.clone());
        label
    }

    /// Declare a program-wide label at the next instruction index.
    pub fn add_global_label(&mut self, name: &str) -> Label {
        let label = Label::global(name);
        self.program.declare(label.clone());
        label
    }

    /// Index the next appended instruction will get.
    pub fn next_index(&self) -> usize {
        self.program.len()
    }

    /// Open a range for a new node of kind `kind`.
    pub fn begin_range(&mut self, kind: &'static str) -> NodeId {
        let node = NodeId(self.next_node);
        self.next_node += 1;
        self.open.push((node, kind, self.program.len()));
        node
    }

    /// Close the innermost open range, which must belong to `node`.
    pub fn end_range(&mut self, node: NodeId) -> Result<(), CodegenError> {
        match self.open.last() {
            Some(&(open, kind, start)) if open == node => {
                self.open.pop();
                let end = self.program.len();
                self.program.ranges.push(NodeRange {
                    node,
                    kind,
                    range: start..end,
                });
                Ok(())
            }
            other => Err(CodegenError::RangeMismatch {
                expected: other.map(|(open, _, _)| *open),
                found: node,
            }),
        }
    }

    /// Run `emit` inside a range for a new node. The range is closed even
    /// when `emit` fails; the first error wins.
    pub fn with_range<F>(&mut self, kind: &'static str, emit: F) -> Result<NodeId, CodegenError>
    where
        F: FnOnce(&mut Self, NodeId) -> Result<(), CodegenError>,
    {
        let node = self.begin_range(kind);
        let emitted = emit(self, node);
        let closed = self.end_range(node);
        emitted?;
        closed?;
        Ok(node)
    }

    /// Ranges closed so far.
    pub fn ranges(&self) -> &[NodeRange] {
        &self.program.ranges
    }

    /// Finish emission. Fails if a range is still open.
    pub fn finish(self) -> Result<Program, CodegenError> {
        if let Some(&(node, kind, _)) = self.open.last() {
            return Err(CodegenError::UnclosedRange { node, kind });
        }
        Ok(self.program)
    }
}
