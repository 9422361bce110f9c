//! Label resolution.
//!
//! Runs once, after code generation and the language initializer have
//! appended everything. Labels come from two places: declarations recorded
//! in the [`Program`], and `Instruction::Label` markers, which declare their
//! label at their own index. Every jump target must resolve, or the program
//! is rejected before it runs.

use std::collections::{BTreeMap, HashMap};

use retrace_common::{Instruction, Label, NodeId, Program};
use tracing::debug;

use crate::error::ConfigError;

/// Resolved label positions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelTable {
    local: HashMap<(NodeId, String), usize>,
    global: HashMap<String, usize>,
    by_index: BTreeMap<usize, Vec<Label>>,
}

impl LabelTable {
    /// Resolve every label declared in `program` and check every jump.
    pub fn resolve(program: &Program) -> Result<Self, ConfigError> {
        let len = program.instructions.len();
        let markers = program
            .instructions
            .iter()
            .enumerate()
            .filter_map(|(at, instr)| match instr {
                Instruction::Label(label) => Some((label, at)),
                _ => None,
            });
        let declared = program.labels.iter().map(|(label, at)| (label, *at));

        let mut table = Self::default();
        for (label, index) in declared.chain(markers) {
            if index > len {
                return Err(ConfigError::LabelOutOfRange {
                    label: label.clone(),
                    index,
                    len,
                });
            }
            table.declare(label, index)?;
        }

        for (at, instr) in program.instructions.iter().enumerate() {
            if let Some(label) = instr.jump_target() {
                if table.get(label).is_none() {
                    return Err(ConfigError::UnresolvedLabel {
                        label: label.clone(),
                        at,
                    });
                }
            }
        }

        debug!(
            target: "retrace::vm::resolve",
            local = table.local.len(),
            global = table.global.len(),
            instructions = len,
            "labels resolved"
        );
        Ok(table)
    }

    fn declare(&mut self, label: &Label, index: usize) -> Result<(), ConfigError> {
        let previous = match label {
            Label::Local { owner, name } => self.local.insert((*owner, name.clone()), index),
            Label::Global(name) => self.global.insert(name.clone(), index),
        };
        if let Some(first) = previous {
            return Err(ConfigError::DuplicateLabel {
                label: label.clone(),
                first,
                second: index,
            });
        }
        self.by_index.entry(index).or_default().push(label.clone());
        Ok(())
    }

    /// Absolute instruction index of `label`.
    pub fn get(&self, label: &Label) -> Option<usize> {
        match label {
            Label::Local { owner, name } => self.local.get(&(*owner, name.clone())).copied(),
            Label::Global(name) => self.global.get(name).copied(),
        }
    }

    /// Absolute instruction index of the global label `name`.
    pub fn global(&self, name: &str) -> Option<usize> {
        self.global.get(name).copied()
    }

    /// Labels resolved to `index`, in declaration order.
    pub fn labels_at(&self, index: usize) -> &[Label] {
        self.by_index.get(&index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All resolved labels with their indices, ordered by index.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Label)> {
        self.by_index
            .iter()
            .flat_map(|(index, labels)| labels.iter().map(move |label| (*index, label)))
    }

    /// Number of resolved labels.
    pub fn len(&self) -> usize {
        self.local.len() + self.global.len()
    }

    /// Returns true if no labels were declared.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
