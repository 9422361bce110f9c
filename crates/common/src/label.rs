//! Jump targets.
//!
//! Jump instructions carry a [`Label`] rather than an absolute index. The
//! machine resolves every label once, after the whole instruction sequence
//! has been emitted.

use std::fmt;

use crate::instruction::name_token;

/// Global label that top-level `Return` jumps to.
pub const TERMINATE_LABEL: &str = "$terminate";

/// Identifies an AST node or any other compiled region that owns local labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A symbolic jump target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Label {
    /// Scoped to one compiled region, e.g. the begin/end of a loop.
    Local { owner: NodeId, name: String },
    /// Addressable from anywhere in the program, e.g. a function entry.
    Global(String),
}

impl Label {
    /// Create a local label owned by `owner`.
    pub fn local(owner: NodeId, name: impl Into<String>) -> Self {
        Label::Local {
            owner,
            name: name.into(),
        }
    }

    /// Create a global label.
    pub fn global(name: impl Into<String>) -> Self {
        Label::Global(name.into())
    }

    /// The program-wide terminate sentinel.
    pub fn terminate() -> Self {
        Label::Global(TERMINATE_LABEL.to_string())
    }

    /// The label's name without its scope.
    pub fn name(&self) -> &str {
        match self {
            Label::Local { name, .. } | Label::Global(name) => name,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Local { owner, name } => write!(f, "{}{owner}", name_token(name)),
            Label::Global(name) => write!(f, "{}", name_token(name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_labels_are_scoped_by_owner() {
        assert_ne!(
            Label::local(NodeId(1), "begin"),
            Label::local(NodeId(2), "begin")
        );
        assert_eq!(
            Label::local(NodeId(1), "begin"),
            Label::local(NodeId(1), "begin")
        );
    }

    #[test]
    fn local_and_global_never_collide() {
        assert_ne!(Label::local(NodeId(0), "f"), Label::global("f"));
    }

    #[test]
    fn display() {
        assert_eq!(Label::local(NodeId(3), "end").to_string(), "end#3");
        assert_eq!(Label::global("main").to_string(), "main");
        assert_eq!(Label::terminate().name(), TERMINATE_LABEL);
    }

    #[test]
    fn display_quotes_names_that_are_not_bare_words() {
        assert_eq!(Label::global("f#1").to_string(), "\"f#1\"");
        assert_eq!(Label::local(NodeId(2), "a b").to_string(), "\"a b\"#2");
        assert_eq!(Label::local(NodeId(0), "").to_string(), "\"\"#0");
    }
}
