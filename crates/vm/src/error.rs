//! Errors for the retrace VM.
//!
//! Configuration errors are raised while a machine is being built and mean
//! it never becomes steppable. Runtime errors are raised by a step and leave
//! the machine exactly as it was after the last successfully applied change.
//! Every runtime error raised by an instruction includes its index (`at`).

use retrace_common::{BuiltinError, Label, NodeId};
use thiserror::Error;

/// Errors detected while resolving labels, before any instruction runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A jump instruction names a label that was never declared.
    #[error("unresolved label '{label}' referenced at instruction {at}")]
    UnresolvedLabel { label: Label, at: usize },

    /// The same label was declared twice.
    #[error("label '{label}' declared at {first} and again at {second}")]
    DuplicateLabel {
        label: Label,
        first: usize,
        second: usize,
    },

    /// A label was declared past the end of the instruction sequence.
    #[error("label '{label}' declared at {index}, beyond {len} instructions")]
    LabelOutOfRange {
        label: Label,
        index: usize,
        len: usize,
    },
}

/// Errors that occur while stepping a machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// The instruction needs a stack frame but the stack is empty.
    #[error("no stack frame at instruction {at}")]
    NoFrame { at: usize },

    /// The top frame holds fewer operands than the instruction consumes.
    #[error("operand stack underflow at instruction {at}: needed {needed}, found {available}")]
    OperandUnderflow {
        at: usize,
        needed: usize,
        available: usize,
    },

    /// A builtin rejected its operands.
    #[error("{source} at instruction {at}")]
    Builtin { at: usize, source: BuiltinError },

    /// `Return` found a caller frame that never recorded a call site.
    #[error("caller frame has no return address at instruction {at}")]
    MissingReturnAddress { at: usize },

    /// Top-level `Return` with no terminate label registered.
    #[error("top-level return with no terminate label at instruction {at}")]
    NoTerminateLabel { at: usize },

    /// A jump target was not resolved when the machine was built.
    #[error("unresolved label '{label}' at instruction {at}")]
    UnresolvedLabel { at: usize, label: Label },

    /// `ConsoleRead` with no queued input.
    #[error("console input exhausted at instruction {at}")]
    InputExhausted { at: usize },

    /// `step_forward` called on a halted machine.
    #[error("machine is halted at instruction {at}")]
    Halted { at: usize },

    /// `step_backward` called with an empty history.
    #[error("no change to reverse")]
    NothingToReverse,

    /// A global was seeded after steps were recorded.
    #[error("cannot seed global '{key}' after {steps} recorded step(s)")]
    HistoryNotEmpty { key: String, steps: usize },

    /// A change does not fit the current machine state.
    #[error("change cannot be applied at instruction {at}: {reason}")]
    CorruptChange { at: usize, reason: &'static str },
}

/// Errors raised by a code generator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodegenError {
    /// Code generation finished with a range still open.
    #[error("range for {kind} node {node} was never closed")]
    UnclosedRange { node: NodeId, kind: &'static str },

    /// `end_range` closed a node other than the innermost open one.
    #[error("attempted to close range {found} while {expected:?} is innermost")]
    RangeMismatch {
        expected: Option<NodeId>,
        found: NodeId,
    },

    /// A call names a function that is not declared.
    #[error("call to undefined function '{name}'")]
    UndefinedFunction { name: String },

    /// A call passes the wrong number of arguments.
    #[error("function '{name}' takes {expected} argument(s), called with {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    /// Two functions share a name.
    #[error("function '{name}' is declared more than once")]
    DuplicateFunction { name: String },

    /// A construct that cannot be compiled where it appears.
    #[error("{0}")]
    Unsupported(String),
}

/// Errors from building a machine out of an AST.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// Code generation or the language initializer failed.
    #[error("code generation failed: {0}")]
    Codegen(#[from] CodegenError),

    /// Label resolution failed.
    #[error("invalid program: {0}")]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        assert_eq!(
            ConfigError::UnresolvedLabel {
                label: Label::global("loop"),
                at: 3
            }
            .to_string(),
            "unresolved label 'loop' referenced at instruction 3"
        );
        assert_eq!(
            ConfigError::DuplicateLabel {
                label: Label::local(NodeId(2), "end"),
                first: 1,
                second: 4
            }
            .to_string(),
            "label 'end#2' declared at 1 and again at 4"
        );
    }

    #[test]
    fn runtime_error_display() {
        assert_eq!(
            RuntimeError::NoFrame { at: 0 }.to_string(),
            "no stack frame at instruction 0"
        );
        assert_eq!(
            RuntimeError::OperandUnderflow {
                at: 5,
                needed: 2,
                available: 1
            }
            .to_string(),
            "operand stack underflow at instruction 5: needed 2, found 1"
        );
        assert_eq!(
            RuntimeError::Builtin {
                at: 7,
                source: BuiltinError::DivisionByZero { builtin: "div" }
            }
            .to_string(),
            "div: division by zero at instruction 7"
        );
        assert_eq!(RuntimeError::NothingToReverse.to_string(), "no change to reverse");
    }

    #[test]
    fn build_error_wraps_sources() {
        let err: BuildError = CodegenError::UndefinedFunction { name: "f".into() }.into();
        assert_eq!(
            err.to_string(),
            "code generation failed: call to undefined function 'f'"
        );
    }
}
