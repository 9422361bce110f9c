//! Errors raised by built-in functions.

use thiserror::Error;

/// Errors that occur while applying a [`Builtin`](crate::Builtin).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuiltinError {
    /// An operand had a kind the builtin cannot operate on.
    #[error("{builtin}: unsupported operand of kind {found}")]
    TypeMismatch {
        builtin: &'static str,
        found: &'static str,
    },

    /// Division or remainder with a zero divisor.
    #[error("{builtin}: division by zero")]
    DivisionByZero { builtin: &'static str },

    /// The caller supplied the wrong number of operands.
    #[error("{builtin} expects {expected} operand(s), got {found}")]
    WrongOperandCount {
        builtin: &'static str,
        expected: usize,
        found: usize,
    },
}
