//! Error types for the retrace assembler.

use thiserror::Error;

/// Errors produced while assembling text into a program.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AsmError {
    /// An unrecognized instruction mnemonic was encountered.
    #[error("line {line}: unknown mnemonic '{token}'")]
    UnknownMnemonic { line: usize, token: String },

    /// `builtin` named something that is not a builtin.
    #[error("line {line}: unknown builtin '{token}'")]
    UnknownBuiltin { line: usize, token: String },

    /// An instruction did not have enough arguments.
    #[error("line {line}: {mnemonic} expects {expected} argument(s)")]
    MissingArgument {
        line: usize,
        mnemonic: &'static str,
        expected: usize,
    },

    /// A count or node id could not be parsed.
    #[error("line {line}: invalid number '{token}'")]
    InvalidNumber { line: usize, token: String },

    /// `push` operand is not a number, string, `true`, `false` or `undefined`.
    #[error("line {line}: invalid literal '{token}'")]
    InvalidLiteral { line: usize, token: String },

    /// A label is empty or has a malformed `#owner` suffix.
    #[error("line {line}: invalid label '{token}'")]
    InvalidLabel { line: usize, token: String },

    /// A string literal ran to the end of the line.
    #[error("line {line}: unterminated string literal")]
    UnterminatedString { line: usize },

    /// An unsupported `\` escape inside a string literal.
    #[error("line {line}: invalid escape '\\{escape}'")]
    InvalidEscape { line: usize, escape: char },

    /// A token appeared where it was not expected.
    #[error("line {line}: unexpected token '{token}'")]
    UnexpectedToken { line: usize, token: String },
}

impl AsmError {
    /// The 1-based line the error was found on.
    pub fn line(&self) -> usize {
        match self {
            AsmError::UnknownMnemonic { line, .. }
            | AsmError::UnknownBuiltin { line, .. }
            | AsmError::MissingArgument { line, .. }
            | AsmError::InvalidNumber { line, .. }
            | AsmError::InvalidLiteral { line, .. }
            | AsmError::InvalidLabel { line, .. }
            | AsmError::UnterminatedString { line }
            | AsmError::InvalidEscape { line, .. }
            | AsmError::UnexpectedToken { line, .. } => *line,
        }
    }
}
