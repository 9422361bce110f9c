//! retrace common types.
//!
//! This crate provides the foundational data structures shared by the
//! machine, the language front end and the assembler:
//!
//! - [`Value`]: runtime values and their truthiness
//! - [`Builtin`]: primitive functions called by `CallBuiltin`
//! - [`Label`] / [`NodeId`]: symbolic jump targets
//! - [`Instruction`]: the instruction set
//! - [`Program`]: an unresolved instruction sequence with label declarations
//! - [`BuiltinError`]: errors from applying a builtin

pub mod builtin;
pub mod error;
pub mod instruction;
pub mod label;
pub mod program;
pub mod value;

// Re-export commonly used types at the crate root.
pub use builtin::Builtin;
pub use error::BuiltinError;
pub use instruction::Instruction;
pub use label::{Label, NodeId, TERMINATE_LABEL};
pub use program::{NodeRange, Program};
pub use value::Value;
