//! A small expression language compiled onto the retrace VM.
//!
//! - [`Node`]: the syntax tree, a closed tagged variant
//! - `codegen`: [`retrace_vm::Codegen`] for `Node`
//! - [`stdlib`]: `print`, `write` and `input` routines
//!
//! # Usage
//!
//! ```
//! use retrace_common::Value;
//! use retrace_lang::{compile, BinaryOp, Node};
//!
//! // 2 + 3 * 4
//! let expr = Node::binary(
//!     BinaryOp::Add,
//!     Node::number(2.0),
//!     Node::binary(BinaryOp::Mul, Node::number(3.0), Node::number(4.0)),
//! );
//! let mut machine = compile(&Node::program(vec![], vec![expr])).unwrap();
//! machine.run().unwrap();
//! assert_eq!(machine.stack().top().unwrap().operands, vec![Value::Number(14.0)]);
//! ```

pub mod ast;
mod codegen;
pub mod stdlib;

pub use ast::{BinaryOp, Node, UnaryOp};

use retrace_vm::{BuildError, Machine};
use tracing::debug;

/// Compile `root` together with the standard library into a ready machine.
pub fn compile(root: &Node) -> Result<Machine, BuildError> {
    let machine = Machine::from_ast(root, stdlib::standard_library)?;
    debug!(
        target: "retrace::lang",
        root = root.kind(),
        instructions = machine.instructions().len(),
        "compiled"
    );
    Ok(machine)
}
