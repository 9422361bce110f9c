//! retrace virtual machine: reversible execution of instruction sequences.
//!
//! The VM is a stack-of-frames machine with:
//! - A frame stack, each frame owning its operand stack, bindings,
//!   arguments and return address
//! - A global environment for program-wide bindings
//! - A console text buffer and an input queue
//! - A history of [`MachineChange`]s, one per executed instruction
//!
//! Instructions never mutate the machine. Each one describes its effect as
//! a [`MachineChange`]; the driver applies it and records it. Stepping
//! backward applies the recorded change's exact inverse, so any prefix of
//! an execution can be undone without re-running from the start.
//!
//! # Usage
//!
//! ```
//! use retrace_common::{Builtin, Instruction, Program, Value};
//! use retrace_vm::Machine;
//!
//! let program = Program::new(vec![
//!     Instruction::PushStackFrame,
//!     Instruction::PushValue(Value::Number(2.0)),
//!     Instruction::PushValue(Value::Number(3.0)),
//!     Instruction::CallBuiltin(Builtin::Add),
//!     Instruction::Terminate,
//! ]);
//!
//! let mut machine = Machine::from_program(program).unwrap();
//! machine.run().unwrap();
//! assert_eq!(machine.stack().top().unwrap().operands, vec![Value::Number(5.0)]);
//!
//! machine.step_backward().unwrap();
//! assert_eq!(machine.current_instruction_pointer(), 3);
//! ```

pub mod change;
pub mod codegen;
pub mod error;
mod execute;
pub mod frame;
pub mod labels;
pub mod machine;
pub mod state;

pub use change::{ConsoleChange, EnvEdit, FrameEdit, FrameField, MachineChange};
pub use codegen::{Codegen, Emitter};
pub use error::{BuildError, CodegenError, ConfigError, RuntimeError};
pub use frame::{Environment, Stack, StackFrame};
pub use labels::LabelTable;
pub use machine::{Machine, Status};
pub use state::{Console, State};
