//! Code generation for [`Node`].
//!
//! Every node emits inside its own range, so the machine can map any
//! instruction back to the innermost node that produced it.
//!
//! Layout of a compiled program:
//!
//! ```text
//! frame.push
//! <body>
//! $terminate:
//! halt
//! <function blocks>
//! <standard library routines, appended by the initializer>
//! ```

use std::collections::HashMap;

use retrace_common::{Builtin, Instruction, Label, NodeId, Value, TERMINATE_LABEL};
use retrace_vm::{Codegen, CodegenError, Emitter};

use crate::ast::Node;
use crate::stdlib;

impl Codegen for Node {
    fn codegen(&self, emitter: &mut Emitter) -> Result<(), CodegenError> {
        emitter.with_range(self.kind(), |e, id| self.emit(e, id))?;
        Ok(())
    }
}

impl Node {
    fn emit(&self, e: &mut Emitter, id: NodeId) -> Result<(), CodegenError> {
        match self {
            Node::Program { functions, body } => emit_program(e, functions, body),

            Node::Function { name, params, body } => {
                e.add_global_label(name);
                if !params.is_empty() {
                    e.add_instruction(Instruction::BindArgs(params.clone()));
                }
                body.codegen(e)?;
                // Falling off the end yields undefined.
                e.add_instruction(Instruction::PushValue(Value::Undefined));
                e.add_instruction(Instruction::Return { has_value: true });
                Ok(())
            }

            Node::Block(body) => body.codegen(e),

            Node::Expression(inner) => {
                inner.codegen(e)?;
                e.add_instruction(Instruction::PopValue);
                Ok(())
            }

            Node::Assign { name, value } => {
                value.codegen(e)?;
                e.add_instruction(Instruction::SetVariable(name.clone()));
                Ok(())
            }

            Node::While { condition, body } => {
                let begin = e.add_label(id, "begin");
                let end = Label::local(id, "end");
                condition.codegen(e)?;
                e.add_instruction(Instruction::CallBuiltin(Builtin::Not));
                e.add_instruction(Instruction::IfGoto(end));
                body.codegen(e)?;
                e.add_instruction(Instruction::Goto(begin));
                e.add_label(id, "end");
                Ok(())
            }

            Node::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let otherwise = Label::local(id, "else");
                let end = Label::local(id, "end");
                condition.codegen(e)?;
                e.add_instruction(Instruction::CallBuiltin(Builtin::Not));
                e.add_instruction(Instruction::IfGoto(otherwise));
                then_branch.codegen(e)?;
                e.add_instruction(Instruction::Goto(end));
                e.add_label(id, "else");
                else_branch.codegen(e)?;
                e.add_label(id, "end");
                Ok(())
            }

            Node::Return(value) => {
                match value {
                    Some(value) => value.codegen(e)?,
                    None => {
                        e.add_instruction(Instruction::PushValue(Value::Undefined));
                    }
                }
                e.add_instruction(Instruction::Return { has_value: true });
                Ok(())
            }

            Node::Number(n) => push(e, Value::Number(*n)),
            Node::Text(s) => push(e, Value::Text(s.clone())),
            Node::Bool(b) => push(e, Value::Bool(*b)),

            Node::Variable(name) => {
                e.add_instruction(Instruction::GetVariable(name.clone()));
                Ok(())
            }

            Node::Binary { op, lhs, rhs } => {
                lhs.codegen(e)?;
                rhs.codegen(e)?;
                e.add_instruction(Instruction::CallBuiltin(op.builtin()));
                Ok(())
            }

            Node::Unary { op, operand } => {
                operand.codegen(e)?;
                e.add_instruction(Instruction::CallBuiltin(op.builtin()));
                Ok(())
            }

            Node::Call { name, args } => {
                args.codegen(e)?;
                e.add_instruction(Instruction::MethodCall {
                    target: Label::global(name.as_str()),
                    arity: args.len(),
                });
                Ok(())
            }
        }
    }
}

fn push(e: &mut Emitter, value: Value) -> Result<(), CodegenError> {
    e.add_instruction(Instruction::PushValue(value));
    Ok(())
}

fn emit_program(e: &mut Emitter, functions: &[Node], body: &[Node]) -> Result<(), CodegenError> {
    let signatures = signatures(functions)?;
    let nested = functions.iter().flat_map(Node::children);
    for node in nested.chain(body) {
        check_calls(node, &signatures)?;
    }

    e.add_instruction(Instruction::PushStackFrame);
    body.codegen(e)?;
    e.add_global_label(TERMINATE_LABEL);
    e.add_instruction(Instruction::Terminate);
    functions.codegen(e)
}

/// Arity of every callable name: the program's functions, then the
/// standard routines.
fn signatures(functions: &[Node]) -> Result<HashMap<&str, usize>, CodegenError> {
    let mut signatures = HashMap::new();
    for function in functions {
        let Node::Function { name, params, .. } = function else {
            return Err(CodegenError::Unsupported(format!(
                "{} node in a program's function list",
                function.kind()
            )));
        };
        if stdlib::arity_of(name).is_some()
            || signatures.insert(name.as_str(), params.len()).is_some()
        {
            return Err(CodegenError::DuplicateFunction { name: name.clone() });
        }
    }
    for (name, arity) in stdlib::ROUTINES {
        signatures.insert(name, arity);
    }
    Ok(signatures)
}

/// Reject calls to unknown names or with the wrong argument count, and
/// program or function nodes below the top level.
fn check_calls(node: &Node, signatures: &HashMap<&str, usize>) -> Result<(), CodegenError> {
    match node {
        Node::Program { .. } | Node::Function { .. } => {
            return Err(CodegenError::Unsupported(format!(
                "nested {} node",
                node.kind()
            )));
        }
        Node::Call { name, args } => {
            let expected = signatures
                .get(name.as_str())
                .copied()
                .ok_or_else(|| CodegenError::UndefinedFunction { name: name.clone() })?;
            if expected != args.len() {
                return Err(CodegenError::ArityMismatch {
                    name: name.clone(),
                    expected,
                    found: args.len(),
                });
            }
        }
        _ => {}
    }
    node.children()
        .into_iter()
        .try_for_each(|child| check_calls(child, signatures))
}
