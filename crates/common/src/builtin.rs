//! Built-in functions invoked by `CallBuiltin`.
//!
//! Operands are passed in stack order: the first element is the deepest
//! operand, so for `a - b` the slice is `[a, b]`.

use crate::error::BuiltinError;
use crate::value::Value;

/// A primitive operation over [`Value`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    /// Numeric sum, or concatenation when either side is text.
    Add,
    /// Numeric difference.
    Sub,
    /// Numeric product.
    Mul,
    /// Numeric quotient. A zero divisor is an error.
    Div,
    /// Numeric remainder. A zero divisor is an error.
    Rem,
    /// Numeric negation.
    Neg,
    /// Logical negation of the operand's truthiness.
    Not,
    /// Value equality.
    Eq,
    /// Value inequality.
    Ne,
    /// Numeric `<`.
    Lt,
    /// Numeric `<=`.
    Le,
    /// Numeric `>`.
    Gt,
    /// Numeric `>=`.
    Ge,
}

/// Every builtin, in declaration order.
pub const ALL_BUILTINS: [Builtin; 13] = [
    Builtin::Add,
    Builtin::Sub,
    Builtin::Mul,
    Builtin::Div,
    Builtin::Rem,
    Builtin::Neg,
    Builtin::Not,
    Builtin::Eq,
    Builtin::Ne,
    Builtin::Lt,
    Builtin::Le,
    Builtin::Gt,
    Builtin::Ge,
];

impl Builtin {
    /// Number of operands consumed from the top frame's stack.
    pub fn arity(&self) -> usize {
        match self {
            Builtin::Neg | Builtin::Not => 1,
            _ => 2,
        }
    }

    /// Assembly name of this builtin.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Builtin::Add => "add",
            Builtin::Sub => "sub",
            Builtin::Mul => "mul",
            Builtin::Div => "div",
            Builtin::Rem => "rem",
            Builtin::Neg => "neg",
            Builtin::Not => "not",
            Builtin::Eq => "eq",
            Builtin::Ne => "ne",
            Builtin::Lt => "lt",
            Builtin::Le => "le",
            Builtin::Gt => "gt",
            Builtin::Ge => "ge",
        }
    }

    /// Look up a builtin by its assembly name.
    pub fn from_mnemonic(name: &str) -> Option<Builtin> {
        ALL_BUILTINS.iter().find(|b| b.mnemonic() == name).copied()
    }

    /// Apply the builtin to exactly `arity()` operands.
    pub fn apply(&self, operands: &[Value]) -> Result<Value, BuiltinError> {
        if operands.len() != self.arity() {
            return Err(BuiltinError::WrongOperandCount {
                builtin: self.mnemonic(),
                expected: self.arity(),
                found: operands.len(),
            });
        }

        match self {
            Builtin::Not => Ok(Value::Bool(!operands[0].is_truthy())),
            Builtin::Neg => Ok(Value::Number(-self.number(&operands[0])?)),
            Builtin::Eq => Ok(Value::Bool(operands[0] == operands[1])),
            Builtin::Ne => Ok(Value::Bool(operands[0] != operands[1])),
            Builtin::Add => match (&operands[0], &operands[1]) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (a @ Value::Text(_), b) | (a, b @ Value::Text(_)) => {
                    Ok(Value::Text(format!("{a}{b}")))
                }
                (a, b) => Err(self.mismatch(a, b)),
            },
            Builtin::Sub => self.arith(operands, |a, b| a - b),
            Builtin::Mul => self.arith(operands, |a, b| a * b),
            Builtin::Div => {
                let (a, b) = self.numbers(operands)?;
                if b == 0.0 {
                    return Err(BuiltinError::DivisionByZero {
                        builtin: self.mnemonic(),
                    });
                }
                Ok(Value::Number(a / b))
            }
            Builtin::Rem => {
                let (a, b) = self.numbers(operands)?;
                if b == 0.0 {
                    return Err(BuiltinError::DivisionByZero {
                        builtin: self.mnemonic(),
                    });
                }
                Ok(Value::Number(a % b))
            }
            Builtin::Lt => self.compare(operands, |a, b| a < b),
            Builtin::Le => self.compare(operands, |a, b| a <= b),
            Builtin::Gt => self.compare(operands, |a, b| a > b),
            Builtin::Ge => self.compare(operands, |a, b| a >= b),
        }
    }

    fn arith(&self, operands: &[Value], op: fn(f64, f64) -> f64) -> Result<Value, BuiltinError> {
        let (a, b) = self.numbers(operands)?;
        Ok(Value::Number(op(a, b)))
    }

    fn compare(&self, operands: &[Value], op: fn(f64, f64) -> bool) -> Result<Value, BuiltinError> {
        let (a, b) = self.numbers(operands)?;
        Ok(Value::Bool(op(a, b)))
    }

    fn numbers(&self, operands: &[Value]) -> Result<(f64, f64), BuiltinError> {
        match (&operands[0], &operands[1]) {
            (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
            (a, b) => Err(self.mismatch(a, b)),
        }
    }

    fn number(&self, operand: &Value) -> Result<f64, BuiltinError> {
        operand.as_number().ok_or(BuiltinError::TypeMismatch {
            builtin: self.mnemonic(),
            found: operand.kind(),
        })
    }

    fn mismatch(&self, a: &Value, b: &Value) -> BuiltinError {
        let found = if a.as_number().is_none() {
            a.kind()
        } else {
            b.kind()
        };
        BuiltinError::TypeMismatch {
            builtin: self.mnemonic(),
            found,
        }
    }
}
