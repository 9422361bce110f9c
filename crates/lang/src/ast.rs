//! The language's abstract syntax tree.
//!
//! A closed tagged variant: every node kind is a [`Node`] variant and its
//! code generation lives in a `match` in `codegen.rs`.

use retrace_common::Builtin;

/// Binary operators. Each maps onto exactly one builtin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    /// The builtin that implements this operator.
    pub fn builtin(self) -> Builtin {
        match self {
            BinaryOp::Add => Builtin::Add,
            BinaryOp::Sub => Builtin::Sub,
            BinaryOp::Mul => Builtin::Mul,
            BinaryOp::Div => Builtin::Div,
            BinaryOp::Rem => Builtin::Rem,
            BinaryOp::Eq => Builtin::Eq,
            BinaryOp::Ne => Builtin::Ne,
            BinaryOp::Lt => Builtin::Lt,
            BinaryOp::Le => Builtin::Le,
            BinaryOp::Gt => Builtin::Gt,
            BinaryOp::Ge => Builtin::Ge,
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    /// The builtin that implements this operator.
    pub fn builtin(self) -> Builtin {
        match self {
            UnaryOp::Neg => Builtin::Neg,
            UnaryOp::Not => Builtin::Not,
        }
    }
}

/// A syntax tree node.
///
/// Expressions leave exactly one value on the operand stack. Statements
/// leave the stack as they found it, except that a bare expression in a
/// program body keeps its value, so a program can be a single expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A whole compilation unit. `functions` must all be [`Node::Function`].
    Program { functions: Vec<Node>, body: Vec<Node> },
    /// A named routine. Called with `Node::Call`; always yields a value.
    Function {
        name: String,
        params: Vec<String>,
        body: Vec<Node>,
    },
    /// A sequence of statements.
    Block(Vec<Node>),
    /// Evaluate an expression for its effects and discard the value.
    Expression(Box<Node>),
    Assign { name: String, value: Box<Node> },
    While { condition: Box<Node>, body: Vec<Node> },
    If {
        condition: Box<Node>,
        then_branch: Vec<Node>,
        else_branch: Vec<Node>,
    },
    /// Return from the enclosing function; at top level, end the program.
    Return(Option<Box<Node>>),
    Number(f64),
    Text(String),
    Bool(bool),
    Variable(String),
    Binary {
        op: BinaryOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    Unary { op: UnaryOp, operand: Box<Node> },
    Call { name: String, args: Vec<Node> },
}

impl Node {
    pub fn program(functions: Vec<Node>, body: Vec<Node>) -> Self {
        Node::Program { functions, body }
    }

    pub fn function(name: &str, params: &[&str], body: Vec<Node>) -> Self {
        Node::Function {
            name: name.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
            body,
        }
    }

    pub fn expression(node: Node) -> Self {
        Node::Expression(Box::new(node))
    }

    pub fn assign(name: &str, value: Node) -> Self {
        Node::Assign {
            name: name.to_string(),
            value: Box::new(value),
        }
    }

    pub fn while_loop(condition: Node, body: Vec<Node>) -> Self {
        Node::While {
            condition: Box::new(condition),
            body,
        }
    }

    pub fn if_else(condition: Node, then_branch: Vec<Node>, else_branch: Vec<Node>) -> Self {
        Node::If {
            condition: Box::new(condition),
            then_branch,
            else_branch,
        }
    }

    pub fn ret(value: Option<Node>) -> Self {
        Node::Return(value.map(Box::new))
    }

    pub fn number(n: f64) -> Self {
        Node::Number(n)
    }

    pub fn text(s: &str) -> Self {
        Node::Text(s.to_string())
    }

    pub fn variable(name: &str) -> Self {
        Node::Variable(name.to_string())
    }

    pub fn binary(op: BinaryOp, lhs: Node, rhs: Node) -> Self {
        Node::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn unary(op: UnaryOp, operand: Node) -> Self {
        Node::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn call(name: &str, args: Vec<Node>) -> Self {
        Node::Call {
            name: name.to_string(),
            args,
        }
    }

    /// Short name recorded with the node's instruction range.
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Program { .. } => "program",
            Node::Function { .. } => "function",
            Node::Block(_) => "block",
            Node::Expression(_) => "expression",
            Node::Assign { .. } => "assign",
            Node::While { .. } => "while",
            Node::If { .. } => "if",
            Node::Return(_) => "return",
            Node::Number(_) => "number",
            Node::Text(_) => "text",
            Node::Bool(_) => "bool",
            Node::Variable(_) => "variable",
            Node::Binary { .. } => "binary",
            Node::Unary { .. } => "unary",
            Node::Call { .. } => "call",
        }
    }

    /// Direct children, in source order.
    pub fn children(&self) -> Vec<&Node> {
        match self {
            Node::Program { functions, body } => functions.iter().chain(body).collect(),
            Node::Function { body, .. } | Node::Block(body) => body.iter().collect(),
            Node::Expression(inner) => vec![&**inner],
            Node::Assign { value, .. } => vec![&**value],
            Node::While { condition, body } => {
                std::iter::once(&**condition).chain(body).collect()
            }
            Node::If {
                condition,
                then_branch,
                else_branch,
            } => std::iter::once(&**condition)
                .chain(then_branch)
                .chain(else_branch)
                .collect(),
            Node::Return(value) => value.iter().map(|v| &**v).collect(),
            Node::Binary { lhs, rhs, .. } => vec![&**lhs, &**rhs],
            Node::Unary { operand, .. } => vec![&**operand],
            Node::Call { args, .. } => args.iter().collect(),
            Node::Number(_) | Node::Text(_) | Node::Bool(_) | Node::Variable(_) => Vec::new(),
        }
    }
}
