//! Parser for retrace assembly tokens -> label declarations and instructions.
//!
//! Dispatches on the mnemonic to the instruction's argument pattern.

use crate::error::AsmError;
use crate::lexer::Token;
use retrace_common::instruction::quoted;
use retrace_common::{Builtin, Instruction, Label, NodeId, Value};

/// Result of parsing a single assembly line.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct ParsedLine {
    /// Labels declared on this line, bound to the next instruction.
    pub labels: Vec<Label>,
    pub instruction: Option<Instruction>,
}

/// Parse the tokens of a single line.
///
/// Any number of label declarations may precede an optional instruction.
pub(crate) fn parse_line(tokens: &[Token], line_num: usize) -> Result<ParsedLine, AsmError> {
    let mut parsed = ParsedLine::default();
    let mut rest = tokens;

    while let Some((Token::LabelDecl(label), tail)) = rest.split_first() {
        parsed.labels.push(parse_label(label, line_num)?);
        rest = tail;
    }

    let Some((head, args)) = rest.split_first() else {
        return Ok(parsed);
    };
    let mnemonic = match head {
        Token::Word(w) => w.to_ascii_lowercase(),
        other => return Err(unexpected(other, line_num)),
    };

    let instruction = match mnemonic.as_str() {
        // No arguments
        "pop" => no_args(Instruction::PopValue, args, line_num)?,
        "dup" => no_args(Instruction::DuplicateTop, args, line_num)?,
        "frame.push" => no_args(Instruction::PushStackFrame, args, line_num)?,
        "frame.pop" => no_args(Instruction::PopStackFrame, args, line_num)?,
        "ret" => no_args(Instruction::Return { has_value: false }, args, line_num)?,
        "ret.value" => no_args(Instruction::Return { has_value: true }, args, line_num)?,
        "read" => no_args(Instruction::ConsoleRead, args, line_num)?,
        "write" => no_args(Instruction::ConsoleWrite { newline: false }, args, line_num)?,
        "writeln" => no_args(Instruction::ConsoleWrite { newline: true }, args, line_num)?,
        "halt" => no_args(Instruction::Terminate, args, line_num)?,

        // One literal
        "push" => {
            let token = expect_arg(args, 0, line_num, "push", 1)?;
            expect_end(&args[1..], line_num)?;
            Instruction::PushValue(parse_literal(token, line_num)?)
        }

        // One builtin name
        "builtin" => {
            let name = expect_word(args, 0, line_num, "builtin", 1)?;
            expect_end(&args[1..], line_num)?;
            let builtin = Builtin::from_mnemonic(name).ok_or_else(|| AsmError::UnknownBuiltin {
                line: line_num,
                token: name.to_string(),
            })?;
            Instruction::CallBuiltin(builtin)
        }

        // One label
        "goto" => Instruction::Goto(label_arg(args, line_num, "goto")?),
        "ifgoto" => Instruction::IfGoto(label_arg(args, line_num, "ifgoto")?),
        "mark" => Instruction::Label(label_arg(args, line_num, "mark")?),

        // Label + arity
        "call" => {
            let target = parse_label(expect_arg(args, 0, line_num, "call", 2)?, line_num)?;
            let arity = expect_word(args, 1, line_num, "call", 2)?;
            let arity = arity.parse().map_err(|_| AsmError::InvalidNumber {
                line: line_num,
                token: arity.to_string(),
            })?;
            expect_end(&args[2..], line_num)?;
            Instruction::MethodCall { target, arity }
        }

        // One name
        "set" => Instruction::SetVariable(name_arg(args, line_num, "set")?),
        "get" => Instruction::GetVariable(name_arg(args, line_num, "get")?),

        // Any number of names
        "bind" => {
            let names = args
                .iter()
                .map(|token| parse_name(token, line_num))
                .collect::<Result<Vec<_>, _>>()?;
            Instruction::BindArgs(names)
        }

        _ => {
            return Err(AsmError::UnknownMnemonic {
                line: line_num,
                token: mnemonic,
            })
        }
    };

    parsed.instruction = Some(instruction);
    Ok(parsed)
}

/// Parse a label reference or declaration.
///
/// Bare forms are `name` (global) and `name#N` (local, owned by node N).
/// Names that are not bare words are quoted: `"name"` and `"name"#N`.
pub(crate) fn parse_label(token: &Token, line_num: usize) -> Result<Label, AsmError> {
    let invalid = || AsmError::InvalidLabel {
        line: line_num,
        token: render(token),
    };
    match token {
        Token::Word(word) => {
            let label = match word.rsplit_once('#') {
                Some((name, owner)) => {
                    Label::local(NodeId(owner.parse().map_err(|_| invalid())?), name)
                }
                None => Label::global(word.as_str()),
            };
            if label.name().is_empty() {
                return Err(invalid());
            }
            Ok(label)
        }
        Token::Text(name) => Ok(Label::global(name.as_str())),
        Token::Scoped { name, owner } => {
            let owner = owner.parse().map_err(|_| invalid())?;
            Ok(Label::local(NodeId(owner), name.as_str()))
        }
        Token::LabelDecl(_) => Err(unexpected(token, line_num)),
    }
}

/// A variable name, bare or quoted.
fn parse_name(token: &Token, line_num: usize) -> Result<String, AsmError> {
    match token {
        Token::Word(name) | Token::Text(name) => Ok(name.clone()),
        other => Err(unexpected(other, line_num)),
    }
}

/// Parse a `push` operand.
fn parse_literal(token: &Token, line_num: usize) -> Result<Value, AsmError> {
    let word = match token {
        Token::Text(s) => return Ok(Value::Text(s.clone())),
        Token::Word(w) => w,
        other => return Err(unexpected(other, line_num)),
    };
    match word.as_str() {
        "true" => Ok(Value::Bool(true)),
        "false" => Ok(Value::Bool(false)),
        "undefined" => Ok(Value::Undefined),
        _ => word
            .parse::<f64>()
            .map(Value::Number)
            .map_err(|_| AsmError::InvalidLiteral {
                line: line_num,
                token: word.clone(),
            }),
    }
}

fn label_arg(args: &[Token], line_num: usize, mnemonic: &'static str) -> Result<Label, AsmError> {
    let label = parse_label(expect_arg(args, 0, line_num, mnemonic, 1)?, line_num)?;
    expect_end(&args[1..], line_num)?;
    Ok(label)
}

fn name_arg(args: &[Token], line_num: usize, mnemonic: &'static str) -> Result<String, AsmError> {
    let name = parse_name(expect_arg(args, 0, line_num, mnemonic, 1)?, line_num)?;
    expect_end(&args[1..], line_num)?;
    Ok(name)
}

fn no_args(instr: Instruction, args: &[Token], line_num: usize) -> Result<Instruction, AsmError> {
    expect_end(args, line_num)?;
    Ok(instr)
}

fn expect_arg<'a>(
    args: &'a [Token],
    idx: usize,
    line_num: usize,
    mnemonic: &'static str,
    expected: usize,
) -> Result<&'a Token, AsmError> {
    args.get(idx).ok_or(AsmError::MissingArgument {
        line: line_num,
        mnemonic,
        expected,
    })
}

fn expect_word<'a>(
    args: &'a [Token],
    idx: usize,
    line_num: usize,
    mnemonic: &'static str,
    expected: usize,
) -> Result<&'a str, AsmError> {
    match expect_arg(args, idx, line_num, mnemonic, expected)? {
        Token::Word(w) => Ok(w),
        other => Err(unexpected(other, line_num)),
    }
}

fn expect_end(remaining: &[Token], line_num: usize) -> Result<(), AsmError> {
    match remaining.first() {
        None => Ok(()),
        Some(token) => Err(unexpected(token, line_num)),
    }
}

fn unexpected(token: &Token, line_num: usize) -> AsmError {
    AsmError::UnexpectedToken {
        line: line_num,
        token: render(token),
    }
}

/// A token as it was written, for error messages.
fn render(token: &Token) -> String {
    match token {
        Token::Word(w) => w.clone(),
        Token::Text(s) => quoted(s),
        Token::Scoped { name, owner } => format!("{}#{owner}", quoted(name)),
        Token::LabelDecl(inner) => format!("{}:", render(inner)),
    }
}
