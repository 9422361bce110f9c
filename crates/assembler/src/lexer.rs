//! Tokenizer for retrace assembly text.

use std::iter::Peekable;

use crate::error::AsmError;

/// A single token from an assembly line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    /// A bare word: mnemonic, name, label reference or literal.
    Word(String),
    /// A quoted string literal or name, escapes already decoded.
    Text(String),
    /// A quoted name directly followed by `#owner`, e.g. `"a b"#3`.
    /// The owner is kept as written.
    Scoped { name: String, owner: String },
    /// A word or quoted name ending in `:`, declaring a label. The colon is
    /// stripped.
    LabelDecl(Box<Token>),
}

type Chars<'a> = Peekable<std::str::Chars<'a>>;

/// Tokenize a single line of assembly text.
///
/// Returns an empty Vec for blank lines and comment-only lines.
/// Comments start with `;` outside a string literal and extend to end of line.
pub(crate) fn tokenize_line(line: &str, line_num: usize) -> Result<Vec<Token>, AsmError> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ';' => break,
            c if c.is_whitespace() => {
                chars.next();
            }
            '"' => {
                chars.next();
                let text = string_literal(&mut chars, line_num)?;
                let mut token = match chars.next_if_eq(&'#') {
                    Some(_) => Token::Scoped {
                        name: text,
                        owner: take_word(&mut chars, |c| ends_word(c) || c == ':'),
                    },
                    None => Token::Text(text),
                };
                if chars.next_if_eq(&':').is_some() {
                    token = Token::LabelDecl(Box::new(token));
                }
                if let Some(&next) = chars.peek() {
                    if !next.is_whitespace() && next != ';' {
                        return Err(AsmError::UnexpectedToken {
                            line: line_num,
                            token: next.to_string(),
                        });
                    }
                }
                tokens.push(token);
            }
            _ => {
                let word = take_word(&mut chars, ends_word);
                let token = match word.strip_suffix(':') {
                    Some(name) => Token::LabelDecl(Box::new(Token::Word(name.to_string()))),
                    None => Token::Word(word),
                };
                tokens.push(token);
            }
        }
    }

    Ok(tokens)
}

fn ends_word(c: char) -> bool {
    c.is_whitespace() || c == ';' || c == '"'
}

fn take_word(chars: &mut Chars<'_>, stop: impl Fn(char) -> bool) -> String {
    let mut word = String::new();
    while let Some(c) = chars.next_if(|&c| !stop(c)) {
        word.push(c);
    }
    word
}

/// Read a string literal body up to and including the closing quote.
fn string_literal(chars: &mut Chars<'_>, line_num: usize) -> Result<String, AsmError> {
    let mut text = String::new();
    loop {
        match chars.next() {
            None => return Err(AsmError::UnterminatedString { line: line_num }),
            Some('"') => return Ok(text),
            Some('\\') => {
                let decoded = match chars.next() {
                    Some('"') => '"',
                    Some('\\') => '\\',
                    Some('n') => '\n',
                    Some('t') => '\t',
                    Some(other) => {
                        return Err(AsmError::InvalidEscape {
                            line: line_num,
                            escape: other,
                        })
                    }
                    None => return Err(AsmError::UnterminatedString { line: line_num }),
                };
                text.push(decoded);
            }
            Some(c) => text.push(c),
        }
    }
}
