//! Lexer for the metric expression grammar.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
#[error("{message} at offset {offset}")]
pub struct LexError {
    pub message: String,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Ident(String),

    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,

    AndAnd,
    OrOr,
    Bang,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{n}"),
            Token::Str(s) => write!(f, "'{s}'"),
            Token::Ident(i) => write!(f, "{i}"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Comma => write!(f, ","),
            Token::Dot => write!(f, "."),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::EqEq => write!(f, "=="),
            Token::NotEq => write!(f, "!="),
            Token::Lt => write!(f, "<"),
            Token::Le => write!(f, "<="),
            Token::Gt => write!(f, ">"),
            Token::Ge => write!(f, ">="),
            Token::AndAnd => write!(f, "&&"),
            Token::OrOr => write!(f, "||"),
            Token::Bang => write!(f, "!"),
        }
    }
}

/// Lex the whole expression up front; the parser works on the token list.
pub fn lex(input: &str) -> Result<Vec<Token>, LexError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos] as char;
        match c {
            ' ' | '\t' | '\n' | '\r' => pos += 1,
            '(' => {
                tokens.push(Token::LParen);
                pos += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                pos += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                pos += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                pos += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                pos += 1;
            }
            '.' => {
                tokens.push(Token::Dot);
                pos += 1;
            }
            '+' => {
                tokens.push(Token::Plus);
                pos += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                pos += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                pos += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                pos += 1;
            }
            '%' => {
                tokens.push(Token::Percent);
                pos += 1;
            }
            '=' => {
                if bytes.get(pos + 1) == Some(&b'=') {
                    tokens.push(Token::EqEq);
                    pos += 2;
                } else {
                    return Err(LexError {
                        message: "assignment is not allowed; use '=='".into(),
                        offset: pos,
                    });
                }
            }
            '!' => {
                if bytes.get(pos + 1) == Some(&b'=') {
                    tokens.push(Token::NotEq);
                    pos += 2;
                } else {
                    tokens.push(Token::Bang);
                    pos += 1;
                }
            }
            '<' => {
                if bytes.get(pos + 1) == Some(&b'=') {
                    tokens.push(Token::Le);
                    pos += 2;
                } else {
                    tokens.push(Token::Lt);
                    pos += 1;
                }
            }
            '>' => {
                if bytes.get(pos + 1) == Some(&b'=') {
                    tokens.push(Token::Ge);
                    pos += 2;
                } else {
                    tokens.push(Token::Gt);
                    pos += 1;
                }
            }
            '&' => {
                if bytes.get(pos + 1) == Some(&b'&') {
                    tokens.push(Token::AndAnd);
                    pos += 2;
                } else {
                    return Err(LexError {
                        message: "expected '&&'".into(),
                        offset: pos,
                    });
                }
            }
            '|' => {
                if bytes.get(pos + 1) == Some(&b'|') {
                    tokens.push(Token::OrOr);
                    pos += 2;
                } else {
                    return Err(LexError {
                        message: "expected '||'".into(),
                        offset: pos,
                    });
                }
            }
            '\'' | '"' => {
                let (token, next) = lex_string(input, pos, c)?;
                tokens.push(token);
                pos = next;
            }
            '0'..='9' => {
                let (token, next) = lex_number(input, pos)?;
                tokens.push(token);
                pos = next;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = pos;
                while pos < bytes.len() {
                    let c = bytes[pos] as char;
                    if c.is_ascii_alphanumeric() || c == '_' {
                        pos += 1;
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(input[start..pos].to_string()));
            }
            other => {
                return Err(LexError {
                    message: format!("unexpected character '{other}'"),
                    offset: pos,
                });
            }
        }
    }

    Ok(tokens)
}

fn lex_string(input: &str, start: usize, quote: char) -> Result<(Token, usize), LexError> {
    let bytes = input.as_bytes();
    let mut out = String::new();
    let mut pos = start + 1;

    while pos < bytes.len() {
        let c = bytes[pos] as char;
        if c == quote {
            return Ok((Token::Str(out), pos + 1));
        }
        if c == '\\' {
            let escaped = bytes.get(pos + 1).map(|b| *b as char).ok_or(LexError {
                message: "dangling escape".into(),
                offset: pos,
            })?;
            match escaped {
                '\\' | '\'' | '"' => out.push(escaped),
                'n' => out.push('\n'),
                't' => out.push('\t'),
                other => {
                    return Err(LexError {
                        message: format!("unsupported escape '\\{other}'"),
                        offset: pos,
                    });
                }
            }
            pos += 2;
        } else {
            out.push(c);
            pos += 1;
        }
    }

    Err(LexError {
        message: "unterminated string literal".into(),
        offset: start,
    })
}

fn lex_number(input: &str, start: usize) -> Result<(Token, usize), LexError> {
    let bytes = input.as_bytes();
    let mut pos = start;

    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    if pos < bytes.len() && bytes[pos] == b'.' && bytes.get(pos + 1).is_some_and(u8::is_ascii_digit)
    {
        pos += 1;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
    }
    if pos < bytes.len() && (bytes[pos] == b'e' || bytes[pos] == b'E') {
        let mut exp = pos + 1;
        if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
            exp += 1;
        }
        if exp < bytes.len() && bytes[exp].is_ascii_digit() {
            pos = exp;
            while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                pos += 1;
            }
        }
    }

    let text = &input[start..pos];
    let value: f64 = text.parse().map_err(|_| LexError {
        message: format!("invalid number literal '{text}'"),
        offset: start,
    })?;
    Ok((Token::Number(value), pos))
}
