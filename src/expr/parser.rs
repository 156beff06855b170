//! Recursive-descent parser for the metric expression grammar.
//!
//! Precedence, loosest to tightest:
//! `or` < `and` < `not` < comparison < additive < multiplicative < unary
//! < postfix (subscript, field, call) < primary.
//!
//! Comparisons are deliberately non-chaining: `a <= b <= c` is rejected at
//! parse time instead of silently evaluating `(a <= b) <= c`.

use thiserror::Error;

use super::ast::{BinOp, Expr, UnOp};
use super::token::{lex, LexError, Token};

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unexpected token '{0}'")]
    UnexpectedToken(Token),

    #[error("expected '{expected}', found '{found}'")]
    Expected { expected: Token, found: Token },

    #[error("chained comparisons are not supported; split into 'a <= b and b <= c'")]
    ChainedComparison,

    #[error("only named functions may be called")]
    CalleeNotNamed,

    #[error("trailing input after expression: '{0}'")]
    TrailingInput(Token),

    #[error("expression is empty")]
    Empty,
}

/// Parse one complete expression; trailing tokens are an error.
pub fn parse(input: &str) -> Result<Expr, ParseError> {
    let tokens = lex(input)?;
    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    match parser.peek() {
        None => Ok(expr),
        Some(tok) => Err(ParseError::TrailingInput(tok.clone())),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Result<Token, ParseError> {
        let tok = self.tokens.get(self.pos).cloned().ok_or(ParseError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(tok)
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParseError> {
        let found = self.next()?;
        if found == expected {
            Ok(())
        } else {
            Err(ParseError::Expected { expected, found })
        }
    }

    /// True and consume if the next token matches.
    fn eat(&mut self, tok: &Token) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, word: &str) -> bool {
        if matches!(self.peek(), Some(Token::Ident(w)) if w == word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_and()?;
        loop {
            if self.eat(&Token::OrOr) || self.eat_keyword("or") {
                let rhs = self.parse_and()?;
                lhs = Expr::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
            } else {
                return Ok(lhs);
            }
        }
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_not()?;
        loop {
            if self.eat(&Token::AndAnd) || self.eat_keyword("and") {
                let rhs = self.parse_not()?;
                lhs = Expr::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
            } else {
                return Ok(lhs);
            }
        }
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&Token::Bang) || self.eat_keyword("not") {
            let operand = self.parse_not()?;
            return Ok(Expr::Unary(UnOp::Not, Box::new(operand)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.parse_additive()?;
        let Some(op) = self.peek_comparison() else {
            return Ok(lhs);
        };
        self.pos += 1;
        let rhs = self.parse_additive()?;
        if self.peek_comparison().is_some() {
            return Err(ParseError::ChainedComparison);
        }
        Ok(Expr::Binary(op, Box::new(lhs), Box::new(rhs)))
    }

    fn peek_comparison(&self) -> Option<BinOp> {
        match self.peek()? {
            Token::EqEq => Some(BinOp::Eq),
            Token::NotEq => Some(BinOp::Ne),
            Token::Lt => Some(BinOp::Lt),
            Token::Le => Some(BinOp::Le),
            Token::Gt => Some(BinOp::Gt),
            Token::Ge => Some(BinOp::Ge),
            _ => None,
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::Percent) => BinOp::Rem,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&Token::Minus) {
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary(UnOp::Neg, Box::new(operand)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat(&Token::LBracket) {
                let index = self.parse_or()?;
                self.expect(Token::RBracket)?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else if self.eat(&Token::Dot) {
                let field = match self.next()? {
                    Token::Ident(name) => name,
                    other => return Err(ParseError::UnexpectedToken(other)),
                };
                expr = Expr::Field(Box::new(expr), field);
            } else if self.peek() == Some(&Token::LParen) {
                let path = ident_path(&expr).ok_or(ParseError::CalleeNotNamed)?;
                self.pos += 1;
                let args = self.parse_args()?;
                expr = Expr::Call { path, args };
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_or()?);
            if self.eat(&Token::Comma) {
                continue;
            }
            self.expect(Token::RParen)?;
            return Ok(args);
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.next()? {
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::Str(s) => Ok(Expr::Str(s)),
            Token::Ident(word) => match word.as_str() {
                "true" | "True" => Ok(Expr::Bool(true)),
                "false" | "False" => Ok(Expr::Bool(false)),
                "null" | "None" => Ok(Expr::Null),
                _ => Ok(Expr::Ident(word)),
            },
            Token::LParen => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            other => Err(ParseError::UnexpectedToken(other)),
        }
    }
}

/// Flatten an identifier / field chain (`math.sqrt`) into a call path.
/// Anything else is not callable.
fn ident_path(expr: &Expr) -> Option<Vec<String>> {
    match expr {
        Expr::Ident(name) => Some(vec![name.clone()]),
        Expr::Field(base, field) => {
            let mut path = ident_path(base)?;
            path.push(field.clone());
            Some(path)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_helper_call() {
        let expr = parse("within_range(results['x'], 90, 110)").unwrap();
        let Expr::Call { path, args } = expr else {
            panic!("expected call, got {expr:?}");
        };
        assert_eq!(path, vec!["within_range"]);
        assert_eq!(args.len(), 3);
        assert!(matches!(&args[0], Expr::Index(_, _)));
    }

    #[test]
    fn test_parse_dotted_call_path() {
        let expr = parse("math.sqrt(4)").unwrap();
        let Expr::Call { path, .. } = expr else {
            panic!("expected call");
        };
        assert_eq!(path, vec!["math", "sqrt"]);
    }

    #[test]
    fn test_precedence_and_over_or() {
        // a or b and c parses as a or (b and c)
        let expr = parse("a or b and c").unwrap();
        let Expr::Binary(BinOp::Or, _, rhs) = expr else {
            panic!("expected top-level or");
        };
        assert!(matches!(*rhs, Expr::Binary(BinOp::And, _, _)));
    }

    #[test]
    fn test_precedence_arithmetic_over_comparison() {
        let expr = parse("1 + 2 * 3 == 7").unwrap();
        assert!(matches!(expr, Expr::Binary(BinOp::Eq, _, _)));
    }

    #[test]
    fn test_chained_comparison_is_error() {
        assert_eq!(parse("1 <= 2 <= 3"), Err(ParseError::ChainedComparison));
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        assert!(matches!(parse("1 + 2 3"), Err(ParseError::TrailingInput(_))));
    }

    #[test]
    fn test_calling_a_subscript_rejected() {
        assert_eq!(parse("results['f'](1)"), Err(ParseError::CalleeNotNamed));
    }

    #[test]
    fn test_python_style_literals() {
        assert_eq!(parse("True").unwrap(), Expr::Bool(true));
        assert_eq!(parse("None").unwrap(), Expr::Null);
    }

    #[test]
    fn test_empty_expression_rejected() {
        assert_eq!(parse("   "), Err(ParseError::Empty));
    }
}
