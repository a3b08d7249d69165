//! Expression Parser
//!
//! A hand-written lexer and precedence-climbing parser for the template
//! expression language:
//!
//! - literals: numbers, `'..'`/`".."` strings, `true`, `false`, `null`,
//!   `undefined`, `[a, b]`, `{ key: value }`
//! - names, resolved against the scope at evaluation time
//! - member access (`a.b`, `a?.b`), indexing (`a[i]`, including string
//!   positions), calls (`f(x, y)`)
//! - unary `!`, `-`, `+`
//! - binary `* / % + - < <= > >= == != === !== && || ??`
//! - the conditional operator `test ? a : b`
//!
//! There is no assignment and no way to reach anything outside the scope.
//!
//! Nesting is capped at [`MAX_DEPTH`] levels (parentheses, prefix operators,
//! operator and member chains all count), so neither parsing nor evaluating
//! can exhaust the stack. Deeper input fails with [`ParseError::TooDeep`].

use std::fmt;
use std::sync::Arc;

use crate::error::ParseError;

use super::ast::{BinaryOp, Expr, Literal, UnaryOp};

/// Deepest nesting the parser accepts.
pub const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Dot,
    QuestionDot,
    Colon,
    Question,
    Bang,
    Op(BinaryOp),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "number {n}"),
            Self::Str(s) => write!(f, "string {s:?}"),
            Self::Ident(name) => write!(f, "name `{name}`"),
            Self::LParen => f.write_str("`(`"),
            Self::RParen => f.write_str("`)`"),
            Self::LBracket => f.write_str("`[`"),
            Self::RBracket => f.write_str("`]`"),
            Self::LBrace => f.write_str("`{`"),
            Self::RBrace => f.write_str("`}`"),
            Self::Comma => f.write_str("`,`"),
            Self::Dot => f.write_str("`.`"),
            Self::QuestionDot => f.write_str("`?.`"),
            Self::Colon => f.write_str("`:`"),
            Self::Question => f.write_str("`?`"),
            Self::Bang => f.write_str("`!`"),
            Self::Op(op) => write!(f, "operator {op:?}"),
        }
    }
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn peek_char(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.src[self.pos..].chars().nth(1)
    }

    fn rest_starts_with(&self, s: &str) -> bool {
        self.src[self.pos..].starts_with(s)
    }

    fn tokenize(mut self) -> Result<Vec<(Token, usize)>, ParseError> {
        let mut tokens = Vec::new();
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.pos += c.len_utf8();
                continue;
            }
            let start = self.pos;
            let token = if c.is_ascii_digit() || (c == '.' && self.peek_second().is_some_and(|d| d.is_ascii_digit())) {
                self.number()?
            } else if c == '\'' || c == '"' {
                self.string(c)?
            } else if c.is_alphabetic() || c == '_' || c == '$' {
                self.ident()
            } else {
                self.punct(c)?
            };
            tokens.push((token, start));
        }
        Ok(tokens)
    }

    fn number(&mut self) -> Result<Token, ParseError> {
        let start = self.pos;
        let mut seen_dot = false;
        let mut seen_exp = false;
        while let Some(c) = self.peek_char() {
            match c {
                '0'..='9' => self.pos += 1,
                '.' if !seen_dot && !seen_exp => {
                    seen_dot = true;
                    self.pos += 1;
                }
                'e' | 'E' if !seen_exp => {
                    seen_exp = true;
                    self.pos += 1;
                    if matches!(self.peek_char(), Some('+' | '-')) {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
        let text = &self.src[start..self.pos];
        text.parse()
            .map(Token::Number)
            .map_err(|_| ParseError::InvalidNumber {
                text: text.to_string(),
                offset: start,
            })
    }

    fn string(&mut self, quote: char) -> Result<Token, ParseError> {
        let start = self.pos;
        self.pos += 1;
        let mut out = String::new();
        loop {
            let Some(c) = self.peek_char() else {
                return Err(ParseError::UnterminatedString { offset: start });
            };
            self.pos += c.len_utf8();
            match c {
                c if c == quote => return Ok(Token::Str(out)),
                '\\' => {
                    let Some(escaped) = self.peek_char() else {
                        return Err(ParseError::UnterminatedString { offset: start });
                    };
                    self.pos += escaped.len_utf8();
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '0' => '\0',
                        other => other,
                    });
                }
                other => out.push(other),
            }
        }
    }

    fn ident(&mut self) -> Token {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if c.is_alphanumeric() || c == '_' || c == '$' {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        Token::Ident(self.src[start..self.pos].to_string())
    }

    fn punct(&mut self, c: char) -> Result<Token, ParseError> {
        // Longest match first
        const MULTI: [(&str, Token); 10] = [
            ("===", Token::Op(BinaryOp::StrictEq)),
            ("!==", Token::Op(BinaryOp::StrictNe)),
            ("==", Token::Op(BinaryOp::Eq)),
            ("!=", Token::Op(BinaryOp::Ne)),
            ("<=", Token::Op(BinaryOp::Le)),
            (">=", Token::Op(BinaryOp::Ge)),
            ("&&", Token::Op(BinaryOp::And)),
            ("||", Token::Op(BinaryOp::Or)),
            ("??", Token::Op(BinaryOp::Coalesce)),
            ("?.", Token::QuestionDot),
        ];
        for (text, token) in MULTI {
            // `a?.5:b` is a conditional, not optional chaining
            if text == "?." && self.src[self.pos..].chars().nth(2).is_some_and(|d| d.is_ascii_digit()) {
                continue;
            }
            if self.rest_starts_with(text) {
                self.pos += text.len();
                return Ok(token);
            }
        }

        let token = match c {
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            ',' => Token::Comma,
            '.' => Token::Dot,
            ':' => Token::Colon,
            '?' => Token::Question,
            '!' => Token::Bang,
            '+' => Token::Op(BinaryOp::Add),
            '-' => Token::Op(BinaryOp::Sub),
            '*' => Token::Op(BinaryOp::Mul),
            '/' => Token::Op(BinaryOp::Div),
            '%' => Token::Op(BinaryOp::Rem),
            '<' => Token::Op(BinaryOp::Lt),
            '>' => Token::Op(BinaryOp::Gt),
            found => {
                return Err(ParseError::UnexpectedChar {
                    found,
                    offset: self.pos,
                })
            }
        };
        self.pos += c.len_utf8();
        Ok(token)
    }
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    depth: usize,
    end: usize,
}

impl Parser {
    fn new(tokens: Vec<(Token, usize)>, end: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
            end,
        }
    }

    fn deepen(&mut self) -> Result<(), ParseError> {
        if self.depth >= MAX_DEPTH {
            let offset = self.tokens.get(self.pos).map_or(self.end, |(_, offset)| *offset);
            return Err(ParseError::TooDeep { offset });
        }
        self.depth += 1;
        Ok(())
    }

    /// Run `f` one level deeper. The depth is restored however `f` returns.
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        let entry = self.depth;
        let result = self.deepen().and_then(|()| f(self));
        self.depth = entry;
        result
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn next(&mut self) -> Option<(Token, usize)> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token, what: &'static str) -> Result<(), ParseError> {
        match self.next() {
            Some((token, _)) if token == expected => Ok(()),
            Some((token, offset)) => Err(ParseError::UnexpectedToken {
                found: token.to_string(),
                expected: what,
                offset,
            }),
            None => Err(ParseError::UnexpectedEnd { expected: what }),
        }
    }

    fn conditional(&mut self) -> Result<Expr, ParseError> {
        self.nested(Self::ternary)
    }

    fn ternary(&mut self) -> Result<Expr, ParseError> {
        let test = self.binary(0)?;
        if !self.eat(&Token::Question) {
            return Ok(test);
        }
        let consequent = self.conditional()?;
        self.expect(Token::Colon, "`:`")?;
        let alternate = self.conditional()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn binary(&mut self, min_precedence: u8) -> Result<Expr, ParseError> {
        let entry = self.depth;
        let result = self.binary_chain(min_precedence);
        self.depth = entry;
        result
    }

    /// Every operator folded into `lhs` makes the tree one level deeper.
    fn binary_chain(&mut self, min_precedence: u8) -> Result<Expr, ParseError> {
        let mut lhs = self.unary()?;
        while let Some(Token::Op(op)) = self.peek() {
            let op = *op;
            let precedence = op.precedence();
            if precedence <= min_precedence {
                break;
            }
            self.deepen()?;
            self.pos += 1;
            let rhs = self.binary(precedence)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek() {
            Some(Token::Bang) => UnaryOp::Not,
            Some(Token::Op(BinaryOp::Sub)) => UnaryOp::Neg,
            Some(Token::Op(BinaryOp::Add)) => UnaryOp::Plus,
            _ => return self.postfix(),
        };
        self.pos += 1;
        let operand = self.nested(Self::unary)?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let entry = self.depth;
        let result = self.postfix_chain();
        self.depth = entry;
        result
    }

    fn postfix_chain(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;
        loop {
            if matches!(
                self.peek(),
                Some(Token::Dot | Token::QuestionDot | Token::LBracket | Token::LParen)
            ) {
                self.deepen()?;
            }
            match self.peek() {
                Some(Token::Dot) | Some(Token::QuestionDot) => {
                    let optional = self.peek() == Some(&Token::QuestionDot);
                    self.pos += 1;
                    let property = match self.next() {
                        Some((Token::Ident(name), _)) => name,
                        Some((token, offset)) => {
                            return Err(ParseError::UnexpectedToken {
                                found: token.to_string(),
                                expected: "property name",
                                offset,
                            })
                        }
                        None => return Err(ParseError::UnexpectedEnd { expected: "property name" }),
                    };
                    expr = Expr::Member {
                        object: Box::new(expr),
                        property: Arc::from(property),
                        optional,
                    };
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    let index = self.conditional()?;
                    self.expect(Token::RBracket, "`]`")?;
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                Some(Token::LParen) => {
                    self.pos += 1;
                    let args = self.list(Token::RParen, "`)`")?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    /// Comma-separated expressions up to `close`; the opener is consumed.
    fn list(&mut self, close: Token, what: &'static str) -> Result<Vec<Expr>, ParseError> {
        let mut items = Vec::new();
        if self.eat(&close) {
            return Ok(items);
        }
        loop {
            items.push(self.conditional()?);
            if self.eat(&Token::Comma) {
                // Trailing comma
                if self.eat(&close) {
                    return Ok(items);
                }
                continue;
            }
            self.expect(close, what)?;
            return Ok(items);
        }
    }

    fn object(&mut self) -> Result<Expr, ParseError> {
        let mut fields = Vec::new();
        if self.eat(&Token::RBrace) {
            return Ok(Expr::Object(fields));
        }
        loop {
            let key = match self.next() {
                Some((Token::Ident(name), _)) | Some((Token::Str(name), _)) => name,
                Some((token, offset)) => {
                    return Err(ParseError::UnexpectedToken {
                        found: token.to_string(),
                        expected: "object key",
                        offset,
                    })
                }
                None => return Err(ParseError::UnexpectedEnd { expected: "object key" }),
            };
            self.expect(Token::Colon, "`:`")?;
            let value = self.conditional()?;
            fields.push((Arc::from(key), value));

            if self.eat(&Token::Comma) {
                if self.eat(&Token::RBrace) {
                    return Ok(Expr::Object(fields));
                }
                continue;
            }
            self.expect(Token::RBrace, "`}`")?;
            return Ok(Expr::Object(fields));
        }
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let Some((token, offset)) = self.next() else {
            return Err(ParseError::UnexpectedEnd { expected: "expression" });
        };
        match token {
            Token::Number(n) => Ok(Expr::Literal(Literal::Number(n))),
            Token::Str(s) => Ok(Expr::Literal(Literal::Str(Arc::from(s)))),
            Token::Ident(name) => Ok(match name.as_str() {
                "true" => Expr::Literal(Literal::Bool(true)),
                "false" => Expr::Literal(Literal::Bool(false)),
                "null" => Expr::Literal(Literal::Null),
                "undefined" => Expr::Literal(Literal::Undefined),
                _ => Expr::Ident(Arc::from(name)),
            }),
            Token::LParen => {
                let inner = self.conditional()?;
                self.expect(Token::RParen, "`)`")?;
                Ok(inner)
            }
            Token::LBracket => Ok(Expr::Array(self.list(Token::RBracket, "`]`")?)),
            Token::LBrace => self.object(),
            other => Err(ParseError::UnexpectedToken {
                found: other.to_string(),
                expected: "expression",
                offset,
            }),
        }
    }
}

/// Parse expression text into an AST.
pub fn parse(src: &str) -> Result<Expr, ParseError> {
    let tokens = Lexer::new(src).tokenize()?;
    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }

    let mut parser = Parser::new(tokens, src.len());
    let expr = parser.conditional()?;
    match parser.next() {
        None => Ok(expr),
        Some((token, offset)) => Err(ParseError::UnexpectedToken {
            found: token.to_string(),
            expected: "end of expression",
            offset,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Box<Expr> {
        Box::new(Expr::Ident(Arc::from(name)))
    }

    fn num(n: f64) -> Box<Expr> {
        Box::new(Expr::Literal(Literal::Number(n)))
    }

    #[test]
    fn precedence_and_associativity() {
        let expr = parse("a + b * 2 - 1").unwrap();
        assert_eq!(
            expr,
            Expr::Binary {
                op: BinaryOp::Sub,
                lhs: Box::new(Expr::Binary {
                    op: BinaryOp::Add,
                    lhs: ident("a"),
                    rhs: Box::new(Expr::Binary {
                        op: BinaryOp::Mul,
                        lhs: ident("b"),
                        rhs: num(2.0),
                    }),
                }),
                rhs: num(1.0),
            }
        );
    }

    #[test]
    fn member_index_and_call_chain() {
        let expr = parse("user.tags[0].toUpper()").unwrap();
        let Expr::Call { callee, args } = expr else {
            panic!("expected call");
        };
        assert!(args.is_empty());
        assert_eq!(callee.describe(), "user.tags[..].toUpper");
    }

    #[test]
    fn conditional_is_right_associative() {
        let expr = parse("a ? 1 : b ? 2 : 3").unwrap();
        let Expr::Conditional { alternate, .. } = expr else {
            panic!("expected conditional");
        };
        assert!(matches!(*alternate, Expr::Conditional { .. }));
    }

    #[test]
    fn optional_chaining_versus_conditional() {
        assert!(matches!(
            parse("a?.b").unwrap(),
            Expr::Member { optional: true, .. }
        ));
        assert!(matches!(parse("a?.5:1").unwrap(), Expr::Conditional { .. }));
    }

    #[test]
    fn literals() {
        assert_eq!(parse("'it\\'s'").unwrap(), Expr::Literal(Literal::Str(Arc::from("it's"))));
        assert_eq!(parse(".5").unwrap(), Expr::Literal(Literal::Number(0.5)));
        assert_eq!(parse("1e3").unwrap(), Expr::Literal(Literal::Number(1000.0)));
        assert_eq!(parse("null").unwrap(), Expr::Literal(Literal::Null));
        assert!(matches!(parse("[1, 2,]").unwrap(), Expr::Array(items) if items.len() == 2));
        assert!(matches!(parse("{a: 1, 'b': 2}").unwrap(), Expr::Object(fields) if fields.len() == 2));
    }

    #[test]
    fn errors_carry_offsets() {
        assert_eq!(
            parse("a # b").unwrap_err(),
            ParseError::UnexpectedChar { found: '#', offset: 2 }
        );
        assert_eq!(
            parse("'open").unwrap_err(),
            ParseError::UnterminatedString { offset: 0 }
        );
        assert_eq!(
            parse("a +").unwrap_err(),
            ParseError::UnexpectedEnd { expected: "expression" }
        );
        assert!(matches!(
            parse("a b").unwrap_err(),
            ParseError::UnexpectedToken { offset: 2, .. }
        ));
        assert_eq!(parse("   ").unwrap_err(), ParseError::Empty);
    }

    #[test]
    fn nesting_is_capped() {
        let prefix = "-".repeat(200_000) + "1";
        assert!(matches!(parse(&prefix), Err(ParseError::TooDeep { .. })));

        let parens = "(".repeat(100_000) + "1" + &")".repeat(100_000);
        assert!(matches!(parse(&parens), Err(ParseError::TooDeep { .. })));

        let chain = vec!["a"; 100_000].join(" + ");
        assert!(matches!(parse(&chain), Err(ParseError::TooDeep { .. })));

        let members = "a".to_string() + &".b".repeat(100_000);
        assert!(matches!(parse(&members), Err(ParseError::TooDeep { .. })));

        assert_eq!(
            parse(&("!".repeat(MAX_DEPTH + 1) + "x")).unwrap_err(),
            ParseError::TooDeep { offset: MAX_DEPTH }
        );
    }

    #[test]
    fn ordinary_nesting_is_accepted() {
        let parens = "(".repeat(50) + "1" + &")".repeat(50);
        assert_eq!(parse(&parens).unwrap(), Expr::Literal(Literal::Number(1.0)));
        assert!(parse(&vec!["a"; 100].join(" + ")).is_ok());
        assert!(parse(&("!".repeat(100) + "x")).is_ok());
        assert!(parse("a.b.c[0](1, [2, { k: (3) }])?.d").is_ok());
    }

    #[test]
    fn assignment_is_not_part_of_the_language() {
        assert!(parse("a = 1").is_err());
    }
}
