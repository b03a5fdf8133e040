//! Constrained arithmetic for sizing formulas.
//!
//! Equations may only use:
//! - decimal literals (`4`, `0.5`)
//! - the variables `weight` (kg) and `age` (months)
//! - `+ - * /`, unary minus and parentheses
//!
//! Equations are parsed once, when a rule is deserialized, so a malformed
//! equation is rejected at data-load time. Evaluation walks the parsed tree.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum parenthesis / unary nesting accepted by the parser.
const MAX_DEPTH: usize = 32;

/// Formula parse and evaluation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormulaError {
    #[error("equation is empty")]
    Empty,

    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("unknown variable '{0}' (only 'weight' and 'age' are allowed)")]
    UnknownVariable(String),

    #[error("unexpected token at position {0}")]
    UnexpectedToken(usize),

    #[error("unexpected end of equation")]
    UnexpectedEnd,

    #[error("unbalanced parentheses")]
    UnbalancedParens,

    #[error("equation nests deeper than 32 levels")]
    TooDeep,

    #[error("no value supplied for '{0}'")]
    MissingVariable(Variable),

    #[error("result is not a finite number")]
    NonFinite,
}

/// The two patient values a formula may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variable {
    /// Weight in kg
    Weight,
    /// Age in months
    Age,
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variable::Weight => write!(f, "weight"),
            Variable::Age => write!(f, "age"),
        }
    }
}

/// Values bound to the formula variables.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bindings {
    pub weight: Option<f64>,
    pub age: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Num(f64),
    Var(Variable),
    Neg(Box<Node>),
    Bin(Op, Box<Node>, Box<Node>),
}

/// A parsed, validated sizing equation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Expression {
    source: String,
    root: Node,
}

impl Expression {
    /// Parse an equation such as `(age/48)+4`.
    pub fn parse(source: &str) -> Result<Self, FormulaError> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(FormulaError::Empty);
        }
        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            depth: 0,
        };
        let root = parser.expr()?;
        if let Some(tok) = parser.peek() {
            return Err(match tok.kind {
                TokenKind::RParen => FormulaError::UnbalancedParens,
                _ => FormulaError::UnexpectedToken(tok.pos),
            });
        }
        Ok(Self {
            source: source.trim().to_string(),
            root,
        })
    }

    /// The equation as authored.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Check whether the equation references a variable.
    pub fn uses(&self, var: Variable) -> bool {
        fn walk(node: &Node, var: Variable) -> bool {
            match node {
                Node::Num(_) => false,
                Node::Var(v) => *v == var,
                Node::Neg(inner) => walk(inner, var),
                Node::Bin(_, l, r) => walk(l, var) || walk(r, var),
            }
        }
        walk(&self.root, var)
    }

    /// Evaluate with the given bindings.
    pub fn evaluate(&self, bindings: Bindings) -> Result<f64, FormulaError> {
        let value = eval(&self.root, &bindings)?;
        if !value.is_finite() {
            return Err(FormulaError::NonFinite);
        }
        Ok(value)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl TryFrom<String> for Expression {
    type Error = FormulaError;

    fn try_from(source: String) -> Result<Self, Self::Error> {
        Expression::parse(&source)
    }
}

impl From<Expression> for String {
    fn from(expr: Expression) -> Self {
        expr.source
    }
}

fn eval(node: &Node, bindings: &Bindings) -> Result<f64, FormulaError> {
    let value = match node {
        Node::Num(n) => *n,
        Node::Var(Variable::Weight) => bindings
            .weight
            .ok_or(FormulaError::MissingVariable(Variable::Weight))?,
        Node::Var(Variable::Age) => bindings
            .age
            .ok_or(FormulaError::MissingVariable(Variable::Age))?,
        Node::Neg(inner) => -eval(inner, bindings)?,
        Node::Bin(op, l, r) => {
            let (a, b) = (eval(l, bindings)?, eval(r, bindings)?);
            match op {
                Op::Add => a + b,
                Op::Sub => a - b,
                Op::Mul => a * b,
                Op::Div => a / b,
            }
        }
    };
    if !value.is_finite() {
        return Err(FormulaError::NonFinite);
    }
    Ok(value)
}

// =========================================================================
// Tokenizer
// =========================================================================

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Num(f64),
    Var(Variable),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
    pos: usize,
}

fn tokenize(source: &str) -> Result<Vec<Token>, FormulaError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        let pos = i;
        let kind = match ch {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n: f64 = text
                    .parse()
                    .map_err(|_| FormulaError::InvalidNumber(text.clone()))?;
                tokens.push(Token {
                    kind: TokenKind::Num(n),
                    pos,
                });
                continue;
            }
            c if c.is_ascii_alphabetic() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect();
                let var = match ident.as_str() {
                    "weight" => Variable::Weight,
                    "age" => Variable::Age,
                    _ => return Err(FormulaError::UnknownVariable(ident)),
                };
                tokens.push(Token {
                    kind: TokenKind::Var(var),
                    pos,
                });
                continue;
            }
            c => return Err(FormulaError::UnexpectedChar { ch: c, pos }),
        };
        tokens.push(Token { kind, pos });
        i += 1;
    }

    Ok(tokens)
}

// =========================================================================
// Parser (recursive descent)
// =========================================================================

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    depth: usize,
}

impl<'t> Parser<'t> {
    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'t Token> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<Node, FormulaError> {
        let mut lhs = self.term()?;
        while let Some(tok) = self.peek() {
            let op = match tok.kind {
                TokenKind::Plus => Op::Add,
                TokenKind::Minus => Op::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Node::Bin(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    // term := unary (('*' | '/') unary)*
    fn term(&mut self) -> Result<Node, FormulaError> {
        let mut lhs = self.unary()?;
        while let Some(tok) = self.peek() {
            let op = match tok.kind {
                TokenKind::Star => Op::Mul,
                TokenKind::Slash => Op::Div,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Node::Bin(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    // unary := '-' unary | primary
    fn unary(&mut self) -> Result<Node, FormulaError> {
        if matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Minus)) {
            self.pos += 1;
            self.descend()?;
            let inner = self.unary()?;
            self.depth -= 1;
            return Ok(Node::Neg(Box::new(inner)));
        }
        self.primary()
    }

    // primary := number | variable | '(' expr ')'
    fn primary(&mut self) -> Result<Node, FormulaError> {
        let tok = self.next().ok_or(FormulaError::UnexpectedEnd)?;
        match tok.kind {
            TokenKind::Num(n) => Ok(Node::Num(n)),
            TokenKind::Var(v) => Ok(Node::Var(v)),
            TokenKind::LParen => {
                self.descend()?;
                let inner = self.expr()?;
                self.depth -= 1;
                match self.next() {
                    Some(Token {
                        kind: TokenKind::RParen,
                        ..
                    }) => Ok(inner),
                    _ => Err(FormulaError::UnbalancedParens),
                }
            }
            TokenKind::RParen => Err(FormulaError::UnbalancedParens),
            _ => Err(FormulaError::UnexpectedToken(tok.pos)),
        }
    }

    fn descend(&mut self) -> Result<(), FormulaError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(FormulaError::TooDeep);
        }
        Ok(())
    }
}
