//! Algebraic conversions (type 3).
//!
//! Formulas are MCD-2 MC text expressions over one variable `X`. The
//! [`FormulaEvaluator`] trait lets callers plug in a full symbolic engine;
//! [`ExpressionEvaluator`] covers the arithmetic subset found in practice.

use crate::{Error, Result};

/// Evaluates a text formula with `X` bound to every raw sample.
pub trait FormulaEvaluator: Send + Sync {
    fn evaluate(&self, formula: &str, raw: &[f64]) -> Result<Vec<f64>>;
}

/// Built-in evaluator: `+ - * / ^ **`, parentheses, unary minus, numeric
/// literals with exponents and the variable `X`.
///
/// The formula is parsed once and the tree is evaluated per sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpressionEvaluator;

impl FormulaEvaluator for ExpressionEvaluator {
    fn evaluate(&self, formula: &str, raw: &[f64]) -> Result<Vec<f64>> {
        let expr = parse(formula).map_err(|reason| Error::FormulaError {
            formula: formula.to_string(),
            reason: reason.to_string(),
        })?;
        Ok(raw.iter().map(|&x| expr.eval(x)).collect())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Number(f64),
    Variable,
    Neg(Box<Expr>),
    Binary(Op, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl Expr {
    fn eval(&self, x: f64) -> f64 {
        match self {
            Expr::Number(n) => *n,
            Expr::Variable => x,
            Expr::Neg(e) => -e.eval(x),
            Expr::Binary(op, l, r) => {
                let (l, r) = (l.eval(x), r.eval(x));
                match op {
                    Op::Add => l + r,
                    Op::Sub => l - r,
                    Op::Mul => l * r,
                    Op::Div => l / r,
                    Op::Pow => pow(l, r),
                }
            }
        }
    }
}

/// Integer exponents go through `powi` so negative bases stay real.
fn pow(base: f64, exp: f64) -> f64 {
    if exp.fract() == 0.0 && exp.abs() <= i32::MAX as f64 {
        base.powi(exp as i32)
    } else {
        base.powf(exp)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Variable,
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

fn tokenize(expr: &str) -> core::result::Result<Vec<Token>, &'static str> {
    let mut tokens = Vec::new();
    let mut chars = expr.chars().peekable();

    while let Some(c) = chars.next() {
        let token = match c {
            c if c.is_whitespace() => continue,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                Token::Caret
            }
            '*' => Token::Star,
            '/' => Token::Slash,
            '^' => Token::Caret,
            '(' => Token::LParen,
            ')' => Token::RParen,
            'X' | 'x' => {
                // ASAM tools also write the single variable as X1
                if chars.peek() == Some(&'1') {
                    chars.next();
                }
                Token::Variable
            }
            '0'..='9' | '.' => {
                let mut literal = String::from(c);
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_digit() || ch == '.' {
                        literal.push(ch);
                        chars.next();
                    } else if ch == 'e' || ch == 'E' {
                        literal.push(ch);
                        chars.next();
                        if let Some(&sign @ ('+' | '-')) = chars.peek() {
                            literal.push(sign);
                            chars.next();
                        }
                    } else {
                        break;
                    }
                }
                Token::Number(literal.parse().map_err(|_| "invalid number")?)
            }
            _ => return Err("unexpected character"),
        };
        tokens.push(token);
    }

    Ok(tokens)
}

fn parse(formula: &str) -> core::result::Result<Expr, &'static str> {
    let tokens = tokenize(formula)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.expr()?;
    if parser.pos != parser.tokens.len() {
        return Err("unexpected trailing input");
    }
    Ok(expr)
}

// Grammar:
// expr    = term (('+' | '-') term)*
// term    = power (('*' | '/') power)*
// power   = unary ('^' power)?
// unary   = '-' unary | primary
// primary = NUMBER | VARIABLE | '(' expr ')'
struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expr(&mut self) -> core::result::Result<Expr, &'static str> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => Op::Add,
                Some(Token::Minus) => Op::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            left = Expr::Binary(op, Box::new(left), Box::new(self.term()?));
        }
    }

    fn term(&mut self) -> core::result::Result<Expr, &'static str> {
        let mut left = self.power()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => Op::Mul,
                Some(Token::Slash) => Op::Div,
                _ => return Ok(left),
            };
            self.pos += 1;
            left = Expr::Binary(op, Box::new(left), Box::new(self.power()?));
        }
    }

    fn power(&mut self) -> core::result::Result<Expr, &'static str> {
        let base = self.unary()?;
        if self.eat(&Token::Caret) {
            // right associative
            let exp = self.power()?;
            return Ok(Expr::Binary(Op::Pow, Box::new(base), Box::new(exp)));
        }
        Ok(base)
    }

    fn unary(&mut self) -> core::result::Result<Expr, &'static str> {
        if self.eat(&Token::Minus) {
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> core::result::Result<Expr, &'static str> {
        let token = self.peek().cloned().ok_or("unexpected end of expression")?;
        self.pos += 1;
        match token {
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::Variable => Ok(Expr::Variable),
            Token::LParen => {
                let inner = self.expr()?;
                if !self.eat(&Token::RParen) {
                    return Err("expected closing parenthesis");
                }
                Ok(inner)
            }
            _ => Err("unexpected token"),
        }
    }
}
