//! Sandboxed credential-formula interpreter.
//!
//! Operators tune credential scoring without redeploying code, so the
//! scoring rules accept small arithmetic formulas over the credential
//! value. The interpreter deliberately implements a fixed grammar over
//! a narrow numeric function set rather than embedding a scripting
//! language:
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := factor (('*' | '/') factor)*
//! factor := NUMBER | 'value' | FUNC '(' expr (',' expr)* ')'
//!         | '(' expr ')' | '-' factor
//! FUNC   := min | max | clamp | abs | sqrt
//! ```
//!
//! Execution carries two independent limits: an operation budget
//! enforced inside the evaluator, and a hard wall-clock timeout
//! enforced by running the evaluation on a scratch thread. Either limit
//! tripping is a recoverable error; credential scoring falls back to
//! the default score and logs a warning.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use thiserror::Error;

/// Hard wall-clock limit for one evaluation.
pub const EVALUATION_TIMEOUT: Duration = Duration::from_secs(1);

/// Maximum tokens accepted from one formula.
const MAX_TOKENS: usize = 256;

/// Maximum recursion depth while parsing and evaluating.
const MAX_DEPTH: usize = 32;

/// Maximum arithmetic operations per evaluation.
const MAX_OPS: usize = 1024;

/// Errors from formula parsing or evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormulaError {
    /// The formula text could not be parsed.
    #[error("Formula parse error: {0}")]
    Parse(String),

    /// An identifier other than `value` was referenced.
    #[error("Unknown identifier: {0}")]
    UnknownIdentifier(String),

    /// A function outside the allowed set was called.
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// A function was called with the wrong number of arguments.
    #[error("Function {name} expects {expected} arguments, got {got}")]
    Arity {
        /// Function name.
        name: String,
        /// Expected argument count.
        expected: usize,
        /// Supplied argument count.
        got: usize,
    },

    /// Token, depth, or operation budget exceeded.
    #[error("Execution budget exceeded")]
    BudgetExceeded,

    /// Wall-clock timeout tripped.
    #[error("Evaluation timed out")]
    Timeout,

    /// The result was NaN or infinite.
    #[error("Formula produced a non-finite result")]
    NonFinite,
}

type Result<T> = std::result::Result<T, FormulaError>;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Comma,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                chars.next();
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '0'..='9' | '.' => {
                let mut number = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        number.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let parsed = number
                    .parse::<f64>()
                    .map_err(|_| FormulaError::Parse(format!("bad number literal `{}`", number)))?;
                tokens.push(Token::Number(parsed));
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let mut ident = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_alphanumeric() || d == '_' {
                        ident.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            other => {
                return Err(FormulaError::Parse(format!("unexpected character `{}`", other)));
            }
        }
        if tokens.len() > MAX_TOKENS {
            return Err(FormulaError::BudgetExceeded);
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    value: f64,
    ops: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn charge(&mut self) -> Result<()> {
        self.ops += 1;
        if self.ops > MAX_OPS {
            Err(FormulaError::BudgetExceeded)
        } else {
            Ok(())
        }
    }

    fn expr(&mut self, depth: usize) -> Result<f64> {
        if depth > MAX_DEPTH {
            return Err(FormulaError::BudgetExceeded);
        }
        let mut left = self.term(depth + 1)?;
        while let Some(op) = self.peek().cloned() {
            match op {
                Token::Plus => {
                    self.next();
                    self.charge()?;
                    left += self.term(depth + 1)?;
                }
                Token::Minus => {
                    self.next();
                    self.charge()?;
                    left -= self.term(depth + 1)?;
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn term(&mut self, depth: usize) -> Result<f64> {
        if depth > MAX_DEPTH {
            return Err(FormulaError::BudgetExceeded);
        }
        let mut left = self.factor(depth + 1)?;
        while let Some(op) = self.peek().cloned() {
            match op {
                Token::Star => {
                    self.next();
                    self.charge()?;
                    left *= self.factor(depth + 1)?;
                }
                Token::Slash => {
                    self.next();
                    self.charge()?;
                    left /= self.factor(depth + 1)?;
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn factor(&mut self, depth: usize) -> Result<f64> {
        if depth > MAX_DEPTH {
            return Err(FormulaError::BudgetExceeded);
        }
        self.charge()?;
        match self.next().cloned() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::Minus) => Ok(-self.factor(depth + 1)?),
            Some(Token::LParen) => {
                let inner = self.expr(depth + 1)?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(FormulaError::Parse("missing closing parenthesis".to_string())),
                }
            }
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    self.next();
                    let args = self.arguments(depth + 1)?;
                    self.apply(&name, &args)
                } else if name == "value" {
                    Ok(self.value)
                } else {
                    Err(FormulaError::UnknownIdentifier(name))
                }
            }
            Some(other) => Err(FormulaError::Parse(format!("unexpected token {:?}", other))),
            None => Err(FormulaError::Parse("unexpected end of formula".to_string())),
        }
    }

    fn arguments(&mut self, depth: usize) -> Result<Vec<f64>> {
        let mut args = vec![self.expr(depth)?];
        loop {
            match self.next().cloned() {
                Some(Token::Comma) => args.push(self.expr(depth)?),
                Some(Token::RParen) => return Ok(args),
                _ => {
                    return Err(FormulaError::Parse(
                        "missing closing parenthesis in call".to_string(),
                    ))
                }
            }
        }
    }

    fn apply(&mut self, name: &str, args: &[f64]) -> Result<f64> {
        self.charge()?;
        let arity = |expected: usize| -> Result<()> {
            if args.len() == expected {
                Ok(())
            } else {
                Err(FormulaError::Arity {
                    name: name.to_string(),
                    expected,
                    got: args.len(),
                })
            }
        };
        match name {
            "min" => {
                arity(2)?;
                Ok(args[0].min(args[1]))
            }
            "max" => {
                arity(2)?;
                Ok(args[0].max(args[1]))
            }
            "clamp" => {
                arity(3)?;
                Ok(args[0].clamp(args[1], args[2]))
            }
            "abs" => {
                arity(1)?;
                Ok(args[0].abs())
            }
            "sqrt" => {
                arity(1)?;
                Ok(args[0].sqrt())
            }
            other => Err(FormulaError::UnknownFunction(other.to_string())),
        }
    }
}

/// Evaluates credential formulas under budget and timeout limits.
#[derive(Debug, Clone)]
pub struct FormulaEvaluator {
    timeout: Duration,
}

impl Default for FormulaEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl FormulaEvaluator {
    /// Creates an evaluator with the default one-second timeout.
    pub fn new() -> Self {
        Self {
            timeout: EVALUATION_TIMEOUT,
        }
    }

    /// Creates an evaluator with a custom timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Evaluates `formula` with `value` bound, entirely in-process.
    ///
    /// Budget limits apply; the wall-clock timeout does not.
    pub fn evaluate(&self, formula: &str, value: f64) -> Result<f64> {
        let tokens = tokenize(formula)?;
        if tokens.is_empty() {
            return Err(FormulaError::Parse("empty formula".to_string()));
        }
        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            value,
            ops: 0,
        };
        let result = parser.expr(0)?;
        if parser.pos != tokens.len() {
            return Err(FormulaError::Parse("trailing tokens".to_string()));
        }
        if result.is_finite() {
            Ok(result)
        } else {
            Err(FormulaError::NonFinite)
        }
    }

    /// Evaluates with the hard wall-clock timeout enforced.
    ///
    /// The evaluation runs on a scratch thread; if it does not answer
    /// within the limit, [`FormulaError::Timeout`] is returned and the
    /// thread is abandoned.
    pub fn evaluate_with_timeout(&self, formula: &str, value: f64) -> Result<f64> {
        let (tx, rx) = mpsc::channel();
        let formula = formula.to_string();
        let evaluator = Self::with_timeout(self.timeout);

        thread::spawn(move || {
            let _ = tx.send(evaluator.evaluate(&formula, value));
        });

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(_) => Err(FormulaError::Timeout),
        }
    }
}
