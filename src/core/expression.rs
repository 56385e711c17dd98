/// Stack-based expression language used for rule guards.
///
/// Programs are whitespace-separated postfix tokens: number literals,
/// `key?` namespace reads, and operators. Binary numeric operators are
/// null-safe: a missing operand (an absent key, or a value of the wrong
/// type) is replaced by the operator's identity rather than failing.
use std::fmt;
use thiserror::Error;

use crate::schema::datum::{Datum, Namespace};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("unrecognized token '{0}'")]
    Syntax(String),
    #[error("operator '{0}' needs more operands than the stack holds")]
    StackUnderflow(OpCode),
    #[error("expression left no value on the stack")]
    EmptyResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Or,
    And,
    Not,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEquals,
    GreaterThan,
    GreaterThanOrEquals,
    Minimum,
    Maximum,
}

impl OpCode {
    pub fn from_symbol(symbol: &str) -> Option<OpCode> {
        Some(match symbol {
            "+" => OpCode::Add,
            "-" => OpCode::Subtract,
            "*" => OpCode::Multiply,
            "/" => OpCode::Divide,
            "%" => OpCode::Modulo,
            "|" => OpCode::Or,
            "&" => OpCode::And,
            "!" => OpCode::Not,
            "=" => OpCode::Equal,
            "!=" => OpCode::NotEqual,
            "<" => OpCode::LessThan,
            "<=" => OpCode::LessThanOrEquals,
            ">" => OpCode::GreaterThan,
            ">=" => OpCode::GreaterThanOrEquals,
            "<<" => OpCode::Minimum,
            ">>" => OpCode::Maximum,
            _ => return None,
        })
    }

    pub fn symbol(self) -> &'static str {
        match self {
            OpCode::Add => "+",
            OpCode::Subtract => "-",
            OpCode::Multiply => "*",
            OpCode::Divide => "/",
            OpCode::Modulo => "%",
            OpCode::Or => "|",
            OpCode::And => "&",
            OpCode::Not => "!",
            OpCode::Equal => "=",
            OpCode::NotEqual => "!=",
            OpCode::LessThan => "<",
            OpCode::LessThanOrEquals => "<=",
            OpCode::GreaterThan => ">",
            OpCode::GreaterThanOrEquals => ">=",
            OpCode::Minimum => "<<",
            OpCode::Maximum => ">>",
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Literal(Datum),
    Get(String),
    Op(OpCode),
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Literal(datum) => datum.fmt(f),
            Instruction::Get(key) => write!(f, "{}?", key),
            Instruction::Op(op) => op.fmt(f),
        }
    }
}

/// A parsed guard program.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expression {
    instructions: Vec<Instruction>,
}

impl Expression {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }

    /// Parse a whitespace-separated postfix program.
    pub fn parse(text: &str) -> Result<Expression, ExpressionError> {
        let mut instructions = Vec::new();
        for token in text.split_whitespace() {
            if let Ok(number) = token.parse::<f64>() {
                instructions.push(Instruction::Literal(Datum::Number(number)));
            } else if let Some(op) = OpCode::from_symbol(token) {
                instructions.push(Instruction::Op(op));
            } else if let Some(key) = token.strip_suffix('?').filter(|k| !k.is_empty()) {
                instructions.push(Instruction::Get(key.to_string()));
            } else {
                return Err(ExpressionError::Syntax(token.to_string()));
            }
        }
        Ok(Expression { instructions })
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Run the program against `data`.
    ///
    /// An empty program yields `Number(1)`. `Ok(None)` means the program
    /// ended on a missing value, e.g. a lone read of an absent key.
    pub fn evaluate(&self, data: &Namespace) -> Result<Option<Datum>, ExpressionError> {
        if self.instructions.is_empty() {
            return Ok(Some(Datum::Number(1.0)));
        }

        let mut stack: Vec<Option<Datum>> = Vec::new();
        for instruction in &self.instructions {
            match instruction {
                Instruction::Literal(datum) => stack.push(Some(datum.clone())),
                Instruction::Get(key) => stack.push(data.get(key).cloned()),
                Instruction::Op(OpCode::Not) => {
                    let a = pop(&mut stack, OpCode::Not)?;
                    let truth = a.as_ref().is_some_and(Datum::to_bool);
                    stack.push(Some(Datum::Boolean(!truth)));
                }
                Instruction::Op(op) => {
                    let b = pop(&mut stack, *op)?;
                    let a = pop(&mut stack, *op)?;
                    stack.push(Some(apply_binary(*op, a, b)));
                }
            }
        }
        stack.pop().ok_or(ExpressionError::EmptyResult)
    }

    /// Evaluate as a guard: a missing result is false.
    pub fn test(&self, data: &Namespace) -> Result<bool, ExpressionError> {
        Ok(self.evaluate(data)?.as_ref().is_some_and(Datum::to_bool))
    }
}

impl std::str::FromStr for Expression {
    type Err = ExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Expression::parse(s)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, instruction) in self.instructions.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            instruction.fmt(f)?;
        }
        Ok(())
    }
}

fn pop(stack: &mut Vec<Option<Datum>>, op: OpCode) -> Result<Option<Datum>, ExpressionError> {
    stack.pop().ok_or(ExpressionError::StackUnderflow(op))
}

fn apply_binary(op: OpCode, a: Option<Datum>, b: Option<Datum>) -> Datum {
    let flag = |d: &Option<Datum>| d.as_ref().and_then(Datum::as_bool);
    let x = a.as_ref().and_then(Datum::as_number);
    let y = b.as_ref().and_then(Datum::as_number);

    match op {
        OpCode::Equal => Datum::Boolean(a == b),
        OpCode::NotEqual => Datum::Boolean(a != b),
        OpCode::And => Datum::Boolean(flag(&a) == Some(true) && flag(&b) == Some(true)),
        OpCode::Or => Datum::Boolean(flag(&a).unwrap_or(false) || flag(&b).unwrap_or(false)),
        // Unary; the caller pops a single operand for it.
        OpCode::Not => Datum::Boolean(!b.as_ref().is_some_and(Datum::to_bool)),
        OpCode::Add => Datum::Number(x.unwrap_or(0.0) + y.unwrap_or(0.0)),
        OpCode::Subtract => Datum::Number(x.unwrap_or(0.0) - y.unwrap_or(0.0)),
        OpCode::Multiply => Datum::Number(x.unwrap_or(1.0) * y.unwrap_or(1.0)),
        OpCode::Divide => Datum::Number(x.unwrap_or(1.0) / y.unwrap_or(1.0)),
        OpCode::Modulo => match (x, y) {
            (None, _) => Datum::Number(0.0),
            (Some(x), None) => Datum::Number(x),
            (Some(x), Some(y)) => Datum::Number(x % y),
        },
        OpCode::Minimum => Datum::Number(either(x, y, f64::min)),
        OpCode::Maximum => Datum::Number(either(x, y, f64::max)),
        // Missing sorts below every number.
        OpCode::LessThan => Datum::Boolean(compare(x, y, true, |x, y| x < y)),
        OpCode::LessThanOrEquals => Datum::Boolean(compare(x, y, true, |x, y| x <= y)),
        OpCode::GreaterThan => Datum::Boolean(compare(x, y, false, |x, y| x > y)),
        OpCode::GreaterThanOrEquals => Datum::Boolean(compare(x, y, false, |x, y| x >= y)),
    }
}

fn either(x: Option<f64>, y: Option<f64>, pick: fn(f64, f64) -> f64) -> f64 {
    match (x, y) {
        (None, None) => 0.0,
        (Some(v), None) | (None, Some(v)) => v,
        (Some(x), Some(y)) => pick(x, y),
    }
}

/// `left_missing` is the result when the left operand is absent; an absent
/// right operand yields its negation.
fn compare(x: Option<f64>, y: Option<f64>, left_missing: bool, cmp: fn(f64, f64) -> bool) -> bool {
    match (x, y) {
        (None, _) => left_missing,
        (Some(_), None) => !left_missing,
        (Some(x), Some(y)) => cmp(x, y),
    }
}
