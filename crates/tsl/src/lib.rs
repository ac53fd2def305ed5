//! Tree-search predicates: the boolean language behind `WHERE`.
//!
//! Text is tokenized and parsed once into an [`ast::Expr`]; regex and `like`
//! patterns are compiled at that point. Evaluation asks a [`Lookup`] for each
//! identifier and never touches the source text again.

#![forbid(unsafe_code)]

use kubeql_core::value::Value;

pub mod ast;
mod eval;
pub mod lexer;
pub mod parser;

pub use eval::{truthy, EvalError, Lookup};

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum TslError {
    #[error("empty expression")]
    Empty,
    #[error("unexpected character {ch:?} at {pos}")]
    UnexpectedChar { pos: usize, ch: char },
    #[error("unterminated string starting at {pos}")]
    UnterminatedString { pos: usize },
    #[error("unbalanced '[' at {pos}")]
    UnbalancedBracket { pos: usize },
    #[error("unexpected {found} at {pos}, expected {expected}")]
    UnexpectedToken { pos: usize, found: String, expected: &'static str },
    #[error("unexpected end of expression, expected {expected}")]
    UnexpectedEnd { expected: &'static str },
    #[error("invalid number {text:?} at {pos}")]
    InvalidNumber { pos: usize, text: String },
    #[error("invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("unknown function {name:?} at {pos}")]
    UnknownFunction { pos: usize, name: String },
}

/// A parsed predicate, ready to be evaluated against many documents.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    expr: ast::Expr,
    source: String,
}

impl Predicate {
    pub fn parse(src: &str) -> Result<Self, TslError> {
        let expr = parser::parse(src)?;
        tracing::trace!(src, idents = expr.identifiers().len(), "predicate parsed");
        Ok(Self { expr, source: src.to_string() })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &ast::Expr {
        &self.expr
    }

    /// Identifiers referenced by the predicate, first-seen order.
    pub fn identifiers(&self) -> Vec<&str> {
        self.expr.identifiers()
    }

    /// Evaluate to a single boolean. A non-boolean result is an error.
    pub fn matches(&self, env: &dyn Lookup) -> Result<bool, EvalError> {
        truthy(self.expr.eval(env)?)
    }

    /// Raw result, for callers that want the broadcast list itself.
    pub fn evaluate(&self, env: &dyn Lookup) -> Result<Option<Value>, EvalError> {
        self.expr.eval(env)
    }
}
