//! Expression tree.

use std::fmt;

use kubeql_core::value::Value;
use regex::Regex;

use crate::TslError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    Len,
    Any,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    Regex,
    Like,
    ILike,
}

/// A string pattern compiled once at parse time.
#[derive(Debug, Clone)]
pub struct Pattern {
    pub kind: PatternKind,
    pub source: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(kind: PatternKind, source: &str) -> Result<Self, TslError> {
        let expr = match kind {
            PatternKind::Regex => source.to_string(),
            PatternKind::Like => format!("(?s)^{}$", like_to_regex(source)),
            PatternKind::ILike => format!("(?is)^{}$", like_to_regex(source)),
        };
        let regex = Regex::new(&expr)
            .map_err(|e| TslError::InvalidPattern { pattern: source.to_string(), reason: e.to_string() })?;
        Ok(Self { kind, source: source.to_string(), regex })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.source == other.source
    }
}

/// `%` is any run, `_` any one character; everything else is literal.
fn like_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut buf = [0u8; 4];
    for c in pattern.chars() {
        match c {
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            c => out.push_str(&regex::escape(c.encode_utf8(&mut buf))),
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Null,
    Ident(String),
    List(Vec<Expr>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare { op: CmpOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Match { lhs: Box<Expr>, pattern: Pattern, negated: bool },
    In { lhs: Box<Expr>, set: Box<Expr>, negated: bool },
    Between { operand: Box<Expr>, low: Box<Expr>, high: Box<Expr>, negated: bool },
    IsNull { operand: Box<Expr>, negated: bool },
    Call { func: Func, arg: Box<Expr> },
}

impl Expr {
    /// Every identifier referenced, in first-seen order, without duplicates.
    pub fn identifiers(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_identifiers(&mut out);
        out
    }

    fn collect_identifiers<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Ident(name) => {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
            Expr::Literal(_) | Expr::Null => {}
            Expr::List(items) => items.iter().for_each(|e| e.collect_identifiers(out)),
            Expr::Not(e) | Expr::Call { arg: e, .. } | Expr::IsNull { operand: e, .. } | Expr::Match { lhs: e, .. } => {
                e.collect_identifiers(out)
            }
            Expr::And(a, b) | Expr::Or(a, b) | Expr::Compare { lhs: a, rhs: b, .. } | Expr::In { lhs: a, set: b, .. } => {
                a.collect_identifiers(out);
                b.collect_identifiers(out);
            }
            Expr::Between { operand, low, high, .. } => {
                operand.collect_identifiers(out);
                low.collect_identifiers(out);
                high.collect_identifiers(out);
            }
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        })
    }
}

impl fmt::Display for Func {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Func::Len => "len",
            Func::Any => "any",
            Func::All => "all",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_patterns() {
        let p = Pattern::new(PatternKind::Like, "web-%").unwrap();
        assert!(p.is_match("web-1"));
        assert!(!p.is_match("api-web-1"));
        let p = Pattern::new(PatternKind::Like, "a_c.d").unwrap();
        assert!(p.is_match("abc.d"));
        assert!(!p.is_match("abcxd"));
        let p = Pattern::new(PatternKind::ILike, "WEB%").unwrap();
        assert!(p.is_match("web-1"));
    }

    #[test]
    fn regex_is_unanchored() {
        let p = Pattern::new(PatternKind::Regex, "nginx.*").unwrap();
        assert!(p.is_match("docker.io/nginx:1.25"));
        assert!(Pattern::new(PatternKind::Regex, "(").is_err());
    }
}
