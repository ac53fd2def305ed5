//! Recursive-descent parser: `or` < `and` < `not` < predicate < operand.

use kubeql_core::scalar::parse_scalar;
use kubeql_core::value::Value;

use crate::ast::{CmpOp, Expr, Func, Pattern, PatternKind};
use crate::lexer::{tokenize, Tok, Token};
use crate::TslError;

const KEYWORDS: &[&str] = &["and", "or", "not", "like", "ilike", "in", "is", "null", "between", "true", "false"];

pub fn parse(src: &str) -> Result<Expr, TslError> {
    let tokens = tokenize(src)?;
    if tokens.is_empty() {
        return Err(TslError::Empty);
    }
    let mut p = Parser { tokens, at: 0 };
    let expr = p.or()?;
    match p.peek() {
        None => Ok(expr),
        Some(t) => Err(p.unexpected(t.clone(), "end of expression")),
    }
}

struct Parser {
    tokens: Vec<Token>,
    at: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.at)
    }

    fn peek_tok(&self) -> Option<&Tok> {
        self.peek().map(|t| &t.tok)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.at).cloned();
        if t.is_some() {
            self.at += 1;
        }
        t
    }

    fn unexpected(&self, t: Token, expected: &'static str) -> TslError {
        let found = match t.tok {
            Tok::Word(w) => w,
            Tok::Str(s) => format!("'{}'", s),
            other => format!("{:?}", other),
        };
        TslError::UnexpectedToken { pos: t.pos, found, expected }
    }

    fn expect(&mut self, want: Tok, expected: &'static str) -> Result<(), TslError> {
        match self.next() {
            Some(t) if t.tok == want => Ok(()),
            Some(t) => Err(self.unexpected(t, expected)),
            None => Err(TslError::UnexpectedEnd { expected }),
        }
    }

    fn at_keyword(&self, kw: &str) -> bool {
        matches!(self.peek_tok(), Some(Tok::Word(w)) if w.eq_ignore_ascii_case(kw))
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if self.at_keyword(kw) {
            self.at += 1;
            true
        } else {
            false
        }
    }

    fn or(&mut self) -> Result<Expr, TslError> {
        let mut lhs = self.and()?;
        while self.eat_keyword("or") || self.eat_tok(&Tok::OrOr) {
            let rhs = self.and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr, TslError> {
        let mut lhs = self.not()?;
        while self.eat_keyword("and") || self.eat_tok(&Tok::AndAnd) {
            let rhs = self.not()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn eat_tok(&mut self, tok: &Tok) -> bool {
        if self.peek_tok() == Some(tok) {
            self.at += 1;
            true
        } else {
            false
        }
    }

    fn not(&mut self) -> Result<Expr, TslError> {
        if self.eat_keyword("not") || self.eat_tok(&Tok::Bang) {
            return Ok(Expr::Not(Box::new(self.not()?)));
        }
        self.predicate()
    }

    fn predicate(&mut self) -> Result<Expr, TslError> {
        let lhs = self.operand()?;
        let op = match self.peek_tok() {
            Some(Tok::Eq) => Some(CmpOp::Eq),
            Some(Tok::Ne) => Some(CmpOp::Ne),
            Some(Tok::Lt) => Some(CmpOp::Lt),
            Some(Tok::Le) => Some(CmpOp::Le),
            Some(Tok::Gt) => Some(CmpOp::Gt),
            Some(Tok::Ge) => Some(CmpOp::Ge),
            _ => None,
        };
        if let Some(op) = op {
            self.at += 1;
            let rhs = self.operand()?;
            return Ok(Expr::Compare { op, lhs: Box::new(lhs), rhs: Box::new(rhs) });
        }
        if self.eat_tok(&Tok::RegexMatch) {
            return self.pattern(lhs, PatternKind::Regex, false);
        }
        if self.eat_tok(&Tok::RegexNotMatch) {
            return self.pattern(lhs, PatternKind::Regex, true);
        }
        if self.eat_keyword("is") {
            let negated = self.eat_keyword("not");
            if !self.eat_keyword("null") {
                return Err(self.unexpected_here("null"));
            }
            return Ok(Expr::IsNull { operand: Box::new(lhs), negated });
        }
        let negated = self.eat_keyword("not");
        if self.eat_keyword("like") {
            return self.pattern(lhs, PatternKind::Like, negated);
        }
        if self.eat_keyword("ilike") {
            return self.pattern(lhs, PatternKind::ILike, negated);
        }
        if self.eat_keyword("in") {
            let set = self.set()?;
            return Ok(Expr::In { lhs: Box::new(lhs), set: Box::new(set), negated });
        }
        if self.eat_keyword("between") {
            let low = self.operand()?;
            if !self.eat_keyword("and") {
                return Err(self.unexpected_here("and"));
            }
            let high = self.operand()?;
            return Ok(Expr::Between { operand: Box::new(lhs), low: Box::new(low), high: Box::new(high), negated });
        }
        if negated {
            return Err(self.unexpected_here("like, ilike, in or between"));
        }
        Ok(lhs)
    }

    fn unexpected_here(&self, expected: &'static str) -> TslError {
        match self.peek() {
            Some(t) => self.unexpected(t.clone(), expected),
            None => TslError::UnexpectedEnd { expected },
        }
    }

    fn pattern(&mut self, lhs: Expr, kind: PatternKind, negated: bool) -> Result<Expr, TslError> {
        match self.next() {
            Some(Token { tok: Tok::Str(s), .. }) => {
                let pattern = Pattern::new(kind, &s)?;
                Ok(Expr::Match { lhs: Box::new(lhs), pattern, negated })
            }
            Some(t) => Err(self.unexpected(t, "a quoted pattern")),
            None => Err(TslError::UnexpectedEnd { expected: "a quoted pattern" }),
        }
    }

    // `[a, b]`, `(a, b)` or an operand that evaluates to a list.
    fn set(&mut self) -> Result<Expr, TslError> {
        match self.peek_tok() {
            Some(Tok::LBracket) => {
                self.at += 1;
                self.list_items(Tok::RBracket)
            }
            Some(Tok::LParen) => {
                self.at += 1;
                self.list_items(Tok::RParen)
            }
            _ => self.operand(),
        }
    }

    fn list_items(&mut self, close: Tok) -> Result<Expr, TslError> {
        let mut items = Vec::new();
        if self.eat_tok(&close) {
            return Ok(Expr::List(items));
        }
        loop {
            items.push(self.operand()?);
            if self.eat_tok(&Tok::Comma) {
                continue;
            }
            self.expect(close.clone(), "',' or closing bracket")?;
            return Ok(Expr::List(items));
        }
    }

    fn operand(&mut self) -> Result<Expr, TslError> {
        let Some(t) = self.next() else {
            return Err(TslError::UnexpectedEnd { expected: "an operand" });
        };
        match t.tok {
            Tok::LParen => {
                let inner = self.or()?;
                self.expect(Tok::RParen, "')'")?;
                Ok(inner)
            }
            Tok::LBracket => self.list_items(Tok::RBracket),
            Tok::Str(s) => Ok(Expr::Literal(Value::Str(s))),
            Tok::Word(w) => self.word(w, t.pos),
            other => Err(self.unexpected(Token { tok: other, pos: t.pos }, "an operand")),
        }
    }

    fn word(&mut self, w: String, pos: usize) -> Result<Expr, TslError> {
        let lower = w.to_ascii_lowercase();
        if self.peek_tok() == Some(&Tok::LParen) {
            let func = match lower.as_str() {
                "len" => Some(Func::Len),
                "any" => Some(Func::Any),
                "all" => Some(Func::All),
                _ => None,
            };
            if let Some(func) = func {
                self.at += 1;
                let arg = self.or()?;
                self.expect(Tok::RParen, "')'")?;
                return Ok(Expr::Call { func, arg: Box::new(arg) });
            }
            return Err(TslError::UnknownFunction { pos, name: w });
        }
        match lower.as_str() {
            "true" => return Ok(Expr::Literal(Value::Bool(true))),
            "false" => return Ok(Expr::Literal(Value::Bool(false))),
            "null" => return Ok(Expr::Null),
            kw if KEYWORDS.contains(&kw) => {
                return Err(TslError::UnexpectedToken { pos, found: w, expected: "an operand" });
            }
            _ => {}
        }
        if starts_numeric(&w) {
            return match parse_scalar(&w) {
                Value::Str(_) => Err(TslError::InvalidNumber { pos, text: w }),
                v => Ok(Expr::Literal(v)),
            };
        }
        Ok(Expr::Ident(w))
    }
}

fn starts_numeric(w: &str) -> bool {
    let mut chars = w.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('-' | '+' | '.') => chars.next().is_some_and(|c| c.is_ascii_digit()),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(s: &str) -> Box<Expr> {
        Box::new(Expr::Ident(s.to_string()))
    }

    fn lit(v: Value) -> Box<Expr> {
        Box::new(Expr::Literal(v))
    }

    #[test]
    fn precedence_and_over_or() {
        let e = parse("a = 1 or b = 2 and c = 3").unwrap();
        let Expr::Or(_, rhs) = e else { panic!("expected or at the root") };
        assert!(matches!(*rhs, Expr::And(_, _)));
    }

    #[test]
    fn comparisons_with_typed_literals() {
        assert_eq!(
            parse("spec.containers[0].resources.requests.memory <= 200Mi").unwrap(),
            Expr::Compare {
                op: CmpOp::Le,
                lhs: ident("spec.containers[0].resources.requests.memory"),
                rhs: lit(Value::Int(200 * 1024 * 1024)),
            }
        );
        assert!(matches!(parse("created > 2024-01-01").unwrap(), Expr::Compare { op: CmpOp::Gt, .. }));
    }

    #[test]
    fn in_forms() {
        let e = parse("name not in ('a', 'b')").unwrap();
        assert!(matches!(e, Expr::In { negated: true, .. }));
        let e = parse("'x' in spec.containers[*].name").unwrap();
        let Expr::In { set, .. } = e else { panic!("expected in") };
        assert_eq!(*set, Expr::Ident("spec.containers[*].name".into()));
    }

    #[test]
    fn functions_and_null_checks() {
        assert!(matches!(parse("any(spec.containers[*].image ~= 'nginx')").unwrap(), Expr::Call { func: Func::Any, .. }));
        assert!(matches!(parse("len(spec.containers) > 1").unwrap(), Expr::Compare { .. }));
        assert!(matches!(parse("deleted is not null").unwrap(), Expr::IsNull { negated: true, .. }));
        assert!(matches!(parse("NOT phase = 'Running'").unwrap(), Expr::Not(_)));
        assert!(matches!(parse("replicas between 1 and 3").unwrap(), Expr::Between { negated: false, .. }));
    }

    #[test]
    fn identifiers_are_collected_once() {
        let e = parse("a = 1 and (b = 2 or a = 3) and len(c) > 0").unwrap();
        assert_eq!(e.identifiers(), vec!["a", "b", "c"]);
    }

    #[test]
    fn errors_point_at_the_problem() {
        assert_eq!(parse(""), Err(TslError::Empty));
        assert!(matches!(parse("a ="), Err(TslError::UnexpectedEnd { .. })));
        assert!(matches!(parse("a = 1 b"), Err(TslError::UnexpectedToken { .. })));
        assert!(matches!(parse("count(a) > 1"), Err(TslError::UnknownFunction { .. })));
        assert!(matches!(parse("a like b"), Err(TslError::UnexpectedToken { .. })));
        assert!(matches!(parse("a ~= '('"), Err(TslError::InvalidPattern { .. })));
        assert!(matches!(parse("a = 5x"), Err(TslError::InvalidNumber { .. })));
        assert!(matches!(parse("(a = 1"), Err(TslError::UnexpectedEnd { .. })));
    }
}
