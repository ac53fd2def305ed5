//! Surface parser: splits a query into clauses and validates each one.

use kubeql_core::aliases::{split_call, AliasTable};
use kubeql_core::path::{split_top_level, CanonicalPath};
use kubeql_core::reduce::Reducer;

use crate::options::{FromClause, OrderItem, QueryOptions, SelectItem};
use crate::QueryError;

const K8S_NAME_MAX: usize = 63;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Clause {
    Select,
    From,
    Where,
    OrderBy,
    Limit,
}

impl Clause {
    fn keyword(self) -> &'static str {
        match self {
            Clause::Select => "SELECT",
            Clause::From => "FROM",
            Clause::Where => "WHERE",
            Clause::OrderBy => "ORDER BY",
            Clause::Limit => "LIMIT",
        }
    }
}

/// A whitespace-separated word outside quotes, parentheses and brackets.
#[derive(Debug, Clone, Copy)]
struct Word<'a> {
    start: usize,
    end: usize,
    text: &'a str,
}

fn words(s: &str) -> Result<Vec<Word<'_>>, QueryError> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start: Option<usize> = None;
    for (i, c) in s.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            c if c.is_whitespace() && depth == 0 => {
                if let Some(st) = start.take() {
                    out.push(Word { start: st, end: i, text: &s[st..i] });
                }
                continue;
            }
            '\'' | '"' => quote = Some(c),
            '(' | '[' => depth += 1,
            ')' | ']' => {
                depth -= 1;
                if depth < 0 {
                    return Err(syntax(format!("unbalanced {:?} at offset {}", c, i)));
                }
            }
            _ => {}
        }
        start.get_or_insert(i);
    }
    if quote.is_some() {
        return Err(syntax("unterminated string literal"));
    }
    if depth != 0 {
        return Err(syntax("unbalanced parentheses or brackets"));
    }
    if let Some(st) = start {
        out.push(Word { start: st, end: s.len(), text: &s[st..] });
    }
    Ok(out)
}

fn syntax(msg: impl Into<String>) -> QueryError {
    QueryError::Syntax(msg.into())
}

/// Parse a query string. Field names are resolved through `aliases`; nothing
/// here touches the network.
pub fn parse_query(src: &str, aliases: &AliasTable) -> Result<QueryOptions, QueryError> {
    let src = src.trim();
    if src.is_empty() {
        return Err(syntax("empty query"));
    }
    let ws = words(src)?;

    // (clause, keyword start, body start)
    let mut found: Vec<(Clause, usize, usize)> = Vec::new();
    let mut i = 0;
    while i < ws.len() {
        let w = ws[i].text;
        let hit = if w.eq_ignore_ascii_case("select") {
            Some((Clause::Select, ws[i].end))
        } else if w.eq_ignore_ascii_case("from") {
            Some((Clause::From, ws[i].end))
        } else if w.eq_ignore_ascii_case("where") {
            Some((Clause::Where, ws[i].end))
        } else if w.eq_ignore_ascii_case("limit") {
            Some((Clause::Limit, ws[i].end))
        } else if w.eq_ignore_ascii_case("order") && ws.get(i + 1).is_some_and(|n| n.text.eq_ignore_ascii_case("by")) {
            i += 1;
            Some((Clause::OrderBy, ws[i].end))
        } else {
            None
        };
        if let Some((clause, body)) = hit {
            if let Some(&(last, _, _)) = found.last() {
                if clause <= last {
                    return Err(syntax(format!("unexpected clause position: {} after {}", clause.keyword(), last.keyword())));
                }
            }
            let start = if clause == Clause::OrderBy { ws[i - 1].start } else { ws[i].start };
            found.push((clause, start, body));
        }
        i += 1;
    }

    let Some(&(_, first_start, _)) = found.first() else {
        return Err(syntax(format!("expected SELECT or FROM in {:?}", src)));
    };
    if first_start > 0 {
        return Err(syntax(format!("unexpected text before {}: {:?}", found[0].0.keyword(), src[..first_start].trim())));
    }

    let mut opts = QueryOptions::default();
    let mut select_body: Option<&str> = None;
    let mut order_body: Option<&str> = None;
    for (n, &(clause, _, body_start)) in found.iter().enumerate() {
        let body_end = found.get(n + 1).map(|&(_, s, _)| s).unwrap_or(src.len());
        let body = src[body_start..body_end].trim();
        match clause {
            Clause::Select => select_body = Some(body),
            Clause::From => opts.from = parse_from(body)?,
            Clause::Where => {
                if body.is_empty() {
                    return Err(syntax("WHERE clause cannot be empty"));
                }
                opts.filter = Some(body.to_string());
            }
            Clause::OrderBy => order_body = Some(body),
            Clause::Limit => opts.limit = Some(parse_limit(body)?),
        }
    }
    if !found.iter().any(|(c, _, _)| *c == Clause::From) {
        return Err(syntax("missing FROM clause"));
    }

    match select_body {
        Some(body) => {
            let (select, star) = parse_select(body, aliases)?;
            opts.select = select;
            opts.select_all = star;
        }
        None => opts.select_all = true,
    }
    if let Some(body) = order_body {
        opts.order_by = parse_order_by(body, &opts.select, aliases)?;
    }
    Ok(opts)
}

fn parse_select(body: &str, aliases: &AliasTable) -> Result<(Vec<SelectItem>, bool), QueryError> {
    if body.is_empty() {
        return Err(syntax("SELECT requires at least one field"));
    }
    let raw = split_top_level(body, ',').ok_or_else(|| syntax(format!("unbalanced brackets in SELECT {:?}", body)))?;
    let mut items: Vec<SelectItem> = Vec::with_capacity(raw.len());
    for (pos, raw) in raw.iter().map(|s| s.trim()).enumerate() {
        if raw.is_empty() {
            return Err(syntax(format!("select field at position {} cannot be empty", pos + 1)));
        }
        if raw == "*" {
            if body.trim() != "*" {
                return Err(syntax("'*' cannot be combined with other select fields"));
            }
            return Ok((Vec::new(), true));
        }
        let item = parse_select_item(raw, aliases)?;
        if items.iter().any(|i| i.alias == item.alias) {
            return Err(syntax(format!("duplicate column name {:?}", item.alias)));
        }
        items.push(item);
    }
    Ok((items, false))
}

// `expr`, `expr AS alias`
fn parse_select_item(raw: &str, aliases: &AliasTable) -> Result<SelectItem, QueryError> {
    let ws = words(raw)?;
    let as_at = ws.iter().rposition(|w| w.text.eq_ignore_ascii_case("as"));
    let (expr, alias) = match as_at {
        Some(0) => return Err(syntax(format!("missing field before AS in {:?}", raw))),
        Some(at) => {
            let alias = raw[ws[at].end..].trim();
            if !valid_alias(alias) {
                return Err(syntax(format!(
                    "invalid alias {:?}: must contain only alphanumeric characters and underscores",
                    alias
                )));
            }
            (raw[..ws[at].start].trim(), Some(alias))
        }
        None => (raw, None),
    };
    let (field, reducer, display) = parse_field_expr(expr, aliases)?;
    Ok(match alias {
        Some(alias) => SelectItem { field, alias: alias.to_string(), reducer, explicit: true },
        None => SelectItem::implicit(field, reducer, &display),
    })
}

/// `field`, `reducer(field)` or `reducer field`, resolved to a canonical path.
///
/// Also returns the normalized source text used for synthesized aliases.
pub(crate) fn parse_field_expr(expr: &str, aliases: &AliasTable) -> Result<(CanonicalPath, Reducer, String), QueryError> {
    let expr = expr.trim();
    if expr.matches('(').count() != expr.matches(')').count() {
        return Err(syntax(format!("unbalanced parentheses in {:?}", expr)));
    }
    let (reducer, inner) = match split_call(expr) {
        Some((name, inner)) => (reducer_named(name)?, inner.trim()),
        None => match expr.split_once(char::is_whitespace) {
            Some((name, rest)) if name.parse::<Reducer>().is_ok() => (reducer_named(name)?, rest.trim()),
            _ => (Reducer::None, expr),
        },
    };
    if inner.is_empty() {
        return Err(syntax(format!("missing field in {:?}", expr)));
    }
    let resolved = aliases.resolve(inner);
    // An alias may itself expand to a reducer call.
    let (reducer, path_text) = match split_call(&resolved) {
        Some((name, p)) if reducer.is_none() => (reducer_named(name)?, p.to_string()),
        _ => (reducer, resolved.clone()),
    };
    let field = CanonicalPath::parse(&path_text).map_err(|e| syntax(format!("invalid field {:?}: {}", inner, e)))?;
    let display = if reducer.is_none() { inner.to_string() } else { format!("{}({})", reducer, inner) };
    Ok((field, reducer, display))
}

fn reducer_named(name: &str) -> Result<Reducer, QueryError> {
    match name.parse::<Reducer>() {
        Ok(r) if !r.is_none() => Ok(r),
        _ => Err(QueryError::UnknownReducer(name.to_string())),
    }
}

fn valid_alias(alias: &str) -> bool {
    !alias.is_empty() && alias.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_from(body: &str) -> Result<FromClause, QueryError> {
    if body.is_empty() {
        return Err(syntax("FROM clause requires a resource name"));
    }
    let from = match body.split_once('/') {
        Some(("*", name)) => FromClause { name: name.to_string(), namespace: None, all_namespaces: true },
        Some((ns, name)) => {
            validate_k8s_name(ns, "namespace")?;
            FromClause { name: name.to_string(), namespace: Some(ns.to_string()), all_namespaces: false }
        }
        None => FromClause { name: body.to_string(), namespace: None, all_namespaces: false },
    };
    validate_k8s_name(&from.name, "resource")?;
    Ok(from)
}

/// Lowercase DNS-1123 subdomain, at most 63 characters.
fn validate_k8s_name(name: &str, what: &str) -> Result<(), QueryError> {
    if name.is_empty() {
        return Err(syntax(format!("{} name cannot be empty", what)));
    }
    if name.len() > K8S_NAME_MAX {
        return Err(syntax(format!("{} name {:?} is too long (maximum {} characters)", what, name, K8S_NAME_MAX)));
    }
    let label_ok = |l: &str| {
        let b = l.as_bytes();
        let alnum = |c: &u8| c.is_ascii_lowercase() || c.is_ascii_digit();
        !b.is_empty()
            && b.first().is_some_and(alnum)
            && b.last().is_some_and(alnum)
            && b.iter().all(|c| alnum(c) || *c == b'-')
    };
    if !name.split('.').all(label_ok) {
        return Err(syntax(format!(
            "{} name {:?} is invalid: must consist of lowercase alphanumeric characters, '-' or '.', and must start and end with an alphanumeric character",
            what, name
        )));
    }
    Ok(())
}

fn parse_limit(body: &str) -> Result<usize, QueryError> {
    body.parse::<usize>()
        .map_err(|_| syntax(format!("invalid LIMIT value {:?}: must be a non-negative integer", body)))
}

fn parse_order_by(body: &str, select: &[SelectItem], aliases: &AliasTable) -> Result<Vec<OrderItem>, QueryError> {
    if body.is_empty() {
        return Err(syntax("ORDER BY clause cannot be empty"));
    }
    let raw = split_top_level(body, ',').ok_or_else(|| syntax(format!("unbalanced brackets in ORDER BY {:?}", body)))?;
    let mut out = Vec::with_capacity(raw.len());
    for raw in raw.iter().map(|s| s.trim()) {
        let ws = words(raw)?;
        let (text, descending) = match ws.last() {
            None => return Err(syntax("ORDER BY item cannot be empty")),
            Some(last) if last.text.eq_ignore_ascii_case("desc") => (raw[..last.start].trim(), true),
            Some(last) if last.text.eq_ignore_ascii_case("asc") => (raw[..last.start].trim(), false),
            Some(_) => (raw, false),
        };
        if text.is_empty() {
            return Err(syntax(format!("ORDER BY item {:?} has no field", raw)));
        }
        out.push(OrderItem { select_ref: order_ref(text, select, aliases)?, descending });
    }
    Ok(out)
}

// Alias first, then the same resolved field and reducer, else an ordering-only item.
fn order_ref(text: &str, select: &[SelectItem], aliases: &AliasTable) -> Result<SelectItem, QueryError> {
    if let Some(item) = select.iter().find(|i| i.alias == text) {
        return Ok(item.clone());
    }
    let (field, reducer, display) = parse_field_expr(text, aliases)?;
    let implicit = SelectItem::implicit(field, reducer, &display);
    Ok(select.iter().find(|i| i.same_source(&implicit)).cloned().unwrap_or(implicit))
}
