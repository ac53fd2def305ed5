//! Canonical paths: tokenizer, validation and canonical rendering.
//!
//! Grammar, per dot-separated segment: `key`, `key[0]`, `key[*]`, `key[name]`,
//! `key["dotted.name"]`, chains of subscripts (`a[0][1]`), or a bare number which
//! is a legacy 1-based list position (`addresses.1.address`).

use std::fmt;

use smallvec::SmallVec;

const INVALID_KEY_CHARS: &[char] = &[
    ' ', '\t', '\n', '\r', '{', '}', '(', ')', '\'', '+', '*', '/', '%', '&', '|', '^', '!', '=', '<', '>', ',', ';',
    ':', '`', '"',
];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Step {
    /// Field lookup in a mapping.
    Key(String),
    /// Bracketed, 0-based list index.
    Index(usize),
    /// Bare numeric segment: 1-based list position, or a key when applied to a mapping.
    Nth(usize),
    /// Bracketed mapping key, may contain dots.
    MapKey(String),
    /// `[*]`: fan out over every list element.
    Wildcard,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PathError {
    #[error("path cannot be empty")]
    Empty,
    #[error("invalid path {path:?}: empty segment")]
    EmptySegment { path: String },
    #[error("invalid path {path:?}: unbalanced brackets")]
    Unbalanced { path: String },
    #[error("invalid path {path:?}: invalid character {ch:?} in {segment:?}")]
    InvalidChar { path: String, segment: String, ch: char },
    #[error("invalid path {path:?}: empty subscript")]
    EmptySubscript { path: String },
    #[error("invalid path {path:?}: unexpected {rest:?} after subscript")]
    TrailingText { path: String, rest: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CanonicalPath {
    steps: SmallVec<[Step; 6]>,
}

impl CanonicalPath {
    pub fn parse(path: &str) -> Result<Self, PathError> {
        let path = path.trim();
        if path.is_empty() {
            return Err(PathError::Empty);
        }
        let mut steps = SmallVec::new();
        for segment in split_top_level(path, '.').ok_or_else(|| PathError::Unbalanced { path: path.to_string() })? {
            parse_segment(path, segment, &mut steps)?;
        }
        Ok(Self { steps })
    }

    pub fn from_steps(steps: impl IntoIterator<Item = Step>) -> Self {
        Self { steps: steps.into_iter().collect() }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// True for `metadata.labels.<key>` and `metadata.annotations.<key>`.
    pub fn is_metadata_map_entry(&self) -> bool {
        match self.steps.as_slice() {
            [Step::Key(m), Step::Key(map), Step::Key(_) | Step::MapKey(_)] => {
                m == "metadata" && (map == "labels" || map == "annotations")
            }
            _ => false,
        }
    }
}

/// Split on `sep` outside of brackets and quotes. `None` on unbalanced brackets.
pub fn split_top_level(s: &str, sep: char) -> Option<Vec<&str>> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' if depth > 0 => quote = Some(c),
            '[' => depth += 1,
            ']' => depth = depth.checked_sub(1)?,
            c if c == sep && depth == 0 => {
                out.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    if depth != 0 || quote.is_some() {
        return None;
    }
    out.push(&s[start..]);
    Some(out)
}

fn parse_segment(path: &str, segment: &str, steps: &mut SmallVec<[Step; 6]>) -> Result<(), PathError> {
    let (base, mut subs) = match segment.find('[') {
        Some(at) => segment.split_at(at),
        None => (segment, ""),
    };
    if base.is_empty() {
        return Err(PathError::EmptySegment { path: path.to_string() });
    }
    if let Some(ch) = base.chars().find(|c| INVALID_KEY_CHARS.contains(c) || *c == ']') {
        return Err(PathError::InvalidChar { path: path.to_string(), segment: segment.to_string(), ch });
    }
    match base.parse::<usize>() {
        Ok(n) if base.bytes().all(|b| b.is_ascii_digit()) => steps.push(Step::Nth(n)),
        _ => steps.push(Step::Key(base.to_string())),
    }
    while !subs.is_empty() {
        let Some(inner_and_rest) = subs.strip_prefix('[') else {
            return Err(PathError::TrailingText { path: path.to_string(), rest: subs.to_string() });
        };
        let close = closing_bracket(inner_and_rest).ok_or_else(|| PathError::Unbalanced { path: path.to_string() })?;
        let inner = inner_and_rest[..close].trim();
        subs = &inner_and_rest[close + 1..];
        steps.push(parse_subscript(path, inner)?);
    }
    Ok(())
}

fn closing_bracket(s: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in s.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, ']') => return Some(i),
            (None, '[') => return None,
            _ => {}
        }
    }
    None
}

fn parse_subscript(path: &str, inner: &str) -> Result<Step, PathError> {
    if inner.is_empty() {
        return Err(PathError::EmptySubscript { path: path.to_string() });
    }
    if inner == "*" {
        return Ok(Step::Wildcard);
    }
    if inner.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(n) = inner.parse::<usize>() {
            return Ok(Step::Index(n));
        }
    }
    let unquoted = strip_quotes(inner);
    if unquoted.is_empty() {
        return Err(PathError::EmptySubscript { path: path.to_string() });
    }
    Ok(Step::MapKey(unquoted.to_string()))
}

fn strip_quotes(s: &str) -> &str {
    for q in ['"', '\''] {
        if let Some(inner) = s.strip_prefix(q).and_then(|r| r.strip_suffix(q)) {
            return inner;
        }
    }
    s
}

fn is_plain_key(k: &str) -> bool {
    !k.is_empty()
        && !k.bytes().all(|b| b.is_ascii_digit())
        && k.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl fmt::Display for CanonicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            match step {
                Step::Key(k) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(k)?;
                }
                Step::Nth(n) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    write!(f, "{}", n)?;
                }
                Step::Index(n) => write!(f, "[{}]", n)?,
                Step::Wildcard => f.write_str("[*]")?,
                Step::MapKey(k) if is_plain_key(k) => write!(f, "[{}]", k)?,
                Step::MapKey(k) if k.contains('"') => write!(f, "['{}']", k)?,
                Step::MapKey(k) => write!(f, "[\"{}\"]", k)?,
            }
        }
        Ok(())
    }
}
