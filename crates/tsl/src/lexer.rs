//! Tokenizer for predicate text.

use crate::TslError;

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    RegexMatch,
    RegexNotMatch,
    Bang,
    AndAnd,
    OrOr,
    Str(String),
    /// Identifier, keyword, number, quantity or date: classified by the parser.
    Word(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub pos: usize,
}

const WORD_STOP: &[char] = &['(', ')', ',', '=', '!', '<', '>', '~', '&', '|', '\'', '"'];

pub fn tokenize(src: &str) -> Result<Vec<Token>, TslError> {
    let chars: Vec<(usize, char)> = src.char_indices().collect();
    let mut out = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let (pos, c) = chars[i];
        let next = chars.get(i + 1).map(|(_, c)| *c);
        let two = |tok: Tok| (tok, 2usize);
        let one = |tok: Tok| (tok, 1usize);
        let (tok, width) = match (c, next) {
            (c, _) if c.is_whitespace() => {
                i += 1;
                continue;
            }
            ('(', _) => one(Tok::LParen),
            (')', _) => one(Tok::RParen),
            ('[', _) => one(Tok::LBracket),
            (']', _) => one(Tok::RBracket),
            (',', _) => one(Tok::Comma),
            ('~', Some('=')) => two(Tok::RegexMatch),
            ('~', Some('!')) => two(Tok::RegexNotMatch),
            ('!', Some('=')) => two(Tok::Ne),
            ('<', Some('>')) => two(Tok::Ne),
            ('<', Some('=')) => two(Tok::Le),
            ('>', Some('=')) => two(Tok::Ge),
            ('=', Some('=')) => two(Tok::Eq),
            ('=', _) => one(Tok::Eq),
            ('<', _) => one(Tok::Lt),
            ('>', _) => one(Tok::Gt),
            ('!', _) => one(Tok::Bang),
            ('&', Some('&')) => two(Tok::AndAnd),
            ('|', Some('|')) => two(Tok::OrOr),
            ('\'' | '"', _) => {
                let (s, consumed) = string_literal(&chars[i..], pos)?;
                out.push(Token { tok: Tok::Str(s), pos });
                i += consumed;
                continue;
            }
            (c, _) if WORD_STOP.contains(&c) => return Err(TslError::UnexpectedChar { pos, ch: c }),
            _ => {
                let consumed = word_len(&chars[i..], pos)?;
                let end = chars.get(i + consumed).map(|(p, _)| *p).unwrap_or(src.len());
                out.push(Token { tok: Tok::Word(src[pos..end].to_string()), pos });
                i += consumed;
                continue;
            }
        };
        out.push(Token { tok, pos });
        i += width;
    }
    Ok(out)
}

fn string_literal(chars: &[(usize, char)], pos: usize) -> Result<(String, usize), TslError> {
    let quote = chars[0].1;
    let mut s = String::new();
    let mut i = 1;
    while i < chars.len() {
        match chars[i].1 {
            '\\' if i + 1 < chars.len() => {
                s.push(chars[i + 1].1);
                i += 2;
            }
            c if c == quote => return Ok((s, i + 1)),
            c => {
                s.push(c);
                i += 1;
            }
        }
    }
    Err(TslError::UnterminatedString { pos })
}

// A word runs to whitespace or an operator character; bracketed subscripts
// (quotes included) belong to the word.
fn word_len(chars: &[(usize, char)], pos: usize) -> Result<usize, TslError> {
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i].1;
        if c.is_whitespace() || WORD_STOP.contains(&c) || c == ']' {
            break;
        }
        if c == '[' {
            if i == 0 {
                break;
            }
            let mut quote: Option<char> = None;
            let mut j = i + 1;
            loop {
                let Some(&(_, cj)) = chars.get(j) else {
                    return Err(TslError::UnbalancedBracket { pos });
                };
                match (quote, cj) {
                    (Some(q), c) if c == q => quote = None,
                    (Some(_), _) => {}
                    (None, '\'' | '"') => quote = Some(cj),
                    (None, ']') => break,
                    _ => {}
                }
                j += 1;
            }
            i = j + 1;
            continue;
        }
        i += 1;
    }
    Ok(i)
}
