//! Extraction and safe evaluation of a configuration literal embedded in a
//! Python source file.
//!
//! Supported: dict, list, tuple, str (single/double quoted, `r`/`u`/`b`
//! prefixes, `\x`, `\u`, `\U` and octal escapes), int, float, `True`,
//! `False`, `None`, `#` comments and trailing commas. `\N{...}` is kept
//! verbatim. Nothing is executed.

use serde_json::{Map, Number, Value};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum LiteralError {
    #[error("declaration `{0}` not found")]
    NotFound(String),
    #[error("unbalanced braces after offset {0}")]
    Unbalanced(usize),
    #[error("unexpected end of input")]
    Eof,
    #[error("unexpected character {found:?} at offset {at}")]
    Unexpected { found: char, at: usize },
    #[error("invalid number {text:?} at offset {at}")]
    Number { text: String, at: usize },
    #[error("unknown name {name:?} at offset {at}")]
    Name { name: String, at: usize },
    #[error("unsupported dict key at offset {0}")]
    Key(usize),
    #[error("invalid escape at offset {0}")]
    Escape(usize),
}

fn is_ident(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Returns the `{ ... }` text assigned to `name` in `source`.
pub fn extract_block<'a>(source: &'a str, name: &str) -> Result<&'a str, LiteralError> {
    for (at, _) in source.match_indices(name) {
        if source[..at].chars().next_back().is_some_and(is_ident) {
            continue;
        }
        let rest = &source[at + name.len()..];
        if rest.chars().next().is_some_and(is_ident) {
            continue;
        }
        let rest = rest.trim_start_matches([' ', '\t']);
        let Some(rhs) = rest.strip_prefix('=') else { continue };
        if rhs.starts_with('=') {
            continue;
        }
        let rhs_trimmed = rhs.trim_start();
        if !rhs_trimmed.starts_with('{') {
            continue;
        }
        let start = source.len() - rhs_trimmed.len();
        let end = matching_brace(source, start)?;
        return Ok(&source[start..=end]);
    }
    Err(LiteralError::NotFound(name.to_string()))
}

/// Depth counter over the character stream; braces inside strings and comments are ignored.
fn matching_brace(source: &str, open: usize) -> Result<usize, LiteralError> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut comment = false;
    for (i, c) in source[open..].char_indices() {
        let at = open + i;
        if comment {
            if c == '\n' {
                comment = false;
            }
            continue;
        }
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '#' => comment = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(at);
                }
            }
            _ => {}
        }
    }
    Err(LiteralError::Unbalanced(open))
}

pub fn parse(text: &str) -> Result<Value, LiteralError> {
    let mut p = Parser { src: text, pos: 0 };
    let value = p.value()?;
    p.skip_ws();
    match p.peek() {
        None => Ok(value),
        Some(found) => Err(LiteralError::Unexpected { found, at: p.pos }),
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else if c == '#' {
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn expect(&mut self, want: char) -> Result<(), LiteralError> {
        self.skip_ws();
        match self.bump() {
            Some(c) if c == want => Ok(()),
            Some(found) => Err(LiteralError::Unexpected { found, at: self.pos - found.len_utf8() }),
            None => Err(LiteralError::Eof),
        }
    }

    fn value(&mut self) -> Result<Value, LiteralError> {
        self.skip_ws();
        match self.peek().ok_or(LiteralError::Eof)? {
            '{' => self.dict(),
            '[' => self.seq('[', ']'),
            '(' => self.seq('(', ')'),
            '\'' | '"' => self.string().map(Value::String),
            _ if self.string_prefix().is_some() => self.string().map(Value::String),
            c if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => self.number(),
            c if is_ident(c) => self.name(),
            found => Err(LiteralError::Unexpected { found, at: self.pos }),
        }
    }

    fn dict(&mut self) -> Result<Value, LiteralError> {
        self.expect('{')?;
        let mut map = Map::new();
        loop {
            self.skip_ws();
            if self.peek() == Some('}') {
                self.bump();
                return Ok(Value::Object(map));
            }
            let key_at = self.pos;
            let key = match self.value()? {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => (if b { "True" } else { "False" }).to_string(),
                _ => return Err(LiteralError::Key(key_at)),
            };
            self.expect(':')?;
            let value = self.value()?;
            map.insert(key, value);
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some('}') => return Ok(Value::Object(map)),
                Some(found) => {
                    return Err(LiteralError::Unexpected { found, at: self.pos - found.len_utf8() })
                }
                None => return Err(LiteralError::Eof),
            }
        }
    }

    fn seq(&mut self, open: char, close: char) -> Result<Value, LiteralError> {
        self.expect(open)?;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.bump();
                return Ok(Value::Array(items));
            }
            items.push(self.value()?);
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some(c) if c == close => return Ok(Value::Array(items)),
                Some(found) => {
                    return Err(LiteralError::Unexpected { found, at: self.pos - found.len_utf8() })
                }
                None => return Err(LiteralError::Eof),
            }
        }
    }

    /// Length of a string prefix (`r`, `u`, `b`, `rb`, `br`) directly followed
    /// by a quote at the cursor, and whether it makes the literal raw.
    fn string_prefix(&self) -> Option<(usize, bool)> {
        let rest = &self.src[self.pos..];
        let len = rest.find(|c: char| !c.is_ascii_alphabetic())?;
        if !matches!(rest[len..].chars().next(), Some('\'' | '"')) {
            return None;
        }
        let prefix = rest[..len].to_ascii_lowercase();
        match prefix.as_str() {
            "" | "u" | "b" => Some((len, false)),
            "r" | "rb" | "br" => Some((len, true)),
            _ => None,
        }
    }

    fn string(&mut self) -> Result<String, LiteralError> {
        let (prefix, raw) = self.string_prefix().ok_or(LiteralError::Eof)?;
        self.pos += prefix;
        let quote = self.bump().ok_or(LiteralError::Eof)?;
        let mut out = String::new();
        loop {
            match self.bump().ok_or(LiteralError::Eof)? {
                c if c == quote => break,
                '\\' if raw => {
                    // The backslash stays; an escaped quote does not close.
                    out.push('\\');
                    out.push(self.bump().ok_or(LiteralError::Eof)?);
                }
                '\\' => self.escape(&mut out)?,
                c => out.push(c),
            }
        }
        // Adjacent literals concatenate.
        self.skip_ws();
        if self.string_prefix().is_some() {
            out.push_str(&self.string()?);
        }
        Ok(out)
    }

    fn escape(&mut self, out: &mut String) -> Result<(), LiteralError> {
        let at = self.pos - 1;
        match self.bump().ok_or(LiteralError::Eof)? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0c}'),
            'v' => out.push('\u{0b}'),
            '\n' => {}
            'x' => out.push(self.code_point(2, 16, at)?),
            'u' => out.push(self.code_point(4, 16, at)?),
            'U' => out.push(self.code_point(8, 16, at)?),
            d @ '0'..='7' => {
                let mut code = d.to_digit(8).unwrap_or_default();
                for _ in 0..2 {
                    match self.peek().and_then(|c| c.to_digit(8)) {
                        Some(digit) => {
                            code = code * 8 + digit;
                            self.bump();
                        }
                        None => break,
                    }
                }
                out.push(char::from_u32(code).ok_or(LiteralError::Escape(at))?);
            }
            c @ ('\\' | '\'' | '"') => out.push(c),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
        Ok(())
    }

    /// Exactly `digits` digits in `radix`, as a char.
    fn code_point(&mut self, digits: usize, radix: u32, at: usize) -> Result<char, LiteralError> {
        let mut code = 0u32;
        for _ in 0..digits {
            let digit = self
                .bump()
                .and_then(|c| c.to_digit(radix))
                .ok_or(LiteralError::Escape(at))?;
            code = code * radix + digit;
        }
        char::from_u32(code).ok_or(LiteralError::Escape(at))
    }

    fn number(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        if matches!(self.peek(), Some('-' | '+')) {
            self.bump();
        }
        while let Some(c) = self.peek() {
            let exponent_sign = matches!(c, '-' | '+')
                && matches!(self.src[..self.pos].chars().next_back(), Some('e' | 'E'));
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || exponent_sign {
                self.bump();
            } else {
                break;
            }
        }
        let text: String = self.src[start..self.pos].chars().filter(|c| *c != '_').collect();
        let bad = || LiteralError::Number { text: text.clone(), at: start };
        if let Ok(i) = text.parse::<i64>() {
            return Ok(Value::Number(i.into()));
        }
        let f: f64 = text.parse().map_err(|_| bad())?;
        Number::from_f64(f).map(Value::Number).ok_or_else(bad)
    }

    fn name(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        while self.peek().is_some_and(is_ident) {
            self.bump();
        }
        match &self.src[start..self.pos] {
            "True" => Ok(Value::Bool(true)),
            "False" => Ok(Value::Bool(false)),
            "None" => Ok(Value::Null),
            other => Err(LiteralError::Name { name: other.to_string(), at: start }),
        }
    }
}
