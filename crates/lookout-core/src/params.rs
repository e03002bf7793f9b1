//! Query placeholders and job parameter values.
//!
//! Statements reference parameters as `$NAME`. `$LIMIT_SIZE` is reserved for
//! the batch size of iterative statements; every other placeholder must be
//! supplied by the caller when a job runs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{LookoutError, Result};

/// Placeholder bound to a statement's `iterationsize`.
pub const LIMIT_SIZE: &str = "LIMIT_SIZE";

/// Distinct `$IDENT` placeholders in `query`, in order of first appearance.
///
/// String literals, backtick-quoted names, and comments are skipped.
pub fn placeholders(query: &str) -> Vec<String> {
    let code = strip_literals(query);
    let mut found: Vec<String> = Vec::new();
    let mut chars = code.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        if c != '$' {
            continue;
        }
        let start = pos + 1;
        let mut end = start;
        while let Some(&(i, n)) = chars.peek() {
            let valid = if i == start {
                n.is_ascii_alphabetic() || n == '_'
            } else {
                n.is_ascii_alphanumeric() || n == '_'
            };
            if !valid {
                break;
            }
            end = i + n.len_utf8();
            chars.next();
        }
        if end > start {
            let name = &code[start..end];
            if !found.iter().any(|f| f == name) {
                found.push(name.to_string());
            }
        }
    }

    found
}

/// Whether `query` references `$name` outside literals and comments.
pub fn references(query: &str, name: &str) -> bool {
    placeholders(query).iter().any(|p| p == name)
}

/// Whether `query` aliases a result column as `name` (`... AS name`)
/// outside literals and comments. `AS` matches in any case.
pub fn returns_column(query: &str, name: &str) -> bool {
    let code = strip_literals(query);
    let words: Vec<&str> = code
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .collect();
    words
        .windows(2)
        .any(|w| w[0].eq_ignore_ascii_case("AS") && w[1] == name)
}

/// Blank out string literals, backtick-quoted names, and comments so only
/// Cypher code remains. Line breaks are kept.
fn strip_literals(query: &str) -> String {
    let mut out = String::with_capacity(query.len());
    let mut chars = query.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                out.push(' ');
                while let Some(n) = chars.next() {
                    out.push(' ');
                    if n == '\\' {
                        if chars.next().is_some() {
                            out.push(' ');
                        }
                    } else if n == c {
                        break;
                    }
                }
            }
            // A doubled backtick escapes itself: closing and reopening the
            // name blanks the same span.
            '`' => {
                out.push(' ');
                for n in chars.by_ref() {
                    out.push(' ');
                    if n == '`' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'/') => {
                out.push(' ');
                for n in chars.by_ref() {
                    if n == '\n' {
                        out.push('\n');
                        break;
                    }
                    out.push(' ');
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                out.push_str("  ");
                let mut prev = ' ';
                for n in chars.by_ref() {
                    out.push(if n == '\n' { '\n' } else { ' ' });
                    if prev == '*' && n == '/' {
                        break;
                    }
                    prev = n;
                }
            }
            _ => out.push(c),
        }
    }

    out
}

/// A scalar job parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParamValue {
    /// Interpret a raw command-line value: booleans, then integers, then
    /// floats, falling back to a string.
    ///
    /// A value wrapped in single or double quotes is always a string, with
    /// the quotes removed. Digit strings with a leading zero (account ids,
    /// zero-padded codes) stay strings so no digits are lost.
    pub fn parse(raw: &str) -> Self {
        for quote in ['\'', '"'] {
            if let Some(inner) = raw
                .strip_prefix(quote)
                .and_then(|rest| rest.strip_suffix(quote))
            {
                return Self::Str(inner.to_string());
            }
        }
        match raw {
            "true" => return Self::Bool(true),
            "false" => return Self::Bool(false),
            _ => {}
        }
        if has_leading_zero(raw) {
            return Self::Str(raw.to_string());
        }
        if let Ok(i) = raw.parse::<i64>() {
            return Self::Int(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            if f.is_finite() {
                return Self::Float(f);
            }
        }
        Self::Str(raw.to_string())
    }
}

fn has_leading_zero(raw: &str) -> bool {
    let digits = raw.strip_prefix(['-', '+']).unwrap_or(raw);
    digits.len() > 1 && digits.starts_with('0') && digits.as_bytes()[1].is_ascii_digit()
}

/// Named parameters supplied to a job run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobParameters(BTreeMap<String, ParamValue>);

impl JobParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter, rejecting reserved or malformed names.
    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue) -> Result<()> {
        let name = name.into();
        check_name(&name)?;
        self.0.insert(name, value);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    /// Value for placeholder `name`: the exact key, else a key equal to it
    /// ignoring ASCII case. The `config` crate lowercases keys, so
    /// `UPDATE_TAG` set in a config file arrives as `update_tag`.
    pub fn lookup(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name).or_else(|| {
            self.0
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Overlay `other` on top of `self`; entries in `other` win, including
    /// over keys that differ only in case.
    pub fn merged(mut self, other: &JobParameters) -> Self {
        for (k, v) in &other.0 {
            self.0.retain(|key, _| !key.eq_ignore_ascii_case(k));
            self.0.insert(k.clone(), v.clone());
        }
        self
    }

    /// Check every name. Needed for sets built by deserialization, which
    /// bypasses [`JobParameters::insert`].
    pub fn validate(&self) -> Result<()> {
        self.0.keys().try_for_each(|k| check_name(k))
    }
}

/// Parse a `KEY=VALUE` assignment as given on the command line.
pub fn parse_assignment(raw: &str) -> Result<(String, ParamValue)> {
    let (key, value) = raw.split_once('=').ok_or_else(|| {
        LookoutError::InvalidParameter(format!("expected KEY=VALUE, got {raw:?}"))
    })?;
    let key = key.trim();
    check_name(key)?;
    Ok((key.to_string(), ParamValue::parse(value)))
}

fn check_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let well_formed = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !well_formed {
        return Err(LookoutError::InvalidParameter(format!(
            "{name:?} is not a valid parameter name"
        )));
    }
    if name.eq_ignore_ascii_case(LIMIT_SIZE) {
        return Err(LookoutError::InvalidParameter(format!(
            "{LIMIT_SIZE} is reserved for the batch size of iterative statements"
        )));
    }
    Ok(())
}
