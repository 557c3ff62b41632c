//! Line-oriented key/value text format
//!
//! Used for `task.cfg` in every task directory and `meta.cfg` at the tree root.
//!
//! ```text
//! # comment
//! name "Buy \"good\" coffee"
//! creation_time "1352203432000"
//! "odd key!" "value"   # trailing comment
//! ```
//!
//! A line is a name (bare word or quoted string) followed by a quoted value.
//! Bare words are ASCII letters, `_` and `.`. Inside quotes `\n`, `\"` and
//! `\\` are escapes; any other escaped character is kept as-is.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::atomic::write_atomic;

#[derive(Debug, Error)]
pub enum ConfigTextError {
    #[error("{} does not exist", path.display())]
    Missing { path: PathBuf },

    #[error("{file}: line {line}: {reason} in '{text}'")]
    Parse {
        file: String,
        line: usize,
        text: String,
        reason: String,
    },

    #[error("Failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A lexical token of one configuration line
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    /// Nothing but whitespace left
    Empty,
    /// `#` up to the end of the line
    Comment,
    /// A run of word characters
    Word(String),
    /// A double-quoted string, escapes still in place
    Str(String),
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Empty => "end of line".to_string(),
            Token::Comment => "comment".to_string(),
            Token::Word(w) => format!("word '{}'", w),
            Token::Str(s) => format!("string \"{}\"", s),
        }
    }
}

/// Returns true for characters that may appear in a bare word
pub fn is_word_char(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '.'
}

fn is_word(s: &str) -> bool {
    !s.is_empty() && s.chars().all(is_word_char)
}

/// Reads one token off the front of `input`, returning it with the remainder
fn next_token(input: &str) -> Result<(Token, &str), String> {
    let s = input.trim_start_matches([' ', '\t']);

    let Some(first) = s.chars().next() else {
        return Ok((Token::Empty, ""));
    };

    if first == '#' {
        return Ok((Token::Comment, ""));
    }

    if is_word_char(first) {
        let end = s.find(|c: char| !is_word_char(c)).unwrap_or(s.len());
        return Ok((Token::Word(s[..end].to_string()), &s[end..]));
    }

    if first == '"' {
        let bytes = s.as_bytes();
        let mut escaped = false;
        for (i, &b) in bytes.iter().enumerate().skip(1) {
            match b {
                b'\\' if !escaped => escaped = true,
                b'"' if !escaped => return Ok((Token::Str(s[1..i].to_string()), &s[i + 1..])),
                _ => escaped = false,
            }
        }
        return Err("unterminated double quote".to_string());
    }

    Err(format!("bad token '{}'", s))
}

/// Replaces escape sequences with the characters they stand for
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Escapes `"`, `\` and line feeds so [`unescape`] restores the original
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out
}

/// Parses a single line into an optional `(name, value)` pair
fn parse_line(line: &str) -> Result<Option<(String, String)>, String> {
    let (token, rest) = next_token(line)?;
    let name = match token {
        Token::Empty | Token::Comment => return Ok(None),
        Token::Word(word) => word,
        Token::Str(raw) => unescape(&raw),
    };

    let (token, rest) = next_token(rest)?;
    let value = match token {
        Token::Str(raw) => unescape(&raw),
        other => return Err(format!("expected a quoted value, found {}", other.describe())),
    };

    match next_token(rest)?.0 {
        Token::Empty | Token::Comment => Ok(Some((name, value))),
        other => Err(format!("junk at the end of the line ({})", other.describe())),
    }
}

/// A set of configuration entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigText {
    entries: BTreeMap<String, String>,
}

impl ConfigText {
    /// Creates an empty entry set
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses configuration text; `source` names the origin in error messages
    pub fn parse_str(source: &str, text: &str) -> Result<Self, ConfigTextError> {
        let mut config = Self::new();

        for (index, line) in text.lines().enumerate() {
            let parsed = parse_line(line).map_err(|reason| ConfigTextError::Parse {
                file: source.to_string(),
                line: index + 1,
                text: line.to_string(),
                reason,
            })?;

            if let Some((name, value)) = parsed {
                config.set(name, value);
            }
        }

        Ok(config)
    }

    /// Reads and parses a configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigTextError> {
        if !path.exists() {
            return Err(ConfigTextError::Missing {
                path: path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigTextError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse_str(&path.display().to_string(), &content)
    }

    /// Writes the entries to a file atomically
    pub fn store(&self, path: &Path) -> Result<(), ConfigTextError> {
        write_atomic(path, self.to_string().as_bytes()).map_err(|source| ConfigTextError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Returns the value of an entry
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    /// Returns an entry parsed as an integer, if present and well-formed
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(|v| v.trim().parse().ok())
    }

    /// Sets an entry; returns true if an existing value was overwritten
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
        self.entries.insert(name.into(), value.into()).is_some()
    }

    /// Removes an entry
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.entries.remove(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over all entries in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl std::fmt::Display for ConfigText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (name, value) in self.iter() {
            if is_word(name) {
                write!(f, "{} ", name)?;
            } else {
                write!(f, "\"{}\" ", escape(name))?;
            }
            writeln!(f, "\"{}\"", escape(value))?;
        }
        Ok(())
    }
}
