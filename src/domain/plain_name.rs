//! Plain-name allocation
//!
//! A plain name is the directory segment a task is stored under. It is derived
//! from the display name:
//! - Only ASCII letters and digits are kept, lower-cased
//! - At most [`MAX_LEN`] characters (e.g., `Buy milk!` -> `buymilk`)
//! - Collisions get a base-36 suffix (`shopping`, `shopping0`, `shopping1`, ...)
//!
//! The allocator is pure: callers hand it every name already taken in the
//! target directory, both in memory and on disk.

use std::collections::HashSet;

use thiserror::Error;

/// Maximum length of a plain name
pub const MAX_LEN: usize = 12;

/// Maximum number of suffix digits tried before giving up
pub const MAX_SUFFIX_LEN: usize = 4;

const SUFFIX_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Error, PartialEq)]
pub enum AllocationError {
    #[error("No free plain name left for task '{0}'")]
    Exhausted(String),
}

/// Reduces a display name to its plain form (no uniqueness applied)
pub fn base_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .take(MAX_LEN)
        .collect()
}

/// Encodes a counter in the suffix alphabet (0 -> `0`, 35 -> `z`, 36 -> `10`)
fn encode_suffix(mut n: u64) -> String {
    let mut digits = Vec::new();
    loop {
        digits.push(SUFFIX_ALPHABET[(n % 36) as usize]);
        n /= 36;
        if n == 0 {
            break;
        }
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

/// Allocates sibling-unique plain names for one target directory
pub struct PlainNameAllocator<'a> {
    taken: &'a HashSet<String>,
}

impl<'a> PlainNameAllocator<'a> {
    /// Creates an allocator over the names already used in the directory
    pub fn new(taken: &'a HashSet<String>) -> Self {
        Self { taken }
    }

    fn is_free(&self, candidate: &str) -> bool {
        !candidate.is_empty() && !self.taken.contains(candidate)
    }

    /// Returns a free plain name for the given display name
    pub fn allocate(&self, name: &str) -> Result<String, AllocationError> {
        let base = base_name(name);
        if self.is_free(&base) {
            return Ok(base);
        }

        let limit = 36u64.pow(MAX_SUFFIX_LEN as u32);
        for n in 0..limit {
            let suffix = encode_suffix(n);
            let keep = MAX_LEN.saturating_sub(suffix.len()).min(base.len());
            let candidate = format!("{}{}", &base[..keep], suffix);
            if self.is_free(&candidate) {
                return Ok(candidate);
            }
        }

        Err(AllocationError::Exhausted(name.to_string()))
    }
}
