//! Random path segments that disguise proxy entry points.
//!
//! Collision avoidance spans a whole build: the caller owns the set of
//! tokens already handed out and must add every returned token to it
//! before asking for the next one ([`PathGenerator::generate_into`] does
//! both).

use rand::Rng;
use std::collections::HashSet;
use thiserror::Error;

/// Default token length in characters.
pub const TOKEN_LENGTH: usize = 12;

/// Default alphabet. Only URL-unreserved characters are ever allowed.
pub const TOKEN_ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz0123456789";

/// Random draws per call before giving up.
pub const MAX_ATTEMPTS: usize = 64;

/// At most `capacity / SAFE_FRACTION_DIVISOR` tokens are handed out from
/// one space.
pub const SAFE_FRACTION_DIVISOR: u128 = 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ObfuscationError {
    #[error("obfuscation path space exhausted ({used} in use, capacity {capacity})")]
    ExhaustedSpace { used: usize, capacity: u128 },

    #[error("invalid obfuscation settings: {0}")]
    InvalidSettings(String),
}

/// Fixed-length random token generator.
#[derive(Debug, Clone)]
pub struct PathGenerator {
    alphabet: Vec<char>,
    length: usize,
    max_attempts: usize,
    reserved: HashSet<String>,
}

impl PathGenerator {
    /// Create a generator over `alphabet` producing `length`-char tokens.
    pub fn new(alphabet: &str, length: usize) -> Result<Self, ObfuscationError> {
        let mut chars: Vec<char> = Vec::new();
        for c in alphabet.chars() {
            if !is_unreserved(c) {
                return Err(ObfuscationError::InvalidSettings(format!(
                    "character {c:?} is not path-segment safe"
                )));
            }
            if !chars.contains(&c) {
                chars.push(c);
            }
        }
        if chars.len() < 2 {
            return Err(ObfuscationError::InvalidSettings(
                "alphabet needs at least two distinct characters".into(),
            ));
        }
        if length == 0 {
            return Err(ObfuscationError::InvalidSettings(
                "token length must be positive".into(),
            ));
        }

        Ok(Self {
            alphabet: chars,
            length,
            max_attempts: MAX_ATTEMPTS,
            reserved: HashSet::new(),
        })
    }

    /// Tokens that must never be produced (e.g. the secret route segment).
    pub fn with_reserved<I, S>(mut self, reserved: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reserved.extend(reserved.into_iter().map(Into::into));
        self
    }

    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Number of distinct tokens, saturating at `u128::MAX`.
    pub fn capacity(&self) -> u128 {
        u32::try_from(self.length)
            .ok()
            .and_then(|len| (self.alphabet.len() as u128).checked_pow(len))
            .unwrap_or(u128::MAX)
    }

    /// Largest number of tokens that may be in use before generation is
    /// refused.
    pub fn safe_limit(&self) -> u128 {
        self.capacity() / SAFE_FRACTION_DIVISOR
    }

    /// Produce a token absent from `existing` and from the reserved set.
    ///
    /// Fails with [`ObfuscationError::ExhaustedSpace`] once `existing`
    /// reaches the safe limit, or if every attempt collides.
    pub fn generate(&self, existing: &HashSet<String>) -> Result<String, ObfuscationError> {
        let exhausted = || ObfuscationError::ExhaustedSpace {
            used: existing.len(),
            capacity: self.capacity(),
        };

        if existing.len() as u128 >= self.safe_limit() {
            return Err(exhausted());
        }

        let mut rng = rand::thread_rng();
        for _ in 0..self.max_attempts {
            let token: String = (0..self.length)
                .map(|_| self.alphabet[rng.gen_range(0..self.alphabet.len())])
                .collect();
            if !existing.contains(&token) && !self.reserved.contains(&token) {
                return Ok(token);
            }
        }

        tracing::warn!(
            used = existing.len(),
            attempts = self.max_attempts,
            "Obfuscation path generation ran out of attempts"
        );
        Err(exhausted())
    }

    /// [`generate`](Self::generate) and record the token in `existing`.
    pub fn generate_into(&self, existing: &mut HashSet<String>) -> Result<String, ObfuscationError> {
        let token = self.generate(existing)?;
        existing.insert(token.clone());
        Ok(token)
    }
}

impl Default for PathGenerator {
    fn default() -> Self {
        Self {
            alphabet: TOKEN_ALPHABET.chars().collect(),
            length: TOKEN_LENGTH,
            max_attempts: MAX_ATTEMPTS,
            reserved: HashSet::new(),
        }
    }
}

fn is_unreserved(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~')
}
