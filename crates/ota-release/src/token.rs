//! Random tokens and deployment key layout.
//!
//! A deployment key is a 28-character random token followed by the creating
//! user's 9-character `identical` suffix.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::{ReleaseError, ReleaseResult};

pub const TOKEN_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Length of the random part of a deployment key.
pub const KEY_TOKEN_LEN: usize = 28;

/// Length of the per-user suffix.
pub const IDENTICAL_LEN: usize = 9;

/// Source of random alphanumeric tokens.
pub trait TokenGenerator: Send + Sync {
    fn token(&self, len: usize) -> ReleaseResult<String>;
}

/// OS-entropy token generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomTokenGenerator;

impl TokenGenerator for RandomTokenGenerator {
    fn token(&self, len: usize) -> ReleaseResult<String> {
        // Largest multiple of the alphabet size that fits in a byte; bytes
        // above it are rejected to keep the distribution uniform.
        let limit = (256 / TOKEN_ALPHABET.len() * TOKEN_ALPHABET.len()) as u8;
        let mut out = String::with_capacity(len);
        let mut buf = [0u8; 64];
        while out.len() < len {
            getrandom::getrandom(&mut buf).map_err(|e| ReleaseError::Token(e.to_string()))?;
            for byte in buf {
                if byte < limit {
                    out.push(TOKEN_ALPHABET[byte as usize % TOKEN_ALPHABET.len()] as char);
                    if out.len() == len {
                        break;
                    }
                }
            }
        }
        Ok(out)
    }
}

/// Deterministic generator: hands out queued tokens, then zero-padded counters.
#[derive(Debug, Default)]
pub struct SequenceTokenGenerator {
    state: Mutex<(VecDeque<String>, u64)>,
}

impl SequenceTokenGenerator {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            state: Mutex::new((tokens.into_iter().map(Into::into).collect(), 0)),
        }
    }
}

impl TokenGenerator for SequenceTokenGenerator {
    fn token(&self, len: usize) -> ReleaseResult<String> {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(token) = state.0.pop_front() {
            return Ok(token);
        }
        state.1 += 1;
        Ok(format!("{:0>len$}", state.1))
    }
}

/// A deployment key split into its parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedKey<'a> {
    pub token: &'a str,
    pub identical: &'a str,
}

/// Split a deployment key into random token and user suffix.
pub fn parse_token(key: &str) -> Option<ParsedKey<'_>> {
    if !key.is_ascii() || key.len() < IDENTICAL_LEN {
        return None;
    }
    Some(ParsedKey {
        token: &key[..key.len().min(KEY_TOKEN_LEN)],
        identical: &key[key.len() - IDENTICAL_LEN..],
    })
}
