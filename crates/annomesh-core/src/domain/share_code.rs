//! Short, human-typable session codes.
//!
//! A host publishes a 5-character code and joiners type it in.  The code
//! doubles as the host's transport address.  Letters that are easy to
//! confuse with digits (`I`, `O`) and the digits `0` and `1` are left out of
//! the alphabet, so a code read aloud or copied by hand survives intact.

use std::fmt;

use rand::Rng;
use thiserror::Error;

/// Symbols a share code may contain.
pub const SHARE_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Number of symbols in a share code.
pub const SHARE_CODE_LEN: usize = 5;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ShareCodeError {
    #[error("share code must be 5 characters, got {0}")]
    WrongLength(usize),
    #[error("share code contains invalid character {0:?}")]
    InvalidCharacter(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShareCode(String);

impl ShareCode {
    /// Draws a fresh code from `rng`.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let code = (0..SHARE_CODE_LEN)
            .map(|_| SHARE_CODE_ALPHABET[rng.gen_range(0..SHARE_CODE_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    /// Parses user input.  Surrounding whitespace is ignored and lowercase
    /// letters are accepted.
    ///
    /// # Errors
    ///
    /// [`ShareCodeError::WrongLength`] unless exactly five symbols remain, or
    /// [`ShareCodeError::InvalidCharacter`] for a symbol outside the alphabet.
    pub fn parse(input: &str) -> Result<Self, ShareCodeError> {
        let code = input.trim().to_ascii_uppercase();
        let len = code.chars().count();
        if len != SHARE_CODE_LEN {
            return Err(ShareCodeError::WrongLength(len));
        }
        if let Some(bad) = code
            .chars()
            .find(|c| !c.is_ascii() || !SHARE_CODE_ALPHABET.contains(&(*c as u8)))
        {
            return Err(ShareCodeError::InvalidCharacter(bad));
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShareCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
