//! Generation of device and user code identifiers.

use rand::rngs::OsRng;
use rand::Rng;

/// Default raw identifier length. Profile configuration clips the raw output
/// down to the configured code length, so the generator only has to produce
/// something comfortably longer.
const DEFAULT_IDENTIFIER_SIZE: usize = 32;

/// User codes are typed by a human from a second device; the alphabet leaves
/// out characters that are easy to misread (0/O, 1/I/L, and vowels, which
/// also keeps accidental words out of the codes).
const USER_CODE_ALPHABET: &[u8] = b"BCDFGHJKMNPQRSTVWXZ23456789";

/// Source of random identifiers for device and user codes.
pub trait IdentifierGenerator: Send + Sync {
    /// Produce a fresh identifier. Callers clip the result to their
    /// configured length via [`clip_identifier`]; output shorter than that
    /// length plus one is treated as a configuration error, never truncated.
    fn generate_identifier(&self) -> String;
}

/// Alphanumeric identifiers from the operating system CSPRNG. Used for
/// device codes, which only the polling device ever handles.
pub struct SecureRandomIdentifierGenerator {
    size: usize,
}

impl SecureRandomIdentifierGenerator {
    pub fn new(size: usize) -> Self {
        Self { size }
    }
}

impl Default for SecureRandomIdentifierGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_IDENTIFIER_SIZE)
    }
}

impl IdentifierGenerator for SecureRandomIdentifierGenerator {
    fn generate_identifier(&self) -> String {
        let mut rng = OsRng;
        (0..self.size)
            .map(|_| rng.sample(rand::distributions::Alphanumeric) as char)
            .collect()
    }
}

/// Identifiers over the transcription-safe alphabet, for user codes.
pub struct UserCodeGenerator {
    size: usize,
}

impl UserCodeGenerator {
    pub fn new(size: usize) -> Self {
        Self { size }
    }
}

impl Default for UserCodeGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_IDENTIFIER_SIZE)
    }
}

impl IdentifierGenerator for UserCodeGenerator {
    fn generate_identifier(&self) -> String {
        let mut rng = OsRng;
        (0..self.size)
            .map(|_| USER_CODE_ALPHABET[rng.gen_range(0..USER_CODE_ALPHABET.len())] as char)
            .collect()
    }
}

/// Reduce a raw identifier to exactly `length` characters by taking the
/// substring `[1, length + 1)`. A raw identifier that is not strictly longer
/// than `length` signals a misconfigured generator; it is reported rather
/// than silently truncated.
pub(crate) fn clip_identifier(raw: &str, length: usize) -> Result<String, String> {
    if raw.chars().count() <= length {
        return Err(format!(
            "generated identifier length is {}, expected at least {}",
            raw.chars().count(),
            length + 1
        ));
    }
    Ok(raw.chars().skip(1).take(length).collect())
}
