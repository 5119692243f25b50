use std::sync::OnceLock;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;
use tracing::{debug, warn};

use shared_config::DEFAULT_CODE_MAX_ATTEMPTS;

use crate::models::AppointmentError;
use crate::services::store::AppointmentStore;

pub const CODE_LENGTH: usize = 6;

/// Uppercase letters and digits without the look-alikes O, 0, I and 1.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Draws appointment codes until one is free, giving up after `max_attempts`.
#[derive(Debug, Clone, Copy)]
pub struct CodeGenerator {
    max_attempts: u32,
}

impl CodeGenerator {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts: max_attempts.max(1) }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn draw<R: Rng>(rng: &mut R) -> String {
        (0..CODE_LENGTH)
            .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
            .collect()
    }

    /// `exists` answers whether a code is already taken.
    pub fn generate_with<F>(&self, exists: F) -> Result<String, AppointmentError>
    where
        F: FnMut(&str) -> bool,
    {
        self.generate_with_rng(&mut rand::thread_rng(), exists)
    }

    pub fn generate_with_rng<R, F>(&self, rng: &mut R, mut exists: F) -> Result<String, AppointmentError>
    where
        R: Rng,
        F: FnMut(&str) -> bool,
    {
        for _ in 0..self.max_attempts {
            let candidate = Self::draw(rng);
            if !exists(&candidate) {
                return Ok(candidate);
            }
        }

        warn!("No free appointment code after {} attempts", self.max_attempts);
        Err(AppointmentError::CodeSpaceExhausted { attempts: self.max_attempts })
    }

    /// Same loop, with the store answering the existence check.
    pub async fn generate_unique_code(&self, store: &dyn AppointmentStore) -> Result<String, AppointmentError> {
        for attempt in 1..=self.max_attempts {
            let candidate = Self::draw(&mut rand::thread_rng());
            if !store.code_exists(&candidate).await? {
                debug!("Generated appointment code on attempt {}", attempt);
                return Ok(candidate);
            }
        }

        warn!("No free appointment code after {} attempts", self.max_attempts);
        Err(AppointmentError::CodeSpaceExhausted { attempts: self.max_attempts })
    }

    pub fn seeded_rng(seed: u64) -> StdRng {
        StdRng::seed_from_u64(seed)
    }
}

impl Default for CodeGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_CODE_MAX_ATTEMPTS)
    }
}

pub fn is_valid_code(code: &str) -> bool {
    code.len() == CODE_LENGTH && code.bytes().all(|b| CODE_ALPHABET.contains(&b))
}

fn code_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Z0-9]{6}$").ok()).as_ref()
}

/// Normalizes user input to the stored form. Lookups accept any six
/// uppercase alphanumerics so older codes still resolve.
pub fn parse_code(input: &str) -> Result<String, AppointmentError> {
    let code = input.trim().to_uppercase();
    if code.is_empty() {
        return Err(AppointmentError::InvalidRequest("Appointment code is required".to_string()));
    }
    if !code_pattern().is_some_and(|pattern| pattern.is_match(&code)) {
        return Err(AppointmentError::InvalidRequest(format!("Invalid appointment code: {}", input.trim())));
    }
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::collections::HashSet;

    #[test]
    fn test_alphabet_has_no_lookalikes() {
        assert_eq!(CODE_ALPHABET.len(), 32);
        for banned in [b'O', b'0', b'I', b'1'] {
            assert!(!CODE_ALPHABET.contains(&banned));
        }
    }

    #[test]
    fn test_drawn_codes_are_well_formed() {
        let mut rng = CodeGenerator::seeded_rng(7);
        for _ in 0..500 {
            let code = CodeGenerator::draw(&mut rng);
            assert!(is_valid_code(&code), "bad code {}", code);
        }
    }

    #[test]
    fn test_retries_until_free() {
        let generator = CodeGenerator::new(10);
        let mut calls = 0;
        let code = generator
            .generate_with_rng(&mut CodeGenerator::seeded_rng(1), |_| {
                calls += 1;
                calls < 4
            })
            .unwrap();
        assert_eq!(calls, 4);
        assert!(is_valid_code(&code));
    }

    #[test]
    fn test_never_returns_a_taken_code() {
        let generator = CodeGenerator::default();
        let mut taken = HashSet::new();
        for _ in 0..200 {
            let code = generator.generate_with(|c| taken.contains(c)).unwrap();
            assert!(taken.insert(code));
        }
    }

    #[test]
    fn test_gives_up_when_everything_is_taken() {
        let generator = CodeGenerator::new(5);
        let mut calls = 0;
        let result = generator.generate_with(|_| {
            calls += 1;
            true
        });
        assert_matches!(result, Err(AppointmentError::CodeSpaceExhausted { attempts: 5 }));
        assert_eq!(calls, 5);
    }

    #[test]
    fn test_parse_code() {
        assert_eq!(parse_code("  abc234 ").unwrap(), "ABC234");
        assert_matches!(parse_code(""), Err(AppointmentError::InvalidRequest(_)));
        assert_matches!(parse_code("ABC"), Err(AppointmentError::InvalidRequest(_)));
        assert_matches!(parse_code("ABC-23"), Err(AppointmentError::InvalidRequest(_)));
    }
}
