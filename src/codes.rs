//! Room Code Generation
//!
//! Short human-shareable codes drawn from a lowercase alphanumeric alphabet.
//! Generators are pure: uniqueness is not part of the contract, the registry
//! retries on collision against live and recently retired codes.

use rand::Rng;

/// Alphabet room codes are drawn from.
const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Default code length; five characters keeps codes easy to read aloud.
pub const DEFAULT_CODE_LENGTH: usize = 5;

/// A source of candidate room codes.
///
/// Implementations must be pure with respect to shared state: no I/O, no
/// shared mutation. The registry owns collision handling.
pub trait CodeGenerator: Send + Sync {
    /// Produce one candidate code.
    fn generate(&self) -> String;
}

/// Default generator: uniformly random codes of a fixed length.
#[derive(Debug, Clone)]
pub struct RandomCodeGenerator {
    length: usize,
}

impl RandomCodeGenerator {
    /// Create a generator producing codes of `length` characters.
    pub fn new(length: usize) -> Self {
        Self { length }
    }
}

impl Default for RandomCodeGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_CODE_LENGTH)
    }
}

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..self.length)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn default_codes_are_five_lowercase_alphanumerics() {
        let generator = RandomCodeGenerator::default();
        for _ in 0..100 {
            let code = generator.generate();
            assert_eq!(code.len(), 5);
            assert!(code.bytes().all(|b| ALPHABET.contains(&b)), "bad code {code}");
        }
    }

    #[test]
    fn custom_length_is_respected() {
        let generator = RandomCodeGenerator::new(8);
        assert_eq!(generator.generate().len(), 8);
    }

    #[test]
    fn draws_are_not_all_identical() {
        let generator = RandomCodeGenerator::default();
        let distinct: BTreeSet<String> = (0..32).map(|_| generator.generate()).collect();
        assert!(distinct.len() > 1);
    }
}
