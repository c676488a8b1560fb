//! Retrieval key generation.

use rand::Rng;

use dadpass_common::{MessageKey, Result, KEY_ALPHABET};

/// Generate a random key of `length` characters.
///
/// Every character is drawn uniformly from the 62-symbol alphanumeric
/// alphabet using the thread-local CSPRNG. Keys must stay secret until first
/// read, so a weaker generator is not acceptable here.
///
/// # Errors
/// - `Validation` if `length` is zero or above the key length limit
pub fn generate_key(length: usize) -> Result<MessageKey> {
    let mut rng = rand::thread_rng();
    let key: String = (0..length)
        .map(|_| KEY_ALPHABET[rng.gen_range(0..KEY_ALPHABET.len())] as char)
        .collect();
    MessageKey::parse(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_returns_requested_length() {
        for length in [1, 5, 10, 20] {
            assert_eq!(generate_key(length).unwrap().len(), length);
        }
    }

    #[test]
    fn test_only_alphanumeric() {
        let key = generate_key(64).unwrap();
        assert!(key.as_str().bytes().all(|b| b.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_generates_distinct_keys() {
        let keys: HashSet<_> = (0..100).map(|_| generate_key(10).unwrap()).collect();
        assert_eq!(keys.len(), 100);
    }

    #[test]
    fn test_zero_length_rejected() {
        assert!(generate_key(0).is_err());
    }

    #[test]
    fn test_uses_whole_alphabet() {
        let mut seen = HashSet::new();
        for _ in 0..200 {
            seen.extend(generate_key(64).unwrap().as_str().bytes());
        }
        assert_eq!(seen.len(), KEY_ALPHABET.len());
    }
}
