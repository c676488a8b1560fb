//! Common types used throughout dadpass.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroize;

/// Characters a retrieval key may contain.
pub const KEY_ALPHABET: &[u8; 62] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Upper bound on accepted key length.
pub const MAX_KEY_LENGTH: usize = 64;

/// Opaque retrieval key for a stored message.
///
/// Always non-empty, at most [`MAX_KEY_LENGTH`] characters, drawn from
/// [`KEY_ALPHABET`]. The key carries no information about the message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MessageKey(String);

impl MessageKey {
    /// Parse a key, rejecting anything outside the alphabet.
    ///
    /// # Errors
    /// - Returns `Validation` if the key is empty, too long or contains
    ///   characters outside `[A-Za-z0-9]`
    pub fn parse(key: impl Into<String>) -> crate::Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(crate::Error::Validation(
                "Message key cannot be empty".to_string(),
            ));
        }
        if key.len() > MAX_KEY_LENGTH {
            return Err(crate::Error::Validation(format!(
                "Message key longer than {} characters",
                MAX_KEY_LENGTH
            )));
        }
        if !key.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(crate::Error::Validation(
                "Message key must be alphanumeric".to_string(),
            ));
        }
        Ok(Self(key))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length in characters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the key is empty. Parsed keys never are.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<String> for MessageKey {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::parse(value)
    }
}

impl From<MessageKey> for String {
    fn from(key: MessageKey) -> Self {
        key.0
    }
}

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifetime a caller can pick for a message.
///
/// The set is closed. Unknown or missing selections resolve to
/// [`TtlOption::FiveDays`] through [`TtlOption::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TtlOption {
    #[serde(rename = "15min")]
    FifteenMinutes,
    #[serde(rename = "1hour")]
    OneHour,
    #[serde(rename = "1day")]
    OneDay,
    #[serde(rename = "5days")]
    #[default]
    FiveDays,
}

impl TtlOption {
    /// Every option, shortest first.
    pub const ALL: [TtlOption; 4] = [
        TtlOption::FifteenMinutes,
        TtlOption::OneHour,
        TtlOption::OneDay,
        TtlOption::FiveDays,
    ];

    /// Permissive resolution used on the create path.
    ///
    /// Never fails: anything unrecognized falls back to the default.
    pub fn resolve(selection: Option<&str>) -> Self {
        selection
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    /// Wire name of the option.
    pub fn as_str(&self) -> &'static str {
        match self {
            TtlOption::FifteenMinutes => "15min",
            TtlOption::OneHour => "1hour",
            TtlOption::OneDay => "1day",
            TtlOption::FiveDays => "5days",
        }
    }

    /// Lifetime in seconds.
    pub fn duration_secs(&self) -> i64 {
        match self {
            TtlOption::FifteenMinutes => 900,
            TtlOption::OneHour => 3_600,
            TtlOption::OneDay => 86_400,
            TtlOption::FiveDays => 432_000,
        }
    }
}

impl FromStr for TtlOption {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::ALL
            .into_iter()
            .find(|opt| opt.as_str() == s)
            .ok_or_else(|| crate::Error::Validation(format!("Unknown TTL option: {}", s)))
    }
}

impl fmt::Display for TtlOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sensitive data wrapper that zeroizes on drop.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SensitiveBytes(Vec<u8>);

impl SensitiveBytes {
    /// Create new sensitive bytes.
    pub fn new(data: Vec<u8>) -> Self {
        Self(data)
    }

    /// Get a reference to the inner bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Get the length.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SensitiveBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SensitiveBytes([REDACTED; {} bytes])", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_message_key_parse() {
        let key = MessageKey::parse("aZ09bY18cX").unwrap();
        assert_eq!(key.as_str(), "aZ09bY18cX");
        assert_eq!(key.len(), 10);
    }

    #[test]
    fn test_message_key_rejects_bad_input() {
        assert!(MessageKey::parse("").is_err());
        assert!(MessageKey::parse("abc-def").is_err());
        assert!(MessageKey::parse("../etc").is_err());
        assert!(MessageKey::parse("a".repeat(MAX_KEY_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_message_key_serde_validates() {
        let key: MessageKey = serde_json::from_str("\"abc123\"").unwrap();
        assert_eq!(key.as_str(), "abc123");
        assert!(serde_json::from_str::<MessageKey>("\"abc 123\"").is_err());
    }

    #[test]
    fn test_ttl_option_durations() {
        assert_eq!(TtlOption::FifteenMinutes.duration_secs(), 900);
        assert_eq!(TtlOption::OneHour.duration_secs(), 3600);
        assert_eq!(TtlOption::OneDay.duration_secs(), 86400);
        assert_eq!(TtlOption::FiveDays.duration_secs(), 432000);
    }

    #[test]
    fn test_ttl_option_resolve_falls_back() {
        assert_eq!(TtlOption::resolve(Some("1hour")), TtlOption::OneHour);
        assert_eq!(TtlOption::resolve(Some("bogus")), TtlOption::FiveDays);
        assert_eq!(TtlOption::resolve(Some("")), TtlOption::FiveDays);
        assert_eq!(TtlOption::resolve(None), TtlOption::FiveDays);
    }

    #[test]
    fn test_ttl_option_wire_names() {
        for opt in TtlOption::ALL {
            let json = serde_json::to_string(&opt).unwrap();
            assert_eq!(json, format!("\"{}\"", opt.as_str()));
            assert_eq!(opt.as_str().parse::<TtlOption>().unwrap(), opt);
        }
    }

    #[test]
    fn test_sensitive_bytes_debug_redacted() {
        let bytes = SensitiveBytes::new(b"hunter2".to_vec());
        let debug = format!("{:?}", bytes);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("7 bytes"));
    }

    proptest! {
        #[test]
        fn prop_alphanumeric_keys_parse(key in "[A-Za-z0-9]{1,64}") {
            prop_assert!(MessageKey::parse(key).is_ok());
        }

        #[test]
        fn prop_keys_with_other_chars_rejected(
            prefix in "[A-Za-z0-9]{0,10}",
            bad in "[^A-Za-z0-9]",
        ) {
            let key = format!("{}{}", prefix, bad);
            prop_assert!(MessageKey::parse(key).is_err());
        }
    }
}
