//! Utility functions and helpers

use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

/// Generate unique order id
pub fn generate_id() -> uuid::Uuid {
    uuid::Uuid::new_v4()
}

/// Shorten an address or signature for log lines
pub fn short_id(value: &str) -> String {
    if value.len() <= 16 {
        return value.to_string();
    }
    format!("{}...{}", &value[..8], &value[value.len() - 8..])
}

pub fn parse_pubkey(field: &str, value: &str) -> Result<Pubkey, String> {
    Pubkey::from_str(value.trim()).map_err(|e| format!("invalid {} '{}': {}", field, value, e))
}

/// Serde adapter rendering a `Pubkey` as its base58 string
pub mod pubkey_string {
    use serde::{Deserialize, Deserializer, Serializer};
    use solana_sdk::pubkey::Pubkey;
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(key: &Pubkey, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(key)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Pubkey, D::Error> {
        let s = String::deserialize(deserializer)?;
        Pubkey::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for integer amounts the upstream sends either as a JSON
/// string (`"10000000"`) or as a number.
pub mod u64_string {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        Str(String),
        Num(u64),
    }

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        match StringOrNumber::deserialize(deserializer)? {
            StringOrNumber::Str(s) => s.trim().parse::<u64>().map_err(serde::de::Error::custom),
            StringOrNumber::Num(n) => Ok(n),
        }
    }

    pub mod option {
        use super::StringOrNumber;
        use serde::{Deserialize, Deserializer};

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
            match Option::<StringOrNumber>::deserialize(deserializer)? {
                None => Ok(None),
                Some(StringOrNumber::Str(s)) if s.trim().is_empty() => Ok(None),
                Some(StringOrNumber::Str(s)) => s.trim().parse::<u64>().map(Some).map_err(serde::de::Error::custom),
                Some(StringOrNumber::Num(n)) => Ok(Some(n)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Wire {
        #[serde(with = "u64_string")]
        amount: u64,
        #[serde(default, deserialize_with = "u64_string::option::deserialize")]
        maybe: Option<u64>,
    }

    #[test]
    fn test_u64_string_accepts_both_forms() {
        let a: Wire = serde_json::from_str(r#"{"amount":"10000000"}"#).unwrap();
        assert_eq!(a.amount, 10_000_000);
        assert_eq!(a.maybe, None);

        let b: Wire = serde_json::from_str(r#"{"amount":42,"maybe":"7"}"#).unwrap();
        assert_eq!(b.amount, 42);
        assert_eq!(b.maybe, Some(7));

        assert!(serde_json::from_str::<Wire>(r#"{"amount":"1.5"}"#).is_err());
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("abc"), "abc");
        assert_eq!(
            short_id("5VERv8NMvzbJMEkV8xnrLkEaWRtSz9CosKDYjCJjBRnbJLgp8uirBgmQpjKhoR4tjF3ZpRzrFmBV6UjKdiSZkQUW"),
            "5VERv8NM...diSZkQUW"
        );
    }
}
