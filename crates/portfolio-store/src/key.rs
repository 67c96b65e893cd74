//! Tuple keys and their order-preserving byte encoding.
//!
//! A key is a sequence of string and integer parts, e.g.
//! `["emails", 1700000000000, "3f2c..."]`. The encoding keeps tuple order
//! under bytewise comparison and is self-delimiting, so the encoding of a
//! prefix tuple is a byte prefix of every key that extends it.
//!
//! - strings: `0x02`, bytes with `0x00` escaped as `0x00 0xFF`, then `0x00`
//! - integers: `0x15`, 8 bytes big-endian with the sign bit flipped

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

const TAG_STR: u8 = 0x02;
const TAG_INT: u8 = 0x15;
const ESCAPE: u8 = 0xFF;
const SIGN_BIT: u64 = 1 << 63;

/// One component of a [`KvKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyPart {
    Int(i64),
    Str(String),
}

impl From<&str> for KeyPart {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for KeyPart {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{}", n),
            Self::Str(s) => write!(f, "{}", s),
        }
    }
}

/// An ordered tuple key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KvKey(Vec<KeyPart>);

impl KvKey {
    /// The empty key; as a prefix it selects everything.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Build a key from its parts.
    pub fn from_parts<I, P>(parts: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<KeyPart>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    /// Append a part, builder style.
    #[must_use]
    pub fn with(mut self, part: impl Into<KeyPart>) -> Self {
        self.0.push(part.into());
        self
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<&KeyPart> {
        self.0.first()
    }

    /// Encode into the ordered byte representation.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16 * self.0.len());
        for part in &self.0 {
            match part {
                KeyPart::Str(s) => {
                    out.push(TAG_STR);
                    for &b in s.as_bytes() {
                        out.push(b);
                        if b == 0x00 {
                            out.push(ESCAPE);
                        }
                    }
                    out.push(0x00);
                }
                KeyPart::Int(n) => {
                    out.push(TAG_INT);
                    out.extend_from_slice(&((*n as u64) ^ SIGN_BIT).to_be_bytes());
                }
            }
        }
        out
    }

    /// Decode bytes produced by [`KvKey::encode`].
    pub fn decode(bytes: &[u8]) -> StoreResult<Self> {
        let mut parts = Vec::new();
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                TAG_STR => {
                    i += 1;
                    let mut raw = Vec::new();
                    loop {
                        let Some(&b) = bytes.get(i) else {
                            return Err(StoreError::InvalidKey(
                                "unterminated string part".to_string(),
                            ));
                        };
                        i += 1;
                        if b != 0x00 {
                            raw.push(b);
                        } else if bytes.get(i) == Some(&ESCAPE) {
                            raw.push(0x00);
                            i += 1;
                        } else {
                            break;
                        }
                    }
                    let s = String::from_utf8(raw)
                        .map_err(|e| StoreError::InvalidKey(format!("non-UTF-8 part: {}", e)))?;
                    parts.push(KeyPart::Str(s));
                }
                TAG_INT => {
                    let chunk = bytes.get(i + 1..i + 9).ok_or_else(|| {
                        StoreError::InvalidKey("truncated integer part".to_string())
                    })?;
                    let mut buf = [0u8; 8];
                    buf.copy_from_slice(chunk);
                    parts.push(KeyPart::Int((u64::from_be_bytes(buf) ^ SIGN_BIT) as i64));
                    i += 9;
                }
                tag => {
                    return Err(StoreError::InvalidKey(format!(
                        "unknown part tag 0x{:02x}",
                        tag
                    )));
                }
            }
        }
        Ok(Self(parts))
    }

    /// Parse the textual form accepted by the KV browser.
    ///
    /// A JSON array (`["emails", 170000, "id"]`) is read part by part;
    /// anything else is split on `/` with empty segments dropped.
    pub fn parse(text: &str) -> StoreResult<Self> {
        let trimmed = text.trim();
        if trimmed.starts_with('[') {
            return serde_json::from_str::<Vec<KeyPart>>(trimmed)
                .map(Self)
                .map_err(|e| StoreError::InvalidKey(format!("invalid key array: {}", e)));
        }
        Ok(Self::from_parts(
            trimmed.split('/').filter(|segment| !segment.is_empty()),
        ))
    }
}

impl fmt::Display for KvKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(&self.0) {
            Ok(json) => f.write_str(&json),
            Err(_) => Err(fmt::Error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_mixed_parts() {
        let key = KvKey::from_parts(["emails"]).with(-42_i64).with("a\0b");
        let decoded = KvKey::decode(&key.encode()).unwrap();
        assert_eq!(decoded, key);
    }

    #[test]
    fn test_integer_order_is_preserved() {
        let values = [i64::MIN, -1_000, -1, 0, 1, 1_700_000_000_000, i64::MAX];
        let encoded: Vec<Vec<u8>> = values
            .iter()
            .map(|&n| KvKey::root().with("emails").with(n).encode())
            .collect();
        let mut sorted = encoded.clone();
        sorted.sort();
        assert_eq!(encoded, sorted);
    }

    #[test]
    fn test_string_order_is_preserved() {
        let a = KvKey::root().with("abc").encode();
        let b = KvKey::root().with("abd").encode();
        let ab = KvKey::root().with("ab").encode();
        assert!(ab < a);
        assert!(a < b);
    }

    #[test]
    fn test_prefix_does_not_match_longer_collection_name() {
        let prefix = KvKey::root().with("emails").encode();
        let full = KvKey::root().with("emails").with(10_i64).with("id").encode();
        let other = KvKey::root().with("emails_by_id").with("id").encode();
        assert!(full.starts_with(&prefix));
        assert!(!other.starts_with(&prefix));
    }

    #[test]
    fn test_parse_json_array() {
        let key = KvKey::parse(r#"["contacts", 1700000000000, "abc"]"#).unwrap();
        assert_eq!(
            key.parts(),
            &[
                KeyPart::Str("contacts".to_string()),
                KeyPart::Int(1_700_000_000_000),
                KeyPart::Str("abc".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_slash_path() {
        let key = KvKey::parse("/contacts_by_id//abc/").unwrap();
        assert_eq!(key, KvKey::from_parts(["contacts_by_id", "abc"]));
    }

    #[test]
    fn test_parse_rejects_bad_array() {
        assert!(matches!(
            KvKey::parse(r#"["a", 1.5]"#),
            Err(StoreError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(KvKey::decode(&[0x99]).is_err());
        assert!(KvKey::decode(&[TAG_INT, 0, 1]).is_err());
        assert!(KvKey::decode(&[TAG_STR, b'a']).is_err());
    }

    #[test]
    fn test_display_is_json() {
        let key = KvKey::root().with("emails").with(5_i64);
        assert_eq!(key.to_string(), r#"["emails",5]"#);
    }
}
