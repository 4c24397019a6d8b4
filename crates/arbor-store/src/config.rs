use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// How raw entry-name bytes are turned into names when a tree is decoded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameEncoding {
    /// Names must be valid UTF-8; anything else is rejected.
    #[default]
    Strict,
    /// Invalid sequences are replaced with U+FFFD.
    Lossy,
}

impl NameEncoding {
    /// Decode a raw name according to this policy.
    pub fn decode(&self, raw: &[u8]) -> StoreResult<String> {
        match self {
            Self::Strict => std::str::from_utf8(raw)
                .map(str::to_owned)
                .map_err(|_| StoreError::InvalidName(String::from_utf8_lossy(raw).into_owned())),
            Self::Lossy => Ok(String::from_utf8_lossy(raw).into_owned()),
        }
    }
}

/// Configuration for an object store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Policy applied to every entry name decoded from a stored tree.
    pub name_encoding: NameEncoding,
    /// Re-hash objects on read and reject any whose content no longer
    /// matches the id it is stored under.
    pub verify_on_read: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name_encoding: NameEncoding::Strict,
            verify_on_read: false,
        }
    }
}

impl StoreConfig {
    /// Accept trees written by tools that do not guarantee UTF-8 names.
    pub fn lenient() -> Self {
        Self {
            name_encoding: NameEncoding::Lossy,
            ..Default::default()
        }
    }

    /// Verify every object read against its id.
    pub fn paranoid() -> Self {
        Self {
            verify_on_read: true,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_rejects_invalid_utf8() {
        let err = NameEncoding::Strict.decode(b"bad\xffname").unwrap_err();
        assert!(matches!(err, StoreError::InvalidName(_)));
        assert_eq!(NameEncoding::Strict.decode(b"ok.txt").unwrap(), "ok.txt");
    }

    #[test]
    fn lossy_replaces_invalid_utf8() {
        let name = NameEncoding::Lossy.decode(b"bad\xffname").unwrap();
        assert_eq!(name, "bad\u{fffd}name");
    }

    #[test]
    fn presets() {
        assert_eq!(StoreConfig::default().name_encoding, NameEncoding::Strict);
        assert!(!StoreConfig::default().verify_on_read);
        assert_eq!(StoreConfig::lenient().name_encoding, NameEncoding::Lossy);
        assert!(StoreConfig::paranoid().verify_on_read);
    }

    #[test]
    fn deserializes_partial_config() {
        let config: StoreConfig = serde_json::from_str(r#"{"name_encoding":"lossy"}"#).unwrap();
        assert_eq!(config, StoreConfig::lenient());
    }

    #[test]
    fn serde_roundtrip() {
        let config = StoreConfig::paranoid();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: StoreConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, parsed);
    }
}
