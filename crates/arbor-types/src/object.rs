use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Content-addressed identifier for any stored object.
///
/// An `ObjectId` is 20 raw bytes. Inside a tree encoding it is embedded in
/// raw form; everywhere a human or a reference names an object it travels
/// as 40 lowercase hex characters. Both forms convert losslessly.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId([u8; ObjectId::LEN]);

impl ObjectId {
    /// Width of the raw identifier in bytes.
    pub const LEN: usize = 20;

    /// Width of the hex form in characters.
    pub const HEX_LEN: usize = Self::LEN * 2;

    /// Compute an `ObjectId` from raw bytes (undomained BLAKE3, truncated).
    ///
    /// Handy for fixtures; stores derive ids through a domain-separated
    /// hasher instead.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut out = [0u8; Self::LEN];
        blake3::Hasher::new()
            .update(data)
            .finalize_xof()
            .fill(&mut out);
        Self(out)
    }

    /// Create an `ObjectId` from a pre-computed digest.
    pub const fn from_hash(hash: [u8; Self::LEN]) -> Self {
        Self(hash)
    }

    /// Create an `ObjectId` from a raw slice that must be exactly 20 bytes.
    pub fn from_raw(raw: &[u8]) -> Result<Self, TypeError> {
        let arr: [u8; Self::LEN] = raw.try_into().map_err(|_| TypeError::InvalidLength {
            expected: Self::LEN,
            actual: raw.len(),
        })?;
        Ok(Self(arr))
    }

    /// The null object ID (all zeros). Represents "no object".
    pub const fn null() -> Self {
        Self([0u8; Self::LEN])
    }

    /// Returns `true` if this is the null object ID.
    pub fn is_null(&self) -> bool {
        self.0 == [0u8; Self::LEN]
    }

    /// The raw 20-byte identifier.
    pub fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a 40-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Self::from_raw(&bytes)
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.short_hex())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; ObjectId::LEN]> for ObjectId {
    fn from(bytes: [u8; ObjectId::LEN]) -> Self {
        Self(bytes)
    }
}

impl From<ObjectId> for [u8; ObjectId::LEN] {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}

impl AsRef<[u8]> for ObjectId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
