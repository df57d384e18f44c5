//! Hex digest type used by the manifest and the content verifier
//!
//! Manifest values are hex strings. They are validated and normalized to
//! lowercase on parse so that comparison is case insensitive. Digests computed
//! locally are MD5, but the manifest does not enforce a digest length.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{ManifestError, ManifestResult};

/// Lowercase hex content digest
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HexDigest(String);

impl HexDigest {
    /// Parse a hex digest (case insensitive)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use astrovision_sync::app::HexDigest;
    ///
    /// let lower = HexDigest::from_hex("50c9d1c465f3cbff652be1509c2e2a4e")?;
    /// let upper = HexDigest::from_hex("50C9D1C465F3CBFF652BE1509C2E2A4E")?;
    /// assert_eq!(lower, upper);
    /// # Ok::<(), astrovision_sync::errors::ManifestError>(())
    /// ```
    pub fn from_hex(hex: &str) -> ManifestResult<Self> {
        if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ManifestError::InvalidHash {
                hash: hex.to_string(),
            });
        }

        Ok(HexDigest(hex.to_ascii_lowercase()))
    }

    /// MD5 digest of an in-memory buffer
    pub fn md5_of(data: impl AsRef<[u8]>) -> Self {
        Self::from(md5::compute(data))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<md5::Digest> for HexDigest {
    fn from(digest: md5::Digest) -> Self {
        // Digest's LowerHex impl yields 32 lowercase characters
        HexDigest(format!("{:x}", digest))
    }
}

impl fmt::Display for HexDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for HexDigest {
    type Err = ManifestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for HexDigest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for HexDigest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let hex_string = String::deserialize(deserializer)?;
        Self::from_hex(&hex_string).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_is_normalized_to_lowercase() {
        let mixed = "50c9D1C465f3CBFF652be1509c2E2A4e";
        let digest = HexDigest::from_hex(mixed).unwrap();
        assert_eq!(digest.as_str(), mixed.to_lowercase());
        assert_eq!(format!("{}", digest), mixed.to_lowercase());
        assert_eq!(digest, "50C9D1C465F3CBFF652BE1509C2E2A4E".parse().unwrap());
    }

    #[test]
    fn test_invalid_hex_strings() {
        let invalid_cases = ["", "50c9d1c465g3", "50c9 d1c4", "+0c9d1", "-abc", "abc123é"];

        for hex in &invalid_cases {
            assert!(HexDigest::from_hex(hex).is_err(), "Should reject: {}", hex);
        }
    }

    #[test]
    fn test_md5_of_matches_known_digest() {
        // RFC 1321 test suite
        assert_eq!(
            HexDigest::md5_of(b"").as_str(),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
        assert_eq!(
            HexDigest::md5_of(b"abc").as_str(),
            "900150983cd24fb0d6963f7d28e17f72"
        );
    }

    #[test]
    fn test_serializes_as_hex_string() {
        let digest = HexDigest::from_hex("9734FAA872681f96b144f60d29d52011").unwrap();
        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json, "\"9734faa872681f96b144f60d29d52011\"");

        let parsed: HexDigest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, digest);
        assert!(serde_json::from_str::<HexDigest>("\"not hex\"").is_err());
    }
}
