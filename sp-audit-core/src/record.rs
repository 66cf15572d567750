//! Canonical tweak record representation.
//!
//! Every backend response, whatever its wire format, is reduced to a set of
//! `TweakRecord`s before anything is compared.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::{AuditError, Result};

/// Ordered set of records produced by one backend for one block.
pub type TweakSet = BTreeSet<TweakRecord>;

/// A single BIP352 tweak reported by a backend.
///
/// # Identity
///
/// A record is identified by its block height and canonical tweak value.
/// The txid is carried as metadata when the backend reports one; it never
/// takes part in equality or ordering, so an electrs-style object list and a
/// bare Bitcoin Core tweak array with the same tweaks compare equal.
///
/// # Example
///
/// ```rust
/// use sp_audit_core::TweakRecord;
///
/// let rec = TweakRecord::new(840_000, Some("FF00"), "0xAB01").unwrap();
/// assert_eq!(rec.tweak_value(), "ab01");
/// assert_eq!(rec.identity_key(), "ab01");
/// assert_eq!(rec.txid(), Some("ff00"));
/// assert_eq!(rec, TweakRecord::new(840_000, None, "ab01").unwrap());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TweakRecord {
    block_height: u64,
    tweak_value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    txid: Option<String>,
}

impl TweakRecord {
    /// Build a normalized record.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTweak` if `tweak` is empty or not valid hex.
    pub fn new(block_height: u64, txid: Option<&str>, tweak: &str) -> Result<Self> {
        Ok(Self {
            block_height,
            tweak_value: canonical_hex(tweak)?,
            txid: txid.and_then(canonical_txid),
        })
    }

    /// Build a record from raw tweak bytes (gRPC payloads).
    pub fn from_bytes(block_height: u64, tweak: &[u8]) -> Result<Self> {
        if tweak.is_empty() {
            return Err(AuditError::InvalidTweak(String::new()));
        }
        Ok(Self {
            block_height,
            tweak_value: hex::encode(tweak),
            txid: None,
        })
    }

    /// Re-apply normalization. Idempotent on records built by this module;
    /// used on records deserialized from disk.
    pub fn normalized(&self) -> Result<Self> {
        Ok(Self {
            block_height: self.block_height,
            tweak_value: canonical_hex(&self.tweak_value)?,
            txid: self.txid.as_deref().and_then(canonical_txid),
        })
    }

    #[inline]
    pub fn block_height(&self) -> u64 {
        self.block_height
    }

    /// Comparison key: the canonical tweak value.
    #[inline]
    pub fn identity_key(&self) -> &str {
        &self.tweak_value
    }

    #[inline]
    pub fn tweak_value(&self) -> &str {
        &self.tweak_value
    }

    #[inline]
    pub fn txid(&self) -> Option<&str> {
        self.txid.as_deref()
    }

    fn key(&self) -> (u64, &str) {
        (self.block_height, &self.tweak_value)
    }
}

impl PartialEq for TweakRecord {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for TweakRecord {}

impl PartialOrd for TweakRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TweakRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl Hash for TweakRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

/// Canonicalize a hex string: trimmed, no `0x`, lower-case, even length.
pub fn canonical_hex(value: &str) -> Result<String> {
    let stripped = strip_hex_prefix(value);
    if stripped.is_empty() || hex::decode(stripped).is_err() {
        return Err(AuditError::InvalidTweak(value.to_string()));
    }
    Ok(stripped.to_ascii_lowercase())
}

fn canonical_txid(txid: &str) -> Option<String> {
    let stripped = strip_hex_prefix(txid);
    (!stripped.is_empty()).then(|| stripped.to_ascii_lowercase())
}

fn strip_hex_prefix(value: &str) -> &str {
    let trimmed = value.trim();
    trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tweak_is_lowercased_and_unprefixed() {
        let rec = TweakRecord::new(1, None, "  0xDEADbeef ").unwrap();
        assert_eq!(rec.tweak_value(), "deadbeef");
    }

    #[test]
    fn test_txid_kept_as_metadata() {
        let rec = TweakRecord::new(1, Some("AABB"), "01").unwrap();
        assert_eq!(rec.txid(), Some("aabb"));
        assert_eq!(rec.identity_key(), "01");
        assert_eq!(rec.tweak_value(), "01");
    }

    #[test]
    fn test_blank_txid_dropped() {
        let rec = TweakRecord::new(1, Some(""), "0f").unwrap();
        assert_eq!(rec.txid(), None);
        assert_eq!(rec.identity_key(), "0f");
    }

    #[test]
    fn test_txid_does_not_affect_equality() {
        let with_txid = TweakRecord::new(3, Some("11"), "02aa").unwrap();
        let other_txid = TweakRecord::new(3, Some("22"), "02AA").unwrap();
        let bare = TweakRecord::new(3, None, "02aa").unwrap();
        assert_eq!(with_txid, bare);
        assert_eq!(with_txid, other_txid);

        let set: TweakSet = [with_txid, other_txid, bare].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_invalid_hex_rejected() {
        assert!(TweakRecord::new(1, None, "xyz").is_err());
        assert!(TweakRecord::new(1, None, "abc").is_err()); // odd length
        assert!(TweakRecord::new(1, None, "").is_err());
        assert!(TweakRecord::new(1, None, "0x").is_err());
    }

    #[test]
    fn test_from_bytes_matches_hex_form() {
        let from_bytes = TweakRecord::from_bytes(7, &[0xaa; 33]).unwrap();
        let from_hex = TweakRecord::new(7, None, &"AA".repeat(33)).unwrap();
        assert_eq!(from_bytes, from_hex);
    }

    #[test]
    fn test_normalization_idempotent() {
        let rec = TweakRecord::new(5, Some("0xFF00"), "0XABCD").unwrap();
        let again = rec.normalized().unwrap();
        assert_eq!(rec, again);
        assert_eq!(again.txid(), Some("ff00"));
        assert_eq!(again.normalized().unwrap(), again);
    }

    #[test]
    fn test_equal_after_normalization() {
        let a = TweakRecord::new(9, None, "ABCD").unwrap();
        let b = TweakRecord::new(9, None, "0xabcd").unwrap();
        assert_eq!(a, b);

        let mut set = TweakSet::new();
        set.insert(a);
        set.insert(b);
        assert_eq!(set.len(), 1);
    }
}
