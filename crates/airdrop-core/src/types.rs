//! Core campaign types: hashes, claimant identities, claim records.
//!
//! All token amounts are in the smallest indivisible unit of the distributed
//! asset. All timestamps are absolute Unix seconds as reported by the timer
//! service; durations are relative seconds.

use std::fmt;
use std::str::FromStr;

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};

use crate::error::EncodingError;

/// Token amount in base units.
pub type Amount = u64;

/// Absolute timer time in seconds.
pub type Timestamp = u64;

/// Index into a tier-table row.
pub type Tier = u32;

/// A 32-byte hash value.
///
/// Used for merkle roots, merkle nodes and derived leaves (all BLAKE3).
/// Serialized with serde as a lowercase hex string.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
#[serde(into = "String", try_from = "String")]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// The zero hash. Never a valid campaign root.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Create a Hash256 from a byte array.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Check if this is the zero hash.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Parse a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, EncodingError> {
        decode_32(s).map(Self)
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl FromStr for Hash256 {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl From<Hash256> for String {
    fn from(h: Hash256) -> Self {
        h.to_string()
    }
}

impl TryFrom<String> for Hash256 {
    type Error = EncodingError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Public identity of a claimant: the BLAKE3 hash of its Ed25519 public key.
///
/// The identity is the ledger key for at-most-once payout and the first
/// input of the merkle leaf. It carries no secret material.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
    bincode::Encode, bincode::Decode,
)]
#[serde(into = "String", try_from = "String")]
pub struct Identity(pub [u8; 32]);

impl Identity {
    /// Create an identity from raw bytes (an already-hashed public key).
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive the identity of an Ed25519 public key.
    pub fn from_public_key(key: &VerifyingKey) -> Self {
        Self(blake3::hash(key.as_bytes()).into())
    }

    /// Derive the identity of a 32-byte encoded Ed25519 public key.
    ///
    /// Rejects byte strings that are not a valid curve point.
    pub fn from_public_key_bytes(bytes: &[u8]) -> Result<Self, EncodingError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| EncodingError::InvalidLength {
            expected: 32,
            got: bytes.len(),
        })?;
        let key = VerifyingKey::from_bytes(&arr).map_err(|_| EncodingError::InvalidPublicKey)?;
        Ok(Self::from_public_key(&key))
    }

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parse a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, EncodingError> {
        decode_32(s).map(Self)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for Identity {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<Identity> for String {
    fn from(id: Identity) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for Identity {
    type Error = EncodingError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

fn decode_32(s: &str) -> Result<[u8; 32], EncodingError> {
    let bytes = hex::decode(s).map_err(|e| EncodingError::InvalidHex(e.to_string()))?;
    let got = bytes.len();
    bytes
        .try_into()
        .map_err(|_| EncodingError::InvalidLength { expected: 32, got })
}

/// Opaque handle correlating a scheduled wakeup with its cancellation.
///
/// Tokens are unique per campaign incarnation: the high 32 bits carry the
/// incarnation, the low 32 bits a per-incarnation counter.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash,
    bincode::Encode, bincode::Decode,
)]
pub struct CancelToken(pub u64);

impl fmt::Display for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cancel-{}-{}", self.0 >> 32, self.0 & 0xFFFF_FFFF)
    }
}

/// One successfully processed claim. Written exactly once per identity.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct ClaimRecord {
    /// Claimant identity (ledger key).
    pub identity: Identity,
    /// Tier proven by the claimant's merkle leaf.
    pub tier: Tier,
    /// Amount transferred out of escrow.
    pub amount_paid: Amount,
    /// Epoch active when the payout was computed.
    pub epoch: u64,
    /// Timer time at which the claim was recorded.
    pub claimed_at: Timestamp,
}

/// Returned to the caller of a successful claim.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ClaimReceipt {
    pub identity: Identity,
    pub amount: Amount,
    pub epoch: u64,
    pub tier: Tier,
}

impl From<&ClaimRecord> for ClaimReceipt {
    fn from(record: &ClaimRecord) -> Self {
        Self {
            identity: record.identity,
            amount: record.amount_paid,
            epoch: record.epoch,
            tier: record.tier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;

    #[test]
    fn hash_display_is_lower_hex() {
        let h = Hash256([0xAB; 32]);
        assert_eq!(h.to_string(), "ab".repeat(32));
    }

    #[test]
    fn hash_hex_roundtrip() {
        let h = Hash256([0x5C; 32]);
        assert_eq!(h.to_string().parse::<Hash256>().unwrap(), h);
    }

    #[test]
    fn hash_from_hex_wrong_length() {
        let err = Hash256::from_hex("abcd").unwrap_err();
        assert_eq!(err, EncodingError::InvalidLength { expected: 32, got: 2 });
    }

    #[test]
    fn hash_from_hex_bad_char() {
        assert!(matches!(
            Hash256::from_hex(&"zz".repeat(32)),
            Err(EncodingError::InvalidHex(_))
        ));
    }

    #[test]
    fn zero_hash_is_zero() {
        assert!(Hash256::ZERO.is_zero());
        assert!(!Hash256([1; 32]).is_zero());
    }

    #[test]
    fn identity_from_public_key_is_deterministic() {
        let key = SigningKey::from_bytes(&[7u8; 32]).verifying_key();
        assert_eq!(Identity::from_public_key(&key), Identity::from_public_key(&key));
    }

    #[test]
    fn identity_differs_per_key() {
        let a = SigningKey::from_bytes(&[1u8; 32]).verifying_key();
        let b = SigningKey::from_bytes(&[2u8; 32]).verifying_key();
        assert_ne!(Identity::from_public_key(&a), Identity::from_public_key(&b));
    }

    #[test]
    fn identity_from_public_key_bytes_matches_key() {
        let key = SigningKey::from_bytes(&[9u8; 32]).verifying_key();
        let id = Identity::from_public_key_bytes(key.as_bytes()).unwrap();
        assert_eq!(id, Identity::from_public_key(&key));
    }

    #[test]
    fn identity_from_short_public_key_fails() {
        assert_eq!(
            Identity::from_public_key_bytes(&[0u8; 31]),
            Err(EncodingError::InvalidLength { expected: 32, got: 31 })
        );
    }

    #[test]
    fn identity_hex_roundtrip() {
        let id = Identity([0x42; 32]);
        assert_eq!(id.to_string().parse::<Identity>().unwrap(), id);
    }

    #[test]
    fn serde_uses_hex_strings() {
        let id = Identity([0x0F; 32]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", "0f".repeat(32)));
        assert_eq!(serde_json::from_str::<Identity>(&json).unwrap(), id);
        assert!(serde_json::from_str::<Hash256>("\"abcd\"").is_err());
    }

    #[test]
    fn cancel_token_display_splits_incarnation() {
        let token = CancelToken((3u64 << 32) | 7);
        assert_eq!(token.to_string(), "cancel-3-7");
    }

    #[test]
    fn receipt_from_record() {
        let record = ClaimRecord {
            identity: Identity([1; 32]),
            tier: 2,
            amount_paid: 650,
            epoch: 0,
            claimed_at: 100,
        };
        let receipt = ClaimReceipt::from(&record);
        assert_eq!(receipt.amount, 650);
        assert_eq!(receipt.tier, 2);
    }
}
