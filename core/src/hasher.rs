//! Hashers (feature-gated), the digest type, and utilities for implementing them.
//!
//! Every node of the block tree is a 256-bit [`Digest`]. Externally, digests are always rendered
//! as 64 lowercase hex characters, and internal nodes are computed over that rendering: the
//! preimage of a parent is the 128-byte ASCII string `hex(left) ++ hex(right)`. This keeps roots
//! compatible with commitments produced by tooling that works on hex strings.

use core::{fmt, str::FromStr};

#[cfg(not(feature = "std"))]
use alloc::string::String;

/// Length of the hex rendering of a [`Digest`].
pub const HEX_LEN: usize = 64;

/// A 256-bit hash value. Leaves, internal nodes and the root of the block tree are all digests.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "borsh",
    derive(borsh::BorshDeserialize, borsh::BorshSerialize)
)]
pub struct Digest(pub [u8; 32]);

impl Digest {
    /// Render the digest as 64 lowercase ASCII hex bytes without allocating.
    pub fn hex_bytes(&self) -> [u8; HEX_LEN] {
        const TABLE: &[u8; 16] = b"0123456789abcdef";
        let mut out = [0u8; HEX_LEN];
        for (i, byte) in self.0.iter().enumerate() {
            out[i * 2] = TABLE[(byte >> 4) as usize];
            out[i * 2 + 1] = TABLE[(byte & 0x0f) as usize];
        }
        out
    }

    /// Render the digest as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a digest from exactly 64 lowercase hex characters.
    pub fn from_hex(s: &str) -> Result<Self, DigestParseError> {
        if s.len() != HEX_LEN {
            return Err(DigestParseError::InvalidLength(s.len()));
        }
        // uppercase is rejected: two renderings of the same digest must never both be accepted.
        if let Some(pos) = s
            .bytes()
            .position(|b| !matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        {
            return Err(DigestParseError::InvalidCharacter(pos));
        }
        let mut out = [0u8; 32];
        hex::decode_to_slice(s, &mut out).map_err(|_| DigestParseError::InvalidCharacter(0))?;
        Ok(Digest(out))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.hex_bytes();
        // UNWRAP: the hex table only yields ASCII.
        f.write_str(core::str::from_utf8(&hex).unwrap())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self)
    }
}

impl FromStr for Digest {
    type Err = DigestParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Digest::from_hex(s)
    }
}

impl From<[u8; 32]> for Digest {
    fn from(bytes: [u8; 32]) -> Self {
        Digest(bytes)
    }
}

/// Errors when parsing a [`Digest`] from its hex rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestParseError {
    /// The input was not 64 characters long.
    InvalidLength(usize),
    /// The input had a character that is not lowercase hex at the given position.
    InvalidCharacter(usize),
}

impl fmt::Display for DigestParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DigestParseError::InvalidLength(len) => {
                write!(f, "expected {} hex characters, got {}", HEX_LEN, len)
            }
            DigestParseError::InvalidCharacter(pos) => {
                write!(f, "invalid lowercase hex character at position {}", pos)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DigestParseError {}

#[cfg(feature = "serde")]
impl serde::Serialize for Digest {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let hex = self.hex_bytes();
        // UNWRAP: the hex table only yields ASCII.
        serializer.serialize_str(core::str::from_utf8(&hex).unwrap())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Digest {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DigestVisitor;

        impl<'de> serde::de::Visitor<'de> for DigestVisitor {
            type Value = Digest;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a 64 character lowercase hex digest")
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Digest, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_str(DigestVisitor)
    }
}

/// A simple trait for representing binary hash functions.
pub trait BinaryHash {
    /// Given a bit-string, produce a 256-bit hash.
    fn hash(input: &[u8]) -> [u8; 32];

    /// An optional specialization of `hash` where there are two hex-rendered inputs, left and
    /// right.
    fn hash2_64_concat(left: &[u8; HEX_LEN], right: &[u8; HEX_LEN]) -> [u8; 32] {
        let mut buf = [0u8; HEX_LEN * 2];
        buf[..HEX_LEN].copy_from_slice(left);
        buf[HEX_LEN..].copy_from_slice(right);
        Self::hash(&buf)
    }
}

/// Blanket implementation for all implementations of `Digest`
impl<H: digest::Digest<OutputSize = digest::typenum::U32>> BinaryHash for H {
    fn hash(input: &[u8]) -> [u8; 32] {
        H::digest(input).into()
    }

    fn hash2_64_concat(left: &[u8; HEX_LEN], right: &[u8; HEX_LEN]) -> [u8; 32] {
        let mut hasher = H::new();
        hasher.update(left);
        hasher.update(right);
        hasher.finalize().into()
    }
}

/// A block tree hash function.
///
/// Leaves are the hash of raw block content. Internal nodes are the hash of the concatenated hex
/// renderings of their children, left first. The combination is never commutative.
pub trait NodeHasher {
    /// The binary hash backing this node hasher.
    type Hash: BinaryHash;

    /// The algorithm name recorded in commitments, e.g. `SHA3-256`.
    const ALGORITHM: &'static str;

    /// Hash the content of a block into a leaf.
    fn hash_leaf(data: &[u8]) -> Digest {
        Digest(Self::Hash::hash(data))
    }

    /// Hash an internal node from its left and right children.
    fn hash_internal(left: &Digest, right: &Digest) -> Digest {
        Digest(Self::Hash::hash2_64_concat(
            &left.hex_bytes(),
            &right.hex_bytes(),
        ))
    }

    /// Hash an arbitrary string. Used for descriptive digests which are not part of any tree.
    fn hash_str(s: &str) -> Digest {
        Digest(Self::Hash::hash(s.as_bytes()))
    }
}

#[cfg(feature = "sha3-hasher")]
pub use self::sha3::Sha3Hasher;

/// A node hasher making use of sha3-256.
#[cfg(feature = "sha3-hasher")]
pub mod sha3 {
    use super::NodeHasher;

    /// The canonical block tree hasher.
    pub struct Sha3Hasher;

    impl NodeHasher for Sha3Hasher {
        type Hash = ::sha3::Sha3_256;

        const ALGORITHM: &'static str = "SHA3-256";
    }
}
