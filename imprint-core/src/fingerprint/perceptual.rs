//! Perceptual hashing for near-duplicate detection.
//!
//! Uses the Blockhash algorithm, which produces a consistent 64-bit (8 byte)
//! hash that stays close (in Hamming distance) across JPEG recompression,
//! resizing and minor edits. This is a different hash family from the
//! SHA-256 content digest and the two are never compared with each other.
//!
//! # Usage
//!
//! ```no_run
//! use imprint_core::fingerprint::{FingerprintEngine, PerceptualHash};
//!
//! let engine = FingerprintEngine::default();
//! let a = engine.analyze(&std::fs::read("a.jpg").unwrap()).unwrap();
//! let b = engine.analyze(&std::fs::read("b.jpg").unwrap()).unwrap();
//!
//! let distance = a.perceptual_hash.hamming_distance(&b.perceptual_hash);
//! let similar = distance <= 10;
//! ```

use std::fmt;
use std::str::FromStr;

use blockhash::{blockhash64, Blockhash64};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fixed hash size in bytes (64 bits = 8 bytes).
pub const PERCEPTUAL_HASH_SIZE: usize = 8;

/// Number of bits in a [`PerceptualHash`]; the largest possible distance.
pub const PERCEPTUAL_HASH_BITS: u32 = (PERCEPTUAL_HASH_SIZE * 8) as u32;

/// A string could not be read as a 64-bit perceptual hash.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid perceptual hash '{value}': {reason}")]
pub struct InvalidPerceptualHash {
    pub value: String,
    pub reason: String,
}

/// 64-bit Blockhash perceptual hash.
///
/// Serialized as 16 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PerceptualHash([u8; PERCEPTUAL_HASH_SIZE]);

impl PerceptualHash {
    pub const fn new(bytes: [u8; PERCEPTUAL_HASH_SIZE]) -> Self {
        Self(bytes)
    }

    /// Compute the Blockhash64 of a decoded image.
    pub fn of_image(image: &DynamicImage) -> Self {
        let hash: Blockhash64 = blockhash64(image);
        Self(hash.into())
    }

    pub fn as_bytes(&self) -> &[u8; PERCEPTUAL_HASH_SIZE] {
        &self.0
    }

    /// Number of differing bits between two hashes.
    pub fn hamming_distance(&self, other: &Self) -> u32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }

    /// `true` if the hashes are within `threshold` bits of each other.
    pub fn is_similar(&self, other: &Self, threshold: u32) -> bool {
        self.hamming_distance(other) <= threshold
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, InvalidPerceptualHash> {
        let invalid = |reason: String| InvalidPerceptualHash {
            value: hex_str.to_string(),
            reason,
        };

        let bytes = hex::decode(hex_str).map_err(|e| invalid(e.to_string()))?;
        let bytes: [u8; PERCEPTUAL_HASH_SIZE] = bytes.try_into().map_err(|v: Vec<u8>| {
            invalid(format!(
                "expected {} bytes, got {}",
                PERCEPTUAL_HASH_SIZE,
                v.len()
            ))
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for PerceptualHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for PerceptualHash {
    type Err = InvalidPerceptualHash;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<PerceptualHash> for String {
    fn from(hash: PerceptualHash) -> Self {
        hash.to_hex()
    }
}

impl TryFrom<String> for PerceptualHash {
    type Error = InvalidPerceptualHash;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}
