//! Image fingerprinting.
//!
//! Two hashes are derived from a single decode of the uploaded image:
//!
//! - **Content digest**: SHA-256 over the canonical pixel buffer (grayscale,
//!   resized to 128x128, row-major). Exact-match only; any pixel change after
//!   decode yields an unrelated digest.
//! - **Perceptual hash**: 64-bit Blockhash, comparable by Hamming distance for
//!   near-duplicate search.

pub mod perceptual;

pub use perceptual::{
    InvalidPerceptualHash, PerceptualHash, PERCEPTUAL_HASH_BITS, PERCEPTUAL_HASH_SIZE,
};

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use image::imageops::{self, FilterType};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::error::DecodeError;

/// Side length of the canonical grayscale image the digest is computed over.
pub const CANONICAL_SIZE: u32 = 128;

/// Resampling filter used for the canonical resize.
pub const CANONICAL_FILTER: FilterType = FilterType::CatmullRom;

/// Size of a content digest in bytes (SHA-256).
pub const DIGEST_SIZE: usize = 32;

/// A string could not be read as a content digest.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid content digest '{0}'")]
pub struct InvalidDigest(pub String);

/// SHA-256 digest of the canonical pixel buffer.
///
/// Serialized as 64 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ContentDigest([u8; DIGEST_SIZE]);

impl ContentDigest {
    /// Hash an already-canonicalized pixel buffer.
    pub fn of_pixels(pixels: &[u8]) -> Self {
        Self(Sha256::digest(pixels).into())
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, InvalidDigest> {
        hex::decode(hex_str)
            .ok()
            .and_then(|bytes| bytes.try_into().ok())
            .map(Self)
            .ok_or_else(|| InvalidDigest(hex_str.to_string()))
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ContentDigest {
    type Err = InvalidDigest;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<ContentDigest> for String {
    fn from(digest: ContentDigest) -> Self {
        digest.to_hex()
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = InvalidDigest;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

/// Both hashes computed for one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageFingerprint {
    pub digest: ContentDigest,
    pub perceptual_hash: PerceptualHash,
}

/// Normalizes images and computes their fingerprints.
///
/// The engine is `Copy` and holds no state, so it can be moved freely into
/// blocking tasks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FingerprintEngine {
    size: u32,
    filter: FilterType,
}

impl Default for FingerprintEngine {
    fn default() -> Self {
        Self {
            size: CANONICAL_SIZE,
            filter: CANONICAL_FILTER,
        }
    }
}

impl FingerprintEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the content digest of encoded image bytes.
    pub fn fingerprint(&self, image_data: &[u8]) -> Result<ContentDigest, DecodeError> {
        let image = image::load_from_memory(image_data)?;
        Ok(self.digest_image(&image))
    }

    /// Read a file and compute its content digest.
    pub fn fingerprint_file(&self, path: &Path) -> Result<ContentDigest, DecodeError> {
        let data = std::fs::read(path).map_err(|source| DecodeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.fingerprint(&data)
    }

    /// Decode once and compute both the content digest and the perceptual hash.
    #[instrument(level = "debug", skip_all, fields(bytes = image_data.len()))]
    pub fn analyze(&self, image_data: &[u8]) -> Result<ImageFingerprint, DecodeError> {
        let image = image::load_from_memory(image_data)?;
        let fingerprint = ImageFingerprint {
            digest: self.digest_image(&image),
            perceptual_hash: PerceptualHash::of_image(&image),
        };
        debug!(
            width = image.width(),
            height = image.height(),
            digest = %fingerprint.digest,
            "Fingerprinted image"
        );
        Ok(fingerprint)
    }

    /// [`analyze`](Self::analyze) on the blocking thread pool.
    pub async fn analyze_blocking(
        &self,
        image_data: std::sync::Arc<[u8]>,
    ) -> Result<ImageFingerprint, DecodeError> {
        let engine = *self;
        tokio::task::spawn_blocking(move || engine.analyze(&image_data))
            .await
            .map_err(|e| DecodeError::Task(e.to_string()))?
    }

    pub fn digest_image(&self, image: &DynamicImage) -> ContentDigest {
        ContentDigest::of_pixels(&self.canonical_pixels(image))
    }

    /// Grayscale, resize to `size x size`, and return the row-major luma bytes.
    pub fn canonical_pixels(&self, image: &DynamicImage) -> Vec<u8> {
        let gray = image.to_luma8();
        imageops::resize(&gray, self.size, self.size, self.filter).into_raw()
    }
}
