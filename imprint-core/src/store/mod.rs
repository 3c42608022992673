//! Fingerprint store.
//!
//! Persistent mapping from a unique content key (usually the upload's
//! filename) to its fingerprint. Writes use upsert semantics: storing an
//! existing key replaces its hashes in place and never creates a second row.
//!
//! Two backends are provided:
//!
//! - [`SqliteFingerprintStore`] - embedded SQLite via sqlx, used by the server
//! - [`MemoryFingerprintStore`] - in-process map, for tests and ephemeral runs

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemoryFingerprintStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteFingerprintStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::fingerprint::{ContentDigest, ImageFingerprint, PerceptualHash};

/// A stored fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintRecord {
    /// Unique content key
    pub key: String,
    /// SHA-256 content digest
    pub hash_value: ContentDigest,
    /// 64-bit perceptual hash used for similarity search
    pub perceptual_hash: PerceptualHash,
    /// Time of the last write to this key
    pub updated_at: DateTime<Utc>,
}

impl FingerprintRecord {
    pub fn new(key: impl Into<String>, fingerprint: ImageFingerprint) -> Self {
        Self {
            key: key.into(),
            hash_value: fingerprint.digest,
            perceptual_hash: fingerprint.perceptual_hash,
            updated_at: Utc::now(),
        }
    }
}

/// Keyed fingerprint persistence shared by concurrent requests.
///
/// Implementations must make `upsert` atomic: a concurrent reader observes
/// either the previous record or the new one, never a mix of the two.
#[async_trait]
pub trait FingerprintStore: Send + Sync {
    /// Insert the record, or replace the existing record with the same key.
    async fn upsert(&self, record: &FingerprintRecord) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<FingerprintRecord>, StoreError>;

    /// All records, ordered by key.
    async fn list(&self) -> Result<Vec<FingerprintRecord>, StoreError>;

    /// Remove a record. Returns `false` when the key was not present.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    async fn count(&self) -> Result<u64, StoreError>;
}
