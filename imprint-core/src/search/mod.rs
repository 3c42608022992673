//! Duplicate search.
//!
//! - [`ExactMatchSearcher`] scans a reference dataset for images whose content
//!   digest equals the query digest.
//! - [`SimilaritySearcher`] compares perceptual hashes from a store snapshot
//!   against the query by Hamming distance.
//!
//! Both return results in a deterministic order regardless of how the
//! filesystem or store enumerates entries.

pub mod exact;
pub mod similar;

pub use exact::ExactMatchSearcher;
pub use similar::{find_similar, SimilaritySearcher, DEFAULT_THRESHOLD};

use serde::{Deserialize, Serialize};

/// One search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub identifier: String,
    /// Hamming distance from the query; always 0 for exact matches
    pub distance: u32,
}

/// Matches found for one query.
///
/// An empty `matches` list means the search ran and found nothing. Failed
/// searches are reported as errors, never as an empty result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub query: String,
    pub matches: Vec<Match>,
}

impl MatchResult {
    /// Wrap exact-match identifiers (distance 0).
    pub fn exact(query: impl Into<String>, identifiers: Vec<String>) -> Self {
        Self {
            query: query.into(),
            matches: identifiers
                .into_iter()
                .map(|identifier| Match {
                    identifier,
                    distance: 0,
                })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}
