//! Hamming-distance search over perceptual hashes.

use super::Match;
use crate::fingerprint::PerceptualHash;

/// Default similarity threshold (Hamming distance)
pub const DEFAULT_THRESHOLD: u32 = 10;

/// Threshold-bounded near-duplicate search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimilaritySearcher {
    threshold: u32,
    limit: Option<usize>,
}

impl Default for SimilaritySearcher {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl SimilaritySearcher {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            limit: None,
        }
    }

    /// Keep at most `limit` closest matches.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn find_similar<'a>(
        &self,
        query: &PerceptualHash,
        candidates: impl IntoIterator<Item = (&'a str, PerceptualHash)>,
    ) -> Vec<Match> {
        let mut matches = find_similar(query, self.threshold, candidates);
        if let Some(limit) = self.limit {
            matches.truncate(limit);
        }
        matches
    }
}

/// Every candidate within `threshold` bits of `query`.
///
/// Sorted by distance (closest first), ties broken by identifier.
/// `threshold = 0` is exact perceptual-hash equality.
pub fn find_similar<'a>(
    query: &PerceptualHash,
    threshold: u32,
    candidates: impl IntoIterator<Item = (&'a str, PerceptualHash)>,
) -> Vec<Match> {
    let mut matches: Vec<Match> = candidates
        .into_iter()
        .filter_map(|(identifier, hash)| {
            let distance = query.hamming_distance(&hash);
            (distance <= threshold).then(|| Match {
                identifier: identifier.to_string(),
                distance,
            })
        })
        .collect();

    matches.sort_by(|a, b| {
        a.distance
            .cmp(&b.distance)
            .then_with(|| a.identifier.cmp(&b.identifier))
    });
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash_with_bits(bits: u32) -> PerceptualHash {
        let value: u64 = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };
        PerceptualHash::new(value.to_be_bytes())
    }

    #[test]
    fn test_empty_candidates() {
        let query = PerceptualHash::new([0; 8]);
        assert!(find_similar(&query, 10, Vec::<(&str, PerceptualHash)>::new()).is_empty());
    }

    #[test]
    fn test_includes_iff_within_threshold() {
        let query = PerceptualHash::new([0; 8]);
        for bits in [0u32, 1, 5, 9, 10, 11, 32, 64] {
            let candidate = hash_with_bits(bits);
            for threshold in [0u32, 5, 10, 64] {
                let found = find_similar(&query, threshold, [("c", candidate)]);
                assert_eq!(
                    !found.is_empty(),
                    bits <= threshold,
                    "bits={} threshold={}",
                    bits,
                    threshold
                );
                if let Some(m) = found.first() {
                    assert_eq!(m.distance, bits);
                }
            }
        }
    }

    #[test]
    fn test_threshold_zero_is_exact_equality() {
        let query = PerceptualHash::new([0xAB; 8]);
        let other = PerceptualHash::new([0xAB, 0xAB, 0xAB, 0xAB, 0xAB, 0xAB, 0xAB, 0xAA]);

        let found = find_similar(&query, 0, [("same", query), ("other", other)]);
        assert_eq!(
            found,
            vec![Match {
                identifier: "same".into(),
                distance: 0
            }]
        );
    }

    #[test]
    fn test_ordering_by_distance_then_identifier() {
        let query = PerceptualHash::new([0; 8]);
        let candidates = [
            ("zeta.png", hash_with_bits(2)),
            ("alpha.png", hash_with_bits(2)),
            ("mid.png", hash_with_bits(1)),
            ("far.png", hash_with_bits(30)),
            ("exact.png", hash_with_bits(0)),
        ];

        let found = find_similar(&query, 10, candidates);
        let order: Vec<(&str, u32)> = found
            .iter()
            .map(|m| (m.identifier.as_str(), m.distance))
            .collect();
        assert_eq!(
            order,
            vec![
                ("exact.png", 0),
                ("mid.png", 1),
                ("alpha.png", 2),
                ("zeta.png", 2)
            ]
        );
    }

    #[test]
    fn test_searcher_limit() {
        let query = PerceptualHash::new([0; 8]);
        let searcher = SimilaritySearcher::new(8).with_limit(2);
        let candidates = [
            ("c", hash_with_bits(3)),
            ("a", hash_with_bits(1)),
            ("b", hash_with_bits(2)),
        ];

        let found = searcher.find_similar(&query, candidates);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].identifier, "a");
        assert_eq!(found[1].identifier, "b");
        assert_eq!(searcher.threshold(), 8);
    }
}
