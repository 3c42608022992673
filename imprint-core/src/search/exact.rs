//! Exact-match search over a reference dataset directory.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use tracing::{debug, instrument, warn};
use walkdir::WalkDir;

use crate::error::SearchError;
use crate::fingerprint::{ContentDigest, FingerprintEngine};

/// Cached digest for one dataset file, valid while mtime and length match.
#[derive(Debug, Clone, Copy)]
struct CachedDigest {
    modified: SystemTime,
    len: u64,
    /// `None` when the file is not a decodable image
    digest: Option<ContentDigest>,
}

#[derive(Debug, Default)]
struct DigestCache {
    entries: HashMap<PathBuf, CachedDigest>,
}

/// A regular file found in the dataset.
#[derive(Debug, Clone)]
struct DatasetFile {
    path: PathBuf,
    identifier: String,
}

/// Scans a dataset directory for images with a given content digest.
///
/// Every call enumerates the directory again. With caching enabled, a file's
/// digest is only recomputed when its modification time or length changes,
/// and entries for removed files are dropped on the next scan.
#[derive(Debug, Clone)]
pub struct ExactMatchSearcher {
    root: PathBuf,
    recursive: bool,
    engine: FingerprintEngine,
    cache: Option<Arc<Mutex<DigestCache>>>,
}

impl ExactMatchSearcher {
    /// Searcher over the top level of `root`, without caching.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            recursive: false,
            engine: FingerprintEngine::default(),
            cache: None,
        }
    }

    /// Also descend into subdirectories. Identifiers become `/`-separated
    /// paths relative to the dataset root.
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache = enabled.then(|| Arc::new(Mutex::new(DigestCache::default())));
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Identifiers of every dataset image whose digest equals `query`, sorted.
    ///
    /// An empty dataset yields an empty list. A missing or unreadable dataset
    /// root is an error.
    #[instrument(level = "debug", skip(self), fields(root = %self.root.display()))]
    pub fn find_exact(&self, query: &ContentDigest) -> Result<Vec<String>, SearchError> {
        let files = self.enumerate()?;
        let mut matches = Vec::new();

        for file in &files {
            if self.digest_of(&file.path) == Some(*query) {
                matches.push(file.identifier.clone());
            }
        }

        self.prune_cache(&files);

        matches.sort();
        debug!(scanned = files.len(), matches = matches.len(), "Exact search complete");
        Ok(matches)
    }

    /// [`find_exact`](Self::find_exact) on the blocking thread pool.
    pub async fn find_exact_blocking(
        &self,
        query: ContentDigest,
    ) -> Result<Vec<String>, SearchError> {
        let searcher = self.clone();
        tokio::task::spawn_blocking(move || searcher.find_exact(&query))
            .await
            .map_err(|e| SearchError::Task(e.to_string()))?
    }

    /// Regular files in the dataset, sorted by identifier.
    fn enumerate(&self) -> Result<Vec<DatasetFile>, SearchError> {
        if !self.root.exists() {
            return Err(SearchError::DatasetMissing(self.root.clone()));
        }
        if !self.root.is_dir() {
            return Err(SearchError::Unreadable {
                path: self.root.clone(),
                reason: "not a directory".into(),
            });
        }

        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let mut files = Vec::new();

        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(max_depth) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    return Err(SearchError::Unreadable {
                        path: self.root.clone(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable dataset entry");
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let identifier = self.identifier_for(entry.path());
            files.push(DatasetFile {
                path: entry.into_path(),
                identifier,
            });
        }

        files.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        Ok(files)
    }

    fn identifier_for(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Digest of a dataset file, or `None` if it cannot be read or decoded.
    fn digest_of(&self, path: &Path) -> Option<ContentDigest> {
        let Some(cache) = &self.cache else {
            return self.compute_digest(path);
        };

        let stamp = std::fs::metadata(path)
            .ok()
            .and_then(|meta| Some((meta.modified().ok()?, meta.len())));

        if let Some((modified, len)) = stamp {
            let cache = cache.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(cached) = cache.entries.get(path) {
                if cached.modified == modified && cached.len == len {
                    return cached.digest;
                }
            }
        }

        let digest = self.compute_digest(path);

        if let Some((modified, len)) = stamp {
            let mut cache = cache.lock().unwrap_or_else(|e| e.into_inner());
            cache.entries.insert(
                path.to_path_buf(),
                CachedDigest {
                    modified,
                    len,
                    digest,
                },
            );
        }

        digest
    }

    fn compute_digest(&self, path: &Path) -> Option<ContentDigest> {
        match self.engine.fingerprint_file(path) {
            Ok(digest) => Some(digest),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Skipping non-image dataset file");
                None
            }
        }
    }

    fn prune_cache(&self, files: &[DatasetFile]) {
        if let Some(cache) = &self.cache {
            let present: HashSet<&Path> = files.iter().map(|f| f.path.as_path()).collect();
            let mut cache = cache.lock().unwrap_or_else(|e| e.into_inner());
            cache.entries.retain(|path, _| present.contains(path.as_path()));
        }
    }

    #[cfg(test)]
    fn cached_entries(&self) -> usize {
        self.cache
            .as_ref()
            .map(|c| c.lock().unwrap().entries.len())
            .unwrap_or(0)
    }
}
