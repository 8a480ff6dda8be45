//! Shared artifact map.
//!
//! Tasks accumulate artifacts (path → content) produced by their agents.
//! A sub-agent works against its own map; on completion the delegation path
//! merges it into the parent's map under a last-writer-wins rule keyed by
//! path. The map is cheap to clone (shared interior) and safe for concurrent
//! access.

use std::sync::Arc;

use dashmap::DashMap;

/// Concurrent path-keyed artifact store.
#[derive(Clone, Debug, Default)]
pub struct ArtifactMap {
    inner: Arc<DashMap<String, String>>,
}

impl ArtifactMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an artifact.
    pub fn insert(&self, path: impl Into<String>, content: impl Into<String>) {
        let _ = self.inner.insert(path.into(), content.into());
    }

    /// Get an artifact's content by path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<String> {
        self.inner.get(path).map(|entry| entry.value().clone())
    }

    /// Merge all entries from `other`, overwriting on path collision
    /// (last writer wins).
    pub fn merge_from(&self, other: &Self) {
        for entry in other.inner.iter() {
            let _ = self
                .inner
                .insert(entry.key().clone(), entry.value().clone());
        }
    }

    /// Number of artifacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Sorted list of artifact paths.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.inner.iter().map(|e| e.key().clone()).collect();
        paths.sort();
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get() {
        let map = ArtifactMap::new();
        map.insert("report.md", "# Findings");
        assert_eq!(map.get("report.md").as_deref(), Some("# Findings"));
        assert!(map.get("missing.md").is_none());
    }

    #[test]
    fn insert_overwrites() {
        let map = ArtifactMap::new();
        map.insert("a.txt", "v1");
        map.insert("a.txt", "v2");
        assert_eq!(map.get("a.txt").as_deref(), Some("v2"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn clone_shares_storage() {
        let map = ArtifactMap::new();
        let alias = map.clone();
        alias.insert("shared.txt", "content");
        assert_eq!(map.get("shared.txt").as_deref(), Some("content"));
    }

    #[test]
    fn merge_last_writer_wins() {
        let parent = ArtifactMap::new();
        parent.insert("a.txt", "parent-a");
        parent.insert("b.txt", "parent-b");

        let child = ArtifactMap::new();
        child.insert("b.txt", "child-b");
        child.insert("c.txt", "child-c");

        parent.merge_from(&child);
        assert_eq!(parent.len(), 3);
        assert_eq!(parent.get("a.txt").as_deref(), Some("parent-a"));
        assert_eq!(parent.get("b.txt").as_deref(), Some("child-b"));
        assert_eq!(parent.get("c.txt").as_deref(), Some("child-c"));
    }

    #[test]
    fn merge_does_not_link_maps() {
        let parent = ArtifactMap::new();
        let child = ArtifactMap::new();
        child.insert("a.txt", "v1");
        parent.merge_from(&child);

        // Later child writes must not leak into the parent.
        child.insert("b.txt", "v2");
        assert!(parent.get("b.txt").is_none());
    }

    #[test]
    fn paths_sorted() {
        let map = ArtifactMap::new();
        map.insert("z.txt", "");
        map.insert("a.txt", "");
        map.insert("m.txt", "");
        assert_eq!(map.paths(), vec!["a.txt", "m.txt", "z.txt"]);
    }
}
