//! Read path: similarity search followed by depth-bounded graph expansion.
//!
//! Relation links are resolved by embedding the target symbol name and
//! searching for it, so the graph is only ever materialized for one query.
use crate::db::models::{ChunkPayload, ChunkRole, ScoredChunk};
use crate::db::{StoreError, VectorStore};
use crate::embedder::{EmbedTask, Embedder, EmbedderError};
use md5::{Digest, Md5};
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_RELATED_LIMIT: usize = 3;
pub const DEFAULT_SCORE_DECAY: f64 = 0.75;

#[derive(Error, Debug)]
pub enum RetrieveError {
    #[error(transparent)]
    Embed(#[from] EmbedderError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Deduplication key of a chunk: MD5 over `file_path::content`.
pub fn chunk_key(file_path: &str, content: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(file_path.as_bytes());
    hasher.update(b"::");
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A chunk recorded during expansion, in pop order.
#[derive(Debug, Clone)]
pub struct VisitedChunk {
    pub key: String,
    pub id: String,
    pub payload: ChunkPayload,
    pub depth: usize,
    pub base_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedChunk {
    pub id: String,
    pub file_path: String,
    pub service_name: String,
    pub role: ChunkRole,
    pub score: f64,
    pub depth: usize,
    pub content: String,
}

impl From<VisitedChunk> for RankedChunk {
    fn from(v: VisitedChunk) -> Self {
        Self {
            id: v.id,
            file_path: v.payload.file_path,
            service_name: v.payload.service_name,
            role: v.payload.role,
            score: v.base_score,
            depth: v.depth,
            content: v.payload.content,
        }
    }
}

pub struct Retriever<'a, E: Embedder + ?Sized, S: VectorStore + ?Sized> {
    embedder: &'a E,
    store: &'a S,
    related_limit: usize,
    score_decay: f64,
}

impl<'a, E: Embedder + ?Sized, S: VectorStore + ?Sized> Retriever<'a, E, S> {
    pub fn new(embedder: &'a E, store: &'a S) -> Self {
        Self {
            embedder,
            store,
            related_limit: DEFAULT_RELATED_LIMIT,
            score_decay: DEFAULT_SCORE_DECAY,
        }
    }

    #[must_use]
    pub fn with_related_limit(mut self, limit: usize) -> Self {
        self.related_limit = limit;
        self
    }

    #[must_use]
    pub fn with_score_decay(mut self, decay: f64) -> Self {
        self.score_decay = decay;
        self
    }

    /// Score of a chunk first recorded at `depth` hops from the frontier.
    pub fn score_at(&self, depth: usize) -> f64 {
        if depth == 0 {
            1.0
        } else {
            self.score_decay.powi(i32::try_from(depth).unwrap_or(i32::MAX))
        }
    }

    /// Answers `question` with the ranked neighbourhood of its nearest chunks.
    ///
    /// The list is sorted by score, highest first; ties keep the order in
    /// which chunks were recorded. Nothing is truncated.
    pub fn query(
        &self,
        question: &str,
        top_k: usize,
        depth_limit: usize,
        service_filter: Option<&str>,
    ) -> Result<Vec<RankedChunk>, RetrieveError> {
        let vector = self.embedder.embed(question, EmbedTask::Query)?;
        let frontier = self.store.search(&vector, top_k, service_filter)?;
        debug!("initial search returned {} chunks", frontier.len());

        let visited = self.expand(frontier, depth_limit)?;
        Ok(rank(visited))
    }

    /// Breadth-first expansion from `frontier` (depth 0).
    ///
    /// The visited check happens when a chunk is popped: a chunk may be
    /// queued several times but is recorded once, at the depth of its first
    /// pop. A chunk popped at `depth_limit` is recorded without expanding
    /// its links, since nothing deeper could be recorded.
    pub fn expand(
        &self,
        frontier: Vec<ScoredChunk>,
        depth_limit: usize,
    ) -> Result<Vec<VisitedChunk>, RetrieveError> {
        let mut queue: VecDeque<(ScoredChunk, usize)> =
            frontier.into_iter().map(|c| (c, 0)).collect();
        let mut seen: HashSet<String> = HashSet::new();
        let mut visited = Vec::new();

        while let Some((chunk, depth)) = queue.pop_front() {
            let key = chunk_key(&chunk.payload.file_path, &chunk.payload.content);
            if depth > depth_limit || seen.contains(&key) {
                continue;
            }
            seen.insert(key.clone());

            if depth < depth_limit {
                for link in &chunk.payload.related_links {
                    let vector = self.embedder.embed(&link.target_symbol, EmbedTask::Query)?;
                    let matches = self.store.search(&vector, self.related_limit, None)?;
                    for m in matches {
                        if !seen.contains(&chunk_key(&m.payload.file_path, &m.payload.content)) {
                            queue.push_back((m, depth + 1));
                        }
                    }
                }
            }

            visited.push(VisitedChunk {
                key,
                id: chunk.id,
                payload: chunk.payload,
                depth,
                base_score: self.score_at(depth),
            });
        }

        debug!("expansion recorded {} chunks", visited.len());
        Ok(visited)
    }
}

/// Stable descending sort by score.
pub fn rank(visited: Vec<VisitedChunk>) -> Vec<RankedChunk> {
    let mut ranked: Vec<RankedChunk> = visited.into_iter().map(RankedChunk::from).collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{ChunkPoint, RelatedChunk, RelationKind};
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Encodes text byte-for-byte so the fake store can recover it.
    struct TextEmbedder;

    impl Embedder for TextEmbedder {
        fn embed(&self, text: &str, _task: EmbedTask) -> Result<Vec<f32>, EmbedderError> {
            Ok(text.bytes().map(f32::from).collect())
        }

        fn dimensions(&self) -> usize {
            0
        }
    }

    /// Returns canned results per query text and records every search.
    #[derive(Default)]
    struct ScriptedStore {
        results: HashMap<String, Vec<ChunkPayload>>,
        searches: RefCell<Vec<(String, usize, Option<String>)>>,
    }

    impl ScriptedStore {
        fn on(mut self, query: &str, chunks: &[&ChunkPayload]) -> Self {
            self.results
                .insert(query.to_string(), chunks.iter().map(|c| (*c).clone()).collect());
            self
        }
    }

    impl VectorStore for ScriptedStore {
        fn ensure_collection(&self) -> Result<(), StoreError> {
            Ok(())
        }

        fn upsert(&self, _point: &ChunkPoint) -> Result<(), StoreError> {
            Ok(())
        }

        fn search(
            &self,
            vector: &[f32],
            limit: usize,
            service_filter: Option<&str>,
        ) -> Result<Vec<ScoredChunk>, StoreError> {
            let text: String = vector.iter().map(|v| *v as u8 as char).collect();
            self.searches
                .borrow_mut()
                .push((text.clone(), limit, service_filter.map(str::to_string)));
            Ok(self
                .results
                .get(&text)
                .map(|chunks| {
                    chunks
                        .iter()
                        .take(limit)
                        .map(|p| ScoredChunk {
                            id: format!("id-{}", p.content),
                            score: 0.9,
                            payload: p.clone(),
                        })
                        .collect()
                })
                .unwrap_or_default())
        }
    }

    fn chunk(name: &str, links: &[&str]) -> ChunkPayload {
        ChunkPayload {
            content: name.to_string(),
            file_path: format!("/repo/a-service/{name}.js"),
            service_name: "a-service".to_string(),
            role: ChunkRole::Code,
            defined_symbols: vec![],
            related_links: links
                .iter()
                .map(|l| RelatedChunk {
                    target_symbol: l.to_string(),
                    relation_kind: RelationKind::Calls,
                })
                .collect(),
        }
    }

    fn names(ranked: &[RankedChunk]) -> Vec<(&str, usize, f64)> {
        ranked
            .iter()
            .map(|r| (r.content.as_str(), r.depth, r.score))
            .collect()
    }

    #[test]
    fn test_depth_zero_returns_frontier_only() {
        let a = chunk("A", &["x"]);
        let b = chunk("B", &["y"]);
        let store = ScriptedStore::default()
            .on("question", &[&a, &b])
            .on("x", &[&chunk("X", &[])]);

        let retriever = Retriever::new(&TextEmbedder, &store);
        let ranked = retriever.query("question", 5, 0, None).unwrap();

        assert_eq!(names(&ranked), vec![("A", 0, 1.0), ("B", 0, 1.0)]);
        // Only the initial search ran
        assert_eq!(store.searches.borrow().len(), 1);
    }

    #[test]
    fn test_chain_scores_decay_per_hop() {
        let a = chunk("A", &["x"]);
        let b = chunk("B", &["y"]);
        let c = chunk("C", &["z"]);
        let d = chunk("D", &[]);
        let store = ScriptedStore::default()
            .on("question", &[&a])
            .on("x", &[&b])
            .on("y", &[&c])
            .on("z", &[&d]);

        let retriever = Retriever::new(&TextEmbedder, &store);

        let ranked = retriever.query("question", 5, 2, None).unwrap();
        assert_eq!(
            names(&ranked),
            vec![("A", 0, 1.0), ("B", 1, 0.75), ("C", 2, 0.5625)]
        );
        // "z" is never searched: C sits at the depth limit
        let searched: Vec<String> = store.searches.borrow().iter().map(|s| s.0.clone()).collect();
        assert_eq!(searched, vec!["question", "x", "y"]);

        let shallow = retriever.query("question", 5, 1, None).unwrap();
        assert_eq!(names(&shallow), vec![("A", 0, 1.0), ("B", 1, 0.75)]);
    }

    #[test]
    fn test_shared_neighbour_recorded_once() {
        let a = chunk("A", &["shared"]);
        let b = chunk("B", &["shared"]);
        let s = chunk("S", &[]);
        let store = ScriptedStore::default()
            .on("question", &[&a, &b])
            .on("shared", &[&s]);

        let retriever = Retriever::new(&TextEmbedder, &store);
        let ranked = retriever.query("question", 5, 3, None).unwrap();
        assert_eq!(
            names(&ranked),
            vec![("A", 0, 1.0), ("B", 0, 1.0), ("S", 1, 0.75)]
        );
    }

    #[test]
    fn test_first_pop_decides_depth() {
        // C is both a neighbour of A and part of the frontier; the frontier
        // copy is popped first.
        let a = chunk("A", &["c"]);
        let c = chunk("C", &[]);
        let store = ScriptedStore::default()
            .on("question", &[&a, &c])
            .on("c", &[&c]);

        let retriever = Retriever::new(&TextEmbedder, &store);
        let ranked = retriever.query("question", 5, 2, None).unwrap();
        assert_eq!(names(&ranked), vec![("A", 0, 1.0), ("C", 0, 1.0)]);
    }

    #[test]
    fn test_cycles_terminate_without_duplicates() {
        let a = chunk("A", &["b"]);
        let b = chunk("B", &["a"]);
        let store = ScriptedStore::default()
            .on("question", &[&a])
            .on("a", &[&a])
            .on("b", &[&b]);

        let retriever = Retriever::new(&TextEmbedder, &store);
        assert!(retriever.expand(Vec::new(), 10).unwrap().is_empty());

        let ranked = retriever.query("question", 5, 10, None).unwrap();
        assert_eq!(names(&ranked), vec![("A", 0, 1.0), ("B", 1, 0.75)]);
    }

    #[test]
    fn test_ranking_is_stable_for_ties() {
        let a = chunk("A", &["n"]);
        let b = chunk("B", &[]);
        let c = chunk("C", &[]);
        let n1 = chunk("N1", &[]);
        let n2 = chunk("N2", &[]);
        let store = ScriptedStore::default()
            .on("question", &[&a, &b, &c])
            .on("n", &[&n2, &n1]);

        let retriever = Retriever::new(&TextEmbedder, &store);
        let ranked = retriever.query("question", 5, 2, None).unwrap();
        let order: Vec<&str> = ranked.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(order, vec!["A", "B", "C", "N2", "N1"]);
    }

    #[test]
    fn test_service_filter_only_on_initial_search() {
        let a = chunk("A", &["x"]);
        let store = ScriptedStore::default()
            .on("question", &[&a])
            .on("x", &[&chunk("X", &[])]);

        let retriever = Retriever::new(&TextEmbedder, &store).with_related_limit(2);
        retriever
            .query("question", 4, 1, Some("a-service"))
            .unwrap();

        let searches = store.searches.borrow();
        assert_eq!(
            searches[0],
            ("question".to_string(), 4, Some("a-service".to_string()))
        );
        assert_eq!(searches[1], ("x".to_string(), 2, None));
    }

    #[test]
    fn test_visited_keys_unique_and_depth_bounded() {
        let a = chunk("A", &["b", "c"]);
        let b = chunk("B", &["c", "a"]);
        let c = chunk("C", &["a", "b"]);
        let store = ScriptedStore::default()
            .on("question", &[&a, &b])
            .on("a", &[&a])
            .on("b", &[&b])
            .on("c", &[&c]);

        let retriever = Retriever::new(&TextEmbedder, &store);
        let question = TextEmbedder.embed("question", EmbedTask::Query).unwrap();
        for limit in 0..4 {
            let frontier = store.search(&question, 5, None).unwrap();
            let visited = retriever.expand(frontier, limit).unwrap();
            let keys: HashSet<&str> = visited.iter().map(|v| v.key.as_str()).collect();
            assert_eq!(keys.len(), visited.len());
            assert!(visited.iter().all(|v| v.depth <= limit));
            assert!(
                visited
                    .iter()
                    .all(|v| v.base_score == retriever.score_at(v.depth))
            );
        }
    }

    #[test]
    fn test_score_at() {
        let store = ScriptedStore::default();
        let retriever = Retriever::new(&TextEmbedder, &store);
        assert_eq!(retriever.score_at(0), 1.0);
        assert_eq!(retriever.score_at(1), 0.75);
        assert_eq!(retriever.score_at(3), 0.75f64.powi(3));

        // Huge depths saturate instead of wrapping to a negative exponent
        assert_eq!(retriever.score_at(usize::MAX), 0.0);
        assert_eq!(retriever.score_at(i32::MAX as usize + 1), 0.0);

        let flat = Retriever::new(&TextEmbedder, &store).with_score_decay(0.5);
        assert_eq!(flat.score_at(2), 0.25);
    }

    #[test]
    fn test_chunk_key() {
        assert_eq!(chunk_key("/a.js", "x"), chunk_key("/a.js", "x"));
        assert_ne!(chunk_key("/a.js", "x"), chunk_key("/b.js", "x"));
        assert_eq!(chunk_key("/a.js", "x").len(), 32);
    }
}
