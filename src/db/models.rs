//! Persisted chunk shape shared by the indexer, the stores and the retriever.
//!
//! Payload keys keep the names used by existing `project_chunks`
//! collections (`chunk_type`, `defined_functions`, `related_chunks`, ...).
use serde::{Deserialize, Serialize};

/// Architectural role of a chunk, fixed when the chunk is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ChunkRole {
    #[default]
    #[serde(rename = "code")]
    Code,
    #[serde(rename = "db-function")]
    DbFunction,
    #[serde(rename = "use-case")]
    UseCase,
    #[serde(rename = "route")]
    Route,
    #[serde(rename = "controller")]
    Controller,
}

impl ChunkRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkRole::Code => "code",
            ChunkRole::DbFunction => "db-function",
            ChunkRole::UseCase => "use-case",
            ChunkRole::Route => "route",
            ChunkRole::Controller => "controller",
        }
    }
}

impl std::fmt::Display for ChunkRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    Defines,
    Calls,
}

/// Outgoing edge from a chunk to a symbol, resolved lazily by name at query time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedChunk {
    #[serde(rename = "function_name")]
    pub target_symbol: String,
    #[serde(rename = "relation_type")]
    pub relation_kind: RelationKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub content: String,
    pub file_path: String,
    pub service_name: String,
    #[serde(rename = "chunk_type", default)]
    pub role: ChunkRole,
    #[serde(
        rename = "defined_functions",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub defined_symbols: Vec<String>,
    #[serde(rename = "related_chunks", default)]
    pub related_links: Vec<RelatedChunk>,
}

/// A chunk ready to be written: opaque id, embedding and payload.
#[derive(Debug, Clone)]
pub struct ChunkPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: ChunkPayload,
}

/// A search match returned by a store, best first.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub id: String,
    pub score: f32,
    pub payload: ChunkPayload,
}
