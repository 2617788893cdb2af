//! # servicegraph: multi-hop code Q&A over a microservices tree
//!
//! Indexes a directory of service projects into a vector store as
//! role-tagged chunks carrying cross-layer relation links, then answers
//! questions by similarity search followed by breadth-first expansion
//! along those links.
//!
//! ## Architecture
//!
//! - **[`config`]**: JSON configuration loading and validation
//! - **[`db`]**: Vector store seam with Qdrant (REST) and SQLite + sqlite-vec backends
//! - **[`embedder`]**: Text embedding via the Gemini API, plus a deterministic mock
//! - **[`indexer`]**: Pattern extractors, chunker, layout rules and graph builder
//! - **[`retriever`]**: Similarity search with depth-bounded graph expansion
//! - **[`generator`]**: Bounded prompt assembly and Gemini text generation
//! - **[`chat`]**: Interactive session with rolling history

pub mod chat;
pub mod config;
pub mod db;
pub mod embedder;
pub mod generator;
pub mod indexer;
pub mod retriever;
