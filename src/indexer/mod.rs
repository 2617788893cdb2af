//! Write path: pattern extraction, chunking and graph building.
pub mod chunker;
pub mod core;
pub mod extractors;
pub mod graph;
pub mod layout;
