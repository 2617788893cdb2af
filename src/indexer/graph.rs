//! Joins chunks of one file with the role, service and relation links that
//! make up the retrieval graph.
//!
//! A link is attached to a chunk when its producing symbol occurs anywhere
//! in the chunk text (plain substring containment, so `createEvent` also
//! matches inside `createEventAction`).
use super::chunker::split_into_chunks;
use super::extractors::{
    extract_controller_links, extract_db_functions, extract_routes, extract_use_case_links,
};
use crate::db::models::{ChunkPayload, ChunkRole, RelatedChunk, RelationKind};

fn related(target: &str, kind: RelationKind) -> RelatedChunk {
    RelatedChunk {
        target_symbol: target.to_string(),
        relation_kind: kind,
    }
}

/// Builds the payloads of every chunk in one file.
///
/// Route files become one synthetic chunk per recognized route; every other
/// role goes through the boundary chunker.
pub fn build_file_chunks(
    file_path: &str,
    service_name: &str,
    role: ChunkRole,
    text: &str,
) -> Vec<ChunkPayload> {
    let payload = |content: String, defined: Vec<String>, links: Vec<RelatedChunk>| ChunkPayload {
        content,
        file_path: file_path.to_string(),
        service_name: service_name.to_string(),
        role,
        defined_symbols: defined,
        related_links: links,
    };

    match role {
        ChunkRole::DbFunction => {
            let defined: Vec<String> = extract_db_functions(text).into_iter().collect();
            split_into_chunks(text)
                .into_iter()
                .map(|chunk| {
                    let links = defined
                        .iter()
                        .filter(|name| chunk.content.contains(name.as_str()))
                        .map(|name| related(name, RelationKind::Defines))
                        .collect();
                    payload(chunk.content, defined.clone(), links)
                })
                .collect()
        }
        ChunkRole::UseCase => {
            let links = extract_use_case_links(text);
            split_into_chunks(text)
                .into_iter()
                .map(|chunk| {
                    let related_links = links
                        .iter()
                        .filter(|l| chunk.content.contains(l.use_case_function.as_str()))
                        .map(|l| related(&l.calls_db_function, RelationKind::Calls))
                        .collect();
                    payload(chunk.content, Vec::new(), related_links)
                })
                .collect()
        }
        ChunkRole::Controller => {
            let links = extract_controller_links(text);
            split_into_chunks(text)
                .into_iter()
                .map(|chunk| {
                    let related_links = links
                        .iter()
                        .filter(|l| chunk.content.contains(l.controller_function.as_str()))
                        .map(|l| related(&l.calls_use_case, RelationKind::Calls))
                        .collect();
                    payload(chunk.content, Vec::new(), related_links)
                })
                .collect()
        }
        ChunkRole::Route => extract_routes(text)
            .into_iter()
            .map(|route| {
                let links = vec![related(&route.handler, RelationKind::Calls)];
                payload(route.describe(), Vec::new(), links)
            })
            .collect(),
        ChunkRole::Code => split_into_chunks(text)
            .into_iter()
            .map(|chunk| payload(chunk.content, Vec::new(), Vec::new()))
            .collect(),
    }
}
