//! Qdrant backend using the REST API over a blocking HTTP client.
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use super::models::{ChunkPayload, ChunkPoint, ScoredChunk};
use super::{StoreError, VectorStore};

pub struct QdrantStore {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: Option<String>,
    collection: String,
    vector_size: usize,
}

#[derive(Deserialize)]
struct QdrantResponse<T> {
    result: T,
}

#[derive(Deserialize)]
struct CollectionsList {
    collections: Vec<CollectionDescription>,
}

#[derive(Deserialize)]
struct CollectionDescription {
    name: String,
}

#[derive(Serialize)]
struct UpsertPoint<'a> {
    id: &'a str,
    vector: &'a [f32],
    payload: &'a ChunkPayload,
}

#[derive(Deserialize)]
struct ScoredPoint {
    id: serde_json::Value,
    score: f32,
    payload: Option<ChunkPayload>,
}

/// Body for `points/search`, with a `service_name` match condition when filtering.
fn search_body(vector: &[f32], limit: usize, service_filter: Option<&str>) -> serde_json::Value {
    let mut body = json!({
        "vector": vector,
        "limit": limit,
        "with_payload": true,
    });
    if let Some(service) = service_filter {
        body["filter"] = json!({
            "must": [
                { "key": "service_name", "match": { "value": service } }
            ]
        });
    }
    body
}

/// Point ids come back as either UUID strings or unsigned integers.
fn point_id_string(id: &serde_json::Value) -> String {
    match id {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl QdrantStore {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        collection: &str,
        vector_size: usize,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("servicegraph/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StoreError::RequestFailed(format!("HTTP client build failed: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            collection: collection.to_string(),
            vector_size,
        })
    }

    fn request(
        &self,
        method: reqwest::Method,
        path: &str,
    ) -> reqwest::blocking::RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    fn send(
        builder: reqwest::blocking::RequestBuilder,
    ) -> Result<reqwest::blocking::Response, StoreError> {
        let resp = builder
            .send()
            .map_err(|e| StoreError::RequestFailed(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(StoreError::BadStatus {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    fn collection_exists(&self) -> Result<bool, StoreError> {
        let resp = Self::send(self.request(reqwest::Method::GET, "/collections"))?;
        let parsed: QdrantResponse<CollectionsList> = resp
            .json()
            .map_err(|e| StoreError::RequestFailed(format!("bad collections response: {e}")))?;
        Ok(parsed
            .result
            .collections
            .iter()
            .any(|c| c.name == self.collection))
    }
}

impl VectorStore for QdrantStore {
    fn ensure_collection(&self) -> Result<(), StoreError> {
        if self.collection_exists()? {
            debug!("collection {} already exists", self.collection);
            return Ok(());
        }

        info!(
            "Creating collection {} (size {}, cosine)",
            self.collection, self.vector_size
        );
        let body = json!({
            "vectors": { "size": self.vector_size, "distance": "Cosine" }
        });
        Self::send(
            self.request(
                reqwest::Method::PUT,
                &format!("/collections/{}", self.collection),
            )
            .json(&body),
        )?;
        Ok(())
    }

    fn upsert(&self, point: &ChunkPoint) -> Result<(), StoreError> {
        if point.vector.len() != self.vector_size {
            return Err(StoreError::DimensionMismatch {
                expected: self.vector_size,
                actual: point.vector.len(),
            });
        }

        let points = [UpsertPoint {
            id: &point.id,
            vector: &point.vector,
            payload: &point.payload,
        }];
        let body = json!({ "points": points });
        Self::send(
            self.request(
                reqwest::Method::PUT,
                &format!("/collections/{}/points?wait=true", self.collection),
            )
            .json(&body),
        )?;
        Ok(())
    }

    fn search(
        &self,
        vector: &[f32],
        limit: usize,
        service_filter: Option<&str>,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        let resp = Self::send(
            self.request(
                reqwest::Method::POST,
                &format!("/collections/{}/points/search", self.collection),
            )
            .json(&search_body(vector, limit, service_filter)),
        )?;

        let parsed: QdrantResponse<Vec<ScoredPoint>> = resp
            .json()
            .map_err(|e| StoreError::RequestFailed(format!("bad search response: {e}")))?;

        // Points written without a payload cannot take part in retrieval
        Ok(parsed
            .result
            .into_iter()
            .filter_map(|p| {
                p.payload.map(|payload| ScoredChunk {
                    id: point_id_string(&p.id),
                    score: p.score,
                    payload,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_body_without_filter() {
        let body = search_body(&[0.5, 0.25], 3, None);
        assert_eq!(body["limit"], 3);
        assert_eq!(body["with_payload"], true);
        assert!(body.get("filter").is_none());
    }

    #[test]
    fn test_search_body_with_service_filter() {
        let body = search_body(&[0.5], 5, Some("billing-service"));
        let condition = &body["filter"]["must"][0];
        assert_eq!(condition["key"], "service_name");
        assert_eq!(condition["match"]["value"], "billing-service");
    }

    #[test]
    fn test_parse_search_response() {
        let raw = r#"{
            "result": [
                {"id": "4f1c", "version": 1, "score": 0.91,
                 "payload": {"content": "POST /x -> c.a", "file_path": "/r.js",
                             "service_name": "x-service", "chunk_type": "route",
                             "related_chunks": [{"function_name": "c.a", "relation_type": "calls"}]}},
                {"id": 7, "version": 1, "score": 0.5, "payload": null}
            ],
            "status": "ok",
            "time": 0.001
        }"#;
        let parsed: QdrantResponse<Vec<ScoredPoint>> = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.result.len(), 2);
        assert_eq!(point_id_string(&parsed.result[0].id), "4f1c");
        assert_eq!(point_id_string(&parsed.result[1].id), "7");
        assert!(parsed.result[1].payload.is_none());
        let payload = parsed.result[0].payload.as_ref().unwrap();
        assert_eq!(payload.related_links[0].target_symbol, "c.a");
    }

    #[test]
    fn test_upsert_checks_dimensions_before_sending() {
        let store = QdrantStore::new(
            "http://127.0.0.1:9",
            None,
            "project_chunks",
            4,
            Duration::from_millis(10),
        )
        .unwrap();
        let point = ChunkPoint {
            id: "p".to_string(),
            vector: vec![1.0],
            payload: ChunkPayload {
                content: "x".to_string(),
                file_path: "/x.js".to_string(),
                service_name: "general".to_string(),
                role: Default::default(),
                defined_symbols: vec![],
                related_links: vec![],
            },
        };
        assert!(matches!(
            store.upsert(&point),
            Err(StoreError::DimensionMismatch { .. })
        ));
    }
}
