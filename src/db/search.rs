use super::{Db, StoreError, models::ScoredChunk, serialize_vector};
use rusqlite::types::Value;

impl Db {
    /// Brute-force cosine search over the `vec0` table, optionally filtered by service.
    pub(crate) fn search_points(
        &self,
        query_vector: &[f32],
        limit: usize,
        service_filter: Option<&str>,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        if query_vector.len() != self.dimensions {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimensions,
                actual: query_vector.len(),
            });
        }

        let mut query = format!(
            r#"
            SELECT
                c.point_id,
                c.payload,
                vec_distance_cosine(v.embedding, ?) as distance
            FROM {vec_table} v
            JOIN {table} c ON v.rowid = c.id
            "#,
            vec_table = self.vec_table,
            table = self.table,
        );

        let mut params: Vec<Value> = vec![Value::Blob(serialize_vector(query_vector))];

        if let Some(service) = service_filter {
            query.push_str(" WHERE c.service_name = ?");
            params.push(Value::Text(service.to_string()));
        }

        query.push_str(" ORDER BY distance ASC, c.id ASC LIMIT ?");
        params.push(Value::Integer(limit as i64));

        let param_refs: Vec<&dyn rusqlite::ToSql> =
            params.iter().map(|p| p as &dyn rusqlite::ToSql).collect();

        let mut stmt = self.conn.prepare(&query)?;
        let rows = stmt.query_map(param_refs.as_slice(), |row| {
            let id: String = row.get(0)?;
            let payload: String = row.get(1)?;
            let distance: f64 = row.get(2)?;
            Ok((id, payload, distance))
        })?;

        let mut results = Vec::new();
        for row in rows {
            let (id, payload, distance) = row?;
            results.push(ScoredChunk {
                id,
                score: (1.0 - distance) as f32,
                payload: serde_json::from_str(&payload)?,
            });
        }

        Ok(results)
    }
}
