use super::{Db, StoreError, models::ChunkPoint, serialize_vector};
use chrono::Utc;
use rusqlite::{OptionalExtension, params};

impl Db {
    /// Inserts a point, replacing any earlier point with the same id.
    pub(crate) fn upsert_point(&self, point: &ChunkPoint) -> Result<(), StoreError> {
        if point.vector.len() != self.dimensions {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimensions,
                actual: point.vector.len(),
            });
        }

        let payload_json = serde_json::to_string(&point.payload)?;
        let tx = self.conn.unchecked_transaction()?;

        let existing: Option<i64> = tx
            .query_row(
                &format!("SELECT id FROM {} WHERE point_id = ?", self.table),
                params![point.id],
                |row| row.get(0),
            )
            .optional()?;

        // vec0 has no foreign keys, so stale vectors are removed by hand
        if let Some(row_id) = existing {
            tx.execute(
                &format!("DELETE FROM {} WHERE rowid = ?", self.vec_table),
                params![row_id],
            )?;
            tx.execute(
                &format!("DELETE FROM {} WHERE id = ?", self.table),
                params![row_id],
            )?;
        }

        tx.execute(
            &format!(
                "INSERT INTO {} (point_id, file_path, service_name, chunk_type, payload, indexed_at) VALUES (?, ?, ?, ?, ?, ?)",
                self.table
            ),
            params![
                point.id,
                point.payload.file_path,
                point.payload.service_name,
                point.payload.role.as_str(),
                payload_json,
                Utc::now(),
            ],
        )?;
        let row_id = tx.last_insert_rowid();

        tx.execute(
            &format!(
                "INSERT INTO {} (rowid, embedding) VALUES (?, ?)",
                self.vec_table
            ),
            params![row_id, serialize_vector(&point.vector)],
        )?;

        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::VectorStore;
    use crate::db::models::{ChunkPayload, ChunkRole};

    fn point(id: &str, content: &str, vector: Vec<f32>) -> ChunkPoint {
        ChunkPoint {
            id: id.to_string(),
            vector,
            payload: ChunkPayload {
                content: content.to_string(),
                file_path: "/repo/a-service/src/a.js".to_string(),
                service_name: "a-service".to_string(),
                role: ChunkRole::Code,
                defined_symbols: vec![],
                related_links: vec![],
            },
        }
    }

    #[test]
    fn test_upsert_insert_and_replace() {
        let db = Db::open_in_memory("project_chunks", 4).unwrap();

        db.upsert(&point("p1", "first", vec![1.0, 0.0, 0.0, 0.0]))
            .unwrap();
        db.upsert(&point("p2", "second", vec![0.0, 1.0, 0.0, 0.0]))
            .unwrap();
        assert_eq!(db.count().unwrap(), 2);

        // Same id again replaces both the row and its vector
        db.upsert(&point("p1", "first, revised", vec![0.0, 0.0, 1.0, 0.0]))
            .unwrap();
        assert_eq!(db.count().unwrap(), 2);

        let vec_count: i64 = db
            .conn
            .query_row("SELECT COUNT(*) FROM vec_project_chunks", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(vec_count, 2);

        let hits = db.search(&[0.0, 0.0, 1.0, 0.0], 1, None).unwrap();
        assert_eq!(hits[0].id, "p1");
        assert_eq!(hits[0].payload.content, "first, revised");
    }

    #[test]
    fn test_upsert_rejects_wrong_dimensions() {
        let db = Db::open_in_memory("project_chunks", 4).unwrap();
        let err = db.upsert(&point("p1", "x", vec![1.0, 0.0])).unwrap_err();
        assert!(matches!(
            err,
            StoreError::DimensionMismatch {
                expected: 4,
                actual: 2
            }
        ));
        assert_eq!(db.count().unwrap(), 0);
    }
}
