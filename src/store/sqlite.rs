use super::{
    apply_field, merge_into, resolve_map, server_now, Document, DocumentStore, FieldPath,
    JsonMap, StoreError, WriteMap, WriteValue,
};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;

/// Document store kept in a single SQLite file inside the workspace.
///
/// Every document is one row of JSON text. Each write runs in its own
/// transaction, which gives per-document atomicity for merges and updates.
pub struct SqliteStore {
    conn: Connection,
    project_id: String,
}

impl SqliteStore {
    pub const DB_FILE: &'static str = "gradebook.sqlite3";

    pub fn open(workspace: &Path, project_id: &str) -> Result<SqliteStore, StoreError> {
        std::fs::create_dir_all(workspace)?;
        let conn = Connection::open(workspace.join(Self::DB_FILE))?;
        Self::init(conn, project_id)
    }

    #[allow(dead_code)]
    pub fn open_in_memory(project_id: &str) -> Result<SqliteStore, StoreError> {
        Self::init(Connection::open_in_memory()?, project_id)
    }

    fn init(conn: Connection, project_id: &str) -> Result<SqliteStore, StoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS store_meta(
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS documents(
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                data TEXT NOT NULL,
                create_time TEXT NOT NULL,
                update_time TEXT NOT NULL,
                PRIMARY KEY(collection, id)
            )",
            [],
        )?;

        // A workspace is bound to the project of the credentials that first opened it.
        let bound: Option<String> = conn
            .query_row(
                "SELECT value FROM store_meta WHERE key = 'project_id'",
                [],
                |r| r.get(0),
            )
            .optional()?;
        match bound {
            Some(found) if found != project_id => {
                return Err(StoreError::ProjectMismatch {
                    expected: project_id.to_string(),
                    found,
                });
            }
            Some(_) => {}
            None => {
                conn.execute(
                    "INSERT INTO store_meta(key, value) VALUES('project_id', ?)",
                    [project_id],
                )?;
            }
        }

        Ok(SqliteStore {
            conn,
            project_id: project_id.to_string(),
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    fn load(
        conn: &Connection,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, StoreError> {
        let row: Option<(String, String, String)> = conn
            .query_row(
                "SELECT data, create_time, update_time
                 FROM documents
                 WHERE collection = ? AND id = ?",
                (collection, id),
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .optional()?;
        let Some((data, create_time, update_time)) = row else {
            return Ok(None);
        };
        Ok(Some(Document {
            id: id.to_string(),
            data: serde_json::from_str(&data)?,
            create_time,
            update_time,
        }))
    }

    fn upsert(
        conn: &Connection,
        collection: &str,
        id: &str,
        data: &JsonMap,
        now: &str,
    ) -> Result<(), StoreError> {
        let text = serde_json::to_string(data)?;
        conn.execute(
            "INSERT INTO documents(collection, id, data, create_time, update_time)
             VALUES(?, ?, ?, ?, ?)
             ON CONFLICT(collection, id) DO UPDATE SET
               data = excluded.data,
               update_time = excluded.update_time",
            (collection, id, &text, now, now),
        )?;
        Ok(())
    }

    fn collect_rows(
        &self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<Vec<Document>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(params.iter()), |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut out = Vec::with_capacity(rows.len());
        for (id, data, create_time, update_time) in rows {
            out.push(Document {
                id,
                data: serde_json::from_str(&data)?,
                create_time,
                update_time,
            });
        }
        Ok(out)
    }
}

fn scalar_to_sql(field: &str, value: &Value) -> Result<SqlValue, StoreError> {
    let unsupported = || StoreError::UnsupportedQueryValue {
        field: field.to_string(),
    };
    match value {
        Value::String(s) => Ok(SqlValue::Text(s.clone())),
        Value::Bool(b) => Ok(SqlValue::Integer(i64::from(*b))),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(SqlValue::Integer(i))
            } else {
                n.as_f64().map(SqlValue::Real).ok_or_else(unsupported)
            }
        }
        Value::Null | Value::Array(_) | Value::Object(_) => Err(unsupported()),
    }
}

fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field.replace('"', "\\\""))
}

impl DocumentStore for SqliteStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        Self::load(&self.conn, collection, id)
    }

    fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StoreError> {
        let bound = scalar_to_sql(field, value)?;
        self.collect_rows(
            "SELECT id, data, create_time, update_time
             FROM documents
             WHERE collection = ? AND json_extract(data, ?) = ?
             ORDER BY id",
            &[
                SqlValue::Text(collection.to_string()),
                SqlValue::Text(json_path(field)),
                bound,
            ],
        )
    }

    fn stream(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        self.collect_rows(
            "SELECT id, data, create_time, update_time
             FROM documents
             WHERE collection = ?
             ORDER BY id",
            &[SqlValue::Text(collection.to_string())],
        )
    }

    fn set(
        &self,
        collection: &str,
        id: &str,
        data: WriteMap,
        merge: bool,
    ) -> Result<(), StoreError> {
        let now = server_now();
        let tx = self.conn.unchecked_transaction()?;
        let next = if merge {
            let mut existing = Self::load(&tx, collection, id)?
                .map(|d| d.data)
                .unwrap_or_default();
            merge_into(&mut existing, data, &now);
            existing
        } else {
            resolve_map(data, &now)
        };
        Self::upsert(&tx, collection, id, &next, &now)?;
        tx.commit()?;
        Ok(())
    }

    fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Vec<(FieldPath, WriteValue)>,
    ) -> Result<(), StoreError> {
        let now = server_now();
        let tx = self.conn.unchecked_transaction()?;
        let Some(mut doc) = Self::load(&tx, collection, id)? else {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        };
        for (path, value) in fields {
            apply_field(&mut doc.data, &path, value, &now).map_err(|path| {
                StoreError::FieldPathNotFound {
                    collection: collection.to_string(),
                    id: id.to_string(),
                    path,
                }
            })?;
        }
        Self::upsert(&tx, collection, id, &doc.data, &now)?;
        tx.commit()?;
        Ok(())
    }

    fn create(&self, collection: &str, id: &str, data: WriteMap) -> Result<(), StoreError> {
        let now = server_now();
        let text = serde_json::to_string(&resolve_map(data, &now))?;
        let inserted = self.conn.execute(
            "INSERT INTO documents(collection, id, data, create_time, update_time)
             VALUES(?, ?, ?, ?, ?)
             ON CONFLICT(collection, id) DO NOTHING",
            (collection, id, &text, &now, &now),
        )?;
        if inserted == 0 {
            return Err(StoreError::AlreadyExists {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        let p = std::env::temp_dir().join(format!(
            "{}-{}",
            prefix,
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        std::fs::create_dir_all(&p).expect("create temp dir");
        p
    }

    fn writes(v: Value) -> WriteMap {
        v.as_object()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| (k, WriteValue::Json(v)))
            .collect()
    }

    #[test]
    fn create_refuses_existing_id() {
        let store = SqliteStore::open_in_memory("demo").expect("open");
        store
            .create("students", "1001", writes(json!({ "name": "Ana" })))
            .expect("first create");
        let second = store.create("students", "1001", writes(json!({ "name": "Bia" })));
        assert!(matches!(second, Err(StoreError::AlreadyExists { .. })));
        let doc = store.get("students", "1001").expect("get").expect("doc");
        assert_eq!(doc.data["name"], json!("Ana"));
    }

    #[test]
    fn query_eq_is_exact_and_case_sensitive() {
        let store = SqliteStore::open_in_memory("demo").expect("open");
        for (id, name) in [("1", "Ana Silva"), ("2", "ana silva"), ("3", "Ana Silva")] {
            store
                .create("students", id, writes(json!({ "name": name })))
                .expect("create");
        }
        let hits = store
            .query_eq("students", "name", &json!("Ana Silva"))
            .expect("query");
        let ids: Vec<&str> = hits.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert!(store
            .query_eq("students", "name", &json!("Ana"))
            .expect("query")
            .is_empty());
        assert!(matches!(
            store.query_eq("students", "name", &json!(null)),
            Err(StoreError::UnsupportedQueryValue { .. })
        ));
    }

    #[test]
    fn set_without_merge_overwrites_and_merge_preserves() {
        let store = SqliteStore::open_in_memory("demo").expect("open");
        store
            .set("students", "1", writes(json!({ "name": "Ana", "ra": "1" })), false)
            .expect("set");
        store
            .set("students", "1", writes(json!({ "nickname": "A" })), true)
            .expect("merge");
        let doc = store.get("students", "1").expect("get").expect("doc");
        assert_eq!(doc.data["name"], json!("Ana"));
        assert_eq!(doc.data["nickname"], json!("A"));

        store
            .set("students", "1", writes(json!({ "name": "Bia" })), false)
            .expect("overwrite");
        let doc = store.get("students", "1").expect("get").expect("doc");
        assert_eq!(Value::Object(doc.data), json!({ "name": "Bia" }));
    }

    #[test]
    fn update_fails_for_missing_document_or_parent() {
        let store = SqliteStore::open_in_memory("demo").expect("open");
        let missing = store.update(
            "students",
            "404",
            vec![(FieldPath::parse("name"), "X".into())],
        );
        assert!(matches!(missing, Err(StoreError::NotFound { .. })));

        store
            .create("students", "1", writes(json!({ "name": "Ana", "quarters": {} })))
            .expect("create");
        let no_parent = store.update(
            "students",
            "1",
            vec![(FieldPath::new(["quarters", "2024-T1", "engineering"]), 3u8.into())],
        );
        assert!(matches!(no_parent, Err(StoreError::FieldPathNotFound { .. })));
    }

    #[test]
    fn workspace_is_bound_to_first_project() {
        let ws = temp_dir("gradetrack-store-project");
        {
            let store = SqliteStore::open(&ws, "project-a").expect("open a");
            assert_eq!(store.project_id(), "project-a");
        }
        SqliteStore::open(&ws, "project-a").expect("reopen a");
        let other = SqliteStore::open(&ws, "project-b");
        assert!(matches!(other, Err(StoreError::ProjectMismatch { .. })));
        let _ = std::fs::remove_dir_all(ws);
    }
}
