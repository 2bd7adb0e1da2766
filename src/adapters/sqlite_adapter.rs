//! SQLite document store adapter.
//!
//! Documents live in one table keyed by `(collection, dname, date, time, sid)`;
//! absent key parts are stored as empty strings and `dvalue` as JSON text.

use crate::domain::error::FetchError;
use crate::ports::config_port::ConfigPort;
use crate::ports::store_port::{
    Document, DocumentStore, DocumentWriter, Filter, Projection, Query,
};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::collections::BTreeMap;

pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteStore {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, FetchError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| FetchError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4);
        if pool_size <= 0 {
            return Err(FetchError::ConfigInvalid {
                section: "sqlite".into(),
                key: "pool_size".into(),
                reason: "pool_size must be positive".into(),
            });
        }

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size as u32)
            .build(manager)
            .map_err(|e: r2d2::Error| FetchError::Connectivity {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, FetchError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| FetchError::Connectivity {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, FetchError> {
        self.pool.get().map_err(|e: r2d2::Error| FetchError::Connectivity {
            reason: e.to_string(),
        })
    }

    pub fn initialize_schema(&self) -> Result<(), FetchError> {
        let conn = self.conn()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                dname TEXT NOT NULL DEFAULT '',
                date TEXT NOT NULL,
                time TEXT NOT NULL DEFAULT '',
                sid TEXT NOT NULL DEFAULT '',
                dvalue TEXT NOT NULL,
                PRIMARY KEY (collection, dname, date, time, sid)
            );
            CREATE INDEX IF NOT EXISTS idx_documents_dname_date
                ON documents(collection, dname, date);
            CREATE INDEX IF NOT EXISTS idx_documents_date
                ON documents(collection, date);",
        )
        .map_err(query_error)?;
        Ok(())
    }
}

fn query_error(e: rusqlite::Error) -> FetchError {
    FetchError::StoreQuery {
        reason: e.to_string(),
    }
}

fn push_filter(column: &str, filter: &Filter, clauses: &mut Vec<String>, args: &mut Vec<String>) {
    match filter {
        Filter::Eq(v) => {
            clauses.push(format!("{column} = ?"));
            args.push(v.clone());
        }
        Filter::Between { gte, lte } => {
            clauses.push(format!("{column} >= ? AND {column} <= ?"));
            args.push(gte.clone());
            args.push(lte.clone());
        }
        Filter::In(values) if values.is_empty() => clauses.push("0".into()),
        Filter::In(values) => {
            let marks = vec!["?"; values.len()].join(", ");
            clauses.push(format!("{column} IN ({marks})"));
            args.extend(values.iter().cloned());
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

impl DocumentStore for SqliteStore {
    fn find(
        &self,
        collection: &str,
        query: &Query,
        projection: &Projection,
    ) -> Result<Vec<Document>, FetchError> {
        let conn = self.conn()?;

        let mut clauses = vec!["collection = ?".to_string()];
        let mut args = vec![collection.to_string()];
        if let Some(f) = &query.dname {
            push_filter("dname", f, &mut clauses, &mut args);
        }
        if let Some(f) = &query.date {
            push_filter("date", f, &mut clauses, &mut args);
        }
        if let Some(f) = &query.time {
            push_filter("time", f, &mut clauses, &mut args);
        }
        let sql = format!(
            "SELECT dname, date, time, sid, dvalue FROM documents WHERE {}",
            clauses.join(" AND ")
        );
        tracing::trace!(%sql, "sqlite find");

        let mut stmt = conn.prepare(&sql).map_err(query_error)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(args.iter()), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .map_err(query_error)?;

        let mut docs = Vec::new();
        for row in rows {
            let (dname, date, time, sid, dvalue) = row.map_err(query_error)?;
            let dvalue: BTreeMap<String, f64> =
                serde_json::from_str(&dvalue).map_err(|e| FetchError::StoreQuery {
                    reason: format!("malformed dvalue for {dname}@{date}: {e}"),
                })?;
            docs.push(projection.apply(Document {
                dname: non_empty(dname),
                date,
                time: non_empty(time),
                sid: non_empty(sid),
                dvalue,
            }));
        }
        Ok(docs)
    }

    fn distinct_dates(&self, collection: &str) -> Result<Vec<String>, FetchError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT date FROM documents WHERE collection = ?1 ORDER BY date")
            .map_err(query_error)?;
        let rows = stmt
            .query_map(params![collection], |row| row.get(0))
            .map_err(query_error)?;

        let mut dates = Vec::new();
        for row in rows {
            dates.push(row.map_err(query_error)?);
        }
        Ok(dates)
    }
}

impl DocumentWriter for SqliteStore {
    fn upsert(&self, collection: &str, doc: Document) -> Result<(), FetchError> {
        self.upsert_many(collection, vec![doc]).map(|_| ())
    }

    fn upsert_many(&self, collection: &str, docs: Vec<Document>) -> Result<usize, FetchError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;
        for doc in &docs {
            // JSON has no NaN; non-finite values are stored as absent.
            let finite: BTreeMap<&String, &f64> =
                doc.dvalue.iter().filter(|(_, v)| v.is_finite()).collect();
            let dvalue = serde_json::to_string(&finite).map_err(|e| FetchError::StoreQuery {
                reason: e.to_string(),
            })?;
            tx.execute(
                "INSERT OR REPLACE INTO documents (collection, dname, date, time, sid, dvalue)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    collection,
                    doc.dname.as_deref().unwrap_or_default(),
                    doc.date,
                    doc.time.as_deref().unwrap_or_default(),
                    doc.sid.as_deref().unwrap_or_default(),
                    dvalue
                ],
            )
            .map_err(query_error)?;
        }
        tx.commit().map_err(query_error)?;
        Ok(docs.len())
    }
}
