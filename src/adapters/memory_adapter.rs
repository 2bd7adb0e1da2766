//! In-process document store.

use crate::domain::error::FetchError;
use crate::ports::store_port::{Document, DocumentStore, DocumentWriter, Projection, Query};
use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

type Key = (Option<String>, String, Option<String>, Option<String>);

fn key_of(doc: &Document) -> Key {
    (
        doc.dname.clone(),
        doc.date.clone(),
        doc.time.clone(),
        doc.sid.clone(),
    )
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .map(|c| c.get(collection).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    fn poisoned() -> FetchError {
        FetchError::Connectivity {
            reason: "memory store lock poisoned".into(),
        }
    }
}

impl DocumentStore for MemoryStore {
    fn find(
        &self,
        collection: &str,
        query: &Query,
        projection: &Projection,
    ) -> Result<Vec<Document>, FetchError> {
        let collections = self.collections.read().map_err(|_| Self::poisoned())?;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|d| query.matches(d))
                    .map(|d| projection.apply(d.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn distinct_dates(&self, collection: &str) -> Result<Vec<String>, FetchError> {
        let collections = self.collections.read().map_err(|_| Self::poisoned())?;
        let dates: BTreeSet<String> = collections
            .get(collection)
            .map(|docs| docs.iter().map(|d| d.date.clone()).collect())
            .unwrap_or_default();
        Ok(dates.into_iter().collect())
    }
}

impl DocumentWriter for MemoryStore {
    fn upsert(&self, collection: &str, doc: Document) -> Result<(), FetchError> {
        let mut collections = self.collections.write().map_err(|_| Self::poisoned())?;
        let docs = collections.entry(collection.to_string()).or_default();
        let key = key_of(&doc);
        match docs.iter_mut().find(|d| key_of(d) == key) {
            Some(existing) => existing.dvalue = doc.dvalue,
            None => docs.push(doc),
        }
        Ok(())
    }
}
