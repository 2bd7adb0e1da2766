//! Canonical security universe used as the reindexing target.
//!
//! A universe is either parsed from a comma separated sid list or loaded from a
//! stored universe document whose `dvalue` flags membership per sid.

use crate::domain::error::FetchError;
use crate::ports::store_port::{DocumentStore, Projection, Query};
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Universe {
    sids: Vec<String>,
}

impl Universe {
    pub fn new(sids: Vec<String>) -> Result<Self, UniverseError> {
        let mut seen = HashSet::new();
        for sid in &sids {
            if !seen.insert(sid.as_str()) {
                return Err(UniverseError::DuplicateSid(sid.clone()));
            }
        }
        Ok(Self { sids })
    }

    pub fn sids(&self) -> &[String] {
        &self.sids
    }

    pub fn count(&self) -> usize {
        self.sids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sids.is_empty()
    }

    pub fn contains(&self, sid: &str) -> bool {
        self.sids.iter().any(|s| s == sid)
    }

    /// Members flagged non-zero in the `(dname, date)` universe document.
    pub fn from_store(
        store: &dyn DocumentStore,
        collection: &str,
        dname: &str,
        date: &str,
    ) -> Result<Self, FetchError> {
        let query = Query::new().dname_eq(dname).date_eq(date);
        let docs = store.find(collection, &query, &Projection::all())?;
        let Some(doc) = docs.into_iter().next() else {
            return Err(FetchError::StoreQuery {
                reason: format!("no universe document {dname} on {date} in {collection}"),
            });
        };
        let sids = doc
            .dvalue
            .into_iter()
            .filter(|(_, flag)| *flag != 0.0)
            .map(|(sid, _)| sid)
            .collect();
        tracing::info!(collection, dname, date, "universe loaded");
        Ok(Self { sids })
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in sid list")]
    EmptyToken,

    #[error("duplicate sid: {0}")]
    DuplicateSid(String),
}

impl From<UniverseError> for FetchError {
    fn from(err: UniverseError) -> Self {
        FetchError::ConfigInvalid {
            section: "universe".into(),
            key: "sids".into(),
            reason: err.to_string(),
        }
    }
}

pub fn parse_sids(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut sids = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let sid = token.trim();
        if sid.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        if !seen.insert(sid.to_string()) {
            return Err(UniverseError::DuplicateSid(sid.to_string()));
        }
        sids.push(sid.to_string());
    }

    Ok(sids)
}
