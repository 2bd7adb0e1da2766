//! Document store port: the query/projection surface the fetchers consume.

use crate::domain::error::FetchError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One persisted row.
///
/// Series collections key rows by `(dname, date[, time])` and `dvalue` maps
/// sid to value. Record collections key rows by `(date, sid)` and `dvalue`
/// maps series name to value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dname: Option<String>,
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    pub dvalue: BTreeMap<String, f64>,
}

impl Document {
    pub fn series<'a, I>(dname: &str, date: &str, values: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        Self {
            dname: Some(dname.to_string()),
            date: date.to_string(),
            time: None,
            sid: None,
            dvalue: values.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        }
    }

    pub fn interval<'a, I>(dname: &str, date: &str, time: &str, values: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        Self {
            time: Some(time.to_string()),
            ..Self::series(dname, date, values)
        }
    }

    pub fn record<'a, I>(date: &str, sid: &str, fields: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        Self {
            dname: None,
            date: date.to_string(),
            time: None,
            sid: Some(sid.to_string()),
            dvalue: fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        }
    }
}

/// Predicate on one string field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Eq(String),
    Between { gte: String, lte: String },
    In(Vec<String>),
}

impl Filter {
    pub fn matches(&self, value: &str) -> bool {
        match self {
            Filter::Eq(v) => value == v,
            Filter::Between { gte, lte } => value >= gte.as_str() && value <= lte.as_str(),
            Filter::In(values) => values.iter().any(|v| v == value),
        }
    }
}

/// Conjunction of optional filters on `dname`, `date` and `time`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub dname: Option<Filter>,
    pub date: Option<Filter>,
    pub time: Option<Filter>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dname_eq(mut self, dname: &str) -> Self {
        self.dname = Some(Filter::Eq(dname.to_string()));
        self
    }

    pub fn date_eq(mut self, date: &str) -> Self {
        self.date = Some(Filter::Eq(date.to_string()));
        self
    }

    pub fn date_between(mut self, gte: &str, lte: &str) -> Self {
        self.date = Some(Filter::Between {
            gte: gte.to_string(),
            lte: lte.to_string(),
        });
        self
    }

    pub fn time_in(mut self, times: &[String]) -> Self {
        self.time = Some(Filter::In(times.to_vec()));
        self
    }

    /// Evaluate against a document; a missing `dname`/`time` field never matches a filter.
    pub fn matches(&self, doc: &Document) -> bool {
        let field = |filter: &Option<Filter>, value: Option<&str>| match (filter, value) {
            (None, _) => true,
            (Some(f), Some(v)) => f.matches(v),
            (Some(_), None) => false,
        };
        field(&self.dname, doc.dname.as_deref())
            && field(&self.date, Some(&doc.date))
            && field(&self.time, doc.time.as_deref())
    }
}

/// Which `dvalue` keys to return; `None` returns all of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    pub fields: Option<Vec<String>>,
}

impl Projection {
    pub fn all() -> Self {
        Self { fields: None }
    }

    pub fn fields(fields: &[String]) -> Self {
        if fields.is_empty() {
            return Self::all();
        }
        Self {
            fields: Some(fields.to_vec()),
        }
    }

    pub fn apply(&self, mut doc: Document) -> Document {
        if let Some(fields) = &self.fields {
            doc.dvalue.retain(|k, _| fields.contains(k));
        }
        doc
    }
}

/// Read side of the store. No ordering of returned rows is assumed.
pub trait DocumentStore {
    fn find(
        &self,
        collection: &str,
        query: &Query,
        projection: &Projection,
    ) -> Result<Vec<Document>, FetchError>;

    /// Distinct `date` values of a collection, the trading calendar source.
    fn distinct_dates(&self, collection: &str) -> Result<Vec<String>, FetchError>;
}

/// Write side of the store, keyed by `(dname, date, time, sid)`.
pub trait DocumentWriter {
    fn upsert(&self, collection: &str, doc: Document) -> Result<(), FetchError>;

    fn upsert_many(&self, collection: &str, docs: Vec<Document>) -> Result<usize, FetchError> {
        let count = docs.len();
        for doc in docs {
            self.upsert(collection, doc)?;
        }
        Ok(count)
    }
}
