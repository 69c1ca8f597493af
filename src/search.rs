use serde::Deserialize;
use serde_json::{Map, Value};

use crate::domain::{ModelRunUuid, ModelSet};

/// Search API version the client speaks.
pub const SEARCH_VERSION: &str = "3";

/// Filters for a dataset search. An empty query is an unfiltered search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub model_run_uuid: Option<ModelRunUuid>,
    pub parent_model_run_uuid: Option<ModelRunUuid>,
    pub model_set: Option<ModelSet>,
    pub limit: Option<u32>,
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model_run_uuid(mut self, uuid: ModelRunUuid) -> Self {
        self.model_run_uuid = Some(uuid);
        self
    }

    pub fn parent_model_run_uuid(mut self, uuid: ModelRunUuid) -> Self {
        self.parent_model_run_uuid = Some(uuid);
        self
    }

    pub fn model_set(mut self, model_set: ModelSet) -> Self {
        self.model_set = Some(model_set);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("version", SEARCH_VERSION.to_string())];
        if let Some(uuid) = &self.model_run_uuid {
            params.push(("model_run_uuid", uuid.to_string()));
        }
        if let Some(uuid) = &self.parent_model_run_uuid {
            params.push(("parent_model_run_uuid", uuid.to_string()));
        }
        if let Some(model_set) = self.model_set {
            params.push(("model_set", model_set.to_string()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit", limit.to_string()));
        }
        params
    }
}

#[derive(Debug, Deserialize)]
struct RawSearchResult {
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    subtotal: Option<u64>,
    #[serde(default)]
    results: Vec<Map<String, Value>>,
}

/// Records returned by a search, in the order the server sent them.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    total: u64,
    subtotal: u64,
    records: Vec<Record>,
}

impl SearchResult {
    pub fn from_json(value: Value) -> Result<Self, serde_json::Error> {
        let raw: RawSearchResult = serde_json::from_value(value)?;
        let count = raw.results.len() as u64;
        Ok(Self {
            total: raw.total.unwrap_or(count),
            subtotal: raw.subtotal.unwrap_or(count),
            records: raw.results.into_iter().map(Record).collect(),
        })
    }

    /// Match count reported by the server; may exceed `records().len()`
    /// when a limit truncated the page.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn subtotal(&self) -> u64 {
        self.subtotal
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first_download_url(&self) -> Option<&str> {
        self.records
            .iter()
            .flat_map(|record| record.downloads())
            .next()
            .map(|download| download.bin)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn model_run_uuid(&self) -> Option<&str> {
        self.0.get("model_run_uuid").and_then(Value::as_str)
    }

    pub fn parent_model_run_uuid(&self) -> Option<&str> {
        self.0.get("parent_model_run_uuid").and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    /// Binary descriptors with a `bin` URL. Entries without one are skipped.
    pub fn downloads(&self) -> Vec<Download<'_>> {
        self.0
            .get("downloads")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| {
                        let bin = entry.get("bin")?.as_str()?;
                        let name = entry.get("name").and_then(Value::as_str);
                        Some(Download { name, bin })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Download<'a> {
    pub name: Option<&'a str>,
    pub bin: &'a str,
}
