//! Project metadata: pointers to generated artifacts, grouped by service.
//!
//! Records only ever accumulate. Merging appends, never dedups and never
//! reorders, so the mapping keeps first-seen service order and per-service
//! insertion order.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What a metadata record points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// A file belonging to the service
    File,
    /// The service's OpenAPI schema file
    OpenapiSchema,
    /// An API handler implementation, stored as `path:route`
    ApiHandler,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::File => "file",
            RecordKind::OpenapiSchema => "openapi_schema",
            RecordKind::ApiHandler => "api_handler",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(RecordKind::File),
            "openapi_schema" => Ok(RecordKind::OpenapiSchema),
            "api_handler" => Ok(RecordKind::ApiHandler),
            other => Err(format!("unknown record type '{other}'")),
        }
    }
}

/// One metadata record, as seen inside a service bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub record_type: RecordKind,
    pub data: String,
}

impl MetadataRecord {
    pub fn new(record_type: RecordKind, data: impl Into<String>) -> Self {
        Self {
            record_type,
            data: data.into(),
        }
    }
}

/// Service name → ordered records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectMetadata {
    services: IndexMap<String, Vec<MetadataRecord>>,
}

impl ProjectMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one record to a service bucket, creating the bucket if needed.
    pub fn push(&mut self, service: impl Into<String>, record: MetadataRecord) {
        self.services.entry(service.into()).or_default().push(record);
    }

    /// Append every record of `incoming` after the existing ones.
    pub fn merge(&mut self, incoming: &ProjectMetadata) {
        for (service, records) in &incoming.services {
            self.services
                .entry(service.clone())
                .or_default()
                .extend(records.iter().cloned());
        }
    }

    /// A copy of `self` with `incoming` merged on top.
    pub fn merged_with(&self, incoming: &ProjectMetadata) -> ProjectMetadata {
        let mut merged = self.clone();
        merged.merge(incoming);
        merged
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Total number of records across all services.
    pub fn record_count(&self) -> usize {
        self.services.values().map(Vec::len).sum()
    }

    pub fn service(&self, name: &str) -> Option<&[MetadataRecord]> {
        self.services.get(name).map(Vec::as_slice)
    }

    /// Services in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[MetadataRecord])> {
        self.services
            .iter()
            .map(|(name, records)| (name.as_str(), records.as_slice()))
    }

    /// Every record flattened, tagged with its service name.
    pub fn records(&self) -> impl Iterator<Item = (&str, &MetadataRecord)> {
        self.iter()
            .flat_map(|(service, records)| records.iter().map(move |r| (service, r)))
    }
}

impl FromIterator<(String, MetadataRecord)> for ProjectMetadata {
    fn from_iter<I: IntoIterator<Item = (String, MetadataRecord)>>(iter: I) -> Self {
        let mut metadata = ProjectMetadata::new();
        for (service, record) in iter {
            metadata.push(service, record);
        }
        metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(data: &str) -> MetadataRecord {
        MetadataRecord::new(RecordKind::File, data)
    }

    fn single(service: &str, records: &[&str]) -> ProjectMetadata {
        records
            .iter()
            .map(|r| (service.to_string(), file(r)))
            .collect()
    }

    #[test]
    fn merge_appends_in_order() {
        let mut stepwise = single("A", &["1"]);
        stepwise.merge(&single("A", &["2"]));

        let mut once = ProjectMetadata::new();
        once.merge(&single("A", &["1", "2"]));

        assert_eq!(stepwise, once);
        assert_eq!(stepwise.service("A").unwrap(), &[file("1"), file("2")]);
    }

    #[test]
    fn merge_is_associative() {
        let a = single("A", &["1"]);
        let b = single("B", &["2"]);
        let c = single("A", &["3"]);

        let left = a.merged_with(&b).merged_with(&c);
        let right = a.merged_with(&b.merged_with(&c));
        assert_eq!(left, right);
    }

    #[test]
    fn merge_keeps_duplicates_and_service_order() {
        let mut metadata = single("users", &["api.yaml"]);
        metadata.merge(&single("orders", &["x"]));
        metadata.merge(&single("users", &["api.yaml"]));

        let services: Vec<&str> = metadata.iter().map(|(s, _)| s).collect();
        assert_eq!(services, vec!["users", "orders"]);
        assert_eq!(metadata.service("users").unwrap().len(), 2);
        assert_eq!(metadata.record_count(), 3);
    }

    #[test]
    fn merging_empty_is_identity() {
        let mut metadata = single("A", &["1"]);
        let before = metadata.clone();
        metadata.merge(&ProjectMetadata::new());
        assert_eq!(metadata, before);
    }

    #[test]
    fn record_kind_strings() {
        for kind in [RecordKind::File, RecordKind::OpenapiSchema, RecordKind::ApiHandler] {
            assert_eq!(kind.as_str().parse::<RecordKind>().unwrap(), kind);
        }
        assert!("schema".parse::<RecordKind>().is_err());
    }

    #[test]
    fn serializes_as_plain_mapping() {
        let metadata = single("svc", &["main.py"]);
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"svc": [{"record_type": "file", "data": "main.py"}]})
        );
    }
}
