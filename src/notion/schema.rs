//! Data-source schemas and the resolver that picks one under a database.
//!
//! With API version `2025-09-03` a database is only a container: reads and
//! writes go to one of its *data sources*, and a database may own several of
//! them with different property sets. [`resolve_data_source`] picks the one
//! whose properties cover every field the pipeline writes.
//!
//! # Selection
//!
//! | candidates | rule |
//! |------------|------|
//! | 0 | [`ResolveError::NoDataSource`] |
//! | 1 | returned if it has every required field, else [`ResolveError::SchemaMismatch`] |
//! | n, one full match | the full match |
//! | n, several full matches | shortest name, then name, then id |
//! | n, no full match | [`ResolveError::NoFullMatch`] with one diagnostic per candidate |
//!
//! The tie-break between several full matches carries no meaning beyond
//! being stable. Nothing is cached: every run resolves again.

use super::properties::plain_text;
use super::transport::{ApiRequest, ApiTransport};
use crate::error::{CandidateDiagnostic, ResolveError};
use itertools::Itertools;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{info, instrument, warn};

/// Property type of a data-source field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Title,
    RichText,
    Date,
    Select,
    Url,
    MultiSelect,
    Relation,
    Other(String),
}

impl FieldKind {
    pub fn from_api(kind: &str) -> Self {
        match kind {
            "title" => Self::Title,
            "rich_text" => Self::RichText,
            "date" => Self::Date,
            "select" => Self::Select,
            "url" => Self::Url,
            "multi_select" => Self::MultiSelect,
            "relation" => Self::Relation,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_api(&self) -> &str {
        match self {
            Self::Title => "title",
            Self::RichText => "rich_text",
            Self::Date => "date",
            Self::Select => "select",
            Self::Url => "url",
            Self::MultiSelect => "multi_select",
            Self::Relation => "relation",
            Self::Other(other) => other,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_api())
    }
}

/// A field of a data source, bound to its stable id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef {
    pub id: String,
    pub name: String,
    pub kind: FieldKind,
}

/// The property set of one data source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSourceSchema {
    pub id: String,
    pub name: String,
    /// Keyed by display name; ordered so lookups are deterministic.
    pub fields: BTreeMap<String, FieldRef>,
}

impl DataSourceSchema {
    /// Parse a `GET /data_sources/{id}` response.
    pub fn from_api(value: &Value) -> Result<Self, ResolveError> {
        let id = value
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| ResolveError::Malformed("data source without id".into()))?
            .to_string();
        let name = data_source_name(value);

        let mut fields = BTreeMap::new();
        if let Some(props) = value.get("properties").and_then(Value::as_object) {
            for (prop_name, meta) in props {
                let field_id = meta
                    .get("id")
                    .and_then(Value::as_str)
                    .unwrap_or(prop_name)
                    .to_string();
                let kind = meta
                    .get("type")
                    .and_then(Value::as_str)
                    .map(FieldKind::from_api)
                    .unwrap_or_else(|| FieldKind::Other(String::new()));
                fields.insert(
                    prop_name.clone(),
                    FieldRef {
                        id: field_id,
                        name: prop_name.clone(),
                        kind,
                    },
                );
            }
        }

        Ok(Self { id, name, fields })
    }

    /// Required names absent from this schema, in the order given.
    pub fn missing<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
        required
            .iter()
            .filter(|name| !self.fields.contains_key(**name))
            .copied()
            .collect()
    }
}

/// Data sources report their name either as a plain string or as rich text.
fn data_source_name(value: &Value) -> String {
    match value.get("name") {
        Some(Value::String(s)) => s.clone(),
        _ => plain_text(value),
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    id: String,
    name: String,
}

async fn list_candidates<T: ApiTransport>(
    transport: &T,
    database_id: &str,
) -> Result<Vec<Candidate>, ResolveError> {
    let db = transport
        .send(&ApiRequest::get(format!("/databases/{database_id}")))
        .await?;
    let candidates = db
        .get("data_sources")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(|ds| {
                    let id = ds.get("id").and_then(Value::as_str)?;
                    let name = ds.get("name").and_then(Value::as_str).unwrap_or_default();
                    Some(Candidate {
                        id: id.to_string(),
                        name: name.to_string(),
                    })
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    Ok(candidates)
}

/// Fetch one data source's schema by id.
pub async fn retrieve_data_source<T: ApiTransport>(
    transport: &T,
    data_source_id: &str,
) -> Result<DataSourceSchema, ResolveError> {
    let value = transport
        .send(&ApiRequest::get(format!("/data_sources/{data_source_id}")))
        .await?;
    DataSourceSchema::from_api(&value)
}

/// Pick the data source under `database_id` that carries every `required` field.
#[instrument(level = "info", skip(transport, required), fields(required_fields = required.len()))]
pub async fn resolve_data_source<T: ApiTransport>(
    transport: &T,
    database_id: &str,
    required: &[&str],
) -> Result<DataSourceSchema, ResolveError> {
    let candidates = list_candidates(transport, database_id).await?;

    if candidates.is_empty() {
        return Err(ResolveError::NoDataSource {
            database_id: database_id.to_string(),
        });
    }

    if let [only] = candidates.as_slice() {
        let schema = retrieve_data_source(transport, &only.id).await?;
        let missing = schema.missing(required);
        if !missing.is_empty() {
            return Err(ResolveError::SchemaMismatch {
                data_source_id: only.id.clone(),
                name: only.name.clone(),
                missing: missing.into_iter().map(String::from).collect(),
            });
        }
        info!(data_source_id = %schema.id, name = %only.name, "Single data source matches");
        return Ok(schema);
    }

    let mut scored = Vec::with_capacity(candidates.len());
    for candidate in &candidates {
        let mut schema = retrieve_data_source(transport, &candidate.id).await?;
        if schema.name.is_empty() {
            schema.name = candidate.name.clone();
        }
        let missing: Vec<String> = schema.missing(required).into_iter().map(String::from).collect();
        scored.push((required.len() - missing.len(), missing, schema));
    }

    let mut full: Vec<DataSourceSchema> = scored
        .iter()
        .filter(|(score, _, _)| *score == required.len())
        .map(|(_, _, schema)| schema.clone())
        .collect();

    match full.len() {
        0 => {
            let candidates = scored
                .into_iter()
                .sorted_by(|(sa, _, a), (sb, _, b)| {
                    sb.cmp(sa).then_with(|| a.name.cmp(&b.name)).then_with(|| a.id.cmp(&b.id))
                })
                .map(|(matched, missing, schema)| CandidateDiagnostic {
                    data_source_id: schema.id,
                    name: schema.name,
                    matched,
                    missing,
                })
                .collect();
            Err(ResolveError::NoFullMatch {
                database_id: database_id.to_string(),
                required: required.iter().map(|s| s.to_string()).collect(),
                candidates,
            })
        }
        1 => {
            let schema = full.remove(0);
            info!(data_source_id = %schema.id, name = %schema.name, "Resolved data source by schema");
            Ok(schema)
        }
        n => {
            full.sort_by(|a, b| {
                a.name
                    .chars()
                    .count()
                    .cmp(&b.name.chars().count())
                    .then_with(|| a.name.cmp(&b.name))
                    .then_with(|| a.id.cmp(&b.id))
            });
            let schema = full.remove(0);
            warn!(
                full_matches = n,
                data_source_id = %schema.id,
                name = %schema.name,
                "Several data sources match; picked the shortest name"
            );
            Ok(schema)
        }
    }
}
