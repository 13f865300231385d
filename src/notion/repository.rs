//! Record-level operations against one resolved data source.
//!
//! [`Repository::merge_relation`] reads the current relation set and writes
//! back the union. Notion has no conditional write, so two processes merging
//! into the same page at the same moment can lose one link (last writer
//! wins). Runs are sequential and rarely overlap, so the race is accepted.
//!
//! A relation write carries the whole set and Notion accepts at most
//! [`RELATION_WRITE_LIMIT`] ids per property update. A merge that would go
//! past it fails with [`RepoError::RelationLimit`] before any write.

use super::properties::{PropertyValue, equals_filter, normalize_id, page_property, relation_ids};
use super::schema::{FieldKind, FieldRef};
use super::transport::{ApiRequest, ApiTransport};
use crate::error::{MappingError, RepoError};
use itertools::Itertools;
use serde_json::{Map, Value, json};
use tracing::{debug, instrument};

/// Most ids a single relation property update may carry.
pub const RELATION_WRITE_LIMIT: usize = 100;

/// Result of [`Repository::merge_relation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    AlreadyLinked,
    Linked { total: usize },
}

/// Find, create and relation-merge operations on the records of one data source.
///
/// Holds a borrowed transport so the article and term repositories share
/// one client and one retry policy.
#[derive(Debug)]
pub struct Repository<'a, T> {
    transport: &'a T,
    data_source_id: String,
}

impl<'a, T: ApiTransport> Repository<'a, T> {
    /// Bind `transport` to the data source `data_source_id`.
    ///
    /// # Arguments
    ///
    /// * `transport` - Client used for every call of this repository
    /// * `data_source_id` - Resolved (or pinned) data source id; records are
    ///   created under it and queries run against it
    pub fn new(transport: &'a T, data_source_id: impl Into<String>) -> Self {
        Self {
            transport,
            data_source_id: data_source_id.into(),
        }
    }

    /// Id of the data source this repository reads and writes.
    pub fn data_source_id(&self) -> &str {
        &self.data_source_id
    }

    /// Id of the first record whose `field` equals `value` exactly.
    ///
    /// The filter key follows the field kind (title, rich text, url or
    /// select); other kinds fail with a mapping error before any request.
    #[instrument(level = "debug", skip(self, field), fields(data_source_id = %self.data_source_id, field = %field.name))]
    pub async fn find_by_exact_text(
        &self,
        field: &FieldRef,
        value: &str,
    ) -> Result<Option<String>, RepoError> {
        let body = json!({
            "filter": equals_filter(field, value)?,
            "page_size": 1,
        });
        let response = self
            .transport
            .send(&ApiRequest::post(
                format!("/data_sources/{}/query", self.data_source_id),
                body,
            ))
            .await?;
        Ok(response
            .get("results")
            .and_then(Value::as_array)
            .and_then(|results| results.first())
            .and_then(|page| page.get("id"))
            .and_then(Value::as_str)
            .map(String::from))
    }

    /// Create a record and return its id.
    #[instrument(level = "debug", skip_all, fields(data_source_id = %self.data_source_id))]
    pub async fn create_record(
        &self,
        properties: &[(&FieldRef, PropertyValue)],
    ) -> Result<String, RepoError> {
        let props: Map<String, Value> = properties
            .iter()
            .map(|(field, value)| (field.id.clone(), value.to_api()))
            .collect();
        let body = json!({
            "parent": { "type": "data_source_id", "data_source_id": self.data_source_id },
            "properties": props,
        });
        let created = self.transport.send(&ApiRequest::post("/pages", body)).await?;
        created
            .get("id")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| RepoError::Malformed(format!("page create returned no id: {created}")))
    }

    /// Every id in a relation property, following pagination when the page
    /// payload reports a truncated list.
    pub async fn relation_targets(
        &self,
        record_id: &str,
        field: &FieldRef,
    ) -> Result<Vec<String>, RepoError> {
        if field.kind != FieldKind::Relation {
            return Err(MappingError::KindMismatch {
                name: field.name.clone(),
                kind: field.kind.to_string(),
                wanted: "a relation",
            }
            .into());
        }

        let page = self
            .transport
            .send(&ApiRequest::get(format!("/pages/{record_id}")))
            .await?;
        let Some(property) = page_property(&page, field) else {
            return Ok(Vec::new());
        };
        if property.get("has_more").and_then(Value::as_bool) != Some(true) {
            return Ok(relation_ids(property));
        }

        debug!(record_id, field = %field.name, "Relation truncated; paging property items");
        let mut ids = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut request = ApiRequest::get(format!("/pages/{record_id}/properties/{}", field.id));
            if let Some(cursor) = &cursor {
                request = request.with_query("start_cursor", cursor.clone());
            }
            let chunk = self.transport.send(&request).await?;
            if let Some(results) = chunk.get("results").and_then(Value::as_array) {
                ids.extend(results.iter().filter_map(|item| {
                    item.get("relation")
                        .and_then(|rel| rel.get("id"))
                        .and_then(Value::as_str)
                        .map(String::from)
                }));
            }
            cursor = chunk
                .get("next_cursor")
                .and_then(Value::as_str)
                .map(String::from);
            let has_more = chunk.get("has_more").and_then(Value::as_bool) == Some(true);
            if !has_more || cursor.is_none() {
                break;
            }
        }
        Ok(ids)
    }

    /// Add `target_id` to the relation set of `record_id`; existing links are kept.
    ///
    /// # Returns
    ///
    /// [`MergeOutcome::AlreadyLinked`] without writing when the target is
    /// present (ids compared dash- and case-insensitively), otherwise
    /// [`MergeOutcome::Linked`] with the new set size.
    ///
    /// # Errors
    ///
    /// [`RepoError::RelationLimit`] when the merged set would exceed
    /// [`RELATION_WRITE_LIMIT`]; transport failures unchanged.
    #[instrument(level = "debug", skip(self, field), fields(field = %field.name))]
    pub async fn merge_relation(
        &self,
        record_id: &str,
        field: &FieldRef,
        target_id: &str,
    ) -> Result<MergeOutcome, RepoError> {
        let existing: Vec<String> = self
            .relation_targets(record_id, field)
            .await?
            .into_iter()
            .unique_by(|id| normalize_id(id))
            .collect();

        let target_key = normalize_id(target_id);
        if existing.iter().any(|id| normalize_id(id) == target_key) {
            return Ok(MergeOutcome::AlreadyLinked);
        }

        let mut merged = existing;
        merged.push(target_id.to_string());
        let total = merged.len();
        if total > RELATION_WRITE_LIMIT {
            return Err(RepoError::RelationLimit {
                record_id: record_id.to_string(),
                field: field.name.clone(),
                total,
                limit: RELATION_WRITE_LIMIT,
            });
        }
        let value = PropertyValue::relation_for(field, merged)?;
        self.transport
            .send(&ApiRequest::patch(
                format!("/pages/{record_id}"),
                json!({ "properties": { field.id.clone(): value.to_api() } }),
            ))
            .await?;
        Ok(MergeOutcome::Linked { total })
    }
}
