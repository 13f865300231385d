//! Typed property values and their JSON encoding.
//!
//! Every value written to Notion goes through [`PropertyValue::to_api`], one
//! arm per field kind, instead of ad hoc JSON literals at call sites. The
//! `*_for` constructors adapt a plain value to whatever kind the resolved
//! field actually has, so a schema that stores terms as multi-select and one
//! that stores them as text both work.

use super::schema::{FieldKind, FieldRef};
use crate::error::MappingError;
use chrono::NaiveDate;
use serde_json::{Value, json};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Title(String),
    RichText(String),
    Date(NaiveDate),
    Select(String),
    Url(String),
    MultiSelect(Vec<String>),
    Relation(Vec<String>),
}

fn text_payload(text: &str) -> Value {
    json!([{"type": "text", "text": {"content": text}}])
}

impl PropertyValue {
    pub fn to_api(&self) -> Value {
        match self {
            Self::Title(text) => json!({ "title": text_payload(text) }),
            Self::RichText(text) => json!({ "rich_text": text_payload(text) }),
            Self::Date(date) => json!({ "date": { "start": date.format("%Y-%m-%d").to_string() } }),
            Self::Select(name) => json!({ "select": { "name": name } }),
            Self::Url(url) => json!({ "url": url }),
            Self::MultiSelect(names) => json!({
                "multi_select": names.iter().map(|name| json!({ "name": name })).collect::<Vec<_>>()
            }),
            Self::Relation(ids) => json!({
                "relation": ids.iter().map(|id| json!({ "id": id })).collect::<Vec<_>>()
            }),
        }
    }

    /// Encode one string for `field`, whatever text-like kind it has.
    pub fn text_for(field: &FieldRef, text: &str) -> Result<Self, MappingError> {
        match field.kind {
            FieldKind::Title => Ok(Self::Title(text.to_string())),
            FieldKind::RichText => Ok(Self::RichText(text.to_string())),
            FieldKind::Select => Ok(Self::Select(text.to_string())),
            FieldKind::Url => Ok(Self::Url(text.to_string())),
            FieldKind::MultiSelect => Ok(Self::MultiSelect(vec![text.to_string()])),
            _ => Err(kind_mismatch(field, "text")),
        }
    }

    /// Encode a list of names: option list for multi-select, comma-joined text otherwise.
    pub fn list_for(field: &FieldRef, items: &[String]) -> Result<Self, MappingError> {
        match field.kind {
            FieldKind::MultiSelect => Ok(Self::MultiSelect(
                items
                    .iter()
                    // multi-select option names cannot contain commas
                    .map(|item| item.replace(',', " "))
                    .collect(),
            )),
            _ => Self::text_for(field, &items.join(", ")),
        }
    }

    pub fn date_for(field: &FieldRef, date: NaiveDate) -> Result<Self, MappingError> {
        match field.kind {
            FieldKind::Date => Ok(Self::Date(date)),
            FieldKind::RichText => Ok(Self::RichText(date.format("%Y-%m-%d").to_string())),
            _ => Err(kind_mismatch(field, "a date")),
        }
    }

    pub fn relation_for(field: &FieldRef, ids: Vec<String>) -> Result<Self, MappingError> {
        match field.kind {
            FieldKind::Relation => Ok(Self::Relation(ids)),
            _ => Err(kind_mismatch(field, "a relation")),
        }
    }
}

fn kind_mismatch(field: &FieldRef, wanted: &'static str) -> MappingError {
    MappingError::KindMismatch {
        name: field.name.clone(),
        kind: field.kind.to_string(),
        wanted,
    }
}

/// Body of an exact-match query on `field`.
pub fn equals_filter(field: &FieldRef, value: &str) -> Result<Value, MappingError> {
    let key = match field.kind {
        FieldKind::Title => "title",
        FieldKind::RichText => "rich_text",
        FieldKind::Url => "url",
        FieldKind::Select => "select",
        _ => return Err(kind_mismatch(field, "an exact-match filter")),
    };
    Ok(json!({ "property": field.id, key: { "equals": value } }))
}

/// Notion ids appear both dashed and undashed; compare them in one form.
pub fn normalize_id(id: &str) -> String {
    id.chars()
        .filter(|c| *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Find a page property by field id (page payloads are keyed by display name).
pub fn page_property<'a>(page: &'a Value, field: &FieldRef) -> Option<&'a Value> {
    let props = page.get("properties")?.as_object()?;
    props
        .values()
        .find(|prop| prop.get("id").and_then(Value::as_str) == Some(field.id.as_str()))
        .or_else(|| props.get(&field.name))
}

/// Relation ids held in a page property, in stored order.
pub fn relation_ids(property: &Value) -> Vec<String> {
    property
        .get("relation")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("id").and_then(Value::as_str))
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Plain text of a title or rich-text property value.
pub fn plain_text(property: &Value) -> String {
    ["title", "rich_text"]
        .iter()
        .filter_map(|key| property.get(*key).and_then(Value::as_array))
        .flatten()
        .filter_map(|part| {
            part.get("plain_text")
                .or_else(|| part.get("text").and_then(|t| t.get("content")))
                .and_then(Value::as_str)
        })
        .collect()
}
