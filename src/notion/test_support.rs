//! In-memory stand-in for the Notion API used by the unit tests.
//!
//! Implements just enough of the data-source endpoints for the resolver, the
//! repository and the pipeline: database and data-source retrieval, exact
//! match queries, page create/retrieve/patch and paginated relation reads.
//! Field ids are `"title"` for title properties and the display name for
//! everything else.

use super::properties::plain_text;
use super::transport::{ApiRequest, ApiTransport, Method};
use crate::error::TransportError;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct DataSource {
    name: String,
    /// (name, id, kind)
    fields: Vec<(String, String, String)>,
}

#[derive(Debug, Clone)]
pub struct FakePage {
    pub id: String,
    pub data_source_id: String,
    /// Keyed by field id, values as written by the client.
    pub properties: Map<String, Value>,
}

impl FakePage {
    /// Plain text of a title/rich-text/url/select property.
    pub fn text(&self, field_id: &str) -> String {
        let Some(value) = self.properties.get(field_id) else {
            return String::new();
        };
        if let Some(url) = value.get("url").and_then(Value::as_str) {
            return url.to_string();
        }
        if let Some(name) = value.pointer("/select/name").and_then(Value::as_str) {
            return name.to_string();
        }
        if let Some(start) = value.pointer("/date/start").and_then(Value::as_str) {
            return start.to_string();
        }
        plain_text(value)
    }

    pub fn relation(&self, field_id: &str) -> Vec<String> {
        self.properties
            .get(field_id)
            .map(super::properties::relation_ids)
            .unwrap_or_default()
    }
}

#[derive(Debug, Default)]
struct State {
    databases: BTreeMap<String, Vec<(String, String)>>,
    data_sources: BTreeMap<String, DataSource>,
    pages: Vec<FakePage>,
    calls: Vec<(Method, String)>,
    reject_creates_containing: Option<String>,
}

#[derive(Debug)]
pub struct FakeNotion {
    state: Mutex<State>,
    relation_page_size: usize,
}

fn field_id(name: &str, kind: &str) -> String {
    if kind == "title" {
        "title".to_string()
    } else {
        name.to_string()
    }
}

fn not_found(what: &str) -> TransportError {
    TransportError::Status {
        status: 404,
        body: json!({"object": "error", "code": "object_not_found", "message": what}).to_string(),
    }
}

fn bad_request(what: &str) -> TransportError {
    TransportError::Status {
        status: 400,
        body: json!({"object": "error", "code": "validation_error", "message": what}).to_string(),
    }
}

impl FakeNotion {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            relation_page_size: 25,
        }
    }

    /// Relations longer than `size` come back truncated with `has_more`.
    pub fn with_relation_page_size(mut self, size: usize) -> Self {
        self.relation_page_size = size;
        self
    }

    pub fn add_database(&self, database_id: &str, data_sources: &[(&str, &str)]) {
        let mut state = self.state.lock().unwrap();
        state.databases.insert(
            database_id.to_string(),
            data_sources
                .iter()
                .map(|(id, name)| (id.to_string(), name.to_string()))
                .collect(),
        );
    }

    /// Register a data source under `database_id`; fields are `(name, kind)`.
    pub fn add_data_source(
        &self,
        database_id: &str,
        data_source_id: &str,
        name: &str,
        fields: &[(&str, &str)],
    ) {
        let mut state = self.state.lock().unwrap();
        state
            .databases
            .entry(database_id.to_string())
            .or_default()
            .push((data_source_id.to_string(), name.to_string()));
        state.data_sources.insert(
            data_source_id.to_string(),
            DataSource {
                name: name.to_string(),
                fields: fields
                    .iter()
                    .map(|(n, k)| (n.to_string(), field_id(n, k), k.to_string()))
                    .collect(),
            },
        );
    }

    pub fn add_field(&self, data_source_id: &str, name: &str, kind: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(ds) = state.data_sources.get_mut(data_source_id) {
            ds.fields
                .push((name.to_string(), field_id(name, kind), kind.to_string()));
        }
    }

    /// Fail page creation with a 400 when the request body mentions `needle`.
    pub fn reject_creates_containing(&self, needle: &str) {
        self.state.lock().unwrap().reject_creates_containing = Some(needle.to_string());
    }

    pub fn pages_in(&self, data_source_id: &str) -> Vec<FakePage> {
        self.state
            .lock()
            .unwrap()
            .pages
            .iter()
            .filter(|p| p.data_source_id == data_source_id)
            .cloned()
            .collect()
    }

    pub fn count_calls(&self, method: Method) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(m, _)| *m == method)
            .count()
    }

    fn field_name(state: &State, data_source_id: &str, id: &str) -> (String, String) {
        state
            .data_sources
            .get(data_source_id)
            .and_then(|ds| ds.fields.iter().find(|(_, fid, _)| fid == id))
            .map(|(name, _, kind)| (name.clone(), kind.clone()))
            .unwrap_or_else(|| (id.to_string(), String::new()))
    }

    fn handle(&self, request: &ApiRequest) -> Result<Value, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push((request.method, request.path.clone()));
        let segments: Vec<&str> = request.path.trim_start_matches('/').split('/').collect();
        let body = request.body.clone().unwrap_or(Value::Null);

        match (request.method, segments.as_slice()) {
            (Method::Get, ["databases", id]) => {
                let sources = state.databases.get(*id).ok_or_else(|| not_found(id))?;
                Ok(json!({
                    "object": "database",
                    "id": id,
                    "data_sources": sources
                        .iter()
                        .map(|(ds, name)| json!({"id": ds, "name": name}))
                        .collect::<Vec<_>>(),
                }))
            }
            (Method::Get, ["data_sources", id]) => {
                let ds = state.data_sources.get(*id).ok_or_else(|| not_found(id))?;
                let properties: Map<String, Value> = ds
                    .fields
                    .iter()
                    .map(|(name, fid, kind)| {
                        (name.clone(), json!({"id": fid, "name": name, "type": kind}))
                    })
                    .collect();
                Ok(json!({"object": "data_source", "id": id, "name": ds.name, "properties": properties}))
            }
            (Method::Post, ["data_sources", id, "query"]) => {
                if !state.data_sources.contains_key(*id) {
                    return Err(not_found(id));
                }
                let filter = &body["filter"];
                let property = filter["property"].as_str().unwrap_or_default();
                let wanted = ["title", "rich_text", "url", "select"]
                    .iter()
                    .find_map(|key| filter.get(*key))
                    .and_then(|cond| cond["equals"].as_str())
                    .unwrap_or_default();
                let page_size = body["page_size"].as_u64().unwrap_or(100) as usize;
                let results: Vec<Value> = state
                    .pages
                    .iter()
                    .filter(|p| p.data_source_id == *id && p.text(property) == wanted)
                    .take(page_size)
                    .map(|p| json!({"object": "page", "id": p.id}))
                    .collect();
                Ok(json!({"object": "list", "results": results, "has_more": false}))
            }
            (Method::Post, ["pages"]) => {
                let data_source_id = body["parent"]["data_source_id"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string();
                if !state.data_sources.contains_key(&data_source_id) {
                    return Err(not_found(&data_source_id));
                }
                if let Some(needle) = &state.reject_creates_containing {
                    if body.to_string().contains(needle.as_str()) {
                        return Err(bad_request("rejected by test"));
                    }
                }
                let id = format!("page-{}", state.pages.len() + 1);
                let properties = body["properties"].as_object().cloned().unwrap_or_default();
                state.pages.push(FakePage {
                    id: id.clone(),
                    data_source_id,
                    properties,
                });
                Ok(json!({"object": "page", "id": id}))
            }
            (Method::Get, ["pages", id]) => {
                let page = state
                    .pages
                    .iter()
                    .find(|p| p.id == *id)
                    .ok_or_else(|| not_found(id))?;
                let mut properties = Map::new();
                for (fid, value) in &page.properties {
                    let (name, kind) = Self::field_name(&state, &page.data_source_id, fid);
                    let mut prop = value.as_object().cloned().unwrap_or_default();
                    prop.insert("id".into(), json!(fid));
                    prop.insert("type".into(), json!(kind));
                    if let Some(Value::Array(rel)) = prop.get("relation").cloned() {
                        let truncated = rel.len() > self.relation_page_size;
                        prop.insert(
                            "relation".into(),
                            json!(rel.into_iter().take(self.relation_page_size).collect::<Vec<_>>()),
                        );
                        prop.insert("has_more".into(), json!(truncated));
                    }
                    properties.insert(name, Value::Object(prop));
                }
                Ok(json!({"object": "page", "id": id, "properties": properties}))
            }
            (Method::Get, ["pages", id, "properties", prop_id]) => {
                let page = state
                    .pages
                    .iter()
                    .find(|p| p.id == *id)
                    .ok_or_else(|| not_found(id))?;
                let ids = page.relation(prop_id);
                let start: usize = request
                    .query
                    .iter()
                    .find(|(k, _)| k == "start_cursor")
                    .and_then(|(_, v)| v.parse().ok())
                    .unwrap_or(0);
                let end = (start + self.relation_page_size).min(ids.len());
                let has_more = end < ids.len();
                Ok(json!({
                    "object": "list",
                    "results": ids[start.min(end)..end]
                        .iter()
                        .map(|rid| json!({"object": "property_item", "type": "relation", "relation": {"id": rid}}))
                        .collect::<Vec<_>>(),
                    "has_more": has_more,
                    "next_cursor": if has_more { json!(end.to_string()) } else { Value::Null },
                }))
            }
            (Method::Patch, ["pages", id]) => {
                let page = state
                    .pages
                    .iter_mut()
                    .find(|p| p.id == *id)
                    .ok_or_else(|| not_found(id))?;
                if let Some(props) = body["properties"].as_object() {
                    for (fid, value) in props {
                        page.properties.insert(fid.clone(), value.clone());
                    }
                }
                Ok(json!({"object": "page", "id": id}))
            }
            _ => Err(bad_request(&format!("unsupported {} {}", request.method, request.path))),
        }
    }
}

impl ApiTransport for FakeNotion {
    async fn send(&self, request: &ApiRequest) -> Result<Value, TransportError> {
        self.handle(request)
    }
}
