//! Binding logical field names to the stable ids of a resolved data source.
//!
//! Writes and filters address properties by id so a display-name rename in
//! Notion between two runs does not break the pipeline. Names are matched
//! exactly first, then case-insensitively.
//!
//! Title fields get one more fallback: exact-match lookups and page creation
//! only work against the data source's real title property, so when the
//! configured name points to something else (or nothing) the single
//! title-kind field is used instead.

use super::schema::{DataSourceSchema, FieldKind, FieldRef};
use crate::config::{ArticleFieldNames, TermFieldNames};
use crate::error::MappingError;
use std::collections::BTreeMap;
use tracing::warn;

/// Find a field by display name.
///
/// # Arguments
///
/// * `schema` - The resolved data source
/// * `name` - Configured field name
///
/// # Returns
///
/// The field whose name equals `name` exactly, else the first one that
/// matches case-insensitively, else `None`.
pub fn lookup_by_name<'a>(schema: &'a DataSourceSchema, name: &str) -> Option<&'a FieldRef> {
    if let Some(field) = schema.fields.get(name) {
        return Some(field);
    }
    let wanted = name.to_lowercase();
    schema
        .fields
        .values()
        .find(|field| field.name.to_lowercase() == wanted)
}

/// First field of the given kind. Used to find the single title field.
pub fn lookup_by_kind<'a>(schema: &'a DataSourceSchema, kind: &FieldKind) -> Option<&'a FieldRef> {
    schema.fields.values().find(|field| &field.kind == kind)
}

fn resolve(schema: &DataSourceSchema, name: &str) -> Result<FieldRef, MappingError> {
    lookup_by_name(schema, name)
        .cloned()
        .ok_or_else(|| MappingError::Unresolved {
            name: name.to_string(),
            data_source_id: schema.id.clone(),
        })
}

/// Resolve the title field, overriding a name that points to a non-title field.
pub fn resolve_title(schema: &DataSourceSchema, name: &str) -> Result<FieldRef, MappingError> {
    match lookup_by_name(schema, name) {
        Some(field) if field.kind == FieldKind::Title => Ok(field.clone()),
        by_name => {
            let title = lookup_by_kind(schema, &FieldKind::Title).cloned().ok_or_else(|| {
                MappingError::NoTitleField {
                    data_source_id: schema.id.clone(),
                }
            })?;
            warn!(
                configured = name,
                resolved_kind = ?by_name.map(|f| &f.kind),
                substitute = %title.name,
                "Configured title field is not the title property; using the title property"
            );
            Ok(title)
        }
    }
}

fn resolve_kind(
    schema: &DataSourceSchema,
    name: &str,
    kind: FieldKind,
    wanted: &'static str,
) -> Result<FieldRef, MappingError> {
    let field = resolve(schema, name)?;
    if field.kind != kind {
        return Err(MappingError::KindMismatch {
            name: field.name,
            kind: field.kind.to_string(),
            wanted,
        });
    }
    Ok(field)
}

/// Map every name to its field, failing on the first one that does not resolve.
pub fn map_fields(
    schema: &DataSourceSchema,
    names: &[&str],
) -> Result<BTreeMap<String, FieldRef>, MappingError> {
    names
        .iter()
        .map(|name| resolve(schema, name).map(|field| (name.to_string(), field)))
        .collect()
}

/// Fields of the article data source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleFields {
    pub published: FieldRef,
    pub title: FieldRef,
    pub author: FieldRef,
    pub category: FieldRef,
    pub summary: FieldRef,
    pub url: FieldRef,
    pub terms: FieldRef,
}

impl ArticleFields {
    /// Bind every configured article field name; the title uses the
    /// title-kind fallback.
    pub fn from_schema(
        schema: &DataSourceSchema,
        names: &ArticleFieldNames,
    ) -> Result<Self, MappingError> {
        let mapped = map_fields(
            schema,
            &[
                names.published.as_str(),
                names.author.as_str(),
                names.category.as_str(),
                names.summary.as_str(),
                names.url.as_str(),
                names.terms.as_str(),
            ],
        )?;
        let field = |name: &str| mapped[name].clone();
        Ok(Self {
            published: field(&names.published),
            title: resolve_title(schema, &names.title)?,
            author: field(&names.author),
            category: field(&names.category),
            summary: field(&names.summary),
            url: field(&names.url),
            terms: field(&names.terms),
        })
    }
}

/// Fields of the glossary data source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermFields {
    pub term: FieldRef,
    pub meaning: FieldRef,
    pub articles: FieldRef,
}

impl TermFields {
    /// Bind the term fields; the related-articles field must be a relation.
    pub fn from_schema(
        schema: &DataSourceSchema,
        names: &TermFieldNames,
    ) -> Result<Self, MappingError> {
        Ok(Self {
            term: resolve_title(schema, &names.term)?,
            meaning: resolve(schema, &names.meaning)?,
            articles: resolve_kind(schema, &names.articles, FieldKind::Relation, "relation")?,
        })
    }
}
