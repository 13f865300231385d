//! # notion_news_terms
//!
//! Cron-driven batch job that turns the newest articles of a few Korean news
//! RSS feeds into Notion records: one article page per story and a glossary
//! of key terms linked back to the articles that mention them.
//!
//! ## Workflow
//!
//! 1. **Configure**: parse CLI/env, load the optional YAML file, validate
//! 2. **Resolve**: pick the article and term data sources by schema and map
//!    logical field names to property ids
//! 3. **Ingest**: fetch every allowed feed and keep the newest unique links
//! 4. **Process**: per item, skip known URLs, summarize, classify, create
//!    the article, then create or link its two terms
//!
//! The job is idempotent: a second run over the same feed creates nothing.
//! Item failures are logged and counted; the process still exits 0.
//! Configuration and resolution failures abort the run with a non-zero exit.

use clap::Parser;
use std::error::Error;
use std::time::Instant;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod classify;
mod cli;
mod config;
mod error;
mod feeds;
mod models;
mod notion;
mod pipeline;
mod retry;
mod summarize;
mod utils;

use classify::KeywordClassifier;
use cli::Cli;
use config::{CollectionTarget, Config};
use notion::fields::{ArticleFields, TermFields};
use notion::repository::Repository;
use notion::schema::{DataSourceSchema, resolve_data_source, retrieve_data_source};
use notion::transport::{ApiTransport, HttpTransport, RetryTransport};
use pipeline::Collections;
use retry::Backoff;
use summarize::Summarizer;

/// Data source to write to: the pinned one if configured, otherwise resolved by schema.
///
/// A pinned data source is still retrieved so that field mapping validates it.
async fn data_source_for<T: ApiTransport>(
    transport: &T,
    target: &CollectionTarget,
    required: &[&str],
) -> Result<DataSourceSchema, error::ResolveError> {
    match &target.pinned_data_source {
        Some(id) => {
            info!(database_id = %target.database_id, data_source_id = %id, "Using pinned data source");
            retrieve_data_source(transport, id).await
        }
        None => resolve_data_source(transport, &target.database_id, required).await,
    }
}

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = Instant::now();
    info!("notion_news_terms starting up");

    // --- Configuration ---
    let args = Cli::parse();
    let config = match Config::from_cli(&args) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };
    debug!(api = ?config.api, feeds = config.feeds.len(), max_items = config.max_items, "Configuration loaded");

    // --- Collection API ---
    let backoff = Backoff::collection_api();
    info!(
        max_attempts = backoff.max_attempts,
        worst_case_wait = ?backoff.worst_case_wait(),
        "Collection API retry policy"
    );
    let transport = RetryTransport::new(HttpTransport::new(&config.api)?, backoff);

    let article_required = config.article_fields.required();
    let news_schema = data_source_for(&transport, &config.news, &article_required)
        .await
        .inspect_err(|e| error!(database_id = %config.news.database_id, error = %e, "Article data source resolution failed"))?;
    info!(data_source_id = %news_schema.id, name = %news_schema.name, "Resolved article data source");

    let term_required = config.term_fields.required();
    let terms_schema = data_source_for(&transport, &config.terms, &term_required)
        .await
        .inspect_err(|e| error!(database_id = %config.terms.database_id, error = %e, "Term data source resolution failed"))?;
    info!(data_source_id = %terms_schema.id, name = %terms_schema.name, "Resolved term data source");

    let article_fields = ArticleFields::from_schema(&news_schema, &config.article_fields)?;
    let term_fields = TermFields::from_schema(&terms_schema, &config.term_fields)?;
    let collections = Collections::new(
        Repository::new(&transport, news_schema.id.clone()),
        article_fields,
        Repository::new(&transport, terms_schema.id.clone()),
        term_fields,
    );

    // --- Summarizer and classifier ---
    let summarizer = Summarizer::from_settings(config.llm.as_ref()).await?;
    let classifier = KeywordClassifier::new(&config.reclassify, &config.categories)?;

    // --- Feeds ---
    let items = feeds::fetch_all(&config).await?;
    let picked = feeds::pick_latest(items, config.max_items);
    info!(picked = picked.len(), "Picked newest items");

    // --- Process ---
    let summary = pipeline::run(&collections, &summarizer, &classifier, &picked).await;

    let duration = start_time.elapsed();
    info!(
        created = summary.created,
        skipped = summary.skipped,
        failed = summary.failed,
        elapsed_secs = duration.as_secs(),
        elapsed_ms = duration.as_millis() as u64,
        "notion_news_terms finished"
    );

    Ok(())
}
