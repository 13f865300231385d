//! Command-line interface definitions.
//!
//! Every option can also come from the environment, which is how the job is
//! configured under cron or CI. Values are validated into an immutable
//! [`crate::config::Config`] before anything touches the network.

use crate::config::{
    DEFAULT_NEWS_DATABASE_ID, DEFAULT_TERMS_DATABASE_ID, NOTION_API_BASE, NOTION_VERSION,
};
use clap::Parser;

/// Command-line arguments.
///
/// # Examples
///
/// ```sh
/// # Heuristic summaries, default databases
/// NOTION_TOKEN=secret notion_news_terms
///
/// # LLM summaries through an awful_aj config, pinned article data source
/// notion_news_terms --llm-config ~/.config/aj/config.yaml \
///     --news-data-source-id 2ff62df4-8421-80f1-a1b2-000000000000
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Notion integration token
    #[arg(long, env = "NOTION_TOKEN", hide_env_values = true)]
    pub notion_token: Option<String>,

    /// Database holding news articles
    #[arg(long, env = "NEWS_DATABASE_ID", default_value = DEFAULT_NEWS_DATABASE_ID)]
    pub news_database_id: String,

    /// Database holding glossary terms
    #[arg(long, env = "TERMS_DATABASE_ID", default_value = DEFAULT_TERMS_DATABASE_ID)]
    pub terms_database_id: String,

    /// Use this article data source instead of resolving one by schema
    #[arg(long, env = "NEWS_DATA_SOURCE_ID")]
    pub news_data_source_id: Option<String>,

    /// Use this term data source instead of resolving one by schema
    #[arg(long, env = "TERMS_DATA_SOURCE_ID")]
    pub terms_data_source_id: Option<String>,

    /// Optional YAML file with feeds, categories, field names and reclassification rules
    #[arg(short, long, env = "NEWS_TERMS_CONFIG")]
    pub config: Option<String>,

    /// awful_aj config.yaml enabling LLM summaries (heuristic summaries otherwise)
    #[arg(long, env = "AJ_CONFIG")]
    pub llm_config: Option<String>,

    /// awful_aj chat template used for summaries
    #[arg(long, default_value = "news_terms")]
    pub llm_template: String,

    /// Number of newest articles to process per run
    #[arg(long, default_value_t = 3)]
    pub max_items: usize,

    /// Notion API base URL
    #[arg(long, env = "NOTION_API_BASE", default_value = NOTION_API_BASE)]
    pub api_base: String,

    /// Notion-Version header
    #[arg(long, default_value = NOTION_VERSION)]
    pub notion_version: String,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,
}
