//! Immutable run configuration.
//!
//! Built once in `main` from the [`Cli`] plus an optional YAML file, then
//! passed by reference to every component. Nothing here is read from the
//! environment after startup.
//!
//! # YAML file
//!
//! All sections are optional; omitted ones keep the defaults below.
//!
//! ```yaml
//! feeds:
//!   - { category: 경제, url: https://www.hankyung.com/feed/economy }
//! categories: [경제, 국제, ai, cj]
//! article_fields: { title: 제목, url: url }
//! term_fields: { articles: 관련 기사 }
//! reclassify:
//!   - { pattern: '\bCJ\b', category: cj }
//! ```

use crate::cli::Cli;
use crate::error::ConfigError;
use crate::notion::transport::ApiSettings;
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

pub const NOTION_API_BASE: &str = "https://api.notion.com/v1";
pub const NOTION_VERSION: &str = "2025-09-03";
pub const DEFAULT_NEWS_DATABASE_ID: &str = "2ff62df4842180b6944df052819a8872";
pub const DEFAULT_TERMS_DATABASE_ID: &str = "2ff62df48421808ea7cbdbd4935f5b6b";

/// One RSS feed and the category its articles are filed under.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedSource {
    pub category: String,
    pub url: String,
}

impl FeedSource {
    fn new(category: &str, url: &str) -> Self {
        Self {
            category: category.to_string(),
            url: url.to_string(),
        }
    }
}

fn default_feeds() -> Vec<FeedSource> {
    vec![
        FeedSource::new("경제", "https://www.hankyung.com/feed/economy"),
        FeedSource::new("국제", "https://www.hankyung.com/feed/international"),
        // IT/science is filed under the "ai" option of the category select
        FeedSource::new("ai", "https://www.hankyung.com/feed/it"),
    ]
}

fn default_categories() -> Vec<String> {
    ["경제", "국제", "ai", "cj"].map(String::from).to_vec()
}

/// Property names of the article data source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ArticleFieldNames {
    pub published: String,
    pub title: String,
    pub author: String,
    pub category: String,
    pub summary: String,
    pub url: String,
    pub terms: String,
}

impl Default for ArticleFieldNames {
    fn default() -> Self {
        Self {
            published: "게시일".into(),
            title: "제목".into(),
            author: "작성자".into(),
            category: "카테고리".into(),
            summary: "요약".into(),
            url: "url".into(),
            terms: "용어".into(),
        }
    }
}

impl ArticleFieldNames {
    pub fn required(&self) -> Vec<&str> {
        vec![
            self.published.as_str(),
            self.title.as_str(),
            self.author.as_str(),
            self.category.as_str(),
            self.summary.as_str(),
            self.url.as_str(),
            self.terms.as_str(),
        ]
    }
}

/// Property names of the glossary data source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TermFieldNames {
    pub term: String,
    pub meaning: String,
    pub articles: String,
}

impl Default for TermFieldNames {
    fn default() -> Self {
        Self {
            term: "용어".into(),
            meaning: "의미".into(),
            articles: "관련 기사".into(),
        }
    }
}

impl TermFieldNames {
    pub fn required(&self) -> Vec<&str> {
        vec![
            self.term.as_str(),
            self.meaning.as_str(),
            self.articles.as_str(),
        ]
    }
}

/// Overrides the feed category when `pattern` matches title, summary or URL.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReclassifyRule {
    pub pattern: String,
    pub category: String,
}

fn default_reclassify() -> Vec<ReclassifyRule> {
    vec![ReclassifyRule {
        pattern: r"\bCJ\b".into(),
        category: "cj".into(),
    }]
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct FileConfig {
    feeds: Vec<FeedSource>,
    categories: Vec<String>,
    article_fields: ArticleFieldNames,
    term_fields: TermFieldNames,
    reclassify: Vec<ReclassifyRule>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            feeds: default_feeds(),
            categories: default_categories(),
            article_fields: ArticleFieldNames::default(),
            term_fields: TermFieldNames::default(),
            reclassify: default_reclassify(),
        }
    }
}

/// A parent database and, optionally, the data source to use without resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionTarget {
    pub database_id: String,
    pub pinned_data_source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmSettings {
    pub config_path: String,
    pub template: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiSettings,
    pub news: CollectionTarget,
    pub terms: CollectionTarget,
    pub feeds: Vec<FeedSource>,
    pub categories: Vec<String>,
    pub article_fields: ArticleFieldNames,
    pub term_fields: TermFieldNames,
    pub reclassify: Vec<ReclassifyRule>,
    pub llm: Option<LlmSettings>,
    pub max_items: usize,
    pub timeout: Duration,
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

impl Config {
    /// Validate the CLI (and the YAML file it points to) into a `Config`.
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| ConfigError::File {
                    path: path.clone(),
                    message: e.to_string(),
                })?;
                Self::parse_file(&text).map_err(|e| ConfigError::File {
                    path: path.clone(),
                    message: e.to_string(),
                })?
            }
            None => FileConfig::default(),
        };
        Self::from_parts(cli, file)
    }

    fn parse_file(text: &str) -> Result<FileConfig, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(FileConfig::default());
        }
        serde_yaml::from_str(text)
    }

    fn from_parts(cli: &Cli, file: FileConfig) -> Result<Self, ConfigError> {
        let token = non_empty(cli.notion_token.as_deref()).ok_or(ConfigError::Missing("NOTION_TOKEN"))?;
        let news_db = non_empty(Some(cli.news_database_id.as_str()))
            .ok_or(ConfigError::Missing("NEWS_DATABASE_ID"))?;
        let terms_db = non_empty(Some(cli.terms_database_id.as_str()))
            .ok_or(ConfigError::Missing("TERMS_DATABASE_ID"))?;

        if cli.max_items == 0 {
            return Err(ConfigError::invalid("max-items", "must be at least 1"));
        }
        if file.feeds.is_empty() {
            return Err(ConfigError::invalid("feeds", "at least one feed is required"));
        }
        for feed in &file.feeds {
            let parsed = Url::parse(&feed.url)
                .map_err(|e| ConfigError::invalid("feeds", format!("{}: {e}", feed.url)))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ConfigError::invalid("feeds", format!("{} is not http(s)", feed.url)));
            }
        }
        for rule in &file.reclassify {
            Regex::new(&rule.pattern)
                .map_err(|e| ConfigError::invalid("reclassify", format!("{}: {e}", rule.pattern)))?;
        }
        Url::parse(&cli.api_base).map_err(|e| ConfigError::invalid("api-base", e.to_string()))?;

        let timeout = Duration::from_secs(cli.timeout_secs.max(1));
        Ok(Self {
            api: ApiSettings {
                base_url: cli.api_base.clone(),
                token,
                version: cli.notion_version.clone(),
                timeout,
            },
            news: CollectionTarget {
                database_id: news_db,
                pinned_data_source: non_empty(cli.news_data_source_id.as_deref()),
            },
            terms: CollectionTarget {
                database_id: terms_db,
                pinned_data_source: non_empty(cli.terms_data_source_id.as_deref()),
            },
            feeds: file.feeds,
            categories: file.categories,
            article_fields: file.article_fields,
            term_fields: file.term_fields,
            reclassify: file.reclassify,
            llm: non_empty(cli.llm_config.as_deref()).map(|config_path| LlmSettings {
                config_path,
                template: cli.llm_template.clone(),
            }),
            max_items: cli.max_items,
            timeout,
        })
    }

    pub fn is_allowed_category(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c == category)
    }
}
