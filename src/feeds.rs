//! RSS ingestion.
//!
//! Each configured feed is downloaded, parsed and cleaned into [`FeedItem`]s
//! filed under the feed's category. A feed that fails to download or parse
//! is logged and skipped; the others still contribute. [`pick_latest`] then
//! chooses the newest unique links for the run.

use crate::config::{Config, FeedSource};
use crate::models::FeedItem;
use crate::utils::{compact, strip_html};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use reqwest::Client;
use serde::Deserialize;
use std::error::Error;
use tracing::{error, info, instrument, warn};
use url::Url;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; notion_news_terms)";
const TITLE_LIMIT: usize = 300;
const AUTHOR_LIMIT: usize = 100;
const DESCRIPTION_LIMIT: usize = 1200;

#[derive(Debug, Deserialize)]
struct RssDocument {
    channel: RssChannel,
}

#[derive(Debug, Deserialize)]
struct RssChannel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    author: Option<String>,
    #[serde(rename = "dc:creator", alias = "creator")]
    creator: Option<String>,
}

/// RFC 2822 `pubDate`, normalized to UTC.
pub fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn is_web_url(link: &str) -> bool {
    Url::parse(link)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Parse an RSS 2.0 document into cleaned items of `category`.
///
/// Items without a title or an absolute http(s) link are dropped.
pub fn parse_rss(xml: &str, category: &str) -> Result<Vec<FeedItem>, quick_xml::DeError> {
    let document: RssDocument = quick_xml::de::from_str(xml.trim_start_matches('\u{FEFF}').trim())?;

    let items = document
        .channel
        .items
        .into_iter()
        .filter_map(|item| {
            let title = compact(item.title.as_deref().unwrap_or_default(), TITLE_LIMIT);
            let link = item.link.as_deref().unwrap_or_default().trim().to_string();
            if title.is_empty() || link.is_empty() || !is_web_url(&link) {
                return None;
            }
            let author = item
                .author
                .filter(|a| !a.trim().is_empty())
                .or(item.creator)
                .unwrap_or_default();
            Some(FeedItem {
                title,
                link,
                published: item.pub_date.as_deref().and_then(parse_pub_date),
                author: compact(&author, AUTHOR_LIMIT),
                category: category.to_string(),
                description: compact(
                    &strip_html(item.description.as_deref().unwrap_or_default()),
                    DESCRIPTION_LIMIT,
                ),
            })
        })
        .collect();
    Ok(items)
}

async fn fetch_feed(client: &Client, feed: &FeedSource) -> Result<Vec<FeedItem>, Box<dyn Error>> {
    let xml = client
        .get(&feed.url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    Ok(parse_rss(&xml, &feed.category)?)
}

/// Download every feed whose category is allowed and collect their items.
#[instrument(level = "info", skip_all, fields(feeds = config.feeds.len()))]
pub async fn fetch_all(config: &Config) -> Result<Vec<FeedItem>, Box<dyn Error>> {
    let client = Client::builder()
        .user_agent(USER_AGENT)
        .timeout(config.timeout)
        .build()?;

    let feeds: Vec<&FeedSource> = config
        .feeds
        .iter()
        .filter(|feed| {
            let allowed = config.is_allowed_category(&feed.category);
            if !allowed {
                warn!(category = %feed.category, url = %feed.url, "Skip feed (category not allowed)");
            }
            allowed
        })
        .collect();

    let items: Vec<FeedItem> = stream::iter(feeds)
        .then(|feed| {
            let client = &client;
            async move {
                match fetch_feed(client, feed).await {
                    Ok(items) => {
                        info!(url = %feed.url, category = %feed.category, count = items.len(), "Fetched feed");
                        items
                    }
                    Err(e) => {
                        error!(url = %feed.url, error = %e, "Feed fetch failed; skipping");
                        Vec::new()
                    }
                }
            }
        })
        .concat()
        .await;

    info!(count = items.len(), "Collected feed items");
    Ok(items)
}

/// Newest `n` items with distinct links, newest first.
///
/// Items without a publication time sort as if published now.
pub fn pick_latest(items: Vec<FeedItem>, n: usize) -> Vec<FeedItem> {
    let now = Utc::now();
    items
        .into_iter()
        .sorted_by(|a, b| b.published.unwrap_or(now).cmp(&a.published.unwrap_or(now)))
        .unique_by(|item| item.link.clone())
        .take(n)
        .collect()
}
