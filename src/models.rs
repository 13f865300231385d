//! Data models shared by the feed reader, the summarizers and the pipeline.
//!
//! - [`FeedItem`]: one cleaned RSS entry, already filed under a category
//! - [`Digest`]: summary plus exactly two key terms for an article
//! - [`ArticleDraft`]: everything written to the article data source

use chrono::{DateTime, NaiveDate, Utc};

/// A news item as read from a feed, with text already cleaned and bounded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    /// Canonical article URL; the de-duplication key in the article data source.
    pub link: String,
    pub published: Option<DateTime<Utc>>,
    pub author: String,
    /// Category of the feed the item came from.
    pub category: String,
    /// Plain-text description (HTML stripped).
    pub description: String,
}

impl FeedItem {
    /// Publication date for the date property; items without one are dated today (UTC).
    pub fn publish_date(&self) -> NaiveDate {
        self.published
            .unwrap_or_else(Utc::now)
            .date_naive()
    }
}

/// Summary and key terms produced for one article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    pub summary: String,
    pub terms: [String; 2],
}

/// Input handed to a summarizer.
#[derive(Debug, Clone, Copy)]
pub struct ArticleInput<'a> {
    pub title: &'a str,
    pub url: &'a str,
    pub snippet: &'a str,
    pub category: &'a str,
}

impl<'a> From<&'a FeedItem> for ArticleInput<'a> {
    fn from(item: &'a FeedItem) -> Self {
        Self {
            title: &item.title,
            url: &item.link,
            snippet: &item.description,
            category: &item.category,
        }
    }
}

/// Values of a new article record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleDraft {
    pub published: NaiveDate,
    pub title: String,
    pub author: String,
    pub category: String,
    pub summary: String,
    pub url: String,
    pub terms: Vec<String>,
}

impl ArticleDraft {
    pub fn new(item: &FeedItem, category: String, digest: &Digest) -> Self {
        Self {
            published: item.publish_date(),
            title: item.title.clone(),
            author: item.author.clone(),
            category,
            summary: digest.summary.clone(),
            url: item.link.clone(),
            terms: digest.terms.to_vec(),
        }
    }
}
