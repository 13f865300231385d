//! Per-run orchestration.
//!
//! For every picked feed item, strictly in order:
//!
//! ```text
//! NEW ─ url already stored ─▶ SKIPPED
//!  │
//!  ▼
//! SUMMARIZED ─▶ ARTICLE_CREATED ─▶ per term: TERM_RESOLVED ─▶ RELATION_MERGED ─▶ DONE
//! ```
//!
//! A failure at any step aborts that item only; it is logged with the item
//! link and counted in [`RunSummary::failed`]. Nothing is rolled back, so an
//! article may exist without all of its term links after a failure.

use crate::classify::Classify;
use crate::error::{ItemError, RepoError};
use crate::models::{ArticleDraft, ArticleInput, FeedItem};
use crate::notion::fields::{ArticleFields, TermFields};
use crate::notion::properties::PropertyValue;
use crate::notion::repository::{MergeOutcome, Repository};
use crate::notion::transport::ApiTransport;
use crate::summarize::Summarize;
use itertools::Itertools;
use tracing::{error, info, instrument};

/// What happened to one term of an article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermOutcome {
    Created { term_id: String },
    Linked { term_id: String },
    AlreadyLinked { term_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// An article with the same URL already exists.
    Skipped { existing_id: String },
    Created {
        article_id: String,
        terms: Vec<(String, TermOutcome)>,
    },
}

/// Counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub picked: usize,
    pub created: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// The article and term data sources with their mapped fields.
#[derive(Debug)]
pub struct Collections<'a, T> {
    articles: Repository<'a, T>,
    article_fields: ArticleFields,
    terms: Repository<'a, T>,
    term_fields: TermFields,
}

impl<'a, T: ApiTransport> Collections<'a, T> {
    /// Pair each repository with the fields mapped from its schema.
    ///
    /// # Arguments
    ///
    /// * `articles` / `article_fields` - Article data source and its bound fields
    /// * `terms` / `term_fields` - Glossary data source and its bound fields
    pub fn new(
        articles: Repository<'a, T>,
        article_fields: ArticleFields,
        terms: Repository<'a, T>,
        term_fields: TermFields,
    ) -> Self {
        Self {
            articles,
            article_fields,
            terms,
            term_fields,
        }
    }

    /// Id of the article stored under `url`, if any. The URL is the dedup key.
    pub async fn find_article_by_url(&self, url: &str) -> Result<Option<String>, RepoError> {
        self.articles
            .find_by_exact_text(&self.article_fields.url, url)
            .await
    }

    /// Create the article record; each value is encoded for its field's kind.
    #[instrument(level = "debug", skip_all, fields(data_source_id = %self.articles.data_source_id(), url = %draft.url))]
    pub async fn create_article(&self, draft: &ArticleDraft) -> Result<String, RepoError> {
        let f = &self.article_fields;
        let values = [
            (&f.published, PropertyValue::date_for(&f.published, draft.published)?),
            (&f.title, PropertyValue::text_for(&f.title, &draft.title)?),
            (&f.author, PropertyValue::text_for(&f.author, &draft.author)?),
            (&f.category, PropertyValue::text_for(&f.category, &draft.category)?),
            (&f.summary, PropertyValue::text_for(&f.summary, &draft.summary)?),
            (&f.url, PropertyValue::text_for(&f.url, &draft.url)?),
            (&f.terms, PropertyValue::list_for(&f.terms, &draft.terms)?),
        ];
        self.articles.create_record(&values).await
    }

    /// Find the term by exact title; create it linked to `article_id`, or
    /// merge `article_id` into its related articles.
    ///
    /// The meaning is written empty on creation and never touched afterwards.
    #[instrument(level = "debug", skip(self), fields(data_source_id = %self.terms.data_source_id()))]
    pub async fn upsert_term_and_link(
        &self,
        term: &str,
        article_id: &str,
    ) -> Result<TermOutcome, RepoError> {
        let f = &self.term_fields;
        match self.terms.find_by_exact_text(&f.term, term).await? {
            None => {
                let values = [
                    (&f.term, PropertyValue::text_for(&f.term, term)?),
                    (&f.meaning, PropertyValue::text_for(&f.meaning, "")?),
                    (
                        &f.articles,
                        PropertyValue::relation_for(&f.articles, vec![article_id.to_string()])?,
                    ),
                ];
                let term_id = self.terms.create_record(&values).await?;
                Ok(TermOutcome::Created { term_id })
            }
            Some(term_id) => match self.terms.merge_relation(&term_id, &f.articles, article_id).await? {
                MergeOutcome::AlreadyLinked => Ok(TermOutcome::AlreadyLinked { term_id }),
                MergeOutcome::Linked { .. } => Ok(TermOutcome::Linked { term_id }),
            },
        }
    }
}

/// Run one item through dedup, summary, article creation and term linking.
#[instrument(level = "info", skip_all, fields(link = %item.link))]
pub async fn process_item<T, S, C>(
    collections: &Collections<'_, T>,
    summarizer: &S,
    classifier: &C,
    item: &FeedItem,
) -> Result<ItemOutcome, ItemError>
where
    T: ApiTransport,
    S: Summarize,
    C: Classify,
{
    if let Some(existing_id) = collections.find_article_by_url(&item.link).await? {
        info!(%existing_id, "Article exists; skipping");
        return Ok(ItemOutcome::Skipped { existing_id });
    }

    let digest = summarizer.summarize(ArticleInput::from(item)).await?;
    let category = classifier.classify(item, &digest.summary);
    let draft = ArticleDraft::new(item, category, &digest);

    let article_id = collections.create_article(&draft).await?;
    info!(%article_id, title = %draft.title, category = %draft.category, "Article created");

    let mut terms = Vec::with_capacity(draft.terms.len());
    for term in draft.terms.iter().map(|t| t.trim()).filter(|t| !t.is_empty()).unique() {
        let outcome = collections.upsert_term_and_link(term, &article_id).await?;
        match &outcome {
            TermOutcome::Created { term_id } => info!(term, %term_id, "Term created"),
            TermOutcome::Linked { term_id } => info!(term, %term_id, "Term linked"),
            TermOutcome::AlreadyLinked { term_id } => info!(term, %term_id, "Term already linked"),
        }
        terms.push((term.to_string(), outcome));
    }

    Ok(ItemOutcome::Created { article_id, terms })
}

/// Process `items` sequentially; item failures are counted, never propagated.
#[instrument(level = "info", skip_all, fields(items = items.len()))]
pub async fn run<T, S, C>(
    collections: &Collections<'_, T>,
    summarizer: &S,
    classifier: &C,
    items: &[FeedItem],
) -> RunSummary
where
    T: ApiTransport,
    S: Summarize,
    C: Classify,
{
    let mut summary = RunSummary {
        picked: items.len(),
        ..RunSummary::default()
    };

    for (index, item) in items.iter().enumerate() {
        match process_item(collections, summarizer, classifier, item).await {
            Ok(ItemOutcome::Skipped { .. }) => summary.skipped += 1,
            Ok(ItemOutcome::Created { .. }) => summary.created += 1,
            Err(e) => {
                summary.failed += 1;
                error!(index, link = %item.link, error = %e, "Item failed; continuing");
            }
        }
    }

    info!(
        picked = summary.picked,
        created = summary.created,
        skipped = summary.skipped,
        failed = summary.failed,
        "Run complete"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::KeywordClassifier;
    use crate::config::{ArticleFieldNames, ReclassifyRule, TermFieldNames};
    use crate::error::SummarizeError;
    use crate::feeds::pick_latest;
    use crate::models::Digest;
    use crate::notion::schema::resolve_data_source;
    use crate::notion::test_support::FakeNotion;
    use chrono::{DateTime, TimeZone, Utc};

    /// Terms taken from the title: the first two words.
    struct TitleWords;

    impl Summarize for TitleWords {
        async fn summarize(&self, article: ArticleInput<'_>) -> Result<Digest, SummarizeError> {
            if article.title.contains("LLM down") {
                return Err(SummarizeError::Backend("connection refused".into()));
            }
            let mut words = article.title.split_whitespace().map(String::from);
            Ok(Digest {
                summary: format!("{} 요약", article.title),
                terms: [
                    words.next().unwrap_or_default(),
                    words.next().unwrap_or_default(),
                ],
            })
        }
    }

    fn fake_notion() -> FakeNotion {
        let fake = FakeNotion::new();
        fake.add_data_source(
            "news-db",
            "news",
            "뉴스",
            &[
                ("게시일", "date"),
                ("제목", "title"),
                ("작성자", "rich_text"),
                ("카테고리", "select"),
                ("요약", "rich_text"),
                ("url", "url"),
                ("용어", "rich_text"),
            ],
        );
        // A second data source under the same database that lacks the url field.
        fake.add_data_source("news-db", "news-archive", "보관", &[("제목", "title")]);
        fake.add_data_source(
            "terms-db",
            "terms",
            "용어집",
            &[("용어", "title"), ("의미", "rich_text"), ("관련 기사", "relation")],
        );
        fake
    }

    async fn collections(fake: &FakeNotion) -> Collections<'_, FakeNotion> {
        let article_names = ArticleFieldNames::default();
        let term_names = TermFieldNames::default();
        let news = resolve_data_source(fake, "news-db", &article_names.required())
            .await
            .unwrap();
        let terms = resolve_data_source(fake, "terms-db", &term_names.required())
            .await
            .unwrap();
        Collections::new(
            Repository::new(fake, news.id.clone()),
            ArticleFields::from_schema(&news, &article_names).unwrap(),
            Repository::new(fake, terms.id.clone()),
            TermFields::from_schema(&terms, &term_names).unwrap(),
        )
    }

    fn classifier() -> KeywordClassifier {
        KeywordClassifier::new(
            &[ReclassifyRule {
                pattern: r"\bCJ\b".into(),
                category: "cj".into(),
            }],
            &["경제", "국제", "ai", "cj"].map(String::from),
        )
        .unwrap()
    }

    fn at(hour: u32) -> Option<DateTime<Utc>> {
        Some(Utc.with_ymd_and_hms(2025, 9, 3, hour, 0, 0).unwrap())
    }

    fn item(title: &str, n: u32, category: &str, published: Option<DateTime<Utc>>) -> FeedItem {
        FeedItem {
            title: title.into(),
            link: format!("https://www.hankyung.com/article/{n}"),
            published,
            author: "기자".into(),
            category: category.into(),
            description: String::new(),
        }
    }

    fn feed() -> Vec<FeedItem> {
        vec![
            item("반도체 금리 전망", 1, "경제", at(9)),
            item("금리 환율 급등", 2, "국제", at(11)),
            item("금리 환율 급등", 2, "국제", at(11)),
            item("CJ 반도체 투자", 3, "ai", at(10)),
            item("오래된 소식", 4, "경제", at(1)),
        ]
    }

    #[tokio::test]
    async fn end_to_end_creates_newest_articles_and_links_terms() {
        let fake = fake_notion();
        let collections = collections(&fake).await;
        let picked = pick_latest(feed(), 3);

        let summary = run(&collections, &TitleWords, &classifier(), &picked).await;
        assert_eq!(
            summary,
            RunSummary {
                picked: 3,
                created: 3,
                skipped: 0,
                failed: 0
            }
        );

        let articles = fake.pages_in("news");
        let urls: Vec<String> = articles.iter().map(|p| p.text("url")).collect();
        assert_eq!(
            urls,
            vec![
                "https://www.hankyung.com/article/2",
                "https://www.hankyung.com/article/3",
                "https://www.hankyung.com/article/1",
            ]
        );
        assert_eq!(articles[0].text("게시일"), "2025-09-03");
        assert_eq!(articles[0].text("용어"), "금리, 환율");
        assert_eq!(articles[1].text("카테고리"), "cj");
        assert_eq!(articles[2].text("카테고리"), "경제");

        let terms = fake.pages_in("terms");
        let names: Vec<String> = terms.iter().map(|p| p.text("title")).collect();
        assert_eq!(names, vec!["금리", "환율", "CJ", "반도체"]);

        let related = |name: &str| {
            terms
                .iter()
                .find(|p| p.text("title") == name)
                .map(|p| p.relation("관련 기사"))
                .unwrap()
        };
        assert_eq!(related("금리"), vec![articles[0].id.clone(), articles[2].id.clone()]);
        assert_eq!(related("반도체"), vec![articles[1].id.clone(), articles[2].id.clone()]);
        assert_eq!(related("환율"), vec![articles[0].id.clone()]);
        assert!(terms.iter().all(|p| p.text("의미").is_empty()));
    }

    #[tokio::test]
    async fn second_run_skips_everything() {
        let fake = fake_notion();
        let collections = collections(&fake).await;
        let picked = pick_latest(feed(), 3);

        run(&collections, &TitleWords, &classifier(), &picked).await;
        let pages_after_first = fake.pages_in("news").len() + fake.pages_in("terms").len();

        let summary = run(&collections, &TitleWords, &classifier(), &picked).await;
        assert_eq!(summary.skipped, 3);
        assert_eq!(summary.created, 0);
        assert_eq!(
            fake.pages_in("news").len() + fake.pages_in("terms").len(),
            pages_after_first
        );
    }

    #[tokio::test]
    async fn failures_are_isolated_per_item() {
        let fake = fake_notion();
        fake.reject_creates_containing("거부");
        let collections = collections(&fake).await;
        let items = vec![
            item("거부 대상 기사", 1, "경제", at(3)),
            item("LLM down 기사", 2, "경제", at(2)),
            item("정상 기사", 3, "경제", at(1)),
        ];

        let summary = run(&collections, &TitleWords, &classifier(), &items).await;
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.created, 1);
        let urls: Vec<String> = fake.pages_in("news").iter().map(|p| p.text("url")).collect();
        assert_eq!(urls, vec!["https://www.hankyung.com/article/3"]);
    }

    #[tokio::test]
    async fn term_upsert_reports_each_transition() {
        let fake = fake_notion();
        let collections = collections(&fake).await;

        let first = collections.upsert_term_and_link("금리", "article-a").await.unwrap();
        let TermOutcome::Created { term_id } = first else {
            panic!("expected a new term, got {first:?}");
        };
        assert_eq!(
            collections.upsert_term_and_link("금리", "article-b").await.unwrap(),
            TermOutcome::Linked {
                term_id: term_id.clone()
            }
        );
        assert_eq!(
            collections.upsert_term_and_link("금리", "article-a").await.unwrap(),
            TermOutcome::AlreadyLinked { term_id }
        );
        assert_eq!(fake.pages_in("terms").len(), 1);
    }

    #[tokio::test]
    async fn duplicate_terms_are_upserted_once() {
        let fake = fake_notion();
        let collections = collections(&fake).await;
        let outcome = process_item(
            &collections,
            &TitleWords,
            &classifier(),
            &item("금리 금리", 7, "경제", at(1)),
        )
        .await
        .unwrap();

        let ItemOutcome::Created { terms, .. } = outcome else {
            panic!("expected a created article");
        };
        assert_eq!(terms.len(), 1);
        assert_eq!(fake.pages_in("terms").len(), 1);
    }
}
