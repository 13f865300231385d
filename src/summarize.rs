//! Article summaries and key terms.
//!
//! Two backends share the [`Summarize`] contract: an LLM reached through
//! `awful_aj`, and a local heuristic used when no LLM is configured. Both
//! go through [`normalize`], so callers always get a bounded summary and
//! exactly two non-empty terms.

use crate::api::ask_with_backoff;
use crate::config::LlmSettings;
use crate::error::SummarizeError;
use crate::models::{ArticleInput, Digest};
use crate::utils::{compact, looks_truncated, truncate_for_log};
use awful_aj::{config::AwfulJadeConfig, template::ChatTemplate};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::error::Error;
use tracing::{debug, info, instrument, warn};

const SUMMARY_LIMIT: usize = 600;
const FALLBACK_SUMMARY_LIMIT: usize = 300;
const TERM_LIMIT: usize = 60;
/// Filler used when fewer than two terms could be extracted.
pub const PLACEHOLDER_TERM: &str = "핵심용어";

static TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z가-힣0-9·\-]{2,}").expect("static regex"));

pub trait Summarize {
    async fn summarize(&self, article: ArticleInput<'_>) -> Result<Digest, SummarizeError>;
}

fn fallback_summary(article: &ArticleInput<'_>) -> String {
    let snippet = compact(article.snippet, FALLBACK_SUMMARY_LIMIT);
    if snippet.is_empty() {
        compact(article.title, FALLBACK_SUMMARY_LIMIT)
    } else {
        snippet
    }
}

/// Bound the summary, clean and dedupe the terms, pad to exactly two.
pub fn normalize<I, S>(article: &ArticleInput<'_>, summary: &str, terms: I) -> Digest
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut summary = compact(summary, SUMMARY_LIMIT);
    if summary.is_empty() {
        summary = fallback_summary(article);
    }

    let mut terms = terms
        .into_iter()
        .map(|t| compact(t.as_ref(), TERM_LIMIT))
        .filter(|t| !t.is_empty())
        .unique();
    let mut next_term = || terms.next().unwrap_or_else(|| PLACEHOLDER_TERM.to_string());
    let first = next_term();
    let second = next_term();

    Digest {
        summary,
        terms: [first, second],
    }
}

/// Deterministic summarizer that needs no network.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicSummarizer;

impl HeuristicSummarizer {
    pub fn digest(&self, article: ArticleInput<'_>) -> Digest {
        let haystack = format!("{} {}", article.title, article.snippet);
        let tokens = TOKEN.find_iter(&haystack).map(|m| m.as_str());
        normalize(&article, &fallback_summary(&article), tokens)
    }
}

impl Summarize for HeuristicSummarizer {
    async fn summarize(&self, article: ArticleInput<'_>) -> Result<Digest, SummarizeError> {
        Ok(self.digest(article))
    }
}

#[derive(Debug, Deserialize)]
struct LlmReply {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    terms: Vec<String>,
}

/// Strip a Markdown code fence some models wrap JSON in.
fn unfence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.trim_start_matches("json");
    body.strip_suffix("```").unwrap_or(body).trim()
}

fn parse_reply(reply: &str) -> Result<LlmReply, serde_json::Error> {
    serde_json::from_str(unfence(reply))
}

/// Prompt sent as the user message; the chat template carries the system prompt.
pub fn build_prompt(article: &ArticleInput<'_>) -> String {
    format!(
        "다음은 한국경제 RSS 기사 정보다.\n\n\
         - 카테고리: {category}\n\
         - 제목: {title}\n\
         - URL: {url}\n\
         - RSS 요약/설명(참고): {snippet}\n\n\
         요구사항:\n\
         1) 기사 내용을 2~3문장 한국어로 요약한다. 불확실한 내용은 \"~로 전해졌다\"처럼 표현한다.\n\
         2) 핵심 용어 2개를 뽑는다. 사람 이름만 2개는 금지, 경제/국제/뉴스 같은 일반어 금지.\n\n\
         아래 JSON 형식으로만 답해라:\n\
         {{\"summary\": \"요약\", \"terms\": [\"용어1\", \"용어2\"]}}",
        category = article.category,
        title = article.title,
        url = article.url,
        snippet = article.snippet,
    )
}

/// LLM-backed summarizer.
#[derive(Debug)]
pub struct AjSummarizer {
    config: AwfulJadeConfig,
    template: ChatTemplate,
}

impl AjSummarizer {
    /// Load the `awful_aj` config file and chat template.
    pub async fn load(settings: &LlmSettings) -> Result<Self, Box<dyn Error>> {
        let config = awful_aj::config::load_config(&settings.config_path)?;
        info!(config_path = %settings.config_path, "Loaded LLM configuration");
        let template = awful_aj::template::load_template(&settings.template).await?;
        info!(template = %settings.template, "Loaded LLM template");
        Ok(Self { config, template })
    }
}

impl Summarize for AjSummarizer {
    #[instrument(level = "info", skip_all, fields(url = %article.url))]
    async fn summarize(&self, article: ArticleInput<'_>) -> Result<Digest, SummarizeError> {
        let prompt = build_prompt(&article);
        let mut reply = ask_with_backoff(&self.config, &prompt, &self.template).await?;
        let mut parsed = parse_reply(&reply);

        // A reply cut off by the token limit gets one more chance.
        if let Err(e) = &parsed {
            if looks_truncated(e) {
                warn!(error = %e, "EOF while parsing; re-asking once");
                reply = ask_with_backoff(&self.config, &prompt, &self.template).await?;
                parsed = parse_reply(&reply);
            }
        }

        match parsed {
            Ok(out) => {
                debug!(terms = ?out.terms, "LLM reply parsed");
                Ok(normalize(&article, &out.summary, &out.terms))
            }
            Err(e) => {
                warn!(
                    error = %e,
                    response_preview = %truncate_for_log(&reply, 300),
                    "Model returned non-conforming JSON"
                );
                Err(SummarizeError::InvalidResponse(e.to_string()))
            }
        }
    }
}

/// Backend chosen at startup.
#[derive(Debug)]
pub enum Summarizer {
    Llm(Box<AjSummarizer>),
    Heuristic(HeuristicSummarizer),
}

impl Summarizer {
    /// LLM when settings are present, heuristic otherwise.
    pub async fn from_settings(settings: Option<&LlmSettings>) -> Result<Self, Box<dyn Error>> {
        match settings {
            Some(settings) => Ok(Self::Llm(Box::new(AjSummarizer::load(settings).await?))),
            None => {
                info!("No LLM configured; using heuristic summaries");
                Ok(Self::Heuristic(HeuristicSummarizer))
            }
        }
    }
}

impl Summarize for Summarizer {
    async fn summarize(&self, article: ArticleInput<'_>) -> Result<Digest, SummarizeError> {
        match self {
            Self::Llm(llm) => llm.summarize(article).await,
            Self::Heuristic(heuristic) => heuristic.summarize(article).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input<'a>(title: &'a str, snippet: &'a str) -> ArticleInput<'a> {
        ArticleInput {
            title,
            url: "https://www.hankyung.com/article/1",
            snippet,
            category: "경제",
        }
    }

    #[test]
    fn heuristic_takes_first_two_distinct_tokens() {
        let digest = HeuristicSummarizer.digest(input(
            "반도체 반도체 수출 증가",
            "삼성전자 실적 발표",
        ));
        assert_eq!(digest.terms, ["반도체".to_string(), "수출".to_string()]);
        assert_eq!(digest.summary, "삼성전자 실적 발표");
    }

    #[test]
    fn heuristic_falls_back_to_title_and_placeholder() {
        let digest = HeuristicSummarizer.digest(input("금리", ""));
        assert_eq!(digest.summary, "금리");
        assert_eq!(digest.terms, ["금리".to_string(), PLACEHOLDER_TERM.to_string()]);

        let digest = HeuristicSummarizer.digest(input("!", "?"));
        assert_eq!(
            digest.terms,
            [PLACEHOLDER_TERM.to_string(), PLACEHOLDER_TERM.to_string()]
        );
    }

    #[test]
    fn heuristic_summary_is_bounded() {
        let long = "가".repeat(400);
        let digest = HeuristicSummarizer.digest(input("제목", &long));
        assert_eq!(digest.summary.chars().count(), 301);
        assert!(digest.summary.ends_with('…'));
    }

    #[test]
    fn normalize_cleans_llm_output() {
        let article = input("제목", "설명");
        let long_term = "용".repeat(80);
        let digest = normalize(
            &article,
            "  두 문장\n요약.  ",
            ["  ", "ESG", "ESG", long_term.as_str(), "extra"],
        );
        assert_eq!(digest.summary, "두 문장 요약.");
        assert_eq!(digest.terms[0], "ESG");
        assert_eq!(digest.terms[1].chars().count(), 61);

        let digest = normalize(&article, "", Vec::<String>::new());
        assert_eq!(digest.summary, "설명");
        assert_eq!(
            digest.terms,
            [PLACEHOLDER_TERM.to_string(), PLACEHOLDER_TERM.to_string()]
        );
    }

    #[test]
    fn parses_plain_and_fenced_replies() {
        let plain = parse_reply(r#"{"summary": "요약", "terms": ["a", "b"]}"#).unwrap();
        assert_eq!(plain.terms, vec!["a", "b"]);

        let fenced = parse_reply("```json\n{\"summary\": \"요약\", \"terms\": []}\n```").unwrap();
        assert_eq!(fenced.summary, "요약");

        let err = parse_reply(r#"{"summary": "잘린"#).unwrap_err();
        assert!(looks_truncated(&err));
    }

    #[test]
    fn prompt_carries_article_fields() {
        let prompt = build_prompt(&input("환율 급등", "원달러"));
        assert!(prompt.contains("제목: 환율 급등"));
        assert!(prompt.contains("카테고리: 경제"));
        assert!(prompt.contains("\"terms\""));
    }

    #[tokio::test]
    async fn summarizer_enum_dispatches_to_heuristic() {
        let summarizer = Summarizer::from_settings(None).await.unwrap();
        let digest = summarizer.summarize(input("인공지능 규제", "")).await.unwrap();
        assert_eq!(digest.terms[0], "인공지능");
    }
}
