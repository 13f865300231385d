//! Category classification.
//!
//! Articles start in the category of the feed they came from. A
//! [`Classify`] step may move them to another allowed category; the
//! default [`KeywordClassifier`] does that with ordered regex rules.

use crate::config::ReclassifyRule;
use crate::models::FeedItem;
use regex::Regex;
use tracing::debug;

pub trait Classify {
    /// Final category for `item` given its summary.
    fn classify(&self, item: &FeedItem, summary: &str) -> String;
}

/// First matching rule whose category is allowed wins; otherwise the feed category.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    rules: Vec<(Regex, String)>,
}

impl KeywordClassifier {
    /// Compile `rules`, dropping those whose category is not in `allowed`.
    pub fn new(rules: &[ReclassifyRule], allowed: &[String]) -> Result<Self, regex::Error> {
        let rules = rules
            .iter()
            .filter(|rule| allowed.iter().any(|c| c == &rule.category))
            .map(|rule| Ok((Regex::new(&rule.pattern)?, rule.category.clone())))
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self { rules })
    }
}

impl Classify for KeywordClassifier {
    fn classify(&self, item: &FeedItem, summary: &str) -> String {
        let hit = self.rules.iter().find(|(pattern, _)| {
            [item.title.as_str(), summary, item.link.as_str()]
                .iter()
                .any(|text| pattern.is_match(text))
        });
        match hit {
            Some((pattern, category)) => {
                debug!(link = %item.link, %pattern, from = %item.category, to = %category, "Reclassified");
                category.clone()
            }
            None => item.category.clone(),
        }
    }
}
