//! Name matching strategies
//!
//! Family-transfer recipients and loan providers are recognised from free
//! text. The aggregation code only sees [`NameMatcher`]; which strategy backs
//! it is a configuration choice.

use strsim::jaro_winkler;

use crate::config::{AggregatorConfig, MatchStrategy, NamedAliases};

/// Resolves free text to one of a fixed set of canonical names
pub trait NameMatcher: Send + Sync {
    /// Canonical name found in `text`, if any
    fn find(&self, text: &str) -> Option<&str>;
}

/// Build the configured matcher over a set of names
pub fn matcher_for(
    config: &AggregatorConfig,
    names: &[NamedAliases],
) -> Box<dyn NameMatcher> {
    match config.match_strategy {
        MatchStrategy::Exact => Box::new(ExactMatcher::new(names)),
        MatchStrategy::Keyword => Box::new(KeywordMatcher::new(names)),
        MatchStrategy::Fuzzy => Box::new(FuzzyMatcher::new(names, config.fuzzy_threshold)),
    }
}

/// Canonical name with pre-lowered spellings
#[derive(Debug, Clone)]
struct Entry {
    name: String,
    spellings: Vec<String>,
}

fn entries(names: &[NamedAliases]) -> Vec<Entry> {
    names
        .iter()
        .map(|n| Entry {
            name: n.name.clone(),
            spellings: n.spellings().collect(),
        })
        .collect()
}

/// Matches only when the whole (trimmed) text equals a spelling
#[derive(Debug, Clone)]
pub struct ExactMatcher {
    entries: Vec<Entry>,
}

impl ExactMatcher {
    pub fn new(names: &[NamedAliases]) -> Self {
        Self {
            entries: entries(names),
        }
    }
}

impl NameMatcher for ExactMatcher {
    fn find(&self, text: &str) -> Option<&str> {
        let text = text.trim().to_lowercase();
        self.entries
            .iter()
            .find(|e| e.spellings.iter().any(|s| *s == text))
            .map(|e| e.name.as_str())
    }
}

/// Matches when a spelling appears anywhere in the text
///
/// Longer spellings are tried first so "mamma" wins over "mam" when both map
/// to different names.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    /// (spelling, index into names) ordered longest first
    spellings: Vec<(String, usize)>,
    names: Vec<String>,
}

impl KeywordMatcher {
    pub fn new(names: &[NamedAliases]) -> Self {
        let entries = entries(names);
        let mut spellings: Vec<(String, usize)> = entries
            .iter()
            .enumerate()
            .flat_map(|(idx, e)| e.spellings.iter().map(move |s| (s.clone(), idx)))
            .collect();
        spellings.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.cmp(b)));

        Self {
            spellings,
            names: entries.into_iter().map(|e| e.name).collect(),
        }
    }
}

impl NameMatcher for KeywordMatcher {
    fn find(&self, text: &str) -> Option<&str> {
        let text = text.to_lowercase();
        self.spellings
            .iter()
            .find(|(spelling, _)| text.contains(spelling.as_str()))
            .map(|(_, idx)| self.names[*idx].as_str())
    }
}

/// Matches when any word of the text is similar enough to a spelling
#[derive(Debug, Clone)]
pub struct FuzzyMatcher {
    entries: Vec<Entry>,
    threshold: f64,
}

impl FuzzyMatcher {
    pub fn new(names: &[NamedAliases], threshold: f64) -> Self {
        Self {
            entries: entries(names),
            threshold,
        }
    }
}

impl NameMatcher for FuzzyMatcher {
    fn find(&self, text: &str) -> Option<&str> {
        let text = text.to_lowercase();
        let words: Vec<&str> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        // Best score across all names; ties keep the earlier configured name
        let mut best: Option<(f64, &str)> = None;
        for entry in &self.entries {
            for spelling in &entry.spellings {
                for word in &words {
                    let score = jaro_winkler(word, spelling);
                    if score >= self.threshold && best.map_or(true, |(b, _)| score > b) {
                        best = Some((score, entry.name.as_str()));
                    }
                }
            }
        }
        best.map(|(_, name)| name)
    }
}

/// Upper-case, strip `*`/`#`, keep the first three words
pub fn normalize_name(description: &str) -> String {
    description
        .to_uppercase()
        .replace(['*', '#'], " ")
        .split_whitespace()
        .take(3)
        .collect::<Vec<_>>()
        .join(" ")
}
