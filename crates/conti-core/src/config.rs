//! Aggregator configuration
//!
//! ## Configuration Resolution
//!
//! Config is loaded with a two-layer resolution:
//! 1. Check for override in data dir (~/.local/share/conti/config/aggregator.toml)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! Keys missing from an override keep their default values.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/aggregator.toml");

/// Which name-matching strategy resolves recipients and lenders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    /// Whole-field equality against an alias
    Exact,
    /// Alias appears anywhere in the text
    Keyword,
    /// Jaro-Winkler similarity between a word and an alias
    Fuzzy,
}

impl MatchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Keyword => "keyword",
            Self::Fuzzy => "fuzzy",
        }
    }
}

impl std::str::FromStr for MatchStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "keyword" => Ok(Self::Keyword),
            "fuzzy" => Ok(Self::Fuzzy),
            _ => Err(format!("Unknown match strategy: {}", s)),
        }
    }
}

/// A canonical name and the spellings that refer to it
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NamedAliases {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl NamedAliases {
    pub fn new(name: &str, aliases: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Aliases plus the canonical name itself, lower-cased
    pub fn spellings(&self) -> impl Iterator<Item = String> + '_ {
        std::iter::once(self.name.to_lowercase())
            .chain(self.aliases.iter().map(|a| a.to_lowercase()))
            .filter(|s| !s.trim().is_empty())
    }
}

/// Aggregator configuration
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Months covered by bill and budget forecasts, starting with the reference month
    pub forecast_horizon_months: u32,
    /// Billing cycle assumed when a bill has no period dates
    pub default_bill_frequency_months: u32,
    /// Months without a charge after which a loan/subscription is inactive
    pub fixed_active_grace_months: u32,
    pub match_strategy: MatchStrategy,
    pub fuzzy_threshold: f64,
    /// Family members that transfers go to
    pub recipients: Vec<NamedAliases>,
    pub loan_keywords: Vec<String>,
    pub loan_providers: Vec<NamedAliases>,
    pub subscription_keywords: Vec<String>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            forecast_horizon_months: 12,
            default_bill_frequency_months: 2,
            fixed_active_grace_months: 2,
            match_strategy: MatchStrategy::Keyword,
            fuzzy_threshold: 0.88,
            recipients: Vec::new(),
            loan_keywords: Vec::new(),
            loan_providers: Vec::new(),
            subscription_keywords: Vec::new(),
        }
    }
}

impl AggregatorConfig {
    /// Load from the default override location, else the embedded defaults
    pub fn load() -> Result<Self> {
        load_config(None)
    }

    /// Load from an explicit override path (embedded defaults if it does not exist)
    pub fn load_from(path: &Path) -> Result<Self> {
        load_config(Some(path))
    }

    /// The embedded defaults
    pub fn embedded() -> Result<Self> {
        parse_config(DEFAULT_CONFIG)
    }

    /// Parse TOML content on top of the embedded defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        parse_config(content)
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("conti").join("config").join("aggregator.toml"))
}

/// Load configuration (override first, then default)
fn load_config(override_path: Option<&Path>) -> Result<AggregatorConfig> {
    let path = override_path
        .map(Path::to_path_buf)
        .or_else(default_config_path);

    let content = match path {
        Some(path) if path.exists() => {
            debug!("Loading aggregator config from {}", path.display());
            fs::read_to_string(&path)?
        }
        _ => DEFAULT_CONFIG.to_string(),
    };

    parse_config(&content)
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    defaults: Option<RawDefaults>,
    matching: Option<RawMatching>,
    recipients: Option<Vec<NamedAliases>>,
    loans: Option<RawLoans>,
    subscriptions: Option<RawSubscriptions>,
}

#[derive(Debug, Deserialize)]
struct RawDefaults {
    forecast_horizon_months: Option<u32>,
    default_bill_frequency_months: Option<u32>,
    fixed_active_grace_months: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawMatching {
    strategy: Option<String>,
    fuzzy_threshold: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawLoans {
    keywords: Option<Vec<String>>,
    providers: Option<Vec<NamedAliases>>,
}

#[derive(Debug, Deserialize)]
struct RawSubscriptions {
    keywords: Option<Vec<String>>,
}

/// Parse config from TOML content, layered over the embedded defaults
fn parse_config(content: &str) -> Result<AggregatorConfig> {
    let mut config = if content == DEFAULT_CONFIG {
        AggregatorConfig::default()
    } else {
        parse_config(DEFAULT_CONFIG)?
    };
    apply_raw(&mut config, content)?;
    Ok(config)
}

fn apply_raw(config: &mut AggregatorConfig, content: &str) -> Result<()> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    if let Some(defaults) = raw.defaults {
        if let Some(horizon) = defaults.forecast_horizon_months {
            if horizon == 0 {
                return Err(Error::Config(
                    "forecast_horizon_months must be at least 1".to_string(),
                ));
            }
            config.forecast_horizon_months = horizon;
        }
        if let Some(frequency) = defaults.default_bill_frequency_months {
            if frequency == 0 {
                return Err(Error::Config(
                    "default_bill_frequency_months must be at least 1".to_string(),
                ));
            }
            config.default_bill_frequency_months = frequency;
        }
        if let Some(grace) = defaults.fixed_active_grace_months {
            config.fixed_active_grace_months = grace;
        }
    }

    if let Some(matching) = raw.matching {
        if let Some(strategy) = matching.strategy {
            config.match_strategy = strategy.parse().map_err(Error::Config)?;
        }
        if let Some(threshold) = matching.fuzzy_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(Error::Config(format!(
                    "fuzzy_threshold must be between 0 and 1, got {}",
                    threshold
                )));
            }
            config.fuzzy_threshold = threshold;
        }
    }

    if let Some(recipients) = raw.recipients {
        config.recipients = recipients;
    }

    if let Some(loans) = raw.loans {
        if let Some(keywords) = loans.keywords {
            config.loan_keywords = keywords;
        }
        if let Some(providers) = loans.providers {
            config.loan_providers = providers;
        }
    }

    if let Some(subscriptions) = raw.subscriptions {
        if let Some(keywords) = subscriptions.keywords {
            config.subscription_keywords = keywords;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_default_config() {
        let config = AggregatorConfig::embedded().unwrap();
        assert_eq!(config.forecast_horizon_months, 12);
        assert_eq!(config.default_bill_frequency_months, 2);
        assert_eq!(config.match_strategy, MatchStrategy::Keyword);
        assert!(config.recipients.iter().any(|r| r.name == "Mamma"));
        assert!(config.loan_keywords.iter().any(|k| k == "rata"));
        assert!(config.subscription_keywords.iter().any(|k| k == "netflix"));
    }

    #[test]
    fn test_override_keeps_unset_defaults() {
        let config = AggregatorConfig::from_toml(
            r#"
            [defaults]
            forecast_horizon_months = 6

            [matching]
            strategy = "fuzzy"
            "#,
        )
        .unwrap();

        assert_eq!(config.forecast_horizon_months, 6);
        assert_eq!(config.default_bill_frequency_months, 2);
        assert_eq!(config.match_strategy, MatchStrategy::Fuzzy);
        // Lists not mentioned in the override come from the embedded file
        assert!(!config.recipients.is_empty());
    }

    #[test]
    fn test_override_replaces_recipients() {
        let config = AggregatorConfig::from_toml(
            r#"
            [[recipients]]
            name = "Nonna"
            aliases = ["nonna"]
            "#,
        )
        .unwrap();

        assert_eq!(config.recipients, vec![NamedAliases::new("Nonna", &["nonna"])]);
    }

    #[test]
    fn test_rejects_unknown_strategy() {
        let err = AggregatorConfig::from_toml("[matching]\nstrategy = \"telepathy\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rejects_zero_horizon() {
        let err =
            AggregatorConfig::from_toml("[defaults]\nforecast_horizon_months = 0").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rejects_invalid_toml() {
        assert!(AggregatorConfig::from_toml("[defaults").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[defaults]\ndefault_bill_frequency_months = 1").unwrap();

        let config = AggregatorConfig::load_from(file.path()).unwrap();
        assert_eq!(config.default_bill_frequency_months, 1);
    }

    #[test]
    fn test_load_from_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AggregatorConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.forecast_horizon_months, 12);
    }

    #[test]
    fn test_spellings_include_name() {
        let alias = NamedAliases::new("Moglie", &["wife", " "]);
        let spellings: Vec<_> = alias.spellings().collect();
        assert_eq!(spellings, vec!["moglie", "wife"]);
    }
}
