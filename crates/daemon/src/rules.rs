//! Rule files
//!
//! Built-in rules are embedded at compile time; user rules come from
//! `<home>/rules.toml` and are placed ahead of them.

use config::{Config, File, FileFormat};
use regex::Regex;
use serde::Deserialize;
use snippet_run_core::domain::{DomainError, Matcher, Rule, RuleSet, TemplateGenerator};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

const DEFAULT_RULES: &str = include_str!("../assets/default_rules.toml");
const USER_RULES_EXAMPLE: &str = include_str!("../assets/user_rules.example.toml");
const DEFAULT_RULES_ORIGIN: &str = "<built-in rules>";

#[derive(Debug, Error)]
pub enum RuleConfigError {
    #[error("failed to read rules from {origin}: {source}")]
    Read {
        origin: String,
        #[source]
        source: config::ConfigError,
    },

    #[error("rule #{index} in {origin} is invalid: {source}")]
    InvalidRule {
        origin: String,
        index: usize,
        #[source]
        source: DomainError,
    },

    #[error("failed to seed {path}: {source}")]
    Seed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Contents of a rule file
#[derive(Debug, Default, Deserialize)]
pub struct RuleFile {
    #[serde(default)]
    pub rules: Vec<RuleEntry>,
}

/// One `[[rules]]` table
#[derive(Debug, Clone, Deserialize)]
pub struct RuleEntry {
    /// Shown in logs and `rules.list.v1`; defaults to the pattern
    pub label: Option<String>,
    /// Regex tested against the filename
    pub pattern: String,
    /// Regex the content must also match
    pub content_pattern: Option<String>,
    /// Command template
    pub run: String,
}

impl RuleEntry {
    pub fn into_rule(self) -> Result<Rule, DomainError> {
        let generator = TemplateGenerator::new(self.run)?;
        let matcher = match &self.content_pattern {
            None => Matcher::pattern(&self.pattern)?,
            Some(content_pattern) => {
                let filename = compile(&self.pattern)?;
                let content = compile(content_pattern)?;
                Matcher::predicate(move |snippet| {
                    filename.is_match(snippet.filename()) && content.is_match(snippet.content())
                })
            }
        };
        let label = self.label.unwrap_or(self.pattern);
        Ok(Rule::new(label, matcher, Arc::new(generator)))
    }
}

fn compile(pattern: &str) -> Result<Regex, DomainError> {
    Regex::new(pattern).map_err(|e| DomainError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

impl RuleFile {
    pub fn parse(text: &str, origin: &str) -> Result<Self, RuleConfigError> {
        Self::from_config(
            Config::builder().add_source(File::from_str(text, FileFormat::Toml)),
            origin,
        )
    }

    /// Missing file reads as an empty rule list
    pub fn read(path: &Path) -> Result<Self, RuleConfigError> {
        Self::from_config(
            Config::builder().add_source(
                File::from(path.to_path_buf())
                    .format(FileFormat::Toml)
                    .required(false),
            ),
            &path.display().to_string(),
        )
    }

    fn from_config(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
        origin: &str,
    ) -> Result<Self, RuleConfigError> {
        builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|source| RuleConfigError::Read {
                origin: origin.to_string(),
                source,
            })
    }

    /// Build rules in file order; errors name the 1-based rule index
    pub fn into_rules(self, origin: &str) -> Result<Vec<Rule>, RuleConfigError> {
        self.rules
            .into_iter()
            .enumerate()
            .map(|(i, entry)| {
                entry
                    .into_rule()
                    .map_err(|source| RuleConfigError::InvalidRule {
                        origin: origin.to_string(),
                        index: i + 1,
                        source,
                    })
            })
            .collect()
    }
}

/// Built-in rules
pub fn default_rules() -> Result<Vec<Rule>, RuleConfigError> {
    RuleFile::parse(DEFAULT_RULES, DEFAULT_RULES_ORIGIN)?.into_rules(DEFAULT_RULES_ORIGIN)
}

/// Write the commented example to `path` unless a rule file already exists
///
/// Returns true when the file was created.
pub fn seed_user_rules(path: &Path) -> Result<bool, RuleConfigError> {
    if path.exists() {
        return Ok(false);
    }
    std::fs::write(path, USER_RULES_EXAMPLE).map_err(|source| RuleConfigError::Seed {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), "Created user rule file");
    Ok(true)
}

/// User rules from `path` followed by the built-in rules
pub fn load_rule_set(path: &Path) -> Result<RuleSet, RuleConfigError> {
    let origin = path.display().to_string();
    let user = RuleFile::read(path)?.into_rules(&origin)?;
    let defaults = default_rules()?;

    info!(
        user_rules = user.len(),
        default_rules = defaults.len(),
        "Loaded rules"
    );
    let rules = RuleSet::merged(user, defaults);
    for (index, rule) in rules.iter().enumerate() {
        debug!(index, rule = ?rule, "Rule");
    }
    Ok(rules)
}
