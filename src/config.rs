// ⚙️ Registry Configuration - Policies as Data
// Everything a pipeline run can tune, loaded from one JSON file.
// Every field has a default, so `{}` is a valid config.

use crate::enrichment::{Enricher, KeywordRules};
use crate::matching::{FuzzyTieBreak, MatchEngine};
use crate::merge::{BiographyPolicy, MergeEngine};
use crate::normalize::{NameNormalizer, DEFAULT_HONORIFICS};
use crate::record::SourceType;
use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Title tokens stripped before names are compared
    pub honorifics: Vec<String>,

    /// Tokens this long or shorter are ignored by the partial-name tier
    pub min_token_len: usize,

    pub fuzzy_tie_break: FuzzyTieBreak,

    pub biography_policy: BiographyPolicy,

    /// Guess gender from biography pronouns when no source states it
    pub infer_gender: bool,

    /// Merge order of sources; unlisted sources go last
    pub source_priority: Vec<SourceType>,

    pub keywords: KeywordRules,
}

impl RegistryConfig {
    /// Load config from JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        serde_json::from_str(&content).context("Failed to parse config JSON")
    }

    pub fn normalizer(&self) -> NameNormalizer {
        NameNormalizer::with_honorifics(&self.honorifics)
    }

    pub fn match_engine(&self) -> MatchEngine {
        MatchEngine {
            min_token_len: self.min_token_len,
            tie_break: self.fuzzy_tie_break,
        }
    }

    pub fn merge_engine(&self) -> MergeEngine {
        MergeEngine {
            biography_policy: self.biography_policy.clone(),
            infer_gender: self.infer_gender,
        }
    }

    /// Compile the keyword tables (fails on an unusable keyword)
    pub fn enricher(&self) -> Result<Enricher> {
        Enricher::new(&self.keywords)
    }

    /// Position of a source in the merge order
    pub fn priority_rank(&self, source: &SourceType) -> usize {
        self.source_priority
            .iter()
            .position(|s| s == source)
            .unwrap_or(self.source_priority.len())
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            honorifics: DEFAULT_HONORIFICS.iter().map(|s| s.to_string()).collect(),
            min_token_len: 3,
            fuzzy_tie_break: FuzzyTieBreak::default(),
            biography_policy: BiographyPolicy::default(),
            infer_gender: true,
            source_priority: SourceType::default_priority(),
            keywords: KeywordRules::default(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
