// 🏷️ Keyword Enrichment - Rules as Data
// Leadership titles and committee memberships spotted in free text
//
// The keyword tables are plain configuration handed to `Enricher::new`.
// Nothing here is global: two pipelines can run with different tables.

use crate::merge::union_list;
use crate::record::{non_empty, RawRecord};
use anyhow::{Context as AnyhowContext, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Extension fields scanned alongside the biography
const ROLE_FIELDS: [&str; 2] = ["role", "position"];

// ============================================================================
// RULE DEFINITION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadershipRule {
    /// Phrase to look for (whole words, case-insensitive)
    pub keyword: String,

    /// Title to assign when the phrase is found
    pub title: String,

    /// Priority (higher = checked first)
    #[serde(default = "default_priority")]
    pub priority: i32,
}

fn default_priority() -> i32 {
    0
}

impl LeadershipRule {
    pub fn new(keyword: &str, title: &str, priority: i32) -> Self {
        LeadershipRule {
            keyword: keyword.to_string(),
            title: title.to_string(),
            priority,
        }
    }
}

/// Keyword tables for enrichment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRules {
    #[serde(default)]
    pub leadership: Vec<LeadershipRule>,

    /// Known committee names, matched as whole phrases
    #[serde(default)]
    pub committees: Vec<String>,
}

impl KeywordRules {
    /// Tables with no rules at all
    pub fn empty() -> Self {
        KeywordRules {
            leadership: Vec::new(),
            committees: Vec::new(),
        }
    }

    /// Load tables from JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read keyword rules file: {:?}", path.as_ref()))?;

        serde_json::from_str(&content).context("Failed to parse keyword rules JSON")
    }
}

impl Default for KeywordRules {
    fn default() -> Self {
        KeywordRules {
            leadership: vec![
                LeadershipRule::new("Deputy Speaker", "Deputy Speaker", 20),
                LeadershipRule::new("Speaker", "Speaker", 10),
                LeadershipRule::new("Leader of the Majority Party", "Leader of the Majority Party", 20),
                LeadershipRule::new("Majority Leader", "Leader of the Majority Party", 15),
                LeadershipRule::new("Leader of the Minority Party", "Leader of the Minority Party", 20),
                LeadershipRule::new("Minority Leader", "Leader of the Minority Party", 15),
                LeadershipRule::new("Deputy Majority Whip", "Deputy Majority Whip", 25),
                LeadershipRule::new("Majority Whip", "Majority Whip", 15),
                LeadershipRule::new("Deputy Minority Whip", "Deputy Minority Whip", 25),
                LeadershipRule::new("Minority Whip", "Minority Whip", 15),
            ],
            committees: [
                "Budget and Appropriations Committee",
                "Public Accounts Committee",
                "Public Investments Committee",
                "Liaison Committee",
                "House Business Committee",
                "Committee on Delegated Legislation",
                "Justice and Legal Affairs Committee",
                "Departmental Committee on Health",
                "Departmental Committee on Education",
                "Departmental Committee on Agriculture and Livestock",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

// ============================================================================
// ENRICHER
// ============================================================================

pub struct Enricher {
    leadership: Vec<(LeadershipRule, Regex)>,
    committees: Vec<(String, Regex)>,
}

impl Enricher {
    /// Compile the tables. Fails only on a keyword that cannot form a pattern.
    pub fn new(rules: &KeywordRules) -> Result<Self> {
        let mut leadership = Vec::with_capacity(rules.leadership.len());
        for rule in &rules.leadership {
            let pattern = phrase_pattern(&rule.keyword)
                .with_context(|| format!("Invalid leadership keyword: {:?}", rule.keyword))?;
            leadership.push((rule.clone(), pattern));
        }
        // Stable: equal priorities keep file order
        leadership.sort_by(|a, b| b.0.priority.cmp(&a.0.priority));

        let mut committees = Vec::with_capacity(rules.committees.len());
        for name in &rules.committees {
            let pattern = phrase_pattern(name)
                .with_context(|| format!("Invalid committee name: {:?}", name))?;
            committees.push((name.clone(), pattern));
        }

        Ok(Enricher {
            leadership,
            committees,
        })
    }

    /// Highest-priority leadership title mentioned in `text`
    pub fn detect_leadership(&self, text: &str) -> Option<&str> {
        self.leadership
            .iter()
            .find(|(_, pattern)| pattern.is_match(text))
            .map(|(rule, _)| rule.title.as_str())
    }

    /// Known committees mentioned in `text`, table order
    pub fn detect_committees(&self, text: &str) -> Vec<&str> {
        self.committees
            .iter()
            .filter(|(_, pattern)| pattern.is_match(text))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Fill leadership title and committees from the record's free text.
    /// Returns the number of values added.
    pub fn enrich(&self, record: &mut RawRecord) -> usize {
        let mut texts: Vec<String> = Vec::new();
        if let Some(bio) = non_empty(&record.biography) {
            texts.push(bio.to_string());
        }
        for field in ROLE_FIELDS {
            if let Some(value) = record.extra_str(field) {
                texts.push(value.to_string());
            }
        }
        if texts.is_empty() {
            return 0;
        }

        let mut added = 0;

        if non_empty(&record.leadership_title).is_none() {
            // Role fields are more specific than the biography
            let title = texts
                .iter()
                .rev()
                .find_map(|text| self.detect_leadership(text))
                .map(str::to_string);
            if let Some(title) = title {
                record.leadership_title = Some(title);
                added += 1;
            }
        }

        let found: Vec<String> = texts
            .iter()
            .flat_map(|text| self.detect_committees(text))
            .map(str::to_string)
            .collect();
        added += union_list(&mut record.committees, &found);

        added
    }

    pub fn rule_count(&self) -> usize {
        self.leadership.len() + self.committees.len()
    }
}

/// Case-insensitive, whole-word, whitespace-tolerant pattern for a phrase
fn phrase_pattern(phrase: &str) -> Result<Regex> {
    let words: Vec<String> = phrase.split_whitespace().map(regex::escape).collect();
    if words.is_empty() {
        anyhow::bail!("empty phrase");
    }
    let pattern = format!(r"(?i)\b{}\b", words.join(r"\s+"));
    Regex::new(&pattern).context("Failed to compile phrase pattern")
}

// ============================================================================
// TESTS
// ============================================================================
