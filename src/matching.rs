// 🔍 Match Engine - Does this record describe someone we already know?
// Three tiers, precision first: Exact Name → Region → Partial Name
//
// The first tier that produces a match wins; later tiers are never consulted.
// Merging two different people costs more than leaving a duplicate, so the
// cheap high-confidence checks run before the fuzzy one.

use crate::normalize::{discriminative_tokens, normalize_region};
use crate::record::{non_empty, RawRecord};
use crate::store::{MemberIndex, MemberStore};
use serde::{Deserialize, Serialize};

// ============================================================================
// MATCH TIER
// ============================================================================

/// Confidence tier, strongest first: ExactName > Region > PartialName > None
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    /// Normalized names are identical
    ExactName,

    /// Same constituency (sub-region) label
    Region,

    /// At least half of the candidate's long name tokens overlap
    PartialName,

    /// Nothing matched
    None,
}

impl MatchTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchTier::ExactName => "exact_name",
            MatchTier::Region => "region",
            MatchTier::PartialName => "partial_name",
            MatchTier::None => "none",
        }
    }
}

/// How to pick among several members that clear the partial-name threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuzzyTieBreak {
    /// Most overlapping tokens; equal scores go to the earlier member
    #[default]
    HighestScore,

    /// First member (insertion order) that clears the threshold
    FirstEncountered,
}

// ============================================================================
// MATCH RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// Store position of the matched member
    pub index: Option<MemberIndex>,

    /// Which tier produced the match
    pub tier: MatchTier,

    /// Overlapping tokens (partial tier only)
    pub score: usize,

    /// More than one member could have matched at this tier
    pub ambiguous: bool,
}

impl MatchResult {
    pub fn none() -> Self {
        MatchResult {
            index: None,
            tier: MatchTier::None,
            score: 0,
            ambiguous: false,
        }
    }

    pub fn is_match(&self) -> bool {
        self.index.is_some()
    }
}

// ============================================================================
// MATCH ENGINE
// ============================================================================

pub struct MatchEngine {
    /// Tokens of this many characters or fewer are ignored by the partial tier (default: 3)
    pub min_token_len: usize,

    /// Tie-break among partial-name candidates (default: highest score)
    pub tie_break: FuzzyTieBreak,
}

impl MatchEngine {
    /// Create engine with default settings
    pub fn new() -> Self {
        MatchEngine {
            min_token_len: 3,
            tie_break: FuzzyTieBreak::HighestScore,
        }
    }

    pub fn with_tie_break(mut self, tie_break: FuzzyTieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// Run the cascade for one candidate. Pure query: the store is not touched.
    pub fn find_match(&self, candidate: &RawRecord, store: &MemberStore) -> MatchResult {
        let key = store.normalizer().normalize(&candidate.name);

        // Empty key: unmatchable, callers should not get here
        if key.is_empty() {
            return MatchResult::none();
        }

        if let Some(m) = self.check_exact_name(&key, store) {
            return m;
        }

        if let Some(m) = self.check_region(candidate, store) {
            return m;
        }

        if let Some(m) = self.check_partial_name(&key, store) {
            return m;
        }

        MatchResult::none()
    }

    /// Tier 1: Exact Name
    /// Normalized keys are equal → O(1) index lookup
    fn check_exact_name(&self, key: &str, store: &MemberStore) -> Option<MatchResult> {
        let index = store.index_of_name(key)?;

        Some(MatchResult {
            index: Some(index),
            tier: MatchTier::ExactName,
            score: 0,
            ambiguous: false,
        })
    }

    /// Tier 2: Region
    /// Same constituency → first registered member for that constituency
    fn check_region(&self, candidate: &RawRecord, store: &MemberStore) -> Option<MatchResult> {
        let region = non_empty(&candidate.constituency)?;
        let key = normalize_region(region);
        let index = store.index_of_region(&key)?;

        Some(MatchResult {
            index: Some(index),
            tier: MatchTier::Region,
            score: 0,
            ambiguous: store.region_count(&key) > 1,
        })
    }

    /// Tier 3: Partial Name
    /// Long candidate tokens that are a substring or superstring of some token
    /// of the member; needs at least ceil(tokens / 2) of them.
    fn check_partial_name(&self, key: &str, store: &MemberStore) -> Option<MatchResult> {
        let candidate_tokens = discriminative_tokens(key, self.min_token_len);

        // No discriminative tokens → a zero threshold would match everyone
        if candidate_tokens.is_empty() {
            return None;
        }

        let threshold = candidate_tokens.len().div_ceil(2);

        let mut best: Option<(MemberIndex, usize)> = None;
        let mut qualifying = 0;

        for (index, member) in store.all().enumerate() {
            let member_tokens = discriminative_tokens(member.normalized_name(), self.min_token_len);
            let score = overlap_score(&candidate_tokens, &member_tokens);

            if score < threshold {
                continue;
            }
            qualifying += 1;

            match self.tie_break {
                FuzzyTieBreak::FirstEncountered => {
                    if best.is_none() {
                        best = Some((index, score));
                    }
                }
                FuzzyTieBreak::HighestScore => {
                    if best.map_or(true, |(_, best_score)| score > best_score) {
                        best = Some((index, score));
                    }
                }
            }
        }

        let (index, score) = best?;

        Some(MatchResult {
            index: Some(index),
            tier: MatchTier::PartialName,
            score,
            ambiguous: qualifying > 1,
        })
    }
}

impl Default for MatchEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Count candidate tokens that contain, or are contained in, any member token
pub fn overlap_score(candidate_tokens: &[&str], member_tokens: &[&str]) -> usize {
    candidate_tokens
        .iter()
        .filter(|c| {
            member_tokens
                .iter()
                .any(|t| t.contains(**c) || c.contains(*t))
        })
        .count()
}

// ============================================================================
// TESTS
// ============================================================================
