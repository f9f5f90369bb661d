// 🔄 Reconciler - The serialized match → merge → store loop
//
// One Reconciler per pipeline run. Records must be fed in arrival order per
// source; `ingest_all` additionally orders a batch by source priority so
// "first non-empty wins" gives the same result on every run.
//
// Not thread-safe by design of the core: wrap it in a single Mutex if several
// extractors feed it.

use crate::config::RegistryConfig;
use crate::enrichment::Enricher;
use crate::entities::Member;
use crate::matching::{MatchEngine, MatchTier};
use crate::merge::{FieldConflict, MergeEngine, MergeOutcome};
use crate::record::{RawRecord, SourceType};
use crate::store::{MemberIndex, MemberStore};
use anyhow::Result;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

// ============================================================================
// OUTCOMES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Name normalized to the empty string
    Unmatchable,

    /// Identical record already ingested this run
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Skipped(SkipReason),
    Created {
        index: MemberIndex,
    },
    Merged {
        index: MemberIndex,
        tier: MatchTier,
        outcome: MergeOutcome,
    },
}

impl IngestOutcome {
    pub fn index(&self) -> Option<MemberIndex> {
        match self {
            IngestOutcome::Skipped(_) => None,
            IngestOutcome::Created { index } => Some(*index),
            IngestOutcome::Merged { index, .. } => Some(*index),
        }
    }
}

/// One journal line per accepted record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeDecision {
    pub fingerprint: String,
    pub source: SourceType,
    pub member_id: String,

    /// `None` means the record created a new member
    pub tier: MatchTier,
    pub score: usize,
    pub conflicts: Vec<FieldConflict>,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// STATISTICS
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestStats {
    pub seen: usize,
    pub skipped_unmatchable: usize,
    pub duplicates: usize,
    pub created: usize,
    pub exact_name: usize,
    pub region: usize,
    pub partial_name: usize,
    pub ambiguous_region: usize,
    pub conflicts: usize,
    pub genders_inferred: usize,
    pub enriched: usize,
}

impl IngestStats {
    pub fn merged(&self) -> usize {
        self.exact_name + self.region + self.partial_name
    }

    /// Operator-facing report, one line per concern
    pub fn summary(&self) -> String {
        [
            format!(
                "{} records seen, {} members created, {} merged",
                self.seen,
                self.created,
                self.merged()
            ),
            format!(
                "{} exact-name, {} region, {} fuzzy-matched",
                self.exact_name, self.region, self.partial_name
            ),
            format!(
                "{} records unmatched, {} duplicates skipped",
                self.skipped_unmatchable, self.duplicates
            ),
            format!(
                "{} ambiguous region hits, {} field conflicts, {} genders inferred",
                self.ambiguous_region, self.conflicts, self.genders_inferred
            ),
        ]
        .join("\n")
    }

    fn count_tier(&mut self, tier: MatchTier) {
        match tier {
            MatchTier::ExactName => self.exact_name += 1,
            MatchTier::Region => self.region += 1,
            MatchTier::PartialName => self.partial_name += 1,
            MatchTier::None => {}
        }
    }
}

// ============================================================================
// RECONCILER
// ============================================================================

pub struct Reconciler {
    config: RegistryConfig,
    store: MemberStore,
    matcher: MatchEngine,
    merger: MergeEngine,
    enricher: Enricher,
    fingerprints: HashSet<String>,
    stats: IngestStats,
    journal: Vec<MergeDecision>,
}

impl Reconciler {
    /// Fresh run with an empty store
    pub fn new(config: RegistryConfig) -> Result<Self> {
        Self::resume(config, Vec::new())
    }

    /// Continue from a checkpoint: members are re-inserted in snapshot order
    pub fn resume(config: RegistryConfig, members: Vec<Member>) -> Result<Self> {
        let enricher = config.enricher()?;
        let store = MemberStore::from_members(config.normalizer(), members);
        if !store.is_empty() {
            info!("Resuming with {} members", store.len());
        }

        Ok(Reconciler {
            matcher: config.match_engine(),
            merger: config.merge_engine(),
            enricher,
            store,
            config,
            fingerprints: HashSet::new(),
            stats: IngestStats::default(),
            journal: Vec::new(),
        })
    }

    /// Match one record against the store and merge or create
    pub fn ingest(&mut self, mut record: RawRecord) -> IngestOutcome {
        self.stats.seen += 1;

        if self.store.normalizer().normalize(&record.name).is_empty() {
            self.stats.skipped_unmatchable += 1;
            debug!("Skipping unmatchable record {:?} from {}", record.name, record.source_id);
            return IngestOutcome::Skipped(SkipReason::Unmatchable);
        }

        let fingerprint = fingerprint(&record);
        if !self.fingerprints.insert(fingerprint.clone()) {
            self.stats.duplicates += 1;
            debug!("Skipping duplicate record {:?} from {}", record.name, record.source_id);
            return IngestOutcome::Skipped(SkipReason::Duplicate);
        }

        self.stats.enriched += self.enricher.enrich(&mut record);

        let result = self.matcher.find_match(&record, &self.store);

        if result.ambiguous && result.tier == MatchTier::Region {
            self.stats.ambiguous_region += 1;
            warn!(
                "Ambiguous region {:?}: {} members share it, merging {:?} into the first",
                record.constituency.as_deref().unwrap_or_default(),
                self.store
                    .region_count(record.constituency.as_deref().unwrap_or_default()),
                record.name
            );
        }

        let (index, outcome) = match result.index {
            Some(index) => {
                let merger = &self.merger;
                let outcome = self
                    .store
                    .update(index, |member| merger.merge_into(member, &record))
                    .unwrap_or_default();
                self.stats.count_tier(result.tier);
                if result.tier == MatchTier::PartialName {
                    warn!(
                        "Fuzzy match accepted: {:?} → {:?} ({} shared tokens)",
                        record.name,
                        self.store.get(index).map(|m| m.name()).unwrap_or_default(),
                        result.score
                    );
                }
                (index, outcome)
            }
            None => {
                let (member, outcome) = self.merger.create(&record, self.store.normalizer());
                let index = self.store.insert(member);
                self.stats.created += 1;
                (index, outcome)
            }
        };

        for conflict in &outcome.conflicts {
            warn!(
                "Conflict on {}: kept {:?}, discarded {:?} from {}",
                conflict.field, conflict.kept, conflict.discarded, conflict.source
            );
        }
        self.stats.conflicts += outcome.conflicts.len();
        if outcome.gender_inferred {
            self.stats.genders_inferred += 1;
        }

        let member_id = self
            .store
            .get(index)
            .map(|m| m.id.clone())
            .unwrap_or_default();
        debug!(
            "{} from {} → member {} ({})",
            record.name,
            record.source_id,
            member_id,
            result.tier.as_str()
        );

        self.journal.push(MergeDecision {
            fingerprint,
            source: record.source_id.clone(),
            member_id,
            tier: result.tier,
            score: result.score,
            conflicts: outcome.conflicts.clone(),
            timestamp: Utc::now(),
        });

        match result.index {
            Some(_) => IngestOutcome::Merged {
                index,
                tier: result.tier,
                outcome,
            },
            None => IngestOutcome::Created { index },
        }
    }

    /// Ingest a batch in source-priority order (stable within a source)
    pub fn ingest_all(&mut self, mut records: Vec<RawRecord>) -> Vec<IngestOutcome> {
        records.sort_by_key(|r| self.config.priority_rank(&r.source_id));

        let total = records.len();
        let outcomes: Vec<IngestOutcome> = records.into_iter().map(|r| self.ingest(r)).collect();

        info!("Ingested {} records, store now holds {} members", total, self.store.len());
        outcomes
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    pub fn store(&self) -> &MemberStore {
        &self.store
    }

    pub fn into_store(self) -> MemberStore {
        self.store
    }

    /// Drain the decisions recorded since the last call
    pub fn take_journal(&mut self) -> Vec<MergeDecision> {
        std::mem::take(&mut self.journal)
    }
}

/// SHA-256 over the record's canonical JSON (extras are key-sorted)
pub fn fingerprint(record: &RawRecord) -> String {
    let canonical = serde_json::to_string(record).unwrap_or_else(|_| format!("{:?}", record));

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Gender;

    fn reconciler() -> Reconciler {
        Reconciler::new(RegistryConfig::default()).unwrap()
    }

    #[test]
    fn test_exact_name_scenario() {
        let mut r = reconciler();
        let first = r.ingest(RawRecord::new("HON. JOHN MWANGI", SourceType::Parliament));
        let second = r.ingest(
            RawRecord::new("Dr. John Mwangi", SourceType::Wikipedia)
                .with_constituency("Dagoretti North"),
        );

        assert_eq!(first, IngestOutcome::Created { index: 0 });
        match second {
            IngestOutcome::Merged { index, tier, .. } => {
                assert_eq!(index, 0);
                assert_eq!(tier, MatchTier::ExactName);
            }
            other => panic!("expected merge, got {:?}", other),
        }

        let member = r.store().get(0).unwrap();
        assert_eq!(member.constituency.as_deref(), Some("Dagoretti North"));
        assert!(member.has_source(&SourceType::Parliament));
        assert!(member.has_source(&SourceType::Wikipedia));
        assert_eq!(r.store().len(), 1);
        // Constituency learned through the merge is now indexed
        assert_eq!(r.store().index_of_region("dagoretti north"), Some(0));
    }

    #[test]
    fn test_region_scenario() {
        let mut r = reconciler();
        r.ingest(RawRecord::new("M. Wanjiru", SourceType::Parliament).with_constituency("Starehe"));
        let outcome = r.ingest(
            RawRecord::new("Mary Wanjiru", SourceType::Scorecard).with_constituency("Starehe"),
        );

        assert!(matches!(
            outcome,
            IngestOutcome::Merged { index: 0, tier: MatchTier::Region, .. }
        ));
        assert_eq!(r.store().len(), 1);
        assert_eq!(r.stats().region, 1);
    }

    #[test]
    fn test_unmatchable_and_duplicate_records_are_skipped() {
        let mut r = reconciler();
        let record = RawRecord::new("Peter Kamau", SourceType::Parliament).with_party("ODM");

        assert_eq!(
            r.ingest(RawRecord::new("Hon. (Dr.)", SourceType::Parliament)),
            IngestOutcome::Skipped(SkipReason::Unmatchable)
        );
        assert_eq!(r.ingest(record.clone()), IngestOutcome::Created { index: 0 });
        assert_eq!(r.ingest(record), IngestOutcome::Skipped(SkipReason::Duplicate));

        let stats = r.stats();
        assert_eq!(stats.seen, 3);
        assert_eq!(stats.skipped_unmatchable, 1);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.created, 1);
        assert_eq!(r.take_journal().len(), 1);
    }

    #[test]
    fn test_ingest_all_orders_by_source_priority() {
        let mut r = reconciler();
        let outcomes = r.ingest_all(vec![
            RawRecord::new("John Mwangi", SourceType::Scorecard).with_party("Jubilee"),
            RawRecord::new("John Mwangi", SourceType::parse("blog")).with_party("KANU"),
            RawRecord::new("Hon. John Mwangi", SourceType::Parliament).with_party("UDA"),
        ]);

        assert_eq!(outcomes[0], IngestOutcome::Created { index: 0 });
        let member = r.store().get(0).unwrap();
        assert_eq!(member.party.as_deref(), Some("UDA"));
        assert_eq!(member.data_sources().len(), 3);
        assert_eq!(r.stats().conflicts, 2);

        let sources: Vec<SourceType> = r.take_journal().into_iter().map(|d| d.source).collect();
        assert_eq!(
            sources,
            vec![SourceType::Parliament, SourceType::Scorecard, SourceType::parse("blog")]
        );
    }

    #[test]
    fn test_partial_name_match_is_counted() {
        let mut r = reconciler();
        r.ingest(RawRecord::new("Peter Kamau Ouma", SourceType::Parliament));
        let outcome = r.ingest(RawRecord::new("Paul Kamau Ouma", SourceType::Wikipedia));

        assert!(matches!(
            outcome,
            IngestOutcome::Merged { tier: MatchTier::PartialName, .. }
        ));
        assert_eq!(r.stats().partial_name, 1);
        assert!(r.stats().summary().contains("1 fuzzy-matched"));

        let journal = r.take_journal();
        assert_eq!(journal[1].tier, MatchTier::PartialName);
        assert_eq!(journal[1].score, 2);
        assert_eq!(journal[0].member_id, journal[1].member_id);
        assert!(r.take_journal().is_empty());
    }

    #[test]
    fn test_ambiguous_region_is_counted() {
        // Through ingest a second "Starehe" would merge, so seed from a checkpoint
        let normalizer = crate::normalize::NameNormalizer::new();
        let members: Vec<Member> = ["Peter Kamau", "Paul Otieno"]
            .iter()
            .map(|name| {
                let mut m = Member::new(*name, &normalizer);
                m.constituency = Some("Starehe".to_string());
                m
            })
            .collect();
        let mut r = Reconciler::resume(RegistryConfig::default(), members).unwrap();
        assert_eq!(r.store().len(), 2);

        r.ingest(RawRecord::new("Mary Wanjiru", SourceType::Wikipedia).with_constituency("Starehe"));
        assert_eq!(r.stats().ambiguous_region, 1);
        // First registered wins
        assert!(r.store().get(0).unwrap().has_source(&SourceType::Wikipedia));
    }

    #[test]
    fn test_enrichment_and_gender_inference() {
        let mut r = reconciler();
        r.ingest(
            RawRecord::new("Mary Wanjiru", SourceType::Wikipedia)
                .with_biography("She is the Majority Whip. Her committee work includes the Liaison Committee."),
        );

        let member = r.store().get(0).unwrap();
        assert_eq!(member.leadership_title.as_deref(), Some("Majority Whip"));
        assert_eq!(member.committees, vec!["Liaison Committee"]);
        assert_eq!(member.gender, Gender::Female);
        assert_eq!(r.stats().genders_inferred, 1);
        assert_eq!(r.stats().enriched, 2);
    }

    #[test]
    fn test_resume_continues_merging() {
        let mut first = reconciler();
        first.ingest(RawRecord::new("John Mwangi", SourceType::Parliament));
        let members = first.into_store().into_members();
        let id = members[0].id.clone();

        let mut resumed = Reconciler::resume(RegistryConfig::default(), members).unwrap();
        let outcome = resumed.ingest(
            RawRecord::new("Hon. John Mwangi", SourceType::Wikipedia).with_county("Nairobi"),
        );

        assert!(matches!(outcome, IngestOutcome::Merged { index: 0, .. }));
        let member = resumed.store().get(0).unwrap();
        assert_eq!(member.id, id);
        assert_eq!(member.county.as_deref(), Some("Nairobi"));
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = RawRecord::new("John Mwangi", SourceType::Parliament).with_party("UDA");
        let b = a.clone();
        let c = a.clone().with_county("Nairobi");

        assert_eq!(fingerprint(&a), fingerprint(&b));
        assert_ne!(fingerprint(&a), fingerprint(&c));
        assert_eq!(fingerprint(&a).len(), 64);
    }
}
