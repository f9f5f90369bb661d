// Member Registry - Core Library
// Entity resolution and record merging for legislator records.
// Exposes all modules for use in CLI, API server, and tests

pub mod normalize;   // Name Normalizer
pub mod record;      // Incoming records + source identifiers
pub mod entities;    // Member entity
pub mod store;       // In-memory entity store + indexes
pub mod matching;    // Tiered match cascade
pub mod merge;       // Field-level merge policy
pub mod enrichment;  // Leadership / committee keyword tables
pub mod config;      // RegistryConfig
pub mod reconcile;   // Match → merge → store loop
pub mod snapshot;    // Checkpoints, record files, CSV export
pub mod db;          // SQLite audit log

// Re-export commonly used types
pub use normalize::{
    NameNormalizer, DEFAULT_HONORIFICS,
    normalize_name, normalize_region, discriminative_tokens,
};
pub use record::{RawRecord, SourceType};
pub use entities::{Member, Gender, MemberStatus, Contact, NOT_AVAILABLE};
pub use store::{MemberStore, MemberIndex};
pub use matching::{MatchEngine, MatchResult, MatchTier, FuzzyTieBreak, overlap_score};
pub use merge::{
    MergeEngine, MergeOutcome, FieldConflict, BiographyPolicy,
    union_list, infer_gender_from_text,
};
pub use enrichment::{Enricher, KeywordRules, LeadershipRule};
pub use config::RegistryConfig;
pub use reconcile::{
    Reconciler, IngestOutcome, IngestStats, MergeDecision, SkipReason, fingerprint,
};
pub use snapshot::{
    Snapshot, SNAPSHOT_FORMAT_VERSION,
    save_snapshot, load_snapshot, load_records, export_csv,
};
pub use db::{
    Event, setup_database, open_audit_log, insert_event, insert_events,
    get_events_for_entity, count_events_by_type,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
