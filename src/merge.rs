// 🧩 Merge Engine - Fold an incoming record into a member
//
// Rules:
// - Scalars: fill only when the member's field is empty. A populated field is
//   never overwritten; the losing value is reported as a FieldConflict.
// - Lists: union, first occurrence order, de-duplicated.
// - Provenance: the record's source is always added.
// - Gender: explicit value first, then (optionally) pronoun counts in the
//   biography. The heuristic never overrides a stated gender.

use crate::entities::{Contact, Gender, Member, MemberStatus};
use crate::normalize::NameNormalizer;
use crate::record::{non_empty, RawRecord, SourceType};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

// ============================================================================
// POLICIES
// ============================================================================

/// Who gets to write the biography
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiographyPolicy {
    /// First non-empty biography wins
    #[default]
    FirstNonEmpty,

    /// Sources listed earlier are richer; a richer source replaces a biography
    /// written by a poorer (or unlisted) one
    PreferSources(Vec<SourceType>),
}

impl BiographyPolicy {
    fn rank(sources: &[SourceType], source: Option<&SourceType>) -> usize {
        source
            .and_then(|s| sources.iter().position(|p| p == s))
            .unwrap_or(sources.len())
    }
}

// ============================================================================
// MERGE OUTCOME
// ============================================================================

/// A populated field that kept its value over a different incoming one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldConflict {
    pub field: String,
    pub kept: String,
    pub discarded: String,
    pub source: SourceType,
}

/// What one merge did to a member
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Scalar fields that went from empty to populated
    pub filled: Vec<&'static str>,

    /// Scalar fields where the incoming value lost
    pub conflicts: Vec<FieldConflict>,

    /// New list entries (committees + career)
    pub list_additions: usize,

    /// The source was new to this member
    pub source_added: bool,

    /// Gender came from the pronoun heuristic
    pub gender_inferred: bool,
}

impl MergeOutcome {
    /// Did any field value change (provenance aside)?
    pub fn changed_fields(&self) -> bool {
        !self.filled.is_empty() || self.list_additions > 0
    }
}

// ============================================================================
// MERGE ENGINE
// ============================================================================

pub struct MergeEngine {
    pub biography_policy: BiographyPolicy,

    /// Fall back to pronoun counting when gender is still unknown (default: true)
    pub infer_gender: bool,
}

impl MergeEngine {
    pub fn new() -> Self {
        MergeEngine {
            biography_policy: BiographyPolicy::FirstNonEmpty,
            infer_gender: true,
        }
    }

    /// Build a brand-new member from a record.
    ///
    /// Callers must reject records whose name normalizes to "".
    pub fn create(&self, record: &RawRecord, normalizer: &NameNormalizer) -> (Member, MergeOutcome) {
        let mut member = Member::new(record.name.clone(), normalizer);
        let outcome = self.merge_into(&mut member, record);
        (member, outcome)
    }

    /// Fold `record` into `member` in place
    pub fn merge_into(&self, member: &mut Member, record: &RawRecord) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();
        let source = &record.source_id;

        fill_text("county", &mut member.county, &record.county, source, &mut outcome);
        fill_text(
            "constituency",
            &mut member.constituency,
            &record.constituency,
            source,
            &mut outcome,
        );
        fill_text("party", &mut member.party, &record.party, source, &mut outcome);
        fill_text(
            "leadershipTitle",
            &mut member.leadership_title,
            &record.leadership_title,
            source,
            &mut outcome,
        );

        self.merge_status(member, record, &mut outcome);
        self.merge_explicit_gender(member, record, &mut outcome);

        merge_contact("email", &mut member.email, &record.email, source, &mut outcome);
        merge_contact("phone", &mut member.phone, &record.phone, source, &mut outcome);

        self.merge_biography(member, record, &mut outcome);

        outcome.list_additions += union_list(&mut member.committees, &record.committees);
        outcome.list_additions += union_list(&mut member.career, &record.career);

        if let Some(url) = non_empty(&record.profile_url) {
            match member.profile_links.get(source).cloned() {
                None => {
                    member.profile_links.insert(source.clone(), url.to_string());
                    outcome.filled.push("profileLinks");
                }
                Some(existing) if existing != url => {
                    outcome.conflicts.push(FieldConflict {
                        field: "profileLinks".to_string(),
                        kept: existing,
                        discarded: url.to_string(),
                        source: source.clone(),
                    });
                }
                Some(_) => {}
            }
        }

        for (key, value) in &record.extra {
            if is_empty_value(value) {
                continue;
            }
            member.metadata.entry(key.clone()).or_insert_with(|| value.clone());
        }

        outcome.source_added = member.add_source(source.clone());

        // Stored biography first, then the incoming one even if it lost
        if self.infer_gender && !member.gender.is_known() {
            let inferred = member
                .biography
                .as_deref()
                .and_then(infer_gender_from_text)
                .or_else(|| non_empty(&record.biography).and_then(infer_gender_from_text));
            if let Some(gender) = inferred {
                member.gender = gender;
                outcome.gender_inferred = true;
                outcome.filled.push("gender");
            }
        }

        outcome
    }

    fn merge_status(&self, member: &mut Member, record: &RawRecord, outcome: &mut MergeOutcome) {
        let Some(raw) = non_empty(&record.status) else {
            return;
        };
        let incoming = MemberStatus::parse(raw);
        if !incoming.is_known() {
            return;
        }

        if !member.status.is_known() {
            member.status = incoming;
            outcome.filled.push("status");
        } else if member.status != incoming {
            outcome.conflicts.push(FieldConflict {
                field: "status".to_string(),
                kept: member.status.as_str().to_string(),
                discarded: incoming.as_str().to_string(),
                source: record.source_id.clone(),
            });
        }
    }

    fn merge_explicit_gender(&self, member: &mut Member, record: &RawRecord, outcome: &mut MergeOutcome) {
        let incoming = non_empty(&record.gender).map(Gender::parse).unwrap_or_default();
        if !incoming.is_known() {
            return;
        }

        if !member.gender.is_known() {
            member.gender = incoming;
            outcome.filled.push("gender");
        } else if member.gender != incoming {
            outcome.conflicts.push(FieldConflict {
                field: "gender".to_string(),
                kept: member.gender.as_str().to_string(),
                discarded: incoming.as_str().to_string(),
                source: record.source_id.clone(),
            });
        }
    }

    fn merge_biography(&self, member: &mut Member, record: &RawRecord, outcome: &mut MergeOutcome) {
        let Some(incoming) = non_empty(&record.biography) else {
            return;
        };

        let existing = non_empty(&member.biography).map(str::to_string);
        let Some(existing) = existing else {
            member.biography = Some(incoming.to_string());
            member.biography_source = Some(record.source_id.clone());
            outcome.filled.push("biography");
            return;
        };

        if existing == incoming {
            return;
        }

        let replace = match &self.biography_policy {
            BiographyPolicy::FirstNonEmpty => false,
            BiographyPolicy::PreferSources(sources) => {
                BiographyPolicy::rank(sources, Some(&record.source_id))
                    < BiographyPolicy::rank(sources, member.biography_source.as_ref())
            }
        };

        if replace {
            member.biography = Some(incoming.to_string());
            member.biography_source = Some(record.source_id.clone());
            outcome.filled.push("biography");
            outcome.conflicts.push(FieldConflict {
                field: "biography".to_string(),
                kept: incoming.to_string(),
                discarded: existing,
                source: record.source_id.clone(),
            });
        } else {
            outcome.conflicts.push(FieldConflict {
                field: "biography".to_string(),
                kept: existing,
                discarded: incoming.to_string(),
                source: record.source_id.clone(),
            });
        }
    }
}

impl Default for MergeEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn fill_text(
    field: &'static str,
    slot: &mut Option<String>,
    incoming: &Option<String>,
    source: &SourceType,
    outcome: &mut MergeOutcome,
) {
    let Some(value) = non_empty(incoming) else {
        return;
    };

    match non_empty(slot).map(str::to_string) {
        None => {
            *slot = Some(value.to_string());
            outcome.filled.push(field);
        }
        Some(existing) if !same_text(&existing, value) => {
            outcome.conflicts.push(FieldConflict {
                field: field.to_string(),
                kept: existing,
                discarded: value.to_string(),
                source: source.clone(),
            });
        }
        Some(_) => {}
    }
}

/// Unknown < NotAvailable < Value. Moves only upward; two values conflict.
fn merge_contact(
    field: &'static str,
    slot: &mut Contact,
    incoming: &Option<String>,
    source: &SourceType,
    outcome: &mut MergeOutcome,
) {
    let incoming = incoming.as_deref().map(Contact::parse).unwrap_or_default();

    let upgrade = match (&*slot, &incoming) {
        (_, Contact::Unknown) => false,
        (Contact::Unknown, _) => true,
        (Contact::NotAvailable, Contact::Value(_)) => true,
        (Contact::Value(existing), Contact::Value(v)) => {
            if !same_text(existing, v) {
                outcome.conflicts.push(FieldConflict {
                    field: field.to_string(),
                    kept: existing.clone(),
                    discarded: v.clone(),
                    source: source.clone(),
                });
            }
            false
        }
        _ => false,
    };

    if upgrade {
        *slot = incoming;
        outcome.filled.push(field);
    }
}

/// Append entries not already present; returns how many were added.
///
/// Entries compare trimmed, whitespace-collapsed and case-folded; the first
/// spelling seen is the one kept.
pub fn union_list(existing: &mut Vec<String>, incoming: &[String]) -> usize {
    let mut seen: HashSet<String> = existing.iter().map(|e| comparison_key(e)).collect();
    let mut added = 0;

    for entry in incoming {
        let trimmed = entry.trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(comparison_key(trimmed)) {
            existing.push(trimmed.to_string());
            added += 1;
        }
    }

    added
}

fn comparison_key(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

fn same_text(a: &str, b: &str) -> bool {
    comparison_key(a) == comparison_key(b)
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

const MALE_PRONOUNS: [&str; 4] = ["he", "him", "his", "himself"];
const FEMALE_PRONOUNS: [&str; 4] = ["she", "her", "hers", "herself"];

/// Majority pronoun form in free text; None on a tie or no pronouns
pub fn infer_gender_from_text(text: &str) -> Option<Gender> {
    let mut male = 0usize;
    let mut female = 0usize;

    for word in text.split(|c: char| !c.is_alphabetic()) {
        if word.is_empty() {
            continue;
        }
        let word = word.to_lowercase();
        if MALE_PRONOUNS.contains(&word.as_str()) {
            male += 1;
        } else if FEMALE_PRONOUNS.contains(&word.as_str()) {
            female += 1;
        }
    }

    if male > female {
        Some(Gender::Male)
    } else if female > male {
        Some(Gender::Female)
    } else {
        None
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn member(name: &str) -> Member {
        Member::new(name, &NameNormalizer::new())
    }

    #[test]
    fn test_fills_empty_fields() {
        let engine = MergeEngine::new();
        let mut m = member("HON. JOHN MWANGI");
        m.add_source(SourceType::Parliament);

        let record = RawRecord::new("Dr. John Mwangi", SourceType::Wikipedia)
            .with_constituency("Dagoretti North")
            .with_party("ODM");

        let outcome = engine.merge_into(&mut m, &record);

        assert_eq!(m.constituency.as_deref(), Some("Dagoretti North"));
        assert_eq!(m.party.as_deref(), Some("ODM"));
        assert!(m.has_source(&SourceType::Parliament));
        assert!(m.has_source(&SourceType::Wikipedia));
        assert!(outcome.source_added);
        assert_eq!(outcome.filled, vec!["constituency", "party"]);
        // Display name is never rewritten by a merge
        assert_eq!(m.name(), "HON. JOHN MWANGI");
    }

    #[test]
    fn test_never_overwrites_populated_field() {
        let engine = MergeEngine::new();
        let mut m = member("John Mwangi");
        m.party = Some("ODM".to_string());

        let record = RawRecord::new("John Mwangi", SourceType::Scorecard).with_party("UDA");
        let outcome = engine.merge_into(&mut m, &record);

        assert_eq!(m.party.as_deref(), Some("ODM"));
        assert_eq!(outcome.conflicts.len(), 1);
        assert_eq!(outcome.conflicts[0].field, "party");
        assert_eq!(outcome.conflicts[0].kept, "ODM");
        assert_eq!(outcome.conflicts[0].discarded, "UDA");
    }

    #[test]
    fn test_same_value_different_case_is_not_a_conflict() {
        let engine = MergeEngine::new();
        let mut m = member("John Mwangi");
        m.county = Some("Nairobi".to_string());

        let record = RawRecord::new("John Mwangi", SourceType::Scorecard).with_county(" NAIROBI ");
        let outcome = engine.merge_into(&mut m, &record);

        assert!(outcome.conflicts.is_empty());
        assert_eq!(m.county.as_deref(), Some("Nairobi"));
    }

    #[test]
    fn test_empty_incoming_never_clears() {
        let engine = MergeEngine::new();
        let mut m = member("John Mwangi");
        m.party = Some("ODM".to_string());
        m.email = Contact::Value("jm@parliament.go.ke".to_string());
        m.committees = vec!["Health".to_string()];
        let before = m.populated_field_count();

        let mut record = RawRecord::new("John Mwangi", SourceType::Scorecard).with_party("   ");
        record.email = Some(String::new());

        engine.merge_into(&mut m, &record);
        assert_eq!(m.party.as_deref(), Some("ODM"));
        assert_eq!(m.email.value(), Some("jm@parliament.go.ke"));
        assert_eq!(m.committees, vec!["Health".to_string()]);
        assert_eq!(m.populated_field_count(), before);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let engine = MergeEngine::new();
        let (mut m, _) = engine.create(
            &RawRecord::new("Mary Wanjiru", SourceType::Parliament)
                .with_constituency("Starehe")
                .with_gender("F")
                .with_committees(["Health", "Budget"])
                .with_biography("She chairs the committee."),
            &NameNormalizer::new(),
        );
        let snapshot = m.clone();

        let record = m.to_record(SourceType::Parliament);
        let outcome = engine.merge_into(&mut m, &record);

        assert_eq!(m, snapshot);
        assert!(!outcome.changed_fields());
        assert!(!outcome.source_added);
        assert!(outcome.conflicts.is_empty());
    }

    #[test]
    fn test_list_union_dedups_and_keeps_order() {
        let mut list = vec!["Health".to_string(), "Budget".to_string()];
        let added = union_list(
            &mut list,
            &[
                " health ".to_string(),
                "Public  Accounts".to_string(),
                "".to_string(),
                "public accounts".to_string(),
            ],
        );

        assert_eq!(added, 1);
        assert_eq!(list, vec!["Health", "Budget", "Public  Accounts"]);

        // Merging the same list again adds nothing
        let again = list.clone();
        assert_eq!(union_list(&mut list, &again), 0);
        assert_eq!(list, again);
    }

    #[test]
    fn test_list_union_is_commutative() {
        let a = vec!["Health".to_string(), "Budget".to_string(), "Liaison".to_string()];
        let b = vec!["budget ".to_string(), "Energy".to_string(), "HEALTH".to_string()];

        let mut ab = a.clone();
        union_list(&mut ab, &b);
        let mut ba = b.clone();
        union_list(&mut ba, &a);

        let key_set = |list: &[String]| -> std::collections::BTreeSet<String> {
            list.iter().map(|s| s.trim().to_lowercase()).collect()
        };
        assert_eq!(ab.len(), ba.len());
        assert_eq!(key_set(&ab), key_set(&ba));
    }

    #[test]
    fn test_career_order_preserved() {
        let engine = MergeEngine::new();
        let mut m = member("John Mwangi");
        m.career = vec!["Teacher, 1990-2000".to_string()];

        let mut record = RawRecord::new("John Mwangi", SourceType::Wikipedia);
        record.career = vec![
            "MCA, 2013-2017".to_string(),
            "Teacher, 1990-2000".to_string(),
            "MP, 2017-".to_string(),
        ];
        let outcome = engine.merge_into(&mut m, &record);

        assert_eq!(outcome.list_additions, 2);
        assert_eq!(
            m.career,
            vec!["Teacher, 1990-2000", "MCA, 2013-2017", "MP, 2017-"]
        );
    }

    #[test]
    fn test_contact_sentinel_upgrades_but_never_downgrades() {
        let engine = MergeEngine::new();
        let mut m = member("John Mwangi");

        let mut record = RawRecord::new("John Mwangi", SourceType::Parliament);
        record.phone = Some("N/A".to_string());
        engine.merge_into(&mut m, &record);
        assert_eq!(m.phone, Contact::NotAvailable);

        record.phone = Some("+254 700 000 000".to_string());
        engine.merge_into(&mut m, &record);
        assert_eq!(m.phone, Contact::Value("+254 700 000 000".to_string()));

        record.phone = Some("n/a".to_string());
        engine.merge_into(&mut m, &record);
        assert_eq!(m.phone, Contact::Value("+254 700 000 000".to_string()));
    }

    #[test]
    fn test_explicit_gender_adopted_and_kept() {
        let engine = MergeEngine::new();
        let mut m = member("Mary Wanjiru");

        engine.merge_into(&mut m, &RawRecord::new("Mary Wanjiru", SourceType::Parliament).with_gender("Female"));
        assert_eq!(m.gender, Gender::Female);

        let outcome = engine.merge_into(&mut m, &RawRecord::new("Mary Wanjiru", SourceType::Wikipedia).with_gender("M"));
        assert_eq!(m.gender, Gender::Female);
        assert_eq!(outcome.conflicts[0].field, "gender");
    }

    #[test]
    fn test_gender_inferred_from_biography() {
        let engine = MergeEngine::new();
        let mut m = member("Amina Hassan");

        let record = RawRecord::new("Amina Hassan", SourceType::Wikipedia)
            .with_biography("She was elected in 2017. Her work focuses on health; he said nothing.");
        let outcome = engine.merge_into(&mut m, &record);

        assert_eq!(m.gender, Gender::Female);
        assert!(outcome.gender_inferred);
    }

    #[test]
    fn test_gender_inferred_from_losing_biography() {
        let engine = MergeEngine::new();
        let mut m = member("Amina Hassan");

        engine.merge_into(
            &mut m,
            &RawRecord::new("Amina Hassan", SourceType::Scorecard).with_biography("Elected 2017."),
        );
        assert_eq!(m.gender, Gender::Unknown);

        let outcome = engine.merge_into(
            &mut m,
            &RawRecord::new("Amina Hassan", SourceType::Wikipedia)
                .with_biography("She chairs the Health Committee."),
        );
        assert_eq!(m.biography.as_deref(), Some("Elected 2017."));
        assert_eq!(m.gender, Gender::Female);
        assert!(outcome.gender_inferred);
    }

    #[test]
    fn test_gender_heuristic_never_overrides_stated_gender() {
        let engine = MergeEngine::new();
        let mut m = member("Amina Hassan");
        m.gender = Gender::Male;

        let record = RawRecord::new("Amina Hassan", SourceType::Wikipedia)
            .with_biography("She served. Her record. Hers alone.");
        let outcome = engine.merge_into(&mut m, &record);

        assert_eq!(m.gender, Gender::Male);
        assert!(!outcome.gender_inferred);
    }

    #[test]
    fn test_gender_heuristic_disabled() {
        let mut engine = MergeEngine::new();
        engine.infer_gender = false;
        let mut m = member("Amina Hassan");

        engine.merge_into(
            &mut m,
            &RawRecord::new("Amina Hassan", SourceType::Wikipedia).with_biography("She served."),
        );
        assert_eq!(m.gender, Gender::Unknown);
    }

    #[test]
    fn test_infer_gender_from_text() {
        assert_eq!(infer_gender_from_text("He and his team"), Some(Gender::Male));
        assert_eq!(infer_gender_from_text("She; her; HERS."), Some(Gender::Female));
        assert_eq!(infer_gender_from_text("He met her"), None);
        assert_eq!(infer_gender_from_text("The shepherd hesitated"), None);
        assert_eq!(infer_gender_from_text(""), None);
    }

    #[test]
    fn test_biography_first_non_empty_wins() {
        let engine = MergeEngine::new();
        let mut m = member("John Mwangi");

        engine.merge_into(&mut m, &RawRecord::new("John Mwangi", SourceType::Scorecard).with_biography("Short."));
        let outcome = engine.merge_into(
            &mut m,
            &RawRecord::new("John Mwangi", SourceType::Wikipedia).with_biography("A much longer biography."),
        );

        assert_eq!(m.biography.as_deref(), Some("Short."));
        assert_eq!(m.biography_source, Some(SourceType::Scorecard));
        assert_eq!(outcome.conflicts[0].field, "biography");
    }

    #[test]
    fn test_biography_richer_source_policy() {
        let engine = MergeEngine {
            biography_policy: BiographyPolicy::PreferSources(vec![SourceType::Wikipedia]),
            infer_gender: false,
        };
        let mut m = member("John Mwangi");

        engine.merge_into(&mut m, &RawRecord::new("John Mwangi", SourceType::Scorecard).with_biography("Short."));
        engine.merge_into(
            &mut m,
            &RawRecord::new("John Mwangi", SourceType::Wikipedia).with_biography("A much longer biography."),
        );
        assert_eq!(m.biography.as_deref(), Some("A much longer biography."));
        assert_eq!(m.biography_source, Some(SourceType::Wikipedia));

        // A poorer source cannot take it back
        engine.merge_into(&mut m, &RawRecord::new("John Mwangi", SourceType::Parliament).with_biography("Other."));
        assert_eq!(m.biography.as_deref(), Some("A much longer biography."));
    }

    #[test]
    fn test_profile_links_one_per_source() {
        let engine = MergeEngine::new();
        let mut m = member("John Mwangi");

        let mut record = RawRecord::new("John Mwangi", SourceType::Wikipedia);
        record.profile_url = Some("https://en.wikipedia.org/wiki/John_Mwangi".to_string());
        engine.merge_into(&mut m, &record);

        record.profile_url = Some("https://en.wikipedia.org/wiki/John_Mwangi_(politician)".to_string());
        let outcome = engine.merge_into(&mut m, &record);

        assert_eq!(m.profile_links.len(), 1);
        assert_eq!(
            m.profile_links.get(&SourceType::Wikipedia).map(String::as_str),
            Some("https://en.wikipedia.org/wiki/John_Mwangi")
        );
        assert_eq!(outcome.conflicts[0].field, "profileLinks");
    }

    #[test]
    fn test_extension_fields_first_writer_wins() {
        let engine = MergeEngine::new();
        let mut m = member("John Mwangi");

        engine.merge_into(
            &mut m,
            &RawRecord::new("John Mwangi", SourceType::Scorecard)
                .with_extra("score", serde_json::json!(72))
                .with_extra("note", serde_json::json!("")),
        );
        engine.merge_into(
            &mut m,
            &RawRecord::new("John Mwangi", SourceType::Scorecard).with_extra("score", serde_json::json!(10)),
        );

        assert_eq!(m.metadata.get("score"), Some(&serde_json::json!(72)));
        assert!(m.metadata.get("note").is_none());
    }

    #[test]
    fn test_status_fill() {
        let engine = MergeEngine::new();
        let mut m = member("John Mwangi");
        let mut record = RawRecord::new("John Mwangi", SourceType::Parliament);
        record.status = Some("Nominated".to_string());

        engine.merge_into(&mut m, &record);
        assert_eq!(m.status, MemberStatus::Nominated);
    }
}
