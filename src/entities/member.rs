// 🏛️ Member Entity - One legislator, consolidated across sources
//
// "The UUID is IDENTITY (never changes), every other field is a VALUE"
//
// - Display name is private: the normalized key is derived from it and must
//   never drift out of sync.
// - Provenance (data_sources) only grows.
// - Contacts distinguish "we don't know" from "the source says none".

use crate::normalize::NameNormalizer;
use crate::record::{RawRecord, SourceType};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

// ============================================================================
// GENDER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    #[default]
    Unknown,
}

impl Gender {
    /// Parse loosely: "M", "Male", "female", "F", "woman"...
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "m" | "male" | "man" => Gender::Male,
            "f" | "female" | "woman" => Gender::Female,
            _ => Gender::Unknown,
        }
    }

    pub fn is_known(&self) -> bool {
        *self != Gender::Unknown
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Unknown => "unknown",
        }
    }
}

// ============================================================================
// MEMBER STATUS
// ============================================================================

/// How the member got their seat
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MemberStatus {
    Elected,
    Nominated,
    Other(String),
    #[default]
    Unknown,
}

impl MemberStatus {
    pub fn parse(s: &str) -> Self {
        let trimmed = s.trim();
        match trimmed.to_lowercase().as_str() {
            "" | "unknown" => MemberStatus::Unknown,
            "elected" => MemberStatus::Elected,
            "nominated" => MemberStatus::Nominated,
            _ => MemberStatus::Other(trimmed.to_string()),
        }
    }

    pub fn is_known(&self) -> bool {
        *self != MemberStatus::Unknown
    }

    pub fn as_str(&self) -> &str {
        match self {
            MemberStatus::Elected => "elected",
            MemberStatus::Nominated => "nominated",
            MemberStatus::Other(s) => s,
            MemberStatus::Unknown => "unknown",
        }
    }
}

impl From<String> for MemberStatus {
    fn from(s: String) -> Self {
        MemberStatus::parse(&s)
    }
}

impl From<MemberStatus> for String {
    fn from(status: MemberStatus) -> Self {
        status.as_str().to_string()
    }
}

// ============================================================================
// CONTACT
// ============================================================================

/// Sentinel written to JSON for "source explicitly has no value"
pub const NOT_AVAILABLE: &str = "N/A";

/// A contact field: concrete value, explicit "not available", or unknown
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum Contact {
    #[default]
    Unknown,
    NotAvailable,
    Value(String),
}

impl Contact {
    pub fn parse(s: &str) -> Self {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Contact::Unknown;
        }
        match trimmed.to_uppercase().as_str() {
            "N/A" | "NA" | "NONE" | "NOT AVAILABLE" | "-" => Contact::NotAvailable,
            _ => Contact::Value(trimmed.to_string()),
        }
    }

    pub fn is_unknown(&self) -> bool {
        *self == Contact::Unknown
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            Contact::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Display form ("" for unknown)
    pub fn display(&self) -> &str {
        match self {
            Contact::Unknown => "",
            Contact::NotAvailable => NOT_AVAILABLE,
            Contact::Value(v) => v,
        }
    }
}

impl From<Option<String>> for Contact {
    fn from(value: Option<String>) -> Self {
        value.map(|v| Contact::parse(&v)).unwrap_or_default()
    }
}

impl From<Contact> for Option<String> {
    fn from(contact: Contact) -> Self {
        match contact {
            Contact::Unknown => None,
            Contact::NotAvailable => Some(NOT_AVAILABLE.to_string()),
            Contact::Value(v) => Some(v),
        }
    }
}

// ============================================================================
// MEMBER ENTITY
// ============================================================================

/// Member Entity - identity + consolidated values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    /// Stable identity (UUID) - NEVER changes
    pub id: String,

    name: String,

    /// Derived from `name`; recomputed by the store on load
    #[serde(default)]
    normalized_name: String,

    #[serde(default)]
    pub county: Option<String>,
    #[serde(default)]
    pub constituency: Option<String>,
    #[serde(default)]
    pub party: Option<String>,
    #[serde(default)]
    pub status: MemberStatus,
    #[serde(default)]
    pub gender: Gender,

    #[serde(default)]
    pub email: Contact,
    #[serde(default)]
    pub phone: Contact,

    #[serde(default)]
    pub committees: Vec<String>,
    #[serde(default)]
    pub career: Vec<String>,

    #[serde(default)]
    pub biography: Option<String>,
    /// Which source supplied `biography`
    #[serde(default)]
    pub biography_source: Option<SourceType>,

    #[serde(default)]
    pub leadership_title: Option<String>,

    /// At most one canonical profile link per source
    #[serde(default)]
    pub profile_links: BTreeMap<SourceType, String>,

    #[serde(default)]
    data_sources: BTreeSet<SourceType>,

    /// Source-specific extension fields (first writer wins per key)
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl Member {
    /// Create new member with a fresh UUID
    pub fn new(name: impl Into<String>, normalizer: &NameNormalizer) -> Self {
        let name = name.into().trim().to_string();
        let normalized_name = normalizer.normalize(&name);

        Member {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            normalized_name,
            county: None,
            constituency: None,
            party: None,
            status: MemberStatus::Unknown,
            gender: Gender::Unknown,
            email: Contact::Unknown,
            phone: Contact::Unknown,
            committees: Vec::new(),
            career: Vec::new(),
            biography: None,
            biography_source: None,
            leadership_title: None,
            profile_links: BTreeMap::new(),
            data_sources: BTreeSet::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn normalized_name(&self) -> &str {
        &self.normalized_name
    }

    /// Change the display name; the key follows
    pub fn rename(&mut self, name: impl Into<String>, normalizer: &NameNormalizer) {
        self.name = name.into().trim().to_string();
        self.rekey(normalizer);
    }

    /// Recompute the normalized key from the display name
    pub fn rekey(&mut self, normalizer: &NameNormalizer) {
        self.normalized_name = normalizer.normalize(&self.name);
    }

    pub fn data_sources(&self) -> &BTreeSet<SourceType> {
        &self.data_sources
    }

    /// Record provenance. Returns false if the source was already present.
    pub fn add_source(&mut self, source: SourceType) -> bool {
        self.data_sources.insert(source)
    }

    pub fn has_source(&self, source: &SourceType) -> bool {
        self.data_sources.contains(source)
    }

    /// Count of populated scalar/list fields (used to check merges never lose data)
    pub fn populated_field_count(&self) -> usize {
        let scalars = [
            self.county.is_some(),
            self.constituency.is_some(),
            self.party.is_some(),
            self.status.is_known(),
            self.gender.is_known(),
            !self.email.is_unknown(),
            !self.phone.is_unknown(),
            !self.committees.is_empty(),
            !self.career.is_empty(),
            self.biography.is_some(),
            self.leadership_title.is_some(),
            !self.profile_links.is_empty(),
        ];
        scalars.iter().filter(|populated| **populated).count()
    }

    /// Re-express this member as a record from `source` (for re-ingestion and tests)
    pub fn to_record(&self, source: SourceType) -> RawRecord {
        let mut record = RawRecord::new(self.name.clone(), source.clone());
        record.county = self.county.clone();
        record.constituency = self.constituency.clone();
        record.party = self.party.clone();
        if self.status.is_known() {
            record.status = Some(self.status.as_str().to_string());
        }
        if self.gender.is_known() {
            record.gender = Some(self.gender.as_str().to_string());
        }
        record.email = Option::<String>::from(self.email.clone());
        record.phone = Option::<String>::from(self.phone.clone());
        record.committees = self.committees.clone();
        record.career = self.career.clone();
        record.biography = self.biography.clone();
        record.leadership_title = self.leadership_title.clone();
        record.profile_url = self.profile_links.get(&source).cloned();
        record.extra = self.metadata.clone();
        record
    }
}

// ============================================================================
// TESTS
// ============================================================================
