// 📥 Raw Records - One source's view of one legislator, before merging
//
// Extractors produce these; the reconciler consumes them. Well-known fields
// are typed, anything else a source carries rides along in `extra`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// SOURCE TYPE
// ============================================================================

/// SourceType - Which public source a record came from
///
/// Declaration order is the default merge priority: the official site is
/// merged first so its values win under "first non-empty wins".
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SourceType {
    /// Official legislature website
    Parliament,

    /// Encyclopedia articles
    Wikipedia,

    /// PDF performance scorecards
    Scorecard,

    /// Anything else (kept verbatim, lowercased)
    Other(String),
}

impl SourceType {
    /// Human-readable name for display
    pub fn name(&self) -> &str {
        match self {
            SourceType::Parliament => "Parliament",
            SourceType::Wikipedia => "Wikipedia",
            SourceType::Scorecard => "Scorecard",
            SourceType::Other(code) => code,
        }
    }

    /// Stable code used in JSON and the audit log
    pub fn code(&self) -> &str {
        match self {
            SourceType::Parliament => "parliament",
            SourceType::Wikipedia => "wikipedia",
            SourceType::Scorecard => "scorecard",
            SourceType::Other(code) => code,
        }
    }

    /// Parse a source identifier (case-insensitive)
    pub fn parse(s: &str) -> Self {
        let code = s.trim().to_lowercase();
        match code.as_str() {
            "parliament" | "official" => SourceType::Parliament,
            "wikipedia" | "wiki" => SourceType::Wikipedia,
            "scorecard" | "scorecards" => SourceType::Scorecard,
            _ => SourceType::Other(code),
        }
    }

    /// Default merge order
    pub fn default_priority() -> Vec<SourceType> {
        vec![
            SourceType::Parliament,
            SourceType::Wikipedia,
            SourceType::Scorecard,
        ]
    }
}

impl From<String> for SourceType {
    fn from(s: String) -> Self {
        SourceType::parse(&s)
    }
}

impl From<SourceType> for String {
    fn from(source: SourceType) -> Self {
        source.code().to_string()
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ============================================================================
// RAW RECORD
// ============================================================================

/// RawRecord - Output of a source extractor
///
/// Every field except `name` and `source_id` may be absent. Absent and empty
/// are the same thing to the merge engine. A null or wrongly typed field is
/// read as absent instead of failing the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRecord {
    // Required
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: String,
    pub source_id: SourceType,

    // Location
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub county: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub constituency: Option<String>,

    // Affiliation
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub party: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,

    // Contact (raw strings, "N/A" style sentinels allowed)
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    // Lists
    #[serde(default, deserialize_with = "lenient_list", skip_serializing_if = "Vec::is_empty")]
    pub committees: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list", skip_serializing_if = "Vec::is_empty")]
    pub career: Vec<String>,

    // Free text
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub biography: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub leadership_title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub profile_url: Option<String>,

    /// Source-specific extension fields
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl RawRecord {
    /// Create a record with only the required fields
    pub fn new(name: impl Into<String>, source_id: SourceType) -> Self {
        RawRecord {
            name: name.into(),
            source_id,
            county: None,
            constituency: None,
            party: None,
            status: None,
            gender: None,
            email: None,
            phone: None,
            committees: Vec::new(),
            career: Vec::new(),
            biography: None,
            leadership_title: None,
            profile_url: None,
            extra: BTreeMap::new(),
        }
    }

    /// Build a record from a flat field → string mapping (CSV rows, form data).
    ///
    /// List fields are split on `;`. Unknown keys land in `extra`.
    /// `default_source` is used when the map has no `sourceId`.
    pub fn from_field_map(fields: &BTreeMap<String, String>, default_source: &SourceType) -> Self {
        let get = |key: &str| {
            fields
                .get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let source_id = get("sourceId")
            .or_else(|| get("source_id"))
            .map(|s| SourceType::parse(&s))
            .unwrap_or_else(|| default_source.clone());

        let mut record = RawRecord::new(get("name").unwrap_or_default(), source_id);
        record.county = get("county");
        record.constituency = get("constituency");
        record.party = get("party");
        record.status = get("status");
        record.gender = get("gender");
        record.email = get("email");
        record.phone = get("phone");
        record.committees = get("committees").map(|v| split_list(&v)).unwrap_or_default();
        record.career = get("career").map(|v| split_list(&v)).unwrap_or_default();
        record.biography = get("biography");
        record.leadership_title = get("leadershipTitle").or_else(|| get("leadership_title"));
        record.profile_url = get("profileUrl").or_else(|| get("profile_url"));

        const KNOWN: [&str; 17] = [
            "name", "sourceId", "source_id", "county", "constituency", "party", "status",
            "gender", "email", "phone", "committees", "career", "biography",
            "leadershipTitle", "leadership_title", "profileUrl", "profile_url",
        ];
        for (key, value) in fields {
            if KNOWN.contains(&key.as_str()) || value.trim().is_empty() {
                continue;
            }
            record
                .extra
                .insert(key.clone(), Value::String(value.trim().to_string()));
        }

        record
    }

    /// Builder pattern: add constituency (sub-region)
    pub fn with_constituency(mut self, constituency: impl Into<String>) -> Self {
        self.constituency = Some(constituency.into());
        self
    }

    /// Builder pattern: add county (administrative region)
    pub fn with_county(mut self, county: impl Into<String>) -> Self {
        self.county = Some(county.into());
        self
    }

    /// Builder pattern: add party
    pub fn with_party(mut self, party: impl Into<String>) -> Self {
        self.party = Some(party.into());
        self
    }

    /// Builder pattern: add gender
    pub fn with_gender(mut self, gender: impl Into<String>) -> Self {
        self.gender = Some(gender.into());
        self
    }

    /// Builder pattern: add biography
    pub fn with_biography(mut self, biography: impl Into<String>) -> Self {
        self.biography = Some(biography.into());
        self
    }

    /// Builder pattern: add committees
    pub fn with_committees<I, S>(mut self, committees: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.committees.extend(committees.into_iter().map(Into::into));
        self
    }

    /// Builder pattern: add an extension field
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// String value of an extension field, if present and non-empty
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// ============================================================================
// LENIENT FIELDS
// ============================================================================

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Strings, numbers and booleans are text; null, arrays and objects are absent
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(scalar_text(&value))
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_string(deserializer)?.unwrap_or_default())
}

/// Arrays keep their scalar items, a lone string is split on `;`, null is empty
fn lenient_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items.iter().filter_map(scalar_text).collect(),
        Value::String(s) => split_list(&s),
        _ => Vec::new(),
    })
}

/// Treat `Some("")` / `Some("   ")` like `None`
pub fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_type_parse() {
        assert_eq!(SourceType::parse("Wikipedia"), SourceType::Wikipedia);
        assert_eq!(SourceType::parse(" PARLIAMENT "), SourceType::Parliament);
        assert_eq!(
            SourceType::parse("Mzalendo"),
            SourceType::Other("mzalendo".to_string())
        );
    }

    #[test]
    fn test_source_type_priority_order() {
        assert!(SourceType::Parliament < SourceType::Wikipedia);
        assert!(SourceType::Wikipedia < SourceType::Scorecard);
        assert!(SourceType::Scorecard < SourceType::Other("x".to_string()));
    }

    #[test]
    fn test_record_from_json_keeps_extension_fields() {
        let json = r#"{
            "name": "Hon. Mary Wanjiru",
            "sourceId": "wikipedia",
            "constituency": "Starehe",
            "committees": ["Health"],
            "termStart": "2022"
        }"#;

        let record: RawRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.source_id, SourceType::Wikipedia);
        assert_eq!(record.constituency.as_deref(), Some("Starehe"));
        assert_eq!(record.committees, vec!["Health".to_string()]);
        assert_eq!(record.extra_str("termStart"), Some("2022"));
        assert!(record.party.is_none());
    }

    #[test]
    fn test_record_reads_null_and_mistyped_fields_as_absent() {
        let record: RawRecord = serde_json::from_value(serde_json::json!({
            "name": "John Mwangi",
            "sourceId": "wikipedia",
            "committees": null,
            "career": "Teacher; MP",
            "party": null,
            "phone": 254700000000u64,
            "county": ["Nairobi"],
        }))
        .unwrap();

        assert!(record.committees.is_empty());
        assert_eq!(record.career, vec!["Teacher", "MP"]);
        assert!(record.party.is_none());
        assert_eq!(record.phone.as_deref(), Some("254700000000"));
        assert!(record.county.is_none());

        let nameless: RawRecord =
            serde_json::from_value(serde_json::json!({"name": null, "sourceId": "scorecard"}))
                .unwrap();
        assert_eq!(nameless.name, "");
    }

    #[test]
    fn test_record_serializes_source_as_code() {
        let record = RawRecord::new("John", SourceType::Scorecard);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["sourceId"], "scorecard");
        assert!(value.get("county").is_none());
    }

    #[test]
    fn test_from_field_map() {
        let mut fields = BTreeMap::new();
        fields.insert("name".to_string(), " John Mwangi ".to_string());
        fields.insert("committees".to_string(), "Health; Budget ;".to_string());
        fields.insert("party".to_string(), "".to_string());
        fields.insert("role".to_string(), "Majority Whip".to_string());

        let record = RawRecord::from_field_map(&fields, &SourceType::Scorecard);
        assert_eq!(record.name, "John Mwangi");
        assert_eq!(record.source_id, SourceType::Scorecard);
        assert_eq!(record.committees, vec!["Health", "Budget"]);
        assert!(record.party.is_none());
        assert_eq!(record.extra_str("role"), Some("Majority Whip"));
    }

    #[test]
    fn test_from_field_map_source_override() {
        let mut fields = BTreeMap::new();
        fields.insert("name".to_string(), "John".to_string());
        fields.insert("sourceId".to_string(), "parliament".to_string());

        let record = RawRecord::from_field_map(&fields, &SourceType::Scorecard);
        assert_eq!(record.source_id, SourceType::Parliament);
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(&Some("  x ".to_string())), Some("x"));
        assert_eq!(non_empty(&Some("   ".to_string())), None);
        assert_eq!(non_empty(&None), None);
    }
}
