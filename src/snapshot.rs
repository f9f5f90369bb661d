// 💾 Snapshots & Record Files
// - Checkpoint: the full member list as JSON, written atomically
// - Input: record files in JSON (array), JSON Lines or CSV
// - Output: flat CSV export for spreadsheets

use crate::entities::Member;
use crate::normalize::NameNormalizer;
use crate::record::{RawRecord, SourceType};
use crate::store::MemberStore;
use anyhow::{bail, Context as AnyhowContext, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

// ============================================================================
// SNAPSHOT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub format_version: u32,
    pub saved_at: DateTime<Utc>,
    pub members: Vec<Member>,
}

impl Snapshot {
    /// Capture the store's current state
    pub fn capture(store: &MemberStore) -> Self {
        Snapshot {
            format_version: SNAPSHOT_FORMAT_VERSION,
            saved_at: Utc::now(),
            members: store.members().to_vec(),
        }
    }

    /// Rebuild a store; members are re-inserted in snapshot order
    pub fn into_store(self, normalizer: NameNormalizer) -> MemberStore {
        MemberStore::from_members(normalizer, self.members)
    }
}

/// Write the store to `path` via a temp file + rename, so a crash never
/// leaves a half-written checkpoint behind.
pub fn save_snapshot(path: &Path, store: &MemberStore) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create snapshot directory: {:?}", parent))?;
    }

    let snapshot = Snapshot::capture(store);
    let tmp_path = temp_path(path);

    {
        let file = File::create(&tmp_path)
            .with_context(|| format!("Failed to create temp snapshot: {:?}", tmp_path))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &snapshot).context("Failed to serialize snapshot")?;
        writer.flush().context("Failed to flush snapshot")?;
        writer
            .get_ref()
            .sync_all()
            .context("Failed to sync snapshot to disk")?;
    }

    fs::rename(&tmp_path, path)
        .with_context(|| format!("Failed to move snapshot into place: {:?}", path))?;

    log::info!("Saved snapshot with {} members to {:?}", snapshot.members.len(), path);
    Ok(())
}

pub fn load_snapshot(path: &Path) -> Result<Snapshot> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot: {:?}", path))?;

    let snapshot: Snapshot =
        serde_json::from_str(&content).context("Failed to parse snapshot JSON")?;

    if snapshot.format_version > SNAPSHOT_FORMAT_VERSION {
        bail!(
            "Snapshot format version {} is newer than supported version {}",
            snapshot.format_version,
            SNAPSHOT_FORMAT_VERSION
        );
    }

    Ok(snapshot)
}

fn temp_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snapshot".to_string());
    path.with_file_name(format!(".{}.tmp", file_name))
}

// ============================================================================
// RECORD FILES
// ============================================================================

/// Load records from a `.json`, `.jsonl` or `.csv` file.
///
/// Records without a `sourceId` are attributed to `default_source`.
pub fn load_records(path: &Path, default_source: &SourceType) -> Result<Vec<RawRecord>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "json" => load_json_records(path, default_source),
        "jsonl" | "ndjson" => load_jsonl_records(path, default_source),
        "csv" => load_csv_records(path, default_source),
        _ => bail!("Unsupported record file type: {:?} (expected .json, .jsonl or .csv)", path),
    }
}

fn load_json_records(path: &Path, default_source: &SourceType) -> Result<Vec<RawRecord>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read record file: {:?}", path))?;

    let values: Vec<Value> =
        serde_json::from_str(&content).context("Failed to parse records JSON (expected an array)")?;

    values
        .into_iter()
        .enumerate()
        .map(|(i, value)| {
            record_from_value(value, default_source)
                .with_context(|| format!("Invalid record #{} in {:?}", i + 1, path))
        })
        .collect()
}

fn load_jsonl_records(path: &Path, default_source: &SourceType) -> Result<Vec<RawRecord>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read record file: {:?}", path))?;

    let mut records = Vec::new();
    for (line_number, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(line)
            .with_context(|| format!("Invalid JSON on line {} of {:?}", line_number + 1, path))?;
        let record = record_from_value(value, default_source)
            .with_context(|| format!("Invalid record on line {} of {:?}", line_number + 1, path))?;
        records.push(record);
    }

    Ok(records)
}

fn load_csv_records(path: &Path, default_source: &SourceType) -> Result<Vec<RawRecord>> {
    let mut rdr = csv::Reader::from_path(path).context("Failed to open CSV file")?;

    let mut records = Vec::new();
    for result in rdr.deserialize() {
        let row: BTreeMap<String, String> = result.context("Failed to read CSV row")?;
        records.push(RawRecord::from_field_map(&row, default_source));
    }

    Ok(records)
}

fn record_from_value(mut value: Value, default_source: &SourceType) -> Result<RawRecord> {
    let Some(object) = value.as_object_mut() else {
        bail!("record is not a JSON object");
    };

    let has_source = object
        .get("sourceId")
        .and_then(Value::as_str)
        .is_some_and(|s| !s.trim().is_empty());
    if !has_source {
        object.insert(
            "sourceId".to_string(),
            Value::String(default_source.code().to_string()),
        );
    }

    serde_json::from_value(value).context("Failed to deserialize record")
}

// ============================================================================
// CSV EXPORT
// ============================================================================

const EXPORT_HEADERS: [&str; 15] = [
    "id",
    "name",
    "normalizedName",
    "county",
    "constituency",
    "party",
    "status",
    "gender",
    "email",
    "phone",
    "leadershipTitle",
    "committees",
    "career",
    "dataSources",
    "biography",
];

/// Flat export, one row per member; list fields joined with "; "
pub fn export_csv(path: &Path, members: &[Member]) -> Result<usize> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV file: {:?}", path))?;

    wtr.write_record(EXPORT_HEADERS)?;

    for member in members {
        let sources: Vec<&str> = member.data_sources().iter().map(|s| s.code()).collect();
        wtr.write_record([
            member.id.as_str(),
            member.name(),
            member.normalized_name(),
            member.county.as_deref().unwrap_or_default(),
            member.constituency.as_deref().unwrap_or_default(),
            member.party.as_deref().unwrap_or_default(),
            member.status.as_str(),
            member.gender.as_str(),
            member.email.display(),
            member.phone.display(),
            member.leadership_title.as_deref().unwrap_or_default(),
            member.committees.join("; ").as_str(),
            member.career.join("; ").as_str(),
            sources.join("; ").as_str(),
            member.biography.as_deref().unwrap_or_default(),
        ])?;
    }

    wtr.flush().context("Failed to flush CSV export")?;
    Ok(members.len())
}

// ============================================================================
// TESTS
// ============================================================================
