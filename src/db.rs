// 📜 Audit Log - Every match/merge decision is an event
// SQLite + WAL, append-only `events` table

use crate::matching::MatchTier;
use crate::reconcile::MergeDecision;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const ENTITY_TYPE_MEMBER: &str = "member";

/// Event for audit trail
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }

    /// One event per journal entry; the source is the actor
    pub fn from_decision(decision: &MergeDecision) -> Self {
        let data = serde_json::json!({
            "fingerprint": decision.fingerprint,
            "tier": decision.tier.as_str(),
            "score": decision.score,
            "conflicts": decision.conflicts,
        });

        let mut event = Event::new(
            event_type_for(decision.tier),
            ENTITY_TYPE_MEMBER,
            &decision.member_id,
            data,
            decision.source.code(),
        );
        event.timestamp = decision.timestamp;
        event
    }
}

pub fn event_type_for(tier: MatchTier) -> &'static str {
    match tier {
        MatchTier::None => "member_created",
        MatchTier::ExactName => "matched_exact_name",
        MatchTier::Region => "matched_region",
        MatchTier::PartialName => "matched_partial_name",
    }
}

/// Open (or create) an audit database file and make sure the schema exists
pub fn open_audit_log(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open audit database: {:?}", path))?;
    setup_database(&conn)?;
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_type ON events(event_type)",
        [],
    )?;

    Ok(())
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Insert a batch in one transaction. Already-stored event ids are skipped;
/// returns how many rows were new.
pub fn insert_events(conn: &mut Connection, events: &[Event]) -> Result<usize> {
    let tx = conn.transaction().context("Failed to begin audit transaction")?;
    let mut inserted = 0;

    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO events (
                event_id, timestamp, event_type, entity_type, entity_id, data, actor
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;

        for event in events {
            let data_json = serde_json::to_string(&event.data)?;
            inserted += stmt.execute(params![
                event.event_id,
                event.timestamp.to_rfc3339(),
                event.event_type,
                event.entity_type,
                event.entity_id,
                data_json,
                event.actor,
            ])?;
        }
    }

    tx.commit().context("Failed to commit audit events")?;
    Ok(inserted)
}

/// Get events for a specific entity, oldest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp ASC, id ASC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            1,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?
                    .with_timezone(&Utc),
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        5,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?,
                actor: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

/// Event counts grouped by type, sorted by type
pub fn count_events_by_type(conn: &Connection) -> Result<Vec<(String, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT event_type, COUNT(*) FROM events GROUP BY event_type ORDER BY event_type",
    )?;

    let counts: Vec<(String, i64)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::FieldConflict;
    use crate::record::SourceType;

    fn decision(member_id: &str, tier: MatchTier, source: SourceType) -> MergeDecision {
        MergeDecision {
            fingerprint: format!("fp-{}-{}", member_id, tier.as_str()),
            source,
            member_id: member_id.to_string(),
            tier,
            score: 0,
            conflicts: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_event_from_decision() {
        let mut d = decision("m-1", MatchTier::Region, SourceType::Scorecard);
        d.conflicts.push(FieldConflict {
            field: "party".to_string(),
            kept: "UDA".to_string(),
            discarded: "ODM".to_string(),
            source: SourceType::Scorecard,
        });

        let event = Event::from_decision(&d);
        assert_eq!(event.event_type, "matched_region");
        assert_eq!(event.entity_type, ENTITY_TYPE_MEMBER);
        assert_eq!(event.entity_id, "m-1");
        assert_eq!(event.actor, "scorecard");
        assert_eq!(event.timestamp, d.timestamp);
        assert_eq!(event.data["conflicts"][0]["discarded"], "ODM");

        assert_eq!(event_type_for(MatchTier::None), "member_created");
        assert_eq!(event_type_for(MatchTier::PartialName), "matched_partial_name");
    }

    #[test]
    fn test_events_round_trip() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let created = Event::from_decision(&decision("m-1", MatchTier::None, SourceType::Parliament));
        let merged =
            Event::from_decision(&decision("m-1", MatchTier::ExactName, SourceType::Wikipedia));
        insert_event(&conn, &created).unwrap();
        insert_event(&conn, &merged).unwrap();

        let events = get_events_for_entity(&conn, ENTITY_TYPE_MEMBER, "m-1").unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_id, created.event_id);
        assert_eq!(events[0].data, created.data);
        assert_eq!(events[1].event_type, "matched_exact_name");
        assert_eq!(events[1].timestamp.timestamp_millis(), merged.timestamp.timestamp_millis());

        assert!(get_events_for_entity(&conn, ENTITY_TYPE_MEMBER, "m-2").unwrap().is_empty());
    }

    #[test]
    fn test_insert_events_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let events: Vec<Event> = vec![
            decision("m-1", MatchTier::None, SourceType::Parliament),
            decision("m-2", MatchTier::None, SourceType::Parliament),
            decision("m-1", MatchTier::PartialName, SourceType::Scorecard),
        ]
        .iter()
        .map(Event::from_decision)
        .collect();

        assert_eq!(insert_events(&mut conn, &events).unwrap(), 3);
        assert_eq!(insert_events(&mut conn, &events).unwrap(), 0);

        let counts = count_events_by_type(&conn).unwrap();
        assert_eq!(
            counts,
            vec![
                ("matched_partial_name".to_string(), 1),
                ("member_created".to_string(), 2),
            ]
        );
    }

    #[test]
    fn test_open_audit_log_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.db");

        {
            let conn = open_audit_log(&path).unwrap();
            insert_event(
                &conn,
                &Event::new("member_created", ENTITY_TYPE_MEMBER, "m-1", serde_json::json!({}), "test"),
            )
            .unwrap();
        }

        let conn = open_audit_log(&path).unwrap();
        assert_eq!(count_events_by_type(&conn).unwrap(), vec![("member_created".to_string(), 1)]);
    }
}
