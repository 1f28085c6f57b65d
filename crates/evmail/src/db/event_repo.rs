//! Event repository: operations on the shared `events` table.
//!
//! This subsystem only inserts pending rows and reads them back for the
//! operator surface. Approval, editing and deletion belong to the admin
//! back-office.

use rusqlite::{params, OptionalExtension};

use super::{Database, DatabaseError};

/// Prefix stamped on every event ingested from email.
pub const EMAIL_EVENT_PREFIX: &str = "facebook_email_";

/// Admin-review status of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatus {
    Pending,
    Approved,
    Rejected,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Pending => "pending",
            EventStatus::Approved => "approved",
            EventStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(EventStatus::Pending),
            "approved" => Some(EventStatus::Approved),
            "rejected" => Some(EventStatus::Rejected),
            _ => None,
        }
    }
}

/// A new event row to insert. The ingestion pipeline always sets
/// `status = pending`; this type does not even carry a status field.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub title: String,
    pub description: Option<String>,
    pub start_datetime: Option<String>,
    pub end_datetime: Option<String>,
    pub location: Option<String>,
    pub external_url: Option<String>,
    pub external_event_id: String,
}

/// An event row read back from the database.
#[derive(Debug, Clone)]
pub struct EventRow {
    pub id: i64,
    pub title: String,
    pub start_datetime: Option<String>,
    pub location: Option<String>,
    pub status: EventStatus,
    pub external_event_id: Option<String>,
    pub created_at: String,
}

/// Inserts an event if no row with the same `external_event_id` exists.
///
/// The check and the insert are a single statement (`ON CONFLICT DO
/// NOTHING` against the unique index), so two concurrent runs cannot
/// both insert. Returns the new row id, or `None` when the row already
/// existed.
pub fn insert_if_absent(db: &Database, event: &NewEvent) -> Result<Option<i64>, DatabaseError> {
    db.with_conn(|conn| {
        let inserted = conn.execute(
            "INSERT INTO events (title, description, start_datetime, end_datetime,
                                 location, external_url, external_event_id, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending')
             ON CONFLICT(external_event_id) DO NOTHING",
            params![
                event.title,
                event.description,
                event.start_datetime,
                event.end_datetime,
                event.location,
                event.external_url,
                event.external_event_id,
            ],
        )?;

        if inserted == 0 {
            return Ok(None);
        }
        Ok(Some(conn.last_insert_rowid()))
    })
}

/// Finds an event by its external id.
pub fn find_by_external_id(
    db: &Database,
    external_event_id: &str,
) -> Result<Option<EventRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT id, title, start_datetime, location, status, external_event_id, created_at
                 FROM events WHERE external_event_id = ?1",
                params![external_event_id],
                map_event_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Returns the most recent email-ingested events, newest first.
pub fn find_recent_email_events(
    db: &Database,
    limit: u32,
) -> Result<Vec<EventRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT id, title, start_datetime, location, status, external_event_id, created_at
             FROM events
             WHERE external_event_id LIKE ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(
                params![format!("{}%", EMAIL_EVENT_PREFIX), limit],
                map_event_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// 30-day ingestion counters for the operator surface.
#[derive(Debug, Clone, Default)]
pub struct IngestStats {
    pub total_events: u64,
    pub email_events: u64,
    pub pending_email_events: u64,
}

/// Counts events created in the last 30 days, split by email origin.
pub fn ingest_stats(db: &Database) -> Result<IngestStats, DatabaseError> {
    db.with_conn(|conn| {
        let stats = conn.query_row(
            "SELECT
                COUNT(*),
                COUNT(CASE WHEN external_event_id LIKE ?1 THEN 1 END),
                COUNT(CASE WHEN status = 'pending'
                            AND external_event_id LIKE ?1 THEN 1 END)
             FROM events
             WHERE created_at > datetime('now', '-30 days')",
            params![format!("{}%", EMAIL_EVENT_PREFIX)],
            |r| {
                Ok(IngestStats {
                    total_events: r.get(0)?,
                    email_events: r.get(1)?,
                    pending_email_events: r.get(2)?,
                })
            },
        )?;
        Ok(stats)
    })
}

fn map_event_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EventRow> {
    let status_raw: String = row.get(4)?;
    let status = EventStatus::parse(&status_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("unknown event status '{status_raw}'").into(),
        )
    })?;

    Ok(EventRow {
        id: row.get(0)?,
        title: row.get(1)?,
        start_datetime: row.get(2)?,
        location: row.get(3)?,
        status,
        external_event_id: row.get(5)?,
        created_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    fn sample_event(external_id: &str) -> NewEvent {
        NewEvent {
            title: "Summer Music Festival".to_string(),
            description: Some("Live music in the park".to_string()),
            start_datetime: Some("2024-07-15 18:00:00".to_string()),
            end_datetime: None,
            location: Some("Yakima Valley Park".to_string()),
            external_url: Some("https://facebook.com/events/123".to_string()),
            external_event_id: external_id.to_string(),
        }
    }

    #[test]
    fn test_insert_and_read_back() {
        let db = test_db();
        let id = insert_if_absent(&db, &sample_event("facebook_email_a1"))
            .unwrap()
            .unwrap();

        let row = find_by_external_id(&db, "facebook_email_a1")
            .unwrap()
            .unwrap();
        assert_eq!(row.id, id);
        assert_eq!(row.title, "Summer Music Festival");
        assert_eq!(row.status, EventStatus::Pending);
    }

    #[test]
    fn test_insert_if_absent_skips_duplicate() {
        let db = test_db();
        let first = insert_if_absent(&db, &sample_event("facebook_email_a1")).unwrap();
        assert!(first.is_some());

        let second = insert_if_absent(&db, &sample_event("facebook_email_a1")).unwrap();
        assert!(second.is_none());

        let count: u32 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM events", [], |r| r.get(0))?)
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_inserted_events_are_pending() {
        let db = test_db();
        insert_if_absent(&db, &sample_event("facebook_email_a1")).unwrap();
        insert_if_absent(&db, &sample_event("facebook_email_a2")).unwrap();

        let rows = find_recent_email_events(&db, 20).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.status == EventStatus::Pending));
    }

    #[test]
    fn test_recent_email_events_excludes_other_sources() {
        let db = test_db();
        insert_if_absent(&db, &sample_event("facebook_email_a1")).unwrap();
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO events (title, external_event_id) VALUES ('scraped', 'ical_99')",
                [],
            )?;
            conn.execute("INSERT INTO events (title) VALUES ('manual')", [])?;
            Ok(())
        })
        .unwrap();

        let rows = find_recent_email_events(&db, 20).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].external_event_id.as_deref(),
            Some("facebook_email_a1")
        );
    }

    #[test]
    fn test_recent_email_events_limit() {
        let db = test_db();
        for i in 0..25 {
            insert_if_absent(&db, &sample_event(&format!("facebook_email_{}", i))).unwrap();
        }
        let rows = find_recent_email_events(&db, 20).unwrap();
        assert_eq!(rows.len(), 20);
    }

    #[test]
    fn test_ingest_stats() {
        let db = test_db();
        insert_if_absent(&db, &sample_event("facebook_email_a1")).unwrap();
        insert_if_absent(&db, &sample_event("facebook_email_a2")).unwrap();
        db.with_conn(|conn| {
            conn.execute("INSERT INTO events (title) VALUES ('manual')", [])?;
            conn.execute(
                "UPDATE events SET status = 'approved'
                 WHERE external_event_id = 'facebook_email_a2'",
                [],
            )?;
            Ok(())
        })
        .unwrap();

        let stats = ingest_stats(&db).unwrap();
        assert_eq!(stats.total_events, 3);
        assert_eq!(stats.email_events, 2);
        assert_eq!(stats.pending_email_events, 1);
    }

    #[test]
    fn test_status_parse_round_trip() {
        for status in [
            EventStatus::Pending,
            EventStatus::Approved,
            EventStatus::Rejected,
        ] {
            assert_eq!(EventStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(EventStatus::parse("published"), None);
    }
}
