//! Persists extracted event drafts as pending events.
//!
//! Deduplication keys on a deterministic external id derived from the
//! email itself, so re-processing the same message (replayed fetches,
//! overlapping batches, an operator re-running a failed import) can never
//! create a duplicate row.

use sha2::{Digest, Sha256};

use crate::db::{self, Database, DatabaseError, NewEvent, EMAIL_EVENT_PREFIX};
use crate::extract::EventDraft;
use crate::mail::IncomingMessage;

const SQLITE_DATETIME: &str = "%Y-%m-%d %H:%M:%S";

/// Result of one write attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// A new pending event row was created.
    Created(i64),
    /// An event with the same external id already exists; nothing written.
    Skipped,
}

/// Deterministic external event id for an email.
///
/// Hashes sender, subject and the Date header truncated to the minute,
/// so the same email always maps to the same id while distinct
/// notifications about the same event title still get distinct ids.
/// Messages without a Date header hash on sender and subject alone; the
/// fetch time varies per run and would mint a fresh id on every cycle.
pub fn external_event_id(message: &IncomingMessage) -> String {
    let mut hasher = Sha256::new();
    hasher.update(message.sender.as_bytes());
    hasher.update(b"|");
    hasher.update(message.subject.as_bytes());
    hasher.update(b"|");
    if let Some(date) = message.date {
        hasher.update(date.format("%Y-%m-%dT%H:%M").to_string().as_bytes());
    }

    let digest = hasher.finalize();
    let mut id = String::with_capacity(EMAIL_EVENT_PREFIX.len() + 32);
    id.push_str(EMAIL_EVENT_PREFIX);
    for byte in &digest[..16] {
        id.push_str(&format!("{byte:02x}"));
    }
    id
}

/// Writes a draft as a pending event, skipping if the email was already
/// imported. Imported events always await admin review regardless of how
/// complete the draft is.
pub fn write_event(
    database: &Database,
    draft: &EventDraft,
    message: &IncomingMessage,
) -> Result<WriteOutcome, DatabaseError> {
    let external_id = external_event_id(message);

    let description = compose_description(draft);

    let event = NewEvent {
        title: draft.title.clone(),
        description,
        start_datetime: draft
            .start
            .map(|dt| dt.format(SQLITE_DATETIME).to_string()),
        end_datetime: draft.end.map(|dt| dt.format(SQLITE_DATETIME).to_string()),
        location: draft.location.clone(),
        external_url: draft.event_url.clone(),
        external_event_id: external_id,
    };

    match db::insert_if_absent(database, &event)? {
        Some(id) => Ok(WriteOutcome::Created(id)),
        None => Ok(WriteOutcome::Skipped),
    }
}

/// Folds host and attendance into the stored description so the review
/// screen shows everything the email carried.
fn compose_description(draft: &EventDraft) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();

    if let Some(description) = &draft.description {
        parts.push(description.clone());
    }
    if let Some(host) = &draft.host {
        parts.push(format!("Hosted by {host}"));
    }
    match (draft.attendees_going, draft.attendees_maybe) {
        (Some(going), Some(maybe)) => {
            parts.push(format!("{going} going, {maybe} maybe"));
        }
        (Some(going), None) => parts.push(format!("{going} going")),
        (None, Some(maybe)) => parts.push(format!("{maybe} maybe")),
        (None, None) => {}
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::EventStatus;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn message() -> IncomingMessage {
        IncomingMessage {
            uid: 7,
            sender: "notification@facebookmail.com".to_string(),
            subject: "John Doe invited you to Summer Music Festival".to_string(),
            body: String::new(),
            date: Some(Utc.with_ymd_and_hms(2024, 7, 8, 10, 30, 45).unwrap()),
            fetched_at: Utc.with_ymd_and_hms(2024, 7, 8, 10, 31, 0).unwrap(),
        }
    }

    fn draft() -> EventDraft {
        EventDraft {
            title: "Summer Music Festival".to_string(),
            start: NaiveDate::from_ymd_opt(2024, 7, 15)
                .unwrap()
                .and_hms_opt(18, 0, 0),
            location: Some("Yakima Valley Park".to_string()),
            description: Some("Live music all evening.".to_string()),
            event_url: Some("https://facebook.com/events/123".to_string()),
            host: Some("Yakima Music Collective".to_string()),
            attendees_going: Some(48),
            attendees_maybe: Some(112),
            ..Default::default()
        }
    }

    #[test]
    fn test_external_id_is_deterministic() {
        let a = external_event_id(&message());
        let b = external_event_id(&message());
        assert_eq!(a, b);
        assert!(a.starts_with(EMAIL_EVENT_PREFIX));
        assert_eq!(a.len(), EMAIL_EVENT_PREFIX.len() + 32);
    }

    #[test]
    fn test_external_id_ignores_seconds() {
        let mut later = message();
        later.date = Some(Utc.with_ymd_and_hms(2024, 7, 8, 10, 30, 59).unwrap());
        assert_eq!(external_event_id(&message()), external_event_id(&later));
    }

    #[test]
    fn test_external_id_stable_without_date_header() {
        // No Date header: the fetch time must not leak into the id, or a
        // kept-unread message would be re-imported on every run.
        let mut m = message();
        m.date = None;
        let first = external_event_id(&m);

        m.fetched_at = Utc.with_ymd_and_hms(2024, 7, 9, 14, 0, 0).unwrap();
        assert_eq!(first, external_event_id(&m));
    }

    #[test]
    fn test_external_id_differs_across_emails() {
        let mut other = message();
        other.subject = "Reminder: Summer Music Festival is tomorrow".to_string();
        assert_ne!(external_event_id(&message()), external_event_id(&other));
    }

    #[test]
    fn test_write_creates_pending_event() {
        let database = Database::open_in_memory().unwrap();
        let outcome = write_event(&database, &draft(), &message()).unwrap();

        let id = match outcome {
            WriteOutcome::Created(id) => id,
            WriteOutcome::Skipped => panic!("expected a created row"),
        };
        assert!(id > 0);

        let row = db::find_by_external_id(&database, &external_event_id(&message()))
            .unwrap()
            .unwrap();
        assert_eq!(row.title, "Summer Music Festival");
        assert_eq!(row.status, EventStatus::Pending);
        assert_eq!(row.start_datetime.as_deref(), Some("2024-07-15 18:00:00"));
        assert_eq!(row.location.as_deref(), Some("Yakima Valley Park"));
    }

    #[test]
    fn test_replay_is_skipped() {
        let database = Database::open_in_memory().unwrap();
        assert!(matches!(
            write_event(&database, &draft(), &message()).unwrap(),
            WriteOutcome::Created(_)
        ));
        assert_eq!(
            write_event(&database, &draft(), &message()).unwrap(),
            WriteOutcome::Skipped
        );
    }

    #[test]
    fn test_title_only_draft_is_written() {
        let database = Database::open_in_memory().unwrap();
        let bare = EventDraft {
            title: "Mystery Meetup".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            write_event(&database, &bare, &message()).unwrap(),
            WriteOutcome::Created(_)
        ));

        let row = db::find_by_external_id(&database, &external_event_id(&message()))
            .unwrap()
            .unwrap();
        assert!(row.start_datetime.is_none());
    }

    #[test]
    fn test_description_folds_host_and_attendance() {
        let composed = compose_description(&draft()).unwrap();
        assert!(composed.contains("Live music all evening."));
        assert!(composed.contains("Hosted by Yakima Music Collective"));
        assert!(composed.contains("48 going, 112 maybe"));
    }
}
