//! End-to-end coverage of the non-network half of the pipeline:
//! classify an email, extract a draft, write it as a pending event.

use chrono::{NaiveDate, TimeZone, Utc};
use evmail::classifier::Classifier;
use evmail::db::{self, Database, EventStatus, EMAIL_EVENT_PREFIX};
use evmail::extract::Extractor;
use evmail::mail::IncomingMessage;
use evmail::writer::{self, WriteOutcome};

fn invitation() -> IncomingMessage {
    IncomingMessage {
        uid: 42,
        sender: "notification@facebookmail.com".to_string(),
        subject: "John Doe invited you to Summer Music Festival".to_string(),
        body: "\
John Doe invited you to Summer Music Festival

Saturday, July 15, 2024 at 6:00 PM

Location: Yakima Valley Park

Description: An evening of live music from local bands.
Going: 48 people
Maybe: 112 people

View Event: https://www.facebook.com/events/1234567890

Hosted by Yakima Music Collective
"
        .to_string(),
        date: Some(Utc.with_ymd_and_hms(2024, 7, 8, 10, 30, 0).unwrap()),
        fetched_at: Utc::now(),
    }
}

#[test]
fn invitation_flows_into_a_pending_event() {
    let classifier = Classifier::new();
    let extractor = Extractor::new();
    let database = Database::open_in_memory().unwrap();

    let message = invitation();
    assert!(classifier.is_event_email(&message));

    let draft = extractor.extract(&message).unwrap();
    let outcome = writer::write_event(&database, &draft, &message).unwrap();
    assert!(matches!(outcome, WriteOutcome::Created(_)));

    let external_id = writer::external_event_id(&message);
    let row = db::find_by_external_id(&database, &external_id)
        .unwrap()
        .unwrap();

    assert_eq!(row.title, "Summer Music Festival");
    assert_eq!(row.status, EventStatus::Pending);
    assert_eq!(row.start_datetime.as_deref(), Some("2024-07-15 18:00:00"));
    assert_eq!(row.location.as_deref(), Some("Yakima Valley Park"));
    assert!(row
        .external_event_id
        .as_deref()
        .unwrap()
        .starts_with(EMAIL_EVENT_PREFIX));
}

#[test]
fn replaying_the_same_email_never_duplicates() {
    let extractor = Extractor::new();
    let database = Database::open_in_memory().unwrap();
    let message = invitation();
    let draft = extractor.extract(&message).unwrap();

    assert!(matches!(
        writer::write_event(&database, &draft, &message).unwrap(),
        WriteOutcome::Created(_)
    ));
    for _ in 0..3 {
        assert_eq!(
            writer::write_event(&database, &draft, &message).unwrap(),
            WriteOutcome::Skipped
        );
    }

    let stats = db::ingest_stats(&database).unwrap();
    assert_eq!(stats.total_events, 1);
    assert_eq!(stats.email_events, 1);
}

#[test]
fn non_facebook_mail_is_rejected_before_extraction() {
    let classifier = Classifier::new();
    let mut message = invitation();
    message.sender = "newsletter@example.com".to_string();
    assert!(!classifier.is_event_email(&message));
}

#[test]
fn event_mail_without_a_title_produces_no_row() {
    let classifier = Classifier::new();
    let extractor = Extractor::new();

    let message = IncomingMessage {
        uid: 7,
        sender: "events@facebookmail.com".to_string(),
        subject: "John invited you to".to_string(),
        body: "hi\nok\n".to_string(),
        date: Some(Utc::now()),
        fetched_at: Utc::now(),
    };

    // The subject pattern matches, so the classifier accepts it.
    assert!(classifier.is_event_email(&message));
    // But nothing follows "invited you to" and no body line qualifies
    // as a title, so no draft and no row.
    assert!(extractor.extract(&message).is_none());
}

#[test]
fn sparse_reminder_still_creates_a_pending_event() {
    let extractor = Extractor::new();
    let database = Database::open_in_memory().unwrap();

    let message = IncomingMessage {
        uid: 8,
        sender: "notification@facebookmail.com".to_string(),
        subject: "Reminder: Farmers Market is tomorrow".to_string(),
        body: "Friday, July 12 at 9:00 AM\nDowntown Plaza\n".to_string(),
        date: Some(Utc.with_ymd_and_hms(2024, 7, 11, 8, 0, 0).unwrap()),
        fetched_at: Utc::now(),
    };

    let draft = extractor.extract(&message).unwrap();
    assert_eq!(draft.title, "Farmers Market");
    assert_eq!(
        draft.start.unwrap().date(),
        NaiveDate::from_ymd_opt(2024, 7, 12).unwrap()
    );

    assert!(matches!(
        writer::write_event(&database, &draft, &message).unwrap(),
        WriteOutcome::Created(_)
    ));
}

#[test]
fn distinct_notifications_about_one_event_get_distinct_ids() {
    let invitation_msg = invitation();
    let mut reminder_msg = invitation();
    reminder_msg.subject = "Reminder: Summer Music Festival is tomorrow".to_string();

    assert_ne!(
        writer::external_event_id(&invitation_msg),
        writer::external_event_id(&reminder_msg)
    );
}
