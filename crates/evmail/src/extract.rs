//! Event field extraction from Facebook notification emails.
//!
//! Pattern matching over unstructured text, not a parser with a formal
//! grammar. Every field is best-effort; the title is the only anchor the
//! rest of the pipeline requires. A draft with gaps still proceeds, since
//! imported events stay pending until an admin reviews them.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

use crate::mail::IncomingMessage;

/// Best-effort event draft pulled out of one email.
#[derive(Debug, Clone, Default)]
pub struct EventDraft {
    /// Event title. The only required field.
    pub title: String,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub event_url: Option<String>,
    pub host: Option<String>,
    pub attendees_going: Option<u32>,
    pub attendees_maybe: Option<u32>,
}

/// Extractor with all text patterns pre-compiled.
pub struct Extractor {
    subject_invited: Regex,
    subject_reminder: Regex,
    subject_created: Regex,
    date: Regex,
    location_label: Regex,
    description_section: Regex,
    going_count: Regex,
    maybe_count: Regex,
    event_url: Regex,
    hosted_by: Regex,
}

impl Extractor {
    pub fn new() -> Self {
        Self {
            subject_invited: Regex::new(r"invited you to (.+)").expect("built-in pattern"),
            subject_reminder: Regex::new(r"Reminder: (.+) is").expect("built-in pattern"),
            subject_created: Regex::new(r"You created an event: (.+)").expect("built-in pattern"),
            // "Saturday, July 15, 2024 at 6:00 PM"; year optional in
            // reminder emails.
            date: Regex::new(
                r"[A-Z][a-z]+, (?P<month>[A-Z][a-z]+) (?P<day>\d{1,2})(?:, (?P<year>\d{4}))? at (?P<hour>\d{1,2}):(?P<minute>\d{2}) (?P<ampm>[AP]M)",
            )
            .expect("built-in pattern"),
            location_label: Regex::new(r"(?im)^\s*Location:[ \t]*(.+?)\s*$").expect("built-in pattern"),
            description_section: Regex::new(
                r"(?s)Description:\s*(.+?)(?:\n\s*Going:|\n\s*Maybe:|\n\s*View Event|\n\s*Location:|\z)",
            )
            .expect("built-in pattern"),
            going_count: Regex::new(r"(?i)Going:\s*(\d+)\s*people?").expect("built-in pattern"),
            maybe_count: Regex::new(r"(?i)Maybe:\s*(\d+)\s*people?").expect("built-in pattern"),
            event_url: Regex::new(r"https://(?:www\.)?facebook\.com/events/\d+").expect("built-in pattern"),
            hosted_by: Regex::new(r"(?im)^\s*Hosted by[ \t]+(.+?)\s*$").expect("built-in pattern"),
        }
    }

    /// Extracts an event draft, or `None` when no title-like line can be
    /// located. A missing title is the only extraction miss; every other
    /// gap degrades to `None` fields.
    pub fn extract(&self, message: &IncomingMessage) -> Option<EventDraft> {
        if let Some(caps) = self.subject_invited.captures(&message.subject) {
            return Some(self.extract_invitation(message, caps[1].trim()));
        }

        if let Some(caps) = self.subject_reminder.captures(&message.subject) {
            return Some(self.extract_reminder(message, caps[1].trim()));
        }

        if let Some(caps) = self.subject_created.captures(&message.subject) {
            // Creation emails share the invitation layout.
            return Some(self.extract_invitation(message, caps[1].trim()));
        }

        self.extract_generic(message)
    }

    /// Invitation/creation emails: labeled sections in the body.
    fn extract_invitation(&self, message: &IncomingMessage, title: &str) -> EventDraft {
        let body = &message.body;

        EventDraft {
            title: title.to_string(),
            start: self.parse_date(body, message),
            location: self
                .location_label
                .captures(body)
                .map(|c| c[1].trim().to_string()),
            description: self
                .description_section
                .captures(body)
                .map(|c| c[1].trim().to_string())
                .filter(|s| !s.is_empty()),
            event_url: self.find_event_url(body),
            host: self.hosted_by.captures(body).map(|c| c[1].trim().to_string()),
            attendees_going: self.parse_count(&self.going_count, body),
            attendees_maybe: self.parse_count(&self.maybe_count, body),
            ..Default::default()
        }
    }

    /// Reminder emails: no labels; the location is usually the first
    /// non-empty line after the date line.
    fn extract_reminder(&self, message: &IncomingMessage, title: &str) -> EventDraft {
        let body = &message.body;

        EventDraft {
            title: title.to_string(),
            start: self.parse_date(body, message),
            location: self.location_after_date_line(body),
            event_url: self.find_event_url(body),
            ..Default::default()
        }
    }

    /// Generic fallback: first line longer than five characters is the
    /// title. No title means no draft.
    fn extract_generic(&self, message: &IncomingMessage) -> Option<EventDraft> {
        let title = message
            .body
            .lines()
            .map(str::trim)
            .find(|line| line.chars().count() > 5)?
            .to_string();

        Some(EventDraft {
            title,
            start: self.parse_date(&message.body, message),
            event_url: self.find_event_url(&message.body),
            ..Default::default()
        })
    }

    /// Parses the first textual date in the body. The weekday is ignored:
    /// notification emails routinely disagree with the calendar and a
    /// wrong weekday should not discard an otherwise usable date.
    fn parse_date(&self, body: &str, message: &IncomingMessage) -> Option<NaiveDateTime> {
        let caps = self.date.captures(body)?;

        let month = month_number(&caps["month"])?;
        let day: u32 = caps["day"].parse().ok()?;
        let hour12: u32 = caps["hour"].parse().ok()?;
        let minute: u32 = caps["minute"].parse().ok()?;
        if !(1..=12).contains(&hour12) {
            return None;
        }

        let hour = match (&caps["ampm"], hour12) {
            ("PM", h) if h != 12 => h + 12,
            ("AM", 12) => 0,
            (_, h) => h,
        };

        let received = message.received_at().date_naive();
        let date = match caps.name("year") {
            Some(y) => NaiveDate::from_ymd_opt(y.as_str().parse().ok()?, month, day)?,
            None => {
                // Reminders omit the year. Assume the received year, and
                // roll forward across New Year (a December reminder for a
                // January event).
                let candidate = NaiveDate::from_ymd_opt(received.year(), month, day)?;
                if candidate + Duration::days(1) < received {
                    NaiveDate::from_ymd_opt(received.year() + 1, month, day)?
                } else {
                    candidate
                }
            }
        };

        Some(date.and_time(NaiveTime::from_hms_opt(hour, minute, 0)?))
    }

    fn location_after_date_line(&self, body: &str) -> Option<String> {
        let lines: Vec<&str> = body.lines().collect();
        let date_line = lines.iter().position(|line| self.date.is_match(line))?;

        lines[date_line + 1..]
            .iter()
            .map(|line| line.trim())
            .find(|line| !line.is_empty())
            .map(|line| line.to_string())
    }

    fn find_event_url(&self, body: &str) -> Option<String> {
        self.event_url.find(body).map(|m| m.as_str().to_string())
    }

    fn parse_count(&self, pattern: &Regex, body: &str) -> Option<u32> {
        pattern.captures(body).and_then(|c| c[1].parse().ok())
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

fn month_number(name: &str) -> Option<u32> {
    let n = match name {
        "January" => 1,
        "February" => 2,
        "March" => 3,
        "April" => 4,
        "May" => 5,
        "June" => 6,
        "July" => 7,
        "August" => 8,
        "September" => 9,
        "October" => 10,
        "November" => 11,
        "December" => 12,
        _ => return None,
    };
    Some(n)
}
