//! Facebook event email classifier.
//!
//! Binary decision over sender/subject/body heuristics. False positives
//! and negatives are expected; bad imports are resolved by an admin
//! rejecting the pending event, not by this component.

use regex::RegexSet;

use crate::mail::IncomingMessage;

/// Mail domains Facebook sends event notifications from.
const FACEBOOK_DOMAINS: &[&str] = &[
    "facebook.com",
    "facebookmail.com",
    "notification.facebook.com",
];

/// Subject line patterns marking event notifications.
const SUBJECT_PATTERNS: &[&str] = &[
    r"invited you to",
    r"Reminder:.*is (today|tomorrow|in \d+ days?)",
    r"You created an event:",
    r"event has been updated",
    r"Event starting soon:",
    r"going to.*event",
];

/// Body phrases indicating event content.
const BODY_INDICATORS: &[&str] = &[
    "facebook.com/events/",
    "view event",
    "going:",
    "maybe:",
    "interested:",
    "location:",
    "hosted by",
];

/// Heuristic classifier for Facebook event notification emails.
pub struct Classifier {
    subject_patterns: RegexSet,
}

impl Classifier {
    /// Creates a classifier with all patterns pre-compiled.
    pub fn new() -> Self {
        let subject_patterns =
            RegexSet::new(SUBJECT_PATTERNS).expect("built-in subject patterns must compile");
        Self { subject_patterns }
    }

    /// Returns true when the message looks like a Facebook event email.
    ///
    /// The sender must be from a Facebook mail domain, and either the
    /// subject matches an event pattern or the body carries an event
    /// indicator phrase.
    pub fn is_event_email(&self, message: &IncomingMessage) -> bool {
        if !self.is_from_facebook(message) {
            return false;
        }

        self.has_event_subject(&message.subject) || self.has_event_body(&message.body)
    }

    fn is_from_facebook(&self, message: &IncomingMessage) -> bool {
        let domain = message.sender_domain().to_ascii_lowercase();
        FACEBOOK_DOMAINS
            .iter()
            .any(|d| domain == *d || domain.ends_with(&format!(".{}", d)))
    }

    fn has_event_subject(&self, subject: &str) -> bool {
        self.subject_patterns.is_match(subject)
    }

    fn has_event_body(&self, body: &str) -> bool {
        let body = body.to_ascii_lowercase();
        BODY_INDICATORS.iter().any(|ind| body.contains(ind))
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}
