//! Operator status surface.
//!
//! Gathers what an admin screen or `evmail status` shows: the newest
//! processing-log lines, recently imported events and counters, plus
//! setup instructions when email import is not configured yet.

use crate::config::Config;
use crate::db::{self, Database, EventRow, IngestStats};
use crate::mail;
use crate::pipeline::PipelineError;
use crate::proclog::{ProcessingLog, DEFAULT_TAIL_LINES};

/// Events listed on the status surface.
const RECENT_EVENT_LIMIT: u32 = 20;

#[derive(Debug)]
pub struct StatusReport {
    /// Newest processing-log lines, newest first.
    pub log_lines: Vec<String>,
    /// Most recently imported email events, newest first.
    pub recent_events: Vec<EventRow>,
    pub stats: IngestStats,
    /// Present when no imap section is configured.
    pub setup_instructions: Option<String>,
}

/// Collects the status report for the current configuration.
pub fn gather(config: &Config) -> Result<StatusReport, PipelineError> {
    let db_path = config
        .database_path()
        .ok_or(PipelineError::NoHomeDirectory)?;
    let log_path = config.log_path().ok_or(PipelineError::NoHomeDirectory)?;

    let database = Database::open(&db_path)?;
    let plog = ProcessingLog::new(log_path, &config.log);

    Ok(StatusReport {
        log_lines: plog.tail(DEFAULT_TAIL_LINES)?,
        recent_events: db::find_recent_email_events(&database, RECENT_EVENT_LIMIT)?,
        stats: db::ingest_stats(&database)?,
        setup_instructions: config.imap.is_none().then(mail::setup_instructions),
    })
}

impl StatusReport {
    /// Plain-text rendering for the CLI.
    pub fn render(&self) -> String {
        let mut out = String::new();

        if let Some(instructions) = &self.setup_instructions {
            out.push_str(instructions);
            out.push('\n');
        }

        out.push_str(&format!(
            "Events: {} total, {} from email, {} pending review (last 30 days)\n",
            self.stats.total_events, self.stats.email_events, self.stats.pending_email_events
        ));

        out.push_str("\nRecent email events:\n");
        if self.recent_events.is_empty() {
            out.push_str("  (none)\n");
        }
        for event in &self.recent_events {
            out.push_str(&format!(
                "  [{}] {} - {} ({})\n",
                event.status.as_str(),
                event.title,
                event.start_datetime.as_deref().unwrap_or("date TBD"),
                event.created_at
            ));
        }

        out.push_str("\nProcessing log:\n");
        if self.log_lines.is_empty() {
            out.push_str("  (empty)\n");
        }
        for line in &self.log_lines {
            out.push_str("  ");
            out.push_str(line);
            out.push('\n');
        }

        out
    }
}
