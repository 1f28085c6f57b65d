//! The ingestion run: fetch, classify, extract, write, confirm.

use crate::classifier::Classifier;
use crate::config::{Config, ProcessingConfig};
use crate::db::Database;
use crate::extract::Extractor;
use crate::mail::{ImapClient, IncomingMessage};
use crate::notifier::Notifier;
use crate::proclog::ProcessingLog;
use crate::writer::{self, WriteOutcome};

use super::{PipelineError, RunLock};

/// Counters for one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Unread messages fetched from the mailbox.
    pub fetched: usize,
    /// Messages classified as Facebook event emails.
    pub matched: usize,
    /// New pending events created.
    pub created: usize,
    /// Matched emails that were already imported or carried no
    /// extractable title.
    pub skipped: usize,
    /// Messages that failed to parse, or whose write failed.
    pub errors: usize,
}

impl RunReport {
    pub fn summary(&self) -> String {
        format!(
            "Run complete: {} fetched, {} matched, {} created, {} skipped, {} errors",
            self.fetched, self.matched, self.created, self.skipped, self.errors
        )
    }
}

/// Mailbox disposition for fetched messages once the batch is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PostAction {
    MarkSeen,
    Delete,
}

/// `delete_processed` wins over `mark_as_read`. With both off the
/// mailbox is left untouched and the same messages come back on the
/// next run, relying on the external event id to skip them.
fn post_action(processing: &ProcessingConfig) -> Option<PostAction> {
    if processing.delete_processed {
        Some(PostAction::Delete)
    } else if processing.mark_as_read {
        Some(PostAction::MarkSeen)
    } else {
        None
    }
}

/// One-shot email import pipeline, driven by cron or a manual trigger.
pub struct IngestPipeline {
    config: Config,
    plog: ProcessingLog,
    classifier: Classifier,
    extractor: Extractor,
}

impl IngestPipeline {
    /// Binds the pipeline to the configured processing log. The database
    /// and the mailbox are opened per run, so their failures land in the
    /// log like any other run failure.
    pub fn new(config: Config) -> Result<Self, PipelineError> {
        let log_path = config.log_path().ok_or(PipelineError::NoHomeDirectory)?;
        let plog = ProcessingLog::new(log_path, &config.log);

        Ok(Self {
            config,
            plog,
            classifier: Classifier::new(),
            extractor: Extractor::new(),
        })
    }

    pub fn processing_log(&self) -> &ProcessingLog {
        &self.plog
    }

    /// Runs one import. Per-message failures are counted and logged but
    /// do not abort the batch; a run-level failure leaves exactly one
    /// error line in the processing log.
    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        let result = self.run_guarded().await;

        match &result {
            Ok(report) => {
                if let Err(e) = self.plog.append(&report.summary()) {
                    log::error!("Failed to write processing log: {e}");
                }
            }
            Err(e) => {
                if let Err(log_err) = self.plog.append(&format!("Run failed: {e}")) {
                    log::error!("Failed to write processing log: {log_err}");
                }
            }
        }

        result
    }

    async fn run_guarded(&self) -> Result<RunReport, PipelineError> {
        let lock_path = self.config.lock_path().ok_or(PipelineError::NoHomeDirectory)?;
        let _lock = RunLock::acquire(&lock_path)?;
        self.run_locked().await
    }

    async fn run_locked(&self) -> Result<RunReport, PipelineError> {
        let imap = crate::mail::require_configured(self.config.imap.as_ref())?;

        let db_path = self
            .config
            .database_path()
            .ok_or(PipelineError::NoHomeDirectory)?;
        let database = Database::open(&db_path)?;

        let notifier = Notifier::from_config(&self.config.smtp, &self.config.confirmation)?;

        let mut client = ImapClient::new(imap.clone());
        client.connect().await?;
        client.select_folder(&imap.folder).await?;

        let batch = client
            .fetch_unread_batch(self.config.processing.batch_size as usize)
            .await?;

        let mut report = RunReport {
            fetched: batch.len(),
            ..Default::default()
        };
        log::info!("Fetched {} unread message(s)", report.fetched);

        let mut processed_uids = Vec::with_capacity(batch.len());

        for (uid, raw) in &batch {
            processed_uids.push(*uid);

            let message = match IncomingMessage::parse(raw, *uid) {
                Ok(message) => message,
                Err(e) => {
                    log::warn!("Failed to parse message uid {uid}: {e}");
                    self.log_line(&format!("Error: unparseable message (uid {uid})"));
                    report.errors += 1;
                    continue;
                }
            };

            self.process_message(&database, notifier.as_ref(), &message, &mut report)
                .await;
        }

        // Fetched messages are marked processed even on per-message
        // errors, so one poison message cannot wedge every future run.
        if !processed_uids.is_empty() {
            match post_action(&self.config.processing) {
                Some(PostAction::Delete) => client.delete(&processed_uids).await?,
                Some(PostAction::MarkSeen) => client.mark_seen(&processed_uids).await?,
                None => {}
            }
        }

        client.disconnect().await?;

        log::info!("{}", report.summary());
        Ok(report)
    }

    /// Classify one parsed message, extract a draft and write it. An
    /// extraction miss is a skip, not an error: a Facebook mail without
    /// a title-like line is simply not importable.
    async fn process_message(
        &self,
        database: &Database,
        notifier: Option<&Notifier>,
        message: &IncomingMessage,
        report: &mut RunReport,
    ) {
        let uid = message.uid;

        if !self.classifier.is_event_email(message) {
            log::debug!("uid {uid} is not a Facebook event email, skipping");
            return;
        }
        report.matched += 1;

        let Some(draft) = self.extractor.extract(message) else {
            self.log_line(&format!(
                "Skipped: no event title found in '{}' (uid {uid})",
                message.subject
            ));
            report.skipped += 1;
            return;
        };

        match writer::write_event(database, &draft, message) {
            Ok(WriteOutcome::Created(id)) => {
                report.created += 1;
                self.log_line(&format!(
                    "Created pending event '{}' (id {id}) from {}",
                    draft.title, message.sender
                ));

                if let Some(notifier) = notifier {
                    if let Err(e) = notifier.send_confirmation(&message.sender, &draft).await {
                        log::warn!("Confirmation to {} failed: {e}", message.sender);
                        self.log_line(&format!(
                            "Warning: confirmation to {} failed",
                            message.sender
                        ));
                    }
                }
            }
            Ok(WriteOutcome::Skipped) => {
                report.skipped += 1;
                self.log_line(&format!(
                    "Skipped duplicate event '{}' (uid {uid})",
                    draft.title
                ));
            }
            Err(e) => {
                log::error!("Failed to write event from uid {uid}: {e}");
                self.log_line(&format!(
                    "Error: could not store event '{}' (uid {uid})",
                    draft.title
                ));
                report.errors += 1;
            }
        }
    }

    /// Processing-log writes inside the batch loop are best-effort.
    fn log_line(&self, message: &str) {
        if let Err(e) = self.plog.append(message) {
            log::error!("Failed to write processing log: {e}");
        }
    }
}
