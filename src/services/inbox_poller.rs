// src/services/inbox_poller.rs
//! Periodic mailbox re-check as a cancellable background task.
//!
//! A [`MailSource`] yields pending messages; the poller parses each subject
//! with the subject grammar and hands both to a [`MailHandler`]. The task
//! runs until [`PollerHandle::stop`] is awaited or the handle is dropped.

use crate::error::{ExternalServiceError, Result};
use crate::services::subject_parser::{parse_subject, ParsedSubject};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// One message pulled from a mail source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    /// Source-specific identifier (file name for the spool directory)
    pub id: String,
    pub subject: String,
}

/// Where messages come from.
#[async_trait]
pub trait MailSource: Send + Sync {
    /// Messages not yet delivered.
    async fn pending(&self) -> Result<Vec<MailMessage>>;

    /// Marks a message as delivered so it is not returned again.
    async fn acknowledge(&self, message: &MailMessage) -> Result<()>;
}

/// Receives every polled message with its parsed subject.
#[async_trait]
pub trait MailHandler: Send + Sync {
    async fn handle(&self, message: &MailMessage, subject: ParsedSubject);
}

/// Spool directory of `*.eml` files; delivered files move into `seen/`.
pub struct SpoolDirectory {
    root: PathBuf,
}

impl SpoolDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn seen_dir(&self) -> PathBuf {
        self.root.join("seen")
    }

    fn spool_error(path: &Path, source: std::io::Error) -> ExternalServiceError {
        ExternalServiceError::Spool {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Returns the unfolded `Subject` header of a raw RFC 5322 message, or `""`.
pub fn subject_header(raw: &str) -> String {
    let mut subject: Option<String> = None;
    for line in raw.lines() {
        if line.is_empty() {
            break;
        }
        match subject.as_mut() {
            Some(value) if line.starts_with(' ') || line.starts_with('\t') => {
                value.push(' ');
                value.push_str(line.trim());
            }
            Some(_) => break,
            None => {
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("subject") {
                        subject = Some(value.trim().to_string());
                    }
                }
            }
        }
    }
    subject.unwrap_or_default()
}

#[async_trait]
impl MailSource for SpoolDirectory {
    async fn pending(&self) -> Result<Vec<MailMessage>> {
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| Self::spool_error(&self.root, e))?;

        let mut messages = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Self::spool_error(&self.root, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("eml") {
                continue;
            }
            let raw = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Self::spool_error(&path, e))?;
            let id = entry.file_name().to_string_lossy().into_owned();
            messages.push(MailMessage {
                id,
                subject: subject_header(&raw),
            });
        }
        messages.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(messages)
    }

    async fn acknowledge(&self, message: &MailMessage) -> Result<()> {
        let seen = self.seen_dir();
        tokio::fs::create_dir_all(&seen)
            .await
            .map_err(|e| Self::spool_error(&seen, e))?;
        let from = self.root.join(&message.id);
        tokio::fs::rename(&from, seen.join(&message.id))
            .await
            .map_err(|e| Self::spool_error(&from, e))?;
        Ok(())
    }
}

/// Handle to a running poller.
pub struct PollerHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Signals the poller and waits for the in-flight round to finish.
    pub async fn stop(self) -> Result<()> {
        // the receiver only disappears once the task has already exited
        let _ = self.stop.send(true);
        self.task.await?;
        Ok(())
    }
}

pub struct InboxPoller;

impl InboxPoller {
    /// Starts polling `source` every `interval`; the first round runs immediately.
    ///
    /// A failing round is logged and retried on the next tick.
    pub fn start(
        source: Arc<dyn MailSource>,
        interval: Duration,
        handler: Arc<dyn MailHandler>,
    ) -> PollerHandle {
        let (stop, mut stopped) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            info!("Inbox poller started ({:?} interval)", interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = poll_once(source.as_ref(), handler.as_ref()).await {
                            warn!("Inbox poll failed: {}", e);
                        }
                    }
                    changed = stopped.changed() => {
                        if changed.is_err() || *stopped.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("Inbox poller stopped");
        });
        PollerHandle { stop, task }
    }
}

/// Runs one polling round, returning how many messages were delivered.
pub async fn poll_once(source: &dyn MailSource, handler: &dyn MailHandler) -> Result<usize> {
    let messages = source.pending().await?;
    for message in &messages {
        let parsed = parse_subject(&message.subject);
        debug!("Message {} carries {} subject fields", message.id, parsed.len());
        handler.handle(message, parsed).await;
        source.acknowledge(message).await?;
    }
    Ok(messages.len())
}
