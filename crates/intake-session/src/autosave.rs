//! Autosave orchestrator
//!
//! One worker task per open session owns the draft, the navigator and three
//! independent deadlines:
//! - idle: quiet period after the last input
//! - commit: short debounce after a blur
//! - completion: snapshot write after a successful commit
//!
//! Handles talk to the worker over a command channel, so edits, timer
//! expiries and remote changes are applied one at a time.

use crate::config::SessionConfig;
use crate::draft::Draft;
use crate::error::{SessionError, SessionResult};
use crate::navigator::StepNavigator;
use crate::revert::{plan_revert, RevertTarget};
use crate::session::{SessionEvent, SessionView};
use chrono::{DateTime, Utc};
use intake_record::{
    compute_quality_with, CompletionSnapshot, FieldRegistry, FieldSlot, RecordId, Sale, Section,
    Status, Step,
};
use intake_store::{Change, Store, StorePath, Subscription, UpdateBatch};
use serde_json::Value;
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::Instant;

/// Reply channel for commands that report completion
pub(crate) type Reply = oneshot::Sender<SessionResult<()>>;

/// Messages from handles to the worker
#[derive(Debug)]
pub(crate) enum Command {
    /// Field edit
    Input { slot: FieldSlot, value: Value },
    /// Focus left a field
    Blur,
    /// Manual step change
    Navigate(Step),
    /// Commit now and write any pending snapshot
    Flush(Reply),
    /// Commit now after a failure
    Retry(Reply),
    /// Apply a confirmed revert
    Revert(RevertTarget, Reply),
    /// Flush, then stop
    Dispose(Reply),
}

pub(crate) struct Autosave {
    store: Arc<dyn Store>,
    config: SessionConfig,
    registry: Arc<FieldRegistry>,
    guests: StorePath,
    queue: StorePath,
    draft: Draft,
    navigator: StepNavigator,
    /// Queue entry still waiting for its `guestId`
    pending_link: Option<String>,
    subscription: Option<Subscription>,
    idle_at: Option<Instant>,
    commit_at: Option<Instant>,
    completion_at: Option<Instant>,
    last_error: Option<String>,
    events: broadcast::Sender<SessionEvent>,
    view: watch::Sender<SessionView>,
}

impl Autosave {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        store: Arc<dyn Store>,
        config: SessionConfig,
        registry: Arc<FieldRegistry>,
        guests: StorePath,
        queue: StorePath,
        draft: Draft,
        navigator: StepNavigator,
        pending_link: Option<String>,
        events: broadcast::Sender<SessionEvent>,
        view: watch::Sender<SessionView>,
    ) -> Self {
        let subscription = draft
            .id()
            .map(|id| store.subscribe(&guests.child(id.as_str())));
        let worker = Self {
            store,
            config,
            registry,
            guests,
            queue,
            draft,
            navigator,
            pending_link,
            subscription,
            idle_at: None,
            commit_at: None,
            completion_at: None,
            last_error: None,
            events,
            view,
        };
        worker.publish_view();
        worker
    }

    /// Current view of the session
    pub(crate) fn snapshot_view(&self) -> SessionView {
        SessionView {
            record_id: self.draft.id().cloned(),
            step: self.navigator.current(),
            status: self.draft.status(),
            preview_pct: compute_quality_with(&self.registry, &self.draft.record).pct,
            dirty: self.draft.is_dirty(),
            last_error: self.last_error.clone(),
        }
    }

    /// Worker loop; ends on dispose or when every handle is gone
    pub(crate) async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        tracing::debug!(record_id = ?self.draft.id(), "session worker started");
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => {
                        if self.handle(command).await.is_break() {
                            break;
                        }
                    }
                    None => {
                        // Every handle dropped: best-effort flush.
                        if let Err(err) = self.flush().await {
                            tracing::warn!(error = %err, "flush on close failed");
                        }
                        break;
                    }
                },
                () = sleep_until_opt(self.idle_at) => {
                    tracing::trace!("idle timer fired");
                    let _ = self.save().await;
                }
                () = sleep_until_opt(self.commit_at) => {
                    tracing::trace!("commit timer fired");
                    let _ = self.save().await;
                }
                () = sleep_until_opt(self.completion_at) => {
                    self.write_completion().await;
                }
                change = next_change(&mut self.subscription) => match change {
                    Some(change) => self.apply_remote(&change).await,
                    None => self.subscription = None,
                },
            }
            self.publish_view();
        }
        tracing::debug!(record_id = ?self.draft.id(), "session worker stopped");
    }

    async fn handle(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::Input { slot, value } => self.input(&slot, value),
            Command::Blur => {
                self.idle_at = None;
                self.commit_at = Some(Instant::now() + self.config.commit_delay());
            }
            Command::Navigate(step) => {
                if self.navigator.navigate_to(step) {
                    self.emit(SessionEvent::StepChanged(step));
                }
            }
            Command::Flush(reply) => {
                let result = self.flush().await;
                self.respond(reply, result);
            }
            Command::Retry(reply) => {
                let result = self.save().await;
                self.respond(reply, result);
            }
            Command::Revert(target, reply) => {
                let result = self.revert(target).await;
                if let Err(err) = &result {
                    self.report_failure(err);
                }
                self.respond(reply, result);
            }
            Command::Dispose(reply) => {
                let result = self.flush().await;
                self.respond(reply, result);
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// Publish the view first so the caller observes the outcome
    fn respond(&self, reply: Reply, result: SessionResult<()>) {
        self.publish_view();
        let _ = reply.send(result);
    }

    fn input(&mut self, slot: &FieldSlot, value: Value) {
        self.draft.apply_input(slot, value);

        let now = Instant::now();
        self.idle_at = Some(now + self.config.idle_delay());
        if self.commit_at.is_some() {
            self.commit_at = Some(now + self.config.commit_delay());
        }

        let report = compute_quality_with(&self.registry, &self.draft.record);
        tracing::trace!(field = %slot, pct = report.pct, "input");
        self.emit(SessionEvent::Preview(report));
    }

    /// Commit and surface any failure
    async fn save(&mut self) -> SessionResult<()> {
        let result = self.commit().await;
        match &result {
            Ok(()) => self.last_error = None,
            Err(err) => self.report_failure(err),
        }
        result
    }

    async fn commit(&mut self) -> SessionResult<()> {
        self.idle_at = None;
        self.commit_at = None;
        self.draft.normalize();

        match self.draft.id().cloned() {
            None if !self.draft.has_content() => {
                tracing::debug!("nothing captured yet; skipping commit");
                Ok(())
            }
            None => self.create().await,
            Some(id) => self.patch(&id).await,
        }
    }

    async fn create(&mut self) -> SessionResult<()> {
        let now = Utc::now();
        let mut record = self.draft.record.clone();
        record.id = None;
        record.status = self.draft.status().into();
        record.completion = None;
        record.submitted_at = Some(now);
        record.updated_at = Some(now);

        let key = self
            .store
            .push(&self.guests, serde_json::to_value(&record)?)
            .await?;
        let id = RecordId::new(key);
        self.draft.mark_created(id.clone(), now);
        self.subscription = Some(self.store.subscribe(&self.record_path(&id)));

        tracing::info!(record_id = %id, status = %self.draft.status(), "guest record created");
        self.emit(SessionEvent::Created(id.clone()));

        self.link_queue(&id).await;
        self.after_save();
        Ok(())
    }

    async fn patch(&mut self, id: &RecordId) -> SessionResult<()> {
        let path = self.record_path(id);
        let mut sections = self.draft.changed_sections();

        if sections.contains(&Section::Status) {
            let remote = self.store.read(&path.child(Section::Status.key())).await?;
            if is_sold(remote.as_ref()) {
                self.pin_sold(id, true);
                sections.retain(|s| *s != Section::Status);
            }
        }

        self.link_queue(id).await;

        if sections.is_empty() && self.draft.legacy_keys().is_empty() {
            tracing::debug!(record_id = %id, "no changed sections");
            return Ok(());
        }

        let now = Utc::now();
        let batch = self.section_batch(&path, &sections, now)?;
        self.store.update(batch).await?;
        self.draft.mark_saved(&sections, now);

        tracing::info!(record_id = %id, sections = ?sections, status = %self.draft.status(), "guest record saved");
        self.emit(SessionEvent::Saved {
            record_id: id.clone(),
            sections,
        });
        self.after_save();
        Ok(())
    }

    fn after_save(&mut self) {
        let status = self.draft.status();
        if self.navigator.advance_if_needed(status) {
            self.emit(SessionEvent::StepChanged(self.navigator.current()));
        }
        self.completion_at = Some(Instant::now() + self.config.completion_delay());
    }

    async fn link_queue(&mut self, id: &RecordId) {
        let Some(entry) = self.pending_link.clone() else {
            return;
        };
        let path = self.queue.child(entry.as_str()).child("guestId");
        let batch = UpdateBatch::new().set(path, Value::String(id.as_str().to_string()));
        match self.store.update(batch).await {
            Ok(()) => {
                self.pending_link = None;
                tracing::info!(record_id = %id, entry = %entry, "intake queue entry linked");
                self.emit(SessionEvent::QueueLinked {
                    entry,
                    record_id: id.clone(),
                });
            }
            Err(err) => {
                tracing::warn!(record_id = %id, entry = %entry, error = %err, "queue link failed; will retry on next save");
            }
        }
    }

    async fn write_completion(&mut self) {
        self.completion_at = None;
        let Some(id) = self.draft.id().cloned() else {
            return;
        };

        let report = compute_quality_with(&self.registry, &self.draft.record);
        let snapshot = CompletionSnapshot::from_report(&report, Utc::now(), self.config.snapshot_fields);
        let result = match serde_json::to_value(&snapshot) {
            Ok(value) => self
                .store
                .update(UpdateBatch::new().set(
                    self.record_path(&id).child(Section::Completion.key()),
                    value,
                ))
                .await
                .map_err(SessionError::from),
            Err(err) => Err(err.into()),
        };

        match result {
            Ok(()) => {
                tracing::debug!(record_id = %id, pct = snapshot.pct, "completion snapshot written");
                self.emit(SessionEvent::CompletionWritten { pct: snapshot.pct });
                self.draft.record.completion = Some(snapshot);
            }
            Err(err) => {
                tracing::warn!(record_id = %id, error = %err, "completion snapshot failed");
                self.emit(SessionEvent::CompletionFailed {
                    message: err.to_string(),
                });
            }
        }
    }

    async fn flush(&mut self) -> SessionResult<()> {
        let pending = self.idle_at.is_some() || self.commit_at.is_some();
        let result = if pending || self.draft.is_dirty() {
            self.save().await
        } else {
            Ok(())
        };
        if self.completion_at.is_some() {
            self.write_completion().await;
        }
        result
    }

    async fn revert(&mut self, target: RevertTarget) -> SessionResult<()> {
        let plan = plan_revert(&self.draft.record, target);
        self.draft.record = plan.record.clone();
        if self.navigator.force(plan.step()) {
            self.emit(SessionEvent::StepChanged(plan.step()));
        }
        self.emit(SessionEvent::Reverted(target));

        let Some(id) = self.draft.id().cloned() else {
            tracing::debug!(%target, "reverted unsaved draft");
            return Ok(());
        };

        // Pending edits elsewhere ride along so the record lands in one shape.
        let mut sections = self.draft.changed_sections();
        for section in &plan.sections {
            if !sections.contains(section) {
                sections.push(*section);
            }
        }

        let path = self.record_path(&id);
        let now = Utc::now();
        let batch = self.section_batch(&path, &sections, now)?;
        self.store.update(batch).await?;
        self.draft.mark_saved(&sections, now);
        self.last_error = None;
        tracing::info!(record_id = %id, %target, "guest record reverted");

        self.write_completion().await;
        Ok(())
    }

    /// Patch batch for `sections`, dropping any legacy keys, stamped `updatedAt`
    fn section_batch(
        &self,
        path: &StorePath,
        sections: &[Section],
        now: DateTime<Utc>,
    ) -> SessionResult<UpdateBatch> {
        let mut batch = UpdateBatch::new();
        for section in sections {
            batch.insert(path.child(section.key()), self.draft.section_value(*section));
        }
        for key in self.draft.legacy_keys() {
            batch.insert(path.child(key.as_str()), Value::Null);
        }
        batch.insert(
            path.child(Section::UpdatedAt.key()),
            serde_json::to_value(now)?,
        );
        Ok(batch)
    }

    async fn apply_remote(&mut self, change: &Change) {
        let Some(id) = self.draft.id().cloned() else {
            return;
        };
        let path = self.record_path(&id);
        let status_path = path.child(Section::Status.key());

        if let Some(value) = change.value_at(&status_path) {
            if is_sold(Some(&value)) && !self.draft.record.status.is_terminal() {
                // Our own status write may have landed after the sale.
                let stored = match self.store.read(&status_path).await {
                    Ok(current) => is_sold(current.as_ref()),
                    Err(err) => {
                        tracing::warn!(record_id = %id, error = %err, "could not confirm stored status");
                        false
                    }
                };
                self.pin_sold(&id, stored);
            }
        }

        if let Some(value) = change.value_at(&path.child(Section::Sale.key())) {
            match serde_json::from_value::<Option<Sale>>(value) {
                Ok(sale) => self.draft.record.sale = sale,
                Err(err) => tracing::warn!(record_id = %id, error = %err, "ignoring malformed remote sale"),
            }
        }
    }

    /// Pin `sold`; when the store no longer holds it, schedule a commit to restore it
    fn pin_sold(&mut self, id: &RecordId, stored: bool) {
        tracing::info!(record_id = %id, "record marked sold remotely; pinning status");
        if stored {
            self.draft.pin_remote(Status::Sold);
        } else {
            tracing::warn!(record_id = %id, "sold status was overwritten; restoring on next commit");
            self.draft.pin_unstored(Status::Sold);
            self.commit_at = Some(Instant::now() + self.config.commit_delay());
        }
        self.emit(SessionEvent::StatusPinned(Status::Sold));
        if self.navigator.advance_if_needed(Status::Sold) {
            self.emit(SessionEvent::StepChanged(self.navigator.current()));
        }
    }

    fn report_failure(&mut self, err: &SessionError) {
        tracing::warn!(record_id = ?self.draft.id(), error = %err, retryable = err.is_retryable(), "save failed; draft kept");
        self.last_error = Some(err.to_string());
        self.emit(SessionEvent::SaveFailed {
            message: err.to_string(),
            retryable: err.is_retryable(),
        });
    }

    fn record_path(&self, id: &RecordId) -> StorePath {
        self.guests.child(id.as_str())
    }

    fn emit(&self, event: SessionEvent) {
        // No listeners is fine.
        let _ = self.events.send(event);
    }

    fn publish_view(&self) {
        self.view.send_replace(self.snapshot_view());
    }
}

fn is_sold(value: Option<&Value>) -> bool {
    value.and_then(Value::as_str) == Some(Status::Sold.as_str())
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn next_change(subscription: &mut Option<Subscription>) -> Option<Change> {
    match subscription {
        Some(subscription) => subscription.recv().await,
        None => std::future::pending().await,
    }
}
