//! Session handle API
//!
//! Opening a session loads (or seeds) the draft, spawns its autosave worker
//! and returns a cloneable [`SessionHandle`]. Every handle method is a
//! message to that worker.

use crate::autosave::{Autosave, Command, Reply};
use crate::config::SessionConfig;
use crate::draft::Draft;
use crate::error::{SessionError, SessionResult};
use crate::navigator::StepNavigator;
use crate::revert::RevertTarget;
use intake_record::{
    normalize, FieldRegistry, GuestRecord, IntakeQueueEntry, QualityReport, RecordId, Section,
    Status, Step,
};
use intake_store::{Store, StoreExt, StorePath};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

/// Where a session's draft comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSource {
    /// New guest, nothing captured
    Blank,
    /// Stored guest record
    Existing(RecordId),
    /// Intake-queue entry captured elsewhere; seeds customer info
    Queue(String),
}

/// Notifications from a session worker
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Live score after an edit; nothing saved yet
    Preview(QualityReport),
    /// First write created the record
    Created(RecordId),
    /// Changed sections were patched
    Saved {
        /// Record
        record_id: RecordId,
        /// Sections written (besides `updatedAt`)
        sections: Vec<Section>,
    },
    /// A write failed; the draft is kept
    SaveFailed {
        /// Error text for a transient status message
        message: String,
        /// Whether a retry may succeed
        retryable: bool,
    },
    /// Completion snapshot stored
    CompletionWritten {
        /// Persisted percentage
        pct: u8,
    },
    /// Completion snapshot write failed
    CompletionFailed {
        /// Error text
        message: String,
    },
    /// The navigator moved
    StepChanged(Step),
    /// Status pinned by a remote actor
    StatusPinned(Status),
    /// A revert was applied
    Reverted(RevertTarget),
    /// The originating queue entry now points at the record
    QueueLinked {
        /// Queue entry key
        entry: String,
        /// Linked record
        record_id: RecordId,
    },
}

/// What a form needs to render a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    /// Persisted id; `None` until the first commit
    pub record_id: Option<RecordId>,
    /// Current step
    pub step: Step,
    /// Detected status of the draft
    pub status: Status,
    /// Live score of the draft
    pub preview_pct: u8,
    /// Edits not yet persisted
    pub dirty: bool,
    /// Last save error, cleared by the next successful save
    pub last_error: Option<String>,
}

/// Configures and opens sessions against one store
///
/// # Example
///
/// ```rust,no_run
/// use intake_session::{SessionBuilder, SessionConfig, SessionSource};
/// use intake_store::MemoryStore;
/// use serde_json::json;
/// use std::sync::Arc;
///
/// # async fn demo() -> Result<(), intake_session::SessionError> {
/// let store = Arc::new(MemoryStore::new());
/// let session = SessionBuilder::new(store)
///     .config(SessionConfig::new().with_idle_delay_ms(2000))
///     .open(SessionSource::Blank)
///     .await?;
///
/// session.input("customerName", json!("Jane")).await?;
/// session.blur().await?;
/// session.dispose().await?;
/// # Ok(())
/// # }
/// ```
pub struct SessionBuilder {
    store: Arc<dyn Store>,
    config: SessionConfig,
    registry: Arc<FieldRegistry>,
}

impl SessionBuilder {
    /// Builder with default config and the standard registry
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            config: SessionConfig::default(),
            registry: Arc::new(FieldRegistry::standard().clone()),
        }
    }

    /// With configuration
    #[inline]
    #[must_use]
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// With a custom field registry
    #[inline]
    #[must_use]
    pub fn registry(mut self, registry: FieldRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// Load the draft and start the session worker
    ///
    /// Must be called inside a tokio runtime.
    ///
    /// # Errors
    /// - `SessionError::Config` for an invalid configuration
    /// - `SessionError::RecordNotFound` / `QueueEntryNotFound` for a missing source
    /// - `SessionError::InvalidKey` for an id that is not a valid path segment
    /// - `SessionError::Store` when the initial read fails
    pub async fn open(self, source: SessionSource) -> SessionResult<SessionHandle> {
        self.config.validate()?;
        let guests = self.config.guests_path()?;
        let queue = self.config.queue_path()?;

        let (draft, navigator, pending_link) = match source {
            SessionSource::Blank => (
                Draft::unsaved(GuestRecord::new()),
                StepNavigator::new(),
                None,
            ),
            SessionSource::Existing(id) => {
                let (draft, navigator) = load_existing(self.store.as_ref(), &guests, id).await?;
                (draft, navigator, None)
            }
            SessionSource::Queue(entry_key) => {
                let path = queue.try_child(&entry_key)?;
                let entry: IntakeQueueEntry = self
                    .store
                    .read_as(&path)
                    .await?
                    .ok_or_else(|| SessionError::QueueEntryNotFound(entry_key.clone()))?;

                if let Some(id) = entry.guest_id {
                    tracing::debug!(entry = %entry_key, record_id = %id, "queue entry already linked");
                    let (draft, navigator) = load_existing(self.store.as_ref(), &guests, id).await?;
                    (draft, navigator, None)
                } else {
                    let mut record = GuestRecord::new();
                    record.customer_name = entry.customer_name;
                    record.customer_phone = entry.customer_phone;
                    let seeded = normalize(&serde_json::to_value(&record)?);
                    let navigator = StepNavigator::for_record(&seeded.record, seeded.prefilled_step1);
                    (Draft::unsaved(seeded.record), navigator, Some(entry_key))
                }
            }
        };

        let (command_tx, command_rx) = mpsc::channel(self.config.command_capacity);
        let (events, _) = broadcast::channel(self.config.event_capacity);
        let (view_tx, view_rx) = watch::channel(SessionView {
            record_id: None,
            step: Step::Step1,
            status: Status::New,
            preview_pct: 0,
            dirty: false,
            last_error: None,
        });

        let worker = Autosave::new(
            self.store,
            self.config,
            Arc::clone(&self.registry),
            guests,
            queue,
            draft,
            navigator,
            pending_link,
            events.clone(),
            view_tx,
        );
        let view = worker.snapshot_view();
        tracing::info!(record_id = ?view.record_id, step = %view.step, status = %view.status, "session opened");
        tokio::spawn(worker.run(command_rx));

        Ok(SessionHandle {
            commands: command_tx,
            events,
            view: view_rx,
            registry: self.registry,
        })
    }
}

async fn load_existing(
    store: &dyn Store,
    guests: &StorePath,
    id: RecordId,
) -> SessionResult<(Draft, StepNavigator)> {
    let path = guests.try_child(id.as_str())?;
    let raw: Value = store
        .read(&path)
        .await?
        .ok_or_else(|| SessionError::RecordNotFound(id.clone()))?;

    let normalized = normalize(&raw);
    let mut record = normalized.record;
    record.id = Some(id);
    let navigator = StepNavigator::for_record(&record, normalized.prefilled_step1);
    Ok((Draft::loaded(record, &raw), navigator))
}

/// Open a session with default configuration
///
/// # Errors
/// See [`SessionBuilder::open`]
pub async fn open_session(store: Arc<dyn Store>, source: SessionSource) -> SessionResult<SessionHandle> {
    SessionBuilder::new(store).open(source).await
}

/// Handle to one open session
///
/// Cheap to clone. When the last handle is dropped the worker flushes
/// pending edits and stops.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<SessionEvent>,
    view: watch::Receiver<SessionView>,
    registry: Arc<FieldRegistry>,
}

impl SessionHandle {
    /// Edit a field by registry name
    ///
    /// Rescores the draft for preview and (re)arms the idle timer.
    ///
    /// # Errors
    /// `SessionError::UnknownField`, or `SessionError::Closed`
    pub async fn input(&self, field: &str, value: Value) -> SessionResult<()> {
        let spec = self
            .registry
            .get(field)
            .ok_or_else(|| SessionError::UnknownField(field.to_string()))?;
        self.send(Command::Input {
            slot: spec.slot.clone(),
            value,
        })
        .await
    }

    /// Focus left a field: cancel the idle timer and arm the commit debounce
    ///
    /// # Errors
    /// `SessionError::Closed`
    pub async fn blur(&self) -> SessionResult<()> {
        self.send(Command::Blur).await
    }

    /// Manual step navigation
    ///
    /// # Errors
    /// `SessionError::Closed`
    pub async fn navigate(&self, step: Step) -> SessionResult<()> {
        self.send(Command::Navigate(step)).await
    }

    /// Commit now and write any pending completion snapshot
    ///
    /// # Errors
    /// The commit's failure; the draft is kept
    pub async fn flush(&self) -> SessionResult<()> {
        self.request(Command::Flush).await
    }

    /// Re-attempt a failed commit immediately
    ///
    /// # Errors
    /// The commit's failure; the draft is kept
    pub async fn retry(&self) -> SessionResult<()> {
        self.request(Command::Retry).await
    }

    /// Apply a confirmed revert
    ///
    /// # Errors
    /// The revert write's failure; the draft is reverted regardless
    pub async fn revert(&self, target: RevertTarget) -> SessionResult<()> {
        self.request(|reply| Command::Revert(target, reply)).await
    }

    /// Flush and stop the worker
    ///
    /// # Errors
    /// The final commit's failure
    pub async fn dispose(self) -> SessionResult<()> {
        self.request(Command::Dispose).await
    }

    /// Latest session view
    #[must_use]
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// Subscribe to session events from now on
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Wait until the view changes
    ///
    /// # Errors
    /// `SessionError::Closed` once the worker has stopped
    pub async fn changed(&mut self) -> SessionResult<SessionView> {
        self.view.changed().await.map_err(|_| SessionError::Closed)?;
        Ok(self.view.borrow_and_update().clone())
    }

    async fn send(&self, command: Command) -> SessionResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::Closed)
    }

    async fn request(&self, make: impl FnOnce(Reply) -> Command) -> SessionResult<()> {
        let (tx, rx) = oneshot::channel();
        self.send(make(tx)).await?;
        rx.await.map_err(|_| SessionError::Closed)?
    }
}
