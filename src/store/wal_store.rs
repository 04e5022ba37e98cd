use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{info, warn};
use ulid::Ulid;

use crate::model::*;
use crate::observability;
use crate::wal::Wal;

use super::{InMemoryStore, RecordStore, StoreError};

// ── Group-commit WAL channel ─────────────────────────────

enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type PendingAppend = (Event, oneshot::Sender<io::Result<()>>);

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Drain every Append already queued (the batch window).
/// 3. One flush_sync for the whole batch, then answer every sender.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                let mut deferred = None;
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                        Ok(other) => {
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break, // channel empty, flush batch
                    }
                }
                commit_batch(&mut wal, &mut batch);
                if let Some(other) = deferred {
                    handle_non_append(&mut wal, other);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn commit_batch(wal: &mut Wal, batch: &mut Vec<PendingAppend>) {
    metrics::histogram!(observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn flush_batch(wal: &mut Wal, batch: &[PendingAppend]) -> io::Result<()> {
    let mut append_err = None;
    for (event, _) in batch {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Flush even after an append error so buffered bytes don't leak into the next batch.
    let flush_err = wal.flush_sync().err();
    match append_err.or(flush_err) {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!("appends are batched by the writer loop"),
    }
}

/// Durable record store: an [`InMemoryStore`] rebuilt from, and kept in step
/// with, an append-only log.
///
/// Every mutation is logged before it is applied. Mutations are serialized by
/// `apply_lock` so the log order matches the in-memory order.
pub struct WalStore {
    memory: InMemoryStore,
    wal_tx: mpsc::Sender<WalCommand>,
    apply_lock: Mutex<()>,
    path: PathBuf,
}

impl WalStore {
    /// Replay `path` and start the writer task. Must run inside a tokio runtime.
    pub fn open(path: &Path) -> io::Result<Self> {
        let replay = Wal::replay(path)?;
        if replay.torn_tail {
            warn!("{}: discarded torn tail after {} events", path.display(), replay.events.len());
        }
        let memory = InMemoryStore::new();
        for event in &replay.events {
            memory.apply_event(event);
        }
        info!(
            "{}: replayed {} events, {} appointments",
            path.display(),
            replay.events.len(),
            memory.count()
        );

        let wal = Wal::open(path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        Ok(Self {
            memory,
            wal_tx,
            apply_lock: Mutex::new(()),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn wal_append(&self, event: &Event) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| StoreError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::WalError(e.to_string()))
    }

    /// WAL-append then apply.
    async fn persist_and_apply(&self, event: Event) -> Result<(), StoreError> {
        self.wal_append(&event).await?;
        self.memory.apply_event(&event);
        Ok(())
    }

    pub async fn appends_since_compact(&self) -> Result<u64, StoreError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .map_err(|_| StoreError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::WalError("WAL writer dropped response".into()))
    }

    /// Rewrite the log as one `AppointmentCreated` per live record.
    pub async fn compact(&self) -> Result<usize, StoreError> {
        let _guard = self.apply_lock.lock().await;
        let events: Vec<Event> = self
            .memory
            .snapshot()
            .into_iter()
            .map(|appointment| Event::AppointmentCreated { appointment })
            .collect();
        let count = events.len();
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact {
                events,
                response: tx,
            })
            .await
            .map_err(|_| StoreError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::WalError(e.to_string()))?;
        Ok(count)
    }
}

#[async_trait]
impl RecordStore for WalStore {
    async fn insert(&self, appointment: Appointment) -> Result<(), StoreError> {
        let _guard = self.apply_lock.lock().await;
        self.memory.check_insert(&appointment.id)?;
        self.persist_and_apply(Event::AppointmentCreated { appointment })
            .await
    }

    async fn get(&self, id: Ulid) -> Result<Option<Appointment>, StoreError> {
        self.memory.get(id).await
    }

    async fn update(&self, appointment: Appointment) -> Result<(), StoreError> {
        let _guard = self.apply_lock.lock().await;
        self.memory.check_exists(&appointment.id)?;
        self.persist_and_apply(Event::AppointmentUpdated { appointment })
            .await
    }

    async fn delete(&self, id: Ulid) -> Result<Option<Appointment>, StoreError> {
        let _guard = self.apply_lock.lock().await;
        let Some(existing) = self.memory.get(id).await? else {
            return Ok(None);
        };
        self.persist_and_apply(Event::AppointmentDeleted { id }).await?;
        Ok(Some(existing))
    }

    async fn list_range(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Appointment>, StoreError> {
        self.memory.list_range(from, to).await
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.memory.count())
    }
}
