mod conflict;
mod error;
mod mutations;
pub mod pricing;
mod queries;
mod store;
mod txn;

pub use conflict::has_conflict;
pub use error::EngineError;
pub use store::{InMemoryStore, PaymentStore, SharedItemState};

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex};
use ulid::Ulid;

use crate::model::*;
use crate::payment::PaymentGateway;
use crate::wal::Wal;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        commit: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        commits: Vec<Vec<Event>>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type PendingAppend = (Vec<Event>, oneshot::Sender<io::Result<()>>);

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { commit, response } => {
                let mut batch = vec![(commit, response)];
                let mut deferred = None;

                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { commit, response }) => batch.push((commit, response)),
                        Ok(other) => {
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break, // channel empty, flush batch
                    }
                }

                flush_and_respond(&mut wal, &mut batch);
                if let Some(other) = deferred {
                    handle_non_append(&mut wal, other);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_and_respond(wal: &mut Wal, batch: &mut Vec<PendingAppend>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    if let Err(e) = &result {
        tracing::error!("WAL flush failed for {} commits: {e}", batch.len());
    }
    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn flush_batch(wal: &mut Wal, batch: &[PendingAppend]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (commit, _) in batch {
        if let Err(e) = wal.append_buffered(commit) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush, even on append error, so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = wal.flush_sync().err();
    match (append_err, flush_err) {
        (Some(e), _) | (None, Some(e)) => Err(e),
        (None, None) => Ok(()),
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { commits, response } => {
            let result = Wal::write_compact_file(wal.path(), &commits)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

/// The reservation transaction manager. Every write to items, reservations
/// and payments goes through one of its methods.
pub struct Engine {
    pub(super) store: InMemoryStore,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub(super) gateway: Arc<dyn PaymentGateway>,
    /// Serializes catalog changes (new items) against WAL compaction.
    pub(super) catalog: Mutex<()>,
}

impl Engine {
    pub fn new(wal_path: PathBuf, gateway: Arc<dyn PaymentGateway>) -> io::Result<Self> {
        let commits = Wal::recover(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let store = InMemoryStore::new();

        // Replay into plain item states first; nothing else can see them yet.
        let mut items: HashMap<Ulid, ItemState> = HashMap::new();
        let mut replayed = 0usize;
        for event in commits.iter().flatten() {
            match event {
                Event::ItemAdded {
                    id,
                    name,
                    rate_per_day,
                    under_maintenance,
                } => {
                    items.insert(
                        *id,
                        ItemState::new(*id, name.clone(), *rate_per_day, *under_maintenance),
                    );
                }
                other => match items.get_mut(&other.item_id()) {
                    Some(item) => store.apply_event(item, other),
                    None => tracing::warn!("replay: event for unknown item {}", other.item_id()),
                },
            }
            replayed += 1;
        }
        for (_, item) in items {
            store.insert_item(item);
        }
        if replayed > 0 {
            tracing::info!(
                "replayed {replayed} events from {} ({} items)",
                wal_path.display(),
                store.item_count()
            );
        }

        Ok(Self {
            store,
            wal_tx,
            gateway,
            catalog: Mutex::new(()),
        })
    }

    /// Write one commit to the WAL via the background group-commit writer.
    /// Returns once the commit is durable.
    pub(super) async fn wal_append(&self, commit: &[Event]) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                commit: commit.to_vec(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::TransactionFailure("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::TransactionFailure("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::TransactionFailure(e.to_string()))
    }

    pub fn get_item_state(&self, id: &Ulid) -> Option<SharedItemState> {
        self.store.get_item(id)
    }

    pub fn payments(&self) -> &PaymentStore {
        &self.store.payments
    }
}
