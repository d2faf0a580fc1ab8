use tokio::sync::OwnedRwLockWriteGuard;
use ulid::Ulid;

use crate::model::{Event, ItemState};

use super::{Engine, EngineError};

/// Scoped atomic unit over one item.
///
/// Holds the item's write lock from `begin` until it is dropped, so every
/// check made through `item()` still holds at commit time. Writes are staged
/// as events; `commit` appends them to the WAL as a single record and only
/// then applies them to memory. A transaction dropped without a successful
/// commit leaves no trace.
pub(super) struct Transaction<'e> {
    engine: &'e Engine,
    item_id: Ulid,
    guard: OwnedRwLockWriteGuard<ItemState>,
    staged: Vec<Event>,
    committed: bool,
}

impl<'e> Transaction<'e> {
    pub(super) async fn begin(engine: &'e Engine, item_id: Ulid) -> Result<Self, EngineError> {
        let item = engine
            .store
            .get_item(&item_id)
            .ok_or(EngineError::ItemNotFound(item_id))?;
        let guard = item.write_owned().await;
        Ok(Self {
            engine,
            item_id,
            guard,
            staged: Vec::new(),
            committed: false,
        })
    }

    /// Item state as of the lock, without any staged writes.
    pub(super) fn item(&self) -> &ItemState {
        &self.guard
    }

    pub(super) fn stage(&mut self, event: Event) {
        debug_assert_eq!(event.item_id(), self.item_id);
        self.staged.push(event);
    }

    pub(super) async fn commit(mut self) -> Result<(), EngineError> {
        if !self.staged.is_empty() {
            self.engine.wal_append(&self.staged).await?;
            for event in &self.staged {
                self.engine.store.apply_event(&mut self.guard, event);
            }
        }
        self.committed = true;
        Ok(())
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.committed {
            tracing::debug!(
                item_id = %self.item_id,
                discarded = self.staged.len(),
                "transaction rolled back"
            );
            metrics::counter!(crate::observability::TRANSACTION_ROLLBACKS_TOTAL).increment(1);
        }
    }
}
