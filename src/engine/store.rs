use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::RwLock;
use ulid::Ulid;

use crate::model::*;

use super::EngineError;

pub type SharedItemState = Arc<RwLock<ItemState>>;

/// One payment per reservation, keyed by reservation id.
#[derive(Default)]
pub struct PaymentStore {
    by_reservation: DashMap<Ulid, Payment>,
}

impl PaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `payment`, refusing a second one for the same reservation.
    pub fn record(&self, payment: Payment) -> Result<Ulid, EngineError> {
        match self.by_reservation.entry(payment.reservation_id) {
            Entry::Occupied(_) => Err(EngineError::DuplicatePayment(payment.reservation_id)),
            Entry::Vacant(slot) => {
                let id = payment.id;
                slot.insert(payment);
                Ok(id)
            }
        }
    }

    pub fn ensure_absent(&self, reservation_id: &Ulid) -> Result<(), EngineError> {
        if self.by_reservation.contains_key(reservation_id) {
            return Err(EngineError::DuplicatePayment(*reservation_id));
        }
        Ok(())
    }

    pub fn get(&self, reservation_id: &Ulid) -> Option<Payment> {
        self.by_reservation.get(reservation_id).map(|e| e.value().clone())
    }

    pub fn len(&self) -> usize {
        self.by_reservation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_reservation.is_empty()
    }
}

/// Inventory, reservation indexes and payments. Mutated only by applying committed events.
#[derive(Default)]
pub struct InMemoryStore {
    items: DashMap<Ulid, SharedItemState>,
    reservation_to_item: DashMap<Ulid, Ulid>,
    user_reservations: DashMap<Ulid, Vec<Ulid>>,
    pub payments: PaymentStore,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Items ────────────────────────────────────────────────

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn contains_item(&self, id: &Ulid) -> bool {
        self.items.contains_key(id)
    }

    pub fn get_item(&self, id: &Ulid) -> Option<SharedItemState> {
        self.items.get(id).map(|e| e.value().clone())
    }

    pub fn insert_item(&self, state: ItemState) {
        self.items.insert(state.id, Arc::new(RwLock::new(state)));
    }

    /// Item ids in ascending order, the lock order for multi-item reads.
    pub fn item_ids(&self) -> Vec<Ulid> {
        let mut ids: Vec<Ulid> = self.items.iter().map(|e| *e.key()).collect();
        ids.sort();
        ids
    }

    // ── Reservation indexes ──────────────────────────────────

    pub fn item_for_reservation(&self, reservation_id: &Ulid) -> Option<Ulid> {
        self.reservation_to_item.get(reservation_id).map(|e| *e.value())
    }

    pub fn reservations_of_user(&self, user_id: &Ulid) -> Vec<Ulid> {
        self.user_reservations
            .get(user_id)
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }

    // ── Event application ────────────────────────────────────

    /// Apply a committed event to its item. `ItemAdded` is handled at the map level.
    pub fn apply_event(&self, item: &mut ItemState, event: &Event) {
        match event {
            Event::MaintenanceSet {
                under_maintenance, ..
            } => {
                item.under_maintenance = *under_maintenance;
            }
            Event::ReservationConfirmed { reservation } => {
                self.reservation_to_item
                    .insert(reservation.id, reservation.item_id);
                self.user_reservations
                    .entry(reservation.user_id)
                    .or_default()
                    .push(reservation.id);
                item.insert_reservation(reservation.clone());
            }
            Event::PaymentRecorded { payment, .. } => {
                if let Err(e) = self.payments.record(payment.clone()) {
                    tracing::warn!("skipping payment {}: {e}", payment.id);
                }
            }
            Event::ReservationCancelled {
                id, cancelled_at, ..
            } => {
                if let Some(r) = item.reservation_mut(id) {
                    r.status = ReservationStatus::Cancelled;
                    r.cancelled_at = Some(*cancelled_at);
                }
            }
            Event::ItemAdded { .. } => {}
        }
    }
}
