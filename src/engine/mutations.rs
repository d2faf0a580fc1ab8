use chrono::NaiveDate;
use rust_decimal::Decimal;
use tokio::sync::oneshot;
use tracing::info;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::conflict::{
    check_available, check_cancellation_window, check_no_conflict, check_not_past, now, today,
    validate_range,
};
use super::pricing::price;
use super::txn::Transaction;
use super::{Engine, EngineError, WalCommand};

fn validate_rate(rate: Decimal) -> Result<(), EngineError> {
    if rate <= Decimal::ZERO || rate.round_dp(2) != rate || rate > Decimal::from(MAX_RATE_PER_DAY) {
        return Err(EngineError::InvalidRate(rate.to_string()));
    }
    Ok(())
}

impl Engine {
    /// Register a rentable item.
    pub async fn add_item(
        &self,
        id: Ulid,
        name: String,
        rate_per_day: Decimal,
        under_maintenance: bool,
    ) -> Result<(), EngineError> {
        if name.is_empty() {
            return Err(EngineError::LimitExceeded("item name empty"));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("item name too long"));
        }
        validate_rate(rate_per_day)?;

        let _catalog = self.catalog.lock().await;
        if self.store.item_count() >= MAX_ITEMS {
            return Err(EngineError::LimitExceeded("too many items"));
        }
        if self.store.contains_item(&id) {
            return Err(EngineError::AlreadyExists(id));
        }

        let event = Event::ItemAdded {
            id,
            name: name.clone(),
            rate_per_day,
            under_maintenance,
        };
        self.wal_append(std::slice::from_ref(&event)).await?;
        self.store
            .insert_item(ItemState::new(id, name, rate_per_day, under_maintenance));
        info!(item_id = %id, %rate_per_day, under_maintenance, "item added");
        Ok(())
    }

    /// Put an item into (or take it out of) maintenance. Existing reservations are kept.
    pub async fn set_maintenance(
        &self,
        item_id: Ulid,
        under_maintenance: bool,
    ) -> Result<ItemInfo, EngineError> {
        let mut txn = Transaction::begin(self, item_id).await?;
        if txn.item().under_maintenance != under_maintenance {
            txn.stage(Event::MaintenanceSet {
                item_id,
                under_maintenance,
            });
        }
        txn.commit().await?;

        let state = self
            .store
            .get_item(&item_id)
            .ok_or(EngineError::ItemNotFound(item_id))?;
        let info = state.read().await.info(today());
        info!(%item_id, status = %info.status, "maintenance updated");
        Ok(info)
    }

    /// Reserve `item_id` for every day in `[start, end]` and take payment, as one atomic unit.
    pub async fn reserve(
        &self,
        user_id: Ulid,
        item_id: Ulid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ReservationReceipt, EngineError> {
        let result = self.reserve_inner(user_id, item_id, DateRange::new(start, end)).await;
        let outcome = match &result {
            Ok(_) => "confirmed",
            Err(e) => e.code(),
        };
        metrics::counter!(crate::observability::RESERVATIONS_TOTAL, "outcome" => outcome)
            .increment(1);
        result
    }

    async fn reserve_inner(
        &self,
        user_id: Ulid,
        item_id: Ulid,
        range: DateRange,
    ) -> Result<ReservationReceipt, EngineError> {
        let mut txn = Transaction::begin(self, item_id).await?;

        let today = today();
        check_available(txn.item(), today)?;
        validate_range(&range)?;
        check_not_past(&range, today)?;
        if txn.item().reservations.len() >= MAX_RESERVATIONS_PER_ITEM {
            return Err(EngineError::LimitExceeded("too many reservations on item"));
        }
        check_no_conflict(txn.item(), &range)?;
        let total_cost = price(range.start, range.end, txn.item().rate_per_day)?;

        let reservation_id = Ulid::new();
        self.store.payments.ensure_absent(&reservation_id)?;
        let status = self.gateway.charge(reservation_id, total_cost).await;
        if status != PaymentStatus::Completed {
            return Err(EngineError::PaymentDeclined(reservation_id));
        }

        let now = now();
        let payment = Payment {
            id: Ulid::new(),
            reservation_id,
            amount: total_cost,
            status,
            method: self.gateway.method().to_string(),
            paid_at: now,
        };
        let payment_id = payment.id;
        txn.stage(Event::ReservationConfirmed {
            reservation: Reservation {
                id: reservation_id,
                item_id,
                user_id,
                range,
                total_cost,
                status: ReservationStatus::Confirmed,
                created_at: now,
                cancelled_at: None,
            },
        });
        txn.stage(Event::PaymentRecorded { item_id, payment });
        if let Err(e) = txn.commit().await {
            self.gateway.refund(reservation_id, total_cost).await;
            return Err(e);
        }

        info!(%reservation_id, %item_id, %user_id, %range, %total_cost, "reservation confirmed");
        Ok(ReservationReceipt {
            reservation_id,
            payment_id,
            total_cost,
        })
    }

    /// Cancel a reservation owned by `user_id`. The item's availability follows
    /// from whatever active reservations remain.
    pub async fn cancel(&self, reservation_id: Ulid, user_id: Ulid) -> Result<(), EngineError> {
        let result = self.cancel_inner(reservation_id, user_id).await;
        let outcome = match &result {
            Ok(()) => "cancelled",
            Err(e) => e.code(),
        };
        metrics::counter!(crate::observability::CANCELLATIONS_TOTAL, "outcome" => outcome)
            .increment(1);
        result
    }

    async fn cancel_inner(&self, reservation_id: Ulid, user_id: Ulid) -> Result<(), EngineError> {
        let item_id = self
            .store
            .item_for_reservation(&reservation_id)
            .ok_or(EngineError::ReservationNotFound(reservation_id))?;
        let mut txn = Transaction::begin(self, item_id).await?;

        let reservation = txn
            .item()
            .reservation(&reservation_id)
            .filter(|r| r.user_id == user_id && !r.is_cancelled())
            .ok_or(EngineError::ReservationNotFound(reservation_id))?;
        let now = now();
        check_cancellation_window(reservation, now)?;

        txn.stage(Event::ReservationCancelled {
            id: reservation_id,
            item_id,
            cancelled_at: now,
        });
        txn.commit().await?;

        info!(%reservation_id, %item_id, %user_id, "reservation cancelled");
        Ok(())
    }

    /// Rewrite the WAL with only the events needed to recreate the current state.
    ///
    /// Holds the catalog lock and a read lock on every item until the new log is
    /// in place, so no commit can land between the snapshot and the swap.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _catalog = self.catalog.lock().await;

        let mut guards = Vec::new();
        for id in self.store.item_ids() {
            if let Some(state) = self.store.get_item(&id) {
                guards.push(state.read_owned().await);
            }
        }

        let mut commits = Vec::with_capacity(guards.len());
        for item in &guards {
            let mut events = vec![Event::ItemAdded {
                id: item.id,
                name: item.name.clone(),
                rate_per_day: item.rate_per_day,
                under_maintenance: item.under_maintenance,
            }];
            for reservation in &item.reservations {
                events.push(Event::ReservationConfirmed {
                    reservation: reservation.clone(),
                });
                if let Some(payment) = self.store.payments.get(&reservation.id) {
                    events.push(Event::PaymentRecorded {
                        item_id: item.id,
                        payment,
                    });
                }
            }
            commits.push(events);
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact {
                commits,
                response: tx,
            })
            .await
            .map_err(|_| EngineError::TransactionFailure("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::TransactionFailure("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::TransactionFailure(e.to_string()))?;

        info!("compacted WAL to {} items", guards.len());
        Ok(())
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
