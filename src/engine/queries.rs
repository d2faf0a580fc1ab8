use chrono::NaiveDate;
use rust_decimal::Decimal;
use ulid::Ulid;

use crate::model::*;

use super::conflict::{today, validate_range};
use super::pricing::price;
use super::{Engine, EngineError};

impl Engine {
    pub async fn get_item(&self, item_id: Ulid) -> Result<ItemInfo, EngineError> {
        let state = self
            .store
            .get_item(&item_id)
            .ok_or(EngineError::ItemNotFound(item_id))?;
        let guard = state.read().await;
        Ok(guard.info(today()))
    }

    /// Price preview for renting `item_id` over `[start, end]`. Writes nothing and
    /// does not look at availability.
    pub async fn quote(
        &self,
        item_id: Ulid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Decimal, EngineError> {
        let state = self
            .store
            .get_item(&item_id)
            .ok_or(EngineError::ItemNotFound(item_id))?;
        let rate = state.read().await.rate_per_day;
        validate_range(&DateRange::new(start, end))?;
        price(start, end, rate)
    }

    pub async fn get_reservation(&self, reservation_id: Ulid) -> Result<ReservationView, EngineError> {
        self.reservation_view(&reservation_id)
            .await
            .ok_or(EngineError::ReservationNotFound(reservation_id))
    }

    /// All reservations of `user_id`, cancelled included, latest start date first.
    pub async fn list_user_reservations(&self, user_id: Ulid) -> Vec<ReservationView> {
        let mut views = Vec::new();
        for id in self.store.reservations_of_user(&user_id) {
            if let Some(view) = self.reservation_view(&id).await {
                views.push(view);
            }
        }
        views.sort_by(|a, b| {
            b.start_date
                .cmp(&a.start_date)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        views
    }

    /// The reservation `user_id` created most recently.
    pub async fn latest_reservation(&self, user_id: Ulid) -> Result<ReservationView, EngineError> {
        let mut latest: Option<ReservationView> = None;
        for id in self.store.reservations_of_user(&user_id) {
            if let Some(view) = self.reservation_view(&id).await {
                let newer = latest
                    .as_ref()
                    .is_none_or(|cur| (view.created_at, view.id) > (cur.created_at, cur.id));
                if newer {
                    latest = Some(view);
                }
            }
        }
        latest.ok_or(EngineError::NoReservations(user_id))
    }

    /// Payment of a reservation owned by `user_id`.
    pub async fn get_payment(&self, reservation_id: Ulid, user_id: Ulid) -> Result<Payment, EngineError> {
        let owned = self
            .reservation_view(&reservation_id)
            .await
            .is_some_and(|v| v.user_id == user_id);
        if !owned {
            return Err(EngineError::ReservationNotFound(reservation_id));
        }
        self.store
            .payments
            .get(&reservation_id)
            .ok_or(EngineError::PaymentNotFound(reservation_id))
    }

    async fn reservation_view(&self, reservation_id: &Ulid) -> Option<ReservationView> {
        let item_id = self.store.item_for_reservation(reservation_id)?;
        let state = self.store.get_item(&item_id)?;
        let guard = state.read().await;
        let reservation = guard.reservation(reservation_id)?;
        let payment = self.store.payments.get(reservation_id);
        Some(ReservationView::new(reservation, &guard.name, payment.as_ref()))
    }
}
