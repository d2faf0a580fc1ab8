use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::EngineError;

pub(crate) fn now() -> DateTime<Utc> {
    Utc::now()
}

pub(crate) fn today() -> NaiveDate {
    now().date_naive()
}

pub(crate) fn validate_range(range: &DateRange) -> Result<(), EngineError> {
    if !range.is_valid() {
        return Err(EngineError::InvalidDateRange(*range));
    }
    if range.days() > MAX_RENTAL_DAYS {
        return Err(EngineError::LimitExceeded("rental period too long"));
    }
    Ok(())
}

/// Reservations start today at the earliest.
pub(crate) fn check_not_past(range: &DateRange, today: NaiveDate) -> Result<(), EngineError> {
    if range.start < today {
        return Err(EngineError::InvalidDateRange(*range));
    }
    Ok(())
}

/// Id of the first non-cancelled reservation on `item` sharing at least one day with `range`.
pub fn has_conflict(item: &ItemState, range: &DateRange) -> Option<Ulid> {
    item.overlapping(range)
        .find(|r| !r.is_cancelled())
        .map(|r| r.id)
}

pub(crate) fn check_no_conflict(item: &ItemState, range: &DateRange) -> Result<(), EngineError> {
    match has_conflict(item, range) {
        Some(id) => Err(EngineError::DateConflict(id)),
        None => Ok(()),
    }
}

pub(crate) fn check_available(item: &ItemState, today: NaiveDate) -> Result<(), EngineError> {
    match item.status(today) {
        ItemStatus::Available => Ok(()),
        status => Err(EngineError::ItemUnavailable {
            item_id: item.id,
            status,
        }),
    }
}

/// Cancellation needs at least a full day between `now` and the start of the rental
/// (00:00 UTC on the start date).
pub(crate) fn check_cancellation_window(
    reservation: &Reservation,
    now: DateTime<Utc>,
) -> Result<(), EngineError> {
    let starts_at = reservation.range.start.and_time(NaiveTime::MIN).and_utc();
    if starts_at - now < chrono::Duration::days(1) {
        return Err(EngineError::CancellationWindowClosed {
            reservation_id: reservation.id,
            start: reservation.range.start,
        });
    }
    Ok(())
}
