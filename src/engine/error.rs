use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::{DateRange, ItemStatus};

#[derive(Debug)]
pub enum EngineError {
    ItemNotFound(Ulid),
    ItemUnavailable {
        item_id: Ulid,
        status: ItemStatus,
    },
    InvalidDateRange(DateRange),
    /// Overlaps the given existing reservation.
    DateConflict(Ulid),
    ReservationNotFound(Ulid),
    /// The user has no reservations at all.
    NoReservations(Ulid),
    CancellationWindowClosed {
        reservation_id: Ulid,
        start: NaiveDate,
    },
    PaymentDeclined(Ulid),
    PaymentNotFound(Ulid),
    DuplicatePayment(Ulid),
    AlreadyExists(Ulid),
    InvalidRate(String),
    LimitExceeded(&'static str),
    /// Persistence fault inside the atomic unit. Nothing was applied.
    TransactionFailure(String),
}

impl EngineError {
    /// Stable error kind, surfaced to protocol clients.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::ItemNotFound(_) => "ItemNotFound",
            EngineError::ItemUnavailable { .. } => "ItemUnavailable",
            EngineError::InvalidDateRange(_) => "InvalidDateRange",
            EngineError::DateConflict(_) => "DateConflict",
            EngineError::ReservationNotFound(_) | EngineError::NoReservations(_) => {
                "ReservationNotFound"
            }
            EngineError::CancellationWindowClosed { .. } => "CancellationWindowClosed",
            EngineError::PaymentDeclined(_) => "PaymentDeclined",
            EngineError::PaymentNotFound(_) => "PaymentNotFound",
            EngineError::DuplicatePayment(_) => "DuplicatePayment",
            EngineError::AlreadyExists(_) => "AlreadyExists",
            EngineError::InvalidRate(_) => "InvalidRate",
            EngineError::LimitExceeded(_) => "LimitExceeded",
            EngineError::TransactionFailure(_) => "TransactionFailure",
        }
    }

    /// Only persistence faults may succeed when retried with the same input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::TransactionFailure(_))
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::ItemNotFound(id) => write!(f, "item not found: {id}"),
            EngineError::ItemUnavailable { item_id, status } => {
                write!(f, "item {item_id} is not available (status: {status})")
            }
            EngineError::InvalidDateRange(range) => write!(f, "invalid date range: {range}"),
            EngineError::DateConflict(id) => {
                write!(f, "dates conflict with reservation: {id}")
            }
            EngineError::ReservationNotFound(id) => write!(f, "reservation not found: {id}"),
            EngineError::NoReservations(user_id) => {
                write!(f, "no reservations found for user: {user_id}")
            }
            EngineError::CancellationWindowClosed {
                reservation_id,
                start,
            } => write!(
                f,
                "reservation {reservation_id} starts {start}: cannot cancel less than a day before start"
            ),
            EngineError::PaymentDeclined(id) => {
                write!(f, "payment declined for reservation: {id}")
            }
            EngineError::PaymentNotFound(id) => {
                write!(f, "no payment recorded for reservation: {id}")
            }
            EngineError::DuplicatePayment(id) => {
                write!(f, "payment already recorded for reservation: {id}")
            }
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::InvalidRate(rate) => write!(f, "invalid rate per day: {rate}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::TransactionFailure(e) => write!(f, "transaction failed: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
