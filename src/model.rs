use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Inclusive range of calendar days `[start, end]`. Both endpoints are owned days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn is_valid(&self) -> bool {
        self.start <= self.end
    }

    /// Number of owned days, counting both endpoints.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Availability of an item. Never stored: derived from the maintenance flag
/// and the item's active reservations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Available,
    Rented,
    Maintenance,
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemStatus::Available => f.write_str("available"),
            ItemStatus::Rented => f.write_str("rented"),
            ItemStatus::Maintenance => f.write_str("maintenance"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Ulid,
    pub item_id: Ulid,
    pub user_id: Ulid,
    pub range: DateRange,
    pub total_cost: Decimal,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Reservation {
    pub fn is_cancelled(&self) -> bool {
        self.status == ReservationStatus::Cancelled
    }

    /// Non-cancelled and still running or in the future as of `today`.
    pub fn is_active(&self, today: NaiveDate) -> bool {
        !self.is_cancelled() && self.range.end >= today
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Ulid,
    pub reservation_id: Ulid,
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub method: String,
    pub paid_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ItemState {
    pub id: Ulid,
    pub name: String,
    pub rate_per_day: Decimal,
    /// Operator flag; takes precedence over any reservation.
    pub under_maintenance: bool,
    /// All reservations ever made for this item (cancelled included), sorted by `range.start`.
    pub reservations: Vec<Reservation>,
}

impl ItemState {
    pub fn new(id: Ulid, name: String, rate_per_day: Decimal, under_maintenance: bool) -> Self {
        Self {
            id,
            name,
            rate_per_day,
            under_maintenance,
            reservations: Vec::new(),
        }
    }

    /// Insert reservation maintaining sort order by range.start.
    pub fn insert_reservation(&mut self, reservation: Reservation) {
        let pos = self
            .reservations
            .binary_search_by_key(&reservation.range.start, |r| r.range.start)
            .unwrap_or_else(|e| e);
        self.reservations.insert(pos, reservation);
    }

    pub fn reservation(&self, id: &Ulid) -> Option<&Reservation> {
        self.reservations.iter().find(|r| r.id == *id)
    }

    pub fn reservation_mut(&mut self, id: &Ulid) -> Option<&mut Reservation> {
        self.reservations.iter_mut().find(|r| r.id == *id)
    }

    /// Reservations whose range shares at least one day with `query`, cancelled included.
    /// Uses binary search to skip reservations starting after `query.end`.
    pub fn overlapping(&self, query: &DateRange) -> impl Iterator<Item = &Reservation> {
        let right_bound = self
            .reservations
            .partition_point(|r| r.range.start <= query.end);
        self.reservations[..right_bound]
            .iter()
            .filter(move |r| r.range.end >= query.start)
    }

    pub fn active_reservations(&self, today: NaiveDate) -> impl Iterator<Item = &Reservation> {
        self.reservations.iter().filter(move |r| r.is_active(today))
    }

    pub fn status(&self, today: NaiveDate) -> ItemStatus {
        if self.under_maintenance {
            ItemStatus::Maintenance
        } else if self.active_reservations(today).next().is_some() {
            ItemStatus::Rented
        } else {
            ItemStatus::Available
        }
    }

    pub fn info(&self, today: NaiveDate) -> ItemInfo {
        ItemInfo {
            id: self.id,
            name: self.name.clone(),
            rate_per_day: self.rate_per_day,
            status: self.status(today),
        }
    }
}

/// The event types. A WAL entry is one commit: a list of events applied together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ItemAdded {
        id: Ulid,
        name: String,
        rate_per_day: Decimal,
        under_maintenance: bool,
    },
    MaintenanceSet {
        item_id: Ulid,
        under_maintenance: bool,
    },
    ReservationConfirmed {
        reservation: Reservation,
    },
    PaymentRecorded {
        item_id: Ulid,
        payment: Payment,
    },
    ReservationCancelled {
        id: Ulid,
        item_id: Ulid,
        cancelled_at: DateTime<Utc>,
    },
}

impl Event {
    pub fn item_id(&self) -> Ulid {
        match self {
            Event::ItemAdded { id, .. } => *id,
            Event::MaintenanceSet { item_id, .. }
            | Event::PaymentRecorded { item_id, .. }
            | Event::ReservationCancelled { item_id, .. } => *item_id,
            Event::ReservationConfirmed { reservation } => reservation.item_id,
        }
    }
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemInfo {
    pub id: Ulid,
    pub name: String,
    pub rate_per_day: Decimal,
    pub status: ItemStatus,
}

/// Outcome of a successful `reserve`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReservationReceipt {
    pub reservation_id: Ulid,
    pub payment_id: Ulid,
    pub total_cost: Decimal,
}

/// A reservation joined with its item name and payment outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReservationView {
    pub id: Ulid,
    pub item_id: Ulid,
    pub item_name: String,
    pub user_id: Ulid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_cost: Decimal,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub payment_status: Option<PaymentStatus>,
    pub payment_method: Option<String>,
}

impl ReservationView {
    pub fn new(reservation: &Reservation, item_name: &str, payment: Option<&Payment>) -> Self {
        Self {
            id: reservation.id,
            item_id: reservation.item_id,
            item_name: item_name.to_string(),
            user_id: reservation.user_id,
            start_date: reservation.range.start,
            end_date: reservation.range.end,
            total_cost: reservation.total_cost,
            status: reservation.status,
            created_at: reservation.created_at,
            cancelled_at: reservation.cancelled_at,
            payment_status: payment.map(|p| p.status),
            payment_method: payment.map(|p| p.method.clone()),
        }
    }
}
