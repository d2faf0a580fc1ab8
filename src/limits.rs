//! Hard limits enforced by the engine and the protocol.

pub const MAX_ITEMS: usize = 100_000;
pub const MAX_NAME_LEN: usize = 256;
pub const MAX_PAYMENT_METHOD_LEN: usize = 64;

/// Longest single rental, in days (inclusive count).
pub const MAX_RENTAL_DAYS: i64 = 366;

/// Upper bound on reservations kept per item, cancelled ones included.
pub const MAX_RESERVATIONS_PER_ITEM: usize = 10_000;

/// Largest accepted per-day rate.
pub const MAX_RATE_PER_DAY: i64 = 1_000_000;

/// Longest accepted request line on the command protocol, in bytes.
pub const MAX_LINE_LEN: usize = 64 * 1024;
