use async_trait::async_trait;
use rust_decimal::Decimal;
use ulid::Ulid;

use crate::model::PaymentStatus;

pub const DEFAULT_PAYMENT_METHOD: &str = "credit_card";

/// Charges a reservation. Called with the item locked, right before the
/// reservation and its payment are committed.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Payment method recorded on every payment this gateway takes.
    fn method(&self) -> &str;

    async fn charge(&self, reservation_id: Ulid, amount: Decimal) -> PaymentStatus;

    /// Void a completed charge whose reservation failed to commit.
    async fn refund(&self, reservation_id: Ulid, amount: Decimal);
}

/// Accepts every charge. No money moves.
#[derive(Debug, Clone)]
pub struct SimulatedGateway {
    method: String,
}

impl SimulatedGateway {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
        }
    }
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self::new(DEFAULT_PAYMENT_METHOD)
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    fn method(&self) -> &str {
        &self.method
    }

    async fn charge(&self, reservation_id: Ulid, amount: Decimal) -> PaymentStatus {
        tracing::debug!(%reservation_id, %amount, method = %self.method, "simulated charge");
        PaymentStatus::Completed
    }

    async fn refund(&self, reservation_id: Ulid, amount: Decimal) {
        tracing::debug!(%reservation_id, %amount, method = %self.method, "simulated refund");
    }
}
