use async_trait::async_trait;

use crate::{config::PaymentMode, models::Order, storage::new_id};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    Approved { reference: String },
    Declined { reason: String },
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, order: &Order) -> anyhow::Result<PaymentOutcome>;
}

/// Stand-in gateway whose answer is fixed by configuration.
#[derive(Debug, Clone, Copy)]
pub struct MockPaymentGateway {
    mode: PaymentMode,
}

impl MockPaymentGateway {
    pub fn new(mode: PaymentMode) -> Self {
        Self { mode }
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn charge(&self, order: &Order) -> anyhow::Result<PaymentOutcome> {
        tracing::debug!(order_id = %order.id, total = %order.total, mode = ?self.mode, "mock charge");
        Ok(match self.mode {
            PaymentMode::Approve => PaymentOutcome::Approved {
                reference: format!("MOCK-{}", new_id()),
            },
            PaymentMode::Decline => PaymentOutcome::Declined {
                reason: "Payment failed. Please try again.".into(),
            },
        })
    }
}
