//! The one-per-order payment record.

mod status;

pub use status::PaymentStatus;

use chrono::{DateTime, Utc};
use common::{Money, OrderId, PaymentId};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::status::Status;

/// Masked card metadata supplied by the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDetails {
    pub card_last_four: Option<String>,
    pub card_brand: Option<String>,
    pub billing_email: Option<String>,
}

/// How the customer intends to pay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub method: String,
    pub provider: Option<String>,
    #[serde(flatten)]
    pub card: CardDetails,
}

/// Gateway outcome applied by [`Payment::confirm`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayResult {
    pub transaction_id: String,
    pub success: bool,
    pub failure_reason: Option<String>,
    pub gateway_response: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub transaction_id: Option<String>,
    pub payment_method: String,
    pub payment_provider: Option<String>,
    pub amount: Money,
    pub currency: String,
    pub status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub refund_amount: Option<Money>,
    pub refund_reason: Option<String>,
    pub gateway_response: Option<String>,
    pub failure_reason: Option<String>,
    #[serde(flatten)]
    pub card: CardDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Creates a `Pending` payment for the full order amount.
    pub fn initiate(
        order_id: OrderId,
        amount: Money,
        currency: impl Into<String>,
        method: PaymentMethod,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: PaymentId::new(),
            order_id,
            transaction_id: None,
            payment_method: method.method,
            payment_provider: method.provider,
            amount,
            currency: currency.into(),
            status: PaymentStatus::Pending,
            paid_at: None,
            refunded_at: None,
            refund_amount: None,
            refund_reason: None,
            gateway_response: None,
            failure_reason: None,
            card: method.card,
            created_at: now,
            updated_at: now,
        }
    }

    /// Resets a failed or cancelled payment for another attempt.
    pub fn retry(&mut self, method: PaymentMethod, now: DateTime<Utc>) -> Result<()> {
        self.status.ensure_transition(PaymentStatus::Pending)?;
        self.payment_method = method.method;
        self.payment_provider = method.provider;
        self.card = method.card;
        self.failure_reason = None;
        self.status = PaymentStatus::Pending;
        self.updated_at = now;
        Ok(())
    }

    /// Applies a gateway outcome. Only a `Pending` payment can be confirmed.
    pub fn confirm(&mut self, result: GatewayResult, now: DateTime<Utc>) -> Result<()> {
        let next = if result.success {
            PaymentStatus::Completed
        } else {
            PaymentStatus::Failed
        };
        if self.status != PaymentStatus::Pending {
            return Err(crate::DomainError::IllegalTransition {
                kind: PaymentStatus::KIND,
                from: self.status.as_str(),
                to: next.as_str(),
            });
        }
        self.status = next;
        self.transaction_id = Some(result.transaction_id);
        self.gateway_response = result.gateway_response;
        if result.success {
            self.paid_at = Some(now);
        } else {
            self.failure_reason = result.failure_reason;
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn is_successful(&self) -> bool {
        self.status == PaymentStatus::Completed
    }
}
