//! Inputs for the workflow operations that take more than a couple of ids.

use common::{OrderId, PaymentId, UserId};
use domain::{Address, BillingInfo, PaymentMethod};
use serde::{Deserialize, Serialize};

/// Checks out the user's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub user_id: UserId,
    pub shipping: Address,
    /// Fields left empty fall back to the shipping address.
    #[serde(default)]
    pub billing: Option<BillingInfo>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl PlaceOrder {
    pub fn new(user_id: UserId, shipping: Address) -> Self {
        Self {
            user_id,
            shipping,
            billing: None,
            notes: None,
        }
    }

    pub fn with_billing(mut self, billing: BillingInfo) -> Self {
        self.billing = Some(billing);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Starts, or restarts after a failure, the payment of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiatePayment {
    pub user_id: UserId,
    pub order_id: OrderId,
    #[serde(flatten)]
    pub method: PaymentMethod,
}

impl InitiatePayment {
    pub fn new(user_id: UserId, order_id: OrderId, method: PaymentMethod) -> Self {
        Self {
            user_id,
            order_id,
            method,
        }
    }
}

/// Gateway callback for a pending payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmPayment {
    pub payment_id: PaymentId,
    pub transaction_id: String,
    pub success: bool,
    #[serde(default)]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub gateway_response: Option<String>,
}

impl ConfirmPayment {
    pub fn succeeded(payment_id: PaymentId, transaction_id: impl Into<String>) -> Self {
        Self {
            payment_id,
            transaction_id: transaction_id.into(),
            success: true,
            failure_reason: None,
            gateway_response: None,
        }
    }

    pub fn failed(
        payment_id: PaymentId,
        transaction_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            payment_id,
            transaction_id: transaction_id.into(),
            success: false,
            failure_reason: Some(reason.into()),
            gateway_response: None,
        }
    }

    pub fn with_gateway_response(mut self, response: impl Into<String>) -> Self {
        self.gateway_response = Some(response.into());
        self
    }
}
