//! Order and order-item state machines.

use serde::{Deserialize, Serialize};

use crate::status::{Status, status_text};

/// Lifecycle of an order.
///
/// ```text
/// Pending ⇄ Confirmed ──► Processing ──► Shipped ──► OutForDelivery ──► Delivered
///    │          │           │    │          │               │
///    └──────────┴───────────┴──► Cancelled  └──────► Returned ◄┘
///                                │
///                                └──► Refunded (from Processing)
/// ```
///
/// `Confirmed → Pending` is the payment-failure rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Placed, awaiting payment.
    #[default]
    Pending,
    /// Payment initiated.
    Confirmed,
    /// Paid, being prepared.
    Processing,
    Shipped,
    OutForDelivery,
    Delivered,
    Cancelled,
    Refunded,
    Returned,
}

impl OrderStatus {
    /// Returns true if the customer may still cancel.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Confirmed)
    }

    /// Returns true if a payment may be initiated.
    pub fn can_initiate_payment(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }
}

impl Status for OrderStatus {
    const KIND: &'static str = "order";

    const ALL: &'static [Self] = &[
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
        OrderStatus::Returned,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::OutForDelivery => "OUT_FOR_DELIVERY",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Refunded => "REFUNDED",
            OrderStatus::Returned => "RETURNED",
        }
    }

    fn transitions(&self) -> &'static [Self] {
        use OrderStatus::*;
        match self {
            Pending => &[Confirmed, Cancelled],
            Confirmed => &[Pending, Processing, Cancelled],
            Processing => &[Shipped, Cancelled, Refunded],
            Shipped => &[OutForDelivery, Delivered, Returned],
            OutForDelivery => &[Delivered, Returned],
            Delivered | Cancelled | Refunded | Returned => &[],
        }
    }
}

status_text!(OrderStatus);

/// Shipping sub-state of a single order item.
///
/// ```text
/// Pending ──► Processing ──► Shipped ──► Delivered ──► Returned
///    │            │             │
///    └────────────┴──► Cancelled└──► Returned
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FulfillmentStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Returned,
}

impl Status for FulfillmentStatus {
    const KIND: &'static str = "fulfillment";

    const ALL: &'static [Self] = &[
        FulfillmentStatus::Pending,
        FulfillmentStatus::Processing,
        FulfillmentStatus::Shipped,
        FulfillmentStatus::Delivered,
        FulfillmentStatus::Cancelled,
        FulfillmentStatus::Returned,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            FulfillmentStatus::Pending => "PENDING",
            FulfillmentStatus::Processing => "PROCESSING",
            FulfillmentStatus::Shipped => "SHIPPED",
            FulfillmentStatus::Delivered => "DELIVERED",
            FulfillmentStatus::Cancelled => "CANCELLED",
            FulfillmentStatus::Returned => "RETURNED",
        }
    }

    fn transitions(&self) -> &'static [Self] {
        use FulfillmentStatus::*;
        match self {
            Pending => &[Processing, Cancelled],
            Processing => &[Shipped, Cancelled],
            Shipped => &[Delivered, Returned],
            Delivered => &[Returned],
            Cancelled | Returned => &[],
        }
    }
}

status_text!(FulfillmentStatus);
