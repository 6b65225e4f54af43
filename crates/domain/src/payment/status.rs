//! Payment state machine.

use serde::{Deserialize, Serialize};

use crate::status::{Status, status_text};

/// Lifecycle of the single payment attached to an order.
///
/// ```text
/// Pending ──► Processing ──► Completed ──► PartiallyRefunded ──► Refunded
///    │  │          │    │        │                                 ▲
///    │  └──────────┼────┼────────┴─────────────────────────────────┘
///    │             ▼    ▼
///    └──────► Failed  Cancelled ──► Pending (retry)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
    Refunded,
    PartiallyRefunded,
}

impl PaymentStatus {
    /// Returns true if a new attempt may reuse this payment.
    pub fn can_retry(&self) -> bool {
        matches!(self, PaymentStatus::Failed | PaymentStatus::Cancelled)
    }

    pub fn is_refunded(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Refunded | PaymentStatus::PartiallyRefunded
        )
    }
}

impl Status for PaymentStatus {
    const KIND: &'static str = "payment";

    const ALL: &'static [Self] = &[
        PaymentStatus::Pending,
        PaymentStatus::Processing,
        PaymentStatus::Completed,
        PaymentStatus::Failed,
        PaymentStatus::Cancelled,
        PaymentStatus::Refunded,
        PaymentStatus::PartiallyRefunded,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Processing => "PROCESSING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Cancelled => "CANCELLED",
            PaymentStatus::Refunded => "REFUNDED",
            PaymentStatus::PartiallyRefunded => "PARTIALLY_REFUNDED",
        }
    }

    fn transitions(&self) -> &'static [Self] {
        use PaymentStatus::*;
        match self {
            Pending => &[Processing, Completed, Failed, Cancelled],
            Processing => &[Completed, Failed, Cancelled],
            Completed => &[Refunded, PartiallyRefunded],
            PartiallyRefunded => &[Refunded, PartiallyRefunded],
            Failed | Cancelled => &[Pending],
            Refunded => &[],
        }
    }
}

status_text!(PaymentStatus);
