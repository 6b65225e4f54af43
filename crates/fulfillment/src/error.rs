//! Workflow error types.

use common::{OrderId, PaymentId, ProductId, UserId};
use domain::{DomainError, PaymentStatus};
use store::StoreError;
use thiserror::Error;

/// Coarse classification callers map onto their own responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    InvalidState,
    InsufficientStock,
    ProductUnavailable,
    NotOwner,
    Validation,
    Internal,
}

impl ErrorKind {
    /// Stable label, used as a metrics tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::InsufficientStock => "insufficient_stock",
            ErrorKind::ProductUnavailable => "product_unavailable",
            ErrorKind::NotOwner => "not_owner",
            ErrorKind::Validation => "validation",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Errors that can occur while running a workflow operation.
///
/// Any error aborts the surrounding transaction.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    #[error("User not found: {0}")]
    UserNotFound(UserId),

    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("Order not found with number: {0}")]
    OrderNumberNotFound(String),

    #[error("Payment not found: {0}")]
    PaymentNotFound(PaymentId),

    #[error("Payment not found for order: {0}")]
    PaymentForOrderNotFound(OrderId),

    #[error("Payment not found for transaction: {0}")]
    PaymentForTransactionNotFound(String),

    /// The product exists but is not `ACTIVE`.
    #[error("Product is not available: {name}")]
    ProductUnavailable { product_id: ProductId, name: String },

    #[error("Insufficient stock for {name}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        name: String,
        requested: u32,
        available: u32,
    },

    #[error("Cart is empty")]
    EmptyCart,

    /// The entity is not in a status that allows the operation.
    #[error("{0}")]
    InvalidState(String),

    #[error("Order {order_id} does not belong to the caller")]
    NotOwner { order_id: OrderId },

    #[error("Payment already exists for this order with status: {status}")]
    PaymentAlreadyInProgress { status: PaymentStatus },

    /// A uniqueness rule rejected the write.
    #[error("Conflicting write: {constraint}")]
    Conflict { constraint: String },

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl FulfillmentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FulfillmentError::UserNotFound(_)
            | FulfillmentError::ProductNotFound(_)
            | FulfillmentError::OrderNotFound(_)
            | FulfillmentError::OrderNumberNotFound(_)
            | FulfillmentError::PaymentNotFound(_)
            | FulfillmentError::PaymentForOrderNotFound(_)
            | FulfillmentError::PaymentForTransactionNotFound(_) => ErrorKind::NotFound,
            FulfillmentError::ProductUnavailable { .. } => ErrorKind::ProductUnavailable,
            FulfillmentError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            FulfillmentError::EmptyCart | FulfillmentError::InvalidState(_) => {
                ErrorKind::InvalidState
            }
            FulfillmentError::NotOwner { .. } => ErrorKind::NotOwner,
            FulfillmentError::PaymentAlreadyInProgress { .. }
            | FulfillmentError::Conflict { .. } => ErrorKind::Conflict,
            FulfillmentError::Domain(err) => match err {
                DomainError::IllegalTransition { .. } => ErrorKind::InvalidState,
                DomainError::LineNotFound { .. } | DomainError::ItemNotFound { .. } => {
                    ErrorKind::NotFound
                }
                DomainError::UnknownStatus { .. }
                | DomainError::InvalidQuantity { .. }
                | DomainError::InvalidDiscount { .. }
                | DomainError::AmountOverflow { .. }
                | DomainError::MissingField { .. } => ErrorKind::Validation,
            },
            FulfillmentError::Store(_) => ErrorKind::Internal,
        }
    }
}

impl From<StoreError> for FulfillmentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation { constraint } => FulfillmentError::Conflict { constraint },
            other => FulfillmentError::Store(other),
        }
    }
}

/// Convenience type alias for workflow results.
pub type Result<T> = std::result::Result<T, FulfillmentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_becomes_conflict() {
        let err = FulfillmentError::from(StoreError::UniqueViolation {
            constraint: "orders_order_number_key".into(),
        });
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(matches!(err, FulfillmentError::Conflict { ref constraint } if constraint == "orders_order_number_key"));
    }

    #[test]
    fn decode_failures_are_internal() {
        let err = FulfillmentError::from(StoreError::Decode("bad status".into()));
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn domain_errors_are_classified() {
        let illegal = FulfillmentError::from(DomainError::IllegalTransition {
            kind: "payment",
            from: "COMPLETED",
            to: "PENDING",
        });
        assert_eq!(illegal.kind(), ErrorKind::InvalidState);

        let missing = FulfillmentError::from(DomainError::LineNotFound {
            product_id: "p".into(),
        });
        assert_eq!(missing.kind(), ErrorKind::NotFound);
        assert!(missing.to_string().starts_with("Product not found in cart"));

        let quantity = FulfillmentError::from(DomainError::InvalidQuantity { quantity: 0 });
        assert_eq!(quantity.kind(), ErrorKind::Validation);

        let overflow = FulfillmentError::from(DomainError::AmountOverflow {
            quantity: 2,
            unit_price: i64::MAX,
        });
        assert_eq!(overflow.kind(), ErrorKind::Validation);
    }

    #[test]
    fn payment_in_progress_is_a_conflict() {
        let err = FulfillmentError::PaymentAlreadyInProgress {
            status: PaymentStatus::Pending,
        };
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(
            err.to_string(),
            "Payment already exists for this order with status: PENDING"
        );
    }
}
