//! Domain error types.

use thiserror::Error;

/// Errors raised by entity invariants and state machines.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// A status string did not name any known status.
    #[error("Unknown {kind} status: {value}")]
    UnknownStatus { kind: &'static str, value: String },

    /// A state machine refused a move.
    #[error("Illegal {kind} transition: {from} -> {to}")]
    IllegalTransition {
        kind: &'static str,
        from: &'static str,
        to: &'static str,
    },

    /// Quantity must be at least one.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// Discount must be non-negative and not exceed the subtotal.
    #[error("Invalid discount: {discount} (subtotal {subtotal})")]
    InvalidDiscount { discount: i64, subtotal: i64 },

    /// Price times quantity does not fit in a money amount.
    #[error("Amount overflow: {quantity} x {unit_price} cents")]
    AmountOverflow { quantity: u32, unit_price: i64 },

    /// A required field was blank.
    #[error("Missing required field: {field}")]
    MissingField { field: &'static str },

    /// No cart line exists for the product.
    #[error("Product not found in cart: {product_id}")]
    LineNotFound { product_id: String },

    /// No order item with the given id.
    #[error("Order item not found: {item_id}")]
    ItemNotFound { item_id: String },
}

pub type Result<T> = std::result::Result<T, DomainError>;
