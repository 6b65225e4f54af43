//! Marketplace domain model.
//!
//! Plain entities and their state machines, free of persistence concerns:
//! - [`InventoryItem`]: the stock-bearing slice of a catalog product
//! - [`Cart`]: a user's pre-checkout lines, coupon and discount
//! - [`Order`]: the immutable snapshot produced by checkout
//! - [`Payment`]: the single payment record attached to an order
//!
//! Every status enum implements [`Status`], which derives legality checks
//! from an explicit transition table.

pub mod cart;
pub mod error;
pub mod inventory;
pub mod order;
pub mod payment;
pub mod status;

pub use cart::{Cart, CartLine};
pub use error::DomainError;
pub use inventory::{InventoryItem, ProductStatus};
pub use order::{
    Address, BillingInfo, Charges, FulfillmentStatus, NewOrder, Order, OrderItem, OrderNumber,
    OrderStatus, OrderTotals, ProductSnapshot,
};
pub use payment::{CardDetails, GatewayResult, Payment, PaymentMethod, PaymentStatus};
pub use status::Status;
