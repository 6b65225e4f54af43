//! Shared types for the marketplace fulfillment workspace.
//!
//! Identifiers are UUID newtypes so that a `ProductId` can never be passed
//! where an `OrderId` is expected. Money is kept in integer minor units.

pub mod money;
pub mod page;
pub mod types;

pub use money::Money;
pub use page::{Page, PageRequest};
pub use types::{CartId, OrderId, OrderItemId, PaymentId, ProductId, UserId, VendorId};
