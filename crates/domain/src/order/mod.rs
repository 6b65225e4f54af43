//! Orders: snapshots of a completed checkout.

mod address;
mod model;
mod number;
mod status;

pub use address::{Address, BillingInfo};
pub use model::{Charges, NewOrder, Order, OrderItem, OrderTotals, ProductSnapshot};
pub use number::OrderNumber;
pub use status::{FulfillmentStatus, OrderStatus};
