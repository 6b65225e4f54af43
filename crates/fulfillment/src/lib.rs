//! Order fulfillment for a multi-vendor marketplace.
//!
//! The workflows, leaves first:
//! - [`InventoryLedger`]: reserves and releases product stock
//! - [`CartStore`]: per-user carts, checked against the live catalog
//! - [`OrderWorkflow`]: checkout, cancellation and admin status moves
//! - [`PaymentWorkflow`]: the single payment of an order, kept in step
//!   with the order status
//! - [`NotificationDispatcher`]: fire-and-forget customer and vendor
//!   notifications, sent after commit
//!
//! Every public operation runs in one store transaction; any error rolls
//! the whole operation back. [`Marketplace`] bundles all of it.

pub mod cart;
pub mod commands;
pub mod config;
pub mod error;
pub mod ledger;
pub mod notify;
pub mod orders;
pub mod payments;
pub mod service;
mod tx;

pub use cart::{CartLineView, CartStore, CartView};
pub use commands::{ConfirmPayment, InitiatePayment, PlaceOrder};
pub use config::{FulfillmentConfig, TransitionPolicy};
pub use error::{ErrorKind, FulfillmentError, Result};
pub use ledger::InventoryLedger;
pub use notify::{
    NotificationDispatcher, NotificationEvent, Notifier, NotifyError, RecordingNotifier,
    TracingNotifier,
};
pub use orders::OrderWorkflow;
pub use payments::PaymentWorkflow;
pub use service::Marketplace;
pub use store::OrderFilter;
