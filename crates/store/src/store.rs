use async_trait::async_trait;
use common::{OrderId, Page, PageRequest, PaymentId, ProductId, UserId};
use domain::{Cart, InventoryItem, Order, OrderNumber, OrderStatus, Payment};

use crate::Result;

/// Constraint names shared by every backend, so callers can tell which
/// uniqueness rule a write broke.
pub mod constraints {
    pub const ORDER_NUMBER: &str = "orders_order_number_key";
    pub const PAYMENT_ORDER: &str = "payments_order_id_key";
    pub const PAYMENT_TRANSACTION: &str = "payments_transaction_id_key";
    pub const CART_USER: &str = "carts_user_id_key";
}

/// Filter for order listings. `None` fields match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub owner: Option<UserId>,
    pub status: Option<OrderStatus>,
}

impl OrderFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn owned_by(user_id: UserId) -> Self {
        Self {
            owner: Some(user_id),
            status: None,
        }
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn matches(&self, order: &Order) -> bool {
        self.owner.is_none_or(|owner| order.user_id == owner)
            && self.status.is_none_or(|status| order.status == status)
    }
}

/// Entry point to a transactional store.
///
/// Every workflow operation runs inside exactly one [`Transaction`] obtained
/// from [`Store::begin`].
#[async_trait]
pub trait Store: Send + Sync + Clone + 'static {
    type Tx: Transaction;

    /// Opens a new transaction.
    async fn begin(&self) -> Result<Self::Tx>;

    /// Checks that the backend is reachable.
    async fn ping(&self) -> Result<()>;
}

/// An open, all-or-nothing unit of work.
///
/// Dropping a transaction without calling [`Transaction::commit`] discards
/// every write made through it.
///
/// `*_for_update` reads lock the row until the transaction ends, so
/// read-modify-write sequences on the same row are serialized.
#[async_trait]
pub trait Transaction: Send {
    async fn user_exists(&mut self, user_id: UserId) -> Result<bool>;

    // Inventory

    async fn product(&mut self, id: ProductId) -> Result<Option<InventoryItem>>;

    async fn product_for_update(&mut self, id: ProductId) -> Result<Option<InventoryItem>>;

    /// Fetches several products; missing ids are skipped.
    async fn products(&mut self, ids: &[ProductId]) -> Result<Vec<InventoryItem>>;

    /// Adds `stock_delta` to the stock and `sold_delta` to the sold count.
    ///
    /// Returns `None`, leaving the row untouched, when the product does not
    /// exist or the stock would become negative.
    async fn adjust_stock(
        &mut self,
        id: ProductId,
        stock_delta: i64,
        sold_delta: i64,
    ) -> Result<Option<InventoryItem>>;

    // Carts

    /// Loads and locks the user's cart.
    async fn cart_for_update(&mut self, user_id: UserId) -> Result<Option<Cart>>;

    /// Inserts the cart unless the user already has one; returns the
    /// user's cart either way, locked.
    async fn insert_cart(&mut self, cart: &Cart) -> Result<Cart>;

    /// Persists lines, coupon and discount of an existing cart.
    async fn save_cart(&mut self, cart: &Cart) -> Result<()>;

    // Orders

    async fn insert_order(&mut self, order: &Order) -> Result<()>;

    async fn order(&mut self, id: OrderId) -> Result<Option<Order>>;

    async fn order_for_update(&mut self, id: OrderId) -> Result<Option<Order>>;

    async fn order_by_number(&mut self, number: &OrderNumber) -> Result<Option<Order>>;

    /// Persists status, tracking fields, and item fulfillment statuses.
    async fn update_order(&mut self, order: &Order) -> Result<()>;

    /// Lists orders newest first.
    async fn list_orders(&mut self, filter: OrderFilter, page: PageRequest) -> Result<Page<Order>>;

    // Payments

    async fn payment(&mut self, id: PaymentId) -> Result<Option<Payment>>;

    async fn payment_for_update(&mut self, id: PaymentId) -> Result<Option<Payment>>;

    async fn payment_by_order(&mut self, order_id: OrderId) -> Result<Option<Payment>>;

    async fn payment_by_transaction(&mut self, transaction_id: &str) -> Result<Option<Payment>>;

    async fn insert_payment(&mut self, payment: &Payment) -> Result<()>;

    async fn update_payment(&mut self, payment: &Payment) -> Result<()>;

    async fn commit(self) -> Result<()>;

    async fn rollback(self) -> Result<()>;
}
