use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use common::{OrderId, Page, PageRequest, PaymentId, ProductId, UserId};
use domain::{Cart, InventoryItem, Order, OrderNumber, Payment};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    Result, StoreError,
    store::{OrderFilter, Store, Transaction, constraints},
};

#[derive(Debug, Clone, Default)]
struct Tables {
    users: HashSet<UserId>,
    products: HashMap<ProductId, InventoryItem>,
    carts: HashMap<UserId, Cart>,
    orders: HashMap<OrderId, StoredOrder>,
    next_order_seq: u64,
    payments: HashMap<PaymentId, Payment>,
}

#[derive(Debug, Clone)]
struct StoredOrder {
    seq: u64,
    order: Order,
}

/// In-memory store for tests and database-less runs.
///
/// Transactions are fully serialized: [`Store::begin`] takes an exclusive
/// lock that is held until the transaction is committed or dropped. Writes
/// go to a private copy of the tables that replaces the shared state on
/// commit, so an abandoned transaction leaves nothing behind.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user so carts and orders can reference it.
    pub async fn register_user(&self, user_id: UserId) {
        self.tables.lock().await.users.insert(user_id);
    }

    /// Inserts or replaces a catalog product.
    pub async fn upsert_product(&self, product: InventoryItem) {
        self.tables
            .lock()
            .await
            .products
            .insert(product.id, product);
    }

    /// Returns the committed state of a product.
    pub async fn product_snapshot(&self, id: ProductId) -> Option<InventoryItem> {
        self.tables.lock().await.products.get(&id).cloned()
    }

    /// Returns the number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.tables.lock().await.orders.len()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<Self::Tx> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryTransaction { guard, working })
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Transaction over [`InMemoryStore`].
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

impl InMemoryTransaction {
    fn transaction_taken(&self, payment: &Payment) -> bool {
        payment.transaction_id.as_ref().is_some_and(|tx_id| {
            self.working
                .payments
                .values()
                .any(|other| other.id != payment.id && other.transaction_id.as_ref() == Some(tx_id))
        })
    }
}

fn unique_violation(constraint: &str) -> StoreError {
    StoreError::UniqueViolation {
        constraint: constraint.to_string(),
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn user_exists(&mut self, user_id: UserId) -> Result<bool> {
        Ok(self.working.users.contains(&user_id))
    }

    async fn product(&mut self, id: ProductId) -> Result<Option<InventoryItem>> {
        Ok(self.working.products.get(&id).cloned())
    }

    async fn product_for_update(&mut self, id: ProductId) -> Result<Option<InventoryItem>> {
        self.product(id).await
    }

    async fn products(&mut self, ids: &[ProductId]) -> Result<Vec<InventoryItem>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.working.products.get(id).cloned())
            .collect())
    }

    async fn adjust_stock(
        &mut self,
        id: ProductId,
        stock_delta: i64,
        sold_delta: i64,
    ) -> Result<Option<InventoryItem>> {
        let Some(current) = self.working.products.get(&id) else {
            return Ok(None);
        };
        let Some(updated) = current.adjusted(stock_delta, sold_delta) else {
            return Ok(None);
        };
        self.working.products.insert(id, updated.clone());
        Ok(Some(updated))
    }

    async fn cart_for_update(&mut self, user_id: UserId) -> Result<Option<Cart>> {
        Ok(self.working.carts.get(&user_id).cloned())
    }

    async fn insert_cart(&mut self, cart: &Cart) -> Result<Cart> {
        let stored = self
            .working
            .carts
            .entry(cart.user_id)
            .or_insert_with(|| cart.clone());
        Ok(stored.clone())
    }

    async fn save_cart(&mut self, cart: &Cart) -> Result<()> {
        self.working.carts.insert(cart.user_id, cart.clone());
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        if self
            .working
            .orders
            .values()
            .any(|stored| stored.order.order_number == order.order_number)
        {
            return Err(unique_violation(constraints::ORDER_NUMBER));
        }
        if self.working.orders.contains_key(&order.id) {
            return Err(unique_violation("orders_pkey"));
        }
        let seq = self.working.next_order_seq;
        self.working.next_order_seq += 1;
        self.working.orders.insert(
            order.id,
            StoredOrder {
                seq,
                order: order.clone(),
            },
        );
        Ok(())
    }

    async fn order(&mut self, id: OrderId) -> Result<Option<Order>> {
        Ok(self
            .working
            .orders
            .get(&id)
            .map(|stored| stored.order.clone()))
    }

    async fn order_for_update(&mut self, id: OrderId) -> Result<Option<Order>> {
        self.order(id).await
    }

    async fn order_by_number(&mut self, number: &OrderNumber) -> Result<Option<Order>> {
        Ok(self
            .working
            .orders
            .values()
            .find(|stored| &stored.order.order_number == number)
            .map(|stored| stored.order.clone()))
    }

    async fn update_order(&mut self, order: &Order) -> Result<()> {
        if let Some(stored) = self.working.orders.get_mut(&order.id) {
            stored.order = order.clone();
        }
        Ok(())
    }

    async fn list_orders(&mut self, filter: OrderFilter, page: PageRequest) -> Result<Page<Order>> {
        let mut matching: Vec<&StoredOrder> = self
            .working
            .orders
            .values()
            .filter(|stored| filter.matches(&stored.order))
            .collect();
        matching.sort_by(|a, b| {
            b.order
                .created_at
                .cmp(&a.order.created_at)
                .then(b.seq.cmp(&a.seq))
        });

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .map(|stored| stored.order.clone())
            .collect();
        Ok(Page::new(items, page, total))
    }

    async fn payment(&mut self, id: PaymentId) -> Result<Option<Payment>> {
        Ok(self.working.payments.get(&id).cloned())
    }

    async fn payment_for_update(&mut self, id: PaymentId) -> Result<Option<Payment>> {
        self.payment(id).await
    }

    async fn payment_by_order(&mut self, order_id: OrderId) -> Result<Option<Payment>> {
        Ok(self
            .working
            .payments
            .values()
            .find(|payment| payment.order_id == order_id)
            .cloned())
    }

    async fn payment_by_transaction(&mut self, transaction_id: &str) -> Result<Option<Payment>> {
        Ok(self
            .working
            .payments
            .values()
            .find(|payment| payment.transaction_id.as_deref() == Some(transaction_id))
            .cloned())
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<()> {
        if self
            .working
            .payments
            .values()
            .any(|other| other.order_id == payment.order_id)
        {
            return Err(unique_violation(constraints::PAYMENT_ORDER));
        }
        if self.transaction_taken(payment) {
            return Err(unique_violation(constraints::PAYMENT_TRANSACTION));
        }
        self.working.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn update_payment(&mut self, payment: &Payment) -> Result<()> {
        if self.transaction_taken(payment) {
            return Err(unique_violation(constraints::PAYMENT_TRANSACTION));
        }
        if let Some(stored) = self.working.payments.get_mut(&payment.id) {
            *stored = payment.clone();
        }
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        let InMemoryTransaction { mut guard, working } = self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}
