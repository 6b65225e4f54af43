//! One front door for every marketplace operation.

use std::sync::Arc;

use common::{Money, OrderId, OrderItemId, Page, PageRequest, PaymentId, ProductId, UserId};
use domain::{Order, Payment};
use store::{OrderFilter, Store};

use crate::cart::{CartStore, CartView};
use crate::commands::{ConfirmPayment, InitiatePayment, PlaceOrder};
use crate::config::FulfillmentConfig;
use crate::error::Result;
use crate::notify::{NotificationDispatcher, Notifier};
use crate::orders::OrderWorkflow;
use crate::payments::PaymentWorkflow;

/// Carts, orders and payments over one store.
///
/// Callers pass an already authenticated user id; admin operations take
/// no user id and must be guarded by the caller.
pub struct Marketplace<S: Store> {
    store: S,
    carts: CartStore<S>,
    orders: OrderWorkflow<S>,
    payments: PaymentWorkflow<S>,
}

impl<S: Store> Marketplace<S> {
    pub fn new(store: S, notifier: Arc<dyn Notifier>, config: FulfillmentConfig) -> Self {
        let notifications = NotificationDispatcher::new(notifier);
        Self {
            carts: CartStore::new(store.clone()),
            orders: OrderWorkflow::new(store.clone(), notifications, config.admin_transitions),
            payments: PaymentWorkflow::new(store.clone(), config.currency),
            store,
        }
    }

    pub fn carts(&self) -> &CartStore<S> {
        &self.carts
    }

    pub fn orders(&self) -> &OrderWorkflow<S> {
        &self.orders
    }

    pub fn payments(&self) -> &PaymentWorkflow<S> {
        &self.payments
    }

    /// Checks that the backing store answers.
    pub async fn health(&self) -> Result<()> {
        self.store.ping().await?;
        Ok(())
    }

    // Cart

    pub async fn get_cart(&self, user_id: UserId) -> Result<CartView> {
        self.carts.get(user_id).await
    }

    pub async fn add_to_cart(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartView> {
        self.carts.add_line(user_id, product_id, quantity).await
    }

    pub async fn update_cart_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartView> {
        self.carts
            .set_line_quantity(user_id, product_id, quantity)
            .await
    }

    pub async fn remove_from_cart(&self, user_id: UserId, product_id: ProductId) -> Result<CartView> {
        self.carts.remove_line(user_id, product_id).await
    }

    pub async fn clear_cart(&self, user_id: UserId) -> Result<CartView> {
        self.carts.clear(user_id).await
    }

    pub async fn apply_discount(
        &self,
        user_id: UserId,
        coupon_code: impl Into<String>,
        discount: Money,
    ) -> Result<CartView> {
        self.carts
            .apply_discount(user_id, coupon_code.into(), discount)
            .await
    }

    // Orders

    pub async fn place_order(&self, cmd: PlaceOrder) -> Result<Order> {
        self.orders.place_order(cmd).await
    }

    pub async fn get_order(&self, user_id: UserId, order_id: OrderId) -> Result<Order> {
        self.orders.get_order(user_id, order_id).await
    }

    pub async fn get_order_by_number(&self, user_id: UserId, order_number: &str) -> Result<Order> {
        self.orders.get_order_by_number(user_id, order_number).await
    }

    pub async fn cancel_order(&self, user_id: UserId, order_id: OrderId) -> Result<Order> {
        self.orders.cancel_order(user_id, order_id).await
    }

    /// `OrderFilter::owned_by` for a customer, `OrderFilter::all` for an admin.
    pub async fn list_orders(&self, filter: OrderFilter, page: PageRequest) -> Result<Page<Order>> {
        self.orders.list_orders(filter, page).await
    }

    pub async fn update_order_status(&self, order_id: OrderId, status: &str) -> Result<Order> {
        self.orders.update_order_status(order_id, status).await
    }

    pub async fn update_tracking(
        &self,
        order_id: OrderId,
        tracking_number: &str,
        carrier: Option<String>,
    ) -> Result<Order> {
        self.orders
            .update_tracking(order_id, tracking_number, carrier)
            .await
    }

    pub async fn update_item_fulfillment(
        &self,
        order_id: OrderId,
        item_id: OrderItemId,
        status: &str,
    ) -> Result<Order> {
        self.orders
            .update_item_fulfillment(order_id, item_id, status)
            .await
    }

    // Payments

    pub async fn initiate_payment(&self, cmd: InitiatePayment) -> Result<Payment> {
        self.payments.initiate(cmd).await
    }

    pub async fn confirm_payment(&self, cmd: ConfirmPayment) -> Result<Payment> {
        self.payments.confirm(cmd).await
    }

    pub async fn get_payment_by_order(&self, user_id: UserId, order_id: OrderId) -> Result<Payment> {
        self.payments.get_by_order(user_id, order_id).await
    }

    pub async fn get_payment_by_transaction(&self, transaction_id: &str) -> Result<Payment> {
        self.payments.get_by_transaction(transaction_id).await
    }

    pub async fn simulate_payment_success(&self, payment_id: PaymentId) -> Result<Payment> {
        self.payments.simulate_success(payment_id).await
    }

    pub async fn simulate_payment_failure(
        &self,
        payment_id: PaymentId,
        reason: Option<String>,
    ) -> Result<Payment> {
        self.payments.simulate_failure(payment_id, reason).await
    }
}
