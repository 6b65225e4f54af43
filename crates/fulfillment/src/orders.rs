//! Checkout and the order life cycle.

use std::collections::HashMap;
use std::time::Instant;

use chrono::Utc;
use common::{OrderId, OrderItemId, Page, PageRequest, UserId};
use domain::{
    Charges, FulfillmentStatus, NewOrder, Order, OrderItem, OrderNumber, OrderStatus,
    PaymentStatus, ProductSnapshot, Status,
};
use store::{OrderFilter, Store, Transaction};

use crate::commands::PlaceOrder;
use crate::config::TransitionPolicy;
use crate::error::{FulfillmentError, Result};
use crate::ledger::{InventoryLedger, lock_sequence};
use crate::notify::NotificationDispatcher;
use crate::tx::finish;

/// Turns carts into orders and moves orders through their statuses.
pub struct OrderWorkflow<S: Store> {
    store: S,
    ledger: InventoryLedger,
    notifications: NotificationDispatcher,
    policy: TransitionPolicy,
}

impl<S: Store> OrderWorkflow<S> {
    pub fn new(store: S, notifications: NotificationDispatcher, policy: TransitionPolicy) -> Self {
        Self {
            store,
            ledger: InventoryLedger::new(),
            notifications,
            policy,
        }
    }

    /// Places an order from the user's cart.
    ///
    /// Stock is reserved, the order is stored as `PENDING` and the cart is
    /// emptied in one transaction. The customer and every vendor involved
    /// are notified after commit.
    #[tracing::instrument(skip(self, cmd), fields(user_id = %cmd.user_id))]
    pub async fn place_order(&self, cmd: PlaceOrder) -> Result<Order> {
        let started = Instant::now();

        let mut tx = self.store.begin().await?;
        let outcome = self.place_in(&mut tx, cmd).await;
        let order = match finish(tx, outcome).await {
            Ok(order) => order,
            Err(err) => {
                metrics::counter!("checkout_rejected_total", "reason" => err.kind().as_str())
                    .increment(1);
                tracing::warn!(error = %err, "checkout rejected");
                return Err(err);
            }
        };

        let duration = started.elapsed().as_secs_f64();
        metrics::histogram!("checkout_duration_seconds").record(duration);
        metrics::counter!("orders_placed_total").increment(1);
        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            items = order.items().len(),
            total = %order.total(),
            duration,
            "order placed"
        );

        self.notifications.order_placed(&order);
        Ok(order)
    }

    async fn place_in(&self, tx: &mut S::Tx, cmd: PlaceOrder) -> Result<Order> {
        cmd.shipping.validate()?;
        if !tx.user_exists(cmd.user_id).await? {
            return Err(FulfillmentError::UserNotFound(cmd.user_id));
        }
        let mut cart = match tx.cart_for_update(cmd.user_id).await? {
            Some(cart) if !cart.is_empty() => cart,
            _ => return Err(FulfillmentError::EmptyCart),
        };

        // Validate every line before touching stock. Rows are locked in
        // product id order; the order items keep the cart's order.
        let moves = lock_sequence(cart.lines.iter().map(|line| (line.product_id, line.quantity)));
        let mut products = HashMap::with_capacity(moves.len());
        for &(product_id, quantity) in &moves {
            let product = self
                .ledger
                .check_available(tx, product_id, quantity)
                .await?;
            products.insert(product_id, product);
        }
        let mut items = Vec::with_capacity(cart.lines.len());
        for line in &cart.lines {
            let product = products
                .get(&line.product_id)
                .ok_or(FulfillmentError::ProductNotFound(line.product_id))?;
            items.push(OrderItem::new(
                ProductSnapshot::from(product),
                line.quantity,
                line.unit_price,
            )?);
        }
        for &(product_id, quantity) in &moves {
            self.ledger.reserve(tx, product_id, quantity).await?;
        }

        let now = Utc::now();
        let billing = cmd.billing.unwrap_or_default().resolve(&cmd.shipping);
        let order = Order::new(
            NewOrder {
                id: OrderId::new(),
                user_id: cmd.user_id,
                order_number: OrderNumber::generate(now),
                charges: Charges {
                    discount: cart.effective_discount(),
                    ..Charges::default()
                },
                coupon_code: cart.coupon_code.clone(),
                shipping_address: cmd.shipping,
                billing_address: billing,
                notes: cmd.notes.filter(|notes| !notes.trim().is_empty()),
                created_at: now,
            },
            items,
        );
        tx.insert_order(&order).await?;

        cart.clear(now);
        tx.save_cart(&cart).await?;

        tracing::debug!(
            order_number = %order.order_number,
            vendors = order.items_by_vendor().len(),
            "order assembled"
        );
        Ok(order)
    }

    /// Returns one of the caller's orders.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, user_id: UserId, order_id: OrderId) -> Result<Order> {
        let mut tx = self.store.begin().await?;
        let outcome: Result<Order> = async {
            let order = tx
                .order(order_id)
                .await?
                .ok_or(FulfillmentError::OrderNotFound(order_id))?;
            ensure_owner(&order, user_id)?;
            Ok(order)
        }
        .await;
        finish(tx, outcome).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_order_by_number(&self, user_id: UserId, order_number: &str) -> Result<Order> {
        let number = OrderNumber::new(order_number.trim());
        let mut tx = self.store.begin().await?;
        let outcome: Result<Order> = async {
            let order = tx
                .order_by_number(&number)
                .await?
                .ok_or_else(|| FulfillmentError::OrderNumberNotFound(number.to_string()))?;
            ensure_owner(&order, user_id)?;
            Ok(order)
        }
        .await;
        finish(tx, outcome).await
    }

    /// Lists orders newest first. An empty filter lists every order.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders(&self, filter: OrderFilter, page: PageRequest) -> Result<Page<Order>> {
        let mut tx = self.store.begin().await?;
        let outcome: Result<Page<Order>> = tx.list_orders(filter, page).await.map_err(Into::into);
        finish(tx, outcome).await
    }

    /// Cancels a `PENDING` or `CONFIRMED` order and puts its stock back.
    ///
    /// A payment still waiting for the gateway is cancelled with it.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, user_id: UserId, order_id: OrderId) -> Result<Order> {
        let mut tx = self.store.begin().await?;
        let outcome = self.cancel_in(&mut tx, user_id, order_id).await;
        let order = finish(tx, outcome).await?;

        metrics::counter!("orders_cancelled_total").increment(1);
        tracing::info!(%order_id, order_number = %order.order_number, "order cancelled");
        Ok(order)
    }

    async fn cancel_in(
        &self,
        tx: &mut S::Tx,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Order> {
        let mut order = lock_order(tx, order_id).await?;
        ensure_owner(&order, user_id)?;
        if !order.status.can_cancel() {
            return Err(FulfillmentError::InvalidState(format!(
                "Order cannot be cancelled in current status: {}",
                order.status
            )));
        }

        let moves = lock_sequence(
            order
                .items()
                .iter()
                .map(|item| (item.product_id(), item.quantity)),
        );
        for (product_id, quantity) in moves {
            self.ledger.release(tx, product_id, quantity).await?;
        }
        let now = Utc::now();
        order.cancel(now);
        tx.update_order(&order).await?;

        if let Some(mut payment) = tx.payment_by_order(order_id).await?
            && payment.status == PaymentStatus::Pending
        {
            payment.status = PaymentStatus::Cancelled;
            payment.updated_at = now;
            tx.update_payment(&payment).await?;
        }
        Ok(order)
    }

    /// Moves an order to any known status (admin).
    ///
    /// Whether moves outside the transition table are allowed depends on
    /// the configured [`TransitionPolicy`]. Entering `DELIVERED` notifies
    /// the customer.
    #[tracing::instrument(skip(self))]
    pub async fn update_order_status(&self, order_id: OrderId, status: &str) -> Result<Order> {
        let next = OrderStatus::parse(status)?;
        let mut tx = self.store.begin().await?;
        let outcome: Result<(Order, OrderStatus)> = async {
            let mut order = lock_order(&mut tx, order_id).await?;
            let previous = order.status;
            self.policy.admit(previous, next)?;
            order.set_status(next, Utc::now());
            tx.update_order(&order).await?;
            Ok((order, previous))
        }
        .await;
        let (order, previous) = finish(tx, outcome).await?;

        metrics::counter!("order_status_updates_total", "status" => next.as_str()).increment(1);
        tracing::info!(%order_id, from = %previous, to = %next, "order status updated");
        if next == OrderStatus::Delivered && previous != OrderStatus::Delivered {
            self.notifications.order_delivered(&order);
        }
        Ok(order)
    }

    /// Records shipment tracking details (admin).
    #[tracing::instrument(skip(self))]
    pub async fn update_tracking(
        &self,
        order_id: OrderId,
        tracking_number: &str,
        carrier: Option<String>,
    ) -> Result<Order> {
        let tracking_number = tracking_number.trim();
        if tracking_number.is_empty() {
            return Err(domain::DomainError::MissingField {
                field: "tracking_number",
            }
            .into());
        }
        let mut tx = self.store.begin().await?;
        let outcome: Result<Order> = async {
            let mut order = lock_order(&mut tx, order_id).await?;
            order.set_tracking(tracking_number, carrier, Utc::now());
            tx.update_order(&order).await?;
            Ok(order)
        }
        .await;
        finish(tx, outcome).await
    }

    /// Moves a single order item through its fulfillment states (admin or vendor).
    #[tracing::instrument(skip(self))]
    pub async fn update_item_fulfillment(
        &self,
        order_id: OrderId,
        item_id: OrderItemId,
        status: &str,
    ) -> Result<Order> {
        let next = FulfillmentStatus::parse(status)?;
        let mut tx = self.store.begin().await?;
        let outcome: Result<Order> = async {
            let mut order = lock_order(&mut tx, order_id).await?;
            let current = order
                .item(item_id)
                .map(|item| item.fulfillment_status)
                .ok_or_else(|| domain::DomainError::ItemNotFound {
                    item_id: item_id.to_string(),
                })?;
            self.policy.admit(current, next)?;
            order.set_item_fulfillment(item_id, next, Utc::now())?;
            tx.update_order(&order).await?;
            Ok(order)
        }
        .await;
        let order = finish(tx, outcome).await?;
        tracing::info!(%order_id, %item_id, status = %next, "item fulfillment updated");
        Ok(order)
    }
}

pub(crate) async fn lock_order<T: Transaction>(tx: &mut T, order_id: OrderId) -> Result<Order> {
    tx.order_for_update(order_id)
        .await?
        .ok_or(FulfillmentError::OrderNotFound(order_id))
}

pub(crate) fn ensure_owner(order: &Order, user_id: UserId) -> Result<()> {
    if order.is_owned_by(user_id) {
        Ok(())
    } else {
        Err(FulfillmentError::NotOwner { order_id: order.id })
    }
}
