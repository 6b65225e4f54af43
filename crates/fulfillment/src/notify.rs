//! Outbound order notifications.
//!
//! Notifications are emitted after the owning transaction has committed and
//! run on their own task. A failed delivery is logged and counted; it never
//! reaches the caller of the workflow operation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use common::{OrderId, VendorId};
use domain::{Order, OrderItem};
use thiserror::Error;
use tokio::task::JoinHandle;

/// A delivery attempt that did not go through.
#[derive(Debug, Clone, Error)]
#[error("Notification failed: {0}")]
pub struct NotifyError(pub String);

/// Something worth telling a customer or vendor about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    /// The customer's order was placed.
    OrderConfirmed { order: Order },
    /// One vendor's share of a placed order.
    VendorNotified {
        order: Order,
        vendor_id: VendorId,
        items: Vec<OrderItem>,
    },
    OrderDelivered { order: Order },
}

impl NotificationEvent {
    pub fn name(&self) -> &'static str {
        match self {
            NotificationEvent::OrderConfirmed { .. } => "order_confirmed",
            NotificationEvent::VendorNotified { .. } => "vendor_notified",
            NotificationEvent::OrderDelivered { .. } => "order_delivered",
        }
    }

    pub fn order(&self) -> &Order {
        match self {
            NotificationEvent::OrderConfirmed { order }
            | NotificationEvent::VendorNotified { order, .. }
            | NotificationEvent::OrderDelivered { order } => order,
        }
    }
}

/// Delivery channel for notifications (email, push, queue, ...).
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn order_confirmed(&self, order: &Order) -> Result<(), NotifyError>;

    async fn vendor_notified(
        &self,
        order: &Order,
        vendor_id: VendorId,
        items: &[OrderItem],
    ) -> Result<(), NotifyError>;

    async fn order_delivered(&self, order: &Order) -> Result<(), NotifyError>;
}

/// Fire-and-forget front of a [`Notifier`].
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Tells the customer about a placed order, and each vendor about
    /// only its own items.
    pub fn order_placed(&self, order: &Order) -> Vec<JoinHandle<()>> {
        let mut handles = vec![self.dispatch(NotificationEvent::OrderConfirmed {
            order: order.clone(),
        })];
        for (vendor_id, items) in order.items_by_vendor() {
            handles.push(self.dispatch(NotificationEvent::VendorNotified {
                order: order.clone(),
                vendor_id,
                items,
            }));
        }
        handles
    }

    pub fn order_delivered(&self, order: &Order) -> JoinHandle<()> {
        self.dispatch(NotificationEvent::OrderDelivered {
            order: order.clone(),
        })
    }

    /// Spawns delivery of one event.
    pub fn dispatch(&self, event: NotificationEvent) -> JoinHandle<()> {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            let outcome = match &event {
                NotificationEvent::OrderConfirmed { order } => notifier.order_confirmed(order).await,
                NotificationEvent::VendorNotified {
                    order,
                    vendor_id,
                    items,
                } => notifier.vendor_notified(order, *vendor_id, items).await,
                NotificationEvent::OrderDelivered { order } => notifier.order_delivered(order).await,
            };
            if let Err(err) = outcome {
                let order_id: OrderId = event.order().id;
                metrics::counter!("notifications_failed_total", "event" => event.name())
                    .increment(1);
                tracing::warn!(%order_id, event = event.name(), error = %err, "notification failed");
            }
        })
    }
}

/// Notifier that only writes log lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn order_confirmed(&self, order: &Order) -> Result<(), NotifyError> {
        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            user_id = %order.user_id,
            total = %order.total(),
            "order confirmation sent"
        );
        Ok(())
    }

    async fn vendor_notified(
        &self,
        order: &Order,
        vendor_id: VendorId,
        items: &[OrderItem],
    ) -> Result<(), NotifyError> {
        tracing::info!(
            order_number = %order.order_number,
            %vendor_id,
            items = items.len(),
            "vendor notified of new order"
        );
        Ok(())
    }

    async fn order_delivered(&self, order: &Order) -> Result<(), NotifyError> {
        tracing::info!(
            order_number = %order.order_number,
            user_id = %order.user_id,
            "delivery notification sent"
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
struct RecordingState {
    events: Mutex<Vec<NotificationEvent>>,
    fail: AtomicBool,
}

/// Notifier that keeps every event it receives, for tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    state: Arc<RecordingState>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following delivery fail (events are still recorded).
    pub fn set_fail(&self, fail: bool) {
        self.state.fail.store(fail, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<NotificationEvent> {
        self.state
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Waits until at least `count` events arrived or `timeout` elapsed,
    /// and returns what was recorded.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<NotificationEvent> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let events = self.events();
            if events.len() >= count || tokio::time::Instant::now() >= deadline {
                return events;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    fn record(&self, event: NotificationEvent) -> Result<(), NotifyError> {
        let name = event.name();
        self.state
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
        if self.state.fail.load(Ordering::SeqCst) {
            return Err(NotifyError(format!("{name} rejected")));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn order_confirmed(&self, order: &Order) -> Result<(), NotifyError> {
        self.record(NotificationEvent::OrderConfirmed {
            order: order.clone(),
        })
    }

    async fn vendor_notified(
        &self,
        order: &Order,
        vendor_id: VendorId,
        items: &[OrderItem],
    ) -> Result<(), NotifyError> {
        self.record(NotificationEvent::VendorNotified {
            order: order.clone(),
            vendor_id,
            items: items.to_vec(),
        })
    }

    async fn order_delivered(&self, order: &Order) -> Result<(), NotifyError> {
        self.record(NotificationEvent::OrderDelivered {
            order: order.clone(),
        })
    }
}
