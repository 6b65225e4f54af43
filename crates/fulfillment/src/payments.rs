//! The payment record of an order and its coupling to order status.
//!
//! | payment move            | order becomes |
//! |-------------------------|---------------|
//! | first initiation        | `CONFIRMED`   |
//! | retry after a failure   | `CONFIRMED`   |
//! | confirmed successful    | `PROCESSING`  |
//! | confirmed failed        | `PENDING`     |

use chrono::Utc;
use common::{OrderId, PaymentId, UserId};
use domain::{GatewayResult, OrderStatus, Payment, PaymentStatus};
use store::{Store, Transaction, constraints};

use crate::commands::{ConfirmPayment, InitiatePayment};
use crate::error::{FulfillmentError, Result};
use crate::orders::{ensure_owner, lock_order};
use crate::tx::finish;

pub const SIMULATED_SUCCESS_RESPONSE: &str = r#"{"status":"success","simulated":true}"#;
pub const SIMULATED_FAILURE_RESPONSE: &str = r#"{"status":"failed","simulated":true}"#;
pub const DEFAULT_FAILURE_REASON: &str = "Simulated payment failure";

/// Drives payments for orders. Gateway callbacks are simulated.
pub struct PaymentWorkflow<S: Store> {
    store: S,
    currency: String,
}

impl<S: Store> PaymentWorkflow<S> {
    pub fn new(store: S, currency: impl Into<String>) -> Self {
        Self {
            store,
            currency: currency.into(),
        }
    }

    /// Creates the order's payment, or resets a failed or cancelled one.
    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id, method = %cmd.method.method))]
    pub async fn initiate(&self, cmd: InitiatePayment) -> Result<Payment> {
        let mut tx = self.store.begin().await?;
        let outcome = self.initiate_in(&mut tx, cmd).await;
        let (payment, retry) = finish(tx, outcome).await?;

        metrics::counter!("payments_initiated_total", "retry" => if retry { "true" } else { "false" })
            .increment(1);
        tracing::info!(
            payment_id = %payment.id,
            amount = %payment.amount,
            currency = %payment.currency,
            retry,
            "payment initiated"
        );
        Ok(payment)
    }

    async fn initiate_in(&self, tx: &mut S::Tx, cmd: InitiatePayment) -> Result<(Payment, bool)> {
        let mut order = lock_order(tx, cmd.order_id).await?;
        ensure_owner(&order, cmd.user_id)?;

        // An active payment is reported as such, whatever the order status.
        let existing = tx.payment_by_order(order.id).await?;
        if let Some(payment) = &existing
            && !payment.status.can_retry()
        {
            return Err(FulfillmentError::PaymentAlreadyInProgress {
                status: payment.status,
            });
        }
        if !order.status.can_initiate_payment() {
            return Err(FulfillmentError::InvalidState(format!(
                "Order is not in a valid status for payment: {}",
                order.status
            )));
        }

        let now = Utc::now();
        let (payment, retry) = match existing {
            Some(mut payment) => {
                payment.retry(cmd.method, now)?;
                tx.update_payment(&payment).await?;
                (payment, true)
            }
            None => {
                let payment =
                    Payment::initiate(order.id, order.total(), &self.currency, cmd.method, now);
                tx.insert_payment(&payment).await?;
                (payment, false)
            }
        };

        order.set_status(OrderStatus::Confirmed, now);
        tx.update_order(&order).await?;
        Ok((payment, retry))
    }

    /// Applies a gateway outcome to a `PENDING` payment and moves the order along.
    #[tracing::instrument(skip(self, cmd), fields(payment_id = %cmd.payment_id, success = cmd.success))]
    pub async fn confirm(&self, cmd: ConfirmPayment) -> Result<Payment> {
        let mut tx = self.store.begin().await?;
        let outcome = self.confirm_in(&mut tx, cmd).await;
        let payment = finish(tx, outcome).await?;
        record_confirmation(&payment);
        Ok(payment)
    }

    async fn confirm_in(&self, tx: &mut S::Tx, cmd: ConfirmPayment) -> Result<Payment> {
        let order_id = tx
            .payment(cmd.payment_id)
            .await?
            .ok_or(FulfillmentError::PaymentNotFound(cmd.payment_id))?
            .order_id;

        // Lock the order before the payment, the same order initiation uses.
        let mut order = lock_order(tx, order_id).await?;
        let mut payment = tx
            .payment_for_update(cmd.payment_id)
            .await?
            .ok_or(FulfillmentError::PaymentNotFound(cmd.payment_id))?;
        ensure_pending(&payment)?;

        if let Some(other) = tx.payment_by_transaction(&cmd.transaction_id).await?
            && other.id != payment.id
        {
            return Err(FulfillmentError::Conflict {
                constraint: constraints::PAYMENT_TRANSACTION.to_string(),
            });
        }

        let now = Utc::now();
        let success = cmd.success;
        payment.confirm(
            GatewayResult {
                transaction_id: cmd.transaction_id,
                success,
                failure_reason: cmd.failure_reason,
                gateway_response: cmd.gateway_response,
            },
            now,
        )?;
        let next = if success {
            OrderStatus::Processing
        } else {
            OrderStatus::Pending
        };
        order.set_status(next, now);

        tx.update_payment(&payment).await?;
        tx.update_order(&order).await?;
        Ok(payment)
    }

    /// Confirms a pending payment as paid with a synthesized transaction id.
    #[tracing::instrument(skip(self))]
    pub async fn simulate_success(&self, payment_id: PaymentId) -> Result<Payment> {
        self.simulate(payment_id, true, None).await
    }

    /// Confirms a pending payment as failed.
    #[tracing::instrument(skip(self))]
    pub async fn simulate_failure(
        &self,
        payment_id: PaymentId,
        reason: Option<String>,
    ) -> Result<Payment> {
        self.simulate(payment_id, false, reason).await
    }

    async fn simulate(
        &self,
        payment_id: PaymentId,
        success: bool,
        reason: Option<String>,
    ) -> Result<Payment> {
        let mut tx = self.store.begin().await?;
        let outcome: Result<Payment> = async {
            let payment = tx
                .payment(payment_id)
                .await?
                .ok_or(FulfillmentError::PaymentNotFound(payment_id))?;
            ensure_pending(&payment)?;
            let cmd = simulated_callback(payment_id, success, reason);
            self.confirm_in(&mut tx, cmd).await
        }
        .await;
        let payment = finish(tx, outcome).await?;
        record_confirmation(&payment);
        Ok(payment)
    }

    /// Returns the payment of one of the caller's orders.
    #[tracing::instrument(skip(self))]
    pub async fn get_by_order(&self, user_id: UserId, order_id: OrderId) -> Result<Payment> {
        let mut tx = self.store.begin().await?;
        let outcome: Result<Payment> = async {
            let order = tx
                .order(order_id)
                .await?
                .ok_or(FulfillmentError::OrderNotFound(order_id))?;
            ensure_owner(&order, user_id)?;
            tx.payment_by_order(order_id)
                .await?
                .ok_or(FulfillmentError::PaymentForOrderNotFound(order_id))
        }
        .await;
        finish(tx, outcome).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_by_transaction(&self, transaction_id: &str) -> Result<Payment> {
        let mut tx = self.store.begin().await?;
        let outcome: Result<Payment> = async {
            tx.payment_by_transaction(transaction_id)
                .await?
                .ok_or_else(|| {
                    FulfillmentError::PaymentForTransactionNotFound(transaction_id.to_string())
                })
        }
        .await;
        finish(tx, outcome).await
    }
}

fn ensure_pending(payment: &Payment) -> Result<()> {
    if payment.status == PaymentStatus::Pending {
        Ok(())
    } else {
        Err(FulfillmentError::InvalidState(format!(
            "Payment is not in pending status: {}",
            payment.status
        )))
    }
}

fn simulated_callback(payment_id: PaymentId, success: bool, reason: Option<String>) -> ConfirmPayment {
    let millis = Utc::now().timestamp_millis();
    if success {
        ConfirmPayment::succeeded(payment_id, format!("SIM-{millis}-{payment_id}"))
            .with_gateway_response(SIMULATED_SUCCESS_RESPONSE)
    } else {
        let reason = reason
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FAILURE_REASON.to_string());
        ConfirmPayment::failed(payment_id, format!("SIM-FAIL-{millis}-{payment_id}"), reason)
            .with_gateway_response(SIMULATED_FAILURE_RESPONSE)
    }
}

fn record_confirmation(payment: &Payment) {
    let outcome = if payment.is_successful() {
        "success"
    } else {
        "failure"
    };
    metrics::counter!("payments_confirmed_total", "outcome" => outcome).increment(1);
    tracing::info!(
        payment_id = %payment.id,
        order_id = %payment.order_id,
        status = %payment.status,
        "payment confirmed"
    );
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use common::{Money, VendorId};
    use domain::{Address, CardDetails, InventoryItem, Order, PaymentMethod};
    use store::InMemoryStore;

    use super::*;
    use crate::cart::CartStore;
    use crate::commands::PlaceOrder;
    use crate::config::TransitionPolicy;
    use crate::error::ErrorKind;
    use crate::notify::{NotificationDispatcher, TracingNotifier};
    use crate::orders::OrderWorkflow;

    struct Fixture {
        store: InMemoryStore,
        orders: OrderWorkflow<InMemoryStore>,
        payments: PaymentWorkflow<InMemoryStore>,
        user: UserId,
    }

    async fn fixture() -> (Fixture, Order) {
        let store = InMemoryStore::new();
        let user = UserId::new();
        store.register_user(user).await;
        let item = InventoryItem::new(VendorId::new(), "Desk", "DSK", Money::from_cents(4500), 5);
        store.upsert_product(item.clone()).await;

        let carts = CartStore::new(store.clone());
        carts.add_line(user, item.id, 1).await.unwrap();
        let orders = OrderWorkflow::new(
            store.clone(),
            NotificationDispatcher::new(Arc::new(TracingNotifier)),
            TransitionPolicy::Unchecked,
        );
        let order = orders
            .place_order(PlaceOrder::new(user, address()))
            .await
            .unwrap();
        let f = Fixture {
            payments: PaymentWorkflow::new(store.clone(), "INR"),
            orders,
            store,
            user,
        };
        (f, order)
    }

    fn address() -> Address {
        Address {
            name: "Devi".into(),
            phone: "1".into(),
            line: "3 Beach Rd".into(),
            city: "Goa".into(),
            state: "GA".into(),
            zip: "403001".into(),
            country: "IN".into(),
        }
    }

    fn card() -> PaymentMethod {
        PaymentMethod {
            method: "CARD".into(),
            provider: Some("stripe".into()),
            card: CardDetails {
                card_last_four: Some("1111".into()),
                card_brand: Some("VISA".into()),
                billing_email: None,
            },
        }
    }

    async fn second_order(f: &Fixture) -> Order {
        let item = InventoryItem::new(VendorId::new(), "Chair", "CHR", Money::from_cents(1500), 5);
        f.store.upsert_product(item.clone()).await;
        CartStore::new(f.store.clone())
            .add_line(f.user, item.id, 1)
            .await
            .unwrap();
        f.orders
            .place_order(PlaceOrder::new(f.user, address()))
            .await
            .unwrap()
    }

    async fn order_status(f: &Fixture, order: &Order) -> OrderStatus {
        f.orders.get_order(f.user, order.id).await.unwrap().status
    }

    #[tokio::test]
    async fn initiate_confirms_order() {
        let (f, order) = fixture().await;
        let payment = f
            .payments
            .initiate(InitiatePayment::new(f.user, order.id, card()))
            .await
            .unwrap();

        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.amount, order.total());
        assert_eq!(payment.currency, "INR");
        assert_eq!(order_status(&f, &order).await, OrderStatus::Confirmed);
    }

    #[tokio::test]
    async fn initiate_checks_owner() {
        let (f, order) = fixture().await;
        let err = f
            .payments
            .initiate(InitiatePayment::new(UserId::new(), order.id, card()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotOwner);
    }

    #[tokio::test]
    async fn second_initiation_conflicts() {
        let (f, order) = fixture().await;
        f.payments
            .initiate(InitiatePayment::new(f.user, order.id, card()))
            .await
            .unwrap();
        let err = f
            .payments
            .initiate(InitiatePayment::new(f.user, order.id, card()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FulfillmentError::PaymentAlreadyInProgress {
                status: PaymentStatus::Pending
            }
        ));
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn success_moves_order_to_processing() {
        let (f, order) = fixture().await;
        let payment = f
            .payments
            .initiate(InitiatePayment::new(f.user, order.id, card()))
            .await
            .unwrap();
        let paid = f.payments.simulate_success(payment.id).await.unwrap();

        assert_eq!(paid.status, PaymentStatus::Completed);
        assert!(paid.paid_at.is_some());
        let tx_id = paid.transaction_id.clone().unwrap();
        assert!(tx_id.starts_with("SIM-"));
        assert!(tx_id.ends_with(&payment.id.to_string()));
        assert_eq!(paid.gateway_response.as_deref(), Some(SIMULATED_SUCCESS_RESPONSE));
        assert_eq!(order_status(&f, &order).await, OrderStatus::Processing);

        let found = f.payments.get_by_transaction(&tx_id).await.unwrap();
        assert_eq!(found.id, payment.id);

        let again = f.payments.simulate_success(payment.id).await.unwrap_err();
        assert_eq!(again.kind(), ErrorKind::InvalidState);

        let completed = f
            .payments
            .initiate(InitiatePayment::new(f.user, order.id, card()))
            .await
            .unwrap_err();
        assert_eq!(completed.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn failure_reverts_order_and_allows_retry() {
        let (f, order) = fixture().await;
        let first = f
            .payments
            .initiate(InitiatePayment::new(f.user, order.id, card()))
            .await
            .unwrap();

        let failed = f.payments.simulate_failure(first.id, None).await.unwrap();
        assert_eq!(failed.status, PaymentStatus::Failed);
        assert_eq!(failed.failure_reason.as_deref(), Some(DEFAULT_FAILURE_REASON));
        assert!(failed.transaction_id.as_deref().unwrap().starts_with("SIM-FAIL-"));
        assert_eq!(order_status(&f, &order).await, OrderStatus::Pending);

        let mut upi = card();
        upi.method = "UPI".into();
        upi.card = CardDetails::default();
        let retried = f
            .payments
            .initiate(InitiatePayment::new(f.user, order.id, upi))
            .await
            .unwrap();
        assert_eq!(retried.id, first.id);
        assert_eq!(retried.status, PaymentStatus::Pending);
        assert_eq!(retried.payment_method, "UPI");
        assert!(retried.failure_reason.is_none());
        assert!(retried.card.card_last_four.is_none());
        assert_eq!(order_status(&f, &order).await, OrderStatus::Confirmed);
    }

    #[tokio::test]
    async fn explicit_confirm_with_reason() {
        let (f, order) = fixture().await;
        let payment = f
            .payments
            .initiate(InitiatePayment::new(f.user, order.id, card()))
            .await
            .unwrap();
        let failed = f
            .payments
            .confirm(ConfirmPayment::failed(payment.id, "GW-9", "card declined"))
            .await
            .unwrap();
        assert_eq!(failed.failure_reason.as_deref(), Some("card declined"));
        assert_eq!(failed.transaction_id.as_deref(), Some("GW-9"));
    }

    #[tokio::test]
    async fn transaction_id_cannot_be_reused() {
        let (f, order) = fixture().await;
        let payment = f
            .payments
            .initiate(InitiatePayment::new(f.user, order.id, card()))
            .await
            .unwrap();
        f.payments
            .confirm(ConfirmPayment::failed(payment.id, "GW-1", "declined"))
            .await
            .unwrap();
        f.payments
            .initiate(InitiatePayment::new(f.user, order.id, card()))
            .await
            .unwrap();

        // Retrying keeps the previous transaction id on the same row, which is fine.
        let ok = f
            .payments
            .confirm(ConfirmPayment::succeeded(payment.id, "GW-1"))
            .await
            .unwrap();
        assert!(ok.is_successful());

        let second = second_order(&f).await;
        let other = f
            .payments
            .initiate(InitiatePayment::new(f.user, second.id, card()))
            .await
            .unwrap();
        let err = f
            .payments
            .confirm(ConfirmPayment::succeeded(other.id, "GW-1"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FulfillmentError::Conflict { ref constraint } if constraint == constraints::PAYMENT_TRANSACTION
        ));

        // The rejected confirmation left the second payment untouched.
        let untouched = f.payments.get_by_order(f.user, second.id).await.unwrap();
        assert_eq!(untouched.status, PaymentStatus::Pending);
        assert!(untouched.transaction_id.is_none());
    }

    #[tokio::test]
    async fn payment_lookup_is_owner_only() {
        let (f, order) = fixture().await;
        let missing = f.payments.get_by_order(f.user, order.id).await.unwrap_err();
        assert!(matches!(missing, FulfillmentError::PaymentForOrderNotFound(_)));

        f.payments
            .initiate(InitiatePayment::new(f.user, order.id, card()))
            .await
            .unwrap();
        assert!(f.payments.get_by_order(f.user, order.id).await.is_ok());

        let err = f
            .payments
            .get_by_order(UserId::new(), order.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotOwner);
    }

    #[tokio::test]
    async fn unknown_payment() {
        let (f, _) = fixture().await;
        let err = f.payments.simulate_success(PaymentId::new()).await.unwrap_err();
        assert!(matches!(err, FulfillmentError::PaymentNotFound(_)));
        let err = f.payments.get_by_transaction("nope").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
