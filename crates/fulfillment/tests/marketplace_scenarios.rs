//! End-to-end marketplace flows over the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use common::{Money, PageRequest, ProductId, UserId, VendorId};
use domain::{
    Address, CardDetails, FulfillmentStatus, InventoryItem, Order, OrderStatus, PaymentMethod,
    PaymentStatus,
};
use fulfillment::{
    ErrorKind, FulfillmentConfig, FulfillmentError, InitiatePayment, Marketplace, OrderFilter,
    PlaceOrder, RecordingNotifier,
};
use store::InMemoryStore;

struct TestHarness {
    store: InMemoryStore,
    market: Arc<Marketplace<InMemoryStore>>,
    notifier: RecordingNotifier,
}

impl TestHarness {
    fn new() -> Self {
        let store = InMemoryStore::new();
        let notifier = RecordingNotifier::new();
        let market = Marketplace::new(
            store.clone(),
            Arc::new(notifier.clone()),
            FulfillmentConfig::default(),
        );
        Self {
            store,
            market: Arc::new(market),
            notifier,
        }
    }

    async fn user(&self) -> UserId {
        let user = UserId::new();
        self.store.register_user(user).await;
        user
    }

    async fn product(&self, vendor: VendorId, cents: i64, stock: u32) -> ProductId {
        let item = InventoryItem::new(vendor, "Item", "SKU", Money::from_cents(cents), stock);
        let id = item.id;
        self.store.upsert_product(item).await;
        id
    }

    async fn stock(&self, id: ProductId) -> u32 {
        self.store.product_snapshot(id).await.unwrap().stock_quantity
    }

    async fn checkout(&self, user: UserId) -> Result<Order, FulfillmentError> {
        self.market.place_order(PlaceOrder::new(user, address())).await
    }

    async fn pay(&self, user: UserId, order: &Order) -> domain::Payment {
        self.market
            .initiate_payment(InitiatePayment::new(user, order.id, card()))
            .await
            .unwrap()
    }
}

fn address() -> Address {
    Address {
        name: "Ravi Kumar".into(),
        phone: "9000000000".into(),
        line: "12 Park Street".into(),
        city: "Kolkata".into(),
        state: "WB".into(),
        zip: "700016".into(),
        country: "IN".into(),
    }
}

fn card() -> PaymentMethod {
    PaymentMethod {
        method: "CARD".into(),
        provider: Some("razorpay".into()),
        card: CardDetails {
            card_last_four: Some("4242".into()),
            card_brand: Some("VISA".into()),
            billing_email: None,
        },
    }
}

#[tokio::test]
async fn checkout_totals_and_stock() {
    let h = TestHarness::new();
    let user = h.user().await;
    let x = h.product(VendorId::new(), 1000, 10).await;
    let y = h.product(VendorId::new(), 2500, 4).await;

    h.market.add_to_cart(user, x, 2).await.unwrap();
    h.market.add_to_cart(user, y, 1).await.unwrap();
    let order = h.checkout(user).await.unwrap();

    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.subtotal(), Money::from_cents(4500));
    assert_eq!(order.total(), Money::from_cents(4500));
    assert_eq!(order.total_items(), 3);
    assert_eq!(h.stock(x).await, 8);
    assert_eq!(h.stock(y).await, 3);
    assert!(h.market.get_cart(user).await.unwrap().is_empty());

    let item_sum: Money = order.items().iter().map(|item| item.total_price()).sum();
    assert_eq!(order.subtotal(), item_sum);
}

#[tokio::test]
async fn order_total_applies_cart_discount() {
    let h = TestHarness::new();
    let user = h.user().await;
    let x = h.product(VendorId::new(), 2000, 5).await;

    h.market.add_to_cart(user, x, 2).await.unwrap();
    let cart = h
        .market
        .apply_discount(user, "SAVE5", Money::from_cents(500))
        .await
        .unwrap();
    assert_eq!(cart.total, Money::from_cents(3500));

    let order = h.checkout(user).await.unwrap();
    let totals = order.totals();
    assert_eq!(order.coupon_code.as_deref(), Some("SAVE5"));
    assert_eq!(
        totals.total_amount,
        totals.subtotal + totals.shipping_cost + totals.tax_amount - totals.discount_amount
    );
    assert_eq!(order.total(), Money::from_cents(3500));
}

#[tokio::test]
async fn adding_more_than_stock_leaves_cart_unchanged() {
    let h = TestHarness::new();
    let user = h.user().await;
    let z = h.product(VendorId::new(), 700, 3).await;

    let err = h.market.add_to_cart(user, z, 5).await.unwrap_err();

    assert!(matches!(
        err,
        FulfillmentError::InsufficientStock {
            requested: 5,
            available: 3,
            ..
        }
    ));
    let cart = h.market.get_cart(user).await.unwrap();
    assert!(cart.line(z).is_none());
    assert_eq!(h.stock(z).await, 3);
}

#[tokio::test]
async fn failed_payment_can_be_retried() {
    let h = TestHarness::new();
    let user = h.user().await;
    let x = h.product(VendorId::new(), 1200, 5).await;
    h.market.add_to_cart(user, x, 1).await.unwrap();
    let order = h.checkout(user).await.unwrap();

    let payment = h.pay(user, &order).await;
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(payment.amount, order.total());
    let confirmed = h.market.get_order(user, order.id).await.unwrap();
    assert_eq!(confirmed.status, OrderStatus::Confirmed);

    let failed = h
        .market
        .simulate_payment_failure(payment.id, None)
        .await
        .unwrap();
    assert_eq!(failed.status, PaymentStatus::Failed);
    assert!(failed.failure_reason.is_some());
    let reverted = h.market.get_order(user, order.id).await.unwrap();
    assert_eq!(reverted.status, OrderStatus::Pending);

    let retried = h.pay(user, &order).await;
    assert_eq!(retried.id, payment.id);
    assert_eq!(retried.status, PaymentStatus::Pending);
    assert_eq!(retried.failure_reason, None);

    let paid = h.market.simulate_payment_success(payment.id).await.unwrap();
    assert_eq!(paid.status, PaymentStatus::Completed);
    assert!(paid.paid_at.is_some());
    let processing = h.market.get_order(user, order.id).await.unwrap();
    assert_eq!(processing.status, OrderStatus::Processing);

    let tx_id = paid.transaction_id.clone().unwrap();
    let by_tx = h.market.get_payment_by_transaction(&tx_id).await.unwrap();
    assert_eq!(by_tx.id, payment.id);
}

#[tokio::test]
async fn cancelling_confirmed_order_restores_stock() {
    let h = TestHarness::new();
    let user = h.user().await;
    let x = h.product(VendorId::new(), 1000, 6).await;
    let y = h.product(VendorId::new(), 300, 2).await;
    h.market.add_to_cart(user, x, 4).await.unwrap();
    h.market.add_to_cart(user, y, 2).await.unwrap();
    let order = h.checkout(user).await.unwrap();
    let payment = h.pay(user, &order).await;
    assert_eq!((h.stock(x).await, h.stock(y).await), (2, 0));

    let cancelled = h.market.cancel_order(user, order.id).await.unwrap();

    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert!(
        cancelled
            .items()
            .iter()
            .all(|item| item.fulfillment_status == FulfillmentStatus::Cancelled)
    );
    assert_eq!((h.stock(x).await, h.stock(y).await), (6, 2));
    let payment = h.market.get_payment_by_order(user, payment.order_id).await.unwrap();
    assert_eq!(payment.status, PaymentStatus::Cancelled);
}

#[tokio::test]
async fn shipped_order_cannot_be_cancelled() {
    let h = TestHarness::new();
    let user = h.user().await;
    let x = h.product(VendorId::new(), 1000, 6).await;
    h.market.add_to_cart(user, x, 1).await.unwrap();
    let order = h.checkout(user).await.unwrap();
    h.market.update_order_status(order.id, "SHIPPED").await.unwrap();

    let err = h.market.cancel_order(user, order.id).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(h.stock(x).await, 5);
}

#[tokio::test]
async fn other_users_cannot_see_or_touch_an_order() {
    let h = TestHarness::new();
    let owner = h.user().await;
    let stranger = h.user().await;
    let x = h.product(VendorId::new(), 1000, 6).await;
    h.market.add_to_cart(owner, x, 1).await.unwrap();
    let order = h.checkout(owner).await.unwrap();

    let kinds = [
        h.market.get_order(stranger, order.id).await.unwrap_err().kind(),
        h.market
            .get_order_by_number(stranger, order.order_number.as_str())
            .await
            .unwrap_err()
            .kind(),
        h.market.cancel_order(stranger, order.id).await.unwrap_err().kind(),
        h.market
            .initiate_payment(InitiatePayment::new(stranger, order.id, card()))
            .await
            .unwrap_err()
            .kind(),
    ];

    assert!(kinds.iter().all(|kind| *kind == ErrorKind::NotOwner));
    let fetched = h
        .market
        .get_order_by_number(owner, order.order_number.as_str())
        .await
        .unwrap();
    assert_eq!(fetched.id, order.id);
}

#[tokio::test]
async fn vendors_are_notified_once_each() {
    let h = TestHarness::new();
    let user = h.user().await;
    let vendor_a = VendorId::new();
    let vendor_b = VendorId::new();
    let a1 = h.product(vendor_a, 100, 5).await;
    let a2 = h.product(vendor_a, 200, 5).await;
    let b1 = h.product(vendor_b, 300, 5).await;
    for product in [a1, a2, b1] {
        h.market.add_to_cart(user, product, 1).await.unwrap();
    }

    h.checkout(user).await.unwrap();

    let events = h.notifier.wait_for(3, Duration::from_secs(2)).await;
    let names: Vec<&str> = events.iter().map(|event| event.name()).collect();
    assert_eq!(names.iter().filter(|n| **n == "order_confirmed").count(), 1);
    assert_eq!(names.iter().filter(|n| **n == "vendor_notified").count(), 2);
}

#[tokio::test]
async fn notifier_failure_does_not_undo_checkout() {
    let h = TestHarness::new();
    h.notifier.set_fail(true);
    let user = h.user().await;
    let x = h.product(VendorId::new(), 100, 5).await;
    h.market.add_to_cart(user, x, 1).await.unwrap();

    let order = h.checkout(user).await.unwrap();

    h.notifier.wait_for(2, Duration::from_secs(2)).await;
    assert_eq!(h.market.get_order(user, order.id).await.unwrap().id, order.id);
    assert_eq!(h.store.order_count().await, 1);
}

#[tokio::test]
async fn listing_filters_by_owner_and_status() {
    let h = TestHarness::new();
    let alice = h.user().await;
    let bob = h.user().await;
    let x = h.product(VendorId::new(), 100, 50).await;
    for user in [alice, alice, bob] {
        h.market.add_to_cart(user, x, 1).await.unwrap();
        h.checkout(user).await.unwrap();
    }

    let mine = h
        .market
        .list_orders(OrderFilter::owned_by(alice), PageRequest::new(0, 10))
        .await
        .unwrap();
    assert_eq!(mine.total, 2);
    assert!(mine.items.iter().all(|order| order.user_id == alice));

    let all_pending = h
        .market
        .list_orders(
            OrderFilter::all().with_status(OrderStatus::Pending),
            PageRequest::new(0, 2),
        )
        .await
        .unwrap();
    assert_eq!(all_pending.total, 3);
    assert_eq!(all_pending.items.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_adds_merge_into_one_line() {
    let h = TestHarness::new();
    let user = h.user().await;
    let x = h.product(VendorId::new(), 100, 100).await;

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let market = Arc::clone(&h.market);
            tokio::spawn(async move { market.add_to_cart(user, x, 1).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let cart = h.market.get_cart(user).await.unwrap();
    assert_eq!(cart.unique_items, 1);
    assert_eq!(cart.line(x).unwrap().quantity, 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_checkouts_never_oversell() {
    let h = TestHarness::new();
    let x = h.product(VendorId::new(), 100, 5).await;
    let mut users = Vec::new();
    for _ in 0..8 {
        let user = h.user().await;
        h.market.add_to_cart(user, x, 1).await.unwrap();
        users.push(user);
    }

    let tasks: Vec<_> = users
        .into_iter()
        .map(|user| {
            let market = Arc::clone(&h.market);
            tokio::spawn(async move { market.place_order(PlaceOrder::new(user, address())).await })
        })
        .collect();
    let mut placed = 0;
    let mut rejected = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => placed += 1,
            Err(err) => {
                assert_eq!(err.kind(), ErrorKind::InsufficientStock);
                rejected += 1;
            }
        }
    }

    assert_eq!(placed, 5);
    assert_eq!(rejected, 3);
    let product = h.store.product_snapshot(x).await.unwrap();
    assert_eq!(product.stock_quantity, 0);
    assert_eq!(product.sold_count, 5);
    assert_eq!(h.store.order_count().await, 5);
}

#[tokio::test]
async fn health_reports_store_reachable() {
    let h = TestHarness::new();
    h.market.health().await.unwrap();
}
