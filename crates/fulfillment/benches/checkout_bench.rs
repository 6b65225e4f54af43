use std::sync::Arc;

use common::{Money, UserId, VendorId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{Address, InventoryItem};
use fulfillment::{FulfillmentConfig, Marketplace, PlaceOrder, TracingNotifier};
use store::InMemoryStore;

fn address() -> Address {
    Address {
        name: "Bench".into(),
        phone: "1".into(),
        line: "1 Main St".into(),
        city: "Pune".into(),
        state: "MH".into(),
        zip: "411001".into(),
        country: "IN".into(),
    }
}

async fn seeded(lines: usize) -> (Marketplace<InMemoryStore>, UserId) {
    let store = InMemoryStore::new();
    let user = UserId::new();
    store.register_user(user).await;
    let market = Marketplace::new(
        store.clone(),
        Arc::new(TracingNotifier),
        FulfillmentConfig::default(),
    );
    for i in 0..lines {
        let item = InventoryItem::new(
            VendorId::new(),
            format!("Product {i}"),
            format!("SKU-{i}"),
            Money::from_cents(1000),
            1_000,
        );
        let id = item.id;
        store.upsert_product(item).await;
        market.add_to_cart(user, id, 2).await.unwrap();
    }
    (market, user)
}

fn bench_add_to_cart(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("cart/add_line", |b| {
        b.iter(|| {
            rt.block_on(async {
                seeded(1).await;
            });
        });
    });
}

fn bench_place_order(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    for lines in [1, 10] {
        c.bench_function(&format!("checkout/place_order_{lines}_lines"), |b| {
            b.iter(|| {
                rt.block_on(async {
                    let (market, user) = seeded(lines).await;
                    market
                        .place_order(PlaceOrder::new(user, address()))
                        .await
                        .unwrap();
                });
            });
        });
    }
}

criterion_group!(benches, bench_add_to_cart, bench_place_order);
criterion_main!(benches);
