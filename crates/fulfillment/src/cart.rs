//! Cart operations.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::{CartId, Money, ProductId, UserId, VendorId};
use domain::{Cart, CartLine, DomainError, InventoryItem};
use serde::Serialize;
use store::{Store, Transaction};

use crate::error::{FulfillmentError, Result};
use crate::ledger::InventoryLedger;
use crate::tx::finish;

/// One cart line joined with the live catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartLineView {
    pub product_id: ProductId,
    /// `None` once the product has left the catalog.
    pub product_name: Option<String>,
    pub vendor_id: Option<VendorId>,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
    pub available_stock: u32,
    /// Active and with enough stock for this line.
    pub in_stock: bool,
    pub added_at: DateTime<Utc>,
}

/// Snapshot of a cart as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartView {
    pub id: CartId,
    pub user_id: UserId,
    pub items: Vec<CartLineView>,
    pub coupon_code: Option<String>,
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
    pub total_items: u32,
    pub unique_items: usize,
    pub updated_at: DateTime<Utc>,
}

impl CartView {
    fn build(cart: &Cart, products: &[InventoryItem]) -> Self {
        let catalog: HashMap<ProductId, &InventoryItem> =
            products.iter().map(|item| (item.id, item)).collect();
        let items = cart
            .lines
            .iter()
            .map(|line| line_view(line, catalog.get(&line.product_id).copied()))
            .collect();
        Self {
            id: cart.id,
            user_id: cart.user_id,
            items,
            coupon_code: cart.coupon_code.clone(),
            subtotal: cart.subtotal(),
            discount: cart.effective_discount(),
            total: cart.total(),
            total_items: cart.total_items(),
            unique_items: cart.unique_items(),
            updated_at: cart.updated_at,
        }
    }

    pub fn line(&self, product_id: ProductId) -> Option<&CartLineView> {
        self.items.iter().find(|line| line.product_id == product_id)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn line_view(line: &CartLine, product: Option<&InventoryItem>) -> CartLineView {
    CartLineView {
        product_id: line.product_id,
        product_name: product.map(|p| p.name.clone()),
        vendor_id: product.map(|p| p.vendor_id),
        quantity: line.quantity,
        unit_price: line.unit_price,
        line_total: line.line_total(),
        available_stock: product.map_or(0, |p| p.stock_quantity),
        in_stock: product.is_some_and(|p| p.is_purchasable() && p.has_stock(line.quantity)),
        added_at: line.added_at,
    }
}

/// Per-user carts.
///
/// Carts are created on first access. Every mutation checks the product
/// against the live catalog and refreshes the line's unit price.
pub struct CartStore<S: Store> {
    store: S,
    ledger: InventoryLedger,
}

impl<S: Store> CartStore<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            ledger: InventoryLedger::new(),
        }
    }

    /// Returns the user's cart, creating an empty one if needed.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, user_id: UserId) -> Result<CartView> {
        let mut tx = self.store.begin().await?;
        let outcome: Result<CartView> = async {
            let cart = load_or_create(&mut tx, user_id).await?;
            view(&mut tx, &cart).await
        }
        .await;
        finish(tx, outcome).await
    }

    /// Adds `quantity` units, merging with an existing line.
    #[tracing::instrument(skip(self))]
    pub async fn add_line(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartView> {
        ensure_quantity(quantity)?;
        let mut tx = self.store.begin().await?;
        let outcome: Result<CartView> = async {
            let mut cart = load_or_create(&mut tx, user_id).await?;
            let wanted = cart.merged_quantity(product_id, quantity);
            let product = self
                .ledger
                .check_available(&mut tx, product_id, wanted)
                .await?;
            cart.add_line(product_id, quantity, product.price, Utc::now())?;
            tx.save_cart(&cart).await?;
            view(&mut tx, &cart).await
        }
        .await;
        finish(tx, outcome).await
    }

    /// Replaces the quantity of a line already in the cart.
    #[tracing::instrument(skip(self))]
    pub async fn set_line_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartView> {
        ensure_quantity(quantity)?;
        let mut tx = self.store.begin().await?;
        let outcome: Result<CartView> = async {
            let mut cart = load_or_create(&mut tx, user_id).await?;
            if cart.line(product_id).is_none() {
                return Err(DomainError::LineNotFound {
                    product_id: product_id.to_string(),
                }
                .into());
            }
            let product = self
                .ledger
                .check_available(&mut tx, product_id, quantity)
                .await?;
            cart.set_quantity(product_id, quantity, product.price, Utc::now())?;
            tx.save_cart(&cart).await?;
            view(&mut tx, &cart).await
        }
        .await;
        finish(tx, outcome).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_line(&self, user_id: UserId, product_id: ProductId) -> Result<CartView> {
        let mut tx = self.store.begin().await?;
        let outcome: Result<CartView> = async {
            let mut cart = load_or_create(&mut tx, user_id).await?;
            cart.remove_line(product_id, Utc::now())?;
            tx.save_cart(&cart).await?;
            view(&mut tx, &cart).await
        }
        .await;
        finish(tx, outcome).await
    }

    /// Empties the cart, dropping coupon and discount as well.
    #[tracing::instrument(skip(self))]
    pub async fn clear(&self, user_id: UserId) -> Result<CartView> {
        let mut tx = self.store.begin().await?;
        let outcome: Result<CartView> = async {
            let mut cart = load_or_create(&mut tx, user_id).await?;
            cart.clear(Utc::now());
            tx.save_cart(&cart).await?;
            view(&mut tx, &cart).await
        }
        .await;
        finish(tx, outcome).await
    }

    /// Records a coupon and the discount granted for it.
    ///
    /// Coupon rules live with the pricing service; this only checks that
    /// the amount fits the current subtotal.
    #[tracing::instrument(skip(self))]
    pub async fn apply_discount(
        &self,
        user_id: UserId,
        coupon_code: String,
        discount: Money,
    ) -> Result<CartView> {
        let mut tx = self.store.begin().await?;
        let outcome: Result<CartView> = async {
            let mut cart = load_or_create(&mut tx, user_id).await?;
            cart.apply_discount(coupon_code, discount, Utc::now())?;
            tx.save_cart(&cart).await?;
            view(&mut tx, &cart).await
        }
        .await;
        finish(tx, outcome).await
    }
}

fn ensure_quantity(quantity: u32) -> Result<()> {
    if quantity == 0 {
        return Err(DomainError::InvalidQuantity { quantity }.into());
    }
    Ok(())
}

/// Loads and locks the user's cart, creating it on first access.
pub(crate) async fn load_or_create<T: Transaction>(tx: &mut T, user_id: UserId) -> Result<Cart> {
    if let Some(cart) = tx.cart_for_update(user_id).await? {
        return Ok(cart);
    }
    if !tx.user_exists(user_id).await? {
        return Err(FulfillmentError::UserNotFound(user_id));
    }
    let cart = tx.insert_cart(&Cart::new(user_id, Utc::now())).await?;
    tracing::debug!(%user_id, cart_id = %cart.id, "cart created");
    Ok(cart)
}

async fn view<T: Transaction>(tx: &mut T, cart: &Cart) -> Result<CartView> {
    let ids: Vec<ProductId> = cart.lines.iter().map(|line| line.product_id).collect();
    let products = tx.products(&ids).await?;
    Ok(CartView::build(cart, &products))
}

#[cfg(test)]
mod tests {
    use domain::ProductStatus;
    use store::InMemoryStore;

    use super::*;
    use crate::error::ErrorKind;

    struct Fixture {
        store: InMemoryStore,
        carts: CartStore<InMemoryStore>,
        user: UserId,
    }

    async fn fixture() -> Fixture {
        let store = InMemoryStore::new();
        let user = UserId::new();
        store.register_user(user).await;
        Fixture {
            carts: CartStore::new(store.clone()),
            store,
            user,
        }
    }

    async fn product(store: &InMemoryStore, cents: i64, stock: u32) -> InventoryItem {
        let item = InventoryItem::new(VendorId::new(), "Kettle", "KET-1", Money::from_cents(cents), stock);
        store.upsert_product(item.clone()).await;
        item
    }

    #[tokio::test]
    async fn get_creates_an_empty_cart_once() {
        let f = fixture().await;
        let first = f.carts.get(f.user).await.unwrap();
        let second = f.carts.get(f.user).await.unwrap();

        assert!(first.is_empty());
        assert_eq!(first.id, second.id);
        assert!(first.total.is_zero());
    }

    #[tokio::test]
    async fn unknown_user_has_no_cart() {
        let f = fixture().await;
        let err = f.carts.get(UserId::new()).await.unwrap_err();
        assert!(matches!(err, FulfillmentError::UserNotFound(_)));
    }

    #[tokio::test]
    async fn add_merges_and_refreshes_price() {
        let f = fixture().await;
        let mut kettle = product(&f.store, 1000, 10).await;

        f.carts.add_line(f.user, kettle.id, 2).await.unwrap();
        kettle.price = Money::from_cents(900);
        f.store.upsert_product(kettle.clone()).await;
        let cart = f.carts.add_line(f.user, kettle.id, 1).await.unwrap();

        let line = cart.line(kettle.id).unwrap();
        assert_eq!(line.quantity, 3);
        assert_eq!(line.unit_price, Money::from_cents(900));
        assert_eq!(line.line_total, Money::from_cents(2700));
        assert_eq!(line.product_name.as_deref(), Some("Kettle"));
        assert!(line.in_stock);
        assert_eq!(cart.unique_items, 1);
    }

    #[tokio::test]
    async fn merged_quantity_is_checked_against_stock() {
        let f = fixture().await;
        let kettle = product(&f.store, 1000, 3).await;
        f.carts.add_line(f.user, kettle.id, 2).await.unwrap();

        let err = f.carts.add_line(f.user, kettle.id, 2).await.unwrap_err();
        assert!(matches!(
            err,
            FulfillmentError::InsufficientStock {
                requested: 4,
                available: 3,
                ..
            }
        ));

        let cart = f.carts.get(f.user).await.unwrap();
        assert_eq!(cart.line(kettle.id).unwrap().quantity, 2);
    }

    #[tokio::test]
    async fn inactive_product_cannot_be_added() {
        let f = fixture().await;
        let item = InventoryItem::new(VendorId::new(), "Old", "OLD", Money::from_cents(10), 5)
            .with_status(ProductStatus::Discontinued);
        f.store.upsert_product(item.clone()).await;

        let err = f.carts.add_line(f.user, item.id, 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProductUnavailable);
    }

    #[tokio::test]
    async fn zero_quantity_is_a_validation_error() {
        let f = fixture().await;
        let kettle = product(&f.store, 1000, 3).await;
        let err = f.carts.add_line(f.user, kettle.id, 0).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn update_and_remove_need_an_existing_line() {
        let f = fixture().await;
        let kettle = product(&f.store, 1000, 3).await;

        let update = f.carts.set_line_quantity(f.user, kettle.id, 1).await.unwrap_err();
        assert_eq!(update.kind(), ErrorKind::NotFound);
        assert!(update.to_string().contains("Product not found in cart"));

        let remove = f.carts.remove_line(f.user, kettle.id).await.unwrap_err();
        assert_eq!(remove.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn set_quantity_replaces_and_checks_stock() {
        let f = fixture().await;
        let kettle = product(&f.store, 1000, 5).await;
        f.carts.add_line(f.user, kettle.id, 1).await.unwrap();

        let cart = f.carts.set_line_quantity(f.user, kettle.id, 5).await.unwrap();
        assert_eq!(cart.total_items, 5);

        let err = f.carts.set_line_quantity(f.user, kettle.id, 6).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
    }

    #[tokio::test]
    async fn discount_and_clear() {
        let f = fixture().await;
        let kettle = product(&f.store, 1000, 5).await;
        f.carts.add_line(f.user, kettle.id, 2).await.unwrap();

        let cart = f
            .carts
            .apply_discount(f.user, "SAVE5".into(), Money::from_cents(500))
            .await
            .unwrap();
        assert_eq!(cart.total, Money::from_cents(1500));
        assert_eq!(cart.coupon_code.as_deref(), Some("SAVE5"));

        let too_big = f
            .carts
            .apply_discount(f.user, "ALL".into(), Money::from_cents(2001))
            .await
            .unwrap_err();
        assert_eq!(too_big.kind(), ErrorKind::Validation);

        let cleared = f.carts.clear(f.user).await.unwrap();
        assert!(cleared.is_empty());
        assert!(cleared.coupon_code.is_none());
        assert!(cleared.discount.is_zero());
    }

    #[tokio::test]
    async fn view_flags_lines_that_lost_their_stock() {
        let f = fixture().await;
        let mut kettle = product(&f.store, 1000, 5).await;
        f.carts.add_line(f.user, kettle.id, 4).await.unwrap();

        kettle.stock_quantity = 2;
        f.store.upsert_product(kettle.clone()).await;
        let cart = f.carts.get(f.user).await.unwrap();

        let line = cart.line(kettle.id).unwrap();
        assert_eq!(line.available_stock, 2);
        assert!(!line.in_stock);
    }
}
