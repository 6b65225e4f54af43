//! Per-user shopping cart.

use chrono::{DateTime, Utc};
use common::{CartId, Money, ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};

/// One product in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,

    /// Catalog price captured at the last add or update.
    pub unit_price: Money,

    pub added_at: DateTime<Utc>,
}

impl CartLine {
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// A user's pre-checkout item list. At most one line per product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    pub lines: Vec<CartLine>,
    pub coupon_code: Option<String>,
    pub discount: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// Creates an empty cart for a user.
    pub fn new(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: CartId::new(),
            user_id,
            lines: Vec::new(),
            coupon_code: None,
            discount: Money::zero(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn line(&self, product_id: ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.product_id == product_id)
    }

    /// Quantity the product would have after adding `quantity` more.
    pub fn merged_quantity(&self, product_id: ProductId, quantity: u32) -> u32 {
        self.line(product_id)
            .map_or(quantity, |line| line.quantity.saturating_add(quantity))
    }

    /// Adds a product, merging into an existing line and refreshing its price.
    pub fn add_line(
        &mut self,
        product_id: ProductId,
        quantity: u32,
        unit_price: Money,
        now: DateTime<Utc>,
    ) -> Result<&CartLine> {
        ensure_quantity(quantity)?;
        line_amount(unit_price, self.merged_quantity(product_id, quantity))?;
        let index = match self.position(product_id) {
            Some(index) => {
                let line = &mut self.lines[index];
                line.quantity = line.quantity.saturating_add(quantity);
                line.unit_price = unit_price;
                index
            }
            None => {
                self.lines.push(CartLine {
                    product_id,
                    quantity,
                    unit_price,
                    added_at: now,
                });
                self.lines.len() - 1
            }
        };
        self.updated_at = now;
        Ok(&self.lines[index])
    }

    /// Replaces the quantity of an existing line and refreshes its price.
    pub fn set_quantity(
        &mut self,
        product_id: ProductId,
        quantity: u32,
        unit_price: Money,
        now: DateTime<Utc>,
    ) -> Result<&CartLine> {
        ensure_quantity(quantity)?;
        let index = self
            .position(product_id)
            .ok_or_else(|| line_not_found(product_id))?;
        line_amount(unit_price, quantity)?;
        let line = &mut self.lines[index];
        line.quantity = quantity;
        line.unit_price = unit_price;
        self.updated_at = now;
        Ok(&self.lines[index])
    }

    pub fn remove_line(&mut self, product_id: ProductId, now: DateTime<Utc>) -> Result<CartLine> {
        let index = self
            .position(product_id)
            .ok_or_else(|| line_not_found(product_id))?;
        self.updated_at = now;
        Ok(self.lines.remove(index))
    }

    /// Empties the cart, including coupon and discount.
    pub fn clear(&mut self, now: DateTime<Utc>) {
        self.lines.clear();
        self.coupon_code = None;
        self.discount = Money::zero();
        self.updated_at = now;
    }

    /// Records a coupon and its discount. The discount may not exceed the subtotal.
    pub fn apply_discount(
        &mut self,
        coupon_code: impl Into<String>,
        discount: Money,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let coupon_code = coupon_code.into();
        if coupon_code.trim().is_empty() {
            return Err(DomainError::MissingField {
                field: "coupon_code",
            });
        }
        let subtotal = self.subtotal();
        if discount.is_negative() || discount > subtotal {
            return Err(DomainError::InvalidDiscount {
                discount: discount.cents(),
                subtotal: subtotal.cents(),
            });
        }
        self.coupon_code = Some(coupon_code);
        self.discount = discount;
        self.updated_at = now;
        Ok(())
    }

    pub fn subtotal(&self) -> Money {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Discount actually applicable, capped at the current subtotal.
    pub fn effective_discount(&self) -> Money {
        self.discount.min(self.subtotal())
    }

    pub fn total(&self) -> Money {
        self.subtotal() - self.effective_discount()
    }

    pub fn total_items(&self) -> u32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }

    pub fn unique_items(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn position(&self, product_id: ProductId) -> Option<usize> {
        self.lines
            .iter()
            .position(|line| line.product_id == product_id)
    }
}

fn ensure_quantity(quantity: u32) -> Result<()> {
    if quantity == 0 {
        return Err(DomainError::InvalidQuantity { quantity });
    }
    Ok(())
}

/// Price of `quantity` units, rejecting totals that do not fit.
pub(crate) fn line_amount(unit_price: Money, quantity: u32) -> Result<Money> {
    unit_price
        .checked_multiply(quantity)
        .ok_or(DomainError::AmountOverflow {
            quantity,
            unit_price: unit_price.cents(),
        })
}

fn line_not_found(product_id: ProductId) -> DomainError {
    DomainError::LineNotFound {
        product_id: product_id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cart() -> Cart {
        Cart::new(UserId::new(), Utc::now())
    }

    #[test]
    fn adding_same_product_merges_and_refreshes_price() {
        let mut cart = cart();
        let product = ProductId::new();
        cart.add_line(product, 2, Money::from_cents(1000), Utc::now())
            .unwrap();
        let line = cart
            .add_line(product, 3, Money::from_cents(900), Utc::now())
            .unwrap();

        assert_eq!(line.quantity, 5);
        assert_eq!(line.unit_price, Money::from_cents(900));
        assert_eq!(cart.unique_items(), 1);
        assert_eq!(cart.total_items(), 5);
    }

    #[test]
    fn line_total_that_overflows_is_rejected() {
        let mut cart = cart();
        let product = ProductId::new();
        let price = Money::from_cents(i64::MAX / 4);
        cart.add_line(product, 3, price, Utc::now()).unwrap();

        let err = cart.add_line(product, 2, price, Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::AmountOverflow { quantity: 5, .. }));
        assert_eq!(cart.line(product).unwrap().quantity, 3);

        let err = cart.set_quantity(product, 8, price, Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::AmountOverflow { quantity: 8, .. }));
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let mut cart = cart();
        let err = cart
            .add_line(ProductId::new(), 0, Money::from_cents(100), Utc::now())
            .unwrap_err();
        assert_eq!(err, DomainError::InvalidQuantity { quantity: 0 });
    }

    #[test]
    fn set_quantity_requires_existing_line() {
        let mut cart = cart();
        let result = cart.set_quantity(ProductId::new(), 1, Money::from_cents(100), Utc::now());
        assert!(matches!(result, Err(DomainError::LineNotFound { .. })));
    }

    #[test]
    fn totals_follow_lines_and_discount() {
        let mut cart = cart();
        cart.add_line(ProductId::new(), 2, Money::from_cents(1000), Utc::now())
            .unwrap();
        cart.add_line(ProductId::new(), 1, Money::from_cents(2500), Utc::now())
            .unwrap();
        assert_eq!(cart.subtotal(), Money::from_cents(4500));

        cart.apply_discount("SAVE5", Money::from_cents(500), Utc::now())
            .unwrap();
        assert_eq!(cart.total(), Money::from_cents(4000));
    }

    #[test]
    fn discount_cannot_exceed_subtotal() {
        let mut cart = cart();
        cart.add_line(ProductId::new(), 1, Money::from_cents(1000), Utc::now())
            .unwrap();
        let result = cart.apply_discount("BIG", Money::from_cents(1001), Utc::now());
        assert!(matches!(result, Err(DomainError::InvalidDiscount { .. })));
    }

    #[test]
    fn discount_is_capped_after_lines_shrink() {
        let mut cart = cart();
        let product = ProductId::new();
        cart.add_line(product, 2, Money::from_cents(1000), Utc::now())
            .unwrap();
        cart.apply_discount("HALF", Money::from_cents(1500), Utc::now())
            .unwrap();
        cart.set_quantity(product, 1, Money::from_cents(1000), Utc::now())
            .unwrap();

        assert_eq!(cart.effective_discount(), Money::from_cents(1000));
        assert!(cart.total().is_zero());
    }

    #[test]
    fn clear_resets_coupon() {
        let mut cart = cart();
        cart.add_line(ProductId::new(), 1, Money::from_cents(1000), Utc::now())
            .unwrap();
        cart.apply_discount("X", Money::from_cents(100), Utc::now())
            .unwrap();
        cart.clear(Utc::now());

        assert!(cart.is_empty());
        assert!(cart.coupon_code.is_none());
        assert!(cart.discount.is_zero());
    }
}
