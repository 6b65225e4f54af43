//! Order and order-item snapshots.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::{Money, OrderId, OrderItemId, ProductId, UserId, VendorId};
use serde::Serialize;

use super::{Address, FulfillmentStatus, OrderNumber, OrderStatus};
use crate::cart::line_amount;
use crate::error::{DomainError, Result};
use crate::inventory::InventoryItem;

/// Catalog data frozen onto an order item at purchase time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductSnapshot {
    pub product_id: ProductId,
    pub vendor_id: VendorId,
    pub product_name: String,
    pub product_sku: String,
    pub product_image_url: Option<String>,
}

impl From<&InventoryItem> for ProductSnapshot {
    fn from(item: &InventoryItem) -> Self {
        Self {
            product_id: item.id,
            vendor_id: item.vendor_id,
            product_name: item.name.clone(),
            product_sku: item.sku.clone(),
            product_image_url: item.image_url.clone(),
        }
    }
}

/// One purchased product line. Only the fulfillment status changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    #[serde(flatten)]
    pub product: ProductSnapshot,
    pub quantity: u32,
    pub unit_price: Money,
    discount: Money,
    tax: Money,
    total_price: Money,
    pub fulfillment_status: FulfillmentStatus,
}

impl OrderItem {
    pub fn new(product: ProductSnapshot, quantity: u32, unit_price: Money) -> Result<Self> {
        if quantity == 0 {
            return Err(DomainError::InvalidQuantity { quantity });
        }
        let total_price = line_amount(unit_price, quantity)?;
        Ok(Self {
            id: OrderItemId::new(),
            order_id: OrderId::from_uuid(uuid::Uuid::nil()),
            product,
            quantity,
            unit_price,
            discount: Money::zero(),
            tax: Money::zero(),
            total_price,
            fulfillment_status: FulfillmentStatus::Pending,
        })
    }

    /// Sets per-item discount and tax; the total follows.
    pub fn with_adjustments(mut self, discount: Money, tax: Money) -> Self {
        self.discount = discount;
        self.tax = tax;
        self.total_price = self.unit_price.multiply(self.quantity) - discount + tax;
        self
    }

    pub fn with_id(mut self, id: OrderItemId) -> Self {
        self.id = id;
        self
    }

    pub fn vendor_id(&self) -> VendorId {
        self.product.vendor_id
    }

    pub fn product_id(&self) -> ProductId {
        self.product.product_id
    }

    pub fn discount(&self) -> Money {
        self.discount
    }

    pub fn tax(&self) -> Money {
        self.tax
    }

    /// `unit_price * quantity - discount + tax`.
    pub fn total_price(&self) -> Money {
        self.total_price
    }
}

/// Order-level charges that sit on top of the item subtotal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Charges {
    pub shipping: Money,
    pub tax: Money,
    pub discount: Money,
}

/// Amounts derived from the items and charges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub shipping_cost: Money,
    pub tax_amount: Money,
    pub discount_amount: Money,
    pub total_amount: Money,
    pub total_items: u32,
}

impl OrderTotals {
    pub fn compute(items: &[OrderItem], charges: Charges) -> Self {
        let subtotal: Money = items.iter().map(OrderItem::total_price).sum();
        Self {
            subtotal,
            shipping_cost: charges.shipping,
            tax_amount: charges.tax,
            discount_amount: charges.discount,
            total_amount: subtotal + charges.shipping + charges.tax - charges.discount,
            total_items: items.iter().map(|item| item.quantity).sum(),
        }
    }
}

/// Header fields needed to build an order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: OrderId,
    pub user_id: UserId,
    pub order_number: OrderNumber,
    pub charges: Charges,
    pub coupon_code: Option<String>,
    pub shipping_address: Address,
    pub billing_address: Address,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A placed order.
///
/// Items and totals are private: the totals are recomputed from the items
/// whenever the order is built, so they can never drift apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub order_number: OrderNumber,
    pub status: OrderStatus,
    items: Vec<OrderItem>,
    #[serde(flatten)]
    totals: OrderTotals,
    pub coupon_code: Option<String>,
    pub shipping_address: Address,
    pub billing_address: Address,
    pub notes: Option<String>,
    pub tracking_number: Option<String>,
    pub shipping_carrier: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Builds a `Pending` order, stamping every item with the order id.
    pub fn new(header: NewOrder, items: Vec<OrderItem>) -> Self {
        let items: Vec<OrderItem> = items
            .into_iter()
            .map(|mut item| {
                item.order_id = header.id;
                item
            })
            .collect();
        let totals = OrderTotals::compute(&items, header.charges);
        Self {
            id: header.id,
            user_id: header.user_id,
            order_number: header.order_number,
            status: OrderStatus::Pending,
            items,
            totals,
            coupon_code: header.coupon_code,
            shipping_address: header.shipping_address,
            billing_address: header.billing_address,
            notes: header.notes,
            tracking_number: None,
            shipping_carrier: None,
            created_at: header.created_at,
            updated_at: header.created_at,
        }
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn item(&self, item_id: OrderItemId) -> Option<&OrderItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    pub fn totals(&self) -> &OrderTotals {
        &self.totals
    }

    pub fn subtotal(&self) -> Money {
        self.totals.subtotal
    }

    pub fn total(&self) -> Money {
        self.totals.total_amount
    }

    pub fn total_items(&self) -> u32 {
        self.totals.total_items
    }

    pub fn charges(&self) -> Charges {
        Charges {
            shipping: self.totals.shipping_cost,
            tax: self.totals.tax_amount,
            discount: self.totals.discount_amount,
        }
    }

    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }

    /// Items grouped by vendor, each group in order-item order.
    pub fn items_by_vendor(&self) -> BTreeMap<VendorId, Vec<OrderItem>> {
        let mut groups: BTreeMap<VendorId, Vec<OrderItem>> = BTreeMap::new();
        for item in &self.items {
            groups.entry(item.vendor_id()).or_default().push(item.clone());
        }
        groups
    }

    pub fn set_status(&mut self, status: OrderStatus, now: DateTime<Utc>) {
        self.status = status;
        self.updated_at = now;
    }

    /// Marks the order and every item cancelled.
    pub fn cancel(&mut self, now: DateTime<Utc>) {
        for item in &mut self.items {
            item.fulfillment_status = FulfillmentStatus::Cancelled;
        }
        self.set_status(OrderStatus::Cancelled, now);
    }

    /// Sets one item's fulfillment status and returns the previous one.
    pub fn set_item_fulfillment(
        &mut self,
        item_id: OrderItemId,
        status: FulfillmentStatus,
        now: DateTime<Utc>,
    ) -> Result<FulfillmentStatus> {
        let item = self
            .items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or_else(|| DomainError::ItemNotFound {
                item_id: item_id.to_string(),
            })?;
        let previous = std::mem::replace(&mut item.fulfillment_status, status);
        self.updated_at = now;
        Ok(previous)
    }

    pub fn set_tracking(
        &mut self,
        tracking_number: impl Into<String>,
        carrier: Option<String>,
        now: DateTime<Utc>,
    ) {
        self.tracking_number = Some(tracking_number.into());
        self.shipping_carrier = carrier;
        self.updated_at = now;
    }
}
