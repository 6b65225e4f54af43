//! The purchasable slice of a catalog product.

use common::{Money, ProductId, VendorId};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};

/// Catalog lifecycle of a product. Only `Active` products can be bought.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductStatus {
    #[default]
    Draft,
    Active,
    Inactive,
    OutOfStock,
    Discontinued,
}

impl ProductStatus {
    const ALL: [ProductStatus; 5] = [
        ProductStatus::Draft,
        ProductStatus::Active,
        ProductStatus::Inactive,
        ProductStatus::OutOfStock,
        ProductStatus::Discontinued,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Draft => "DRAFT",
            ProductStatus::Active => "ACTIVE",
            ProductStatus::Inactive => "INACTIVE",
            ProductStatus::OutOfStock => "OUT_OF_STOCK",
            ProductStatus::Discontinued => "DISCONTINUED",
        }
    }
}

impl std::fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProductStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DomainError::UnknownStatus {
                kind: "product",
                value: s.to_string(),
            })
    }
}

/// Stock-bearing view of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: ProductId,
    pub vendor_id: VendorId,
    pub name: String,
    pub sku: String,
    pub image_url: Option<String>,

    /// Live catalog price.
    pub price: Money,

    pub stock_quantity: u32,
    pub sold_count: u32,
    pub status: ProductStatus,
    pub low_stock_threshold: u32,
}

impl InventoryItem {
    pub const DEFAULT_LOW_STOCK_THRESHOLD: u32 = 10;

    /// Creates an active product with no sales.
    pub fn new(
        vendor_id: VendorId,
        name: impl Into<String>,
        sku: impl Into<String>,
        price: Money,
        stock_quantity: u32,
    ) -> Self {
        Self {
            id: ProductId::new(),
            vendor_id,
            name: name.into(),
            sku: sku.into(),
            image_url: None,
            price,
            stock_quantity,
            sold_count: 0,
            status: ProductStatus::Active,
            low_stock_threshold: Self::DEFAULT_LOW_STOCK_THRESHOLD,
        }
    }

    pub fn with_status(mut self, status: ProductStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    pub fn is_purchasable(&self) -> bool {
        self.status == ProductStatus::Active
    }

    pub fn has_stock(&self, quantity: u32) -> bool {
        self.stock_quantity >= quantity
    }

    pub fn is_in_stock(&self) -> bool {
        self.stock_quantity > 0
    }

    pub fn is_low_stock(&self) -> bool {
        self.stock_quantity <= self.low_stock_threshold
    }

    /// Applies a stock and sold-count delta.
    ///
    /// Returns `None` when the stock would go negative or either counter
    /// would overflow. Sold count never drops below zero.
    pub fn adjusted(&self, stock_delta: i64, sold_delta: i64) -> Option<InventoryItem> {
        let stock = i64::from(self.stock_quantity).checked_add(stock_delta)?;
        let stock = u32::try_from(stock).ok()?;
        let sold = (i64::from(self.sold_count) + sold_delta).max(0);
        let sold = u32::try_from(sold).ok()?;
        Some(InventoryItem {
            stock_quantity: stock,
            sold_count: sold,
            ..self.clone()
        })
    }
}
