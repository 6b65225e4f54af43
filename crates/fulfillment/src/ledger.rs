//! Stock reservation against the product table.

use common::ProductId;
use domain::InventoryItem;
use store::Transaction;

use crate::error::{FulfillmentError, Result};

/// Reserves and releases stock inside a caller-owned transaction.
///
/// Every operation locks the product row first, so a check followed by a
/// reserve in the same transaction cannot be overtaken by another checkout.
#[derive(Debug, Clone, Copy, Default)]
pub struct InventoryLedger;

impl InventoryLedger {
    pub fn new() -> Self {
        Self
    }

    /// Locks the product and checks that `quantity` units can be bought.
    pub async fn check_available<T: Transaction>(
        &self,
        tx: &mut T,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<InventoryItem> {
        let item = tx
            .product_for_update(product_id)
            .await?
            .ok_or(FulfillmentError::ProductNotFound(product_id))?;
        ensure_purchasable(&item, quantity)?;
        Ok(item)
    }

    /// Takes `quantity` units out of stock and adds them to the sold count.
    #[tracing::instrument(skip(self, tx))]
    pub async fn reserve<T: Transaction>(
        &self,
        tx: &mut T,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<InventoryItem> {
        let item = self.check_available(tx, product_id, quantity).await?;
        let delta = i64::from(quantity);
        match tx.adjust_stock(product_id, -delta, delta).await? {
            Some(updated) => {
                if updated.is_low_stock() {
                    tracing::info!(
                        %product_id,
                        stock = updated.stock_quantity,
                        threshold = updated.low_stock_threshold,
                        "product stock is low"
                    );
                }
                Ok(updated)
            }
            None => Err(insufficient(&item, quantity)),
        }
    }

    /// Puts `quantity` units back into stock and takes them off the sold count.
    #[tracing::instrument(skip(self, tx))]
    pub async fn release<T: Transaction>(
        &self,
        tx: &mut T,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<InventoryItem> {
        let delta = i64::from(quantity);
        tx.adjust_stock(product_id, delta, -delta)
            .await?
            .ok_or(FulfillmentError::ProductNotFound(product_id))
    }
}

/// Orders stock movements by product id.
///
/// Workflows that lock several product rows in one transaction must take
/// them in this order, or two of them can deadlock on the database.
pub(crate) fn lock_sequence(
    moves: impl IntoIterator<Item = (ProductId, u32)>,
) -> Vec<(ProductId, u32)> {
    let mut moves: Vec<_> = moves.into_iter().collect();
    moves.sort_by_key(|(product_id, _)| *product_id);
    moves
}

/// Availability rules shared by cart edits and checkout.
pub(crate) fn ensure_purchasable(item: &InventoryItem, quantity: u32) -> Result<()> {
    if !item.is_purchasable() {
        return Err(FulfillmentError::ProductUnavailable {
            product_id: item.id,
            name: item.name.clone(),
        });
    }
    if !item.has_stock(quantity) {
        return Err(insufficient(item, quantity));
    }
    Ok(())
}

fn insufficient(item: &InventoryItem, requested: u32) -> FulfillmentError {
    FulfillmentError::InsufficientStock {
        product_id: item.id,
        name: item.name.clone(),
        requested,
        available: item.stock_quantity,
    }
}
