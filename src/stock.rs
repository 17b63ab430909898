//! Stock oracle: how many units of a product remain purchasable.

use std::collections::HashMap;
use thiserror::Error;

use crate::ProductCode;

#[derive(Debug, Error)]
pub enum StockError {
    #[error("product {0} is not in the catalog")]
    UnknownProduct(ProductCode),

    #[error("stock lookup for {product} failed: {reason}")]
    Unavailable { product: ProductCode, reason: String },
}

/// Source of truth for remaining stock, queried on every add and update.
pub trait StockOracle {
    fn remaining_stock(&self, product_code: &str) -> Result<u32, StockError>;
}

impl<T: StockOracle + ?Sized> StockOracle for &T {
    fn remaining_stock(&self, product_code: &str) -> Result<u32, StockError> {
        (**self).remaining_stock(product_code)
    }
}

/// In-memory catalog snapshot of stock levels.
#[derive(Debug, Default, Clone)]
pub struct StockTable {
    levels: HashMap<ProductCode, u32>,
}

impl StockTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, product_code: impl Into<ProductCode>, stock: u32) {
        self.levels.insert(product_code.into(), stock);
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

impl FromIterator<(ProductCode, u32)> for StockTable {
    fn from_iter<I: IntoIterator<Item = (ProductCode, u32)>>(iter: I) -> Self {
        Self {
            levels: iter.into_iter().collect(),
        }
    }
}

impl StockOracle for StockTable {
    fn remaining_stock(&self, product_code: &str) -> Result<u32, StockError> {
        self.levels
            .get(product_code)
            .copied()
            .ok_or_else(|| StockError::UnknownProduct(product_code.to_string()))
    }
}
