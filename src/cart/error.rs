//! Reasons a cart mutation was skipped.

use thiserror::Error;

use crate::ProductCode;
use crate::stock::StockError;

/// Returned by [`Cart::apply`](super::Cart::apply) when a command leaves the
/// cart untouched.
#[derive(Debug, Error)]
pub enum CartError {
    #[error("invalid arguments: {0}")]
    InvalidArgs(&'static str),

    #[error("stock unavailable for {product}: {source}")]
    StockUnavailable {
        product: ProductCode,
        source: StockError,
    },

    #[error("product {0} is out of stock")]
    OutOfStock(ProductCode),

    #[error("no line for {0} in the cart")]
    LineNotFound(String),
}
