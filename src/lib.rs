pub mod amount;
pub mod cart;
pub mod config;
pub mod csv;
pub mod discount;
pub mod model;
pub mod stock;
pub mod storage;

pub use amount::Amount;
pub use cart::{Cart, CartError, Totals};
pub use model::{CartCommand, Identity, LineItem, LineKey, Note, ProductCode};
