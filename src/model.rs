//! Core domain types for the cart aggregator.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Amount;

/// Product code as known by the catalog.
pub type ProductCode = String;

/// Free-text note attached to a line (e.g. "sin azúcar").
pub type Note = Option<String>;

/// One row of the cart.
///
/// Field names follow the camelCase layout persisted by the storefront.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub product_code: ProductCode,
    pub name: String,
    pub unit_price: Amount,
    #[serde(default)]
    pub image: String,
    pub quantity: u32,
    #[serde(default)]
    pub note: Note,
}

impl LineItem {
    pub fn new(
        product_code: impl Into<ProductCode>,
        name: impl Into<String>,
        unit_price: Amount,
        quantity: u32,
    ) -> Self {
        Self {
            product_code: product_code.into(),
            name: name.into(),
            unit_price,
            image: String::new(),
            quantity,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    /// Whether this line carries the given `(product, note)` identity.
    pub fn matches(&self, product_code: &str, note: Option<&str>) -> bool {
        self.product_code == product_code && self.note.as_deref() == note
    }

    pub fn key(&self) -> LineKey<'_> {
        LineKey {
            product_code: &self.product_code,
            note: self.note.as_deref(),
        }
    }

    pub fn line_total(&self) -> Amount {
        self.unit_price.times(self.quantity)
    }
}

/// Borrowed identity of a line: product code plus optional note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineKey<'a> {
    pub product_code: &'a str,
    pub note: Option<&'a str>,
}

impl fmt::Display for LineKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.note {
            Some(note) => write!(f, "{} ({note})", self.product_code),
            None => write!(f, "{}", self.product_code),
        }
    }
}

/// A mutation request, the possible inputs of the cart.
#[derive(Debug, Clone)]
pub enum CartCommand {
    /// Add a candidate line, merging with an existing line of the same key.
    Add(LineItem),
    /// Remove the line with this key.
    Remove { product_code: ProductCode, note: Note },
    /// Set a line's quantity; zero or less removes the line.
    UpdateQuantity {
        product_code: Option<ProductCode>,
        note: Note,
        quantity: i64,
    },
    /// Empty the cart.
    Clear,
}

/// Who the cart belongs to; selects the persistence slot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Identity {
    #[default]
    Guest,
    User(String),
}

impl Identity {
    /// Blank user ids fall back to the guest identity.
    pub fn from_user_id(user_id: Option<&str>) -> Self {
        match user_id.map(str::trim) {
            Some(id) if !id.is_empty() => Identity::User(id.to_string()),
            _ => Identity::Guest,
        }
    }

    /// Storage key for this identity under `namespace`.
    pub fn slot_key(&self, namespace: &str) -> String {
        match self {
            Identity::Guest => format!("{namespace}:guest"),
            Identity::User(id) => format!("{namespace}:user:{id}"),
        }
    }
}
