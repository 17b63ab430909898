//! Cart aggregator.
//!
//! Owns the ordered list of cart lines for one identity, clamps quantities
//! against the stock oracle and persists the whole list after every change.
//! Also supports an async stream of cart commands.

use tokio_stream::{Stream, StreamExt};
use tracing::{info, warn};

use crate::Amount;
use crate::discount::{DiscountPolicy, NoDiscount};
use crate::model::{CartCommand, Identity, LineItem, LineKey};
use crate::stock::StockOracle;
use crate::storage::PersistenceSlot;

mod totals;
pub use totals::Totals;

mod error;
pub use error::CartError;

/// Slot key namespace used unless another one is configured.
pub const DEFAULT_NAMESPACE: &str = "cart";

/// The cart aggregator.
///
/// Every mutation either applies fully (and is persisted) or leaves the cart
/// untouched. The four mutation methods never fail; [`Cart::apply`] reports
/// why a command was skipped.
pub struct Cart<O, S, D = NoDiscount> {
    items: Vec<LineItem>,
    identity: Identity,
    namespace: String,
    stock: O,
    slot: S,
    discount: D,
}

impl<O: StockOracle, S: PersistenceSlot> Cart<O, S, NoDiscount> {
    /// Open the cart of `identity`, hydrated from `slot`, without discounts.
    pub fn open(identity: Identity, stock: O, slot: S) -> Self {
        Self::open_with(DEFAULT_NAMESPACE, identity, stock, slot, NoDiscount)
    }
}

/// Public API
impl<O: StockOracle, S: PersistenceSlot, D: DiscountPolicy> Cart<O, S, D> {
    pub fn open_with(
        namespace: impl Into<String>,
        identity: Identity,
        stock: O,
        slot: S,
        discount: D,
    ) -> Self {
        let namespace = namespace.into();
        let items = hydrate(&slot, &identity.slot_key(&namespace));
        Self {
            items,
            identity,
            namespace,
            stock,
            slot,
            discount,
        }
    }

    /// Current lines, in insertion order.
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn slot_key(&self) -> String {
        self.identity.slot_key(&self.namespace)
    }

    /// Recompute quantity, subtotal, discount and amount due.
    pub fn totals(&self) -> Totals {
        Totals::compute(&self.items, &self.discount)
    }

    /// Refresh the oracle in place, e.g. after a catalog restock.
    pub fn stock_mut(&mut self) -> &mut O {
        &mut self.stock
    }

    pub fn slot(&self) -> &S {
        &self.slot
    }

    /// Tear the cart down at session end, handing the slot back to its owner.
    pub fn into_slot(self) -> S {
        self.slot
    }

    /// Add `candidate`, merging it into the line with the same product and note.
    pub fn add_item(&mut self, candidate: LineItem) {
        let _ = self.apply(CartCommand::Add(candidate));
    }

    /// Remove the line for `product_code` and `note`, if any.
    pub fn remove_item(&mut self, product_code: &str, note: Option<&str>) {
        let _ = self.apply(CartCommand::Remove {
            product_code: product_code.to_string(),
            note: note.map(str::to_string),
        });
    }

    /// Set a line's quantity. Zero or less removes the line.
    pub fn update_quantity(&mut self, product_code: Option<&str>, note: Option<&str>, quantity: i64) {
        let _ = self.apply(CartCommand::UpdateQuantity {
            product_code: product_code.map(str::to_string),
            note: note.map(str::to_string),
            quantity,
        });
    }

    pub fn clear(&mut self) {
        let _ = self.apply(CartCommand::Clear);
    }

    /// Switch to another identity's cart. Carts are never merged.
    pub fn switch_identity(&mut self, identity: Identity) {
        if identity == self.identity {
            return;
        }
        self.identity = identity;
        let key = self.slot_key();
        self.items = hydrate(&self.slot, &key);
        info!(key = %key, lines = self.items.len(), "switched cart identity");
    }

    /// Run the cart with the given command stream
    pub async fn run(&mut self, mut stream: impl Stream<Item = CartCommand> + Unpin) {
        while let Some(command) = stream.next().await {
            // skipped commands are logged, the stream keeps going
            let _ = self.apply(command);
        }
    }

    /// Apply a single command on top of the current cart state
    pub fn apply(&mut self, command: CartCommand) -> Result<(), CartError> {
        match &command {
            CartCommand::Add(candidate) => {
                let result = self.apply_add(candidate);
                Self::log_result(
                    "add",
                    &candidate.product_code,
                    candidate.note.as_deref(),
                    &result,
                );
                result?;
            }
            CartCommand::Remove { product_code, note } => {
                let result = self.apply_remove(product_code, note.as_deref());
                Self::log_result("remove", product_code, note.as_deref(), &result);
                result?;
            }
            CartCommand::UpdateQuantity {
                product_code,
                note,
                quantity,
            } => {
                let result =
                    self.apply_update(product_code.as_deref(), note.as_deref(), *quantity);
                Self::log_result(
                    "update",
                    product_code.as_deref().unwrap_or_default(),
                    note.as_deref(),
                    &result,
                );
                result?;
            }
            CartCommand::Clear => {
                self.apply_clear();
                info!(key = %self.slot_key(), "cart cleared");
            }
        }
        Ok(())
    }
}

/// Private API
impl<O: StockOracle, S: PersistenceSlot, D: DiscountPolicy> Cart<O, S, D> {
    fn log_result(action: &str, product: &str, note: Option<&str>, result: &Result<(), CartError>) {
        match result {
            Ok(()) => info!(product, note, "{action} applied"),
            Err(e) => info!(product, note, reason = %e, "{action} skipped"),
        }
    }

    fn position(&self, product_code: &str, note: Option<&str>) -> Option<usize> {
        self.items
            .iter()
            .position(|line| line.matches(product_code, note))
    }

    fn remaining_stock(&self, product_code: &str) -> Result<u32, CartError> {
        let stock = self
            .stock
            .remaining_stock(product_code)
            .map_err(|source| CartError::StockUnavailable {
                product: product_code.to_string(),
                source,
            })?;
        if stock == 0 {
            return Err(CartError::OutOfStock(product_code.to_string()));
        }
        Ok(stock)
    }

    fn clamp(product_code: &str, requested: u32, stock: u32) -> u32 {
        if requested > stock {
            warn!(
                product = product_code,
                requested,
                stock,
                "quantity clamped to remaining stock"
            );
        }
        requested.min(stock)
    }

    /// Write the full list to the slot. Failures keep the in-memory state.
    fn persist(&mut self) {
        let key = self.identity.slot_key(&self.namespace);
        if let Err(e) = self.slot.save(&key, &self.items) {
            warn!(key = %key, reason = %e, "failed to persist cart");
        }
    }

    /// Apply a `CartCommand::Add`:
    /// - Reject empty codes, zero quantities and negative prices
    /// - Merge with the line of the same product and note, or append
    /// - Clamp the resulting quantity to the remaining stock
    fn apply_add(&mut self, candidate: &LineItem) -> Result<(), CartError> {
        if candidate.product_code.is_empty() {
            return Err(CartError::InvalidArgs("empty product code"));
        }
        if candidate.quantity == 0 {
            return Err(CartError::InvalidArgs("quantity must be at least 1"));
        }
        if candidate.unit_price.is_negative() {
            return Err(CartError::InvalidArgs("negative unit price"));
        }

        let code = candidate.product_code.as_str();
        let position = self.position(code, candidate.note.as_deref());
        let desired = match position {
            Some(i) => self.items[i].quantity.saturating_add(candidate.quantity),
            None => candidate.quantity,
        };

        let stock = self.remaining_stock(code)?;
        let quantity = Self::clamp(code, desired, stock);

        match position {
            // existing line is authoritative: only its quantity changes
            Some(i) => self.items[i].quantity = quantity,
            None => self.items.push(LineItem {
                quantity,
                ..candidate.clone()
            }),
        }

        self.persist();
        Ok(())
    }

    fn apply_remove(&mut self, product_code: &str, note: Option<&str>) -> Result<(), CartError> {
        let i = self
            .position(product_code, note)
            .ok_or_else(|| CartError::LineNotFound(line_label(product_code, note)))?;
        self.items.remove(i);
        self.persist();
        Ok(())
    }

    /// Apply a `CartCommand::UpdateQuantity`:
    /// - A missing product code is rejected
    /// - Zero or negative quantities remove the line
    /// - Otherwise clamp to the remaining stock and set
    fn apply_update(
        &mut self,
        product_code: Option<&str>,
        note: Option<&str>,
        quantity: i64,
    ) -> Result<(), CartError> {
        let product_code =
            product_code.ok_or(CartError::InvalidArgs("missing product code"))?;
        if quantity <= 0 {
            return self.apply_remove(product_code, note);
        }

        let i = self
            .position(product_code, note)
            .ok_or_else(|| CartError::LineNotFound(line_label(product_code, note)))?;

        let stock = self.remaining_stock(product_code)?;
        let requested = u32::try_from(quantity).unwrap_or(u32::MAX);
        self.items[i].quantity = Self::clamp(product_code, requested, stock);

        self.persist();
        Ok(())
    }

    /// Empty the cart and drop its slot so a later load is empty too.
    fn apply_clear(&mut self) {
        self.items.clear();
        let key = self.slot_key();
        if let Err(e) = self.slot.remove(&key) {
            warn!(key = %key, reason = %e, "failed to remove cart slot, writing empty cart");
            self.persist();
        }
    }
}

fn line_label(product_code: &str, note: Option<&str>) -> String {
    LineKey { product_code, note }.to_string()
}

/// Read a cart from `slot`, recovering from unreadable data with an empty cart.
///
/// Lines with an empty code, zero quantity or negative price are dropped and
/// duplicated keys are merged.
fn hydrate<S: PersistenceSlot>(slot: &S, key: &str) -> Vec<LineItem> {
    let loaded = match slot.load(key) {
        Ok(items) => items,
        Err(e) => {
            warn!(key, reason = %e, "discarding unreadable cart");
            return Vec::new();
        }
    };

    let mut items: Vec<LineItem> = Vec::with_capacity(loaded.len());
    for item in loaded {
        if item.product_code.is_empty() || item.quantity == 0 || item.unit_price < Amount::ZERO {
            warn!(key, product = %item.product_code, "dropping invalid persisted line");
            continue;
        }
        match items.iter_mut().find(|line| line.key() == item.key()) {
            Some(line) => line.quantity = line.quantity.saturating_add(item.quantity),
            None => items.push(item),
        }
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discount::ThresholdDiscount;
    use crate::stock::{StockError, StockTable};
    use crate::storage::{FileSlot, MemorySlot, StorageError};

    // test utils

    fn stock(levels: &[(&str, u32)]) -> StockTable {
        levels
            .iter()
            .map(|(code, n)| (code.to_string(), *n))
            .collect()
    }

    fn guest_cart(levels: &[(&str, u32)]) -> Cart<StockTable, MemorySlot> {
        Cart::open(Identity::Guest, stock(levels), MemorySlot::new())
    }

    fn item(code: &str, quantity: u32, price: f64) -> LineItem {
        LineItem::new(code, format!("{code} name"), Amount::from_float(price), quantity)
    }

    /// Oracle that can never answer.
    struct BrokenOracle;

    impl StockOracle for BrokenOracle {
        fn remaining_stock(&self, product_code: &str) -> Result<u32, StockError> {
            Err(StockError::Unavailable {
                product: product_code.to_string(),
                reason: "catalog offline".to_string(),
            })
        }
    }

    /// Slot whose writes always fail.
    #[derive(Default)]
    struct ReadOnlySlot;

    impl PersistenceSlot for ReadOnlySlot {
        fn load(&self, _key: &str) -> Result<Vec<LineItem>, StorageError> {
            Ok(Vec::new())
        }

        fn save(&mut self, key: &str, _items: &[LineItem]) -> Result<(), StorageError> {
            Err(StorageError::Io {
                key: key.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            })
        }

        fn remove(&mut self, key: &str) -> Result<(), StorageError> {
            self.save(key, &[])
        }
    }

    #[test]
    fn new_cart_is_empty() {
        let cart = guest_cart(&[]);
        assert!(cart.is_empty());
        assert_eq!(cart.totals(), Totals::default());
        assert_eq!(cart.slot_key(), "cart:guest");
    }

    // Add

    #[test]
    fn add_clamps_to_stock() {
        let mut cart = guest_cart(&[("TC001", 5)]);
        cart.add_item(item("TC001", 10, 1000.0));

        assert_eq!(cart.len(), 1);
        assert_eq!(cart.items()[0].quantity, 5);
        assert_eq!(cart.totals().subtotal, Amount::from_float(5000.0));
    }

    #[test]
    fn add_merges_same_key() {
        let mut cart = guest_cart(&[("A1", 10)]);
        cart.add_item(item("A1", 1, 2.0));
        cart.add_item(item("A1", 2, 2.0));

        assert_eq!(cart.len(), 1);
        assert_eq!(cart.items()[0].quantity, 3);
    }

    #[test]
    fn repeated_adds_sum_then_clamp() {
        let mut cart = guest_cart(&[("A1", 7)]);
        for q in [3, 2, 4, 1] {
            cart.add_item(item("A1", q, 2.0));
        }
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.items()[0].quantity, 7);
    }

    #[test]
    fn different_notes_are_distinct_lines() {
        let mut cart = guest_cart(&[("A1", 10)]);
        cart.add_item(item("A1", 1, 2.0).with_note("sin azúcar"));
        cart.add_item(item("A1", 1, 2.0));

        assert_eq!(cart.len(), 2);
        assert_eq!(cart.items()[0].note.as_deref(), Some("sin azúcar"));
        assert_eq!(cart.items()[1].note, None);
    }

    #[test]
    fn merge_keeps_existing_line_fields() {
        let mut cart = guest_cart(&[("A1", 10)]);
        cart.add_item(item("A1", 1, 2.0).with_image("a1.png"));
        cart.add_item(LineItem::new("A1", "renamed", Amount::from_float(9.0), 1));

        let line = &cart.items()[0];
        assert_eq!(line.quantity, 2);
        assert_eq!(line.name, "A1 name");
        assert_eq!(line.unit_price, Amount::from_float(2.0));
        assert_eq!(line.image, "a1.png");
    }

    #[test]
    fn insertion_order_is_preserved() {
        let mut cart = guest_cart(&[("A1", 10), ("B2", 10), ("C3", 10)]);
        cart.add_item(item("B2", 1, 1.0));
        cart.add_item(item("A1", 1, 1.0));
        cart.add_item(item("C3", 1, 1.0));
        cart.add_item(item("B2", 1, 1.0));

        let codes: Vec<_> = cart.items().iter().map(|l| l.product_code.as_str()).collect();
        assert_eq!(codes, ["B2", "A1", "C3"]);
    }

    #[test]
    fn add_out_of_stock_is_noop() {
        let mut cart = guest_cart(&[("TC001", 0)]);
        let result = cart.apply(CartCommand::Add(item("TC001", 1, 1000.0)));

        assert!(matches!(result, Err(CartError::OutOfStock(code)) if code == "TC001"));
        assert!(cart.is_empty());
        assert!(!cart.slot().contains("cart:guest"));
    }

    #[test]
    fn add_when_oracle_fails_is_noop() {
        let mut cart = Cart::open(Identity::Guest, BrokenOracle, MemorySlot::new());
        let result = cart.apply(CartCommand::Add(item("A1", 1, 1.0)));

        assert!(matches!(result, Err(CartError::StockUnavailable { .. })));
        assert!(cart.is_empty());
    }

    #[test]
    fn huge_prices_saturate_totals() {
        let mut cart = guest_cart(&[("A1", 10), ("B2", 10)]);
        cart.add_item(item("A1", 1, 1e15));
        cart.add_item(item("B2", 1, 1e15));

        let totals = cart.totals();
        assert_eq!(totals.subtotal, Amount::from_scaled(i64::MAX));
        assert_eq!(totals.total_to_pay, totals.subtotal);
    }

    #[test]
    fn add_invalid_args_is_noop() {
        let mut cart = guest_cart(&[("A1", 10)]);

        let empty_code = cart.apply(CartCommand::Add(item("", 1, 1.0)));
        let zero_qty = cart.apply(CartCommand::Add(item("A1", 0, 1.0)));
        let negative = cart.apply(CartCommand::Add(item("A1", 1, -1.0)));

        assert!(matches!(empty_code, Err(CartError::InvalidArgs(_))));
        assert!(matches!(zero_qty, Err(CartError::InvalidArgs(_))));
        assert!(matches!(negative, Err(CartError::InvalidArgs(_))));
        assert!(cart.is_empty());
    }

    #[test]
    fn merge_shrinks_line_when_stock_dropped() {
        let mut cart = guest_cart(&[("A1", 10)]);
        cart.add_item(item("A1", 8, 1.0));
        cart.stock_mut().set("A1", 4);
        cart.add_item(item("A1", 1, 1.0));

        assert_eq!(cart.items()[0].quantity, 4);
    }

    #[test]
    fn add_persists_full_list() {
        let mut cart = guest_cart(&[("A1", 10), ("B2", 10)]);
        cart.add_item(item("A1", 1, 1.0));
        cart.add_item(item("B2", 2, 1.0));

        let stored = cart.slot().load("cart:guest").unwrap();
        assert_eq!(stored, cart.items());
    }

    // Remove

    #[test]
    fn add_then_remove_is_empty() {
        let mut cart = guest_cart(&[("A1", 10)]);
        cart.add_item(item("A1", 2, 1.0).with_note("x"));
        cart.remove_item("A1", Some("x"));

        assert!(cart.is_empty());
        assert!(cart.slot().load("cart:guest").unwrap().is_empty());
    }

    #[test]
    fn remove_without_note_only_matches_plain_line() {
        let mut cart = guest_cart(&[("A1", 10)]);
        cart.add_item(item("A1", 1, 1.0).with_note("x"));
        cart.remove_item("A1", None);

        assert_eq!(cart.len(), 1);
    }

    #[test]
    fn remove_on_empty_cart_is_noop() {
        let mut cart = guest_cart(&[]);
        let result = cart.apply(CartCommand::Remove {
            product_code: "NOPE".to_string(),
            note: None,
        });

        assert!(matches!(result, Err(CartError::LineNotFound(_))));
        assert!(cart.is_empty());
        cart.remove_item("NOPE", None);
        assert!(cart.is_empty());
    }

    // Update

    #[test]
    fn update_sets_and_clamps() {
        let mut cart = guest_cart(&[("A1", 6)]);
        cart.add_item(item("A1", 1, 1.0));

        cart.update_quantity(Some("A1"), None, 4);
        assert_eq!(cart.items()[0].quantity, 4);

        cart.update_quantity(Some("A1"), None, 60);
        assert_eq!(cart.items()[0].quantity, 6);
    }

    #[test]
    fn update_to_zero_equals_remove() {
        let mut updated = guest_cart(&[("A1", 10), ("B2", 10)]);
        let mut removed = guest_cart(&[("A1", 10), ("B2", 10)]);
        for cart in [&mut updated, &mut removed] {
            cart.add_item(item("A1", 2, 1.0).with_note("n"));
            cart.add_item(item("B2", 1, 1.0));
        }

        updated.update_quantity(Some("A1"), Some("n"), 0);
        removed.remove_item("A1", Some("n"));

        assert_eq!(updated.items(), removed.items());
        assert_eq!(updated.len(), 1);
    }

    #[test]
    fn update_negative_removes() {
        let mut cart = guest_cart(&[("A1", 10)]);
        cart.add_item(item("A1", 2, 1.0));
        cart.update_quantity(Some("A1"), None, -3);
        assert!(cart.is_empty());
    }

    #[test]
    fn update_without_code_is_noop() {
        let mut cart = guest_cart(&[("A1", 10)]);
        cart.add_item(item("A1", 2, 1.0));

        let result = cart.apply(CartCommand::UpdateQuantity {
            product_code: None,
            note: None,
            quantity: 0,
        });

        assert!(matches!(result, Err(CartError::InvalidArgs(_))));
        assert_eq!(cart.items()[0].quantity, 2);
    }

    #[test]
    fn update_missing_line_is_noop() {
        let mut cart = guest_cart(&[("A1", 10)]);
        let result = cart.apply(CartCommand::UpdateQuantity {
            product_code: Some("A1".to_string()),
            note: None,
            quantity: 3,
        });

        assert!(matches!(result, Err(CartError::LineNotFound(_))));
        assert!(cart.is_empty());
    }

    #[test]
    fn update_when_oracle_fails_is_noop() {
        let mut slot = MemorySlot::new();
        slot.insert_raw(
            "cart:guest",
            r#"[{"productCode":"A1","name":"a","unitPrice":1,"quantity":2}]"#,
        );
        let mut cart = Cart::open(Identity::Guest, BrokenOracle, slot);
        assert_eq!(cart.items()[0].quantity, 2);

        let result = cart.apply(CartCommand::UpdateQuantity {
            product_code: Some("A1".to_string()),
            note: None,
            quantity: 5,
        });

        assert!(matches!(result, Err(CartError::StockUnavailable { .. })));
        assert_eq!(cart.items()[0].quantity, 2);
        let stored = cart.slot().load("cart:guest").unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].quantity, 2);
    }

    #[test]
    fn update_when_sold_out_keeps_line() {
        let mut cart = guest_cart(&[("A1", 10)]);
        cart.add_item(item("A1", 2, 1.0));
        cart.stock_mut().set("A1", 0);

        let result = cart.apply(CartCommand::UpdateQuantity {
            product_code: Some("A1".to_string()),
            note: None,
            quantity: 5,
        });

        assert!(matches!(result, Err(CartError::OutOfStock(_))));
        assert_eq!(cart.items()[0].quantity, 2);
    }

    // Clear and persistence

    #[test]
    fn clear_then_reload_is_empty() {
        let mut cart = guest_cart(&[("A1", 10)]);
        cart.add_item(item("A1", 2, 1.0));
        cart.clear();
        assert!(cart.is_empty());

        let slot = cart.into_slot();
        assert!(!slot.contains("cart:guest"));
        let reopened = Cart::open(Identity::Guest, stock(&[]), slot);
        assert!(reopened.is_empty());
    }

    #[test]
    fn hydrates_from_slot() {
        let mut cart = guest_cart(&[("A1", 10)]);
        cart.add_item(item("A1", 2, 1.5));
        let slot = cart.into_slot();

        let reopened = Cart::open(Identity::Guest, stock(&[]), slot);
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.items()[0].quantity, 2);
        assert_eq!(reopened.totals().subtotal, Amount::from_float(3.0));
    }

    #[test]
    fn corrupt_slot_hydrates_empty() {
        let mut slot = MemorySlot::new();
        slot.insert_raw("cart:guest", "definitely not json");

        let mut cart = Cart::open(Identity::Guest, stock(&[("A1", 3)]), slot);
        assert!(cart.is_empty());

        // the cart keeps working and overwrites the bad value
        cart.add_item(item("A1", 1, 1.0));
        assert_eq!(cart.slot().load("cart:guest").unwrap().len(), 1);
    }

    #[test]
    fn hydration_drops_invalid_and_merges_duplicates() {
        let mut slot = MemorySlot::new();
        slot.insert_raw(
            "cart:guest",
            r#"[
                {"productCode":"A1","name":"a","unitPrice":1,"quantity":1,"note":null},
                {"productCode":"","name":"x","unitPrice":1,"quantity":1},
                {"productCode":"B2","name":"b","unitPrice":1,"quantity":0},
                {"productCode":"A1","name":"a","unitPrice":1,"quantity":2}
            ]"#,
        );

        let cart = Cart::open(Identity::Guest, stock(&[]), slot);
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.items()[0].quantity, 3);
    }

    #[test]
    fn save_failure_keeps_mutation_in_memory() {
        let mut cart = Cart::open(Identity::Guest, stock(&[("A1", 10)]), ReadOnlySlot);
        cart.add_item(item("A1", 2, 1.0));
        assert_eq!(cart.items()[0].quantity, 2);

        cart.clear();
        assert!(cart.is_empty());
    }

    // Identity

    #[test]
    fn identities_have_separate_carts() {
        let mut cart = guest_cart(&[("A1", 10), ("B2", 10)]);
        cart.add_item(item("A1", 1, 1.0));

        cart.switch_identity(Identity::User("ana".to_string()));
        assert!(cart.is_empty());
        assert_eq!(cart.slot_key(), "cart:user:ana");
        cart.add_item(item("B2", 2, 1.0));

        cart.switch_identity(Identity::Guest);
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.items()[0].product_code, "A1");

        cart.switch_identity(Identity::User("ana".to_string()));
        assert_eq!(cart.items()[0].product_code, "B2");
    }

    #[test]
    fn similar_user_ids_do_not_share_a_file_cart() {
        let dir = tempfile::TempDir::new().unwrap();
        let slot = FileSlot::new(dir.path()).unwrap();
        let mut cart = Cart::open(Identity::User("ana:b".to_string()), stock(&[("A1", 10)]), slot);
        cart.add_item(item("A1", 2, 1.0));

        cart.switch_identity(Identity::User("ana_b".to_string()));
        assert!(cart.is_empty());

        cart.switch_identity(Identity::User("ana:b".to_string()));
        assert_eq!(cart.items()[0].quantity, 2);
    }

    #[test]
    fn custom_namespace_and_discount() {
        let policy = ThresholdDiscount::new(10, Amount::from_float(100.0));
        let mut cart = Cart::open_with(
            "bakery",
            Identity::User("7".to_string()),
            stock(&[("TC001", 5)]),
            MemorySlot::new(),
            policy,
        );
        cart.add_item(item("TC001", 10, 1000.0));

        let totals = cart.totals();
        assert_eq!(totals.subtotal, Amount::from_float(5000.0));
        assert_eq!(totals.discount_amount, Amount::from_float(500.0));
        assert_eq!(totals.total_to_pay, Amount::from_float(4500.0));
        assert!(cart.slot().contains("bakery:user:7"));
    }

    // Async run()

    #[tokio::test]
    async fn run_processes_all_commands() {
        let mut cart = guest_cart(&[("A1", 10), ("B2", 10)]);
        let commands = vec![
            CartCommand::Add(item("A1", 2, 1.0)),
            CartCommand::Add(item("B2", 1, 1.0)),
            CartCommand::UpdateQuantity {
                product_code: Some("A1".to_string()),
                note: None,
                quantity: 5,
            },
        ];

        cart.run(tokio_stream::iter(commands)).await;

        assert_eq!(cart.totals().total_quantity, 6);
    }

    #[tokio::test]
    async fn run_skips_failed_commands_and_continues() {
        let mut cart = guest_cart(&[("A1", 10)]);
        let commands = vec![
            CartCommand::Add(item("A1", 1, 1.0)),
            CartCommand::Add(item("NOPE", 1, 1.0)), // unknown product
            CartCommand::Remove {
                product_code: "B2".to_string(),
                note: None,
            },
            CartCommand::Add(item("A1", 1, 1.0)),
        ];

        cart.run(tokio_stream::iter(commands)).await;

        assert_eq!(cart.len(), 1);
        assert_eq!(cart.items()[0].quantity, 2);
    }
}
