//! Discount policies applied on top of the cart subtotal.

use crate::{Amount, LineItem};

/// Outcome of a discount policy.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Discount {
    pub amount: Amount,
    pub description: Option<String>,
}

impl Discount {
    pub fn none() -> Self {
        Self::default()
    }
}

/// Pure mapping from cart contents to a discount.
///
/// Implementations should never return more than `subtotal`; the cart
/// clamps the amount to `[0, subtotal]` either way.
pub trait DiscountPolicy {
    fn compute(&self, items: &[LineItem], subtotal: Amount) -> Discount;
}

/// Never discounts.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDiscount;

impl DiscountPolicy for NoDiscount {
    fn compute(&self, _items: &[LineItem], _subtotal: Amount) -> Discount {
        Discount::none()
    }
}

/// Percentage off once the subtotal reaches a minimum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdDiscount {
    pub percent: u32,
    pub min_subtotal: Amount,
}

impl ThresholdDiscount {
    pub fn new(percent: u32, min_subtotal: Amount) -> Self {
        Self {
            percent: percent.min(100),
            min_subtotal,
        }
    }
}

impl DiscountPolicy for ThresholdDiscount {
    fn compute(&self, _items: &[LineItem], subtotal: Amount) -> Discount {
        if self.percent == 0 || subtotal == Amount::ZERO || subtotal < self.min_subtotal {
            return Discount::none();
        }
        Discount {
            amount: subtotal.percent(self.percent),
            description: Some(format!(
                "{}% off orders from {}",
                self.percent, self.min_subtotal
            )),
        }
    }
}

impl<P: DiscountPolicy + ?Sized> DiscountPolicy for Box<P> {
    fn compute(&self, items: &[LineItem], subtotal: Amount) -> Discount {
        (**self).compute(items, subtotal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_discount_is_zero() {
        let d = NoDiscount.compute(&[], Amount::from_float(50.0));
        assert_eq!(d, Discount::none());
    }

    #[test]
    fn threshold_below_minimum() {
        let policy = ThresholdDiscount::new(10, Amount::from_float(100.0));
        let d = policy.compute(&[], Amount::from_float(99.99));
        assert_eq!(d.amount, Amount::ZERO);
        assert!(d.description.is_none());
    }

    #[test]
    fn threshold_reached() {
        let policy = ThresholdDiscount::new(10, Amount::from_float(100.0));
        let d = policy.compute(&[], Amount::from_float(250.0));
        assert_eq!(d.amount, Amount::from_float(25.0));
        assert_eq!(
            d.description.as_deref(),
            Some("10% off orders from 100.0000")
        );
    }

    #[test]
    fn percent_is_capped_at_100() {
        let policy = ThresholdDiscount::new(150, Amount::ZERO);
        let d = policy.compute(&[], Amount::from_float(40.0));
        assert_eq!(d.amount, Amount::from_float(40.0));
    }
}
