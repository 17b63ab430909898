use crate::discount::DiscountPolicy;
use crate::{Amount, LineItem};

/// Aggregates derived from the cart lines. Never stored, always recomputed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Totals {
    pub total_quantity: u64,
    pub subtotal: Amount,
    pub discount_amount: Amount,
    pub discount_description: Option<String>,
    pub total_before_discount: Amount,
    pub total_to_pay: Amount,
}

impl Totals {
    pub fn compute<D: DiscountPolicy + ?Sized>(items: &[LineItem], policy: &D) -> Self {
        let total_quantity: u64 = items.iter().map(|i| u64::from(i.quantity)).sum();
        let subtotal: Amount = items.iter().map(LineItem::line_total).sum();

        let discount = policy.compute(items, subtotal);
        // policy output is clamped to [0, subtotal]
        let discount_amount = discount.amount.max(Amount::ZERO).min(subtotal);
        let discount_description = if discount_amount == Amount::ZERO {
            None
        } else {
            discount.description
        };

        Self {
            total_quantity,
            subtotal,
            discount_amount,
            discount_description,
            total_before_discount: subtotal,
            total_to_pay: subtotal.saturating_sub(discount_amount),
        }
    }
}
