use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Side;

/// Net signed holding of a symbol in the account
///
/// One record per symbol; the quantity equals the net signed sum of all
/// fills since the position was last flat. The record is dropped by its
/// owner when the quantity returns to zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionRecord {
    pub symbol: String,
    /// Signed quantity: positive = long, negative = short
    pub quantity: Decimal,
    /// Weighted average entry price
    pub avg_entry_price: Decimal,
    /// Realized PnL since the position was last flat
    pub realized_pnl: Decimal,
    pub opened_at: DateTime<Utc>,
}

impl PositionRecord {
    pub fn new(symbol: impl Into<String>, opened_at: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            quantity: Decimal::ZERO,
            avg_entry_price: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            opened_at,
        }
    }

    /// Apply a fill to this position, returning the realized PnL from
    /// any closed portion
    pub fn apply_fill(&mut self, side: Side, quantity: Decimal, price: Decimal) -> Decimal {
        let signed_qty = match side {
            Side::Buy => quantity,
            Side::Sell => -quantity,
        };

        let mut realized_pnl = Decimal::ZERO;

        // Realize PnL on the closed portion when reducing
        if (self.quantity > Decimal::ZERO && signed_qty < Decimal::ZERO)
            || (self.quantity < Decimal::ZERO && signed_qty > Decimal::ZERO)
        {
            let close_qty = signed_qty.abs().min(self.quantity.abs());
            realized_pnl = if self.quantity > Decimal::ZERO {
                close_qty * (price - self.avg_entry_price)
            } else {
                close_qty * (self.avg_entry_price - price)
            };
        }

        let new_quantity = self.quantity + signed_qty;

        if new_quantity.is_zero() {
            self.avg_entry_price = Decimal::ZERO;
        } else if (self.quantity >= Decimal::ZERO && signed_qty > Decimal::ZERO)
            || (self.quantity <= Decimal::ZERO && signed_qty < Decimal::ZERO)
        {
            // Adding to position - weighted average entry
            let total_cost = self.quantity.abs() * self.avg_entry_price + quantity * price;
            self.avg_entry_price = total_cost / new_quantity.abs();
        } else if new_quantity.is_sign_positive() != self.quantity.is_sign_positive() {
            // Flipped sides - new entry price is the fill price
            self.avg_entry_price = price;
        }
        // Reducing without flipping keeps the entry price

        self.quantity = new_quantity;
        self.realized_pnl += realized_pnl;
        realized_pnl
    }

    /// Unrealized PnL at the given mark price
    pub fn unrealized_pnl(&self, mark_price: Decimal) -> Decimal {
        if self.quantity.is_zero() {
            Decimal::ZERO
        } else if self.quantity > Decimal::ZERO {
            self.quantity * (mark_price - self.avg_entry_price)
        } else {
            self.quantity.abs() * (self.avg_entry_price - mark_price)
        }
    }

    /// Total PnL (realized + unrealized) at the given mark price
    pub fn total_pnl(&self, mark_price: Decimal) -> Decimal {
        self.realized_pnl + self.unrealized_pnl(mark_price)
    }

    /// Notional exposure at the given mark price
    pub fn notional(&self, mark_price: Decimal) -> Decimal {
        self.quantity.abs() * mark_price
    }

    /// Side of the order that would close this position
    pub fn closing_side(&self) -> Side {
        if self.quantity > Decimal::ZERO {
            Side::Sell
        } else {
            Side::Buy
        }
    }

    pub fn is_flat(&self) -> bool {
        self.quantity.is_zero()
    }

    pub fn is_long(&self) -> bool {
        self.quantity > Decimal::ZERO
    }

    pub fn is_short(&self) -> bool {
        self.quantity < Decimal::ZERO
    }
}
