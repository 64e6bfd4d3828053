//! Per-instrument holding state and end-of-day settlement.

/// Holding state for one instrument code.
///
/// Quantities are split into settled history volume and unsettled today
/// volume; `volume_short_frozen` and `frozen_cash` are reservations held
/// against open orders and belong to the order lifecycle, not the trading
/// day.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub code: String,
    /// Settled long quantity owned before today.
    pub volume_long_history: i64,
    /// Long quantity acquired today, not yet settled.
    pub volume_long_today: i64,
    /// Quantity sold today against history.
    pub volume_short_today: i64,
    /// Quantity reserved against an open, unfilled sell order.
    pub volume_short_frozen: i64,
    /// Cash reserved against an open, unfilled buy order.
    pub frozen_cash: f64,
    pub position_cost: f64,
    pub open_cost: f64,
    pub last_price: f64,
}

impl Position {
    pub fn new(code: &str) -> Self {
        Position {
            code: code.to_string(),
            volume_long_history: 0,
            volume_long_today: 0,
            volume_short_today: 0,
            volume_short_frozen: 0,
            frozen_cash: 0.0,
            position_cost: 0.0,
            open_cost: 0.0,
            last_price: 0.0,
        }
    }

    /// Record a new market price. Non-finite or non-positive prices are
    /// ignored rather than poisoning the valuation.
    pub fn on_price_change(&mut self, price: f64) {
        if price.is_finite() && price > 0.0 {
            self.last_price = price;
        }
    }

    /// Total long quantity, settled and unsettled.
    pub fn volume_long(&self) -> i64 {
        self.volume_long_history + self.volume_long_today
    }

    pub fn market_value(&self) -> f64 {
        self.last_price * self.volume_long() as f64
    }

    /// Unrealized profit against cumulative cost basis.
    pub fn float_profit(&self) -> f64 {
        self.market_value() - self.position_cost
    }

    /// Roll today's volumes into history: the day's buys are added, the
    /// day's sells are netted off, and both today counters reset. Frozen
    /// reservations are untouched. A second call without intervening
    /// trades is a no-op.
    pub fn settle(&mut self) {
        self.volume_long_history += self.volume_long_today;
        self.volume_long_history -= self.volume_short_today;
        self.volume_long_today = 0;
        self.volume_short_today = 0;
    }
}
