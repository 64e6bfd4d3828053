//! Single-account trading ledger: order admission, deal application,
//! end-of-day settlement, and read-only aggregates.
//!
//! All operations are synchronous and in-memory. Callers sharing an
//! account across threads must serialize the mutating calls themselves.

use chrono::NaiveDateTime;
use std::collections::HashMap;

use super::error::LedgerError;
use super::order::{Direction, Order, OrderStatus};
use super::position::Position;

#[derive(Debug, Clone)]
pub struct Account {
    /// Unreserved cash. Never negative.
    pub available_cash: f64,
    /// Starting capital, fixed at construction.
    pub init_cash: f64,
    /// One position per instrument code, created on first reference and
    /// never removed.
    pub positions: HashMap<String, Position>,
    /// Append-only within a session; cancellation flips status, it does
    /// not delete.
    pub orders: HashMap<String, Order>,
}

impl Account {
    pub fn new(init_cash: f64) -> Self {
        Account {
            available_cash: init_cash,
            init_cash,
            positions: HashMap::new(),
            orders: HashMap::new(),
        }
    }

    /// Get-or-create the position for `code`.
    pub fn position(&mut self, code: &str) -> &mut Position {
        self.positions
            .entry(code.to_string())
            .or_insert_with(|| Position::new(code))
    }

    pub fn get_position(&self, code: &str) -> Option<&Position> {
        self.positions.get(code)
    }

    /// The account's only position. Errors unless exactly one instrument
    /// is held; with several, a no-code lookup is ambiguous.
    pub fn single_position(&self) -> Result<&Position, LedgerError> {
        if self.positions.len() == 1 {
            Ok(self.positions.values().next().unwrap())
        } else {
            Err(LedgerError::AmbiguousPosition {
                count: self.positions.len(),
            })
        }
    }

    /// Mark one instrument to a new market price.
    pub fn on_price_change(&mut self, code: &str, price: f64) {
        self.position(code).on_price_change(price);
    }

    /// Submit an order. Admission control reserves cash (buy) or history
    /// volume (sell); only if the reservation succeeds is the order
    /// recorded and returned. On rejection nothing is reserved and no
    /// order exists.
    pub fn submit_order(
        &mut self,
        code: &str,
        volume: i64,
        price: f64,
        direction: Direction,
        order_id: Option<String>,
        created_at: Option<NaiveDateTime>,
    ) -> Result<Order, LedgerError> {
        self.order_check(code, volume, price, direction)?;
        let order = Order::new(code, volume, price, direction, order_id, created_at);
        self.orders.insert(order.id.clone(), order.clone());
        Ok(order)
    }

    /// Admission control. Refreshes the position's last price from the
    /// order price, then reserves the resource the fill will consume.
    fn order_check(
        &mut self,
        code: &str,
        volume: i64,
        price: f64,
        direction: Direction,
    ) -> Result<(), LedgerError> {
        if volume <= 0 {
            return Err(LedgerError::InvalidOrder {
                code: code.to_string(),
                reason: format!("volume must be positive, got {volume}"),
            });
        }
        if !price.is_finite() || price <= 0.0 {
            return Err(LedgerError::InvalidOrder {
                code: code.to_string(),
                reason: format!("price must be positive and finite, got {price}"),
            });
        }

        let available_cash = self.available_cash;
        let pos = self.position(code);
        pos.on_price_change(price);

        match direction {
            Direction::Buy => {
                let required = volume as f64 * price;
                if available_cash < required {
                    return Err(LedgerError::InsufficientFunds {
                        required,
                        available: available_cash,
                    });
                }
                pos.frozen_cash += required;
                self.available_cash -= required;
            }
            Direction::Sell => {
                if pos.volume_long_history < volume {
                    return Err(LedgerError::InsufficientPosition {
                        code: code.to_string(),
                        requested: volume,
                        sellable: pos.volume_long_history,
                    });
                }
                pos.volume_long_history -= volume;
                pos.volume_short_frozen += volume;
            }
        }
        Ok(())
    }

    /// Apply a full fill of a previously accepted order at its own
    /// price and volume.
    pub fn apply_deal(&mut self, order: &Order) -> Result<(), LedgerError> {
        self.process_deal(
            &order.code,
            order.price,
            order.volume,
            order.amount,
            order.direction,
            &order.id,
        )
    }

    /// Move reserved resources into settled state for a fill. Full
    /// fills only; the traded volume must equal the order volume.
    ///
    /// The sell branch reduces `volume_long_history` again even though
    /// admission already removed the same quantity. This reproduces the
    /// reference ledger's arithmetic; see DESIGN.md before changing it.
    pub fn process_deal(
        &mut self,
        code: &str,
        trade_price: f64,
        trade_volume: i64,
        trade_amount: f64,
        direction: Direction,
        order_id: &str,
    ) -> Result<(), LedgerError> {
        self.position(code).on_price_change(trade_price);

        let status = match self.orders.get(order_id) {
            Some(order) => order.status,
            None => {
                return Err(LedgerError::UnknownOrder {
                    order_id: order_id.to_string(),
                });
            }
        };
        if status != OrderStatus::Accepted {
            return Err(LedgerError::OrderNotFillable {
                order_id: order_id.to_string(),
                status: status.to_string(),
            });
        }

        let pos = self.position(code);
        match direction {
            Direction::Buy => {
                pos.frozen_cash -= trade_amount;
                pos.volume_long_today += trade_volume;
                pos.position_cost += trade_amount;
                pos.open_cost += trade_amount;
            }
            Direction::Sell => {
                pos.volume_short_frozen -= trade_volume;
                pos.volume_long_history -= trade_volume;
                pos.volume_short_today += trade_volume;
                pos.position_cost -= trade_amount;
                self.available_cash += trade_amount;
            }
        }

        if let Some(order) = self.orders.get_mut(order_id) {
            order.status = OrderStatus::Filled;
        }
        Ok(())
    }

    /// Release the admission reservation of an open order and mark it
    /// cancelled. Filled and already-cancelled orders are refused.
    pub fn cancel_order(&mut self, order_id: &str) -> Result<(), LedgerError> {
        let (code, volume, amount, direction) = match self.orders.get(order_id) {
            Some(order) if order.status == OrderStatus::Accepted => (
                order.code.clone(),
                order.volume,
                order.amount,
                order.direction,
            ),
            Some(order) => {
                return Err(LedgerError::OrderNotCancellable {
                    order_id: order_id.to_string(),
                    status: order.status.to_string(),
                });
            }
            None => {
                return Err(LedgerError::UnknownOrder {
                    order_id: order_id.to_string(),
                });
            }
        };

        let pos = self.position(&code);
        match direction {
            Direction::Buy => {
                pos.frozen_cash -= amount;
                self.available_cash += amount;
            }
            Direction::Sell => {
                pos.volume_short_frozen -= volume;
                pos.volume_long_history += volume;
            }
        }

        if let Some(order) = self.orders.get_mut(order_id) {
            order.status = OrderStatus::Cancelled;
        }
        Ok(())
    }

    /// Roll every position's today volumes into history. Positions are
    /// independent; the visit order does not matter.
    pub fn settle(&mut self) {
        for pos in self.positions.values_mut() {
            pos.settle();
        }
    }

    pub fn frozen_cash(&self) -> f64 {
        self.positions.values().map(|p| p.frozen_cash).sum()
    }

    pub fn total_cash(&self) -> f64 {
        self.available_cash + self.frozen_cash()
    }

    pub fn float_profit(&self) -> f64 {
        self.positions.values().map(|p| p.float_profit()).sum()
    }

    pub fn total_market_value(&self) -> f64 {
        self.positions.values().map(|p| p.market_value()).sum()
    }

    pub fn total_assets(&self) -> f64 {
        self.total_cash() + self.total_market_value()
    }

    /// Percentage return on starting capital, rounded to two decimals.
    pub fn profit_ratio(&self) -> f64 {
        let ratio = 100.0 * (self.total_assets() - self.init_cash) / self.init_cash;
        (ratio * 100.0).round() / 100.0
    }
}
