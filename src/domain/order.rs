//! Order records and the trade direction tag.

use chrono::NaiveDateTime;
use std::fmt;
use uuid::Uuid;

/// Trade direction. Closed set: anything else is unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Buy,
    Sell,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Buy => write!(f, "buy"),
            Direction::Sell => write!(f, "sell"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Accepted,
    Filled,
    Cancelled,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Accepted => write!(f, "accepted"),
            OrderStatus::Filled => write!(f, "filled"),
            OrderStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// An accepted trade request. Immutable after creation except for `status`.
#[derive(Debug, Clone)]
pub struct Order {
    pub id: String,
    pub code: String,
    pub price: f64,
    pub volume: i64,
    pub amount: f64,
    pub direction: Direction,
    pub created_at: Option<NaiveDateTime>,
    pub status: OrderStatus,
}

impl Order {
    pub fn new(
        code: &str,
        volume: i64,
        price: f64,
        direction: Direction,
        id: Option<String>,
        created_at: Option<NaiveDateTime>,
    ) -> Self {
        Order {
            id: id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            code: code.to_string(),
            price,
            volume,
            amount: price * volume as f64,
            direction,
            created_at,
            status: OrderStatus::Accepted,
        }
    }
}
