use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use std::fmt;

/// Reserved fallback category. Always present in the store, never matched against.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Fixed `Completion Time` format of M-Pesa exports.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Credit,
    Debit,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Credit => "Credit",
            Direction::Debit => "Debit",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One canonical statement row.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub date: NaiveDateTime,
    /// Description with masked phone numbers removed.
    pub details: String,
    /// Non-negative magnitude; the sign lives in `direction`.
    pub amount: Decimal,
    pub direction: Direction,
    /// Running balance exactly as the source reported it.
    pub balance: String,
    pub category: String,
}
