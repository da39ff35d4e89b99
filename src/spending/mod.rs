//! Spending text parsing

pub mod parser;

pub use parser::{parse_forwarded_transaction, parse_spending_text, ParsedSpending};
