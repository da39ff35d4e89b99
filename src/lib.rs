//! Kopilka - Telegram expense-tracking bot with a Mini App
//!
//! This library provides all the core functionality for the Kopilka bot:
//! recording spendings from chat messages, serving the Mini App HTTP API
//! (including Telegram init data verification), and AI spending insights.
//!
//! # Module Structure
//!
//! - `core`: Configuration, errors, logging and the insights client
//! - `spending`: Spending text and forwarded-transaction parsing
//! - `storage`: SQLite database access and migrations
//! - `telegram`: Bot handlers and the Mini App web server

pub mod cli;
pub mod core;
pub mod spending;
pub mod storage;
pub mod telegram;

// Re-export commonly used types for convenience
pub use core::{AppError, AppResult, Config};
pub use spending::{parse_forwarded_transaction, parse_spending_text, ParsedSpending};
pub use storage::{create_pool, get_connection, DbConnection, DbPool};
pub use telegram::webapp_auth::{verify, InitDataError, VerifiedInitData, WebAppUser};
pub use telegram::{create_webapp_router, run_webapp_server, WebAppState};
