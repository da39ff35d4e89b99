//! Telegram bot integration and the Mini App API

pub mod bot;
pub mod handlers;
pub mod messages;
pub mod webapp;
pub mod webapp_auth;

// Re-exports for convenience
pub use bot::{create_bot, setup_bot_commands, Command};
pub use handlers::{handle_message, schema, HandlerDeps};
pub use webapp::{create_webapp_router, run_webapp_server, WebAppState};
