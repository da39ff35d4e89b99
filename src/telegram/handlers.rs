//! Message routing for the bot side.
//!
//! Two paths: commands (`/start`, `/help`) and free-text private messages
//! parsed as "amount name" spendings. Group chats are ignored — the bot
//! is a personal tracker, not a group accountant.

use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, WebAppInfo};
use teloxide::utils::command::BotCommands;

use crate::core::config::Config;
use crate::spending::parse_spending_text;
use crate::storage::{db, get_connection, DbPool};
use crate::telegram::bot::Command;
use crate::telegram::messages::motivational_message;

const USAGE_HINT: &str =
    "Send me a spending as \"amount name\", e.g. 12.5 Coffee — I'll log it for you.";

/// Dependencies injected into every handler by the dispatcher.
#[derive(Clone)]
pub struct HandlerDeps {
    pub db_pool: Arc<DbPool>,
    pub config: Arc<Config>,
}

/// Dispatch tree: commands first, then the free-text spending path.
pub fn schema() -> UpdateHandler<teloxide::RequestError> {
    Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(dptree::endpoint(handle_message))
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    deps: HandlerDeps,
) -> ResponseResult<()> {
    match cmd {
        Command::Start => handle_start(&bot, &msg, &deps).await,
        Command::Help => {
            bot.send_message(
                msg.chat.id,
                format!("{}\n\n{}", USAGE_HINT, Command::descriptions()),
            )
            .await?;
            Ok(())
        }
    }
}

async fn handle_start(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> ResponseResult<()> {
    register_sender(msg, deps);

    let mut request = bot.send_message(
        msg.chat.id,
        "Welcome! Click below to open the Mini App, or just send me a spending like \"12.5 Coffee\".",
    );

    if let Some(url) = deps.config.mini_app_url.clone() {
        let keyboard = InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::web_app(
            "Open Mini App",
            WebAppInfo { url },
        )]]);
        request = request.reply_markup(keyboard);
    }

    request.await?;
    Ok(())
}

/// Handle a plain text message as a spending record.
pub async fn handle_message(bot: Bot, msg: Message, deps: HandlerDeps) -> ResponseResult<()> {
    if !msg.chat.is_private() {
        return Ok(());
    }
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let Some(parsed) = parse_spending_text(text) else {
        bot.send_message(msg.chat.id, USAGE_HINT).await?;
        return Ok(());
    };

    let first_name = match record_spending(&msg, &deps, parsed.amount, &parsed.name) {
        Ok(name) => name,
        Err(e) => {
            log::error!("Failed to record spending for chat {}: {}", msg.chat.id, e);
            bot.send_message(msg.chat.id, "Something went wrong, the spending was not saved. Try again in a moment.")
                .await?;
            return Ok(());
        }
    };

    bot.send_message(msg.chat.id, motivational_message(&first_name))
        .await?;
    Ok(())
}

/// Insert the spending, creating the user on first contact.
///
/// Returns the name to address the user by in the confirmation.
fn record_spending(
    msg: &Message,
    deps: &HandlerDeps,
    amount: f64,
    name: &str,
) -> anyhow::Result<String> {
    let conn = get_connection(&deps.db_pool)?;
    let (telegram_id, username, first_name) = sender_identity(msg);
    let user = db::upsert_user(&conn, telegram_id, username.as_deref(), first_name.as_deref())?;

    db::insert_spending(&conn, user.id, amount, name, None)?;

    Ok(user.first_name.unwrap_or_else(|| "there".to_string()))
}

/// Best-effort user registration; /start should not fail on a DB hiccup.
fn register_sender(msg: &Message, deps: &HandlerDeps) {
    let (telegram_id, username, first_name) = sender_identity(msg);
    match get_connection(&deps.db_pool) {
        Ok(conn) => {
            if let Err(e) =
                db::upsert_user(&conn, telegram_id, username.as_deref(), first_name.as_deref())
            {
                log::warn!("Failed to upsert user {}: {}", telegram_id, e);
            }
        }
        Err(e) => log::warn!("DB pool error on /start: {}", e),
    }
}

fn sender_identity(msg: &Message) -> (i64, Option<String>, Option<String>) {
    match msg.from.as_ref() {
        Some(from) => (
            from.id.0 as i64,
            from.username.clone(),
            Some(from.first_name.clone()),
        ),
        // Channel posts and the like: fall back to the chat id.
        None => (msg.chat.id.0, None, None),
    }
}
