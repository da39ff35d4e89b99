//! Bot initialization and command definitions

use teloxide::prelude::*;
use teloxide::types::BotCommand;
use teloxide::utils::command::BotCommands;

use crate::core::config::Config;

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "I can:")]
pub enum Command {
    #[command(description = "open the expense tracker")]
    Start,
    #[command(description = "how to record a spending")]
    Help,
}

/// Creates a Bot instance from the loaded configuration.
///
/// The token comes from [`Config`], not straight from the environment, so
/// a missing token fails at startup in `Config::from_env` with context.
pub fn create_bot(config: &Config) -> Bot {
    Bot::new(config.bot_token.clone())
}

/// Sets up bot commands in the Telegram UI
///
/// # Errors
/// * `Err(RequestError)` - Failed to set commands
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    bot.set_my_commands(vec![
        BotCommand::new("start", "open the expense tracker"),
        BotCommand::new("help", "how to record a spending"),
    ])
    .await?;

    Ok(())
}
