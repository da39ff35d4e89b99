use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "kopilka")]
#[command(author, version, about = "Telegram expense-tracking bot with a Mini App", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the bot and the Mini App web server
    Run {
        /// Override the Mini App server port (defaults to WEBAPP_PORT)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Run database migrations and exit
    Migrate,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
