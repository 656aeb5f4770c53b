use clap::{Parser, Subcommand};

use crate::download::models::MediaKind;

#[derive(Parser)]
#[command(name = "clipdrop")]
#[command(author, version, about = "Telegram bot that downloads videos and audio with yt-dlp", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the bot (default)
    Run {
        /// Use webhook mode instead of long polling
        #[arg(long)]
        webhook: bool,
    },

    /// Resolve a link and print the format menu the bot would show
    Info {
        url: String,

        /// Which menu to print
        #[arg(short, long, default_value = "video")]
        kind: MediaKind,

        /// Print the menu as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
