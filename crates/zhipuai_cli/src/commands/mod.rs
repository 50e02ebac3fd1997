//! Command dispatch.

pub mod chat;
pub mod models;

use crate::cli::{Cli, Command};
use anyhow::Result;

pub async fn handle(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Chat(args) => chat::handle(args).await,
        Command::Models => models::handle().await,
    }
}
