//! CLI argument definitions using clap derive macros.

use clap::{Args, Parser, Subcommand};

/// Chat with ZhipuAI GLM models from the terminal
#[derive(Parser)]
#[command(name = "zhipuai", about, version, propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose (debug) logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit structured JSON instead of styled text
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Send a prompt and print the reply
    Chat(ChatArgs),
    /// List known GLM chat models
    Models,
}

#[derive(Args, Debug, Clone)]
pub struct ChatArgs {
    /// Prompt to send as the user turn
    pub prompt: String,

    /// Model to use (e.g. glm-4). Uses ZHIPUAI_MODEL env if not set.
    #[arg(long)]
    pub model: Option<String>,

    /// Sampling temperature in (0, 1]
    #[arg(long)]
    pub temperature: Option<f64>,

    /// Nucleus sampling mass in (0, 1)
    #[arg(long)]
    pub top_p: Option<f64>,

    /// Maximum number of tokens to generate
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Stop sequence (repeatable; only the first is sent)
    #[arg(long)]
    pub stop: Vec<String>,

    /// System prompt sent before the user turn
    #[arg(long)]
    pub system: Option<String>,

    /// Print tokens as they arrive
    #[arg(long, conflicts_with = "async_job")]
    pub stream: bool,

    /// Submit as an async job and poll for the result
    #[arg(long = "async")]
    pub async_job: bool,

    /// Retries after the first failed attempt
    #[arg(long)]
    pub max_retries: Option<u32>,
}
