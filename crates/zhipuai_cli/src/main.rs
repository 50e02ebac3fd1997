//! CLI entry point for the ZhipuAI chat client.

mod cli;
mod commands;
mod output;

use clap::Parser;
use zhipuai_observability::ObservabilityConfig;

use crate::cli::Cli;

/// Load `.env` from the current directory or the nearest parent that has one.
fn load_dotenv() {
    let Ok(mut dir) = std::env::current_dir() else {
        return;
    };
    for _ in 0..32 {
        let env_file = dir.join(".env");
        if env_file.exists() {
            let _ = dotenvy::from_path(&env_file);
            return;
        }
        if !dir.pop() {
            return;
        }
    }
}

fn observability_config(verbose: bool) -> ObservabilityConfig {
    let config = ObservabilityConfig::from_env().with_version(env!("CARGO_PKG_VERSION"));
    match (verbose, config.log_level.is_some()) {
        (true, _) => config.with_log_level("zhipuai=debug,info"),
        (false, true) => config,
        (false, false) => config.with_log_level("warn"),
    }
}

#[tokio::main]
async fn main() {
    load_dotenv();
    let cli = Cli::parse();
    output::init(cli.json);

    if let Err(e) = zhipuai_observability::init(observability_config(cli.verbose)) {
        output::warning(&format!("Logging disabled: {}", e));
    }

    let outcome = commands::handle(cli).await;
    zhipuai_observability::shutdown();

    if let Err(e) = outcome {
        output::error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
