//! `zhipuai models` subcommand.

use anyhow::Result;
use zhipuai_llms::providers::zhipuai::{DEFAULT_MODEL, KNOWN_MODELS, is_character_model};

use crate::output;

fn describe(model: &str) -> &'static str {
    match (model == DEFAULT_MODEL, is_character_model(model)) {
        (true, _) => "chat (default)",
        (false, true) => "character role-play",
        (false, false) => "chat",
    }
}

pub async fn handle() -> Result<()> {
    let _span = zhipuai_observability::command_span!("models").entered();

    output::header("ZhipuAI chat models");

    let mut table = output::table();
    output::table_header(&mut table, "Model", "Kind");

    let items: Vec<_> = KNOWN_MODELS
        .iter()
        .map(|model| {
            let kind = describe(model);
            output::table_row(&mut table, model, kind);
            (*model, kind)
        })
        .collect();

    output::table_print(&table, &items);

    Ok(())
}
