//! `zhipuai chat` subcommand.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::Instrument;
use zhipuai_llms::providers::zhipuai::ZhipuAIConfig;
use zhipuai_llms::{
    CallOptions, CallbackHandler, ChatGenerationChunk, ChatModel, ChatResult, ChatZhipuAI, Error,
    Message,
};
use zhipuai_observability::{chat_span, record_duration, record_error};

use crate::cli::ChatArgs;
use crate::output;

/// Prints streamed tokens and retry notices to the terminal.
struct TerminalCallbacks {
    print_tokens: bool,
}

impl CallbackHandler for TerminalCallbacks {
    fn on_llm_new_token(&self, token: &str, _chunk: &ChatGenerationChunk) {
        if self.print_tokens {
            output::token(token);
        }
    }

    fn on_retry(&self, attempt: u32, error: &Error) {
        output::warning(&format!("Attempt {} failed ({}), retrying", attempt, error));
    }
}

fn build_config(args: &ChatArgs) -> ZhipuAIConfig {
    let mut config = ZhipuAIConfig::from_env();

    if let Some(model) = &args.model {
        config = config.with_model(model);
    }
    if let Some(temperature) = args.temperature {
        config = config.with_temperature(temperature);
    }
    if let Some(top_p) = args.top_p {
        config = config.with_top_p(top_p);
    }
    if let Some(max_tokens) = args.max_tokens {
        config = config.with_max_tokens(max_tokens);
    }
    if let Some(max_retries) = args.max_retries {
        config = config.with_max_retries(max_retries);
    }

    config
}

fn build_messages(args: &ChatArgs) -> Vec<Message> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = &args.system {
        messages.push(Message::system(system.as_str()));
    }
    messages.push(Message::human(args.prompt.as_str()));
    messages
}

fn build_options(args: &ChatArgs) -> CallOptions {
    let print_tokens = args.stream && !output::is_json();
    let mut options = CallOptions::new()
        .with_stream(args.stream)
        .with_callbacks(Arc::new(TerminalCallbacks { print_tokens }));

    if !args.stop.is_empty() {
        options = options.with_stop(args.stop.iter().cloned());
    }

    options
}

pub async fn handle(args: ChatArgs) -> Result<()> {
    let chat = ChatZhipuAI::new(build_config(&args)).context("Failed to configure ZhipuAI")?;
    let messages = build_messages(&args);
    let options = build_options(&args);

    let operation = if args.async_job { "generate_async" } else { "generate" };
    let span = chat_span!(chat.llm_type(), chat.model_name(), operation);

    let result = run(&chat, &messages, options, &args)
        .instrument(span.clone())
        .await;

    let _guard = span.enter();
    let result = match result {
        Ok(result) => result,
        Err(e) => {
            record_error(&e);
            return Err(e).context("Chat request failed");
        }
    };

    if let Some(usage) = result.llm_output.as_ref().and_then(|o| o.token_usage.as_ref()) {
        span.record("llm.total_tokens", usage.total_tokens());
    }

    print_result(&result, args.stream);
    Ok(())
}

async fn run(
    chat: &ChatZhipuAI,
    messages: &[Message],
    options: CallOptions,
    args: &ChatArgs,
) -> zhipuai_llms::Result<ChatResult> {
    let start = Instant::now();

    let result = if args.stream {
        chat.generate(messages, options).await
    } else {
        let message = if args.async_job {
            "Waiting for async job..."
        } else {
            "Thinking..."
        };
        let spinner = output::spinner(message);

        let result = if args.async_job {
            chat.generate_async(messages, options).await
        } else {
            chat.generate(messages, options).await
        };

        match &result {
            Ok(_) => spinner.finish_and_clear(),
            Err(_) => output::spinner_error(&spinner, "Request failed"),
        }
        result
    };

    record_duration("duration_ms", start.elapsed());
    result
}

fn print_result(result: &ChatResult, streamed: bool) {
    if output::is_json() {
        output::data("chat", result);
        return;
    }

    if streamed {
        // Tokens were already printed; end the line.
        println!();
    } else {
        output::reply(result.text().unwrap_or_default());
    }

    if let Some(llm_output) = &result.llm_output {
        let tokens = llm_output
            .token_usage
            .as_ref()
            .map(|u| u.total_tokens())
            .unwrap_or_default();
        output::dim(&format!("{} · {} tokens", llm_output.model_name, tokens));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Command};
    use clap::Parser;

    fn chat_args(argv: &[&str]) -> ChatArgs {
        let mut full = vec!["zhipuai", "chat"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Command::Chat(args) => args,
            Command::Models => panic!("Expected chat command"),
        }
    }

    #[test]
    fn test_flags_override_config() {
        let args = chat_args(&[
            "--model",
            "glm-4-air",
            "--temperature",
            "0.3",
            "--top-p",
            "0.5",
            "--max-tokens",
            "64",
            "--max-retries",
            "0",
            "hi",
        ]);
        let config = build_config(&args);

        assert_eq!(config.model, "glm-4-air");
        assert_eq!(config.temperature, 0.3);
        assert_eq!(config.top_p, 0.5);
        assert_eq!(config.max_tokens, Some(64));
        assert_eq!(config.retry.max_retries, 0);
    }

    #[test]
    fn test_system_prompt_precedes_user_turn() {
        let args = chat_args(&["--system", "Be brief.", "What is Rust?"]);
        let messages = build_messages(&args);
        assert_eq!(
            messages,
            vec![Message::system("Be brief."), Message::human("What is Rust?")]
        );
    }

    #[test]
    fn test_options_carry_stop_and_stream() {
        let args = chat_args(&["--stop", "END", "--stream", "hi"]);
        let options = build_options(&args);
        assert_eq!(options.stop, Some(vec!["END".to_string()]));
        assert_eq!(options.stream, Some(true));
        assert!(options.callbacks.is_some());
    }
}
