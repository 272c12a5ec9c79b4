//! `autoloop run`: drive one conversation to completion.

use std::sync::Arc;

use autoloop_agent::{LoopObserver, SamplingLoop};
use autoloop_config::{AppConfig, ProviderKind};
use autoloop_core::message::{ContentBlock, Conversation, Message};
use autoloop_core::text::truncate;
use autoloop_core::tool::ToolOutput;
use clap::Args;
use tracing::info;

#[derive(Debug, Args)]
pub struct RunArgs {
    /// The task for the model
    pub prompt: String,

    /// Backend to use (anthropic, openai, venice, custom)
    #[arg(long)]
    pub provider: Option<ProviderKind>,

    /// Model name (defaults per provider)
    #[arg(long)]
    pub model: Option<String>,

    /// Keep only this many tool-result images in the history
    #[arg(long)]
    pub images_to_keep: Option<usize>,

    /// Output token budget per reply
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Run one round's tool calls concurrently
    #[arg(long)]
    pub parallel_tools: bool,
}

pub async fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    apply_overrides(&mut config, &args, |key| std::env::var(key).ok());
    config.validate()?;

    // Check for API key early: give a clear error
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured for provider '{}'!", config.provider);
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    AUTOLOOP_API_KEY    (any provider)");
        eprintln!("    ANTHROPIC_API_KEY   (anthropic)");
        eprintln!("    OPENAI_API_KEY      (openai)");
        eprintln!("    VENICE_API_KEY      (venice)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    info!(
        provider = %config.provider,
        model = %config.model(),
        images_to_keep = ?config.images_to_keep,
        "Configuration loaded"
    );

    let provider = autoloop_providers::build_from_config(&config)?;
    let tools = Arc::new(autoloop_tools::default_registry(&config.bash));
    let agent = SamplingLoop::from_config(provider, tools, &config);

    let mut conv = Conversation::new();
    conv.push(Message::user(&args.prompt));

    let cancel = async {
        // A failed signal handler must not look like a Ctrl-C.
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    match agent.run_until_cancelled(&mut conv, &PrintingObserver, cancel).await {
        Ok(summary) => {
            eprintln!();
            eprintln!(
                "  Done in {} rounds, {} tool calls, {} tokens.",
                summary.rounds, summary.tool_calls, summary.usage.total_tokens
            );
            Ok(())
        }
        Err(e) => {
            eprintln!();
            eprintln!("  [Error] {e} ({} messages in history)", conv.len());
            Err(e.into())
        }
    }
}

/// Apply command-line flags over the loaded config.
fn apply_overrides<F>(config: &mut AppConfig, args: &RunArgs, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(provider) = args.provider {
        config.set_provider(provider, lookup);
    }
    if let Some(model) = &args.model {
        config.model = Some(model.clone());
    }
    if args.images_to_keep.is_some() {
        config.images_to_keep = args.images_to_keep;
    }
    if let Some(max_tokens) = args.max_tokens {
        config.max_output_tokens = max_tokens;
    }
    if args.parallel_tools {
        config.parallel_tools = true;
    }
}

/// Prints replies and tool results for a human.
struct PrintingObserver;

impl LoopObserver for PrintingObserver {
    fn on_reply(&self, block: &ContentBlock) {
        if let Some(line) = render_block(block) {
            println!("{line}");
        }
    }

    fn on_tool_result(&self, output: &ToolOutput, tool_use_id: &str) {
        println!("{}", render_tool_result(output, tool_use_id));
    }
}

fn render_block(block: &ContentBlock) -> Option<String> {
    match block {
        ContentBlock::Text { text } if text.trim().is_empty() => None,
        ContentBlock::Text { text } => Some(format!("  Assistant > {}", truncate(text))),
        ContentBlock::ToolUse { name, input, .. } => {
            Some(format!("  Tool call > {name} {}", truncate(&input.to_string())))
        }
        _ => None,
    }
}

fn render_tool_result(output: &ToolOutput, tool_use_id: &str) -> String {
    let mut lines = vec![format!("  Result [{tool_use_id}]")];
    if let Some(system) = &output.system {
        lines.push(format!("    system: {}", truncate(system)));
    }
    if let Some(error) = &output.error {
        lines.push(format!("    error: {}", truncate(error)));
    } else if let Some(text) = &output.output {
        lines.push(format!("    {}", truncate(text)));
    }
    if let Some(image) = &output.image {
        lines.push(format!("    [image: {} bytes, {}]", image.data.len(), image.media_type));
    }
    lines.join("\n")
}
