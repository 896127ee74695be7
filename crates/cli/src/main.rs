mod config;
mod error;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use mcp::{ServerConfig, ToolClient};
use router::{Message, ModelRouter};
use serde::Serialize;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use config::Config;
use error::{Error, Result};

const DEFAULT_CONFIG: &str = "switchboard.toml";

#[derive(Parser)]
#[command(name = "switchboard")]
#[command(about = "Route LLM requests by model name and call MCP tools", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the config file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Log at debug level (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Cancel the operation after this many seconds
    #[arg(long, global = true, value_name = "SECS")]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every routable model
    Models,
    /// List providers in fallback order
    Providers,
    /// Send a chat completion request
    Chat {
        /// Model name; unknown names go to the preferred provider
        #[arg(short, long)]
        model: String,
        /// Optional system prompt
        #[arg(short, long)]
        system: Option<String>,
        prompt: String,
    },
    /// Send a text completion request
    Complete {
        #[arg(short, long)]
        model: String,
        prompt: String,
    },
    /// List tools exposed by the configured tool servers
    Tools,
    /// Call a tool by name
    Call {
        tool: String,
        /// Tool arguments as a JSON object
        #[arg(short, long)]
        args: Option<String>,
    },
    /// Show providers and tool server health
    Status,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    init_tracing(cli.verbose, &config.server.log_level);

    debug!(
        path = %cli.config.display(),
        providers = config.providers.len(),
        tool_servers = config.mcp.servers.len(),
        "config loaded"
    );

    let cancel = CancellationToken::new();
    let watcher = tokio::spawn(cancel_on_interrupt(cancel.clone(), cli.timeout));

    let result = match cli.command {
        Commands::Models => cmd_models(&config),
        Commands::Providers => cmd_providers(&config),
        Commands::Chat {
            model,
            system,
            prompt,
        } => cmd_chat(&config, &model, system, prompt, &cancel).await,
        Commands::Complete { model, prompt } => {
            cmd_complete(&config, &model, &prompt, &cancel).await
        }
        Commands::Tools => cmd_tools(config, &cancel).await,
        Commands::Call { tool, args } => cmd_call(config, &tool, args.as_deref(), &cancel).await,
        Commands::Status => cmd_status(config, &cancel).await,
    };

    watcher.abort();
    result
}

fn init_tracing(verbose: bool, default_level: &str) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };

    // stdout carries results; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Cancel `cancel` on Ctrl-C or once `timeout` seconds have passed.
async fn cancel_on_interrupt(cancel: CancellationToken, timeout: Option<u64>) {
    let deadline = async {
        match timeout {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => warn!("interrupted, cancelling"),
        _ = deadline => warn!(timeout_secs = ?timeout, "timed out, cancelling"),
    }
    cancel.cancel();
}

fn cmd_models(config: &Config) -> Result<()> {
    let router = ModelRouter::new(&config.providers);
    print_json(&router.list_models())
}

fn cmd_providers(config: &Config) -> Result<()> {
    let router = ModelRouter::new(&config.providers);
    print_json(&router.providers())
}

async fn cmd_chat(
    config: &Config,
    model: &str,
    system: Option<String>,
    prompt: String,
    cancel: &CancellationToken,
) -> Result<()> {
    let router = ModelRouter::new(&config.providers);

    let mut messages = Vec::with_capacity(2);
    if let Some(system) = system {
        messages.push(Message::system(system));
    }
    messages.push(Message::user(prompt));

    let reply = router.chat_completion(model, &messages, cancel).await?;
    print_json(&reply)
}

async fn cmd_complete(
    config: &Config,
    model: &str,
    prompt: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    let router = ModelRouter::new(&config.providers);
    let reply = router.completion(model, prompt, cancel).await?;
    print_json(&reply)
}

/// Start the tool servers unless `cancel` fires first. Servers still
/// handshaking when it does are killed.
async fn start_tools(
    servers: Vec<ServerConfig>,
    cancel: &CancellationToken,
) -> Result<ToolClient> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(mcp::Error::Cancelled.into()),
        client = ToolClient::start(servers) => Ok(client),
    }
}

async fn cmd_tools(config: Config, cancel: &CancellationToken) -> Result<()> {
    let client = start_tools(config.mcp.servers, cancel).await?;
    let tools = client.list_tools();
    client.stop().await;
    print_json(&tools)
}

async fn cmd_call(
    config: Config,
    tool: &str,
    args: Option<&str>,
    cancel: &CancellationToken,
) -> Result<()> {
    let arguments = args
        .map(serde_json::from_str::<Value>)
        .transpose()
        .map_err(Error::InvalidArguments)?;

    let client = start_tools(config.mcp.servers, cancel).await?;
    let result = client.call_tool(tool, arguments, cancel).await;
    client.stop().await;

    print_json(&result?)
}

async fn cmd_status(config: Config, cancel: &CancellationToken) -> Result<()> {
    let router = ModelRouter::new(&config.providers);
    let client = start_tools(config.mcp.servers, cancel).await?;
    let servers = client.status().await;
    client.stop().await;

    print_json(&json!({
        "providers": router.providers(),
        "models": router.list_models(),
        "tool_servers": servers,
    }))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
