use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use parley_core::{Conversation, Dispatcher, Turn};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::signal;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod notice;

use config::ParleyConfig;

#[derive(Parser)]
#[command(name = "parley")]
#[command(version)]
#[command(about = "Parley: chat with whichever LLM provider has capacity")]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a one-shot message
    Ask {
        /// The message to send
        message: String,

        /// Override dispatch.max_retries for this request
        #[arg(long)]
        max_retries: Option<u32>,
    },

    /// Start an interactive conversation
    Chat,

    /// List configured providers in failover order
    Providers,

    /// Initialize config directory and default config
    Init,

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so replies on stdout stay clean
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init => cmd_init().await,
        Commands::Config => cmd_config(&cli.config).await,
        Commands::Providers => cmd_providers(&cli.config).await,
        Commands::Ask {
            message,
            max_retries,
        } => cmd_ask(&cli.config, &message, max_retries).await,
        Commands::Chat => cmd_chat(&cli.config).await,
    }
}

async fn cmd_init() -> Result<()> {
    let config_dir = config::config_dir();
    tokio::fs::create_dir_all(&config_dir)
        .await
        .with_context(|| format!("Failed to create config dir: {}", config_dir.display()))?;

    let config_path = config_dir.join("config.toml");
    if config_path.exists() {
        warn!("Config already exists at {}", config_path.display());
    } else {
        let default_config = include_str!("../../../config/default.toml");
        tokio::fs::write(&config_path, default_config).await?;
        restrict_permissions(&config_path)?;
        info!("Created default config at {}", config_path.display());
    }

    println!("Parley initialized at {}", config_dir.display());
    println!(
        "Edit {} to configure your providers, or export the API key variables it references.",
        config_path.display()
    );
    Ok(())
}

/// Config files hold secrets; keep them owner-only
fn restrict_permissions(path: &std::path::Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

async fn cmd_config(config_path: &Option<PathBuf>) -> Result<()> {
    let config = ParleyConfig::load(config_path)?;
    // Debug output masks API keys
    debug!("Loaded config: {:?}", config);

    println!("{}", config.redacted_toml()?);
    Ok(())
}

async fn cmd_providers(config_path: &Option<PathBuf>) -> Result<()> {
    let config = ParleyConfig::load(config_path)?;
    let registry = config.build_registry()?;
    print!("{}", notice::provider_listing(&registry.descriptors()));
    println!(
        "{} of {} providers ready, up to {} switches per request",
        registry.available_count(),
        registry.len(),
        config.dispatch.max_retries
    );
    Ok(())
}

async fn cmd_ask(
    config_path: &Option<PathBuf>,
    message: &str,
    max_retries: Option<u32>,
) -> Result<()> {
    let config = ParleyConfig::load(config_path)?;
    let mut dispatcher = config.dispatcher()?;
    if let Some(max_retries) = max_retries {
        dispatcher = dispatcher.with_max_retries(max_retries);
    }

    let conversation = Conversation::new();
    match dispatcher.ask(&conversation, Turn::user(message)).await {
        Ok(completion) => {
            if let Some(line) = notice::switch_notice(&completion) {
                eprintln!("{}", line);
            }
            println!("{}", completion.reply.content);
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!(notice::failure_notice(&e))),
    }
}

const CHAT_HELP: &str = "\
Commands:
  /help       show this help
  /clear      forget the conversation so far
  /history    show how long the conversation is
  /providers  list providers in failover order
  /models     show the model each provider uses
  /config     show the active configuration
  /quit       leave (also /exit or Ctrl-D)";

async fn cmd_chat(config_path: &Option<PathBuf>) -> Result<()> {
    let config = ParleyConfig::load(config_path)?;
    let dispatcher = config.dispatcher()?;
    let conversation = Conversation::new();
    let started = chrono::Local::now();

    println!(
        "Parley chat started {} with {} provider(s) ready. Type /help for commands.",
        started.format("%Y-%m-%d %H:%M"),
        dispatcher.registry().available_count()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read from stdin")?,
            _ = signal::ctrl_c() => {
                println!();
                break;
            }
        };
        let Some(line) = line else {
            // EOF
            println!();
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input {
            "/quit" | "/exit" => break,
            "/help" => println!("{}", CHAT_HELP),
            "/clear" => {
                conversation.clear().await;
                println!("Conversation cleared.");
            }
            "/history" => {
                println!("{}", notice::history_summary(conversation.stats().await));
            }
            "/providers" => {
                print!(
                    "{}",
                    notice::provider_listing(&dispatcher.registry().descriptors())
                );
            }
            "/models" => {
                print!(
                    "{}",
                    notice::model_listing(&dispatcher.registry().descriptors())
                );
            }
            "/config" => match config.redacted_toml() {
                Ok(text) => println!("{}", text),
                Err(e) => warn!("Failed to render config: {}", e),
            },
            cmd if cmd.starts_with('/') => {
                println!("Unknown command {}. Type /help for commands.", cmd);
            }
            text => {
                let outcome = tokio::select! {
                    outcome = dispatcher.ask(&conversation, Turn::user(text)) => Some(outcome),
                    _ = signal::ctrl_c() => None,
                };
                match outcome {
                    Some(result) => print_outcome(&dispatcher, result),
                    None => println!("\n(cancelled)"),
                }
            }
        }
    }

    let elapsed = chrono::Local::now() - started;
    info!(
        "Chat ended after {} minute(s), {}",
        elapsed.num_minutes(),
        notice::history_summary(conversation.stats().await)
    );
    Ok(())
}

fn print_outcome(
    dispatcher: &Dispatcher,
    result: Result<parley_core::Completion, parley_core::DispatchError>,
) {
    match result {
        Ok(completion) => {
            if let Some(line) = notice::switch_notice(&completion) {
                println!("{}", line);
            }
            debug!(
                "Answered by '{}' after {} attempt(s)",
                completion.provider_id,
                completion.attempts.len()
            );
            println!("{}\n", completion.reply.content);
        }
        Err(e) => {
            if dispatcher.registry().available_count() == 0 {
                warn!("No providers are ready; check `parley providers`");
            }
            println!("{}\n", notice::failure_notice(&e));
        }
    }
}
