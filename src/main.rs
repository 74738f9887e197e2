use clap::{Parser, Subcommand};
use ragchat::commands::{ask_once, build_index, chat, init_config, show_config, show_status};
use ragchat::config::{Config, get_config_dir};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ragchat")]
#[command(about = "Retrieval-augmented chat assistant grounded in a site knowledge base")]
#[command(version)]
struct Cli {
    /// Override the configuration directory
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build or refresh the vector index from the content file
    Index {
        /// Rebuild even when the persisted index is up to date
        #[arg(long)]
        force: bool,
    },
    /// Ask a single question and print the grounded answer
    Ask {
        /// The question to answer
        query: String,
    },
    /// Start an interactive chat session
    Chat,
    /// Show index freshness and effective settings
    Status,
    /// Write a default config file, or show the current one
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => get_config_dir()?,
    };
    let config = Config::load(&config_dir)?;

    match cli.command {
        Commands::Index { force } => build_index(&config, force)?,
        Commands::Ask { query } => ask_once(&config, &query)?,
        Commands::Chat => chat(&config)?,
        Commands::Status => show_status(&config)?,
        Commands::Config { show } => {
            if show {
                show_config(&config)?;
            } else {
                init_config(&config_dir)?;
            }
        }
    }

    Ok(())
}
