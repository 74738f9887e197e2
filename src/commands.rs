use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tracing::info;

use crate::config::Config;
use crate::embeddings::provider_from_config;
use crate::index::VectorIndex;
use crate::loader::{content_fingerprint, load_records};
use crate::session::Session;

/// Build (or refresh) the persisted vector index from the content file.
#[inline]
pub fn build_index(config: &Config, force: bool) -> Result<()> {
    let embedder = provider_from_config(config).context("Failed to create embedding backend")?;

    let bytes = std::fs::read(&config.content.path).with_context(|| {
        format!(
            "Failed to read content file: {}",
            config.content.path.display()
        )
    })?;
    let fingerprint = content_fingerprint(&bytes);
    let chunks =
        load_records(&bytes, &config.content.base_url).context("Failed to load content records")?;

    let index_path = config.index_path();
    if !force && index_path.exists() {
        if let Ok(existing) = VectorIndex::load(&index_path) {
            if existing.fingerprint() == fingerprint && existing.model_id() == embedder.model_id() {
                println!(
                    "{} index is up to date ({} chunks)",
                    style("✓").green(),
                    existing.len()
                );
                return Ok(());
            }
        }
    }

    println!(
        "Embedding {} chunks with {}...",
        chunks.len(),
        embedder.model_id()
    );

    let progress = ProgressBar::new(chunks.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} chunks ({eta})")
            .context("Invalid progress bar template")?,
    );

    let batch_size = config.embedding.batch_size as usize;
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let mut vectors = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size) {
        vectors.extend(
            embedder
                .embed_batch(batch)
                .context("Failed to generate embeddings")?,
        );
        progress.inc(batch.len() as u64);
    }
    progress.finish_and_clear();

    let index = VectorIndex::build(
        chunks,
        vectors,
        embedder.dimension(),
        embedder.model_id(),
        fingerprint,
    )
    .context("Failed to build vector index")?;
    index
        .save(&index_path)
        .context("Failed to save vector index")?;

    println!(
        "{} indexed {} chunks to {}",
        style("✓").green(),
        index.len(),
        index_path.display()
    );
    Ok(())
}

/// Answer a single question and exit.
#[inline]
pub fn ask_once(config: &Config, query: &str) -> Result<()> {
    let mut session = Session::bootstrap(config).context("Failed to start session")?;

    let response = session.ask(query)?;
    print_response(&response.answer, &response.citations);
    Ok(())
}

/// Interactive chat loop. `/reset` clears memory; `exit` or `quit` leaves.
#[inline]
pub fn chat(config: &Config) -> Result<()> {
    let mut session = Session::bootstrap(config).context("Failed to start session")?;

    println!(
        "{} ({} chunks indexed). Type {} to leave, {} to clear memory.",
        style("Ready").green().bold(),
        session.retriever().index().len(),
        style("exit").cyan(),
        style("/reset").cyan()
    );

    loop {
        let input: String = dialoguer::Input::new()
            .with_prompt("you")
            .allow_empty(true)
            .interact_text()
            .context("Failed to read input")?;
        let input = input.trim();

        match input {
            "" => {}
            "exit" | "quit" => break,
            "/reset" => {
                session.reset();
                println!("{}", style("Conversation memory cleared.").dim());
            }
            query => match session.ask(query) {
                Ok(response) => print_response(&response.answer, &response.citations),
                Err(e) => {
                    info!("Turn failed: {}", e);
                    println!("{} {}", style("Could not answer:").red(), e);
                }
            },
        }
    }

    Ok(())
}

fn print_response(answer: &str, citations: &[String]) {
    println!("\n{answer}\n");
    if !citations.is_empty() {
        println!("{}", style("Sources:").dim());
        for link in citations {
            println!("  {}", style(link).dim().underlined());
        }
        println!();
    }
}

/// Show index freshness and configuration summary.
#[inline]
pub fn show_status(config: &Config) -> Result<()> {
    println!("Content file:  {}", config.content.path.display());
    println!("Index file:    {}", config.index_path().display());
    println!(
        "Embedding:     {} ({:?})",
        config.embedding.model, config.embedding.backend
    );
    println!(
        "Generation:    {} ({:?})",
        config.generation.model, config.generation.backend
    );
    println!("Retrieval k:   {}", config.retrieval.top_k);
    println!("Memory window: {}", config.memory.window);

    let index_path = config.index_path();
    if !index_path.exists() {
        println!("\n{} no index built yet, run `ragchat index`", style("!").yellow());
        return Ok(());
    }

    let index = match VectorIndex::load(&index_path) {
        Ok(index) => index,
        Err(e) => {
            println!(
                "\n{} index is unreadable ({}), run `ragchat index`",
                style("✗").red(),
                e
            );
            return Ok(());
        }
    };

    println!("\nIndexed chunks: {}", index.len());
    println!("Index model:    {}", index.model_id());

    match std::fs::read(&config.content.path) {
        Ok(bytes) if content_fingerprint(&bytes) == index.fingerprint() => {
            println!("{} index is fresh", style("✓").green());
        }
        Ok(_) => {
            println!(
                "{} index is stale (content changed), run `ragchat index`",
                style("!").yellow()
            );
        }
        Err(e) => {
            println!("{} content file unreadable: {}", style("✗").red(), e);
        }
    }

    Ok(())
}

/// Print the effective configuration as TOML.
#[inline]
pub fn show_config(config: &Config) -> Result<()> {
    let rendered =
        toml::to_string_pretty(config).context("Failed to serialize config")?;
    println!("# {}", config.config_file_path().display());
    print!("{rendered}");
    Ok(())
}

/// Write a default config file if none exists yet.
#[inline]
pub fn init_config(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load config")?;
    let path = config.config_file_path();

    if path.exists() {
        println!("Config already exists at {}", path.display());
        return Ok(());
    }

    config.save().context("Failed to write default config")?;
    println!(
        "{} wrote default config to {}",
        style("✓").green(),
        path.display()
    );
    Ok(())
}
