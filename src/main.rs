use std::path::PathBuf;
use std::sync::Mutex;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod app;
mod chat;
mod citations;
mod config;
mod handler;
mod model;
mod state;
mod tui;
mod ui;
mod uploader;

use api::ApiClient;
use app::App;
use chat::ChatSession;
use config::{Config, BASE_URL_ENV};
use model::Model;
use state::ChatRole;
use uploader::{run_batch, Uploader};

#[derive(Parser)]
#[command(name = "resume-assistant")]
#[command(about = "Upload resumes and job descriptions, then ask questions about them")]
#[command(version)]
struct Cli {
    /// Backend base URL (overrides config file)
    #[arg(long, global = true, env = BASE_URL_ENV)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the interactive terminal UI (default)
    Tui,
    /// Upload files to the backend one at a time
    Upload {
        /// Files to index, processed in the given order
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Ask a single question
    Chat {
        /// Your question
        query: String,
        /// Number of chunks to retrieve
        #[arg(short, long)]
        k: Option<usize>,
        /// Model to route the question to (sent only with this flag or `send_model`)
        #[arg(short, long)]
        model: Option<String>,
        /// Print the answer without the sources line
        #[arg(long)]
        no_citations: bool,
    },
    /// List available models
    Models,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Tui);
    match command {
        Commands::Tui => init_file_logging()?,
        _ => init_stderr_logging(),
    }

    let config = load_config();
    // clap already folded the environment variable into `base_url`
    let base_url = config.resolve_base_url(cli.base_url.as_deref(), None);

    match command {
        Commands::Tui => run_tui(ApiClient::new(&base_url), &config).await?,
        Commands::Upload { files } => upload_files(&ApiClient::new(&base_url), files).await,
        Commands::Chat { query, k, model, no_citations } => {
            ask_once(&ApiClient::new(&base_url), &config, query, k, model, no_citations).await?
        }
        Commands::Models => list_models(&config),
    }

    Ok(())
}

/// Falls back to defaults for this run; a broken file is left on disk untouched.
fn load_config() -> Config {
    match Config::load() {
        Ok(config) => config,
        Err(e) => {
            warn!("Ignoring unreadable config, using defaults: {:#}", e);
            Config::new()
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("resume_assistant=info"))
}

fn init_stderr_logging() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// The TUI owns stderr, so logs go to a file in the config directory.
fn init_file_logging() -> Result<()> {
    let log_dir = Config::config_dir()?;
    std::fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join("resume-assistant.log");
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Could not open log file {}", log_path.display()))?;

    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .init();
    Ok(())
}

async fn run_tui(client: ApiClient, config: &Config) -> Result<()> {
    info!("Starting resume-assistant v{} against {}", env!("CARGO_PKG_VERSION"), client.base_url());

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();
    let mut app = App::new(client, config);

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;
            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event).await?,
                None => break,
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tui::restore()?;
    result
}

async fn upload_files(client: &ApiClient, files: Vec<PathBuf>) {
    println!("📤 Uploading {} file(s) to {}", files.len().to_string().bold(), client.base_url().cyan());

    let mut uploader = Uploader::new();
    let processed = run_batch(&mut uploader, client, files, |settled| {
        if settled.succeeded {
            println!("  {} {}", "✓".green(), settled.line);
        } else {
            println!("  {} {}", "✗".red(), settled.line.red());
        }
    })
    .await;

    println!("\n{} file(s) processed", processed.to_string().bold());
}

async fn ask_once(
    client: &ApiClient,
    config: &Config,
    query: String,
    k: Option<usize>,
    model: Option<String>,
    no_citations: bool,
) -> Result<()> {
    let default_model = config
        .default_model
        .as_deref()
        .and_then(Model::from_str)
        .unwrap_or_default();

    let mut chat = ChatSession::from_config(config, default_model);
    if let Some(k) = k {
        chat.top_k = k;
    }
    if let Some(name) = model {
        chat.model = Model::from_str(&name).with_context(|| {
            format!("Unknown model '{}'. Run `resume-assistant models` to list them", name)
        })?;
        chat.route_model = true;
    }
    if no_citations {
        chat.show_citations = false;
    }
    chat.input = query;

    if !chat.ask(client).await {
        println!("{}", "Nothing to ask: the question is empty".yellow());
        return Ok(());
    }

    for message in chat.messages() {
        match message.role {
            ChatRole::User => println!("{} {}", "You:".bold().cyan(), message.content),
            ChatRole::Assistant => println!("\n{}\n{}", "Assistant:".bold().yellow(), message.content),
        }
    }
    Ok(())
}

fn list_models(config: &Config) {
    let current = config
        .default_model
        .as_deref()
        .and_then(Model::from_str)
        .unwrap_or_default();

    println!("\n{}", "🤖 Available Models".bold().blue());
    println!("{}", "=".repeat(30).dimmed());
    for model in Model::all() {
        let marker = if model == current { "*".green().bold() } else { " ".normal() };
        println!("{} {} ({})", marker, model.display_name(), model.as_str().dimmed());
    }
}
