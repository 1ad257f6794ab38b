use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use llmdeck_services::{
    LlmDeckConfig, LocalBackend, ModelPanel, PanelEvent, PanelView, SelectOutcome,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "llmdeck")]
#[command(about = "LlmDeck - local model selection and server control", long_about = None)]
struct Cli {
    /// Path to a JSON config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show server and selection status
    Status {
        /// Print the panel view as JSON
        #[arg(long)]
        json: bool,
    },

    /// List built-in GGUF models
    Models,

    /// Download the default model
    Download,

    /// Print panel events until Ctrl-C
    Watch,

    /// Start the local server and keep it running until Ctrl-C
    Serve {
        /// Built-in model name to select before starting
        #[arg(short, long, conflicts_with = "file")]
        model: Option<String>,

        /// GGUF file to use instead of a built-in model
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .compact()
        .init();

    let cli = Cli::parse();
    let config = LlmDeckConfig::load(cli.config.as_deref())?;
    debug!(data_dir = %config.data_dir.display(), "Config loaded");
    let (panel, backend) = ModelPanel::local(&config);

    match cli.command {
        Some(Commands::Status { json }) => cmd_status(&panel, &backend, json).await?,
        Some(Commands::Models) => cmd_models(&panel).await,
        Some(Commands::Download) => cmd_download(&backend).await?,
        Some(Commands::Watch) => cmd_watch(&panel).await,
        Some(Commands::Serve { model, file }) => {
            cmd_serve(&panel, &backend, model.as_deref(), file.as_deref()).await?
        }
        None => run_interactive(&panel, &backend).await?,
    }

    Ok(())
}

async fn cmd_status(panel: &ModelPanel, backend: &LocalBackend, json: bool) -> Result<()> {
    panel.refresh().await;
    let view = panel.view();

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    print_status(&view);
    println!("  Data dir:      {}", backend.data_dir().display());
    let presence = if backend.is_model_downloading().await {
        "downloading"
    } else if backend.is_model_downloaded().await? {
        "present"
    } else {
        "missing - run `llmdeck download`"
    };
    println!(
        "  Default model: {} ({})",
        backend.default_model_path().display(),
        presence
    );
    if let Some(api_base) = backend.api_base().await {
        println!("  API base:      {}", api_base);
    }
    Ok(())
}

async fn cmd_models(panel: &ModelPanel) {
    panel.refresh().await;
    print_models(&panel.view());
}

async fn cmd_download(backend: &LocalBackend) -> Result<()> {
    if backend.is_model_downloaded().await? {
        println!("  Default model already present: {}", backend.default_model_path().display());
        return Ok(());
    }

    let (tx, mut rx) = mpsc::channel(16);
    backend.download_model(tx).await?;

    let mut stdout = std::io::stdout();
    while let Some(percent) = rx.recv().await {
        print!("\r  Downloading: {:>3}%", percent);
        stdout.flush()?;
    }
    println!();

    backend.wait_for_download().await?;
    println!("  Saved to {}", backend.default_model_path().display());
    Ok(())
}

async fn cmd_watch(panel: &ModelPanel) {
    let mut events = panel.subscribe();
    let mounted = panel.mount();
    println!("  Watching for changes. Press Ctrl-C to stop.");

    print_events_until_ctrl_c(&mut events).await;
    mounted.unmount().await;
}

async fn print_events_until_ctrl_c(events: &mut broadcast::Receiver<PanelEvent>) {
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(event) => print_event(&event),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}

async fn cmd_serve(
    panel: &ModelPanel,
    backend: &LocalBackend,
    model: Option<&str>,
    file: Option<&Path>,
) -> Result<()> {
    panel.refresh().await;

    if let Some(name) = model {
        if panel.select(name).await? == SelectOutcome::Rejected {
            bail!("Unknown model: {}", name);
        }
    }
    if let Some(file) = file {
        panel.select_custom_file(file).await?;
    }

    panel.start_server().await?;
    let mut events = panel.subscribe();
    let mounted = panel.mount();

    print_status(&panel.view());
    println!("  Press Ctrl-C to stop.");

    print_events_until_ctrl_c(&mut events).await;
    mounted.unmount().await;
    backend.stop_server().await?;
    println!("  Server stopped.");
    Ok(())
}

async fn run_interactive(panel: &ModelPanel, backend: &Arc<LocalBackend>) -> Result<()> {
    display_welcome();
    let mounted = panel.mount();
    panel.refresh().await;
    print_status(&panel.view());
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = std::io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let Some(line) = lines.next_line().await? else {
            break; // EOF
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let (cmd, arg) = match trimmed.split_once(char::is_whitespace) {
            Some((cmd, arg)) => (cmd.to_lowercase(), arg.trim()),
            None => (trimmed.to_lowercase(), ""),
        };

        let result = match cmd.as_str() {
            "help" | "h" | "?" => {
                display_help();
                Ok(())
            }
            "status" | "s" => {
                panel.refresh().await;
                print_status(&panel.view());
                Ok(())
            }
            "models" | "m" => {
                cmd_models(panel).await;
                Ok(())
            }
            "select" | "use" => handle_select(panel, arg).await,
            "file" | "f" => handle_file(panel, arg).await,
            "download" | "d" => cmd_download(backend).await,
            "start" => panel
                .start_server()
                .await
                .map(|state| println!("  Server: {}", state.label()))
                .map_err(Into::into),
            "connect" | "c" => panel
                .connect_provider()
                .await
                .map(|provider| println!("  Provider models: {}", provider.models.join(", ")))
                .map_err(Into::into),
            "provider" | "p" => {
                match panel.select_provider_model(arg) {
                    SelectOutcome::Applied => println!("  Selected {}", arg),
                    SelectOutcome::Rejected => println!("  Not a provider model: {}", arg),
                }
                Ok(())
            }
            "exit" | "quit" | "q" => break,
            _ => {
                println!("Unknown command: {}. Type 'help' for available commands.", cmd);
                Ok(())
            }
        };

        if let Err(e) = result {
            println!("Error: {}", e);
        }
    }

    mounted.unmount().await;
    backend.stop_server().await?;
    Ok(())
}

async fn handle_select(panel: &ModelPanel, name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("Usage: select <name>");
    }
    match panel.select(name).await? {
        SelectOutcome::Applied => println!("  Selected {}", name),
        SelectOutcome::Rejected => println!("  Unknown model: {}", name),
    }
    Ok(())
}

async fn handle_file(panel: &ModelPanel, path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("Usage: file <path>");
    }
    let resolved = panel.select_custom_file(Path::new(path)).await?;
    println!("  Using {}", resolved.display());
    Ok(())
}

fn print_status(view: &PanelView) {
    println!();
    println!("  Server:        {}", view.server.label());
    println!("  Selected:      {}", view.selected);
    if let Some(path) = &view.custom_model {
        println!("  Custom model:  {}", path.display());
    }
    if view.provider_connected {
        println!("  Ollama:        connected ({} models)", view.provider_models.len());
    }
}

fn print_models(view: &PanelView) {
    println!();
    println!("  GGUF models:");
    for name in &view.gguf_models {
        let marker = if *name == view.selected { "*" } else { " " };
        println!("  {} {}", marker, name);
    }
    if !view.provider_models.is_empty() {
        println!();
        println!("  Ollama models:");
        for name in &view.provider_models {
            let marker = if *name == view.selected { "*" } else { " " };
            println!("  {} {}", marker, name);
        }
    }
    println!();
}

fn print_event(event: &PanelEvent) {
    match event {
        PanelEvent::SelectionChanged { selected } => println!("  [model] {}", selected),
        PanelEvent::ServerStateChanged { state } => println!("  [server] {}", state.label()),
        PanelEvent::CatalogChanged { count } => println!("  [catalog] {} models", count),
        PanelEvent::ProviderModelsChanged { models } => {
            println!("  [ollama] {}", models.join(", "))
        }
    }
}

fn display_welcome() {
    println!();
    println!("  LlmDeck - local model control");
    println!();
    println!("  Type 'help' for commands.");
}

fn display_help() {
    println!();
    println!("Available Commands:");
    println!("  status, s              # Show server and selection status");
    println!("  models, m              # List models");
    println!("  select <name>          # Select a built-in model (or 'default')");
    println!("  file, f <path>         # Use a GGUF file from disk");
    println!("  download, d            # Download the default model");
    println!("  start                  # Start the local server");
    println!("  connect, c             # Connect to Ollama (server must be running)");
    println!("  provider, p <name>     # Select an Ollama model");
    println!("  exit, quit, q          # Stop the server and quit");
    println!();
}
