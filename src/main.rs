use clap::Parser;
use anyhow::Result;
use tracing::info;

mod app;
mod client;
mod config;
mod handler;
mod selector;
mod tui;
mod ui;

use app::App;
use client::AcpClient;
use config::{Config, ConfigStore};

const DEFAULT_SERVER: &str = "http://127.0.0.1:8000";

#[derive(Parser)]
#[command(name = "acp-chat")]
#[command(about = "Chat with ACP agents from the terminal", version)]
struct Cli {
    /// Base URL of the ACP server
    #[arg(short, long)]
    server: Option<String>,

    /// Agent to select at startup (overrides the saved selection)
    #[arg(short, long)]
    agent: Option<String>,
}

/// Log to a file; the terminal itself belongs to the TUI.
fn init_logging() -> Result<()> {
    let log_path = Config::config_dir()?.join("acp-chat.log");
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let log_file = std::fs::File::create(&log_path)?;

    tracing_subscriber::fmt()
        .with_writer(std::sync::Mutex::new(log_file))
        .with_ansi(false)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging()?;

    let config = Config::load().unwrap_or_default();
    let server = cli
        .server
        .or(config.server)
        .unwrap_or_else(|| DEFAULT_SERVER.to_string());
    info!(%server, "starting acp-chat");

    let client = AcpClient::new(&server);
    let mut app = App::new(client, Box::new(ConfigStore), cli.agent);
    app.selector.start_fetch(app.client.clone());

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();

    let result = run(&mut terminal, &mut events, &mut app).await;

    tui::restore()?;
    result
}

async fn run(terminal: &mut tui::Tui, events: &mut tui::EventHandler, app: &mut App) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        if let Some(event) = events.next().await {
            handler::handle_event(app, event)?;
        }

        // Reap finished background work; the tick event guarantees the loop
        // comes back around even with no user input
        app.poll_send().await;
        app.selector.poll_fetch().await;
    }
    Ok(())
}
