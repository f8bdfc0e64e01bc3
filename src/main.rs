use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use weather_chat::app::App;
use weather_chat::config::Config;
use weather_chat::{handler, tui, ui};

#[derive(Parser)]
#[command(name = "weather-chat")]
#[command(about = "Chat with an AI weather agent from your terminal", version)]
struct Cli {
    /// Weather agent endpoint URL
    #[arg(long, env = "WEATHER_AGENT_URL")]
    endpoint: Option<String>,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Start with the light color theme
    #[arg(long)]
    light: bool,

    /// Disable the notification bell
    #[arg(long)]
    no_sound: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging()?;

    let mut config = Config::load().unwrap_or_default();
    if let Some(endpoint) = cli.endpoint {
        config.endpoint = endpoint;
    }
    if let Some(timeout) = cli.timeout {
        config.timeout_secs = timeout;
    }
    if cli.light {
        config.dark_mode = false;
    }
    if cli.no_sound {
        config.sound = false;
    }

    let mut app = App::new(config)?;

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();

    let result = run(&mut terminal, &mut events, &mut app).await;

    tui::restore()?;
    result
}

async fn run(
    terminal: &mut tui::Tui,
    events: &mut tui::EventHandler,
    app: &mut App,
) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        if let Some(event) = events.next().await {
            handler::handle_event(app, event);
        }

        // The tick keeps this loop turning, so a finished request is folded
        // in within one tick interval even with no keyboard activity.
        app.poll_response().await;
    }

    Ok(())
}

/// Route tracing to a file; the terminal itself belongs to the TUI.
fn init_logging() -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("weather-chat");
    fs::create_dir_all(&log_dir)?;
    let log_file = fs::File::create(log_dir.join("weather-chat.log"))?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::sync::Mutex::new(log_file))
        .with_ansi(false)
        .init();

    Ok(())
}
