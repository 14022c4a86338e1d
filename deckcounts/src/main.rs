//! deckcounts - deck browser with now/later study counts
//!
//! Terminal UI that lists the collection's decks with their New, Due, Later
//! and Buried counts and keeps them fresh while the table is on screen.

mod app;
mod ui;

use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::app::{App, Browser, Sources};

/// Browse decks with counts split into due now and due later today
#[derive(Parser, Debug)]
#[command(name = "deckcounts")]
#[command(about = "Browse decks with counts split into due now and due later today")]
#[command(version)]
struct Args {
    /// Collection database (defaults to the configured or XDG path)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Configuration file (defaults to the XDG config path)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let sources = Sources {
        config_path: args.config,
        db_path: args.db,
    };

    let (config, db) = sources.open().context("failed to open collection")?;

    // Initialize logging (to file, not stdout since we have a TUI)
    let _log_guard =
        deckcounts_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!("deckcounts TUI starting up");

    let mut app = App::new(db, config, sources);
    if let Err(e) = app.refresh_table() {
        tracing::warn!(error = %e, "Initial deck table build failed");
    }
    let mut browser = Browser::new(app, Instant::now());

    // Setup terminal
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal")?;

    // Run the main loop
    let result = run_app(&mut terminal, &mut browser);

    // Restore terminal
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;

    browser.scheduler.stop();
    let stats = browser.scheduler.stats();
    tracing::info!(
        refreshed = stats.refreshed,
        skipped_hidden = stats.skipped_hidden,
        failed = stats.failed,
        "deckcounts TUI shutting down"
    );

    result
}

/// Run the main application loop.
fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    browser: &mut Browser,
) -> Result<()> {
    loop {
        // Timer ticks are skipped while the detail view is open
        browser.scheduler.poll(Instant::now(), &mut browser.app);

        terminal.draw(|frame| ui::render(frame, &mut browser.app))?;

        // Handle events
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    browser.app.handle_key(key);
                }
            }
        }

        browser.run_pending();

        // Check if we should quit
        if browser.app.should_quit {
            break;
        }
    }

    Ok(())
}
