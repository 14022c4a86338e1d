//! Application state for the TUI.

use std::path::PathBuf;
use std::time::Instant;

use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use deckcounts_core::{
    Config, Database, DeckId, DeckRow, DeckStatsNode, DeckSummary, RefreshScheduler,
    RefreshTarget, ReloadHooks,
};
use ratatui::widgets::TableState;

/// Current view mode
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ViewMode {
    /// Deck table (default)
    #[default]
    Decks,
    /// Counters for a single deck
    Detail { deck_id: DeckId, deck_name: String },
}

/// Work requested by a key press, carried out by the main loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Rebuild the deck table now
    Refresh,
    /// Re-read configuration and reopen the collection
    Reload,
}

/// Where configuration and the collection come from.
///
/// Explicit paths win over the XDG defaults and survive reloads.
#[derive(Debug, Clone, Default)]
pub struct Sources {
    pub config_path: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
}

impl Sources {
    /// Load configuration and open the collection.
    pub fn open(&self) -> deckcounts_core::Result<(Config, Database)> {
        let config = match &self.config_path {
            Some(path) => Config::load_from(path)?,
            None => Config::load()?,
        };
        let db_path = self
            .db_path
            .clone()
            .unwrap_or_else(|| config.collection_path());

        tracing::info!(path = %db_path.display(), "Opening collection");
        let db = Database::open(&db_path)?;
        db.migrate()?;
        Ok((config, db))
    }
}

/// Main application state.
pub struct App {
    /// Collection database
    db: Database,
    /// Active configuration
    pub config: Config,
    sources: Sources,
    /// Current view mode
    pub view_mode: ViewMode,
    /// Last successfully built table
    pub summary: Option<DeckSummary>,
    /// Table selection state
    pub table_state: TableState,
    /// Last refresh or action error, shown in the footer
    pub status: Option<String>,
    /// Command waiting for the main loop
    pub pending: Option<Command>,
    /// Whether the app should exit
    pub should_quit: bool,
}

impl App {
    /// Create a new app instance.
    pub fn new(db: Database, config: Config, sources: Sources) -> Self {
        Self {
            db,
            config,
            sources,
            view_mode: ViewMode::default(),
            summary: None,
            table_state: TableState::default(),
            status: None,
            pending: None,
            should_quit: false,
        }
    }

    /// Rows of the last successful build.
    pub fn rows(&self) -> &[DeckRow] {
        self.summary
            .as_ref()
            .map(|s| s.rows.as_slice())
            .unwrap_or_default()
    }

    /// The deck under the cursor.
    pub fn selected_row(&self) -> Option<&DeckRow> {
        self.table_state
            .selected()
            .and_then(|i| self.rows().get(i))
    }

    /// Statistics node of the deck shown in the detail view.
    pub fn detail_node(&self) -> Option<&DeckStatsNode> {
        match &self.view_mode {
            ViewMode::Detail { deck_id, .. } => self.summary.as_ref()?.node(*deck_id),
            ViewMode::Decks => None,
        }
    }

    /// Rebuild the deck table, keeping the cursor on the same deck.
    ///
    /// On failure the previous table stays on screen and the error is shown
    /// in the footer.
    pub fn refresh_table(&mut self) -> deckcounts_core::Result<()> {
        let selected_deck = self.selected_row().map(|r| r.deck_id);

        let summary = match DeckSummary::build(&self.db, &self.config.scheduler, Utc::now()) {
            Ok(summary) => summary,
            Err(e) => {
                self.status = Some(format!("Refresh failed: {}", e));
                return Err(e);
            }
        };

        let index = selected_deck
            .and_then(|id| summary.rows.iter().position(|r| r.deck_id == id))
            .or_else(|| {
                let previous = self.table_state.selected()?;
                Some(previous.min(summary.rows.len().checked_sub(1)?))
            })
            .or(if summary.rows.is_empty() { None } else { Some(0) });

        self.summary = Some(summary);
        self.table_state.select(index);
        self.status = None;
        Ok(())
    }

    /// Re-read configuration and reopen the collection.
    pub fn reload_sources(&mut self) -> deckcounts_core::Result<()> {
        let (config, db) = self.sources.open()?;
        self.config = config;
        self.db = db;
        tracing::info!("Configuration and collection reloaded");
        Ok(())
    }

    // ========== Key Handling ==========

    /// Handle a key event.
    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('r') => self.pending = Some(Command::Reload),
                KeyCode::Char('c') => self.should_quit = true,
                _ => {}
            }
            return;
        }

        match &self.view_mode {
            ViewMode::Decks => self.handle_decks_key(key),
            ViewMode::Detail { .. } => self.handle_detail_key(key),
        }
    }

    /// Handle keyboard input in the deck table.
    fn handle_decks_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
            }
            KeyCode::Enter | KeyCode::Char(' ') => {
                self.toggle_selected();
            }
            KeyCode::Char('c') => {
                self.make_selected_current();
            }
            KeyCode::Char('d') => {
                self.open_detail_view();
            }
            KeyCode::Char('r') => {
                self.pending = Some(Command::Refresh);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.select_next();
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.select_previous();
            }
            KeyCode::Home | KeyCode::Char('g') => {
                self.select_first();
            }
            KeyCode::End | KeyCode::Char('G') => {
                self.select_last();
            }
            _ => {}
        }
    }

    /// Handle keyboard input in the detail view.
    fn handle_detail_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
            }
            KeyCode::Esc | KeyCode::Char('d') => {
                self.close_detail_view();
            }
            _ => {}
        }
    }

    // ========== Deck Actions ==========

    /// Collapse or expand the selected deck.
    fn toggle_selected(&mut self) {
        let Some(row) = self.selected_row() else {
            return;
        };
        if row.child_count == 0 {
            return;
        }
        let deck_id = row.deck_id;
        match self.db.toggle_deck_collapsed(deck_id) {
            Ok(_) => self.pending = Some(Command::Refresh),
            Err(e) => {
                tracing::warn!(deck_id, error = %e, "Failed to toggle deck");
                self.status = Some(format!("Toggle failed: {}", e));
            }
        }
    }

    /// Make the selected deck the collection's current deck.
    fn make_selected_current(&mut self) {
        let Some(deck_id) = self.selected_row().map(|r| r.deck_id) else {
            return;
        };
        match self.db.set_current_deck(deck_id) {
            Ok(()) => self.pending = Some(Command::Refresh),
            Err(e) => {
                tracing::warn!(deck_id, error = %e, "Failed to set current deck");
                self.status = Some(format!("Select failed: {}", e));
            }
        }
    }

    fn open_detail_view(&mut self) {
        if let Some(row) = self.selected_row() {
            self.view_mode = ViewMode::Detail {
                deck_id: row.deck_id,
                deck_name: row.name.clone(),
            };
        }
    }

    fn close_detail_view(&mut self) {
        self.view_mode = ViewMode::Decks;
        // The table did not refresh while hidden.
        self.pending = Some(Command::Refresh);
    }

    // ========== Navigation ==========

    /// Select the next row in the table.
    fn select_next(&mut self) {
        let len = self.rows().len();
        if len == 0 {
            return;
        }
        let i = match self.table_state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.table_state.select(Some(i));
    }

    /// Select the previous row in the table.
    fn select_previous(&mut self) {
        let len = self.rows().len();
        if len == 0 {
            return;
        }
        let i = match self.table_state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.table_state.select(Some(i));
    }

    fn select_first(&mut self) {
        if !self.rows().is_empty() {
            self.table_state.select(Some(0));
        }
    }

    fn select_last(&mut self) {
        let len = self.rows().len();
        if len > 0 {
            self.table_state.select(Some(len - 1));
        }
    }
}

impl RefreshTarget for App {
    fn is_visible(&self) -> bool {
        self.view_mode == ViewMode::Decks
    }

    fn refresh(&mut self) -> deckcounts_core::Result<()> {
        self.refresh_table()
    }
}

/// The app together with the scheduler that keeps its table fresh.
pub struct Browser {
    pub app: App,
    pub scheduler: RefreshScheduler,
}

impl Browser {
    /// Wrap an app and arm its refresh timer.
    pub fn new(app: App, now: Instant) -> Self {
        let mut scheduler = RefreshScheduler::new();
        scheduler.start(app.config.scheduler.refresh_interval(), now);
        Self { app, scheduler }
    }

    /// Reload hooks for this browser.
    pub fn reload_hooks() -> ReloadHooks<Browser> {
        ReloadHooks::new(Browser::prepare_for_reload).with_after(Browser::resume_after_reload)
    }

    fn prepare_for_reload(&mut self) {
        self.scheduler.prepare_for_reload();
    }

    fn resume_after_reload(&mut self) {
        self.scheduler
            .resume_after_reload(Instant::now(), &mut self.app);
    }

    /// Run the command queued by the last key press, if any.
    pub fn run_pending(&mut self) {
        match self.app.pending.take() {
            Some(Command::Refresh) => {
                self.scheduler.tick(&mut self.app);
            }
            Some(Command::Reload) => {
                let result = Self::reload_hooks().reload(self, |browser| {
                    browser.app.reload_sources()?;
                    browser
                        .scheduler
                        .set_interval(browser.app.config.scheduler.refresh_interval());
                    Ok(())
                });
                if let Err(e) = result {
                    tracing::warn!(error = %e, "Reload failed");
                    self.app.status = Some(format!("Reload failed: {}", e));
                }
            }
            None => {}
        }
    }
}
