//! deckcounts-print - print the deck table without the TUI
//!
//! Builds the deck table once and prints it as text or JSON. With `--watch`
//! the table is rebuilt and printed again on every refresh tick.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use clap::{Parser, ValueEnum};
use deckcounts_core::{
    Config, Database, DayIndex, DeckRow, DeckSummary, RefreshScheduler, RefreshTarget, Timestamp,
};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "deckcounts-print")]
#[command(about = "Print deck counts split into due now and due later today")]
#[command(version)]
struct Args {
    /// Collection database (defaults to the configured or XDG path)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Configuration file (defaults to the XDG config path)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Print again on every refresh interval until Ctrl+C
    #[arg(short, long)]
    watch: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// JSON document for one build.
#[derive(Serialize)]
struct PrintedTable<'a> {
    generated_at: String,
    cutoff: Timestamp,
    today: DayIndex,
    rows: &'a [DeckRow],
}

/// Writes every successful build to `out`.
struct Printer<W> {
    db: Database,
    config: Config,
    format: OutputFormat,
    out: W,
}

impl<W: Write> Printer<W> {
    /// Build the table and write it once.
    fn print(&mut self) -> deckcounts_core::Result<()> {
        let summary = DeckSummary::build(&self.db, &self.config.scheduler, Utc::now())?;
        match self.format {
            OutputFormat::Text => self.out.write_all(render_text(&summary.rows).as_bytes())?,
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut self.out, &printed_table(&summary))?;
                self.out.write_all(b"\n")?;
            }
        }
        self.out.flush()?;
        Ok(())
    }
}

impl<W: Write> RefreshTarget for Printer<W> {
    fn is_visible(&self) -> bool {
        true
    }

    fn refresh(&mut self) -> deckcounts_core::Result<()> {
        if self.format == OutputFormat::Text {
            self.out.write_all(b"\n")?;
        }
        self.print()
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("failed to load configuration")?;

    // Logging is best effort here; stdout carries the table.
    let _log_guard = deckcounts_core::logging::init(&config.logging).ok();

    let db_path = args.db.clone().unwrap_or_else(|| config.collection_path());
    tracing::info!(path = %db_path.display(), "Opening collection");
    let db = Database::open(&db_path).context("failed to open collection")?;
    db.migrate().context("failed to run database migrations")?;

    let mut printer = Printer {
        db,
        config,
        format: args.format,
        out: io::stdout(),
    };
    printer.print().context("failed to print deck table")?;

    if args.watch {
        watch(&mut printer)?;
    }

    Ok(())
}

/// Re-print on every refresh tick until interrupted.
fn watch<W: Write>(printer: &mut Printer<W>) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = Arc::clone(&running);
    ctrlc::set_handler(move || handler_flag.store(false, Ordering::SeqCst))
        .context("failed to install Ctrl+C handler")?;

    let mut scheduler = RefreshScheduler::new();
    scheduler.start(printer.config.scheduler.refresh_interval(), Instant::now());

    while running.load(Ordering::SeqCst) {
        scheduler.poll(Instant::now(), printer);
        std::thread::sleep(Duration::from_millis(200));
    }

    scheduler.stop();
    let stats = scheduler.stats();
    tracing::info!(
        refreshed = stats.refreshed,
        failed = stats.failed,
        "Watch stopped"
    );
    Ok(())
}

const HEADINGS: [&str; 5] = ["Deck", "New", "Due", "Later", "Buried"];

/// Render rows as an aligned text table.
///
/// Names are indented two spaces per level below the top and prefixed with
/// the collapse marker. The current deck is starred.
fn render_text(rows: &[DeckRow]) -> String {
    let names: Vec<String> = rows.iter().map(text_name).collect();

    let mut widths = HEADINGS.map(str::len);
    for (row, name) in rows.iter().zip(&names) {
        widths[0] = widths[0].max(name.chars().count());
        for (i, cell) in row.counts.cells().iter().enumerate() {
            widths[i + 1] = widths[i + 1].max(cell.text.chars().count());
        }
    }

    let mut out = String::new();
    push_line(&mut out, &widths, HEADINGS);
    for (row, name) in rows.iter().zip(&names) {
        let [new, due, later, buried] = row.counts.cells();
        push_line(
            &mut out,
            &widths,
            [
                name.as_str(),
                new.text.as_str(),
                due.text.as_str(),
                later.text.as_str(),
                buried.text.as_str(),
            ],
        );
    }
    out
}

fn text_name(row: &DeckRow) -> String {
    let indent = "  ".repeat(row.level.saturating_sub(1) as usize);
    let marker = match row.collapse_marker() {
        "" => " ",
        marker => marker,
    };
    let star = if row.current { "*" } else { "" };
    format!("{}{} {}{}", indent, marker, row.name, star)
}

fn push_line(out: &mut String, widths: &[usize; 5], cells: [&str; 5]) {
    let mut line = format!("{:<width$}", cells[0], width = widths[0]);
    for (cell, width) in cells[1..].iter().zip(&widths[1..]) {
        line.push_str(&format!("  {:>width$}", cell, width = width));
    }
    out.push_str(line.trim_end());
    out.push('\n');
}

fn printed_table(summary: &DeckSummary) -> PrintedTable<'_> {
    PrintedTable {
        generated_at: summary
            .generated_at
            .to_rfc3339_opts(SecondsFormat::Secs, true),
        cutoff: summary.cutoff,
        today: summary.today,
        rows: &summary.rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deckcounts_core::{Queue, TickOutcome};

    fn seeded_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db.set_created_at(0).unwrap();
        let parent = db.add_deck("Languages", None).unwrap();
        let child = db.add_deck("Spanish", Some(parent)).unwrap();
        db.add_deck("Music", None).unwrap();
        db.add_card(child, Queue::Learning, 1_325, 2002).unwrap();
        db.add_card(child, Queue::New, 0, 0).unwrap();
        db.set_current_deck(child).unwrap();
        db
    }

    fn summary() -> DeckSummary {
        DeckSummary::build_at(&seeded_db(), 1_200, 0, Utc::now()).unwrap()
    }

    fn test_printer<W: Write>(format: OutputFormat, out: W) -> Printer<W> {
        Printer {
            db: seeded_db(),
            config: Config::default(),
            format,
            out,
        }
    }

    /// Output that is already closed.
    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_text_table_layout() {
        let text = render_text(&summary().rows);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("Deck"));
        assert!(lines[0].ends_with("Buried"));
        assert!(lines[1].starts_with("- Languages"));
        assert!(lines[2].starts_with("    Spanish*"));
        assert!(lines[2].contains("[3m]"));
        assert!(lines[3].starts_with("  Music"));
    }

    #[test]
    fn test_text_columns_are_aligned() {
        let text = render_text(&summary().rows);
        let ends: Vec<usize> = text.lines().map(|l| l.chars().count()).collect();
        assert!(ends.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_json_output() {
        let summary = summary();
        let value = serde_json::to_value(printed_table(&summary)).unwrap();

        assert_eq!(value["cutoff"], 1_200);
        assert_eq!(value["rows"].as_array().unwrap().len(), 3);
        assert_eq!(value["rows"][1]["name"], "Spanish");
        assert_eq!(value["rows"][1]["counts"]["due"]["text"], "[3m]");
        assert_eq!(value["rows"][1]["counts"]["later"]["text"], "1 (2)");
        assert_eq!(value["rows"][1]["counts"]["new"]["hint"], "new");
    }

    #[test]
    fn test_refresh_writes_text_table() {
        let mut printer = test_printer(OutputFormat::Text, Vec::new());
        let mut scheduler = RefreshScheduler::new();

        assert_eq!(scheduler.tick(&mut printer), TickOutcome::Refreshed);
        let text = String::from_utf8(printer.out).unwrap();
        assert!(text.starts_with('\n'));
        assert!(text.contains("Spanish*"));
    }

    #[test]
    fn test_refresh_writes_one_json_document() {
        let mut printer = test_printer(OutputFormat::Json, Vec::new());
        printer.print().unwrap();

        let value: serde_json::Value = serde_json::from_slice(&printer.out).unwrap();
        assert_eq!(value["rows"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_failed_json_output_counts_as_failed_tick() {
        let mut printer = test_printer(OutputFormat::Json, ClosedPipe);
        let mut scheduler = RefreshScheduler::new();

        assert_eq!(scheduler.tick(&mut printer), TickOutcome::Failed);
        assert_eq!(scheduler.stats().failed, 1);
        assert_eq!(scheduler.stats().refreshed, 0);
        assert!(matches!(
            printer.print(),
            Err(deckcounts_core::Error::Json(_))
        ));
    }

    #[test]
    fn test_failed_text_output_counts_as_failed_tick() {
        let mut printer = test_printer(OutputFormat::Text, ClosedPipe);
        let mut scheduler = RefreshScheduler::new();

        assert_eq!(scheduler.tick(&mut printer), TickOutcome::Failed);
        assert_eq!(scheduler.stats().failed, 1);
    }
}
