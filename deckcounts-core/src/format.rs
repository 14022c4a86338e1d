//! Count formatting shared across UIs.
//!
//! Turns an aggregated [`DeckStatsNode`] into the four compact cells shown in
//! the deck table: New, Due, Later and Buried.

use serde::Serialize;

use crate::types::{DeckStatsNode, Timestamp};

/// Counts at or above this value are shown as `"1000+"`.
pub const COUNT_CEILING: i64 = 1000;

/// Rendering hint for a count cell.
///
/// The core only classifies cells; colours are chosen by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CellHint {
    /// The underlying value is zero
    Muted,
    New,
    Due,
    Later,
    Buried,
}

/// A formatted count with its rendering hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountCell {
    pub text: String,
    pub hint: CellHint,
}

impl CountCell {
    fn new(text: String, value: i64, hint: CellHint) -> Self {
        let hint = if value == 0 { CellHint::Muted } else { hint };
        Self { text, hint }
    }
}

/// The four cells of a deck row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormattedCounts {
    pub new: CountCell,
    pub due: CountCell,
    pub later: CountCell,
    pub buried: CountCell,
}

impl FormattedCounts {
    /// Cells in column order.
    pub fn cells(&self) -> [&CountCell; 4] {
        [&self.new, &self.due, &self.later, &self.buried]
    }
}

/// Format a count, capping it at [`COUNT_CEILING`].
pub fn cap(n: i64) -> String {
    cap_at(n, COUNT_CEILING)
}

/// Format a count, showing `"<ceiling>+"` once it reaches `ceiling`.
pub fn cap_at(n: i64, ceiling: i64) -> String {
    if n >= ceiling {
        format!("{}+", ceiling)
    } else {
        n.to_string()
    }
}

/// Whole minutes from `cutoff` until `soonest`, rounded up.
pub fn minutes_until(soonest: Timestamp, cutoff: Timestamp) -> i64 {
    let secs = soonest - cutoff;
    // Integer division truncates toward zero, which is already the ceiling
    // for negative values.
    if secs > 0 && secs % 60 != 0 {
        secs / 60 + 1
    } else {
        secs / 60
    }
}

/// Format the Due cell.
///
/// Shows the number of cards due now, or `"[Nm]"` with the wait until the next
/// learning card when nothing is due now.
pub fn format_due(due: i64, lrn_soonest: Option<Timestamp>, cutoff: Timestamp) -> CountCell {
    match lrn_soonest {
        Some(soonest) if due == 0 => CountCell {
            text: format!("[{}m]", minutes_until(soonest, cutoff)),
            hint: CellHint::Due,
        },
        _ => CountCell::new(cap(due), due, CellHint::Due),
    }
}

/// Format the Later cell from the cards and reps due after the cutoff.
///
/// Plain count when cards and reps agree, `"cards (reps)"` when they differ.
pub fn format_later(later_cards: i64, later_reps: i64) -> CountCell {
    debug_assert!(
        later_cards >= 0 && later_reps >= 0,
        "negative later counts: cards={} reps={}",
        later_cards,
        later_reps
    );

    let text = if later_reps == later_cards {
        cap(later_reps)
    } else if later_cards == 0 {
        format!("({})", cap(later_reps))
    } else if later_reps >= COUNT_CEILING {
        format!("{} (+)", cap(later_cards))
    } else {
        format!("{} ({})", later_cards, later_reps)
    };

    let value = if later_cards == 0 && later_reps == 0 {
        0
    } else {
        1
    };
    CountCell::new(text, value, CellHint::Later)
}

/// Format all four cells for an aggregated node.
pub fn format_counts(node: &DeckStatsNode, cutoff: Timestamp) -> FormattedCounts {
    FormattedCounts {
        new: CountCell::new(cap(node.new_cards), node.new_cards, CellHint::New),
        due: format_due(node.due_now(), node.total.lrn_soonest, cutoff),
        later: format_later(node.total.later_cards(), node.total.later_reps()),
        buried: CountCell::new(
            cap(node.total.buried_cards),
            node.total.buried_cards,
            CellHint::Buried,
        ),
    }
}
