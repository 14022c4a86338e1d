//! Flattening of the statistics tree into display rows.

use serde::Serialize;

use crate::format::{format_counts, FormattedCounts};
use crate::types::{DeckId, DeckStatsNode, Timestamp};

/// Per-render context shared by every row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowContext {
    /// Cutoff the tree was built with
    pub cutoff: Timestamp,
    /// Deck marked as current in the collection, if any
    pub current_deck_id: Option<DeckId>,
}

/// One row of the deck table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeckRow {
    pub deck_id: DeckId,
    pub name: String,
    pub level: u32,
    pub collapsed: bool,
    pub filtered: bool,
    /// This is the collection's current deck
    pub current: bool,
    pub counts: FormattedCounts,
    /// Number of direct children, whether or not they are shown
    pub child_count: usize,
}

impl DeckRow {
    /// Collapse marker: `-` for an expanded parent, `+` for a collapsed one,
    /// nothing for a leaf deck.
    pub fn collapse_marker(&self) -> &'static str {
        match (self.child_count, self.collapsed) {
            (0, _) => "",
            (_, true) => "+",
            (_, false) => "-",
        }
    }
}

/// Flatten a statistics forest into rows, depth-first in catalog order.
///
/// Descendants of collapsed decks are left out; the collapsed deck itself is
/// still shown with its full subtree totals.
pub fn deck_rows(roots: &[DeckStatsNode], ctx: &RowContext) -> Vec<DeckRow> {
    let mut rows = Vec::new();
    for root in roots {
        push_rows(root, ctx, &mut rows);
    }
    rows
}

fn push_rows(node: &DeckStatsNode, ctx: &RowContext, rows: &mut Vec<DeckRow>) {
    rows.push(DeckRow {
        deck_id: node.deck_id,
        name: node.name.clone(),
        level: node.level,
        collapsed: node.collapsed,
        filtered: node.filtered,
        current: ctx.current_deck_id == Some(node.deck_id),
        counts: format_counts(node, ctx.cutoff),
        child_count: node.children.len(),
    });

    if !node.collapsed {
        for child in &node.children {
            push_rows(child, ctx, rows);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LearningCounts;

    fn node(deck_id: DeckId, collapsed: bool, children: Vec<DeckStatsNode>) -> DeckStatsNode {
        let total = LearningCounts {
            buried_cards: deck_id,
            ..Default::default()
        };
        DeckStatsNode {
            deck_id,
            name: format!("Deck {}", deck_id),
            level: 1,
            collapsed,
            filtered: false,
            new_cards: 0,
            due_rev_cards: 0,
            due_lrn_reps: 0,
            own: total,
            total,
            children,
        }
    }

    fn ctx() -> RowContext {
        RowContext {
            cutoff: 0,
            current_deck_id: Some(3),
        }
    }

    #[test]
    fn test_rows_are_preorder() {
        let forest = vec![
            node(1, false, vec![node(2, false, vec![node(3, false, vec![])]), node(4, false, vec![])]),
            node(5, false, vec![]),
        ];
        let ids: Vec<DeckId> = deck_rows(&forest, &ctx()).iter().map(|r| r.deck_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_collapsed_descendants_are_omitted() {
        let forest = vec![node(
            1,
            false,
            vec![node(2, true, vec![node(3, false, vec![])]), node(4, false, vec![])],
        )];
        let rows = deck_rows(&forest, &ctx());
        let ids: Vec<DeckId> = rows.iter().map(|r| r.deck_id).collect();
        assert_eq!(ids, vec![1, 2, 4]);

        let collapsed = &rows[1];
        assert_eq!(collapsed.child_count, 1);
        assert_eq!(collapsed.collapse_marker(), "+");
        assert_eq!(rows[0].collapse_marker(), "-");
        assert_eq!(rows[2].collapse_marker(), "");
    }

    #[test]
    fn test_current_deck_is_marked() {
        let forest = vec![node(1, false, vec![node(3, false, vec![])])];
        let rows = deck_rows(&forest, &ctx());
        assert!(!rows[0].current);
        assert!(rows[1].current);
        assert_eq!(rows[1].counts.buried.text, "3");
    }
}
