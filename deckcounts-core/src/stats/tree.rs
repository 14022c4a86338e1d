//! Bottom-up aggregation of deck statistics.

use super::StatsProvider;
use crate::error::Result;
use crate::types::{CatalogNode, DayIndex, DeckStatsNode, LearningCounts, Timestamp};

/// Build the aggregated statistics tree for a catalog forest.
///
/// Queries `provider` once per deck with the same `cutoff` and `today`, then
/// folds each deck's children into its totals. Returns one node per top-level
/// deck, in catalog order.
///
/// Any provider error aborts the build.
pub fn build_tree<P: StatsProvider + ?Sized>(
    roots: &[CatalogNode],
    provider: &P,
    cutoff: Timestamp,
    today: DayIndex,
) -> Result<Vec<DeckStatsNode>> {
    let nodes = roots
        .iter()
        .map(|root| build_node(root, provider, cutoff, today))
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!(
        decks = roots.iter().map(CatalogNode::subtree_len).sum::<usize>(),
        cutoff,
        today,
        "Built deck stats tree"
    );

    Ok(nodes)
}

fn build_node<P: StatsProvider + ?Sized>(
    catalog: &CatalogNode,
    provider: &P,
    cutoff: Timestamp,
    today: DayIndex,
) -> Result<DeckStatsNode> {
    let own = LearningCounts::from(provider.stats_for(catalog.deck_id, cutoff, today)?);

    let children = catalog
        .children
        .iter()
        .map(|child| build_node(child, provider, cutoff, today))
        .collect::<Result<Vec<_>>>()?;

    let mut total = own;
    for child in &children {
        total.absorb(&child.total);
    }

    Ok(DeckStatsNode {
        deck_id: catalog.deck_id,
        name: catalog.name.clone(),
        level: catalog.level,
        collapsed: catalog.collapsed,
        filtered: catalog.filtered,
        new_cards: catalog.new_cards,
        due_rev_cards: catalog.due_rev_cards,
        due_lrn_reps: catalog.due_lrn_reps,
        own,
        total,
        children,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::stats::SnapshotProvider;
    use crate::types::{DeckId, RawLearningStats};
    use std::cell::RefCell;

    fn deck(deck_id: DeckId, level: u32, children: Vec<CatalogNode>) -> CatalogNode {
        CatalogNode {
            deck_id,
            name: format!("Deck {}", deck_id),
            level,
            collapsed: false,
            filtered: false,
            new_cards: 0,
            due_rev_cards: 0,
            due_lrn_reps: 0,
            children,
        }
    }

    fn stats(lrn_reps: i64, lrn_cards: i64, soonest: Option<i64>) -> RawLearningStats {
        RawLearningStats {
            lrn_reps: Some(lrn_reps),
            lrn_cards: Some(lrn_cards),
            due_lrn_cards: Some(1),
            lrn_day_cards: Some(2),
            buried_cards: Some(3),
            lrn_soonest: soonest,
        }
    }

    /// Records every call so tests can check what the builder asked for.
    struct RecordingProvider {
        inner: SnapshotProvider,
        calls: RefCell<Vec<(DeckId, Timestamp, DayIndex)>>,
    }

    impl StatsProvider for RecordingProvider {
        fn stats_for(
            &self,
            deck_id: DeckId,
            cutoff: Timestamp,
            today: DayIndex,
        ) -> Result<RawLearningStats> {
            self.calls.borrow_mut().push((deck_id, cutoff, today));
            self.inner.stats_for(deck_id, cutoff, today)
        }
    }

    struct FailingProvider {
        fail_on: DeckId,
    }

    impl StatsProvider for FailingProvider {
        fn stats_for(&self, deck_id: DeckId, _: Timestamp, _: DayIndex) -> Result<RawLearningStats> {
            if deck_id == self.fail_on {
                return Err(Error::Provider {
                    deck_id,
                    message: "query failed".to_string(),
                });
            }
            Ok(RawLearningStats::default())
        }
    }

    /// 1 ─┬─ 2 ─┬─ 4
    ///    │     └─ 5
    ///    └─ 3
    /// 6
    fn sample_catalog() -> Vec<CatalogNode> {
        vec![
            deck(
                1,
                1,
                vec![
                    deck(2, 2, vec![deck(4, 3, vec![]), deck(5, 3, vec![])]),
                    deck(3, 2, vec![]),
                ],
            ),
            deck(6, 1, vec![]),
        ]
    }

    fn sample_provider() -> SnapshotProvider {
        let mut provider = SnapshotProvider::new();
        provider
            .insert(1, stats(1, 1, None))
            .insert(2, stats(2, 2, Some(900)))
            .insert(3, RawLearningStats::default())
            .insert(4, stats(5, 3, Some(700)))
            .insert(5, stats(1, 1, None))
            .insert(6, stats(4, 2, Some(50)));
        provider
    }

    fn assert_summation_law(node: &DeckStatsNode) {
        let mut expected = node.own;
        for child in &node.children {
            assert_summation_law(child);
            expected.lrn_reps += child.total.lrn_reps;
            expected.lrn_cards += child.total.lrn_cards;
            expected.due_lrn_cards += child.total.due_lrn_cards;
            expected.lrn_day_cards += child.total.lrn_day_cards;
            expected.buried_cards += child.total.buried_cards;
            expected.lrn_soonest = match (expected.lrn_soonest, child.total.lrn_soonest) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
        }
        assert_eq!(node.total, expected, "deck {}", node.deck_id);
    }

    #[test]
    fn test_totals_follow_summation_law() {
        let tree = build_tree(&sample_catalog(), &sample_provider(), 1000, 10).unwrap();
        assert_eq!(tree.len(), 2);
        for root in &tree {
            assert_summation_law(root);
        }

        let root = &tree[0];
        assert_eq!(root.total.lrn_reps, 1 + 2 + 5 + 1);
        assert_eq!(root.total.lrn_cards, 1 + 2 + 3 + 1);
        // Deck 3 reported nothing, so four decks contribute one due card each.
        assert_eq!(root.total.due_lrn_cards, 4);
        assert_eq!(root.total.buried_cards, 12);
        assert_eq!(root.total.lrn_soonest, Some(700));
        assert_eq!(root.children[0].total.lrn_soonest, Some(700));
        assert_eq!(root.children[1].total.lrn_soonest, None);
    }

    #[test]
    fn test_own_counts_are_untouched_by_aggregation() {
        let tree = build_tree(&sample_catalog(), &sample_provider(), 1000, 10).unwrap();
        let root = &tree[0];
        assert_eq!(root.own.lrn_reps, 1);
        assert_eq!(root.own.lrn_soonest, None);
        assert_eq!(root.children[1].own, LearningCounts::default());
    }

    #[test]
    fn test_catalog_counters_are_not_summed_again() {
        let mut catalog = sample_catalog();
        catalog[0].new_cards = 10;
        catalog[0].due_rev_cards = 7;
        catalog[0].children[0].new_cards = 4;
        catalog[0].children[0].due_rev_cards = 3;

        let tree = build_tree(&catalog, &SnapshotProvider::new(), 0, 0).unwrap();
        assert_eq!(tree[0].new_cards, 10);
        assert_eq!(tree[0].due_rev_cards, 7);
        assert_eq!(tree[0].children[0].new_cards, 4);
    }

    #[test]
    fn test_one_call_per_deck_with_shared_cutoff() {
        let provider = RecordingProvider {
            inner: sample_provider(),
            calls: RefCell::new(Vec::new()),
        };
        build_tree(&sample_catalog(), &provider, 1234, 56).unwrap();

        let calls = provider.calls.borrow();
        assert_eq!(calls.len(), 6);
        assert!(calls.iter().all(|&(_, cutoff, today)| cutoff == 1234 && today == 56));

        let mut ids: Vec<DeckId> = calls.iter().map(|&(id, _, _)| id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_provider_failure_aborts_build() {
        let result = build_tree(&sample_catalog(), &FailingProvider { fail_on: 5 }, 0, 0);
        match result {
            Err(Error::Provider { deck_id, .. }) => assert_eq!(deck_id, 5),
            other => panic!("expected provider error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_catalog_builds_empty_forest() {
        let tree = build_tree(&[], &SnapshotProvider::new(), 0, 0).unwrap();
        assert!(tree.is_empty());
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let catalog = sample_catalog();
        let provider = sample_provider();
        let first = build_tree(&catalog, &provider, 1000, 10).unwrap();
        let second = build_tree(&catalog, &provider, 1000, 10).unwrap();
        assert_eq!(first, second);
    }
}
