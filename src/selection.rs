//! Item selection state and relative navigation.

use crate::api::{Feed, Folder, ItemDetail, ItemId, ItemStatus, Scope, StatusFilter};
use crate::stats::FilteredStats;

/// Content shown alongside the selected item or scope. Filled by the
/// readability, discussion and summary collaborators; the engine only clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentPanels {
    pub readability: Option<String>,
    pub discussion: Option<String>,
    pub summary: Option<String>,
    pub summary_error: Option<String>,
    pub feed_summary: Option<String>,
    pub feed_summary_error: Option<String>,
}

impl ContentPanels {
    pub fn clear_item(&mut self) {
        self.readability = None;
        self.discussion = None;
        self.summary = None;
        self.summary_error = None;
    }

    pub fn clear_feed(&mut self) {
        self.feed_summary = None;
        self.feed_summary_error = None;
    }
}

/// The selected item and its lazily fetched detail.
#[derive(Debug, Default)]
pub struct ItemSelection {
    selected: Option<ItemId>,
    detail: Option<ItemDetail>,
    generation: u64,
    pub panels: ContentPanels,
}

impl ItemSelection {
    pub fn selected(&self) -> Option<ItemId> {
        self.selected
    }

    pub fn detail(&self) -> Option<&ItemDetail> {
        self.detail.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Change the selection. Returns the detail request to issue, if any.
    ///
    /// Re-selecting the current item is a no-op.
    pub fn select(&mut self, id: Option<ItemId>) -> Option<(ItemId, u64)> {
        if id == self.selected {
            return None;
        }
        self.selected = id;
        self.generation = self.generation.wrapping_add(1);
        self.panels.clear_item();
        match id {
            None => {
                self.detail = None;
                None
            }
            Some(id) => Some((id, self.generation)),
        }
    }

    /// Drop the selection and every panel, including the scope-level ones.
    pub fn clear(&mut self) {
        self.select(None);
        self.panels.clear_item();
        self.panels.clear_feed();
    }

    /// Store a fetched detail if it still belongs to the current selection.
    pub fn apply_detail(&mut self, generation: u64, detail: ItemDetail) -> bool {
        if generation != self.generation || Some(detail.item.id) != self.selected {
            tracing::debug!(item_id = detail.item.id, generation, "Discarding stale item detail");
            return false;
        }
        self.detail = Some(detail);
        true
    }

    /// Patch the detail's status if it is still showing item `id`.
    pub fn set_status(&mut self, id: ItemId, status: ItemStatus) -> bool {
        match self.detail.as_mut() {
            Some(detail) if detail.item.id == id => {
                detail.item.status = status;
                true
            }
            _ => false,
        }
    }
}

// ============================================================================
// Navigation
// ============================================================================

/// Move `delta` steps from `current` inside `seq`.
///
/// Returns the new selection, or `None` when nothing should change: an empty
/// sequence or a step past either end. No selection, or one that is no longer
/// visible, lands on the first element.
pub fn step<T: PartialEq + Copy>(seq: &[T], current: Option<T>, delta: isize) -> Option<T> {
    let first = seq.first().copied()?;
    let Some(index) = current.and_then(|c| seq.iter().position(|x| *x == c)) else {
        return Some(first);
    };
    let target = index.checked_add_signed(delta)?;
    seq.get(target).copied()
}

/// The visible feed-list order: All, each folder followed by its feeds when
/// expanded, then the feeds without a folder.
///
/// With a filter active, folders and feeds with nothing to show are skipped
/// unless they are `current`.
pub fn feed_navigation(
    folders: &[Folder],
    feeds: &[Feed],
    filtered: &FilteredStats,
    filter: Option<StatusFilter>,
    current: Option<Scope>,
) -> Vec<Scope> {
    let visible = |scope: Scope, count: i64| {
        filter.is_none() || count > 0 || current == Some(scope)
    };

    let mut seq = vec![Scope::All];
    for folder in folders {
        let scope = Scope::Folder(Some(folder.id));
        if !visible(scope, filtered.folder(Some(folder.id))) {
            continue;
        }
        seq.push(scope);
        if !folder.is_expanded {
            continue;
        }
        for feed in feeds.iter().filter(|f| f.folder_id == Some(folder.id)) {
            let scope = Scope::Feed(feed.id);
            if visible(scope, filtered.feed(feed.id)) {
                seq.push(scope);
            }
        }
    }
    for feed in feeds.iter().filter(|f| f.folder_id.is_none()) {
        let scope = Scope::Feed(feed.id);
        if visible(scope, filtered.feed(feed.id)) {
            seq.push(scope);
        }
    }
    seq
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{FeedId, FeedStat, FolderId, Item};
    use crate::stats::compute_filtered;
    use pretty_assertions::assert_eq;

    fn feed(id: FeedId, folder_id: Option<FolderId>) -> Feed {
        Feed {
            id,
            folder_id,
            title: format!("Feed {}", id),
            description: None,
            link: None,
            feed_link: String::new(),
            has_icon: false,
        }
    }

    fn folder(id: FolderId, is_expanded: bool) -> Folder {
        Folder {
            id,
            title: format!("Folder {}", id),
            is_expanded,
        }
    }

    fn detail(id: ItemId) -> ItemDetail {
        ItemDetail {
            item: Item {
                id,
                feed_id: 1,
                title: String::new(),
                link: None,
                date: None,
                status: ItemStatus::Unread,
            },
            content: None,
            media_links: Vec::new(),
        }
    }

    #[test]
    fn test_step_boundaries() {
        let seq = [10, 20, 30];
        assert_eq!(step(&seq, None, 1), Some(10));
        assert_eq!(step(&seq, None, -1), Some(10));
        assert_eq!(step(&seq, Some(99), 1), Some(10));
        assert_eq!(step(&seq, Some(10), 1), Some(20));
        assert_eq!(step(&seq, Some(30), -1), Some(20));
        assert_eq!(step(&seq, Some(30), 1), None);
        assert_eq!(step(&seq, Some(10), -1), None);
        assert_eq!(step::<i64>(&[], None, 1), None);
    }

    #[test]
    fn test_select_issues_detail_fetch_and_clears_panels() {
        let mut sel = ItemSelection::default();
        sel.panels.summary = Some("old".into());
        sel.panels.feed_summary = Some("feed".into());

        let (id, generation) = sel.select(Some(5)).unwrap();
        assert_eq!(id, 5);
        assert_eq!(sel.panels.summary, None);
        assert_eq!(sel.panels.feed_summary.as_deref(), Some("feed"));
        assert!(sel.select(Some(5)).is_none());

        assert!(sel.apply_detail(generation, detail(5)));
        assert!(sel.set_status(5, ItemStatus::Read));
        assert_eq!(sel.detail().map(|d| d.item.status), Some(ItemStatus::Read));

        sel.clear();
        assert!(sel.detail().is_none());
        assert!(sel.selected().is_none());
        assert_eq!(sel.panels, ContentPanels::default());
    }

    #[test]
    fn test_stale_detail_is_dropped() {
        let mut sel = ItemSelection::default();
        let (_, first) = sel.select(Some(1)).unwrap();
        sel.select(Some(2));
        assert!(!sel.apply_detail(first, detail(1)));
        assert!(sel.detail().is_none());
    }

    #[test]
    fn test_feed_navigation_order() {
        let folders = [folder(1, true), folder(2, false)];
        let feeds = [feed(10, Some(1)), feed(11, None), feed(12, Some(2)), feed(13, Some(1))];
        let seq = feed_navigation(&folders, &feeds, &FilteredStats::default(), None, None);
        assert_eq!(
            seq,
            vec![
                Scope::All,
                Scope::Folder(Some(1)),
                Scope::Feed(10),
                Scope::Feed(13),
                Scope::Folder(Some(2)),
                Scope::Feed(11),
            ]
        );
    }

    #[test]
    fn test_feed_navigation_hides_empty_when_filtered() {
        let folders = [folder(1, true), folder(2, true)];
        let feeds = [feed(10, Some(1)), feed(11, Some(2)), feed(12, None), feed(13, None)];
        let stats = [(10, 3), (11, 0), (12, 0), (13, 1)]
            .into_iter()
            .map(|(feed_id, unread)| {
                (
                    feed_id,
                    FeedStat {
                        feed_id,
                        unread,
                        starred: 0,
                        total: unread,
                    },
                )
            })
            .collect();
        let filtered = compute_filtered(&feeds, &folders, &stats, Some(StatusFilter::Unread));

        let seq = feed_navigation(
            &folders,
            &feeds,
            &filtered,
            Some(StatusFilter::Unread),
            Some(Scope::Feed(12)),
        );
        assert_eq!(
            seq,
            vec![
                Scope::All,
                Scope::Folder(Some(1)),
                Scope::Feed(10),
                Scope::Feed(12),
                Scope::Feed(13),
            ]
        );
    }
}
