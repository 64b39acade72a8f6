//! Pagination controller for the item list.
//!
//! One ordered list, fetched page by page with an exclusive `after` cursor.
//! Every replacing load bumps a generation counter; replies carrying an older
//! generation are dropped so that only the latest scope/filter/search is ever
//! reflected.

use std::collections::HashSet;

use crate::api::{Item, ItemId, ItemPage, ItemQuery, ItemStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    /// First page; replaces the list.
    Replace,
    /// Next page after the cursor; appends.
    Append,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListState {
    Empty,
    Loading,
    Loaded { has_more: bool },
    LoadingMore,
}

/// A page fetch the runtime should perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub generation: u64,
    pub kind: FetchKind,
    pub query: ItemQuery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied { appended: usize },
    Stale,
}

#[derive(Debug, Default)]
pub struct ItemList {
    items: Vec<Item>,
    has_more: bool,
    loaded: bool,
    in_flight: Option<(u64, FetchKind)>,
    generation: u64,
}

impl ItemList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn state(&self) -> ListState {
        match self.in_flight {
            Some((_, FetchKind::Replace)) => ListState::Loading,
            Some((_, FetchKind::Append)) => ListState::LoadingMore,
            None if !self.loaded => ListState::Empty,
            None => ListState::Loaded {
                has_more: self.has_more,
            },
        }
    }

    /// Id of the last loaded item; the `after` of the next page.
    pub fn cursor(&self) -> Option<ItemId> {
        self.items.last().map(|item| item.id)
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn position(&self, id: ItemId) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    pub fn ids(&self) -> Vec<ItemId> {
        self.items.iter().map(|item| item.id).collect()
    }

    /// Start a replacing load. Any reply to an earlier request becomes stale.
    ///
    /// The current entries stay visible until the new page arrives, so a
    /// failed load leaves the last good list in place.
    pub fn begin_load(&mut self, query: ItemQuery) -> PageRequest {
        self.generation = self.generation.wrapping_add(1);
        self.in_flight = Some((self.generation, FetchKind::Replace));
        tracing::debug!(generation = self.generation, "Loading first item page");
        PageRequest {
            generation: self.generation,
            kind: FetchKind::Replace,
            query: ItemQuery { after: None, ..query },
        }
    }

    /// Start fetching the next page, if there is one and nothing is in flight.
    pub fn begin_load_more(&mut self, query: ItemQuery) -> Option<PageRequest> {
        if self.in_flight.is_some() || !self.loaded || !self.has_more {
            return None;
        }
        let cursor = self.cursor()?;
        self.in_flight = Some((self.generation, FetchKind::Append));
        tracing::debug!(generation = self.generation, cursor, "Loading next item page");
        Some(PageRequest {
            generation: self.generation,
            kind: FetchKind::Append,
            query: query.after(cursor),
        })
    }

    /// Drop the list without fetching (no scope selected, or after mark-all-read).
    pub fn clear(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.items.clear();
        self.has_more = false;
        self.loaded = false;
        self.in_flight = None;
    }

    fn is_current(&self, generation: u64, kind: FetchKind) -> bool {
        self.in_flight == Some((generation, kind))
    }

    /// Merge a fetched page.
    pub fn complete(&mut self, generation: u64, kind: FetchKind, page: ItemPage) -> Completion {
        if !self.is_current(generation, kind) {
            tracing::debug!(generation, current = self.generation, "Discarding stale item page");
            return Completion::Stale;
        }
        self.in_flight = None;
        self.loaded = true;
        self.has_more = page.has_more;

        let appended = match kind {
            FetchKind::Replace => {
                self.items = page.list;
                self.items.len()
            }
            FetchKind::Append => {
                let known: HashSet<ItemId> = self.items.iter().map(|item| item.id).collect();
                let before = self.items.len();
                for item in page.list {
                    if known.contains(&item.id) {
                        tracing::warn!(item_id = item.id, "Duplicate item in appended page");
                        continue;
                    }
                    self.items.push(item);
                }
                self.items.len() - before
            }
        };
        Completion::Applied { appended }
    }

    /// Clear the loading flag after a failed fetch. Returns false for stale
    /// failures, which leave the current request untouched.
    pub fn fail(&mut self, generation: u64, kind: FetchKind) -> bool {
        if !self.is_current(generation, kind) {
            return false;
        }
        self.in_flight = None;
        true
    }

    pub fn set_status(&mut self, id: ItemId, status: ItemStatus) -> bool {
        match self.items.iter_mut().find(|item| item.id == id) {
            Some(item) => {
                item.status = status;
                true
            }
            None => false,
        }
    }

    /// Whether a further page should be requested now: the list is near its
    /// bottom edge, or `selected` is the last loaded item.
    pub fn should_load_more(&self, selected: Option<ItemId>, near_bottom: bool) -> bool {
        if !self.has_more || self.in_flight.is_some() || !self.loaded {
            return false;
        }
        near_bottom || (selected.is_some() && selected == self.cursor())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Scope;
    use pretty_assertions::assert_eq;

    fn query() -> ItemQuery {
        ItemQuery {
            scope: Scope::All,
            status: None,
            search: None,
            oldest_first: false,
            after: None,
        }
    }

    fn item(id: ItemId) -> Item {
        Item {
            id,
            feed_id: 1,
            title: format!("Item {}", id),
            link: None,
            date: None,
            status: ItemStatus::Unread,
        }
    }

    fn page(ids: impl IntoIterator<Item = ItemId>, has_more: bool) -> ItemPage {
        ItemPage {
            list: ids.into_iter().map(item).collect(),
            has_more,
        }
    }

    #[test]
    fn test_state_machine() {
        let mut list = ItemList::new();
        assert_eq!(list.state(), ListState::Empty);

        let req = list.begin_load(query());
        assert_eq!(list.state(), ListState::Loading);
        assert_eq!(req.query.after, None);

        list.complete(req.generation, req.kind, page(1..=20, true));
        assert_eq!(list.state(), ListState::Loaded { has_more: true });
        assert_eq!(list.cursor(), Some(20));

        let more = list.begin_load_more(query()).unwrap();
        assert_eq!(list.state(), ListState::LoadingMore);
        assert_eq!(more.query.after, Some(20));

        list.complete(more.generation, more.kind, page(21..=25, false));
        assert_eq!(list.state(), ListState::Loaded { has_more: false });
        assert_eq!(list.len(), 25);
        assert!(list.begin_load_more(query()).is_none());
    }

    #[test]
    fn test_load_more_is_single_flight() {
        let mut list = ItemList::new();
        let req = list.begin_load(query());
        list.complete(req.generation, req.kind, page(1..=20, true));

        assert!(list.should_load_more(None, true));
        let first = list.begin_load_more(query());
        assert!(first.is_some());
        assert!(!list.should_load_more(None, true));
        assert!(list.begin_load_more(query()).is_none());
    }

    #[test]
    fn test_stale_page_is_discarded() {
        let mut list = ItemList::new();
        let old = list.begin_load(query());
        let new = list.begin_load(ItemQuery {
            scope: Scope::Feed(2),
            ..query()
        });

        assert_eq!(list.complete(old.generation, old.kind, page(1..=3, false)), Completion::Stale);
        assert_eq!(list.state(), ListState::Loading);
        assert_eq!(
            list.complete(new.generation, new.kind, page(7..=8, false)),
            Completion::Applied { appended: 2 }
        );
        assert_eq!(list.ids(), vec![7, 8]);
    }

    #[test]
    fn test_append_reply_after_reload_is_stale() {
        let mut list = ItemList::new();
        let req = list.begin_load(query());
        list.complete(req.generation, req.kind, page(1..=5, true));
        let more = list.begin_load_more(query()).unwrap();
        let reload = list.begin_load(query());

        assert_eq!(list.complete(more.generation, more.kind, page(6..=9, false)), Completion::Stale);
        list.complete(reload.generation, reload.kind, page(1..=2, false));
        assert_eq!(list.ids(), vec![1, 2]);
    }

    #[test]
    fn test_failure_keeps_last_good_list() {
        let mut list = ItemList::new();
        let req = list.begin_load(query());
        list.complete(req.generation, req.kind, page(1..=4, true));

        let more = list.begin_load_more(query()).unwrap();
        assert!(list.fail(more.generation, more.kind));
        assert_eq!(list.state(), ListState::Loaded { has_more: true });
        assert_eq!(list.len(), 4);

        let reload = list.begin_load(query());
        assert!(list.fail(reload.generation, reload.kind));
        assert_eq!(list.ids(), vec![1, 2, 3, 4]);
        assert!(!list.fail(reload.generation, reload.kind));
    }

    #[test]
    fn test_clear_forces_empty() {
        let mut list = ItemList::new();
        let req = list.begin_load(query());
        list.complete(req.generation, req.kind, page(1..=4, true));
        list.clear();

        assert_eq!(list.state(), ListState::Empty);
        assert!(!list.has_more());
        assert_eq!(list.cursor(), None);
        assert_eq!(list.complete(req.generation, req.kind, page(1..=4, true)), Completion::Stale);
    }

    #[test]
    fn test_duplicate_ids_are_skipped_on_append() {
        let mut list = ItemList::new();
        let req = list.begin_load(query());
        list.complete(req.generation, req.kind, page(1..=3, true));
        let more = list.begin_load_more(query()).unwrap();

        assert_eq!(
            list.complete(more.generation, more.kind, page([3, 4], false)),
            Completion::Applied { appended: 1 }
        );
        assert_eq!(list.ids(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_selection_adjacent_load() {
        let mut list = ItemList::new();
        let req = list.begin_load(query());
        list.complete(req.generation, req.kind, page(1..=3, true));

        assert!(list.should_load_more(Some(3), false));
        assert!(!list.should_load_more(Some(2), false));
        assert!(!list.should_load_more(None, false));
    }
}
