//! Aggregate statistics: per-feed, per-folder and total counts for the
//! active filter, plus the unread indicator in the window title.
//!
//! The raw map is replaced wholesale on every status refresh. The only
//! incremental changes are the point updates made after an item's status was
//! changed remotely. Derived structures are recomputed from the raw map through
//! a debounced watch so that bursts of point updates recompute once.

use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

use crate::api::{Feed, FeedId, FeedStat, Folder, FolderId, ItemStatus, StatusFilter};
use crate::util::Debounced;

pub type FeedStats = HashMap<FeedId, FeedStat>;

/// Counts for the active filter. All empty when no filter is active.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilteredStats {
    pub feeds: HashMap<FeedId, i64>,
    /// Keyed by folder; `None` is the "no folder" bucket.
    pub folders: HashMap<Option<FolderId>, i64>,
    pub total: Option<i64>,
}

impl FilteredStats {
    pub fn feed(&self, id: FeedId) -> i64 {
        self.feeds.get(&id).copied().unwrap_or(0)
    }

    pub fn folder(&self, id: Option<FolderId>) -> i64 {
        self.folders.get(&id).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.total.is_none()
    }
}

/// Derive filtered counts from the raw map.
///
/// With no filter everything is cleared; no implicit "all statuses" sum is
/// made. With a filter, every known feed gets a count (0 when it has no stat
/// entry), every known folder and the "no folder" bucket get the sum of their
/// feeds, and the total sums all feeds.
pub fn compute_filtered(
    feeds: &[Feed],
    folders: &[Folder],
    stats: &FeedStats,
    filter: Option<StatusFilter>,
) -> FilteredStats {
    let Some(filter) = filter else {
        return FilteredStats::default();
    };

    let mut out = FilteredStats {
        feeds: HashMap::with_capacity(feeds.len()),
        folders: folders.iter().map(|f| (Some(f.id), 0)).collect(),
        total: Some(0),
    };
    out.folders.insert(None, 0);

    let mut total = 0;
    for feed in feeds {
        let n = stats.get(&feed.id).map_or(0, |s| s.count(filter));
        out.feeds.insert(feed.id, n);
        *out.folders.entry(feed.folder_id).or_insert(0) += n;
        total += n;
    }
    out.total = Some(total);
    out
}

pub fn total_unread(stats: &FeedStats) -> i64 {
    stats.values().map(|s| s.unread).sum()
}

/// `"<base> (<unread>)"` when anything is unread, else the bare title.
pub fn window_title(base: &str, stats: &FeedStats) -> String {
    match total_unread(stats) {
        0 => base.to_string(),
        n => format!("{} ({})", base, n),
    }
}

// ============================================================================
// StatsEngine
// ============================================================================

/// Owner of the raw stat map and everything derived from it.
#[derive(Debug)]
pub struct StatsEngine {
    raw: FeedStats,
    filtered: FilteredStats,
    base_title: String,
    title: String,
    recompute: Debounced<()>,
}

impl StatsEngine {
    pub fn new(base_title: impl Into<String>, debounce: Duration) -> Self {
        let base_title = base_title.into();
        Self {
            raw: FeedStats::new(),
            filtered: FilteredStats::default(),
            title: base_title.clone(),
            base_title,
            recompute: Debounced::new(debounce),
        }
    }

    pub fn raw(&self) -> &FeedStats {
        &self.raw
    }

    pub fn get(&self, feed_id: FeedId) -> Option<&FeedStat> {
        self.raw.get(&feed_id)
    }

    pub fn filtered(&self) -> &FilteredStats {
        &self.filtered
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Replace the raw map with a fresh status snapshot.
    pub fn replace(&mut self, stats: Vec<FeedStat>, now: Instant) {
        self.raw = stats.into_iter().map(|s| (s.feed_id, s)).collect();
        self.recompute.trigger((), now);
    }

    /// Point update after an item moved from `from` to `to`.
    ///
    /// Returns false if the feed has no stat entry (nothing to patch).
    pub fn apply_status_change(
        &mut self,
        feed_id: FeedId,
        from: ItemStatus,
        to: ItemStatus,
        now: Instant,
    ) -> bool {
        let Some(stat) = self.raw.get_mut(&feed_id) else {
            tracing::debug!(feed_id, "No stats entry to patch");
            return false;
        };
        stat.adjust(from, -1);
        stat.adjust(to, 1);
        self.recompute.trigger((), now);
        true
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.recompute.deadline()
    }

    /// Run the debounced recompute if its quiet period has elapsed.
    pub fn poll(
        &mut self,
        now: Instant,
        feeds: &[Feed],
        folders: &[Folder],
        filter: Option<StatusFilter>,
    ) -> bool {
        if self.recompute.poll(now).is_none() {
            return false;
        }
        self.title = window_title(&self.base_title, &self.raw);
        self.recompute_now(feeds, folders, filter);
        true
    }

    /// Recompute filtered counts immediately (filter or feed-list change).
    pub fn recompute_now(
        &mut self,
        feeds: &[Feed],
        folders: &[Folder],
        filter: Option<StatusFilter>,
    ) {
        self.filtered = compute_filtered(feeds, folders, &self.raw, filter);
    }
}
