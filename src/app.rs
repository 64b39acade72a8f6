//! Application state and the transitions that drive it.
//!
//! `App` owns every piece of client state. Entry points mutate it and return
//! the [`Effect`]s the runtime must execute; completed network calls come back
//! as [`AppEvent`]s through [`App::handle_event`]. Nothing in this module
//! awaits, so every transition runs to completion on the loop task.

use std::borrow::Cow;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

use crate::api::{
    Feed, FeedChoice, FeedCreateOutcome, FeedId, FeedPatch, Folder, FolderId, FolderPatch,
    ItemDetail, ItemId, ItemPage, ItemQuery, ItemStatus, NewFeed, Scope, Settings,
    SettingsPatch, Status, StatusFilter,
};
use crate::pagination::{Completion, FetchKind, ItemList, PageRequest};
use crate::prefs::{AiField, Column, Preferences, Theme};
use crate::selection::{feed_navigation, step, ItemSelection};
use crate::stats::{FilteredStats, StatsEngine};
use crate::util::{
    close_to_bottom, scroll_into_view, Debounced, Direction, ScrollMetrics, TargetBox,
};

/// Status messages are shown for this long.
const STATUS_TTL: Duration = Duration::from_secs(3);

const NO_FEEDS_FOUND: &str = "No feeds found at the given url.";

// ============================================================================
// Tuning
// ============================================================================

/// Timing and layout constants, normally taken from the config file.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuning {
    pub base_title: String,
    pub status_poll: Duration,
    pub stats_debounce: Duration,
    pub width_debounce: Duration,
    pub search_debounce: Duration,
    pub bottom_space_px: f64,
    pub scroll_padding_px: f64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            base_title: "readn".to_string(),
            status_poll: Duration::from_millis(500),
            stats_debounce: Duration::from_millis(500),
            width_debounce: Duration::from_millis(1000),
            search_debounce: Duration::from_millis(500),
            bottom_space_px: 70.0,
            scroll_padding_px: 10.0,
        }
    }
}

// ============================================================================
// Effects
// ============================================================================

/// Requests to the rendering collaborator. The engine never touches layout
/// itself; it only says what should become visible.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewCommand {
    ScrollItemListToTop,
    ResetContentScroll,
    /// Bring an item row into view (see [`crate::util::scroll_into_view`]).
    RevealItem { item_id: ItemId, direction: Direction },
    RevealScope { scope: Scope, direction: Direction },
    /// The list changed; report fresh metrics via `on_item_list_layout`.
    MeasureItemList,
}

/// What a folder creation is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderIntent {
    Plain,
    /// Move this feed into the new folder once it exists.
    MoveFeed(FeedId),
}

/// Work the runtime performs on behalf of a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    WriteSettings(SettingsPatch),
    FetchItems(PageRequest),
    FetchItemDetail { item_id: ItemId, generation: u64 },
    UpdateItemStatus {
        item_id: ItemId,
        feed_id: FeedId,
        from: ItemStatus,
        to: ItemStatus,
    },
    /// `loop_mode` marks a poll tick rather than a one-off refresh.
    FetchStatus { loop_mode: bool },
    FetchFeedErrors,
    /// Folders and feeds together; `then_stats` chains a status refresh.
    FetchFeeds { then_stats: bool },
    MarkAllRead(ItemQuery),
    CreateFolder { title: String, intent: FolderIntent },
    UpdateFolder { id: FolderId, patch: FolderPatch },
    DeleteFolder(FolderId),
    CreateFeed(NewFeed),
    /// `reload` refetches feeds and stats afterwards instead of patching locally.
    UpdateFeed { id: FeedId, patch: FeedPatch, reload: bool },
    DeleteFeed(FeedId),
    RefreshAllFeeds,
    View(ViewCommand),
}

// ============================================================================
// Events
// ============================================================================

/// Results of effects, delivered back to the loop.
///
/// Errors are carried as display strings; they are only ever logged or shown.
#[derive(Debug)]
pub enum AppEvent {
    StatusLoaded {
        loop_mode: bool,
        result: Result<Status, String>,
    },
    FeedErrorsLoaded(Result<HashMap<FeedId, String>, String>),
    FeedsLoaded {
        then_stats: bool,
        result: Result<(Vec<Folder>, Vec<Feed>), String>,
    },
    /// A page of items. Fields:
    /// - `generation`: list generation when the fetch was issued
    /// - `kind`: whether the page replaces or extends the list
    ItemsLoaded {
        generation: u64,
        kind: FetchKind,
        result: Result<ItemPage, String>,
    },
    ItemDetailLoaded {
        generation: u64,
        result: Result<ItemDetail, String>,
    },
    ItemStatusUpdated {
        item_id: ItemId,
        feed_id: FeedId,
        from: ItemStatus,
        to: ItemStatus,
        result: Result<(), String>,
    },
    ItemsMarkedRead(Result<(), String>),
    SettingsWritten(Result<(), String>),
    FolderCreated {
        intent: FolderIntent,
        result: Result<Folder, String>,
    },
    FolderUpdated {
        id: FolderId,
        patch: FolderPatch,
        result: Result<(), String>,
    },
    FolderDeleted {
        id: FolderId,
        result: Result<(), String>,
    },
    FeedCreated(Result<FeedCreateOutcome, String>),
    FeedUpdated {
        id: FeedId,
        patch: FeedPatch,
        reload: bool,
        result: Result<(), String>,
    },
    FeedDeleted {
        id: FeedId,
        result: Result<(), String>,
    },
    FeedsRefreshStarted(Result<(), String>),
    /// A background task panicked.
    TaskPanicked { task: &'static str, error: String },
}

// ============================================================================
// Application State
// ============================================================================

pub struct App {
    pub folders: Vec<Folder>,
    pub feeds: Vec<Feed>,
    pub feed_errors: HashMap<FeedId, String>,
    pub prefs: Preferences,
    pub stats: StatsEngine,
    pub items: ItemList,
    pub selection: ItemSelection,

    search: String,
    search_debounce: Debounced<()>,

    /// Mirrors the server's `running` flag.
    pub loading_feeds: bool,
    pub loading_new_feed: bool,
    /// Candidates offered when a URL advertised several feeds.
    pub feed_choices: Vec<FeedChoice>,
    pub feed_choice_selected: Option<String>,

    item_list_layout: Option<ScrollMetrics>,
    poll_at: Option<Instant>,
    pub status_message: Option<(Cow<'static, str>, Instant)>,
    tuning: Tuning,
}

impl App {
    pub fn new(tuning: Tuning) -> Self {
        Self {
            folders: Vec::new(),
            feeds: Vec::new(),
            feed_errors: HashMap::new(),
            prefs: Preferences::new(tuning.width_debounce),
            stats: StatsEngine::new(tuning.base_title.clone(), tuning.stats_debounce),
            items: ItemList::new(),
            selection: ItemSelection::default(),
            search: String::new(),
            search_debounce: Debounced::new(tuning.search_debounce),
            loading_feeds: false,
            loading_new_feed: false,
            feed_choices: Vec::new(),
            feed_choice_selected: None,
            item_list_layout: None,
            poll_at: None,
            status_message: None,
            tuning,
        }
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    /// Seed preferences from the persisted set and issue the initial fetches.
    pub fn bootstrap(&mut self, settings: &Settings) -> Vec<Effect> {
        self.prefs.initialize_from(settings);
        let mut effects = vec![
            Effect::FetchStatus { loop_mode: false },
            Effect::FetchFeeds { then_stats: false },
        ];
        effects.extend(self.load_items());
        effects
    }

    // ========================================================================
    // Read-only views
    // ========================================================================

    pub fn scope(&self) -> Option<Scope> {
        self.prefs.scope()
    }

    pub fn filter(&self) -> Option<StatusFilter> {
        self.prefs.filter()
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn title(&self) -> &str {
        self.stats.title()
    }

    pub fn filtered_stats(&self) -> &FilteredStats {
        self.stats.filtered()
    }

    pub fn selected_item(&self) -> Option<ItemId> {
        self.selection.selected()
    }

    pub fn is_polling(&self) -> bool {
        self.poll_at.is_some()
    }

    pub fn feed(&self, id: FeedId) -> Option<&Feed> {
        self.feeds.iter().find(|f| f.id == id)
    }

    pub fn folder(&self, id: FolderId) -> Option<&Folder> {
        self.folders.iter().find(|f| f.id == id)
    }

    /// Current visible feed-list order.
    pub fn feed_navigation(&self) -> Vec<Scope> {
        feed_navigation(
            &self.folders,
            &self.feeds,
            self.stats.filtered(),
            self.filter(),
            self.scope(),
        )
    }

    /// The query for the current filter, scope, search and sort order.
    pub fn query(&self) -> ItemQuery {
        ItemQuery {
            scope: self.scope().unwrap_or(Scope::All),
            status: self.filter(),
            search: Some(self.search.trim())
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            oldest_first: !self.prefs.sort_newest_first(),
            after: None,
        }
    }

    // ========================================================================
    // Status messages
    // ========================================================================

    /// Set status message (will auto-expire after 3 seconds)
    pub fn set_status(&mut self, msg: impl Into<Cow<'static, str>>) {
        self.status_message = Some((msg.into(), Instant::now()));
    }

    /// Clear status message if expired. Returns true if one was cleared.
    pub fn clear_expired_status(&mut self) -> bool {
        if let Some((_, time)) = &self.status_message {
            if time.elapsed() >= STATUS_TTL {
                self.status_message = None;
                return true;
            }
        }
        false
    }

    fn report_failure(&mut self, what: &'static str, error: &str) {
        tracing::warn!(error = %error, "{} failed", what);
        self.set_status(format!("{} failed: {}", what, error));
    }

    // ========================================================================
    // Item list
    // ========================================================================

    /// Reload the list from the first page, or clear it when no scope is set.
    fn load_items(&mut self) -> Vec<Effect> {
        if self.scope().is_none() {
            self.items.clear();
            return Vec::new();
        }
        let request = self.items.begin_load(self.query());
        vec![Effect::FetchItems(request)]
    }

    fn near_bottom(&self) -> bool {
        self.item_list_layout
            .as_ref()
            .is_some_and(|m| close_to_bottom(m, self.tuning.bottom_space_px))
    }

    /// Request the next page if the list is near its bottom edge or the
    /// selected item is the last one loaded.
    fn maybe_load_more(&mut self) -> Vec<Effect> {
        if !self
            .items
            .should_load_more(self.selection.selected(), self.near_bottom())
        {
            return Vec::new();
        }
        let query = self.query();
        self.items
            .begin_load_more(query)
            .map(Effect::FetchItems)
            .into_iter()
            .collect()
    }

    /// Explicit "load more" (button or CLI paging).
    pub fn load_more(&mut self) -> Vec<Effect> {
        let query = self.query();
        self.items
            .begin_load_more(query)
            .map(Effect::FetchItems)
            .into_iter()
            .collect()
    }

    /// Fresh list metrics from the renderer, after a page was applied or the
    /// viewport changed.
    pub fn on_item_list_layout(&mut self, metrics: ScrollMetrics) -> Vec<Effect> {
        self.item_list_layout = Some(metrics);
        if self.items.should_load_more(None, self.near_bottom()) {
            return self.load_more();
        }
        Vec::new()
    }

    pub fn on_item_list_scroll(&mut self, metrics: ScrollMetrics) -> Vec<Effect> {
        self.item_list_layout = Some(metrics);
        self.maybe_load_more()
    }

    /// Set the search text without scheduling a reload (before bootstrap).
    pub fn seed_search(&mut self, text: impl Into<String>) {
        self.search = text.into();
    }

    /// Buffer search text; the reload happens after the quiet period.
    pub fn set_search(&mut self, text: impl Into<String>, now: Instant) {
        self.search = text.into();
        self.search_debounce.trigger((), now);
    }

    // ========================================================================
    // Scope, filter, sort
    // ========================================================================

    pub fn select_scope(&mut self, scope: Option<Scope>) -> Vec<Effect> {
        let Some(patch) = self.prefs.set_scope(scope) else {
            return Vec::new();
        };
        tracing::debug!(scope = ?scope, "Scope changed");
        let mut effects = vec![Effect::WriteSettings(patch)];
        effects.extend(self.load_items());
        self.selection.clear();
        effects.push(Effect::View(ViewCommand::ScrollItemListToTop));
        effects
    }

    pub fn set_filter(&mut self, filter: Option<StatusFilter>) -> Vec<Effect> {
        let Some(patch) = self.prefs.set_filter(filter) else {
            return Vec::new();
        };
        let mut effects = vec![Effect::WriteSettings(patch)];
        effects.extend(self.load_items());
        self.selection.clear();
        self.stats
            .recompute_now(&self.feeds, &self.folders, self.prefs.filter());
        effects
    }

    pub fn set_sort_newest_first(&mut self, newest_first: bool) -> Vec<Effect> {
        let Some(patch) = self.prefs.set_sort_newest_first(newest_first) else {
            return Vec::new();
        };
        let mut effects = vec![Effect::WriteSettings(patch)];
        effects.extend(self.load_items());
        effects
    }

    pub fn mark_all_read(&mut self) -> Vec<Effect> {
        if self.scope().is_none() {
            return Vec::new();
        }
        vec![Effect::MarkAllRead(self.query())]
    }

    // ========================================================================
    // Item selection
    // ========================================================================

    pub fn select_item(&mut self, id: Option<ItemId>) -> Vec<Effect> {
        match self.selection.select(id) {
            Some((item_id, generation)) => vec![
                Effect::FetchItemDetail {
                    item_id,
                    generation,
                },
                Effect::View(ViewCommand::ResetContentScroll),
            ],
            None => Vec::new(),
        }
    }

    fn item_status(&self, id: ItemId) -> Option<(FeedId, ItemStatus)> {
        self.items
            .get(id)
            .map(|item| (item.feed_id, item.status))
            .or_else(|| {
                self.selection
                    .detail()
                    .filter(|d| d.item.id == id)
                    .map(|d| (d.item.feed_id, d.item.status))
            })
    }

    /// Switch an item to `target`, or to `fallback` if it already is `target`.
    pub fn toggle_item_status(
        &mut self,
        item_id: ItemId,
        target: ItemStatus,
        fallback: ItemStatus,
    ) -> Vec<Effect> {
        let Some((feed_id, from)) = self.item_status(item_id) else {
            tracing::debug!(item_id, "Toggle on unknown item ignored");
            return Vec::new();
        };
        let to = if from != target { target } else { fallback };
        vec![Effect::UpdateItemStatus {
            item_id,
            feed_id,
            from,
            to,
        }]
    }

    pub fn toggle_starred(&mut self, item_id: ItemId) -> Vec<Effect> {
        self.toggle_item_status(item_id, ItemStatus::Starred, ItemStatus::Read)
    }

    pub fn toggle_read(&mut self, item_id: ItemId) -> Vec<Effect> {
        self.toggle_item_status(item_id, ItemStatus::Unread, ItemStatus::Read)
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    pub fn navigate_to_item(&mut self, delta: isize) -> Vec<Effect> {
        let ids = self.items.ids();
        let Some(target) = step(&ids, self.selection.selected(), delta) else {
            return Vec::new();
        };
        let direction = if delta < 0 { Direction::Up } else { Direction::Down };
        let mut effects = self.select_item(Some(target));
        effects.push(Effect::View(ViewCommand::RevealItem {
            item_id: target,
            direction,
        }));
        effects.extend(self.maybe_load_more());
        effects
    }

    pub fn navigate_to_feed(&mut self, delta: isize) -> Vec<Effect> {
        let seq = self.feed_navigation();
        let Some(target) = step(&seq, self.scope(), delta) else {
            return Vec::new();
        };
        let direction = if delta < 0 { Direction::Up } else { Direction::Down };
        let mut effects = self.select_scope(Some(target));
        effects.push(Effect::View(ViewCommand::RevealScope {
            scope: target,
            direction,
        }));
        effects
    }

    /// Scroll offset answering a `Reveal*` view command, using the
    /// configured padding. `None` when the target is already visible.
    pub fn reveal(
        &self,
        target: TargetBox,
        scroll_top: f64,
        viewport_height: f64,
        direction: Direction,
    ) -> Option<f64> {
        scroll_into_view(
            target,
            scroll_top,
            viewport_height,
            self.tuning.scroll_padding_px,
            direction,
        )
    }

    // ========================================================================
    // Statistics and polling
    // ========================================================================

    pub fn refresh_stats(&mut self) -> Vec<Effect> {
        vec![Effect::FetchStatus { loop_mode: false }]
    }

    /// Ask the server to crawl every feed. Ignored while a crawl is running.
    pub fn fetch_all_feeds(&mut self) -> Vec<Effect> {
        if self.loading_feeds {
            tracing::debug!("Feed refresh already running");
            return Vec::new();
        }
        vec![Effect::RefreshAllFeeds]
    }

    // ========================================================================
    // Feeds and folders
    // ========================================================================

    pub fn refresh_feeds(&mut self) -> Vec<Effect> {
        vec![Effect::FetchFeeds { then_stats: false }]
    }

    pub fn create_folder(&mut self, title: &str) -> Vec<Effect> {
        let title = title.trim();
        if title.is_empty() {
            return Vec::new();
        }
        vec![Effect::CreateFolder {
            title: title.to_string(),
            intent: FolderIntent::Plain,
        }]
    }

    pub fn rename_folder(&mut self, id: FolderId, title: &str) -> Vec<Effect> {
        let title = title.trim();
        if title.is_empty() {
            return Vec::new();
        }
        vec![Effect::UpdateFolder {
            id,
            patch: FolderPatch {
                title: Some(title.to_string()),
                ..Default::default()
            },
        }]
    }

    /// Flip the expansion flag locally and persist it.
    pub fn toggle_folder_expanded(&mut self, id: FolderId) -> Vec<Effect> {
        let Some(folder) = self.folders.iter_mut().find(|f| f.id == id) else {
            return Vec::new();
        };
        folder.is_expanded = !folder.is_expanded;
        vec![Effect::UpdateFolder {
            id,
            patch: FolderPatch {
                is_expanded: Some(folder.is_expanded),
                ..Default::default()
            },
        }]
    }

    pub fn delete_folder(&mut self, id: FolderId) -> Vec<Effect> {
        vec![Effect::DeleteFolder(id)]
    }

    pub fn delete_feed(&mut self, id: FeedId) -> Vec<Effect> {
        vec![Effect::DeleteFeed(id)]
    }

    pub fn move_feed(&mut self, feed_id: FeedId, folder_id: Option<FolderId>) -> Vec<Effect> {
        vec![Effect::UpdateFeed {
            id: feed_id,
            patch: FeedPatch {
                folder_id: Some(folder_id),
                ..Default::default()
            },
            reload: false,
        }]
    }

    pub fn move_feed_to_new_folder(&mut self, feed_id: FeedId, title: &str) -> Vec<Effect> {
        let title = title.trim();
        if title.is_empty() {
            return Vec::new();
        }
        vec![Effect::CreateFolder {
            title: title.to_string(),
            intent: FolderIntent::MoveFeed(feed_id),
        }]
    }

    pub fn rename_feed(&mut self, id: FeedId, title: &str) -> Vec<Effect> {
        let title = title.trim();
        if title.is_empty() {
            return Vec::new();
        }
        vec![Effect::UpdateFeed {
            id,
            patch: FeedPatch {
                title: Some(title.to_string()),
                ..Default::default()
            },
            reload: false,
        }]
    }

    pub fn update_feed_link(&mut self, id: FeedId, link: &str) -> Vec<Effect> {
        let link = link.trim();
        if link.is_empty() {
            return Vec::new();
        }
        vec![Effect::UpdateFeed {
            id,
            patch: FeedPatch {
                feed_link: Some(link.to_string()),
                ..Default::default()
            },
            reload: false,
        }]
    }

    /// Subscribe to `url`, or to the chosen candidate after a `Multiple` reply.
    pub fn create_feed(&mut self, url: &str, folder_id: Option<FolderId>) -> Vec<Effect> {
        let url = match &self.feed_choice_selected {
            Some(choice) => choice.clone(),
            None => url.trim().to_string(),
        };
        if url.is_empty() {
            return Vec::new();
        }
        self.loading_new_feed = true;
        vec![Effect::CreateFeed(NewFeed { url, folder_id })]
    }

    pub fn choose_feed(&mut self, url: &str) {
        if self.feed_choices.iter().any(|c| c.url == url) {
            self.feed_choice_selected = Some(url.to_string());
        }
    }

    pub fn reset_feed_choice(&mut self) {
        self.feed_choices.clear();
        self.feed_choice_selected = None;
    }

    // ========================================================================
    // Appearance and other preferences
    // ========================================================================

    /// Drag-resize of a column. The write-back is debounced.
    pub fn resize(&mut self, column: Column, width: u32, now: Instant) -> u32 {
        self.prefs.resize(column, width, now)
    }

    pub fn set_theme(&mut self, theme: Theme) -> Vec<Effect> {
        self.prefs
            .set_theme(theme)
            .map(Effect::WriteSettings)
            .into_iter()
            .collect()
    }

    pub fn incr_font(&mut self, steps: i32) -> Vec<Effect> {
        self.prefs
            .incr_font(steps)
            .map(Effect::WriteSettings)
            .into_iter()
            .collect()
    }

    pub fn toggle_sidebar(&mut self) -> Vec<Effect> {
        let collapsed = !self.prefs.sidebar_collapsed();
        self.prefs
            .set_sidebar_collapsed(collapsed)
            .map(Effect::WriteSettings)
            .into_iter()
            .collect()
    }

    pub fn set_refresh_rate(&mut self, rate: Option<u32>) -> Vec<Effect> {
        self.prefs
            .set_refresh_rate(rate)
            .map(Effect::WriteSettings)
            .into_iter()
            .collect()
    }

    pub fn update_ai(&mut self, field: AiField, value: String) -> Vec<Effect> {
        vec![Effect::WriteSettings(self.prefs.update_ai(field, value))]
    }

    // ========================================================================
    // Timers
    // ========================================================================

    /// Fire every debounced action and poll whose time has come.
    pub fn tick(&mut self, now: Instant) -> Vec<Effect> {
        let mut effects: Vec<Effect> = self
            .prefs
            .poll_due(now)
            .into_iter()
            .map(Effect::WriteSettings)
            .collect();

        let filter = self.prefs.filter();
        if self.stats.poll(now, &self.feeds, &self.folders, filter) {
            tracing::trace!(title = %self.stats.title(), "Statistics recomputed");
        }

        if self.search_debounce.poll(now).is_some() {
            tracing::debug!(search = %self.search, "Search settled");
            effects.extend(self.load_items());
        }

        if self.poll_at.is_some_and(|at| at <= now) {
            self.poll_at = None;
            effects.push(Effect::FetchStatus { loop_mode: true });
        }

        self.clear_expired_status();
        effects
    }

    /// The earliest instant at which [`tick`](Self::tick) has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        [
            self.prefs.next_deadline(),
            self.stats.deadline(),
            self.search_debounce.deadline(),
            self.poll_at,
        ]
        .into_iter()
        .flatten()
        .min()
    }

    // ========================================================================
    // Event handling
    // ========================================================================

    pub fn handle_event(&mut self, event: AppEvent, now: Instant) -> Vec<Effect> {
        match event {
            AppEvent::StatusLoaded { loop_mode, result } => match result {
                Ok(status) => self.on_status(loop_mode, status, now),
                Err(e) => {
                    // The poll chain ends here; a later refresh may start it again.
                    self.loading_feeds = false;
                    self.report_failure("Status refresh", &e);
                    Vec::new()
                }
            },

            AppEvent::FeedErrorsLoaded(result) => {
                match result {
                    Ok(errors) => self.feed_errors = errors,
                    Err(e) => tracing::warn!(error = %e, "Failed to load feed errors"),
                }
                Vec::new()
            }

            AppEvent::FeedsLoaded { then_stats, result } => match result {
                Ok((folders, feeds)) => {
                    tracing::debug!(folders = folders.len(), feeds = feeds.len(), "Feeds loaded");
                    self.folders = folders;
                    self.feeds = feeds;
                    self.stats
                        .recompute_now(&self.feeds, &self.folders, self.prefs.filter());
                    if then_stats {
                        self.refresh_stats()
                    } else {
                        Vec::new()
                    }
                }
                Err(e) => {
                    self.report_failure("Loading feeds", &e);
                    Vec::new()
                }
            },

            AppEvent::ItemsLoaded {
                generation,
                kind,
                result,
            } => match result {
                Ok(page) => match self.items.complete(generation, kind, page) {
                    Completion::Applied { appended } => {
                        tracing::debug!(generation, appended, has_more = self.items.has_more(), "Item page applied");
                        vec![Effect::View(ViewCommand::MeasureItemList)]
                    }
                    Completion::Stale => Vec::new(),
                },
                Err(e) => {
                    if self.items.fail(generation, kind) {
                        self.report_failure("Loading items", &e);
                    } else {
                        tracing::debug!(generation, error = %e, "Stale item fetch failed");
                    }
                    Vec::new()
                }
            },

            AppEvent::ItemDetailLoaded { generation, result } => match result {
                Ok(detail) => {
                    let (item_id, feed_id, status) =
                        (detail.item.id, detail.item.feed_id, detail.item.status);
                    if !self.selection.apply_detail(generation, detail) {
                        return Vec::new();
                    }
                    if status == ItemStatus::Unread {
                        vec![Effect::UpdateItemStatus {
                            item_id,
                            feed_id,
                            from: ItemStatus::Unread,
                            to: ItemStatus::Read,
                        }]
                    } else {
                        Vec::new()
                    }
                }
                Err(e) => {
                    if generation == self.selection.generation() {
                        self.report_failure("Loading item", &e);
                    }
                    Vec::new()
                }
            },

            AppEvent::ItemStatusUpdated {
                item_id,
                feed_id,
                from,
                to,
                result,
            } => {
                match result {
                    Ok(()) => {
                        // Overlapping updates for one item count once.
                        let current = self.item_status(item_id).map(|(_, status)| status);
                        if current.map_or(true, |status| status == from) {
                            self.stats.apply_status_change(feed_id, from, to, now);
                        } else {
                            tracing::debug!(item_id, ?from, ?to, ?current, "Status already changed locally");
                        }
                        self.items.set_status(item_id, to);
                        self.selection.set_status(item_id, to);
                    }
                    Err(e) => self.report_failure("Updating item", &e),
                }
                Vec::new()
            }

            AppEvent::ItemsMarkedRead(result) => match result {
                Ok(()) => {
                    self.items.clear();
                    self.selection.clear();
                    self.refresh_stats()
                }
                Err(e) => {
                    self.report_failure("Marking items read", &e);
                    Vec::new()
                }
            },

            AppEvent::SettingsWritten(result) => {
                if let Err(e) = result {
                    self.report_failure("Saving settings", &e);
                }
                Vec::new()
            }

            AppEvent::FolderCreated { intent, result } => match result {
                Ok(folder) => match intent {
                    FolderIntent::Plain => self.refresh_feeds(),
                    FolderIntent::MoveFeed(feed_id) => vec![Effect::UpdateFeed {
                        id: feed_id,
                        patch: FeedPatch {
                            folder_id: Some(Some(folder.id)),
                            ..Default::default()
                        },
                        reload: true,
                    }],
                },
                Err(e) => {
                    self.report_failure("Creating folder", &e);
                    Vec::new()
                }
            },

            AppEvent::FolderUpdated { id, patch, result } => {
                match result {
                    Ok(()) => self.apply_folder_patch(id, patch),
                    Err(e) => self.report_failure("Updating folder", &e),
                }
                Vec::new()
            }

            AppEvent::FolderDeleted { id, result } | AppEvent::FeedDeleted { id, result } => {
                match result {
                    Ok(()) => {
                        tracing::info!(id, "Deleted");
                        let mut effects = self.select_scope(None);
                        effects.push(Effect::FetchStatus { loop_mode: false });
                        effects.push(Effect::FetchFeeds { then_stats: false });
                        effects
                    }
                    Err(e) => {
                        self.report_failure("Deleting", &e);
                        Vec::new()
                    }
                }
            }

            AppEvent::FeedCreated(result) => {
                self.loading_new_feed = false;
                match result {
                    Ok(FeedCreateOutcome::Success(feed)) => {
                        tracing::info!(feed_id = feed.id, title = %feed.title, "Subscribed");
                        self.reset_feed_choice();
                        let mut effects = vec![
                            Effect::FetchFeeds { then_stats: false },
                            Effect::FetchStatus { loop_mode: false },
                        ];
                        effects.extend(self.select_scope(Some(Scope::Feed(feed.id))));
                        effects
                    }
                    Ok(FeedCreateOutcome::Multiple(choices)) => {
                        self.feed_choice_selected = choices.first().map(|c| c.url.clone());
                        self.feed_choices = choices;
                        Vec::new()
                    }
                    Ok(FeedCreateOutcome::NotFound) => {
                        self.set_status(NO_FEEDS_FOUND);
                        Vec::new()
                    }
                    Err(e) => {
                        self.report_failure("Adding feed", &e);
                        Vec::new()
                    }
                }
            }

            AppEvent::FeedUpdated {
                id,
                patch,
                reload,
                result,
            } => match result {
                Ok(()) if reload => vec![Effect::FetchFeeds { then_stats: true }],
                Ok(()) => {
                    let moved = patch.folder_id.is_some();
                    self.apply_feed_patch(id, patch);
                    if moved {
                        self.stats
                            .recompute_now(&self.feeds, &self.folders, self.prefs.filter());
                        self.refresh_stats()
                    } else {
                        Vec::new()
                    }
                }
                Err(e) => {
                    self.report_failure("Updating feed", &e);
                    Vec::new()
                }
            },

            AppEvent::FeedsRefreshStarted(result) => match result {
                Ok(()) => self.refresh_stats(),
                Err(e) => {
                    self.report_failure("Refreshing feeds", &e);
                    Vec::new()
                }
            },

            AppEvent::TaskPanicked { task, error } => {
                tracing::error!(task, error = %error, "Background task panicked");
                self.set_status(format!("Internal error in {}: {}", task, error));
                Vec::new()
            }
        }
    }

    fn on_status(&mut self, loop_mode: bool, status: Status, now: Instant) -> Vec<Effect> {
        let mut effects = Vec::new();
        if loop_mode && self.selection.selected().is_none() {
            effects.extend(self.load_items());
        }

        self.loading_feeds = status.running;
        self.poll_at = status.running.then(|| now + self.tuning.status_poll);
        tracing::debug!(running = status.running, feeds = status.stats.len(), loop_mode, "Status refreshed");

        self.stats.replace(status.stats, now);
        effects.push(Effect::FetchFeedErrors);
        effects
    }

    fn apply_folder_patch(&mut self, id: FolderId, patch: FolderPatch) {
        let Some(folder) = self.folders.iter_mut().find(|f| f.id == id) else {
            return;
        };
        if let Some(expanded) = patch.is_expanded {
            folder.is_expanded = expanded;
        }
        if let Some(title) = patch.title {
            folder.title = title;
            self.folders
                .sort_by_cached_key(|f| f.title.to_lowercase());
        }
    }

    fn apply_feed_patch(&mut self, id: FeedId, patch: FeedPatch) {
        let Some(feed) = self.feeds.iter_mut().find(|f| f.id == id) else {
            return;
        };
        if let Some(title) = patch.title {
            feed.title = title;
        }
        if let Some(link) = patch.feed_link {
            feed.feed_link = link;
        }
        if let Some(folder_id) = patch.folder_id {
            feed.folder_id = folder_id;
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
