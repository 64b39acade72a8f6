//! In-memory feed server shared by the integration tests.
//!
//! Implements [`RemoteApi`] over a mutex-guarded store. Item pages honor the
//! sort direction and the exclusive `after` cursor the way the real server
//! does, and every call is recorded so tests can assert on traffic.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use readn::api::{
    ApiError, ApiResult, Feed, FeedChoice, FeedCreateOutcome, FeedId, FeedPatch, FeedStat, Folder,
    FolderId, FolderPatch, Item, ItemDetail, ItemId, ItemPage, ItemQuery, ItemStatus, NewFeed,
    RemoteApi, Scope, Settings, SettingsPatch, Status, StatusFilter,
};
use readn::app::{App, Tuning};
use readn::runtime::Controller;

pub const PAGE_SIZE: usize = 20;

#[derive(Default)]
pub struct Store {
    pub folders: Vec<Folder>,
    pub feeds: Vec<Feed>,
    pub items: Vec<Item>,
    pub feed_errors: HashMap<FeedId, String>,
    pub settings: Settings,
    pub page_size: usize,
    /// Number of upcoming status replies that report a running crawl.
    pub running_replies: usize,
    /// Artificial latency of `list_items`, per scope.
    pub delays: HashMap<Scope, Duration>,
    pub fail_item_updates: bool,
    pub next_id: i64,

    pub item_queries: Vec<ItemQuery>,
    pub settings_writes: Vec<SettingsPatch>,
    pub status_calls: usize,
    pub refresh_calls: usize,
}

impl Store {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn stats(&self) -> Vec<FeedStat> {
        self.feeds
            .iter()
            .map(|feed| {
                let mut stat = FeedStat {
                    feed_id: feed.id,
                    ..Default::default()
                };
                for item in self.items.iter().filter(|i| i.feed_id == feed.id) {
                    stat.total += 1;
                    stat.adjust(item.status, 1);
                }
                stat
            })
            .collect()
    }

    pub fn stat(&self, feed_id: FeedId) -> FeedStat {
        self.stats()
            .into_iter()
            .find(|s| s.feed_id == feed_id)
            .unwrap_or_default()
    }

    fn matches(&self, query: &ItemQuery, item: &Item) -> bool {
        let in_scope = match query.scope {
            Scope::All => true,
            Scope::Feed(id) => item.feed_id == id,
            Scope::Folder(folder) => self
                .feeds
                .iter()
                .any(|f| f.id == item.feed_id && f.folder_id == folder),
        };
        let status_ok = match query.status {
            None => true,
            Some(StatusFilter::Unread) => item.status == ItemStatus::Unread,
            Some(StatusFilter::Starred) => item.status == ItemStatus::Starred,
        };
        let search_ok = query
            .search
            .as_deref()
            .map_or(true, |s| item.title.contains(s));
        in_scope && status_ok && search_ok
    }

    /// Every item the query selects, in its sort order, ignoring the cursor.
    pub fn matching(&self, query: &ItemQuery) -> Vec<Item> {
        let mut items: Vec<Item> = self
            .items
            .iter()
            .filter(|i| self.matches(query, i))
            .cloned()
            .collect();
        items.sort_by_key(|i| i.id);
        if !query.oldest_first {
            items.reverse();
        }
        items
    }

    pub fn page(&self, query: &ItemQuery) -> ItemPage {
        let rest: Vec<Item> = self
            .matching(query)
            .into_iter()
            .filter(|i| match query.after {
                None => true,
                Some(after) if query.oldest_first => i.id > after,
                Some(after) => i.id < after,
            })
            .collect();
        ItemPage {
            has_more: rest.len() > self.page_size,
            list: rest.into_iter().take(self.page_size).collect(),
        }
    }

    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.items.iter().find(|i| i.id == id)
    }
}

#[derive(Clone, Default)]
pub struct FakeApi {
    store: Arc<Mutex<Store>>,
}

impl FakeApi {
    /// Two folders ("News" expanded, "Tech" collapsed), four feeds and
    /// `item_count` items spread round-robin over the feeds.
    ///
    /// Item `i` is starred when divisible by 5, read when even, unread
    /// otherwise.
    pub fn with_items(item_count: i64) -> Self {
        let folders = vec![
            Folder {
                id: 1,
                title: "News".to_string(),
                is_expanded: true,
            },
            Folder {
                id: 2,
                title: "Tech".to_string(),
                is_expanded: false,
            },
        ];
        let feeds = vec![
            feed(10, Some(1)),
            feed(11, Some(1)),
            feed(20, Some(2)),
            feed(30, None),
        ];
        let items = (1..=item_count)
            .map(|i| Item {
                id: i,
                feed_id: feeds[(i as usize) % feeds.len()].id,
                title: format!("Item {}", i),
                link: Some(format!("https://example.com/items/{}", i)),
                date: None,
                status: if i % 5 == 0 {
                    ItemStatus::Starred
                } else if i % 2 == 0 {
                    ItemStatus::Read
                } else {
                    ItemStatus::Unread
                },
            })
            .collect();

        let store = Store {
            folders,
            feeds,
            items,
            page_size: PAGE_SIZE,
            next_id: 1000,
            ..Default::default()
        };
        Self {
            store: Arc::new(Mutex::new(store)),
        }
    }

    pub fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap()
    }
}

pub fn feed(id: FeedId, folder_id: Option<FolderId>) -> Feed {
    Feed {
        id,
        folder_id,
        title: format!("Feed {}", id),
        description: None,
        link: Some(format!("https://example.com/{}", id)),
        feed_link: format!("https://example.com/{}/feed.xml", id),
        has_icon: false,
    }
}

/// Settings with every guarded field persisted, scoped to `scope`.
pub fn settings(scope: Option<Scope>, filter: Option<StatusFilter>) -> Settings {
    Settings {
        filter,
        feed: scope,
        sort_newest_first: Some(true),
        feed_list_width: Some(300),
        item_list_width: Some(300),
        theme_name: Some("light".to_string()),
        theme_font: Some(String::new()),
        theme_size: Some(1.0),
        sidebar_collapsed: Some(false),
        ..Default::default()
    }
}

/// A controller over `api`, bootstrapped from `settings` and settled.
pub async fn started(api: &FakeApi, settings: &Settings) -> Controller<FakeApi> {
    let mut controller = Controller::new(api.clone(), App::new(Tuning::default()));
    controller.act(|app, _| app.bootstrap(settings));
    controller.settle().await;
    controller
}

impl RemoteApi for FakeApi {
    async fn status(&self) -> ApiResult<Status> {
        let mut store = self.store();
        store.status_calls += 1;
        let running = store.running_replies > 0;
        store.running_replies = store.running_replies.saturating_sub(1);
        Ok(Status {
            running,
            stats: store.stats(),
        })
    }

    async fn list_folders(&self) -> ApiResult<Vec<Folder>> {
        let mut folders = self.store().folders.clone();
        folders.sort_by_cached_key(|f| f.title.to_lowercase());
        Ok(folders)
    }

    async fn create_folder(&self, title: &str) -> ApiResult<Folder> {
        let mut store = self.store();
        let folder = Folder {
            id: store.next_id(),
            title: title.to_string(),
            is_expanded: true,
        };
        store.folders.push(folder.clone());
        Ok(folder)
    }

    async fn update_folder(&self, id: FolderId, patch: &FolderPatch) -> ApiResult<()> {
        let mut store = self.store();
        let folder = store
            .folders
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or(ApiError::HttpStatus(404))?;
        if let Some(title) = &patch.title {
            folder.title = title.clone();
        }
        if let Some(expanded) = patch.is_expanded {
            folder.is_expanded = expanded;
        }
        Ok(())
    }

    async fn delete_folder(&self, id: FolderId) -> ApiResult<()> {
        let mut store = self.store();
        store.folders.retain(|f| f.id != id);
        for feed in store.feeds.iter_mut().filter(|f| f.folder_id == Some(id)) {
            feed.folder_id = None;
        }
        Ok(())
    }

    async fn list_feeds(&self) -> ApiResult<Vec<Feed>> {
        Ok(self.store().feeds.clone())
    }

    async fn create_feed(&self, new: &NewFeed) -> ApiResult<FeedCreateOutcome> {
        if new.url.contains("missing") {
            return Ok(FeedCreateOutcome::NotFound);
        }
        if new.url.contains("multi") && !new.url.ends_with(".xml") {
            return Ok(FeedCreateOutcome::Multiple(vec![
                FeedChoice {
                    url: format!("{}/atom.xml", new.url),
                    title: "Atom".to_string(),
                },
                FeedChoice {
                    url: format!("{}/rss.xml", new.url),
                    title: "RSS".to_string(),
                },
            ]));
        }
        let mut store = self.store();
        let created = Feed {
            id: store.next_id(),
            folder_id: new.folder_id,
            title: new.url.clone(),
            description: None,
            link: None,
            feed_link: new.url.clone(),
            has_icon: false,
        };
        store.feeds.push(created.clone());
        Ok(FeedCreateOutcome::Success(created))
    }

    async fn update_feed(&self, id: FeedId, patch: &FeedPatch) -> ApiResult<()> {
        let mut store = self.store();
        let feed = store
            .feeds
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or(ApiError::HttpStatus(404))?;
        if let Some(title) = &patch.title {
            feed.title = title.clone();
        }
        if let Some(link) = &patch.feed_link {
            feed.feed_link = link.clone();
        }
        if let Some(folder_id) = patch.folder_id {
            feed.folder_id = folder_id;
        }
        Ok(())
    }

    async fn delete_feed(&self, id: FeedId) -> ApiResult<()> {
        let mut store = self.store();
        store.feeds.retain(|f| f.id != id);
        store.items.retain(|i| i.feed_id != id);
        Ok(())
    }

    async fn refresh_feeds(&self) -> ApiResult<()> {
        self.store().refresh_calls += 1;
        Ok(())
    }

    async fn list_feed_errors(&self) -> ApiResult<HashMap<FeedId, String>> {
        Ok(self.store().feed_errors.clone())
    }

    async fn list_items(&self, query: &ItemQuery) -> ApiResult<ItemPage> {
        let (page, delay) = {
            let mut store = self.store();
            store.item_queries.push(query.clone());
            (store.page(query), store.delays.get(&query.scope).copied())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(page)
    }

    async fn get_item(&self, id: ItemId) -> ApiResult<ItemDetail> {
        let store = self.store();
        let item = store.item(id).cloned().ok_or(ApiError::HttpStatus(404))?;
        Ok(ItemDetail {
            content: Some(format!("<p>{}</p>", item.title)),
            item,
            media_links: Vec::new(),
        })
    }

    async fn update_item(&self, id: ItemId, status: ItemStatus) -> ApiResult<()> {
        let mut store = self.store();
        if store.fail_item_updates {
            return Err(ApiError::HttpStatus(500));
        }
        let item = store
            .items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(ApiError::HttpStatus(404))?;
        item.status = status;
        Ok(())
    }

    async fn mark_read(&self, query: &ItemQuery) -> ApiResult<()> {
        let mut store = self.store();
        let unread: Vec<ItemId> = store
            .matching(query)
            .into_iter()
            .filter(|i| i.status == ItemStatus::Unread)
            .map(|i| i.id)
            .collect();
        for item in store.items.iter_mut().filter(|i| unread.contains(&i.id)) {
            item.status = ItemStatus::Read;
        }
        Ok(())
    }

    async fn settings(&self) -> ApiResult<Settings> {
        Ok(self.store().settings.clone())
    }

    async fn update_settings(&self, patch: &SettingsPatch) -> ApiResult<()> {
        self.store().settings_writes.push(patch.clone());
        Ok(())
    }
}
