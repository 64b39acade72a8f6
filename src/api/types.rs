use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Identifiers
// ============================================================================

pub type FolderId = i64;
pub type FeedId = i64;
pub type ItemId = i64;

// ============================================================================
// Folders and Feeds
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: FolderId,
    pub title: String,
    #[serde(default)]
    pub is_expanded: bool,
}

/// Feed as cached on the client. `folder_id = None` means "unfiled".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    pub id: FeedId,
    #[serde(default)]
    pub folder_id: Option<FolderId>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Display link (the site, not the feed document).
    #[serde(default)]
    pub link: Option<String>,
    pub feed_link: String,
    #[serde(default)]
    pub has_icon: bool,
}

/// Partial update for a folder. Absent fields are left unchanged server-side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FolderPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_expanded: Option<bool>,
}

/// Partial update for a feed.
///
/// `folder_id: Some(None)` serializes as an explicit `null` (move to "no folder").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeedPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<Option<FolderId>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewFeed {
    pub url: String,
    pub folder_id: Option<FolderId>,
}

/// One candidate when a URL advertises several feeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedChoice {
    pub url: String,
    #[serde(default)]
    pub title: String,
}

/// Result of `feeds.create`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedCreateOutcome {
    Success(Feed),
    Multiple(Vec<FeedChoice>),
    NotFound,
}

// ============================================================================
// Item Status and Filters
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Unread,
    Read,
    Starred,
}

impl ItemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Unread => "unread",
            ItemStatus::Read => "read",
            ItemStatus::Starred => "starred",
        }
    }
}

/// The status facet narrowing the item list and driving filtered stats.
///
/// On the wire the "no filter" state is the empty string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusFilter {
    Unread,
    Starred,
}

impl StatusFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusFilter::Unread => "unread",
            StatusFilter::Starred => "starred",
        }
    }

    pub fn from_str_name(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "unread" => Some(StatusFilter::Unread),
            "starred" => Some(StatusFilter::Starred),
            _ => None,
        }
    }
}

/// (De)serializes `Option<StatusFilter>` as `""` / `"unread"` / `"starred"`.
pub(crate) mod filter_wire {
    use super::StatusFilter;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<StatusFilter>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(value.map_or("", StatusFilter::as_str))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<StatusFilter>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(StatusFilter::from_str_name))
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Per-feed counters as reported by `status()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedStat {
    pub feed_id: FeedId,
    #[serde(default)]
    pub unread: i64,
    #[serde(default)]
    pub starred: i64,
    #[serde(default)]
    pub total: i64,
}

impl FeedStat {
    pub fn count(&self, filter: StatusFilter) -> i64 {
        match filter {
            StatusFilter::Unread => self.unread,
            StatusFilter::Starred => self.starred,
        }
    }

    /// Adjust the counter that tracks `status`. `read` has no counter.
    pub fn adjust(&mut self, status: ItemStatus, delta: i64) {
        match status {
            ItemStatus::Unread => self.unread += delta,
            ItemStatus::Starred => self.starred += delta,
            ItemStatus::Read => {}
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Status {
    /// Older servers report the number of running crawl jobs instead of a flag.
    #[serde(deserialize_with = "flag_or_count", default)]
    pub running: bool,
    #[serde(default)]
    pub stats: Vec<FeedStat>,
}

fn flag_or_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Flag(bool),
        Count(i64),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Flag(flag) => flag,
        Raw::Count(n) => n > 0,
    })
}

// ============================================================================
// Items
// ============================================================================

/// Item row as delivered in list pages (no content).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub feed_id: FeedId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    pub status: ItemStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Audio,
    Video,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaLink {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    #[serde(default)]
    pub description: Option<String>,
}

/// Full item, fetched lazily when an item is selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDetail {
    #[serde(flatten)]
    pub item: Item,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub media_links: Vec<MediaLink>,
}

impl ItemDetail {
    pub fn media(&self, kind: MediaKind) -> impl Iterator<Item = &MediaLink> {
        self.media_links.iter().filter(move |m| m.kind == kind)
    }

    pub fn images(&self) -> impl Iterator<Item = &MediaLink> {
        self.media(MediaKind::Image)
    }

    pub fn audios(&self) -> impl Iterator<Item = &MediaLink> {
        self.media(MediaKind::Audio)
    }

    pub fn videos(&self) -> impl Iterator<Item = &MediaLink> {
        self.media(MediaKind::Video)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ItemPage {
    #[serde(default)]
    pub list: Vec<Item>,
    #[serde(default)]
    pub has_more: bool,
}

// ============================================================================
// Scope
// ============================================================================

/// Feed-or-folder narrowing of the item list.
///
/// Wire form: `""` (all items), `"feed:<id>"`, `"folder:<id>"`, `"folder:null"`
/// (items whose feed has no folder). "No scope" is `Option::<Scope>::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    All,
    Feed(FeedId),
    Folder(Option<FolderId>),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::All => Ok(()),
            Scope::Feed(id) => write!(f, "feed:{}", id),
            Scope::Folder(Some(id)) => write!(f, "folder:{}", id),
            Scope::Folder(None) => f.write_str("folder:null"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid scope: {0:?}")]
pub struct ParseScopeError(pub String);

impl FromStr for Scope {
    type Err = ParseScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Scope::All);
        }
        let err = || ParseScopeError(s.to_string());
        let (kind, id) = s.split_once(':').ok_or_else(err)?;
        match kind {
            "feed" => id.parse().map(Scope::Feed).map_err(|_| err()),
            "folder" if id == "null" => Ok(Scope::Folder(None)),
            "folder" => id.parse().map(|id| Scope::Folder(Some(id))).map_err(|_| err()),
            _ => Err(err()),
        }
    }
}

impl Serialize for Scope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Scope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Item Query
// ============================================================================

/// Derived query for `items.list` / `items.mark_read`. Never stored; rebuilt
/// from filter, scope, search, sort order and cursor on every fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemQuery {
    pub scope: Scope,
    pub status: Option<StatusFilter>,
    pub search: Option<String>,
    pub oldest_first: bool,
    pub after: Option<ItemId>,
}

impl ItemQuery {
    pub fn feed_id(&self) -> Option<FeedId> {
        match self.scope {
            Scope::Feed(id) => Some(id),
            _ => None,
        }
    }

    /// `Some(None)` selects items without a folder.
    pub fn folder_id(&self) -> Option<Option<FolderId>> {
        match self.scope {
            Scope::Folder(id) => Some(id),
            _ => None,
        }
    }

    /// Copy of this query positioned after `cursor`.
    pub fn after(&self, cursor: ItemId) -> Self {
        Self {
            after: Some(cursor),
            ..self.clone()
        }
    }

    /// Query-string pairs in the server's parameter names.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(id) = self.feed_id() {
            params.push(("feed_id", id.to_string()));
        }
        if let Some(folder) = self.folder_id() {
            let value = folder.map_or_else(|| "null".to_string(), |id| id.to_string());
            params.push(("folder_id", value));
        }
        if let Some(status) = self.status {
            params.push(("status", status.as_str().to_string()));
        }
        if let Some(search) = &self.search {
            params.push(("search", search.clone()));
        }
        if self.oldest_first {
            params.push(("oldest_first", "true".to_string()));
        }
        if let Some(after) = self.after {
            params.push(("after", after.to_string()));
        }
        params
    }
}

// ============================================================================
// Settings
// ============================================================================

/// Persisted preference set as returned by `settings.get()`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(with = "filter_wire")]
    pub filter: Option<StatusFilter>,
    #[serde(deserialize_with = "scope_or_null")]
    pub feed: Option<Scope>,
    pub sort_newest_first: Option<bool>,
    pub feed_list_width: Option<u32>,
    pub item_list_width: Option<u32>,
    pub theme_name: Option<String>,
    pub theme_font: Option<String>,
    pub theme_size: Option<f64>,
    pub refresh_rate: Option<u32>,
    pub sidebar_collapsed: Option<bool>,
    pub ai_api_key: Option<String>,
    pub ai_api_url: Option<String>,
    pub ai_model: Option<String>,
    pub ai_prompt: Option<String>,
    pub ai_personality: Option<String>,
    pub ai_explain_prompt: Option<String>,
    pub ai_summarize_prompt: Option<String>,
}

fn scope_or_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Scope>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// Partial settings write. Fields left `None` are not sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SettingsPatch {
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "patch_filter"
    )]
    pub filter: Option<Option<StatusFilter>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed: Option<Option<Scope>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_newest_first: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed_list_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_list_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme_font: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_rate: Option<Option<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sidebar_collapsed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_api_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_personality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_explain_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_summarize_prompt: Option<String>,
}

fn patch_filter<S: Serializer>(
    value: &Option<Option<StatusFilter>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    filter_wire::serialize(&value.flatten(), serializer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_scope_round_trips_through_wire_form() {
        for (wire, scope) in [
            ("", Scope::All),
            ("feed:12", Scope::Feed(12)),
            ("folder:3", Scope::Folder(Some(3))),
            ("folder:null", Scope::Folder(None)),
        ] {
            assert_eq!(wire.parse::<Scope>().unwrap(), scope);
            assert_eq!(scope.to_string(), wire);
        }
    }

    #[test]
    fn test_scope_rejects_garbage() {
        assert!("feed:".parse::<Scope>().is_err());
        assert!("tag:1".parse::<Scope>().is_err());
        assert!("feed".parse::<Scope>().is_err());
    }

    #[test]
    fn test_status_running_accepts_count() {
        let status: Status =
            serde_json::from_str(r#"{"running": 2, "stats": [{"feed_id": 1, "unread": 4}]}"#)
                .unwrap();
        assert!(status.running);
        assert_eq!(status.stats[0].unread, 4);
        assert_eq!(status.stats[0].starred, 0);

        let idle: Status = serde_json::from_str(r#"{"running": false, "stats": []}"#).unwrap();
        assert!(!idle.running);
    }

    #[test]
    fn test_settings_filter_and_feed_decoding() {
        let settings: Settings =
            serde_json::from_str(r#"{"filter": "", "feed": "folder:null"}"#).unwrap();
        assert_eq!(settings.filter, None);
        assert_eq!(settings.feed, Some(Scope::Folder(None)));

        let settings: Settings =
            serde_json::from_str(r#"{"filter": "starred", "feed": null}"#).unwrap();
        assert_eq!(settings.filter, Some(StatusFilter::Starred));
        assert_eq!(settings.feed, None);
    }

    #[test]
    fn test_settings_patch_only_sends_set_fields() {
        let patch = SettingsPatch {
            filter: Some(None),
            feed: Some(Some(Scope::Feed(7))),
            ..Default::default()
        };
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({"filter": "", "feed": "feed:7"}));

        let clear_scope = SettingsPatch {
            feed: Some(None),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&clear_scope).unwrap(),
            serde_json::json!({"feed": null})
        );
    }

    #[test]
    fn test_feed_patch_explicit_null_folder() {
        let patch = FeedPatch {
            folder_id: Some(None),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            serde_json::json!({"folder_id": null})
        );
    }

    #[test]
    fn test_query_params() {
        let query = ItemQuery {
            scope: Scope::Folder(None),
            status: Some(StatusFilter::Unread),
            search: Some("rust".into()),
            oldest_first: true,
            after: Some(41),
        };
        assert_eq!(
            query.to_params(),
            vec![
                ("folder_id", "null".to_string()),
                ("status", "unread".to_string()),
                ("search", "rust".to_string()),
                ("oldest_first", "true".to_string()),
                ("after", "41".to_string()),
            ]
        );
    }

    #[test]
    fn test_item_detail_media_views() {
        let detail: ItemDetail = serde_json::from_str(
            r#"{"id": 1, "feed_id": 2, "status": "unread", "content": "<p>x</p>",
                "media_links": [
                    {"url": "a.png", "type": "image"},
                    {"url": "b.mp3", "type": "audio"},
                    {"url": "c.bin", "type": "torrent"}
                ]}"#,
        )
        .unwrap();
        assert_eq!(detail.item.status, ItemStatus::Unread);
        assert_eq!(detail.images().count(), 1);
        assert_eq!(detail.audios().count(), 1);
        assert_eq!(detail.videos().count(), 0);
        assert_eq!(detail.media_links[2].kind, MediaKind::Other);
    }
}
