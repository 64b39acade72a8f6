//! Remote API surface consumed by the sync engine.
//!
//! - [`RemoteApi`] - the abstract operations the engine needs from the server
//! - [`types`] - wire types shared by the engine and every binding
//! - [`HttpApi`] - JSON-over-HTTP binding built on `reqwest`
//!
//! The engine never talks to a binding directly: it emits effects and the
//! runtime executes them against whatever `RemoteApi` it was given. Tests use an
//! in-memory implementation.

mod http;
pub mod types;

use std::collections::HashMap;
use std::future::Future;
use thiserror::Error;

pub use http::HttpApi;
pub use types::{
    Feed, FeedChoice, FeedCreateOutcome, FeedId, FeedPatch, FeedStat, Folder, FolderId,
    FolderPatch, Item, ItemDetail, ItemId, ItemPage, ItemQuery, ItemStatus, MediaKind, MediaLink,
    NewFeed, Scope, Settings, SettingsPatch, Status, StatusFilter,
};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// Whether a retry via the same trigger might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Network(_) => true,
            ApiError::HttpStatus(status) => *status >= 500,
            ApiError::Decode(_) | ApiError::InvalidUrl(_) => false,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

// ============================================================================
// RemoteApi
// ============================================================================

/// Operations the engine consumes from the feed server.
///
/// Implementations are cheap to clone (the runtime clones one into every
/// spawned request) and their futures must be `Send`.
pub trait RemoteApi: Clone + Send + Sync + 'static {
    fn status(&self) -> impl Future<Output = ApiResult<Status>> + Send;

    fn list_folders(&self) -> impl Future<Output = ApiResult<Vec<Folder>>> + Send;
    fn create_folder(&self, title: &str) -> impl Future<Output = ApiResult<Folder>> + Send;
    fn update_folder(
        &self,
        id: FolderId,
        patch: &FolderPatch,
    ) -> impl Future<Output = ApiResult<()>> + Send;
    fn delete_folder(&self, id: FolderId) -> impl Future<Output = ApiResult<()>> + Send;

    fn list_feeds(&self) -> impl Future<Output = ApiResult<Vec<Feed>>> + Send;
    fn create_feed(
        &self,
        feed: &NewFeed,
    ) -> impl Future<Output = ApiResult<FeedCreateOutcome>> + Send;
    fn update_feed(
        &self,
        id: FeedId,
        patch: &FeedPatch,
    ) -> impl Future<Output = ApiResult<()>> + Send;
    fn delete_feed(&self, id: FeedId) -> impl Future<Output = ApiResult<()>> + Send;
    /// Ask the server to crawl every feed. Progress is observed via `status()`.
    fn refresh_feeds(&self) -> impl Future<Output = ApiResult<()>> + Send;
    fn list_feed_errors(&self) -> impl Future<Output = ApiResult<HashMap<FeedId, String>>> + Send;

    /// One page of items. Results are strictly ordered by the requested sort
    /// direction and `after` is exclusive.
    fn list_items(&self, query: &ItemQuery) -> impl Future<Output = ApiResult<ItemPage>> + Send;
    fn get_item(&self, id: ItemId) -> impl Future<Output = ApiResult<ItemDetail>> + Send;
    fn update_item(
        &self,
        id: ItemId,
        status: ItemStatus,
    ) -> impl Future<Output = ApiResult<()>> + Send;
    fn mark_read(&self, query: &ItemQuery) -> impl Future<Output = ApiResult<()>> + Send;

    fn settings(&self) -> impl Future<Output = ApiResult<Settings>> + Send;
    /// Partial patch; fields not included are left unchanged server-side.
    fn update_settings(
        &self,
        patch: &SettingsPatch,
    ) -> impl Future<Output = ApiResult<()>> + Send;
}
