use super::types::{
    Feed, FeedChoice, FeedCreateOutcome, FeedId, FeedPatch, Folder, FolderId, FolderPatch,
    ItemDetail, ItemId, ItemPage, ItemQuery, ItemStatus, NewFeed, Settings, SettingsPatch, Status,
};
use super::{ApiError, ApiResult, RemoteApi};
use reqwest::{Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

struct BasicAuth {
    username: String,
    password: SecretString,
}

/// JSON-over-HTTP binding of [`RemoteApi`].
#[derive(Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    base: Url,
    auth: Option<Arc<BasicAuth>>,
}

impl std::fmt::Debug for HttpApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpApi")
            .field("base", &self.base.as_str())
            .field("auth", &self.auth.as_ref().map(|a| a.username.as_str()))
            .finish()
    }
}

/// Wire shape of `POST /api/feeds`.
#[derive(Deserialize)]
struct CreateFeedResponse {
    status: String,
    #[serde(default)]
    feed: Option<Feed>,
    #[serde(default)]
    choice: Option<Vec<FeedChoice>>,
}

impl CreateFeedResponse {
    fn into_outcome(self) -> FeedCreateOutcome {
        match (self.status.as_str(), self.feed, self.choice) {
            ("success", Some(feed), _) => FeedCreateOutcome::Success(feed),
            ("multiple", _, Some(choice)) if !choice.is_empty() => {
                FeedCreateOutcome::Multiple(choice)
            }
            (status, _, _) => {
                if status != "notfound" && status != "none" {
                    tracing::warn!(status, "Unexpected feed create status");
                }
                FeedCreateOutcome::NotFound
            }
        }
    }
}

#[derive(serde::Serialize)]
struct TitleBody<'a> {
    title: &'a str,
}

#[derive(serde::Serialize)]
struct StatusBody {
    status: ItemStatus,
}

impl HttpApi {
    /// Build a client for the server at `base_url`.
    ///
    /// The base must be `http(s)`; a trailing slash is added so relative API
    /// paths join underneath it.
    pub fn new(base_url: &str, timeout: Duration) -> ApiResult<Self> {
        let mut base =
            Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(format!("{base_url}: {e}")))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ApiError::InvalidUrl(format!(
                "{base_url}: scheme must be http or https"
            )));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(60))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base,
            auth: None,
        })
    }

    /// Attach HTTP basic credentials to every request.
    pub fn with_basic_auth(mut self, username: impl Into<String>, password: SecretString) -> Self {
        self.auth = Some(Arc::new(BasicAuth {
            username: username.into(),
            password,
        }));
        self
    }

    fn request(&self, method: Method, path: &str) -> ApiResult<RequestBuilder> {
        let url = self
            .base
            .join(path)
            .map_err(|e| ApiError::InvalidUrl(format!("{path}: {e}")))?;
        let request = self.client.request(method, url);
        Ok(match &self.auth {
            Some(auth) => request.basic_auth(&auth.username, Some(auth.password.expose_secret())),
            None => request,
        })
    }

    async fn send(&self, request: RequestBuilder) -> ApiResult<reqwest::Response> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), url = %response.url(), "API request failed");
            return Err(ApiError::HttpStatus(status.as_u16()));
        }
        Ok(response)
    }

    async fn fetch_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        let body = self.send(request).await?.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn execute(&self, request: RequestBuilder) -> ApiResult<()> {
        self.send(request).await.map(drop)
    }
}

impl RemoteApi for HttpApi {
    async fn status(&self) -> ApiResult<Status> {
        self.fetch_json(self.request(Method::GET, "api/status")?)
            .await
    }

    async fn list_folders(&self) -> ApiResult<Vec<Folder>> {
        self.fetch_json(self.request(Method::GET, "api/folders")?)
            .await
    }

    async fn create_folder(&self, title: &str) -> ApiResult<Folder> {
        let request = self
            .request(Method::POST, "api/folders")?
            .json(&TitleBody { title });
        self.fetch_json(request).await
    }

    async fn update_folder(&self, id: FolderId, patch: &FolderPatch) -> ApiResult<()> {
        let request = self
            .request(Method::PUT, &format!("api/folders/{id}"))?
            .json(patch);
        self.execute(request).await
    }

    async fn delete_folder(&self, id: FolderId) -> ApiResult<()> {
        self.execute(self.request(Method::DELETE, &format!("api/folders/{id}"))?)
            .await
    }

    async fn list_feeds(&self) -> ApiResult<Vec<Feed>> {
        self.fetch_json(self.request(Method::GET, "api/feeds")?)
            .await
    }

    async fn create_feed(&self, feed: &NewFeed) -> ApiResult<FeedCreateOutcome> {
        let request = self.request(Method::POST, "api/feeds")?.json(feed);
        let response: CreateFeedResponse = self.fetch_json(request).await?;
        Ok(response.into_outcome())
    }

    async fn update_feed(&self, id: FeedId, patch: &FeedPatch) -> ApiResult<()> {
        let request = self
            .request(Method::PUT, &format!("api/feeds/{id}"))?
            .json(patch);
        self.execute(request).await
    }

    async fn delete_feed(&self, id: FeedId) -> ApiResult<()> {
        self.execute(self.request(Method::DELETE, &format!("api/feeds/{id}"))?)
            .await
    }

    async fn refresh_feeds(&self) -> ApiResult<()> {
        self.execute(self.request(Method::POST, "api/feeds/refresh")?)
            .await
    }

    async fn list_feed_errors(&self) -> ApiResult<HashMap<FeedId, String>> {
        self.fetch_json(self.request(Method::GET, "api/feeds/errors")?)
            .await
    }

    async fn list_items(&self, query: &ItemQuery) -> ApiResult<ItemPage> {
        let request = self
            .request(Method::GET, "api/items")?
            .query(&query.to_params());
        self.fetch_json(request).await
    }

    async fn get_item(&self, id: ItemId) -> ApiResult<ItemDetail> {
        self.fetch_json(self.request(Method::GET, &format!("api/items/{id}"))?)
            .await
    }

    async fn update_item(&self, id: ItemId, status: ItemStatus) -> ApiResult<()> {
        let request = self
            .request(Method::PUT, &format!("api/items/{id}"))?
            .json(&StatusBody { status });
        self.execute(request).await
    }

    async fn mark_read(&self, query: &ItemQuery) -> ApiResult<()> {
        let mut params = query.to_params();
        params.retain(|(key, _)| *key != "after");
        let request = self
            .request(Method::PUT, "api/items/read")?
            .query(&params);
        self.execute(request).await
    }

    async fn settings(&self) -> ApiResult<Settings> {
        self.fetch_json(self.request(Method::GET, "api/settings")?)
            .await
    }

    async fn update_settings(&self, patch: &SettingsPatch) -> ApiResult<()> {
        let request = self.request(Method::PUT, "api/settings")?.json(patch);
        self.execute(request).await
    }
}
