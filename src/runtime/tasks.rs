//! Execution of effects against a [`RemoteApi`].
//!
//! Each effect runs in its own task and reports exactly one [`AppEvent`] back
//! through the loop channel, even when it panics.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tokio::sync::mpsc;

use crate::api::RemoteApi;
use crate::app::{AppEvent, Effect};

/// Short task name for panic reports and logs.
pub(super) fn task_name(effect: &Effect) -> &'static str {
    match effect {
        Effect::WriteSettings(_) => "write_settings",
        Effect::FetchItems(_) => "fetch_items",
        Effect::FetchItemDetail { .. } => "fetch_item_detail",
        Effect::UpdateItemStatus { .. } => "update_item_status",
        Effect::FetchStatus { .. } => "fetch_status",
        Effect::FetchFeedErrors => "fetch_feed_errors",
        Effect::FetchFeeds { .. } => "fetch_feeds",
        Effect::MarkAllRead(_) => "mark_all_read",
        Effect::CreateFolder { .. } => "create_folder",
        Effect::UpdateFolder { .. } => "update_folder",
        Effect::DeleteFolder(_) => "delete_folder",
        Effect::CreateFeed(_) => "create_feed",
        Effect::UpdateFeed { .. } => "update_feed",
        Effect::DeleteFeed(_) => "delete_feed",
        Effect::RefreshAllFeeds => "refresh_all_feeds",
        Effect::View(_) => "view",
    }
}

/// Catch panics in a spawned task and convert them to an error message.
pub(super) async fn catch_task_panic<F, T>(future: F) -> Result<T, String>
where
    F: std::future::Future<Output = T>,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|panic| {
            if let Some(s) = panic.downcast_ref::<&'static str>() {
                s.to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic payload".to_string()
            }
        })
}

/// Spawn the task for `effect`. View commands never reach this point.
pub(super) fn spawn<A: RemoteApi>(api: A, effect: Effect, tx: mpsc::Sender<AppEvent>) {
    let task = task_name(&effect);
    tokio::spawn(async move {
        let event = match catch_task_panic(execute(&api, effect)).await {
            Ok(Some(event)) => event,
            Ok(None) => return,
            Err(error) => {
                tracing::error!(task, error = %error, "Task panicked");
                AppEvent::TaskPanicked { task, error }
            }
        };
        if let Err(e) = tx.send(event).await {
            tracing::warn!(task, error = %e, "Channel send failed (receiver dropped)");
        }
    });
}

async fn execute<A: RemoteApi>(api: &A, effect: Effect) -> Option<AppEvent> {
    tracing::trace!(task = task_name(&effect), "Executing effect");
    let event = match effect {
        Effect::WriteSettings(patch) => {
            AppEvent::SettingsWritten(api.update_settings(&patch).await.map_err(|e| e.to_string()))
        }

        Effect::FetchItems(request) => AppEvent::ItemsLoaded {
            generation: request.generation,
            kind: request.kind,
            result: api.list_items(&request.query).await.map_err(|e| e.to_string()),
        },

        Effect::FetchItemDetail {
            item_id,
            generation,
        } => AppEvent::ItemDetailLoaded {
            generation,
            result: api.get_item(item_id).await.map_err(|e| e.to_string()),
        },

        Effect::UpdateItemStatus {
            item_id,
            feed_id,
            from,
            to,
        } => AppEvent::ItemStatusUpdated {
            item_id,
            feed_id,
            from,
            to,
            result: api.update_item(item_id, to).await.map_err(|e| e.to_string()),
        },

        Effect::FetchStatus { loop_mode } => AppEvent::StatusLoaded {
            loop_mode,
            result: api.status().await.map_err(|e| e.to_string()),
        },

        Effect::FetchFeedErrors => {
            AppEvent::FeedErrorsLoaded(api.list_feed_errors().await.map_err(|e| e.to_string()))
        }

        Effect::FetchFeeds { then_stats } => AppEvent::FeedsLoaded {
            then_stats,
            result: tokio::try_join!(api.list_folders(), api.list_feeds())
                .map_err(|e| e.to_string()),
        },

        Effect::MarkAllRead(query) => {
            AppEvent::ItemsMarkedRead(api.mark_read(&query).await.map_err(|e| e.to_string()))
        }

        Effect::CreateFolder { title, intent } => AppEvent::FolderCreated {
            intent,
            result: api.create_folder(&title).await.map_err(|e| e.to_string()),
        },

        Effect::UpdateFolder { id, patch } => {
            let result = api.update_folder(id, &patch).await.map_err(|e| e.to_string());
            AppEvent::FolderUpdated { id, patch, result }
        }

        Effect::DeleteFolder(id) => AppEvent::FolderDeleted {
            id,
            result: api.delete_folder(id).await.map_err(|e| e.to_string()),
        },

        Effect::CreateFeed(feed) => {
            AppEvent::FeedCreated(api.create_feed(&feed).await.map_err(|e| e.to_string()))
        }

        Effect::UpdateFeed { id, patch, reload } => {
            let result = api.update_feed(id, &patch).await.map_err(|e| e.to_string());
            AppEvent::FeedUpdated {
                id,
                patch,
                reload,
                result,
            }
        }

        Effect::DeleteFeed(id) => AppEvent::FeedDeleted {
            id,
            result: api.delete_feed(id).await.map_err(|e| e.to_string()),
        },

        Effect::RefreshAllFeeds => {
            AppEvent::FeedsRefreshStarted(api.refresh_feeds().await.map_err(|e| e.to_string()))
        }

        // Handled by the controller.
        Effect::View(_) => return None,
    };
    Some(event)
}
