//! Inbox synchronization
//!
//! Pulls one page of remote messages matching the user's address and
//! merges each into its thread. Fetches run as a bounded concurrent
//! fan-out; merge order is irrelevant because thread reads re-sort
//! messages by timestamp and the store's merge is atomic.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;

use crate::error::AppError;
use crate::gmail::{self, GmailApi, RemoteMessage};
use crate::store::{MergeOutcome, NewMessage, ThreadStore, User, UserStore};

/// Remote page size; also the per-sync message cap
const PAGE_SIZE: u32 = 100;

/// Concurrent message fetches in flight
const FETCH_CONCURRENCY: usize = 8;

/// What a sync run did
#[derive(Debug, Default, Clone, Serialize)]
pub struct SyncReport {
    pub listed: usize,
    pub merged: usize,
    pub duplicates: usize,
    pub failed: usize,
}

/// Synchronize the user's inbox into local threads
pub async fn sync_inbox<U, T, G>(
    user_store: &U,
    thread_store: &T,
    gmail: &G,
    user: &User,
) -> Result<SyncReport, AppError>
where
    U: UserStore,
    T: ThreadStore,
    G: GmailApi,
{
    let access_token = gmail::authorized_token(user_store, gmail, user).await?;

    let query = format!("from:{0} OR to:{0}", user.email);
    let ids = gmail
        .list_message_ids(&access_token, &query, PAGE_SIZE)
        .await?;

    let mut report = SyncReport {
        listed: ids.len(),
        ..SyncReport::default()
    };

    let fetches = stream::iter(ids)
        .map(|id| {
            let token = access_token.clone();
            async move { gmail.get_message(&token, &id).await }
        })
        .buffer_unordered(FETCH_CONCURRENCY)
        .collect::<Vec<_>>()
        .await;

    for fetched in fetches {
        let remote = match fetched {
            Ok(remote) => remote,
            Err(e) => {
                tracing::warn!("Skipping message that failed to fetch: {}", e);
                report.failed += 1;
                continue;
            }
        };

        match merge_remote(thread_store, user, remote) {
            Ok(Some(MergeOutcome::Duplicate(_))) => report.duplicates += 1,
            Ok(Some(_)) => report.merged += 1,
            Ok(None) => report.failed += 1,
            Err(e) => {
                tracing::warn!("Skipping message that failed to merge: {}", e);
                report.failed += 1;
            }
        }
    }

    tracing::info!(
        user_id = user.id.0,
        listed = report.listed,
        merged = report.merged,
        duplicates = report.duplicates,
        failed = report.failed,
        "Inbox sync complete"
    );

    Ok(report)
}

/// Merge one fetched message; `None` means it was unusable
fn merge_remote<T: ThreadStore>(
    thread_store: &T,
    user: &User,
    remote: RemoteMessage,
) -> Result<Option<MergeOutcome>, AppError> {
    let from = match remote.from {
        Some(from) => from,
        None => {
            tracing::debug!(id = %remote.id, "Message has no From header");
            return Ok(None);
        }
    };
    // A missing To on a received message means it was addressed to us
    let to = remote.to.unwrap_or_else(|| user.email.clone());

    let content = match remote.body.or_else(|| remote.snippet.clone()) {
        Some(content) => content,
        None => {
            tracing::debug!(id = %remote.id, "Message has no usable body");
            return Ok(None);
        }
    };

    let timestamp = remote
        .internal_date
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .unwrap_or_else(Utc::now);

    let message = NewMessage {
        sender: crate::store::normalize_address(&from),
        content,
        snippet: remote.snippet,
        message_id: remote.id,
        timestamp,
    };

    thread_store
        .merge_message(
            user.id,
            &from,
            &to,
            remote.subject.as_deref().unwrap_or_default(),
            message,
        )
        .map(Some)
}
