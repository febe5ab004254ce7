//! Create-and-watch primitive
//!
//! Completion of a created resource is detected by watching it, not by
//! polling. The watch is opened before the create call so no state change
//! can slip between the two; every event then goes through an inspection
//! callback that decides whether a terminal state was reached.
//!
//! The API server caps a single watch request at just under five minutes,
//! while a build or rollout may legitimately run longer. The configured
//! timeout therefore becomes a client-side deadline: each subscription
//! window is clamped to the server's limit and the watch is reopened at
//! resource version "0" until the deadline elapses. Reopening at "0"
//! re-delivers the current object state, so a terminal condition reached
//! between windows is still observed. A deadline that elapses without a
//! verdict is an error.

use std::fmt::Debug;
use std::time::{Duration, Instant};

use futures::{Stream, TryStreamExt, pin_mut};
use kube::api::{Api, PostParams, WatchEvent, WatchParams};
use kube::core::Resource;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{KubeError, Result};

// kube rejects watch timeouts of 295 seconds and above when building the
// request.
const MAX_WATCH_WINDOW_SEC: u32 = 290;

/// Create `manifest` and wait for `inspect` to produce a verdict.
///
/// `inspect` is called with every observed state of the resource; it
/// returns `Ok(Some(value))` once a terminal success state is seen,
/// `Ok(None)` to keep waiting, or an error for a terminal failure.
pub async fn create_and_watch<K, T, F>(
    api: Api<K>,
    manifest: K,
    kind: &'static str,
    timeout_sec: u32,
    mut inspect: F,
) -> Result<T>
where
    K: Resource + Clone + Debug + DeserializeOwned + Serialize,
    F: FnMut(&K) -> Result<Option<T>>,
{
    let name = manifest
        .meta()
        .name
        .clone()
        .ok_or_else(|| KubeError::InvalidManifest(format!("{kind} manifest has no name")))?;
    let deadline = Instant::now() + Duration::from_secs(u64::from(timeout_sec));

    let mut events = subscribe(&api, &name, timeout_sec.clamp(1, MAX_WATCH_WINDOW_SEC)).await?;

    tracing::info!(kind, name, "creating resource");
    api.create(&PostParams::default(), &manifest).await?;

    loop {
        match drain_until_terminal(events, kind, &name, &mut inspect).await {
            Err(error @ KubeError::SubscriptionExpired { .. }) => {
                match watch_window(deadline.saturating_duration_since(Instant::now())) {
                    Some(window) => {
                        tracing::info!(kind, name, window, "renewing watch subscription");
                        events = subscribe(&api, &name, window).await?;
                    }
                    None => return Err(error),
                }
            }
            verdict => return verdict,
        }
    }
}

async fn subscribe<K>(
    api: &Api<K>,
    name: &str,
    timeout_sec: u32,
) -> Result<impl Stream<Item = kube::Result<WatchEvent<K>>>>
where
    K: Clone + Debug + DeserializeOwned,
{
    let params = WatchParams::default()
        .fields(&format!("metadata.name={name}"))
        .timeout(timeout_sec);
    Ok(api.watch(&params, "0").await?)
}

/// Next subscription window, or `None` when the deadline has elapsed.
fn watch_window(remaining: Duration) -> Option<u32> {
    if remaining.is_zero() {
        return None;
    }

    Some(remaining.as_secs().clamp(1, u64::from(MAX_WATCH_WINDOW_SEC)) as u32)
}

async fn drain_until_terminal<K, T, F>(
    events: impl Stream<Item = kube::Result<WatchEvent<K>>>,
    kind: &'static str,
    name: &str,
    inspect: &mut F,
) -> Result<T>
where
    F: FnMut(&K) -> Result<Option<T>>,
{
    pin_mut!(events);

    while let Some(event) = events.try_next().await? {
        match event {
            WatchEvent::Added(state) | WatchEvent::Modified(state) => {
                if let Some(verdict) = inspect(&state)? {
                    return Ok(verdict);
                }
            }
            WatchEvent::Error(status) => {
                return Err(KubeError::WatchFailed {
                    kind: kind.to_string(),
                    name: name.to_string(),
                    message: status.message,
                });
            }
            WatchEvent::Deleted(_) | WatchEvent::Bookmark(_) => {}
        }
    }

    Err(KubeError::SubscriptionExpired {
        kind: kind.to_string(),
        name: name.to_string(),
    })
}
