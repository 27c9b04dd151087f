//! Wait-until primitive for external resources.
//!
//! External deployments take anywhere from seconds to many minutes to
//! settle; the engine's only option is to poll. This module provides the
//! single polling loop used for every such wait: fetch state, check a
//! predicate, sleep, repeat. There is deliberately no attempt bound and no
//! retry on fetch errors — the caller's cancellation token is the only
//! limit, and a failed fetch fails the wait.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Fixed delay between state fetches.
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum PollError {
    /// The cancellation token fired before the predicate was satisfied.
    #[error("wait was canceled")]
    Canceled,
    /// A state fetch failed; the wait stops at the first error.
    #[error(transparent)]
    Fetch(#[from] anyhow::Error),
}

/// Repeatedly fetch a resource's state until `done` holds for it.
///
/// Returns the first state that satisfies the predicate, without fetching
/// again afterward. A fetch error or a fired cancellation token aborts the
/// wait, and the two are distinguishable in the returned error.
pub async fn await_state<T, F, Fut, P>(
    cancel: &CancellationToken,
    mut fetch: F,
    done: P,
) -> Result<T, PollError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
    P: Fn(&T) -> bool,
{
    loop {
        let state = fetch().await?;
        if done(&state) {
            return Ok(state);
        }

        tokio::select! {
            _ = cancel.cancelled() => return Err(PollError::Canceled),
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
        }
    }
}
