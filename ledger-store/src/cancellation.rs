//! Cooperative cancellation for the posting engine and reversal
//! protocol (§5 [ADDED]). A caller that wants to abandon an in-flight
//! `post_journal`/`reverse_journal` call hands in a `CancellationToken`;
//! if it fires before the future resolves, the future (and the open
//! `sqlx::Transaction` it's holding) is dropped, which rolls the
//! transaction back via `sqlx`'s `Drop` semantics, rather than letting
//! the write complete in the background after the caller has moved on.

use ledger_core::{Error, Result};
use tokio_util::sync::CancellationToken;

pub(crate) async fn run_cancellable<F, T>(token: Option<&CancellationToken>, fut: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    match token {
        None => fut.await,
        Some(token) => {
            tokio::select! {
                result = fut => result,
                _ = token.cancelled() => Err(Error::Internal("operation cancelled".to_string())),
            }
        }
    }
}
