use async_trait::async_trait;
use thiserror::Error;

use crate::feed::types::{Article, FeedPage, Subview};

/// Errors surfaced by a news source.
///
/// An empty result is not an error: a fetch that succeeds with zero
/// articles returns `Ok(vec![])` and the controller maps it to its own
/// empty state.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level failure (DNS, connection, TLS).
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Non-success HTTP status from the backend.
    #[error("server returned status {0}")]
    Server(u16),
    /// Response body could not be decoded into the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),
    /// Request exceeded the 30-second deadline.
    #[error("request timed out")]
    Timeout,
}

/// Upstream article source, one operation per supported subview.
///
/// Object-safe so the controller can hold an `Arc<dyn NewsSource>` and
/// tests can script responses without a network.
#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Personalized recommendations for `user_id`, paged by offset.
    async fn fetch_personalized(
        &self,
        user_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Article>, FetchError>;

    /// The full catalog, paged by offset.
    async fn fetch_all(&self, offset: usize, limit: usize) -> Result<Vec<Article>, FetchError>;
}

/// Fetch one page for `subview`, tagging the result with the request it
/// answered. `offset` is 0 for a full reload and the current article count
/// for an append.
pub async fn fetch_page(
    source: &dyn NewsSource,
    user_id: &str,
    subview: Subview,
    offset: usize,
    limit: usize,
) -> Result<FeedPage, FetchError> {
    let articles = match subview {
        Subview::ForYou => source.fetch_personalized(user_id, offset, limit).await?,
        Subview::AllNews => source.fetch_all(offset, limit).await?,
    };
    Ok(FeedPage {
        subview,
        offset,
        articles,
    })
}
