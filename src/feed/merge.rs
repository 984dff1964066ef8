//! Deduplicating append of a fetched page onto the current article list.

use std::collections::HashSet;
use std::sync::Arc;

use crate::feed::types::{Article, ArticleId};

/// Append `incoming` to `existing` without duplicating article ids.
///
/// Ids already present are filtered out of the batch, and the batch is
/// also de-duplicated against itself (first occurrence wins). Surviving
/// articles keep their server-provided order. When nothing survives, the
/// existing `Arc` is returned untouched so callers can detect a no-op
/// append with `Arc::ptr_eq` and skip re-rendering.
///
/// Full reloads never go through here; they replace the list wholesale.
pub fn merge(existing: &Arc<Vec<Article>>, incoming: Vec<Article>) -> Arc<Vec<Article>> {
    let mut seen: HashSet<ArticleId> = existing.iter().map(|a| a.id).collect();
    let fresh: Vec<Article> = incoming.into_iter().filter(|a| seen.insert(a.id)).collect();

    if fresh.is_empty() {
        return Arc::clone(existing);
    }

    let mut merged = Vec::with_capacity(existing.len() + fresh.len());
    merged.extend_from_slice(existing);
    merged.extend(fresh);
    Arc::new(merged)
}
