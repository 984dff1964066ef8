//! Per-article engagement tracking and the cross-screen event source that
//! feeds it.
//!
//! When the user returns from an article's detail view, the detail screen
//! publishes how far they scrolled. The tracker keeps the latest depth per
//! article so the list can annotate cards on re-render.

use std::collections::{HashMap, HashSet};
use tokio::sync::broadcast;

use crate::feed::types::ArticleId;

/// A scroll-depth report captured when the user returns from an article's
/// detail view.
#[derive(Debug, Clone, PartialEq)]
pub struct EngagementRecord {
    pub article_id: ArticleId,
    pub scroll_percentage: f32,
}

/// Latest scroll depth per article. No history: repeated reports for the
/// same article silently overwrite.
#[derive(Debug, Default)]
pub struct EngagementTracker {
    depths: HashMap<ArticleId, f32>,
}

impl EngagementTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store or overwrite the depth for one article.
    pub fn record(&mut self, article_id: ArticleId, scroll_percentage: f32) {
        self.depths.insert(article_id, scroll_percentage);
    }

    /// Depth for `article_id`, or 0.0 when nothing was recorded.
    pub fn lookup(&self, article_id: ArticleId) -> f32 {
        self.depths.get(&article_id).copied().unwrap_or(0.0)
    }

    /// Drop entries for articles no longer in the list. Called after a
    /// full-reload replace so departed articles don't pin stale depths.
    pub fn retain_ids(&mut self, keep: &HashSet<ArticleId>) {
        self.depths.retain(|id, _| keep.contains(id));
    }

    pub fn len(&self) -> usize {
        self.depths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.depths.is_empty()
    }
}

/// Cross-screen source of [`EngagementRecord`]s.
///
/// A typed broadcast channel: the detail screen emits, the feed controller
/// subscribes. Tearing a subscriber down is dropping (or aborting) its
/// receiving task, so a disposed controller can never be reached by a late
/// record. Emitting with no live subscriber is a defined no-op.
#[derive(Debug, Clone)]
pub struct EngagementHub {
    tx: broadcast::Sender<EngagementRecord>,
}

impl EngagementHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngagementRecord> {
        self.tx.subscribe()
    }

    pub fn emit(&self, record: EngagementRecord) {
        if self.tx.send(record).is_err() {
            tracing::trace!("Engagement record dropped (no live subscribers)");
        }
    }
}
