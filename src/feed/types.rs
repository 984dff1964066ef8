use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Stable unique identifier assigned to an article by the backend.
pub type ArticleId = i64;

/// One article in the feed.
///
/// String payloads use `Arc<str>` so cloning a list snapshot only bumps
/// reference counts. Articles are immutable once constructed: a reload
/// replaces them wholesale, an append adds new ones, nothing edits them
/// in place.
#[derive(Debug, Clone)]
pub struct Article {
    pub id: ArticleId,
    pub title: Arc<str>,
    pub summary: Option<Arc<str>>,
    pub url: Option<Arc<str>>,
    pub image_url: Option<Arc<str>>,
    pub published: Option<DateTime<Utc>>,
}

/// The feed variants a user can switch between.
///
/// The set is deliberately closed: unknown wire ids are rejected at the
/// boundary (`from_id` returns `None`) and adding a variant forces every
/// match in the crate through the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subview {
    /// Personalized recommendations for one user (wire id 1).
    ForYou,
    /// The full article catalog, newest first (wire id 3).
    AllNews,
}

impl Subview {
    /// Map a wire/UI identifier to a subview. Unknown ids yield `None`.
    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            1 => Some(Subview::ForYou),
            3 => Some(Subview::AllNews),
            _ => None,
        }
    }

    /// The wire/UI identifier for this subview.
    pub fn id(self) -> u32 {
        match self {
            Subview::ForYou => 1,
            Subview::AllNews => 3,
        }
    }

    /// Human-readable tab label.
    pub fn label(self) -> &'static str {
        match self {
            Subview::ForYou => "For you",
            Subview::AllNews => "All news",
        }
    }
}

/// An ordered batch of articles produced by one fetch, tagged with the
/// request it answered so completions can be audited against current state.
#[derive(Debug)]
pub struct FeedPage {
    pub subview: Subview,
    pub offset: usize,
    pub articles: Vec<Article>,
}
