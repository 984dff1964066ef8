//! Controller core for a paginated, engagement-aware news feed.
//!
//! The [`controller::FeedController`] owns the feed state machine: it
//! fetches pages from a [`feed::NewsSource`], switches between subviews,
//! deduplicates appended pages, and tracks per-article scroll depth
//! reported through an [`engagement::EngagementHub`]. Background fetches
//! report completion over an event channel; the owner pumps that channel
//! into [`controller::FeedController::apply`], which serializes every
//! state transition.
//!
//! Presentation is out of scope: the crate exposes a read-only snapshot
//! plus action entry points, and the bundled binary is a plain terminal
//! driver around them.

pub mod config;
pub mod controller;
pub mod engagement;
pub mod feed;
pub mod scroll;

pub use config::FeedConfig;
pub use controller::{FeedController, FeedEvent, FeedSnapshot, Phase};
pub use engagement::{EngagementHub, EngagementRecord, EngagementTracker};
pub use feed::{Article, ArticleId, FeedPage, FetchError, HttpNewsSource, NewsSource, Subview};
pub use scroll::{is_near_bottom, ScrollMetrics, ScrollThrottle};
