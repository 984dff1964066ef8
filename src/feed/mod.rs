//! Feed domain: article types, the upstream source seam, and the merge policy.
//!
//! - [`types`] - Article, page, and subview definitions
//! - [`source`] - The [`NewsSource`] trait and per-subview dispatch
//! - [`client`] - Reqwest-backed source for the personalization backend
//! - [`merge`] - Deduplicating append of a page onto the current list

pub mod client;
pub mod merge;
pub mod source;
pub mod types;

pub use client::HttpNewsSource;
pub use merge::merge;
pub use source::{fetch_page, FetchError, NewsSource};
pub use types::{Article, ArticleId, FeedPage, Subview};
