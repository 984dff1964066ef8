//! The feed controller: a single-consumer state machine over an event
//! channel.
//!
//! User actions (`on_*` methods) spawn background fetches; every state
//! transition happens in [`FeedController::apply`], which the owner pumps
//! with events from the receiver returned by [`FeedController::new`]. The
//! single consumer serializes all mutation, so no locking is needed even
//! though several fetches can be in flight across rapid user actions.

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::config::FeedConfig;
use crate::engagement::{EngagementHub, EngagementRecord, EngagementTracker};
use crate::feed::merge::merge;
use crate::feed::source::{fetch_page, FetchError, NewsSource};
use crate::feed::types::{Article, ArticleId, FeedPage, Subview};
use crate::scroll::{is_near_bottom, ScrollMetrics, ScrollThrottle};

/// Lifecycle phase of the article list.
///
/// `Empty` and `Failed` are distinct on purpose: an empty catalog wants a
/// "no content" screen, a failed load wants a retry affordance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Constructed, not yet mounted.
    Init,
    /// Initial load: the splash stays up until both the fetch and the
    /// minimum-display timer have resolved.
    Loading,
    /// Articles on screen.
    Ready,
    /// A successful fetch returned zero articles.
    Empty,
    /// Nothing showable: the load failed before any articles arrived.
    Failed,
}

/// What a full-reload fetch was issued for. Appends are tracked separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadKind {
    Initial,
    SubviewSwitch,
    Refresh,
}

/// Events delivered to [`FeedController::apply`] through the channel
/// created alongside the controller.
#[derive(Debug)]
pub enum FeedEvent {
    /// A full-reload fetch finished.
    ReloadFinished {
        generation: u64,
        kind: LoadKind,
        result: Result<FeedPage, FetchError>,
    },
    /// An append fetch finished.
    AppendFinished {
        generation: u64,
        result: Result<FeedPage, FetchError>,
    },
    /// The minimum-display timer for the initial splash elapsed.
    SplashElapsed,
    /// An engagement record arrived from the hub.
    Engagement(EngagementRecord),
}

/// Read-only view of the controller for rendering.
#[derive(Debug, Clone)]
pub struct FeedSnapshot {
    pub subview: Subview,
    pub articles: Arc<Vec<Article>>,
    pub phase: Phase,
    pub loading: bool,
    pub refreshing: bool,
    pub waiting: bool,
    pub scroll_offset: f32,
    pub last_error: Option<String>,
}

/// Bookkeeping for the full reload currently in flight.
struct PendingReload {
    generation: u64,
    kind: LoadKind,
    fetched: Option<Result<FeedPage, FetchError>>,
}

/// Central feed state machine.
pub struct FeedController {
    config: FeedConfig,
    source: Arc<dyn NewsSource>,
    events: mpsc::Sender<FeedEvent>,

    subview: Subview,
    articles: Arc<Vec<Article>>,
    phase: Phase,
    loading: bool,
    refreshing: bool,
    waiting: bool,
    last_error: Option<String>,

    engagement: EngagementTracker,
    throttle: ScrollThrottle,
    scroll_offset: f32,

    /// Bumped before every full reload. Spawned fetches carry the value
    /// they were issued under; completions that no longer match are
    /// discarded, so a late response can never overwrite newer state.
    generation: u64,
    pending_reload: Option<PendingReload>,
    append_in_flight: bool,
    splash_elapsed: bool,

    reload_handle: Option<JoinHandle<()>>,
    append_handle: Option<JoinHandle<()>>,
    splash_handle: Option<JoinHandle<()>>,
    engagement_forwarder: Option<JoinHandle<()>>,
}

impl FeedController {
    /// Create a controller plus the event channel its background tasks
    /// feed. The caller owns the receiver and pumps it into [`apply`].
    ///
    /// Subscribes to `hub` immediately; the subscription is torn down on
    /// drop, even on abnormal teardown, so a late engagement record can
    /// never reach a disposed controller.
    pub fn new(
        config: FeedConfig,
        source: Arc<dyn NewsSource>,
        hub: &EngagementHub,
    ) -> (Self, mpsc::Receiver<FeedEvent>) {
        let (tx, rx) = mpsc::channel(32);
        let forwarder = spawn_engagement_forwarder(hub.subscribe(), tx.clone());

        let controller = Self {
            throttle: ScrollThrottle::new(config.scroll_throttle),
            config,
            source,
            events: tx,
            subview: Subview::ForYou,
            articles: Arc::new(Vec::new()),
            phase: Phase::Init,
            loading: false,
            refreshing: false,
            waiting: false,
            last_error: None,
            engagement: EngagementTracker::new(),
            scroll_offset: 0.0,
            generation: 0,
            pending_reload: None,
            append_in_flight: false,
            splash_elapsed: false,
            reload_handle: None,
            append_handle: None,
            splash_handle: None,
            engagement_forwarder: Some(forwarder),
        };
        (controller, rx)
    }

    // ------------------------------------------------------------------
    // Actions (called by the presentation layer)
    // ------------------------------------------------------------------

    /// Kick off the initial load. Calling twice is a no-op.
    pub fn mount(&mut self) {
        if self.phase != Phase::Init {
            return;
        }
        self.phase = Phase::Loading;
        self.loading = true;
        let generation = self.bump_generation();
        self.spawn_reload(generation, LoadKind::Initial);
        self.spawn_splash();
    }

    /// Switch the feed to another subview.
    ///
    /// Unknown ids are a defined no-op; so is re-selecting the current
    /// subview. Before mount this only changes which subview the initial
    /// load will target. Otherwise any in-flight fetch is superseded and a
    /// full reload starts; the old list is replaced atomically when the
    /// new page arrives, never appended to.
    pub fn on_subview_selected(&mut self, id: u32) {
        let Some(subview) = Subview::from_id(id) else {
            tracing::warn!(id, "Ignoring unknown subview id");
            return;
        };
        if subview == self.subview {
            return;
        }
        self.subview = subview;
        if self.phase == Phase::Init {
            return;
        }

        tracing::debug!(subview = subview.label(), "Switching subview");
        self.supersede_inflight();
        self.waiting = true;
        let generation = self.bump_generation();
        self.spawn_reload(generation, LoadKind::SubviewSwitch);
    }

    /// Pull-to-refresh: full reload of the current subview.
    ///
    /// `refreshing` is always released when the reload completes, whether
    /// it succeeds, fails, or is superseded.
    pub fn on_refresh_requested(&mut self) {
        if self.phase == Phase::Init || self.refreshing {
            return;
        }
        self.supersede_inflight();
        self.refreshing = true;
        let generation = self.bump_generation();
        self.spawn_reload(generation, LoadKind::Refresh);
    }

    /// Scroll sample from the feed view. Throttled, then gated on the
    /// near-bottom predicate and on no fetch being in flight; when all
    /// pass, the next page is appended at `offset = current length`.
    pub fn on_scrolled_near_bottom(&mut self, metrics: ScrollMetrics) {
        self.scroll_offset = metrics.scroll_offset;
        if !self.throttle.should_sample() {
            return;
        }
        if !is_near_bottom(
            metrics.viewport_height,
            metrics.scroll_offset,
            metrics.content_height,
            self.config.near_bottom_threshold,
        ) {
            return;
        }
        if self.phase != Phase::Ready {
            return;
        }
        // One fetch at a time: never stack appends, never append under a reload.
        if self.append_in_flight || self.pending_reload.is_some() {
            return;
        }
        self.spawn_append();
    }

    /// Record a scroll depth for one article. Last write wins.
    pub fn on_engagement(&mut self, record: EngagementRecord) {
        self.engagement
            .record(record.article_id, record.scroll_percentage);
    }

    /// Scroll-to-top shortcut from the header logo. Presentation-only:
    /// no fetch, no phase change.
    pub fn on_logo_pressed(&mut self) {
        self.scroll_offset = 0.0;
    }

    // ------------------------------------------------------------------
    // Event application
    // ------------------------------------------------------------------

    /// Apply one event. All state transitions happen here.
    pub fn apply(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::ReloadFinished {
                generation,
                kind,
                result,
            } => {
                if generation != self.generation {
                    // The superseding action already released this
                    // reload's flags; the queued result just dies here.
                    tracing::debug!(
                        expected = self.generation,
                        got = generation,
                        ?kind,
                        "Discarding stale reload result"
                    );
                    return;
                }
                if let Some(pending) = self.pending_reload.as_mut() {
                    pending.fetched = Some(result);
                }
                self.try_finish_reload();
            }
            FeedEvent::AppendFinished { generation, result } => {
                self.finish_append(generation, result);
            }
            FeedEvent::SplashElapsed => {
                self.splash_elapsed = true;
                self.try_finish_reload();
            }
            FeedEvent::Engagement(record) => self.on_engagement(record),
        }
    }

    // ------------------------------------------------------------------
    // Read-only views
    // ------------------------------------------------------------------

    /// Snapshot of the state the presentation layer renders from.
    pub fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            subview: self.subview,
            articles: Arc::clone(&self.articles),
            phase: self.phase,
            loading: self.loading,
            refreshing: self.refreshing,
            waiting: self.waiting,
            scroll_offset: self.scroll_offset,
            last_error: self.last_error.clone(),
        }
    }

    /// Recorded scroll depth for one article, 0.0 when absent.
    pub fn engagement_for(&self, article_id: ArticleId) -> f32 {
        self.engagement.lookup(article_id)
    }

    /// True when no fetch or splash gate is outstanding.
    pub fn is_idle(&self) -> bool {
        self.pending_reload.is_none() && !self.append_in_flight
    }

    pub fn subview(&self) -> Subview {
        self.subview
    }

    pub fn articles(&self) -> &Arc<Vec<Article>> {
        &self.articles
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn bump_generation(&mut self) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.generation
    }

    /// Cancel outstanding fetches and release the flags they held. Their
    /// completion events, if already queued, fail the generation check in
    /// [`apply`].
    fn supersede_inflight(&mut self) {
        if let Some(handle) = self.reload_handle.take() {
            handle.abort();
        }
        if let Some(handle) = self.append_handle.take() {
            handle.abort();
        }
        if let Some(pending) = self.pending_reload.take() {
            tracing::debug!(
                kind = ?pending.kind,
                generation = pending.generation,
                "Superseding in-flight reload"
            );
            match pending.kind {
                LoadKind::Refresh => self.refreshing = false,
                LoadKind::SubviewSwitch => self.waiting = false,
                LoadKind::Initial => {}
            }
        }
        self.append_in_flight = false;
    }

    fn spawn_reload(&mut self, generation: u64, kind: LoadKind) {
        self.pending_reload = Some(PendingReload {
            generation,
            kind,
            fetched: None,
        });

        let source = Arc::clone(&self.source);
        let user_id = self.config.user_id.clone();
        let subview = self.subview;
        let limit = self.config.page_size;
        let tx = self.events.clone();

        self.reload_handle = Some(tokio::spawn(async move {
            let result = fetch_page(source.as_ref(), &user_id, subview, 0, limit).await;
            if tx
                .send(FeedEvent::ReloadFinished {
                    generation,
                    kind,
                    result,
                })
                .await
                .is_err()
            {
                tracing::debug!("Reload result dropped (controller gone)");
            }
        }));
    }

    fn spawn_append(&mut self) {
        self.append_in_flight = true;
        let generation = self.generation;
        let offset = self.articles.len();

        let source = Arc::clone(&self.source);
        let user_id = self.config.user_id.clone();
        let subview = self.subview;
        let limit = self.config.page_size;
        let tx = self.events.clone();

        tracing::debug!(offset, subview = subview.label(), "Fetching next page");
        self.append_handle = Some(tokio::spawn(async move {
            let result = fetch_page(source.as_ref(), &user_id, subview, offset, limit).await;
            if tx
                .send(FeedEvent::AppendFinished { generation, result })
                .await
                .is_err()
            {
                tracing::debug!("Append result dropped (controller gone)");
            }
        }));
    }

    fn spawn_splash(&mut self) {
        let delay = self.config.splash_min;
        let tx = self.events.clone();
        self.splash_handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(FeedEvent::SplashElapsed).await;
        }));
    }

    /// Resolve the pending reload once its gate opens: the fetch must be
    /// done, and while the splash is up the minimum-display timer must
    /// have elapsed too, whichever order they land in.
    fn try_finish_reload(&mut self) {
        let gate_open = self.phase != Phase::Loading || self.splash_elapsed;
        let finished = self
            .pending_reload
            .as_ref()
            .is_some_and(|p| p.fetched.is_some() && gate_open);
        if !finished {
            return;
        }
        let Some(pending) = self.pending_reload.take() else {
            return;
        };
        self.reload_handle = None;
        let Some(result) = pending.fetched else {
            return;
        };

        match result {
            Ok(page) => self.apply_full_page(pending.kind, page),
            Err(error) => self.fail_reload(pending.kind, error),
        }
    }

    /// Full replace: the old list is discarded in the same step the new
    /// page lands, so the UI never shows a stale+new mix.
    fn apply_full_page(&mut self, kind: LoadKind, page: FeedPage) {
        tracing::debug!(
            subview = page.subview.label(),
            count = page.articles.len(),
            ?kind,
            "Applying full reload"
        );
        self.articles = Arc::new(page.articles);

        let keep: HashSet<ArticleId> = self.articles.iter().map(|a| a.id).collect();
        self.engagement.retain_ids(&keep);

        self.last_error = None;
        self.phase = if self.articles.is_empty() {
            Phase::Empty
        } else {
            Phase::Ready
        };
        self.clear_reload_flags(kind);
    }

    fn fail_reload(&mut self, kind: LoadKind, error: FetchError) {
        tracing::warn!(%error, ?kind, "Full reload failed");
        self.last_error = Some(error.to_string());
        // Keep whatever is on screen; only an empty list has nothing to fall
        // back to.
        if self.articles.is_empty() {
            self.phase = Phase::Failed;
        }
        self.clear_reload_flags(kind);
    }

    fn clear_reload_flags(&mut self, kind: LoadKind) {
        self.loading = false;
        match kind {
            LoadKind::Refresh => self.refreshing = false,
            LoadKind::SubviewSwitch => self.waiting = false,
            LoadKind::Initial => {}
        }
    }

    fn finish_append(&mut self, generation: u64, result: Result<FeedPage, FetchError>) {
        if generation != self.generation {
            tracing::debug!(
                expected = self.generation,
                got = generation,
                "Discarding stale append result"
            );
            return;
        }
        self.append_in_flight = false;
        self.append_handle = None;

        match result {
            Ok(page) => {
                let merged = merge(&self.articles, page.articles);
                if Arc::ptr_eq(&merged, &self.articles) {
                    tracing::debug!(offset = page.offset, "Append contributed nothing new");
                } else {
                    self.articles = merged;
                }
                self.last_error = None;
            }
            Err(error) => {
                tracing::warn!(%error, "Append failed");
                self.last_error = Some(error.to_string());
            }
        }
    }
}

/// Pipe engagement records from the hub into the controller's event
/// channel. Aborted on drop so a disposed controller is unreachable.
fn spawn_engagement_forwarder(
    mut rx: broadcast::Receiver<EngagementRecord>,
    tx: mpsc::Sender<FeedEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(record) => {
                    if tx.send(FeedEvent::Engagement(record)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Engagement stream lagged, records dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

impl Drop for FeedController {
    fn drop(&mut self) {
        for handle in [
            self.reload_handle.take(),
            self.append_handle.take(),
            self.splash_handle.take(),
            self.engagement_forwarder.take(),
        ]
        .into_iter()
        .flatten()
        {
            handle.abort();
        }
    }
}
