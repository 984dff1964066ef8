//! End-to-end controller scenarios: pagination overlap, subview races,
//! refresh failure, and the minimum-display splash.
//!
//! Each test scripts a news source with per-request delays and drives the
//! controller's event channel by hand under a paused clock, so timing is
//! exact and no network is involved.

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use url::Url;

use newsreel::config::FeedConfig;
use newsreel::controller::{FeedController, FeedEvent, Phase};
use newsreel::engagement::{EngagementHub, EngagementRecord};
use newsreel::feed::{Article, ArticleId, FetchError, NewsSource, Subview};
use newsreel::scroll::ScrollMetrics;

// ============================================================================
// Scripted source
// ============================================================================

struct Scripted {
    delay: Duration,
    result: Result<Vec<Article>, FetchError>,
}

/// Serves scripted responses keyed by (subview, offset), in push order.
/// Unscripted requests answer with an empty page.
struct ScriptedSource {
    responses: Mutex<HashMap<(Subview, usize), VecDeque<Scripted>>>,
}

impl ScriptedSource {
    fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
        }
    }

    fn push(self, subview: Subview, offset: usize, scripted: Scripted) -> Self {
        self.responses
            .lock()
            .unwrap()
            .entry((subview, offset))
            .or_default()
            .push_back(scripted);
        self
    }

    fn ok(self, subview: Subview, offset: usize, delay_ms: u64, ids: &[ArticleId]) -> Self {
        self.push(
            subview,
            offset,
            Scripted {
                delay: Duration::from_millis(delay_ms),
                result: Ok(ids.iter().copied().map(article).collect()),
            },
        )
    }

    fn err(self, subview: Subview, offset: usize, delay_ms: u64, status: u16) -> Self {
        self.push(
            subview,
            offset,
            Scripted {
                delay: Duration::from_millis(delay_ms),
                result: Err(FetchError::Server(status)),
            },
        )
    }

    async fn respond(&self, subview: Subview, offset: usize) -> Result<Vec<Article>, FetchError> {
        let scripted = self
            .responses
            .lock()
            .unwrap()
            .get_mut(&(subview, offset))
            .and_then(VecDeque::pop_front);
        match scripted {
            Some(scripted) => {
                tokio::time::sleep(scripted.delay).await;
                scripted.result
            }
            None => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl NewsSource for ScriptedSource {
    async fn fetch_personalized(
        &self,
        _user_id: &str,
        offset: usize,
        _limit: usize,
    ) -> Result<Vec<Article>, FetchError> {
        self.respond(Subview::ForYou, offset).await
    }

    async fn fetch_all(&self, offset: usize, _limit: usize) -> Result<Vec<Article>, FetchError> {
        self.respond(Subview::AllNews, offset).await
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn article(id: ArticleId) -> Article {
    Article {
        id,
        title: Arc::from(format!("Article {}", id)),
        summary: None,
        url: None,
        image_url: None,
        published: None,
    }
}

fn ids(articles: &[Article]) -> Vec<ArticleId> {
    articles.iter().map(|a| a.id).collect()
}

/// Config with the splash and throttle zeroed so tests only opt into the
/// timers they exercise.
fn fast_config() -> FeedConfig {
    let mut config = FeedConfig::new(Url::parse("http://127.0.0.1:8000").unwrap(), "1812344");
    config.splash_min = Duration::ZERO;
    config.scroll_throttle = Duration::ZERO;
    config
}

fn feed_with(
    config: FeedConfig,
    source: ScriptedSource,
) -> (FeedController, mpsc::Receiver<FeedEvent>, EngagementHub) {
    let hub = EngagementHub::new(8);
    let (controller, rx) = FeedController::new(config, Arc::new(source), &hub);
    (controller, rx, hub)
}

/// Pump events until no fetch is outstanding.
async fn drive(controller: &mut FeedController, rx: &mut mpsc::Receiver<FeedEvent>) {
    while !controller.is_idle() {
        let event = rx.recv().await.expect("event channel closed");
        controller.apply(event);
    }
}

fn bottom_metrics() -> ScrollMetrics {
    ScrollMetrics {
        viewport_height: 800.0,
        scroll_offset: 1200.0,
        content_height: 2000.0,
    }
}

// ============================================================================
// Pagination and deduplication
// ============================================================================

#[tokio::test]
async fn overlapping_next_page_is_deduplicated() {
    time::pause();
    let source = ScriptedSource::new()
        .ok(Subview::ForYou, 0, 0, &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10])
        .ok(Subview::ForYou, 10, 0, &[8, 9, 10, 11, 12]);
    let (mut controller, mut rx, _hub) = feed_with(fast_config(), source);

    controller.mount();
    drive(&mut controller, &mut rx).await;

    controller.on_scrolled_near_bottom(bottom_metrics());
    drive(&mut controller, &mut rx).await;

    assert_eq!(ids(controller.articles()), (1..=12).collect::<Vec<_>>());
    assert_eq!(controller.articles().len(), 12);
}

#[tokio::test]
async fn append_failure_keeps_the_list_and_surfaces_the_error() {
    time::pause();
    let source = ScriptedSource::new()
        .ok(Subview::ForYou, 0, 0, &[1, 2])
        .err(Subview::ForYou, 2, 0, 500);
    let (mut controller, mut rx, _hub) = feed_with(fast_config(), source);

    controller.mount();
    drive(&mut controller, &mut rx).await;

    controller.on_scrolled_near_bottom(bottom_metrics());
    drive(&mut controller, &mut rx).await;

    assert_eq!(ids(controller.articles()), vec![1, 2]);
    assert_eq!(controller.phase(), Phase::Ready);
    assert!(controller.snapshot().last_error.is_some());
}

// ============================================================================
// Subview switching
// ============================================================================

#[tokio::test]
async fn late_append_for_previous_subview_is_discarded() {
    time::pause();
    let source = ScriptedSource::new()
        .ok(Subview::ForYou, 0, 0, &[1, 2])
        .ok(Subview::ForYou, 2, 100, &[3, 4])
        .ok(Subview::AllNews, 0, 10, &[30, 31]);
    let (mut controller, mut rx, _hub) = feed_with(fast_config(), source);

    controller.mount();
    drive(&mut controller, &mut rx).await;

    // Start an append for subview 1...
    controller.on_scrolled_near_bottom(bottom_metrics());
    // ...let it complete and queue its result without consuming it...
    time::sleep(Duration::from_millis(150)).await;
    // ...then switch. The queued append result is now a stale generation.
    controller.on_subview_selected(Subview::AllNews.id());
    drive(&mut controller, &mut rx).await;

    assert_eq!(controller.subview(), Subview::AllNews);
    assert_eq!(ids(controller.articles()), vec![30, 31]);
    assert!(!controller.snapshot().waiting);
}

#[tokio::test]
async fn switch_during_refresh_releases_the_refresh_flag() {
    time::pause();
    let source = ScriptedSource::new()
        .ok(Subview::ForYou, 0, 0, &[1])
        .ok(Subview::ForYou, 0, 200, &[2])
        .ok(Subview::AllNews, 0, 10, &[30]);
    let (mut controller, mut rx, _hub) = feed_with(fast_config(), source);

    controller.mount();
    drive(&mut controller, &mut rx).await;

    controller.on_refresh_requested();
    assert!(controller.snapshot().refreshing);

    controller.on_subview_selected(Subview::AllNews.id());
    assert!(!controller.snapshot().refreshing);

    drive(&mut controller, &mut rx).await;

    assert_eq!(ids(controller.articles()), vec![30]);
    assert!(!controller.snapshot().refreshing);
    assert!(!controller.snapshot().waiting);
}

#[tokio::test]
async fn full_reload_replaces_the_list_and_prunes_engagement() {
    time::pause();
    let source = ScriptedSource::new()
        .ok(Subview::ForYou, 0, 0, &[1, 2, 3])
        .ok(Subview::AllNews, 0, 0, &[3, 10]);
    let (mut controller, mut rx, _hub) = feed_with(fast_config(), source);

    controller.mount();
    drive(&mut controller, &mut rx).await;

    controller.on_engagement(EngagementRecord {
        article_id: 1,
        scroll_percentage: 90.0,
    });
    controller.on_engagement(EngagementRecord {
        article_id: 3,
        scroll_percentage: 45.0,
    });

    controller.on_subview_selected(Subview::AllNews.id());
    drive(&mut controller, &mut rx).await;

    // Exactly the new page, not an append.
    assert_eq!(ids(controller.articles()), vec![3, 10]);
    // Departed ids lose their engagement; surviving ids keep it.
    assert_eq!(controller.engagement_for(1), 0.0);
    assert_eq!(controller.engagement_for(3), 45.0);
}

// ============================================================================
// Refresh
// ============================================================================

#[tokio::test]
async fn refresh_replaces_rather_than_merges() {
    time::pause();
    let source = ScriptedSource::new()
        .ok(Subview::ForYou, 0, 0, &[1, 2, 3])
        .ok(Subview::ForYou, 0, 0, &[2, 1, 99]);
    let (mut controller, mut rx, _hub) = feed_with(fast_config(), source);

    controller.mount();
    drive(&mut controller, &mut rx).await;

    controller.on_refresh_requested();
    drive(&mut controller, &mut rx).await;

    assert_eq!(ids(controller.articles()), vec![2, 1, 99]);
    assert!(!controller.snapshot().refreshing);
}

#[tokio::test]
async fn failed_refresh_releases_the_flag_and_keeps_articles() {
    time::pause();
    let source = ScriptedSource::new()
        .ok(Subview::ForYou, 0, 0, &[1, 2, 3])
        .err(Subview::ForYou, 0, 0, 502);
    let (mut controller, mut rx, _hub) = feed_with(fast_config(), source);

    controller.mount();
    drive(&mut controller, &mut rx).await;

    controller.on_refresh_requested();
    assert!(controller.snapshot().refreshing);
    drive(&mut controller, &mut rx).await;

    let snapshot = controller.snapshot();
    assert!(!snapshot.refreshing);
    assert_eq!(ids(&snapshot.articles), vec![1, 2, 3]);
    assert_eq!(snapshot.phase, Phase::Ready);
    assert!(snapshot.last_error.is_some());
}

#[tokio::test]
async fn refresh_is_not_stacked_while_one_is_in_flight() {
    time::pause();
    let source = ScriptedSource::new()
        .ok(Subview::ForYou, 0, 0, &[1])
        .ok(Subview::ForYou, 0, 50, &[2])
        .ok(Subview::ForYou, 0, 0, &[99]);
    let (mut controller, mut rx, _hub) = feed_with(fast_config(), source);

    controller.mount();
    drive(&mut controller, &mut rx).await;

    controller.on_refresh_requested();
    controller.on_refresh_requested();
    drive(&mut controller, &mut rx).await;

    // The second request was swallowed by the guard: the [99] script is
    // still unconsumed.
    assert_eq!(ids(controller.articles()), vec![2]);
}

// ============================================================================
// Initial load and splash timing
// ============================================================================

#[tokio::test]
async fn loading_holds_until_the_minimum_display_duration() {
    time::pause();
    let source = ScriptedSource::new().ok(Subview::ForYou, 0, 10, &[1, 2]);
    let mut config = fast_config();
    config.splash_min = Duration::from_millis(2000);
    let (mut controller, mut rx, _hub) = feed_with(config, source);

    let started = Instant::now();
    controller.mount();

    // Fetch resolves at ~10ms; the splash must not drop with it.
    let event = rx.recv().await.unwrap();
    controller.apply(event);
    assert!(controller.snapshot().loading);
    assert!(started.elapsed() < Duration::from_millis(2000));

    // The minimum-display timer is the second gate.
    let event = rx.recv().await.unwrap();
    controller.apply(event);
    assert!(!controller.snapshot().loading);
    assert!(started.elapsed() >= Duration::from_millis(2000));
    assert_eq!(controller.phase(), Phase::Ready);
}

#[tokio::test]
async fn loading_also_waits_for_a_fetch_slower_than_the_splash() {
    time::pause();
    let source = ScriptedSource::new().ok(Subview::ForYou, 0, 3000, &[1]);
    let mut config = fast_config();
    config.splash_min = Duration::from_millis(2000);
    let (mut controller, mut rx, _hub) = feed_with(config, source);

    controller.mount();

    // Splash elapses first; still loading because the fetch is out.
    let event = rx.recv().await.unwrap();
    controller.apply(event);
    assert!(controller.snapshot().loading);

    let event = rx.recv().await.unwrap();
    controller.apply(event);
    assert!(!controller.snapshot().loading);
    assert_eq!(ids(controller.articles()), vec![1]);
}

#[tokio::test]
async fn failed_initial_load_lands_in_failed() {
    time::pause();
    let source = ScriptedSource::new().err(Subview::ForYou, 0, 0, 500);
    let (mut controller, mut rx, _hub) = feed_with(fast_config(), source);

    controller.mount();
    drive(&mut controller, &mut rx).await;

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.phase, Phase::Failed);
    assert!(!snapshot.loading);
    assert!(snapshot.last_error.is_some());
    assert!(snapshot.articles.is_empty());
}

// ============================================================================
// Engagement teardown
// ============================================================================

#[tokio::test]
async fn hub_records_reach_the_controller() {
    time::pause();
    let source = ScriptedSource::new().ok(Subview::ForYou, 0, 0, &[5]);
    let (mut controller, mut rx, hub) = feed_with(fast_config(), source);

    controller.mount();
    drive(&mut controller, &mut rx).await;

    hub.emit(EngagementRecord {
        article_id: 5,
        scroll_percentage: 88.0,
    });
    let event = rx.recv().await.unwrap();
    controller.apply(event);

    assert_eq!(controller.engagement_for(5), 88.0);
}

#[tokio::test]
async fn emitting_after_controller_drop_is_harmless() {
    let source = ScriptedSource::new();
    let (controller, _rx, hub) = feed_with(fast_config(), source);

    drop(controller);
    tokio::task::yield_now().await;

    // The subscription died with the controller; this must not panic.
    hub.emit(EngagementRecord {
        article_id: 1,
        scroll_percentage: 10.0,
    });
}
