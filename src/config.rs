use std::time::Duration;
use url::Url;

/// Articles requested per fetch.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Minimum time the initial loading splash stays visible, even when the
/// fetch resolves sooner.
pub const DEFAULT_SPLASH_MIN: Duration = Duration::from_millis(2000);

/// Distance from the content end (content units) that arms the next-page
/// fetch.
pub const DEFAULT_NEAR_BOTTOM_THRESHOLD: f32 = 500.0;

/// Minimum gap between processed scroll samples.
pub const DEFAULT_SCROLL_THROTTLE: Duration = Duration::from_millis(200);

/// Controller configuration.
///
/// The user identifier lives here, not in a global: two controllers can
/// serve two users side by side, and tests inject whatever they need.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Base URL of the personalization backend.
    pub api_base: Url,
    /// User identifier sent with personalized fetches.
    pub user_id: String,
    pub page_size: usize,
    pub splash_min: Duration,
    pub near_bottom_threshold: f32,
    pub scroll_throttle: Duration,
}

impl FeedConfig {
    pub fn new(api_base: Url, user_id: impl Into<String>) -> Self {
        Self {
            api_base,
            user_id: user_id.into(),
            page_size: DEFAULT_PAGE_SIZE,
            splash_min: DEFAULT_SPLASH_MIN,
            near_bottom_threshold: DEFAULT_NEAR_BOTTOM_THRESHOLD,
            scroll_throttle: DEFAULT_SCROLL_THROTTLE,
        }
    }
}
