use std::time::Duration as StdDuration;

use chrono::Duration;

/// Time and policy thresholds for the session engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Same tab handle + same URL within this window is not captured again.
    pub duplicate_window: Duration,

    /// Ended single-tab sessions older than this are deleted.
    pub single_tab_grace: Duration,

    /// Sessions with no activity for this long are deleted regardless of size.
    pub session_ttl: Duration,

    /// Period of the recurring single-tab sweep.
    pub cleanup_interval: StdDuration,

    /// Upper bound on a single classifier call.
    pub classifier_timeout: StdDuration,

    /// Cap on open tabs sent to the classifier as context.
    pub open_tabs_sample: usize,

    /// Tab count at which an unlabeled session gets an automatic label.
    pub min_tabs_for_auto_label: usize,

    /// Browser-internal URL prefixes that are never captured.
    pub excluded_url_prefixes: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            duplicate_window: Duration::minutes(2),
            single_tab_grace: Duration::minutes(5),
            session_ttl: Duration::hours(24),
            cleanup_interval: StdDuration::from_secs(5 * 60),
            classifier_timeout: StdDuration::from_secs(10),
            open_tabs_sample: 10,
            min_tabs_for_auto_label: 2,
            excluded_url_prefixes: vec!["chrome://".into(), "chrome-extension://".into()],
        }
    }
}

impl EngineConfig {
    /// Faster sweeps for local debugging.
    pub fn debug() -> Self {
        Self {
            cleanup_interval: StdDuration::from_secs(30),
            ..Self::default()
        }
    }

    pub fn with_single_tab_grace(mut self, grace: Duration) -> Self {
        self.single_tab_grace = grace;
        self
    }
}
