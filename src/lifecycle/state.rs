use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::sessionizer::CaptureMarker;

#[derive(Debug, Clone, PartialEq, Eq)]
struct RecentCapture {
    url: String,
    ts: DateTime<Utc>,
}

/// Engine state held between events.
///
/// Only `current_session_id` is mirrored to the store; the last-capture marker and the
/// duplicate cache are transient and start empty after a restart.
#[derive(Debug, Clone, Default)]
pub struct EngineState {
    pub current_session_id: Option<String>,
    pub last_capture: Option<CaptureMarker>,
    recent_captures: HashMap<Option<i64>, RecentCapture>,
}

impl EngineState {
    /// Same tab handle produced the same URL less than `window` ago.
    pub fn is_recent_duplicate(
        &self,
        tab_id: Option<i64>,
        url: &str,
        now: DateTime<Utc>,
        window: Duration,
    ) -> bool {
        self.recent_captures
            .get(&tab_id)
            .is_some_and(|recent| recent.url == url && now - recent.ts < window)
    }

    pub fn mark_captured(&mut self, marker: CaptureMarker) {
        self.last_capture = Some(marker);
    }

    /// Remember the capture for duplicate suppression, pruning entries older than `window`.
    pub fn remember_tab(
        &mut self,
        tab_id: Option<i64>,
        url: &str,
        now: DateTime<Utc>,
        window: Duration,
    ) {
        self.recent_captures
            .retain(|_, recent| now - recent.ts < window);
        self.recent_captures.insert(
            tab_id,
            RecentCapture {
                url: url.to_string(),
                ts: now,
            },
        );
    }

    pub fn forget_tab(&mut self, tab_id: i64) {
        self.recent_captures.remove(&Some(tab_id));
    }

    /// Drop the last-capture marker and duplicate cache.
    pub fn reset_transient(&mut self) {
        self.last_capture = None;
        self.recent_captures.clear();
    }
}
