use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::TabCapture;

/// A contiguous unit of work. `end_ts == None` while the session is active.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub start_ts: DateTime<Utc>,
    pub end_ts: Option<DateTime<Utc>>,
    pub label: Option<String>,
    pub tab_list: Vec<TabCapture>,
}

impl Session {
    pub fn new(start_ts: DateTime<Utc>, label: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            start_ts,
            end_ts: None,
            label,
            tab_list: Vec::new(),
        }
    }

    pub fn is_ended(&self) -> bool {
        self.end_ts.is_some()
    }

    /// `end_ts` for ended sessions, `start_ts` otherwise.
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.end_ts.unwrap_or(self.start_ts)
    }

    pub fn apply(&mut self, patch: SessionPatch) {
        if let Some(start_ts) = patch.start_ts {
            self.start_ts = start_ts;
        }
        if let Some(end_ts) = patch.end_ts {
            self.end_ts = end_ts;
        }
        if let Some(label) = patch.label {
            self.label = label;
        }
        if let Some(tab_list) = patch.tab_list {
            self.tab_list = tab_list;
        }
    }
}

/// Partial update for a stored session. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionPatch {
    pub start_ts: Option<DateTime<Utc>>,
    pub end_ts: Option<Option<DateTime<Utc>>>,
    pub label: Option<Option<String>>,
    pub tab_list: Option<Vec<TabCapture>>,
}

impl SessionPatch {
    pub fn end(at: DateTime<Utc>) -> Self {
        Self {
            end_ts: Some(Some(at)),
            ..Default::default()
        }
    }

    pub fn label(label: impl Into<String>) -> Self {
        Self {
            label: Some(Some(label.into())),
            ..Default::default()
        }
    }
}

/// How `append_tab` treats the target session besides pushing the tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendMode {
    /// Append and clear `end_ts`.
    Continue,
    /// Append, clear `end_ts`, and pull `start_ts` back to the tab's timestamp if earlier.
    Reopen,
}

/// Row of the resume list: a stored session plus its display tab count.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionOverview {
    pub id: String,
    pub label: Option<String>,
    pub start_ts: DateTime<Utc>,
    pub end_ts: Option<DateTime<Utc>>,
    pub tab_count: usize,
    pub unique_tab_count: usize,
}
