//! Seam between the engine and the browser it observes.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::lifecycle::TabObservation;
use crate::models::PageContent;

/// An open browser tab, as offered to the classifier for disambiguation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OpenTab {
    pub url: String,
    pub title: String,
    pub active: bool,
    pub window_id: Option<i64>,
    pub fav_icon_url: Option<String>,
}

#[async_trait]
pub trait BrowserBridge: Send + Sync {
    /// Best-effort page summary for the tab. Errors are swallowed by the caller.
    async fn extract_content(&self, observation: &TabObservation) -> Result<Option<PageContent>>;

    /// Every tab currently open, across windows.
    async fn open_tabs(&self) -> Result<Vec<OpenTab>>;
}

/// Bridge fed by the observation stream itself: content comes pre-scraped on the
/// observation, and the open-tab set is whatever has been observed and not yet removed.
#[derive(Debug, Default)]
pub struct ObservedTabs {
    tabs: RwLock<HashMap<i64, OpenTab>>,
}

impl ObservedTabs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track the observed tab as the active one in its window.
    pub fn record(&self, observation: &TabObservation) {
        let (Some(tab_id), Some(url)) = (observation.tab_id, observation.url.as_deref()) else {
            return;
        };

        let mut tabs = match self.tabs.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for tab in tabs.values_mut() {
            if tab.window_id == observation.window_id {
                tab.active = false;
            }
        }
        tabs.insert(
            tab_id,
            OpenTab {
                url: url.to_string(),
                title: observation
                    .title
                    .clone()
                    .unwrap_or_else(|| crate::models::tab::UNTITLED.to_string()),
                active: true,
                window_id: observation.window_id,
                fav_icon_url: observation.favicon.clone(),
            },
        );
    }

    pub fn remove(&self, tab_id: i64) {
        let mut tabs = match self.tabs.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        tabs.remove(&tab_id);
    }

    pub fn len(&self) -> usize {
        match self.tabs.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BrowserBridge for ObservedTabs {
    async fn extract_content(&self, observation: &TabObservation) -> Result<Option<PageContent>> {
        Ok(observation.content.clone())
    }

    async fn open_tabs(&self) -> Result<Vec<OpenTab>> {
        let tabs = match self.tabs.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut open: Vec<OpenTab> = tabs.values().cloned().collect();
        open.sort_by(|a, b| b.active.cmp(&a.active).then_with(|| a.url.cmp(&b.url)));
        Ok(open)
    }
}
