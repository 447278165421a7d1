use std::sync::Arc;

use anyhow::{anyhow, Result};

use super::Decision;
use crate::bridge::{BrowserBridge, OpenTab};
use crate::classifier::{Classifier, ClassifierError};
use crate::lifecycle::EngineConfig;
use crate::models::{Session, TabCapture};
use crate::sessionizer::is_excluded_url;
use crate::settings::Settings;
use crate::store::SessionStore;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

/// Decides where a tab goes when no session is active: merge into an ended session, adopt
/// one without appending, or start fresh. Merging is only ever proposed by the remote
/// classifier; every failure degrades to `CreateNew`.
#[derive(Clone)]
pub struct GroupingResolver {
    store: Arc<dyn SessionStore>,
    classifier: Arc<dyn Classifier>,
    bridge: Arc<dyn BrowserBridge>,
    config: Arc<EngineConfig>,
}

impl GroupingResolver {
    pub fn new(
        store: Arc<dyn SessionStore>,
        classifier: Arc<dyn Classifier>,
        bridge: Arc<dyn BrowserBridge>,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self {
            store,
            classifier,
            bridge,
            config,
        }
    }

    pub async fn resolve(&self, tab: &TabCapture, settings: &Settings) -> Decision {
        match self.try_resolve(tab, settings).await {
            Ok(decision) => decision,
            Err(err) => {
                log_warn!("Grouping failed for {}, starting a new session: {err:#}", tab.url);
                Decision::create_new()
            }
        }
    }

    async fn try_resolve(&self, tab: &TabCapture, settings: &Settings) -> Result<Decision> {
        let candidates: Vec<Session> = self
            .store
            .get_all_sessions()
            .await?
            .into_iter()
            .filter(|session| session.is_ended() && !session.tab_list.is_empty())
            .collect();

        if candidates.is_empty() {
            return Ok(Decision::create_new());
        }

        let Some(server_url) = settings.server_url() else {
            return Ok(Decision::create_new());
        };

        let open_tabs = self.sample_open_tabs(&tab.url).await;
        let verdict = tokio::time::timeout(
            self.config.classifier_timeout,
            self.classifier
                .classify(server_url, tab, &candidates, &open_tabs),
        )
        .await
        .map_err(|_| ClassifierError::Timeout(self.config.classifier_timeout))
        .and_then(|result| result)
        .map_err(|err| anyhow!(err))?;

        let Some(verdict) = verdict else {
            return Ok(Decision::create_new());
        };

        let decision = match Decision::from(verdict) {
            Decision::Merge { session_id, label } => {
                if candidates.iter().any(|session| session.id == session_id) {
                    Decision::Merge { session_id, label }
                } else {
                    log_warn!("Classifier proposed merge into unknown session {session_id}");
                    Decision::create_new()
                }
            }
            other => other,
        };

        log_debug!("Grouping decision for {}: {decision:?}", tab.url);
        Ok(decision)
    }

    /// Open tabs offered as context: internal pages and the new tab itself are left out.
    async fn sample_open_tabs(&self, new_url: &str) -> Vec<OpenTab> {
        let tabs = match self.bridge.open_tabs().await {
            Ok(tabs) => tabs,
            Err(err) => {
                log_warn!("Could not list open tabs: {err:#}");
                return Vec::new();
            }
        };

        tabs.into_iter()
            .filter(|tab| !tab.url.is_empty() && tab.url != new_url)
            .filter(|tab| !is_excluded_url(&tab.url, &self.config.excluded_url_prefixes))
            .take(self.config.open_tabs_sample)
            .collect()
    }
}
