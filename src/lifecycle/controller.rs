use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::{
    bridge::BrowserBridge,
    classifier::{sanitize_label, Classifier},
    grouping::{Decision, GroupingResolver},
    models::{AppendMode, Session, SessionOverview, SessionPatch, TabCapture},
    sessionizer::{
        deduplicate_tabs, is_domain_excluded, is_excluded_url, should_start_new_session,
        CaptureMarker,
    },
    settings::Settings,
    store::SessionStore,
    utils::Clock,
};

use super::{
    cleanup::{is_past_ttl, is_stale_single_tab, CleanupReport, CleanupSweeper, SweepScope},
    EngineConfig, EngineState, LifecycleSignal, TabObservation,
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

/// Why an observation was dropped before anything was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MissingUrl,
    Paused,
    ExcludedUrl,
    ExcludedDomain,
    RecentDuplicate,
}

/// Result of a single `capture_tab` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CaptureOutcome {
    Skipped { reason: SkipReason },
    /// Tab appended to the active session; `created` when that session was started for it.
    Appended { session_id: String, created: bool },
    /// Tab reopened an ended session.
    Merged { session_id: String },
    /// Classifier judged the tab noise; nothing was appended.
    Ignored {
        session_id: Option<String>,
        reason: Option<String>,
    },
    /// An error was logged and swallowed.
    Failed,
}

impl CaptureOutcome {
    fn skipped(reason: SkipReason) -> Self {
        CaptureOutcome::Skipped { reason }
    }
}

/// Labeling owed once the state lock is released.
struct PendingLabel {
    session_id: String,
    force: bool,
}

/// Drives the current-session state machine.
///
/// Pointer transitions run under the `state` mutex. Content extraction and classifier calls run
/// with the lock released; a grouping decision is applied only if no session became current in
/// the meantime. Store calls are individually atomic (see [`SessionStore`]), which keeps the
/// recurring sweep from tearing an in-flight append.
#[derive(Clone)]
pub struct SessionEngine {
    store: Arc<dyn SessionStore>,
    classifier: Arc<dyn Classifier>,
    bridge: Arc<dyn BrowserBridge>,
    clock: Arc<dyn Clock>,
    config: Arc<EngineConfig>,
    resolver: GroupingResolver,
    state: Arc<Mutex<EngineState>>,
    sweeper: Arc<Mutex<CleanupSweeper>>,
}

impl SessionEngine {
    pub fn new(
        store: Arc<dyn SessionStore>,
        classifier: Arc<dyn Classifier>,
        bridge: Arc<dyn BrowserBridge>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        let config = Arc::new(config);
        let resolver = GroupingResolver::new(
            store.clone(),
            classifier.clone(),
            bridge.clone(),
            config.clone(),
        );

        Self {
            store,
            classifier,
            bridge,
            clock,
            config,
            resolver,
            state: Arc::new(Mutex::new(EngineState::default())),
            sweeper: Arc::new(Mutex::new(CleanupSweeper::new())),
        }
    }

    /// Restore the persisted pointer, run both sweeps, make sure a session is open, and start
    /// the recurring sweeper.
    pub async fn initialize(&self) -> Result<()> {
        let persisted = self.store.get_current_session_id().await?;
        {
            let mut state = self.state.lock().await;
            state.current_session_id = match persisted {
                Some(id) => match self.store.get_session(&id).await? {
                    Some(session) if !session.is_ended() => Some(id),
                    _ => {
                        log_warn!("Persisted current session {id} is gone or ended, dropping it");
                        self.store.set_current_session_id(None).await?;
                        None
                    }
                },
                None => None,
            };

            let report = self.cleanup_locked(&mut state).await?;
            if report.total() > 0 {
                log_info!(
                    "Startup cleanup removed {} single-tab and {} expired sessions",
                    report.single_tab_removed,
                    report.expired_removed
                );
            }

            if state.current_session_id.is_none() {
                let now = self.clock.now();
                self.start_session_locked(&mut state, now, None).await?;
            }
        }

        self.sweeper
            .lock()
            .await
            .start(self.clone(), self.config.cleanup_interval)?;
        Ok(())
    }

    /// Stop the recurring sweeper.
    pub async fn shutdown(&self) -> Result<()> {
        self.sweeper.lock().await.stop().await
    }

    pub async fn current_session_id(&self) -> Option<String> {
        self.state.lock().await.current_session_id.clone()
    }

    pub async fn save_settings(&self, settings: &Settings) -> Result<Settings> {
        self.store.save_settings(settings).await
    }

    /// Record a tab observation. Never fails: errors are logged and reported as
    /// [`CaptureOutcome::Failed`].
    pub async fn capture_tab(&self, observation: TabObservation) -> CaptureOutcome {
        let url = observation.url.clone().unwrap_or_default();
        match self.try_capture_tab(observation).await {
            Ok(outcome) => {
                log_debug!("Capture of {url}: {outcome:?}");
                outcome
            }
            Err(err) => {
                log_error!("Failed to capture tab {url}: {err:#}");
                CaptureOutcome::Failed
            }
        }
    }

    async fn try_capture_tab(&self, observation: TabObservation) -> Result<CaptureOutcome> {
        let url = match observation.url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => return Ok(CaptureOutcome::skipped(SkipReason::MissingUrl)),
        };

        let settings = self.store.load_settings().await?;
        if settings.pause_capture {
            return Ok(CaptureOutcome::skipped(SkipReason::Paused));
        }
        if is_excluded_url(&url, &self.config.excluded_url_prefixes) {
            return Ok(CaptureOutcome::skipped(SkipReason::ExcludedUrl));
        }
        if is_domain_excluded(&url, &settings.excluded_domains) {
            return Ok(CaptureOutcome::skipped(SkipReason::ExcludedDomain));
        }

        let now = self.clock.now();
        let marker = CaptureMarker::new(now, url.clone());
        let (active, broke) = {
            let mut state = self.state.lock().await;
            let window = self.config.duplicate_window;
            if state.is_recent_duplicate(observation.tab_id, &url, now, window) {
                return Ok(CaptureOutcome::skipped(SkipReason::RecentDuplicate));
            }
            let active = self.active_session_locked(&mut state).await?;
            let broke = active.is_some()
                && state.last_capture.as_ref().is_some_and(|last| {
                    should_start_new_session(Some(last), &marker, settings.idle_threshold_minutes)
                });
            (active, broke)
        };

        let content = match self.bridge.extract_content(&observation).await {
            Ok(content) => content,
            Err(err) => {
                log_warn!("Content extraction failed for {url}: {err:#}");
                None
            }
        };

        let tab = TabCapture::new(url, observation.title.clone(), now)
            .with_favicon(observation.favicon.clone())
            .with_handle(observation.window_id, observation.tab_id)
            .with_content(content);

        if let Some(session_id) = active.as_deref().filter(|_| broke) {
            log_info!("Idle or domain break before {}, ending session {session_id}", tab.url);
            self.end_session_if_current(session_id).await?;
        }

        let resolved = if active.is_none() || broke {
            Some(self.resolver.resolve(&tab, &settings).await)
        } else {
            None
        };

        let mut state = self.state.lock().await;
        if state.is_recent_duplicate(tab.tab_id, &tab.url, now, self.config.duplicate_window) {
            return Ok(CaptureOutcome::skipped(SkipReason::RecentDuplicate));
        }

        let current = self.active_session_locked(&mut state).await?;
        let decision = match resolved {
            Some(decision) if current.is_none() => decision,
            Some(decision) => {
                log_debug!("A session became current during grouping, dropping {decision:?}");
                Decision::Continue
            }
            None => Decision::Continue,
        };

        let mut suggested_label = None;
        match decision {
            Decision::Merge { session_id, label } => {
                if let Some(pending) = self
                    .merge_locked(&mut state, &session_id, &tab, label)
                    .await?
                {
                    self.record_capture(&mut state, &tab, marker);
                    drop(state);
                    self.settle_label(pending).await;
                    return Ok(CaptureOutcome::Merged { session_id });
                }
                log_warn!("Merge target {session_id} disappeared, starting a new session");
            }
            Decision::NoAction {
                session_id,
                label,
                reason,
            } => {
                let adopted = self
                    .adopt_locked(&mut state, session_id.as_deref(), label)
                    .await?;
                self.record_capture(&mut state, &tab, marker);
                return Ok(CaptureOutcome::Ignored {
                    session_id: adopted,
                    reason,
                });
            }
            Decision::CreateNew {
                suggested_label: label,
            } => suggested_label = label,
            Decision::Continue => {}
        }

        let (session_id, created) = match state.current_session_id.clone() {
            Some(session_id) => (session_id, false),
            None => {
                let label = suggested_label.as_deref().and_then(sanitize_label);
                let session_id = self.start_session_locked(&mut state, tab.ts, label).await?;
                (session_id, true)
            }
        };

        let session = self
            .store
            .append_tab(&session_id, &tab, AppendMode::Continue)
            .await?
            .ok_or_else(|| anyhow!("current session {session_id} vanished before append"))?;
        self.record_capture(&mut state, &tab, marker);
        drop(state);

        if session.label.is_none() && session.tab_list.len() >= self.config.min_tabs_for_auto_label
        {
            self.settle_label(PendingLabel {
                session_id: session_id.clone(),
                force: false,
            })
            .await;
        }

        Ok(CaptureOutcome::Appended {
            session_id,
            created,
        })
    }

    /// React to the host's idle detector. Errors are logged and swallowed.
    pub async fn handle_signal(&self, signal: LifecycleSignal) {
        let result = async {
            match signal {
                LifecycleSignal::Idle | LifecycleSignal::Locked => {
                    let current = self.state.lock().await.current_session_id.clone();
                    if let Some(session_id) = current {
                        log_info!("Browser went {signal:?}, ending session {session_id}");
                        self.end_session_if_current(&session_id).await?;
                    }
                }
                LifecycleSignal::Active => {
                    let mut state = self.state.lock().await;
                    if state.current_session_id.is_none() {
                        let now = self.clock.now();
                        self.start_session_locked(&mut state, now, None).await?;
                    }
                }
            }
            anyhow::Ok(())
        }
        .await;

        if let Err(err) = result {
            log_error!("Failed to handle {signal:?} signal: {err:#}");
        }
    }

    /// Forget the current session and all transient bookkeeping. Stored sessions are untouched.
    pub async fn clear(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.current_session_id = None;
        state.reset_transient();
        self.store.set_current_session_id(None).await
    }

    pub async fn end_current_session(&self) -> Result<()> {
        let current = self.state.lock().await.current_session_id.clone();
        if let Some(session_id) = current {
            self.end_session_if_current(&session_id).await?;
        }
        Ok(())
    }

    /// Reopen `session_id` with `tab` appended and make it current. Returns `false` when the
    /// session does not exist.
    pub async fn merge_into_session(
        &self,
        session_id: &str,
        tab: &TabCapture,
        label: Option<String>,
    ) -> Result<bool> {
        let pending = {
            let mut state = self.state.lock().await;
            self.merge_locked(&mut state, session_id, tab, label).await?
        };

        match pending {
            Some(pending) => {
                self.settle_label(pending).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Ask the classifier for a label unless one exists already (or `force` is set).
    ///
    /// Returns the label the session ends up with; `None` for missing or empty sessions.
    pub async fn label_session(&self, session_id: &str, force: bool) -> Result<Option<String>> {
        let Some(session) = self.store.get_session(session_id).await? else {
            return Ok(None);
        };
        if session.tab_list.is_empty() {
            return Ok(None);
        }
        if !force && session.label.is_some() {
            return Ok(session.label);
        }

        let settings = self.store.load_settings().await?;
        let Some(server_url) = settings.server_url() else {
            return Ok(session.label);
        };

        let summary = tokio::time::timeout(
            self.config.classifier_timeout,
            self.classifier.summarize(server_url, &session.tab_list),
        )
        .await;

        let label = match summary {
            Ok(Ok(label)) => label.as_deref().and_then(sanitize_label),
            Ok(Err(err)) => {
                log_warn!("Labeling session {session_id} failed: {err}");
                None
            }
            Err(_) => {
                log_warn!("Labeling session {session_id} timed out");
                None
            }
        };

        let Some(label) = label else {
            return Ok(session.label);
        };

        match self
            .store
            .update_session(session_id, SessionPatch::label(label.clone()))
            .await?
        {
            Some(_) => {
                log_info!("Labeled session {session_id}: {label}");
                Ok(Some(label))
            }
            None => Ok(None),
        }
    }

    /// Single-tab expiry over ended sessions plus TTL expiry over everything.
    pub async fn run_cleanup(&self) -> Result<CleanupReport> {
        let mut state = self.state.lock().await;
        self.cleanup_locked(&mut state).await
    }

    /// The recurring sweep: single-tab expiry over every session, aged by last activity.
    pub async fn sweep_stale_single_tab(&self) -> Result<CleanupReport> {
        let mut state = self.state.lock().await;
        let now = self.clock.now();
        let grace = self.config.single_tab_grace;

        let removed = self
            .store
            .delete_sessions_where(Box::new(move |session: &Session| {
                is_stale_single_tab(session, now, grace, SweepScope::AllSessions)
            }))
            .await?;

        let cleared_current = self.clear_if_deleted(&mut state, &removed).await?;
        Ok(CleanupReport {
            single_tab_removed: removed.len(),
            expired_removed: 0,
            cleared_current,
        })
    }

    /// A browser tab was closed.
    pub async fn forget_tab(&self, tab_id: i64) {
        self.state.lock().await.forget_tab(tab_id);
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        let deleted = self.store.delete_session(session_id).await?;
        if deleted {
            self.clear_if_deleted(&mut state, &[session_id.to_string()])
                .await?;
        }
        Ok(deleted)
    }

    pub async fn clear_all_sessions(&self) -> Result<usize> {
        let mut state = self.state.lock().await;
        let removed = self.store.clear_sessions().await?;
        state.current_session_id = None;
        state.reset_transient();
        self.store.set_current_session_id(None).await?;
        log_info!("Cleared {removed} sessions");
        Ok(removed)
    }

    /// Sessions with tabs, most recent first, with consecutive-duplicate-collapsed counts.
    pub async fn session_overview(&self) -> Result<Vec<SessionOverview>> {
        let sessions = self.store.get_sorted_sessions().await?;
        Ok(sessions
            .into_iter()
            .filter(|session| !session.tab_list.is_empty())
            .map(|session| SessionOverview {
                unique_tab_count: deduplicate_tabs(&session.tab_list).len(),
                tab_count: session.tab_list.len(),
                id: session.id,
                label: session.label,
                start_ts: session.start_ts,
                end_ts: session.end_ts,
            })
            .collect())
    }

    /// Current pointer, dropped if the session it names no longer exists.
    async fn active_session_locked(&self, state: &mut EngineState) -> Result<Option<String>> {
        let Some(session_id) = state.current_session_id.clone() else {
            return Ok(None);
        };
        if self.store.get_session(&session_id).await?.is_some() {
            return Ok(Some(session_id));
        }

        log_warn!("Current session {session_id} no longer exists");
        state.current_session_id = None;
        self.store.set_current_session_id(None).await?;
        Ok(None)
    }

    async fn start_session_locked(
        &self,
        state: &mut EngineState,
        start_ts: DateTime<Utc>,
        label: Option<String>,
    ) -> Result<String> {
        let session = Session::new(start_ts, label);
        self.store.add_session(&session).await?;
        self.store.set_current_session_id(Some(&session.id)).await?;
        state.current_session_id = Some(session.id.clone());
        log_info!("Started session {}", session.id);
        Ok(session.id)
    }

    /// Label `session_id` with the lock released, then close it if it is still current.
    async fn end_session_if_current(&self, session_id: &str) -> Result<bool> {
        self.settle_label(PendingLabel {
            session_id: session_id.to_string(),
            force: false,
        })
        .await;

        let mut state = self.state.lock().await;
        if state.current_session_id.as_deref() != Some(session_id) {
            log_debug!("Session {session_id} stopped being current while it was labeled");
            return Ok(false);
        }
        self.close_session_locked(&mut state, session_id).await?;
        Ok(true)
    }

    async fn close_session_locked(&self, state: &mut EngineState, session_id: &str) -> Result<()> {
        let now = self.clock.now();
        let ended = self
            .store
            .update_session(session_id, SessionPatch::end(now))
            .await?;

        if let Some(session) = ended {
            let age = now - session.end_ts.unwrap_or(now);
            let discard = session.tab_list.is_empty()
                || (session.tab_list.len() == 1 && age > self.config.single_tab_grace);
            if discard {
                self.store.delete_session(session_id).await?;
                log_info!(
                    "Discarded session {session_id} with {} tabs on end",
                    session.tab_list.len()
                );
            } else {
                log_info!(
                    "Ended session {session_id} with {} tabs",
                    session.tab_list.len()
                );
            }
        }

        state.current_session_id = None;
        self.store.set_current_session_id(None).await?;
        self.cleanup_locked(state).await?;
        Ok(())
    }

    /// Returns the labeling still owed, or `None` when the target does not exist.
    async fn merge_locked(
        &self,
        state: &mut EngineState,
        session_id: &str,
        tab: &TabCapture,
        label: Option<String>,
    ) -> Result<Option<PendingLabel>> {
        let Some(merged) = self
            .store
            .append_tab(session_id, tab, AppendMode::Reopen)
            .await?
        else {
            return Ok(None);
        };

        self.store.set_current_session_id(Some(session_id)).await?;
        state.current_session_id = Some(session_id.to_string());
        log_info!(
            "Merged {} into session {session_id} ({} tabs)",
            tab.url,
            merged.tab_list.len()
        );

        match label.as_deref().and_then(sanitize_label) {
            Some(label) => {
                self.store
                    .update_session(session_id, SessionPatch::label(label))
                    .await?;
                Ok(Some(PendingLabel {
                    session_id: session_id.to_string(),
                    force: false,
                }))
            }
            None => Ok(Some(PendingLabel {
                session_id: session_id.to_string(),
                force: true,
            })),
        }
    }

    /// Adopt a classifier-named session as current without appending anything.
    async fn adopt_locked(
        &self,
        state: &mut EngineState,
        session_id: Option<&str>,
        label: Option<String>,
    ) -> Result<Option<String>> {
        let Some(session_id) = session_id else {
            return Ok(None);
        };
        if self.store.get_session(session_id).await?.is_none() {
            log_warn!("Classifier named unknown session {session_id}, not adopting it");
            return Ok(None);
        }

        if let Some(label) = label.as_deref().and_then(sanitize_label) {
            self.store
                .update_session(session_id, SessionPatch::label(label))
                .await?;
        }
        self.store.set_current_session_id(Some(session_id)).await?;
        state.current_session_id = Some(session_id.to_string());
        Ok(Some(session_id.to_string()))
    }

    fn record_capture(&self, state: &mut EngineState, tab: &TabCapture, marker: CaptureMarker) {
        state.mark_captured(marker);
        state.remember_tab(tab.tab_id, &tab.url, tab.ts, self.config.duplicate_window);
    }

    async fn settle_label(&self, pending: PendingLabel) {
        if let Err(err) = self.label_session(&pending.session_id, pending.force).await {
            log_warn!("Labeling session {} failed: {err:#}", pending.session_id);
        }
    }

    async fn cleanup_locked(&self, state: &mut EngineState) -> Result<CleanupReport> {
        let now = self.clock.now();
        let grace = self.config.single_tab_grace;
        let ttl = self.config.session_ttl;

        let single_tab = self
            .store
            .delete_sessions_where(Box::new(move |session: &Session| {
                is_stale_single_tab(session, now, grace, SweepScope::EndedOnly)
            }))
            .await?;
        let expired = self
            .store
            .delete_sessions_where(Box::new(move |session: &Session| {
                is_past_ttl(session, now, ttl)
            }))
            .await?;

        let removed: Vec<String> = single_tab.iter().chain(expired.iter()).cloned().collect();
        let cleared_current = self.clear_if_deleted(state, &removed).await?;

        Ok(CleanupReport {
            single_tab_removed: single_tab.len(),
            expired_removed: expired.len(),
            cleared_current,
        })
    }

    async fn clear_if_deleted(&self, state: &mut EngineState, removed: &[String]) -> Result<bool> {
        let current_removed = state
            .current_session_id
            .as_ref()
            .is_some_and(|current| removed.contains(current));
        if current_removed {
            state.current_session_id = None;
            self.store.set_current_session_id(None).await?;
        }
        Ok(current_removed)
    }
}
