use std::time::Duration as StdDuration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::models::Session;

use super::SessionEngine;

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

/// Which sessions the single-tab sweep may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepScope {
    /// Only ended sessions, aged from `end_ts`.
    EndedOnly,
    /// Every session, aged from its last activity.
    AllSessions,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub single_tab_removed: usize,
    pub expired_removed: usize,
    pub cleared_current: bool,
}

impl CleanupReport {
    pub fn total(&self) -> usize {
        self.single_tab_removed + self.expired_removed
    }
}

pub fn is_stale_single_tab(
    session: &Session,
    now: DateTime<Utc>,
    grace: Duration,
    scope: SweepScope,
) -> bool {
    if session.tab_list.len() != 1 {
        return false;
    }

    let reference = match scope {
        SweepScope::EndedOnly => match session.end_ts {
            Some(end_ts) => end_ts,
            None => return false,
        },
        SweepScope::AllSessions => session.last_activity(),
    };
    now - reference > grace
}

pub fn is_past_ttl(session: &Session, now: DateTime<Utc>, ttl: Duration) -> bool {
    now - session.last_activity() > ttl
}

/// Recurring single-tab sweep running on its own task until stopped.
#[derive(Default)]
pub struct CleanupSweeper {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl CleanupSweeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, engine: SessionEngine, period: StdDuration) -> Result<()> {
        if self.handle.is_some() {
            bail!("cleanup sweeper already running");
        }

        let cancel_token = CancellationToken::new();
        let token_clone = cancel_token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match engine.sweep_stale_single_tab().await {
                            Ok(report) if report.total() > 0 => {
                                log_info!(
                                    "Periodic sweep removed {} single-tab sessions",
                                    report.single_tab_removed
                                );
                            }
                            Ok(_) => {}
                            Err(err) => log_error!("Periodic session sweep failed: {err:#}"),
                        }
                    }
                    _ = token_clone.cancelled() => {
                        log_info!("cleanup sweeper shutting down");
                        break;
                    }
                }
            }
        });

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("cleanup sweeper task failed to join")
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TabCapture;

    fn session_with_tabs(
        count: usize,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Session {
        let mut session = Session::new(start, None);
        session.end_ts = end;
        for i in 0..count {
            session
                .tab_list
                .push(TabCapture::new(format!("https://site{i}.com"), None, start));
        }
        session
    }

    #[test]
    fn ended_only_scope_ignores_active_sessions() {
        let now = Utc::now();
        let grace = Duration::minutes(5);
        let start = now - Duration::hours(1);
        let active = session_with_tabs(1, start, None);
        let ended = session_with_tabs(1, start, Some(now - Duration::minutes(6)));
        let fresh = session_with_tabs(1, start, Some(now - Duration::minutes(4)));

        assert!(!is_stale_single_tab(&active, now, grace, SweepScope::EndedOnly));
        assert!(is_stale_single_tab(&ended, now, grace, SweepScope::EndedOnly));
        assert!(!is_stale_single_tab(&fresh, now, grace, SweepScope::EndedOnly));
        assert!(is_stale_single_tab(&active, now, grace, SweepScope::AllSessions));
    }

    #[test]
    fn multi_tab_sessions_are_never_single_tab_stale() {
        let now = Utc::now();
        let start = now - Duration::days(3);
        let end = Some(now - Duration::days(2));
        let old = session_with_tabs(2, start, end);
        let empty = session_with_tabs(0, start, end);
        for scope in [SweepScope::EndedOnly, SweepScope::AllSessions] {
            assert!(!is_stale_single_tab(&old, now, Duration::minutes(5), scope));
            assert!(!is_stale_single_tab(&empty, now, Duration::minutes(5), scope));
        }
        assert!(is_past_ttl(&old, now, Duration::hours(24)));
    }

    #[test]
    fn ttl_uses_last_activity() {
        let now = Utc::now();
        let ttl = Duration::hours(24);
        let recently_ended =
            session_with_tabs(3, now - Duration::hours(30), Some(now - Duration::hours(1)));
        let stale_active = session_with_tabs(3, now - Duration::hours(25), None);
        assert!(!is_past_ttl(&recently_ended, now, ttl));
        assert!(is_past_ttl(&stale_active, now, ttl));
    }
}
