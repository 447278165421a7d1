use anyhow::Result;
use async_trait::async_trait;

use crate::db::Database;
use crate::models::{AppendMode, Session, SessionPatch, TabCapture};
use crate::settings::Settings;

pub type SessionPredicate = Box<dyn Fn(&Session) -> bool + Send + 'static>;

/// Persistence contract the engine runs against.
///
/// Implementations must apply each call atomically with respect to every other call on the
/// same store; the engine relies on that instead of locking around read-modify-write cycles.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get_all_sessions(&self) -> Result<Vec<Session>>;
    async fn get_session(&self, session_id: &str) -> Result<Option<Session>>;
    async fn add_session(&self, session: &Session) -> Result<()>;
    async fn update_session(&self, session_id: &str, patch: SessionPatch)
        -> Result<Option<Session>>;
    async fn append_tab(
        &self,
        session_id: &str,
        tab: &TabCapture,
        mode: AppendMode,
    ) -> Result<Option<Session>>;
    async fn delete_session(&self, session_id: &str) -> Result<bool>;
    async fn delete_sessions_where(&self, predicate: SessionPredicate) -> Result<Vec<String>>;
    async fn clear_sessions(&self) -> Result<usize>;
    async fn get_current_session_id(&self) -> Result<Option<String>>;
    async fn set_current_session_id(&self, session_id: Option<&str>) -> Result<()>;
    async fn load_settings(&self) -> Result<Settings>;
    async fn save_settings(&self, settings: &Settings) -> Result<Settings>;

    /// Sessions ordered by most recent activity first.
    async fn get_sorted_sessions(&self) -> Result<Vec<Session>> {
        let mut sessions = self.get_all_sessions().await?;
        sessions.sort_by(|a, b| b.last_activity().cmp(&a.last_activity()));
        Ok(sessions)
    }
}

#[async_trait]
impl SessionStore for Database {
    async fn get_all_sessions(&self) -> Result<Vec<Session>> {
        Database::get_all_sessions(self).await
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        Database::get_session(self, session_id).await
    }

    async fn add_session(&self, session: &Session) -> Result<()> {
        self.insert_session(session).await
    }

    async fn update_session(
        &self,
        session_id: &str,
        patch: SessionPatch,
    ) -> Result<Option<Session>> {
        self.patch_session(session_id, patch).await
    }

    async fn append_tab(
        &self,
        session_id: &str,
        tab: &TabCapture,
        mode: AppendMode,
    ) -> Result<Option<Session>> {
        Database::append_tab(self, session_id, tab, mode).await
    }

    async fn delete_session(&self, session_id: &str) -> Result<bool> {
        Database::delete_session(self, session_id).await
    }

    async fn delete_sessions_where(&self, predicate: SessionPredicate) -> Result<Vec<String>> {
        Database::delete_sessions_where(self, move |session: &Session| predicate(session)).await
    }

    async fn clear_sessions(&self) -> Result<usize> {
        Database::clear_sessions(self).await
    }

    async fn get_current_session_id(&self) -> Result<Option<String>> {
        Database::get_current_session_id(self).await
    }

    async fn set_current_session_id(&self, session_id: Option<&str>) -> Result<()> {
        Database::set_current_session_id(self, session_id).await
    }

    async fn load_settings(&self) -> Result<Settings> {
        Database::load_settings(self).await
    }

    async fn save_settings(&self, settings: &Settings) -> Result<Settings> {
        Database::save_settings(self, settings).await
    }
}
