use anyhow::{Context, Result};
use log::warn;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::connection::Database;
use crate::settings::Settings;

const CURRENT_SESSION_ID_KEY: &str = "currentSessionId";
const SETTINGS_KEY: &str = "settings";

fn read_value(conn: &Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
            row.get(0)
        })
        .optional()
        .with_context(|| format!("failed to read key {key}"))?;
    Ok(value)
}

fn write_value(conn: &Connection, key: &str, value: Option<&str>) -> Result<()> {
    match value {
        Some(value) => conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        ),
        None => conn.execute("DELETE FROM kv WHERE key = ?1", params![key]),
    }
    .with_context(|| format!("failed to write key {key}"))?;
    Ok(())
}

impl Database {
    pub async fn get_current_session_id(&self) -> Result<Option<String>> {
        self.execute(|conn| read_value(conn, CURRENT_SESSION_ID_KEY))
            .await
    }

    pub async fn set_current_session_id(&self, session_id: Option<&str>) -> Result<()> {
        let session_id = session_id.map(str::to_string);
        self.execute(move |conn| write_value(conn, CURRENT_SESSION_ID_KEY, session_id.as_deref()))
            .await
    }

    /// Stored settings, or defaults when absent or unreadable.
    pub async fn load_settings(&self) -> Result<Settings> {
        let raw = self.execute(|conn| read_value(conn, SETTINGS_KEY)).await?;
        let settings = match raw {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                warn!("Stored settings are unreadable, using defaults: {err}");
                Settings::default()
            }),
            None => Settings::default(),
        };
        Ok(settings)
    }

    /// Validate and persist `settings` wholesale.
    pub async fn save_settings(&self, settings: &Settings) -> Result<Settings> {
        let settings = settings.clone().normalized();
        settings.validate()?;
        let serialized = serde_json::to_string(&settings)?;
        self.execute(move |conn| write_value(conn, SETTINGS_KEY, Some(&serialized)))
            .await?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SettingsError;

    #[tokio::test]
    async fn current_session_pointer_round_trips() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.get_current_session_id().await.unwrap(), None);

        db.set_current_session_id(Some("abc")).await.unwrap();
        assert_eq!(db.get_current_session_id().await.unwrap().as_deref(), Some("abc"));

        db.set_current_session_id(None).await.unwrap();
        assert_eq!(db.get_current_session_id().await.unwrap(), None);
    }

    #[tokio::test]
    async fn settings_default_until_saved() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.load_settings().await.unwrap(), Settings::default());

        let saved = db
            .save_settings(&Settings {
                idle_threshold_minutes: 30,
                server_url: Some("http://localhost:3000/api/".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(saved.server_url.as_deref(), Some("http://localhost:3000/api"));
        assert_eq!(db.load_settings().await.unwrap(), saved);
    }

    #[tokio::test]
    async fn invalid_settings_are_not_persisted() {
        let db = Database::in_memory().unwrap();
        let err = db
            .save_settings(&Settings {
                idle_threshold_minutes: 0,
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<SettingsError>(),
            Some(&SettingsError::IdleThresholdOutOfRange(0))
        );
        assert_eq!(db.load_settings().await.unwrap(), Settings::default());
    }
}
