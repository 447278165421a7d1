use std::collections::HashMap;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{
        format_datetime, from_optional_json, parse_datetime, parse_optional_datetime, to_json,
    },
};
use crate::models::{AppendMode, Session, SessionPatch, TabCapture};

fn row_to_session(row: &Row) -> Result<Session> {
    let start_ts: String = row.get("start_ts")?;
    let end_ts: Option<String> = row.get("end_ts")?;

    Ok(Session {
        id: row.get("id")?,
        start_ts: parse_datetime(&start_ts, "start_ts")?,
        end_ts: parse_optional_datetime(end_ts, "end_ts")?,
        label: row.get("label")?,
        tab_list: Vec::new(),
    })
}

fn row_to_tab(row: &Row) -> Result<(String, TabCapture)> {
    let session_id: String = row.get("session_id")?;
    let ts: String = row.get("ts")?;
    let content: Option<String> = row.get("content_json")?;

    let tab = TabCapture {
        id: row.get("id")?,
        ts: parse_datetime(&ts, "ts")?,
        url: row.get("url")?,
        title: row.get("title")?,
        favicon: row.get("favicon")?,
        window_id: row.get("window_id")?,
        tab_id: row.get("tab_id")?,
        content: from_optional_json(content, "content_json")?,
    };
    Ok((session_id, tab))
}

fn load_sessions(conn: &Connection) -> Result<Vec<Session>> {
    let mut stmt = conn.prepare(
        "SELECT id, start_ts, end_ts, label
         FROM sessions
         ORDER BY rowid ASC",
    )?;
    let mut rows = stmt.query([])?;
    let mut sessions = Vec::new();
    while let Some(row) = rows.next()? {
        sessions.push(row_to_session(row)?);
    }

    let mut stmt = conn.prepare(
        "SELECT id, session_id, ts, url, title, favicon, window_id, tab_id, content_json
         FROM tab_captures
         ORDER BY session_id, position ASC",
    )?;
    let mut rows = stmt.query([])?;
    let mut tabs: HashMap<String, Vec<TabCapture>> = HashMap::new();
    while let Some(row) = rows.next()? {
        let (session_id, tab) = row_to_tab(row)?;
        tabs.entry(session_id).or_default().push(tab);
    }

    for session in &mut sessions {
        if let Some(tab_list) = tabs.remove(&session.id) {
            session.tab_list = tab_list;
        }
    }

    Ok(sessions)
}

fn load_session(conn: &Connection, session_id: &str) -> Result<Option<Session>> {
    let session = conn
        .query_row(
            "SELECT id, start_ts, end_ts, label FROM sessions WHERE id = ?1",
            params![session_id],
            |row| Ok(row_to_session(row)),
        )
        .optional()?
        .transpose()?;

    let Some(mut session) = session else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT id, session_id, ts, url, title, favicon, window_id, tab_id, content_json
         FROM tab_captures
         WHERE session_id = ?1
         ORDER BY position ASC",
    )?;
    let mut rows = stmt.query(params![session_id])?;
    while let Some(row) = rows.next()? {
        let (_, tab) = row_to_tab(row)?;
        session.tab_list.push(tab);
    }

    Ok(Some(session))
}

fn insert_tab(
    conn: &Connection,
    session_id: &str,
    position: usize,
    tab: &TabCapture,
) -> Result<()> {
    let content = tab
        .content
        .as_ref()
        .map(|content| to_json(content, "content_json"))
        .transpose()?;

    conn.execute(
        "INSERT INTO tab_captures (id, session_id, position, ts, url, title, favicon, window_id, tab_id, content_json)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            tab.id,
            session_id,
            position as i64,
            format_datetime(&tab.ts),
            tab.url,
            tab.title,
            tab.favicon,
            tab.window_id,
            tab.tab_id,
            content,
        ],
    )
    .with_context(|| format!("failed to insert tab capture into session {session_id}"))?;
    Ok(())
}

fn write_session_row(conn: &Connection, session: &Session) -> Result<()> {
    conn.execute(
        "UPDATE sessions
         SET start_ts = ?1,
             end_ts = ?2,
             label = ?3
         WHERE id = ?4",
        params![
            format_datetime(&session.start_ts),
            session.end_ts.as_ref().map(format_datetime),
            session.label,
            session.id,
        ],
    )?;
    Ok(())
}

fn replace_tabs(conn: &Connection, session: &Session) -> Result<()> {
    conn.execute(
        "DELETE FROM tab_captures WHERE session_id = ?1",
        params![session.id],
    )?;
    for (position, tab) in session.tab_list.iter().enumerate() {
        insert_tab(conn, &session.id, position, tab)?;
    }
    Ok(())
}

impl Database {
    /// All sessions in creation order, tab lists included.
    pub async fn get_all_sessions(&self) -> Result<Vec<Session>> {
        self.execute(|conn| load_sessions(conn)).await
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| load_session(conn, &session_id)).await
    }

    pub async fn insert_session(&self, session: &Session) -> Result<()> {
        let record = session.clone();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO sessions (id, start_ts, end_ts, label)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.id,
                    format_datetime(&record.start_ts),
                    record.end_ts.as_ref().map(format_datetime),
                    record.label,
                ],
            )
            .with_context(|| "failed to insert session")?;
            for (position, tab) in record.tab_list.iter().enumerate() {
                insert_tab(&tx, &record.id, position, tab)?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    /// Apply `patch` to a stored session. Returns the updated session, or `None` when the
    /// id is unknown.
    pub async fn patch_session(
        &self,
        session_id: &str,
        patch: SessionPatch,
    ) -> Result<Option<Session>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let Some(mut session) = load_session(&tx, &session_id)? else {
                return Ok(None);
            };

            let replaces_tabs = patch.tab_list.is_some();
            session.apply(patch);
            write_session_row(&tx, &session)?;
            if replaces_tabs {
                replace_tabs(&tx, &session)?;
            }

            tx.commit()?;
            Ok(Some(session))
        })
        .await
    }

    /// Push `tab` onto a session's tab list and reopen it, in one transaction.
    pub async fn append_tab(
        &self,
        session_id: &str,
        tab: &TabCapture,
        mode: AppendMode,
    ) -> Result<Option<Session>> {
        let session_id = session_id.to_string();
        let tab = tab.clone();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let Some(mut session) = load_session(&tx, &session_id)? else {
                return Ok(None);
            };

            insert_tab(&tx, &session.id, session.tab_list.len(), &tab)?;
            session.end_ts = None;
            if mode == AppendMode::Reopen && tab.ts < session.start_ts {
                session.start_ts = tab.ts;
            }
            session.tab_list.push(tab);
            write_session_row(&tx, &session)?;

            tx.commit()?;
            Ok(Some(session))
        })
        .await
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<bool> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let rows_affected =
                conn.execute("DELETE FROM sessions WHERE id = ?1", params![session_id])?;
            Ok(rows_affected > 0)
        })
        .await
    }

    /// Delete every session matching `predicate`, evaluated against a snapshot taken inside
    /// the same transaction. Returns the deleted ids.
    pub async fn delete_sessions_where<P>(&self, predicate: P) -> Result<Vec<String>>
    where
        P: Fn(&Session) -> bool + Send + 'static,
    {
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let doomed: Vec<String> = load_sessions(&tx)?
                .into_iter()
                .filter(|session| predicate(session))
                .map(|session| session.id)
                .collect();

            for session_id in &doomed {
                tx.execute("DELETE FROM sessions WHERE id = ?1", params![session_id])?;
            }

            tx.commit()?;
            Ok(doomed)
        })
        .await
    }

    pub async fn clear_sessions(&self) -> Result<usize> {
        self.execute(|conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM tab_captures", [])?;
            let removed = tx.execute("DELETE FROM sessions", [])?;
            tx.commit()?;
            Ok(removed)
        })
        .await
    }
}
