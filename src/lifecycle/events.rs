use serde::{Deserialize, Serialize};

use crate::models::PageContent;
use crate::settings::Settings;

/// A tab activation or completed navigation reported by the browser.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TabObservation {
    pub url: Option<String>,
    pub title: Option<String>,
    #[serde(alias = "favIconUrl")]
    pub favicon: Option<String>,
    pub window_id: Option<i64>,
    pub tab_id: Option<i64>,
    /// Page summary scraped by the host, when it already has one.
    pub content: Option<PageContent>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleSignal {
    Idle,
    Locked,
    Active,
}

/// One line of the host's event stream.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    Tab(TabObservation),
    IdleState { state: LifecycleSignal },
    TabRemoved {
        #[serde(rename = "tabId")]
        tab_id: i64,
    },
    Clear,
    DeleteSession {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    ClearSessions,
    SaveSettings { settings: Settings },
    ListSessions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_event_lines() {
        let event: EngineEvent = serde_json::from_str(
            r#"{"type":"tab","url":"https://a.com","title":"A","tabId":4,"windowId":1,"favIconUrl":"https://a.com/f.ico"}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            EngineEvent::Tab(TabObservation {
                url: Some("https://a.com".into()),
                title: Some("A".into()),
                favicon: Some("https://a.com/f.ico".into()),
                window_id: Some(1),
                tab_id: Some(4),
                content: None,
            })
        );

        let event: EngineEvent =
            serde_json::from_str(r#"{"type":"idle_state","state":"locked"}"#).unwrap();
        assert_eq!(
            event,
            EngineEvent::IdleState {
                state: LifecycleSignal::Locked
            }
        );

        let event: EngineEvent =
            serde_json::from_str(r#"{"type":"tab_removed","tabId":9}"#).unwrap();
        assert_eq!(event, EngineEvent::TabRemoved { tab_id: 9 });

        let event: EngineEvent = serde_json::from_str(r#"{"type":"clear"}"#).unwrap();
        assert_eq!(event, EngineEvent::Clear);
    }
}
