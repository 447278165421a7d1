use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{parse_verdict, sanitize_label, Classifier, ClassifierError, GroupingVerdict};
use crate::bridge::OpenTab;
use crate::models::{PageContent, Session, TabCapture};

const GROUP_ENDPOINT: &str = "/group";
const LABEL_ENDPOINT: &str = "/label";
const HEALTH_ENDPOINT: &str = "/health";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireTab<'a> {
    url: &'a str,
    title: &'a str,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    ts: DateTime<Utc>,
    favicon: Option<&'a str>,
    content: Option<&'a PageContent>,
}

impl<'a> From<&'a TabCapture> for WireTab<'a> {
    fn from(tab: &'a TabCapture) -> Self {
        Self {
            url: &tab.url,
            title: &tab.title,
            ts: tab.ts,
            favicon: tab.favicon.as_deref(),
            content: tab.content.as_ref(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireSession<'a> {
    id: &'a str,
    label: Option<&'a str>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    start_ts: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    end_ts: Option<DateTime<Utc>>,
    tab_list: Vec<WireTab<'a>>,
}

impl<'a> From<&'a Session> for WireSession<'a> {
    fn from(session: &'a Session) -> Self {
        Self {
            id: &session.id,
            label: session.label.as_deref(),
            start_ts: session.start_ts,
            end_ts: session.end_ts,
            tab_list: session.tab_list.iter().map(WireTab::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GroupRequest<'a> {
    new_tab: WireTab<'a>,
    current_tabs: &'a [OpenTab],
    existing_sessions: Vec<WireSession<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LabelRequest<'a> {
    tab_list: Vec<WireTab<'a>>,
}

#[derive(Debug, Deserialize)]
struct LabelResponse {
    label: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    message: Option<String>,
}

/// JSON-over-HTTP client for the classifier companion service.
#[derive(Clone)]
pub struct HttpClassifier {
    client: reqwest::Client,
}

impl HttpClassifier {
    pub fn new(timeout: Duration) -> Result<Self, ClassifierError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// `GET {server_url}/health`; returns the service's status message.
    pub async fn health(&self, server_url: &str) -> Result<String, ClassifierError> {
        let response = self
            .client
            .get(endpoint(server_url, HEALTH_ENDPOINT))
            .send()
            .await?;
        let body: HealthResponse = read_json(response).await?;
        Ok(body
            .message
            .unwrap_or_else(|| "Server is healthy".to_string()))
    }

    async fn post<T: Serialize + ?Sized, R: for<'de> Deserialize<'de>>(
        &self,
        url: String,
        payload: &T,
    ) -> Result<R, ClassifierError> {
        debug!("POST {url}");
        let response = self.client.post(&url).json(payload).send().await?;
        read_json(response).await
    }
}

fn endpoint(server_url: &str, path: &str) -> String {
    format!("{}{}", server_url.trim_end_matches('/'), path)
}

async fn read_json<R: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<R, ClassifierError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ClassifierError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|err| ClassifierError::Decode(err.to_string()))
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(
        &self,
        server_url: &str,
        new_tab: &TabCapture,
        ended_sessions: &[Session],
        open_tabs: &[OpenTab],
    ) -> Result<Option<GroupingVerdict>, ClassifierError> {
        let request = GroupRequest {
            new_tab: WireTab::from(new_tab),
            current_tabs: open_tabs,
            existing_sessions: ended_sessions.iter().map(WireSession::from).collect(),
        };

        let body: Value = self
            .post(endpoint(server_url, GROUP_ENDPOINT), &request)
            .await?;
        let verdict = parse_verdict(&body);
        if verdict.is_none() {
            warn!("Classifier returned an unusable grouping verdict: {body}");
        }
        Ok(verdict)
    }

    async fn summarize(
        &self,
        server_url: &str,
        tab_list: &[TabCapture],
    ) -> Result<Option<String>, ClassifierError> {
        let request = LabelRequest {
            tab_list: tab_list.iter().map(WireTab::from).collect(),
        };

        let body: LabelResponse = self
            .post(endpoint(server_url, LABEL_ENDPOINT), &request)
            .await?;
        Ok(body.label.as_deref().and_then(sanitize_label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn endpoints_tolerate_trailing_slash() {
        assert_eq!(
            endpoint("http://localhost:3000/api/", GROUP_ENDPOINT),
            "http://localhost:3000/api/group"
        );
        assert_eq!(
            endpoint("http://localhost:3000/api", LABEL_ENDPOINT),
            "http://localhost:3000/api/label"
        );
    }

    #[test]
    fn group_request_uses_camel_case_and_millis() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let tab = TabCapture::new("https://a.com", Some("A".into()), ts);
        let mut session = Session::new(ts, Some("Docs".into()));
        session.end_ts = Some(ts);
        session.tab_list.push(tab.clone());
        let open = vec![OpenTab {
            url: "https://b.com".into(),
            title: "B".into(),
            active: true,
            window_id: Some(1),
            fav_icon_url: None,
        }];

        let request = GroupRequest {
            new_tab: WireTab::from(&tab),
            current_tabs: &open,
            existing_sessions: vec![WireSession::from(&session)],
        };
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["newTab"]["ts"], json!(ts.timestamp_millis()));
        assert_eq!(value["newTab"]["title"], json!("A"));
        assert_eq!(value["currentTabs"][0]["favIconUrl"], Value::Null);
        assert_eq!(value["existingSessions"][0]["label"], json!("Docs"));
        assert_eq!(
            value["existingSessions"][0]["endTs"],
            json!(ts.timestamp_millis())
        );
        assert_eq!(value["existingSessions"][0]["tabList"][0]["url"], json!("https://a.com"));
    }
}
