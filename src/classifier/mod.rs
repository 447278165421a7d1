//! Remote classifier contract: grouping verdicts and session labels.

pub mod http;
pub mod label;
pub mod verdict;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::bridge::OpenTab;
use crate::models::{Session, TabCapture};

pub use http::HttpClassifier;
pub use label::{sanitize_label, MAX_LABEL_CHARS};
pub use verdict::{parse_verdict, GroupingVerdict};

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("classifier returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("classifier response could not be decoded: {0}")]
    Decode(String),

    #[error("classifier did not answer within {0:?}")]
    Timeout(Duration),
}

/// Service proposing grouping decisions and short labels.
///
/// `server_url` is the configured base URL; callers only invoke the classifier when one is
/// set. `Ok(None)` means the service answered without a usable result.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(
        &self,
        server_url: &str,
        new_tab: &TabCapture,
        ended_sessions: &[Session],
        open_tabs: &[OpenTab],
    ) -> Result<Option<GroupingVerdict>, ClassifierError>;

    async fn summarize(
        &self,
        server_url: &str,
        tab_list: &[TabCapture],
    ) -> Result<Option<String>, ClassifierError>;
}
