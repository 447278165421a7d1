use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const MAX_VISIBLE_TEXT_CHARS: usize = 500;
const MAX_HEADERS: usize = 10;
const MAX_HEADER_CHARS: usize = 200;
const MAX_H2_ELEMENTS: usize = 5;

pub const UNTITLED: &str = "Untitled";

/// Summary of a page's text content, as scraped from the live document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PageContent {
    pub h1: String,
    pub h2: Vec<String>,
    pub meta_description: String,
    pub headers: Vec<String>,
    pub visible_text: String,
    pub keywords: Vec<String>,
}

impl PageContent {
    /// Trim every field and apply the size caps the classifier expects.
    pub fn normalized(self) -> Self {
        let visible_text = self
            .visible_text
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .chars()
            .take(MAX_VISIBLE_TEXT_CHARS)
            .collect();

        Self {
            h1: self.h1.trim().to_string(),
            h2: self
                .h2
                .into_iter()
                .take(MAX_H2_ELEMENTS)
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty())
                .collect(),
            meta_description: self.meta_description.trim().to_string(),
            headers: self
                .headers
                .into_iter()
                .take(MAX_HEADERS)
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty() && text.chars().count() < MAX_HEADER_CHARS)
                .collect(),
            visible_text,
            keywords: self
                .keywords
                .into_iter()
                .map(|keyword| keyword.trim().to_string())
                .filter(|keyword| !keyword.is_empty())
                .collect(),
        }
    }
}

/// One observed visit to a URL. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TabCapture {
    pub id: String,
    pub ts: DateTime<Utc>,
    pub url: String,
    pub title: String,
    pub favicon: Option<String>,
    pub window_id: Option<i64>,
    pub tab_id: Option<i64>,
    pub content: Option<PageContent>,
}

impl TabCapture {
    pub fn new(url: impl Into<String>, title: Option<String>, ts: DateTime<Utc>) -> Self {
        let title = title
            .map(|title| title.trim().to_string())
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| UNTITLED.to_string());

        Self {
            id: Uuid::new_v4().to_string(),
            ts,
            url: url.into(),
            title,
            favicon: None,
            window_id: None,
            tab_id: None,
            content: None,
        }
    }

    pub fn with_favicon(mut self, favicon: Option<String>) -> Self {
        self.favicon = favicon.filter(|icon| !icon.is_empty());
        self
    }

    pub fn with_handle(mut self, window_id: Option<i64>, tab_id: Option<i64>) -> Self {
        self.window_id = window_id;
        self.tab_id = tab_id;
        self
    }

    pub fn with_content(mut self, content: Option<PageContent>) -> Self {
        self.content = content.map(PageContent::normalized);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_title_falls_back_to_untitled() {
        let tab = TabCapture::new("https://a.com", Some("   ".into()), Utc::now());
        assert_eq!(tab.title, UNTITLED);
    }

    #[test]
    fn normalized_content_applies_caps() {
        let content = PageContent {
            h1: "  Heading ".into(),
            h2: (0..8).map(|i| format!("section {i}")).collect(),
            headers: vec!["ok".into(), "x".repeat(250), " ".into()],
            visible_text: format!("lots   of\n\n{}", "word ".repeat(200)),
            keywords: vec![" rust ".into(), "".into()],
            ..Default::default()
        }
        .normalized();

        assert_eq!(content.h1, "Heading");
        assert_eq!(content.h2.len(), MAX_H2_ELEMENTS);
        assert_eq!(content.headers, vec!["ok".to_string()]);
        assert!(content.visible_text.starts_with("lots of word"));
        assert_eq!(content.visible_text.chars().count(), MAX_VISIBLE_TEXT_CHARS);
        assert_eq!(content.keywords, vec!["rust".to_string()]);
    }
}
