//! Draw history feed
//!
//! The external lottery endpoint is the only inbound data dependency.
//! `DrawSource` is the seam the polling worker consumes, so tests can
//! substitute a scripted source.

use crate::config::SourceConfig;
use crate::error::Result;
use crate::types::Round;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Deserializer};
use std::time::Duration;

/// Source of draw rounds, oldest first.
#[async_trait]
pub trait DrawSource: Send + Sync {
    /// Fetch the most recent `page_size` rounds. Network failures and
    /// malformed payloads surface as errors; the caller treats both as
    /// transient.
    async fn fetch(&self, page_size: u32) -> Result<Vec<Round>>;
}

#[async_trait]
impl<T> DrawSource for std::sync::Arc<T>
where
    T: DrawSource + ?Sized,
{
    async fn fetch(&self, page_size: u32) -> Result<Vec<Round>> {
        (**self).fetch(page_size).await
    }
}

/// One item of the feed's history page.
#[derive(Debug, Deserialize)]
pub struct RawRound {
    #[serde(rename = "issueNumber")]
    pub issue_number: String,
    #[serde(deserialize_with = "number_or_string")]
    pub number: i64,
    #[serde(default)]
    pub color: String,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    data: Option<HistoryData>,
}

#[derive(Debug, Deserialize)]
struct HistoryData {
    #[serde(default)]
    list: Vec<RawRound>,
}

// The feed is inconsistent about whether `number` is an integer or a
// quoted string.
fn number_or_string<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(i64),
        Text(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Production feed client.
#[derive(Clone)]
pub struct HttpDrawSource {
    http: reqwest::Client,
    api_url: String,
}

impl HttpDrawSource {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_url: config.api_url.clone(),
        })
    }
}

#[async_trait]
impl DrawSource for HttpDrawSource {
    async fn fetch(&self, page_size: u32) -> Result<Vec<Round>> {
        let response = self
            .http
            .get(&self.api_url)
            .query(&[("pageNo", 1u32), ("pageSize", page_size)])
            .send()
            .await?
            .error_for_status()?;

        let payload: HistoryResponse = response.json().await?;
        let items = payload.data.map(|d| d.list).unwrap_or_default();

        let observed_at = Utc::now();
        // The feed lists newest first; the stores want oldest first.
        Ok(items
            .into_iter()
            .rev()
            .map(|raw| Round {
                issue: raw.issue_number,
                number: raw.number,
                color: raw.color,
                observed_at,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_history_payload() {
        let body = r#"{
            "data": {
                "list": [
                    {"issueNumber": "20240806102", "number": 7, "color": "green"},
                    {"issueNumber": "20240806101", "number": "3", "color": "red"}
                ]
            }
        }"#;
        let payload: HistoryResponse = serde_json::from_str(body).unwrap();
        let list = payload.data.unwrap().list;
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].issue_number, "20240806102");
        assert_eq!(list[0].number, 7);
        // quoted numbers are coerced
        assert_eq!(list[1].number, 3);
    }

    #[test]
    fn test_parse_empty_payload() {
        let payload: HistoryResponse = serde_json::from_str("{}").unwrap();
        assert!(payload.data.is_none());
    }

    #[test]
    fn test_parse_rejects_garbage_number() {
        let body = r#"{"issueNumber": "1", "number": "abc", "color": ""}"#;
        let parsed: std::result::Result<RawRound, _> = serde_json::from_str(body);
        assert!(parsed.is_err());
    }
}
