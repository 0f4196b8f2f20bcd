//! Per-tender notification messages, published strictly after the
//! owning transaction commits. Subscribers filter on the `category`
//! message attribute, so duplicates are tolerated downstream.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::HTTP_REQUEST_TIMEOUT;
use crate::normalize::{Source, TenderRecord};

const SUBJECT_MAX_CHARS: usize = 95;
const BODY_DESCRIPTION_MAX_CHARS: usize = 300;

/// Everything needed to notify about one upserted tender. Buffered per
/// batch and only handed to a publisher after commit.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishIntent {
    pub tender_id: i64,
    pub source: Source,
    pub title: Option<String>,
    pub category: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub closing_at: Option<DateTime<Utc>>,
    pub url: Option<String>,
    pub description: Option<String>,
}

impl PublishIntent {
    pub fn new(tender_id: i64, source: Source, tender: &TenderRecord) -> Self {
        Self {
            tender_id,
            source,
            title: tender.title.clone(),
            category: tender.category.clone(),
            published_at: tender.published_at,
            closing_at: tender.closing_at,
            url: tender.url.clone(),
            description: tender.description.clone(),
        }
    }

    /// `New {category} tender: {title}`, truncated to 95 characters.
    pub fn subject(&self) -> String {
        let category = self.category.as_deref().unwrap_or(self.source.as_str());
        let title = self.title.as_deref().unwrap_or("(untitled)");
        let subject = format!("New {category} tender: {title}");
        truncate_chars(&subject, SUBJECT_MAX_CHARS)
    }

    /// Lowercased category attribute used by subscriber filter policies.
    pub fn attribute_category(&self) -> String {
        self.category
            .as_deref()
            .map(str::to_string)
            .unwrap_or_else(|| self.source.as_str().to_string())
            .to_lowercase()
    }

    pub fn body(&self) -> Value {
        json!({
            "tenderId": self.tender_id,
            "title": self.title,
            "category": self.category,
            "source": self.source.as_str(),
            "published_at": self.published_at,
            "closing_at": self.closing_at,
            "url": self.url,
            "description": self
                .description
                .as_deref()
                .map(|d| truncate_chars(d, BODY_DESCRIPTION_MAX_CHARS)),
        })
    }
}

fn truncate_chars(raw: &str, max: usize) -> String {
    if raw.chars().count() <= max {
        raw.to_string()
    } else {
        raw.chars().take(max).collect()
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("publish request failed: {0}")]
    Network(String),
    #[error("topic returned status {0}")]
    Status(u16),
}

#[async_trait]
pub trait TenderPublisher: Send + Sync {
    async fn publish(&self, intent: &PublishIntent) -> Result<(), PublishError>;

    /// Create a filtered subscription: the endpoint only receives
    /// messages whose `category` attribute is in the filter set.
    async fn subscribe(&self, endpoint: &str, category: &str) -> Result<(), PublishError>;
}

/// HTTP client for the notification topic configured by
/// `TENDER_TOPIC_ARN`.
pub struct HttpTopicPublisher {
    topic: String,
    client: reqwest::Client,
}

impl HttpTopicPublisher {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            client: reqwest::Client::builder()
                .timeout(HTTP_REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    async fn post(&self, path: &str, payload: &Value) -> Result<(), PublishError> {
        let resp = self
            .client
            .post(format!("{}/{path}", self.topic.trim_end_matches('/')))
            .json(payload)
            .send()
            .await
            .map_err(|e| PublishError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(PublishError::Status(resp.status().as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl TenderPublisher for HttpTopicPublisher {
    async fn publish(&self, intent: &PublishIntent) -> Result<(), PublishError> {
        let payload = json!({
            "subject": intent.subject(),
            "message": intent.body(),
            "attributes": { "category": intent.attribute_category() },
        });
        self.post("publish", &payload).await
    }

    async fn subscribe(&self, endpoint: &str, category: &str) -> Result<(), PublishError> {
        let payload = json!({
            "endpoint": endpoint,
            "filter_policy": { "category": [category] },
        });
        self.post("subscriptions", &payload).await
    }
}

/// Test publisher that records every message; can be flipped into a
/// failing mode to exercise best-effort publish handling.
#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<PublishIntent>>,
    subscriptions: Mutex<Vec<(String, String)>>,
    fail: std::sync::atomic::AtomicBool,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, fail: bool) {
        self.fail.store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<PublishIntent> {
        self.published.lock().unwrap().clone()
    }

    pub fn subscriptions(&self) -> Vec<(String, String)> {
        self.subscriptions.lock().unwrap().clone()
    }
}

#[async_trait]
impl TenderPublisher for RecordingPublisher {
    async fn publish(&self, intent: &PublishIntent) -> Result<(), PublishError> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(PublishError::Status(500));
        }
        self.published.lock().unwrap().push(intent.clone());
        Ok(())
    }

    async fn subscribe(&self, endpoint: &str, category: &str) -> Result<(), PublishError> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(PublishError::Status(500));
        }
        self.subscriptions
            .lock()
            .unwrap()
            .push((endpoint.to_string(), category.to_string()));
        Ok(())
    }
}
