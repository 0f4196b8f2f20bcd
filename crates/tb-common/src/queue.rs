//! Ingest queue plumbing: the object-created event envelope and a small
//! receive/delete client abstraction over the queue endpoint.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::config::HTTP_REQUEST_TIMEOUT;

/// One object-created notification, reduced to what the worker needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectCreated {
    pub bucket: String,
    pub key: String,
}

#[derive(Debug, Deserialize)]
struct S3Envelope {
    #[serde(rename = "Records")]
    records: Vec<S3Record>,
}

#[derive(Debug, Deserialize)]
struct S3Record {
    s3: S3Entity,
}

#[derive(Debug, Deserialize)]
struct S3Entity {
    bucket: S3Bucket,
    object: S3Object,
}

#[derive(Debug, Deserialize)]
struct S3Bucket {
    name: String,
}

#[derive(Debug, Deserialize)]
struct S3Object {
    key: String,
}

#[derive(Debug, Deserialize)]
struct FlatNotification {
    bucket: String,
    key: String,
}

/// Decode a queue message body into its notifications.
///
/// Both the S3-style `{Records: [{s3: ...}]}` envelope and the flat
/// `{bucket, key}` shape (single or array) are accepted; anything else
/// yields an empty list for the caller to log and skip.
pub fn parse_event(body: &str) -> Vec<ObjectCreated> {
    if let Ok(envelope) = serde_json::from_str::<S3Envelope>(body) {
        return envelope
            .records
            .into_iter()
            .map(|record| ObjectCreated {
                bucket: record.s3.bucket.name,
                key: record.s3.object.key,
            })
            .collect();
    }

    if let Ok(flat) = serde_json::from_str::<FlatNotification>(body) {
        return vec![ObjectCreated {
            bucket: flat.bucket,
            key: flat.key,
        }];
    }

    if let Ok(many) = serde_json::from_str::<Vec<FlatNotification>>(body) {
        return many
            .into_iter()
            .map(|n| ObjectCreated {
                bucket: n.bucket,
                key: n.key,
            })
            .collect();
    }

    Vec::new()
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue request failed: {0}")]
    Network(String),
    #[error("queue returned status {0}")]
    Status(u16),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub id: String,
    pub body: String,
}

#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Long-poll up to `max` messages; an empty vec means the queue is idle.
    async fn receive(&self, max: usize) -> Result<Vec<QueueMessage>, QueueError>;
    /// Acknowledge a fully-handled message so it is not redelivered.
    async fn delete(&self, message: &QueueMessage) -> Result<(), QueueError>;
}

#[derive(Debug, Deserialize)]
struct ReceivedMessage {
    id: String,
    body: String,
}

pub struct HttpQueueClient {
    queue_url: String,
    client: reqwest::Client,
}

impl HttpQueueClient {
    pub fn new(queue_url: impl Into<String>) -> Self {
        Self {
            queue_url: queue_url.into(),
            client: reqwest::Client::builder()
                .timeout(HTTP_REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl QueueClient for HttpQueueClient {
    async fn receive(&self, max: usize) -> Result<Vec<QueueMessage>, QueueError> {
        let resp = self
            .client
            .post(format!("{}/receive", self.queue_url.trim_end_matches('/')))
            .json(&serde_json::json!({ "max": max }))
            .send()
            .await
            .map_err(|e| QueueError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(QueueError::Status(resp.status().as_u16()));
        }

        let messages: Vec<ReceivedMessage> = resp
            .json()
            .await
            .map_err(|e| QueueError::Network(e.to_string()))?;

        Ok(messages
            .into_iter()
            .map(|m| QueueMessage {
                id: m.id,
                body: m.body,
            })
            .collect())
    }

    async fn delete(&self, message: &QueueMessage) -> Result<(), QueueError> {
        let resp = self
            .client
            .post(format!("{}/delete", self.queue_url.trim_end_matches('/')))
            .json(&serde_json::json!({ "id": message.id }))
            .send()
            .await
            .map_err(|e| QueueError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(QueueError::Status(resp.status().as_u16()));
        }
        Ok(())
    }
}

/// In-memory FIFO queue for tests. Deleted messages are retained so
/// assertions can check acknowledgement behavior.
#[derive(Default)]
pub struct MemoryQueue {
    pending: Mutex<VecDeque<QueueMessage>>,
    deleted: Mutex<Vec<String>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, id: &str, body: &str) {
        self.pending.lock().unwrap().push_back(QueueMessage {
            id: id.to_string(),
            body: body.to_string(),
        });
    }

    pub fn deleted_ids(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().unwrap().len()
    }
}

#[async_trait]
impl QueueClient for MemoryQueue {
    async fn receive(&self, max: usize) -> Result<Vec<QueueMessage>, QueueError> {
        let mut pending = self.pending.lock().unwrap();
        let take = max.min(pending.len());
        Ok(pending.drain(..take).collect())
    }

    async fn delete(&self, message: &QueueMessage) -> Result<(), QueueError> {
        self.deleted.lock().unwrap().push(message.id.clone());
        Ok(())
    }
}
