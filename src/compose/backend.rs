use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("compose {0} not found")]
    NotFound(Uuid),

    #[error("compose backend unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComposeState {
    Pending,
    Building,
    Success,
    Failure,
}

/// A submitted compose as recorded by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposeEntry {
    pub id: Uuid,
    #[serde(skip)]
    pub org_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,
    pub status: ComposeState,
    pub request: Value,
}

impl ComposeEntry {
    fn image_types(&self) -> impl Iterator<Item = &str> {
        self.request
            .get("image_requests")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|r| r.get("image_type").and_then(Value::as_str))
    }
}

/// One page of an organization's composes, newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComposePage {
    /// Matching composes before paging.
    pub count: usize,
    pub data: Vec<ComposeEntry>,
}

/// Access to the service that performs image builds.
///
/// Every call is scoped to the caller's organization.
#[async_trait]
pub trait ComposeBackend: Send + Sync + std::fmt::Debug {
    /// Submit a validated compose request and return its id.
    async fn submit(&self, org_id: &str, request: Value) -> Result<Uuid, ComposeError>;

    async fn list(
        &self,
        org_id: &str,
        limit: usize,
        offset: usize,
        ignore_image_types: &[String],
    ) -> Result<ComposePage, ComposeError>;

    async fn status(&self, org_id: &str, id: Uuid) -> Result<ComposeEntry, ComposeError>;
}

/// Process-local backend. Composes stay pending forever.
#[derive(Debug, Default)]
pub struct MemoryComposeBackend {
    composes: DashMap<Uuid, ComposeEntry>,
}

impl MemoryComposeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.composes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.composes.is_empty()
    }
}

#[async_trait]
impl ComposeBackend for MemoryComposeBackend {
    async fn submit(&self, org_id: &str, request: Value) -> Result<Uuid, ComposeError> {
        let id = Uuid::new_v4();
        let entry = ComposeEntry {
            id,
            org_id: org_id.to_string(),
            created_at: Utc::now(),
            image_name: request
                .get("image_name")
                .and_then(Value::as_str)
                .map(str::to_string),
            status: ComposeState::Pending,
            request,
        };
        self.composes.insert(id, entry);
        tracing::debug!(compose_id = %id, org_id, "compose recorded");
        Ok(id)
    }

    async fn list(
        &self,
        org_id: &str,
        limit: usize,
        offset: usize,
        ignore_image_types: &[String],
    ) -> Result<ComposePage, ComposeError> {
        let mut matching: Vec<ComposeEntry> = self
            .composes
            .iter()
            .filter(|e| e.org_id == org_id)
            .filter(|e| !e.image_types().any(|t| ignore_image_types.iter().any(|i| i == t)))
            .map(|e| e.value().clone())
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));

        let count = matching.len();
        let data = matching.into_iter().skip(offset).take(limit).collect();
        Ok(ComposePage { count, data })
    }

    async fn status(&self, org_id: &str, id: Uuid) -> Result<ComposeEntry, ComposeError> {
        match self.composes.get(&id) {
            Some(entry) if entry.org_id == org_id => Ok(entry.value().clone()),
            _ => Err(ComposeError::NotFound(id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(image_type: &str) -> Value {
        json!({
            "distribution": "rhel-9",
            "image_name": "img",
            "image_requests": [{ "architecture": "x86_64", "image_type": image_type }]
        })
    }

    #[tokio::test]
    async fn test_submit_and_status_scoped_by_org() {
        let backend = MemoryComposeBackend::new();
        let id = backend.submit("o1", request("ami")).await.unwrap();

        let entry = backend.status("o1", id).await.unwrap();
        assert_eq!(entry.status, ComposeState::Pending);
        assert_eq!(entry.image_name.as_deref(), Some("img"));

        assert!(matches!(backend.status("o2", id).await, Err(ComposeError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_pages_and_filters() {
        let backend = MemoryComposeBackend::new();
        for _ in 0..3 {
            backend.submit("o1", request("ami")).await.unwrap();
        }
        backend.submit("o1", request("guest-image")).await.unwrap();
        backend.submit("o2", request("ami")).await.unwrap();

        let page = backend.list("o1", 2, 0, &[]).await.unwrap();
        assert_eq!(page.count, 4);
        assert_eq!(page.data.len(), 2);

        let rest = backend.list("o1", 100, 3, &[]).await.unwrap();
        assert_eq!(rest.data.len(), 1);

        let filtered = backend.list("o1", 100, 0, &["ami".to_string()]).await.unwrap();
        assert_eq!(filtered.count, 1);
        assert_eq!(filtered.data[0].image_types().collect::<Vec<_>>(), vec!["guest-image"]);
    }

    #[test]
    fn test_entry_serializes_without_org() {
        let entry = ComposeEntry {
            id: Uuid::nil(),
            org_id: "o1".to_string(),
            created_at: Utc::now(),
            image_name: None,
            status: ComposeState::Building,
            request: json!({}),
        };
        let v = serde_json::to_value(&entry).unwrap();
        assert!(v.get("org_id").is_none());
        assert_eq!(v["status"], "building");
    }
}
