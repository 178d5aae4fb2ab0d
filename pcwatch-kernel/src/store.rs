//! Read-only access to the documents written by the external monitor.
//!
//! Both documents are opaque JSON objects. Nothing is cached: every call goes
//! back to disk, so a read always sees whatever the monitor wrote last (or a
//! torn file if the monitor does not write atomically, which is reported as
//! corrupt and treated like a missing file).

use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected a JSON object, found {0}")]
    NotAnObject(&'static str),
}

#[derive(Debug, Clone)]
pub struct StateStore {
    status_path: Arc<PathBuf>,
    history_path: Arc<PathBuf>,
}

impl StateStore {
    pub fn new(status_path: impl Into<PathBuf>, history_path: impl Into<PathBuf>) -> Self {
        Self {
            status_path: Arc::new(status_path.into()),
            history_path: Arc::new(history_path.into()),
        }
    }

    /// Current status snapshot, or `None` if it is absent or unusable.
    pub async fn read_status(&self) -> Option<Value> {
        load_document("status", &self.status_path).await
    }

    /// Change history, or `None` if it is absent or unusable.
    pub async fn read_history(&self) -> Option<Value> {
        load_document("history", &self.history_path).await
    }
}

async fn load_document(kind: &'static str, path: &Path) -> Option<Value> {
    match read_document(path).await {
        Ok(Some(doc)) => Some(doc),
        Ok(None) => {
            debug!(kind, path = %path.display(), "document not written yet");
            None
        }
        Err(e) => {
            warn!(kind, path = %path.display(), error = %e, "ignoring unreadable document");
            None
        }
    }
}

async fn read_document(path: &Path) -> Result<Option<Value>, StoreError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let doc: Value = serde_json::from_str(&content)?;
    if !doc.is_object() {
        return Err(StoreError::NotAnObject(json_kind(&doc)));
    }
    Ok(Some(doc))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store_in(dir: &Path) -> StateStore {
        StateStore::new(dir.join("status.json"), dir.join("history.json"))
    }

    #[tokio::test]
    async fn test_missing_documents_are_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        assert!(store.read_status().await.is_none());
        assert!(store.read_history().await.is_none());
    }

    #[tokio::test]
    async fn test_status_passes_through_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let doc = json!({
            "lastUpdate": "2026-10-16 08:00:00",
            "computers": [{"name": "PC-01", "online": true, "rdp": {"port": 3389, "open": false}}],
            "custom": null
        });
        std::fs::write(dir.path().join("status.json"), doc.to_string()).unwrap();

        assert_eq!(store_in(dir.path()).read_status().await, Some(doc));
    }

    #[tokio::test]
    async fn test_rereads_after_external_write() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let path = dir.path().join("history.json");

        std::fs::write(&path, r#"{"eventCount": 1}"#).unwrap();
        assert_eq!(store.read_history().await, Some(json!({"eventCount": 1})));

        std::fs::write(&path, r#"{"eventCount": 2}"#).unwrap();
        assert_eq!(store.read_history().await, Some(json!({"eventCount": 2})));
    }

    #[tokio::test]
    async fn test_corrupt_or_torn_document_is_none() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("status.json"), r#"{"computers": [{"name": "PC"#).unwrap();

        assert!(store_in(dir.path()).read_status().await.is_none());
    }

    #[tokio::test]
    async fn test_non_utf8_document_is_none() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("status.json"), [0xff, 0xfe, b'{', b'}']).unwrap();

        let err = read_document(&dir.path().join("status.json")).await.unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
        assert!(store_in(dir.path()).read_status().await.is_none());
    }

    #[tokio::test]
    async fn test_non_object_document_is_none() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("status.json"), "[1, 2, 3]").unwrap();

        let err = read_document(&dir.path().join("status.json")).await.unwrap_err();
        assert!(matches!(err, StoreError::NotAnObject("an array")));
        assert!(store_in(dir.path()).read_status().await.is_none());
    }
}
