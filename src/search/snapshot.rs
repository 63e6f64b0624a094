//! Point-in-time snapshot handles.
//!
//! A snapshot lives for exactly one deep pagination or deep bucket
//! enumeration. [`Snapshot::release`] closes it and hands back the result of
//! the work done under it; if the owning future is dropped before that, the
//! handle is closed from a background task.

use crate::client::SearchBackend;
use crate::error::Result;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

pub struct Snapshot {
    backend: Arc<dyn SearchBackend>,
    id: Option<String>,
    keep_alive: String,
}

impl Snapshot {
    /// Open a snapshot on the backend
    pub async fn open(backend: Arc<dyn SearchBackend>, keep_alive: &str) -> Result<Self> {
        let id = backend.open_snapshot(keep_alive).await?;
        info!(keep_alive = keep_alive, "Opened point-in-time snapshot");
        Ok(Self {
            backend,
            id: Some(id),
            keep_alive: keep_alive.to_string(),
        })
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Pin a search request body to this snapshot
    pub fn stamp(&self, body: &mut Value) {
        if let (Some(id), Some(object)) = (&self.id, body.as_object_mut()) {
            object.insert(
                "pit".to_string(),
                json!({ "id": id, "keep_alive": self.keep_alive }),
            );
        }
    }

    /// The backend may hand out a new handle with every response
    pub fn update_from(&mut self, response: &Value) {
        if let Some(id) = response.get("pit_id").and_then(Value::as_str) {
            if self.id.as_deref() != Some(id) {
                self.id = Some(id.to_string());
            }
        }
    }

    /// Close the snapshot and return `outcome` unchanged.
    ///
    /// A failed close is logged; it never replaces `outcome`.
    pub async fn release<T>(mut self, outcome: Result<T>) -> Result<T> {
        if let Some(id) = self.id.take() {
            match self.backend.close_snapshot(&id).await {
                Ok(()) => info!("Closed point-in-time snapshot"),
                Err(e) => warn!(error = %e, "Failed to close point-in-time snapshot"),
            }
        }
        outcome
    }
}

impl Drop for Snapshot {
    fn drop(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let backend = self.backend.clone();
                handle.spawn(async move {
                    if let Err(e) = backend.close_snapshot(&id).await {
                        warn!(error = %e, "Failed to close abandoned point-in-time snapshot");
                    }
                });
            }
            Err(_) => {
                warn!("Point-in-time snapshot abandoned outside a runtime; left to expire");
            }
        }
    }
}
