//! Snapshot cache: last image per camera, fresh for a fixed TTL, and kept
//! afterwards as a stale fallback until a fetch succeeds again.

use crate::config::CameraConfig;
use crate::state::FleetStore;
use crate::transport::HttpTransport;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::time::Instant;
use tracing::{debug, warn};

pub const SNAPSHOT_TTL: Duration = Duration::from_secs(10);
pub const SNAPSHOT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub struct SnapshotEntry {
    pub data: Vec<u8>,
    pub content_type: String,
    pub fetched_at: Instant,
}

impl SnapshotEntry {
    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Camera not found: {0}")]
    NotFound(String),
    #[error("no snapshot available for {id}: {reason}")]
    Unavailable { id: String, reason: String },
}

pub struct SnapshotCache {
    store: Arc<FleetStore>,
    http: Arc<dyn HttpTransport>,
    entries: Mutex<HashMap<String, Arc<SnapshotEntry>>>,
    ttl: Duration,
    fetch_timeout: Duration,
}

impl SnapshotCache {
    pub fn new(store: Arc<FleetStore>, http: Arc<dyn HttpTransport>) -> Self {
        Self::with_ttl(store, http, SNAPSHOT_TTL, SNAPSHOT_FETCH_TIMEOUT)
    }

    pub fn with_ttl(store: Arc<FleetStore>, http: Arc<dyn HttpTransport>, ttl: Duration, fetch_timeout: Duration) -> Self {
        Self { store, http, entries: Mutex::new(HashMap::new()), ttl, fetch_timeout }
    }

    /// Entrée en cache (fraîche ou non), sans déclencher de fetch
    pub fn cached(&self, id: &str) -> Option<Arc<SnapshotEntry>> {
        self.entries.lock().get(id).cloned()
    }

    pub async fn get_snapshot(&self, id: &str) -> Result<Arc<SnapshotEntry>, SnapshotError> {
        let cam = self.store.config(id).ok_or_else(|| SnapshotError::NotFound(id.to_string()))?;

        let cached = self.cached(id);
        if let Some(entry) = &cached {
            if entry.age() < self.ttl {
                return Ok(Arc::clone(entry));
            }
        }

        match self.refresh(&cam).await {
            Ok(entry) => Ok(entry),
            Err(reason) => match cached {
                Some(stale) => {
                    warn!(device = id, age_secs = stale.age().as_secs(), error = %reason, "snapshot fetch failed, serving stale image");
                    Ok(stale)
                }
                None => Err(SnapshotError::Unavailable { id: id.to_string(), reason }),
            },
        }
    }

    async fn refresh(&self, cam: &CameraConfig) -> Result<Arc<SnapshotEntry>, String> {
        let fetched = self
            .http
            .fetch_bytes(&cam.snapshot_url, self.fetch_timeout)
            .await
            .map_err(|e| e.to_string())?;

        let entry = Arc::new(SnapshotEntry {
            data: fetched.data,
            content_type: fetched.content_type,
            fetched_at: Instant::now(),
        });
        self.entries.lock().insert(cam.id.clone(), Arc::clone(&entry));
        self.store.update(&cam.id, |st| st.snapshot_fetched = Some(OffsetDateTime::now_utc()));
        debug!(device = %cam.id, bytes = entry.data.len(), "snapshot refreshed");
        Ok(entry)
    }
}
