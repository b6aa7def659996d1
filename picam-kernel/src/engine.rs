/**
 * FLEET ENGINE - Façade unique consommée par la couche HTTP
 *
 * Construit explicitement au démarrage : store + poller + orchestrateur +
 * cache snapshots partagent le même `Arc<FleetStore>`, pas de singleton global.
 */

use crate::config::{AppConfig, CameraConfig};
use crate::models::DeviceState;
use crate::orchestrator::{ActionError, ActionOrchestrator, ConvergencePolicy};
use crate::poller::{PollSettings, Poller, PollerHandle};
use crate::remote::CommandExecutor;
use crate::snapshot::{SnapshotCache, SnapshotEntry, SnapshotError};
use crate::state::FleetStore;
use crate::transport::HttpTransport;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Camera not found: {0}")]
    NotFound(String),
    #[error("Invalid action: {0}")]
    InvalidAction(String),
    #[error("Action failed: {message}")]
    ActionFailed { message: String, state: Option<DeviceState> },
    #[error("{0}")]
    SnapshotUnavailable(String),
}

impl From<ActionError> for EngineError {
    fn from(e: ActionError) -> Self {
        match e {
            ActionError::NotFound(id) => EngineError::NotFound(id),
            ActionError::InvalidAction(u) => EngineError::InvalidAction(u.0),
            ActionError::Failed { message, state } => EngineError::ActionFailed { message, state },
        }
    }
}

impl From<SnapshotError> for EngineError {
    fn from(e: SnapshotError) -> Self {
        match e {
            SnapshotError::NotFound(id) => EngineError::NotFound(id),
            unavailable @ SnapshotError::Unavailable { .. } => EngineError::SnapshotUnavailable(unavailable.to_string()),
        }
    }
}

/// Réglages temporels du moteur (surchargés en test)
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub poll: PollSettings,
    pub convergence: ConvergencePolicy,
    pub snapshot_ttl: Duration,
    pub snapshot_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            poll: PollSettings::default(),
            convergence: ConvergencePolicy::default(),
            snapshot_ttl: crate::snapshot::SNAPSHOT_TTL,
            snapshot_timeout: crate::snapshot::SNAPSHOT_FETCH_TIMEOUT,
        }
    }
}

impl EngineSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self { poll: PollSettings::from_config(cfg), ..Self::default() }
    }
}

#[derive(Clone)]
pub struct FleetEngine {
    store: Arc<FleetStore>,
    poller: Arc<Poller>,
    orchestrator: Arc<ActionOrchestrator>,
    snapshots: Arc<SnapshotCache>,
}

impl FleetEngine {
    pub fn new(
        cameras: Vec<CameraConfig>,
        http: Arc<dyn HttpTransport>,
        executor: Arc<dyn CommandExecutor>,
        settings: EngineSettings,
    ) -> Self {
        let store = Arc::new(FleetStore::new(cameras));
        let poller = Arc::new(Poller::new(store.clone(), http.clone(), executor.clone(), settings.poll));
        let orchestrator = Arc::new(ActionOrchestrator::new(
            store.clone(),
            poller.clone(),
            executor,
            settings.convergence,
        ));
        let snapshots = Arc::new(SnapshotCache::with_ttl(
            store.clone(),
            http,
            settings.snapshot_ttl,
            settings.snapshot_timeout,
        ));
        Self { store, poller, orchestrator, snapshots }
    }

    /// Lance le polling périodique ; garder le handle pour pouvoir l'arrêter
    pub fn start(&self) -> PollerHandle {
        self.poller.spawn()
    }

    pub fn store(&self) -> &Arc<FleetStore> {
        &self.store
    }

    pub fn poll_interval(&self) -> Duration {
        self.poller.settings().interval
    }

    pub fn list_devices(&self) -> Vec<DeviceState> {
        self.store.list()
    }

    pub fn get_device(&self, id: &str) -> Result<DeviceState, EngineError> {
        self.store.get(id).ok_or_else(|| EngineError::NotFound(id.to_string()))
    }

    pub fn device_config(&self, id: &str) -> Result<Arc<CameraConfig>, EngineError> {
        self.store.config(id).ok_or_else(|| EngineError::NotFound(id.to_string()))
    }

    pub async fn poll_device(&self, id: &str) -> Result<DeviceState, EngineError> {
        self.poller.poll_device(id).await.ok_or_else(|| EngineError::NotFound(id.to_string()))
    }

    pub async fn get_snapshot(&self, id: &str) -> Result<Arc<SnapshotEntry>, EngineError> {
        Ok(self.snapshots.get_snapshot(id).await?)
    }

    pub async fn perform_action(&self, id: &str, action: &str) -> Result<DeviceState, EngineError> {
        Ok(self.orchestrator.perform(id, action).await?)
    }

    pub async fn unit_status(&self, id: &str) -> Result<String, EngineError> {
        Ok(self.orchestrator.unit_status(id).await?)
    }
}
