/*!
Test Harness pour le moteur de flotte

Câble un `FleetEngine` complet sur les mocks HTTP/SSH, avec les réglages de
production (5s / 3s / 30s / TTL 10s) : à utiliser sous `start_paused = true`.
*/

use crate::fixtures::{camera, health_payload, snapshot_url, status_url, HOST_LINE};
use crate::mock_executor::MockCommandExecutor;
use crate::mock_transport::MockHttpTransport;
use picam_kernel::engine::{EngineSettings, FleetEngine};
use picam_kernel::transport::TransportError;
use std::sync::Arc;
use std::time::Duration;

pub struct TestHarness {
    pub engine: FleetEngine,
    pub http: MockHttpTransport,
    pub executor: MockCommandExecutor,
}

impl TestHarness {
    pub fn new(ids: &[&str]) -> Self {
        Self::with_settings(ids, EngineSettings::default())
    }

    pub fn with_settings(ids: &[&str], settings: EngineSettings) -> Self {
        env_logger::try_init().ok(); // Init logging pour tests

        let http = MockHttpTransport::new();
        let executor = MockCommandExecutor::new();
        let cameras = ids.iter().map(|id| camera(id)).collect();
        let engine = FleetEngine::new(cameras, Arc::new(http.clone()), Arc::new(executor.clone()), settings);

        Self { engine, http, executor }
    }

    pub fn camera_up(&self, id: &str) -> &Self {
        self.http.set_json(&status_url(id), health_payload(id, false));
        self
    }

    pub fn camera_up_with_mode(&self, id: &str, hdr: bool) -> &Self {
        self.http.set_json(&status_url(id), health_payload(id, hdr));
        self
    }

    pub fn camera_down(&self, id: &str) -> &Self {
        self.http.set_json_error(&status_url(id), TransportError::Timeout(status_url(id)));
        self
    }

    /// Service injoignable puis joignable `delay` après cet appel
    pub fn camera_up_after(&self, id: &str, delay: Duration) -> &Self {
        self.http.set_json_after(&status_url(id), health_payload(id, false), delay);
        self
    }

    /// /status répond, mais chaque appel met `delay` (`Duration::ZERO` pour revenir à la normale)
    pub fn camera_slow(&self, id: &str, delay: Duration) -> &Self {
        self.http.set_delay(&status_url(id), delay);
        self
    }

    pub fn host_up(&self, id: &str) -> &Self {
        self.executor.host_up(id, HOST_LINE);
        self
    }

    pub fn host_down(&self, id: &str) -> &Self {
        self.executor.host_down(id);
        self
    }

    pub fn snapshot(&self, id: &str, data: &[u8]) -> &Self {
        self.http.set_bytes(&snapshot_url(id), data, "image/jpeg");
        self
    }

    pub fn snapshot_down(&self, id: &str) -> &Self {
        self.http.set_bytes_error(&snapshot_url(id), TransportError::Timeout(snapshot_url(id)));
        self
    }

    pub fn snapshot_fetches(&self, id: &str) -> usize {
        self.http.fetch_count(&snapshot_url(id))
    }

    pub fn status_fetches(&self, id: &str) -> usize {
        self.http.fetch_count(&status_url(id))
    }
}
