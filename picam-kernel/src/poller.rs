/**
 * POLLER DOUBLE SONDE - Surveillance continue de chaque caméra
 *
 * RÔLE :
 * Pour chaque device, en boucle : sonde caméra (GET /status) + sonde hôte
 * (commande SSH load|mem|temp), fusionnées dans le `FleetStore`.
 *
 * FONCTIONNEMENT :
 * - Les deux sondes d'un cycle partent en parallèle (`tokio::join!`)
 * - Le cycle n'écrit qu'une fois les deux terminées : un seul update
 *   (résultats caméra + hôte + last_checked) => pas de cycle à moitié visible
 * - Une tâche par device, intervalle fixe, premier tick immédiat
 * - Un device lent/planté ne retarde que lui-même
 * - `poll_device` est aussi appelable hors cycle (orchestrateur)
 * - Chaque cycle prend un numéro à son départ ; un cycle qui termine après
 *   un cycle plus récent du même device est ignoré (l'état ne recule jamais)
 */

use crate::config::{AppConfig, CameraConfig};
use crate::models::{CameraStatus, DeviceState, HostInfo};
use crate::remote::CommandExecutor;
use crate::state::FleetStore;
use crate::transport::HttpTransport;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Une seule ligne `load|mem_pct|temp_c`
pub const HOST_PROBE_COMMAND: &str = r#"echo "$(cut -d' ' -f1-3 /proc/loadavg)|$(free | awk '/^Mem:/ {printf "%d", $3*100/$2}')|$(awk '{printf "%.1f", $1/1000}' /sys/class/thermal/thermal_zone0/temp)""#;

#[derive(Debug, Clone)]
pub struct PollSettings {
    pub interval: Duration,
    pub fetch_timeout: Duration,
    pub host_timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            fetch_timeout: Duration::from_secs(4),
            host_timeout: Duration::from_secs(10),
        }
    }
}

impl PollSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        let defaults = Self::default();
        Self {
            interval: cfg.poll.interval().unwrap_or(defaults.interval),
            fetch_timeout: cfg.poll.fetch_timeout().unwrap_or(defaults.fetch_timeout),
            host_timeout: defaults.host_timeout,
        }
    }
}

pub struct Poller {
    store: Arc<FleetStore>,
    http: Arc<dyn HttpTransport>,
    executor: Arc<dyn CommandExecutor>,
    settings: PollSettings,
    next_cycle: AtomicU64,
    /// dernier numéro de cycle appliqué, par device
    applied: Mutex<HashMap<String, u64>>,
}

impl Poller {
    pub fn new(
        store: Arc<FleetStore>,
        http: Arc<dyn HttpTransport>,
        executor: Arc<dyn CommandExecutor>,
        settings: PollSettings,
    ) -> Self {
        Self {
            store,
            http,
            executor,
            settings,
            next_cycle: AtomicU64::new(1),
            applied: Mutex::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    async fn probe_camera(&self, cam: &CameraConfig) -> Result<CameraStatus, String> {
        let payload = self
            .http
            .fetch_json(&cam.status_url, self.settings.fetch_timeout)
            .await
            .map_err(|e| e.to_string())?;
        serde_json::from_value(payload).map_err(|e| format!("Invalid status payload from {}: {e}", cam.status_url))
    }

    async fn probe_host(&self, cam: &CameraConfig) -> Result<HostInfo, String> {
        match tokio::time::timeout(self.settings.host_timeout, self.executor.execute(cam, HOST_PROBE_COMMAND)).await {
            Ok(Ok(output)) => Ok(parse_host_line(&output)),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("host probe timed out after {}s", self.settings.host_timeout.as_secs())),
        }
    }

    /// Un cycle complet pour un device ; `None` si l'id est inconnu
    pub async fn poll_device(&self, id: &str) -> Option<DeviceState> {
        let cam = self.store.config(id)?;
        let cycle = self.next_cycle.fetch_add(1, Ordering::Relaxed);
        let (camera, host) = tokio::join!(self.probe_camera(&cam), self.probe_host(&cam));

        let mut flips = (None, None);
        let mut superseded = false;
        let next = self.store.update(id, |st| {
            let mut applied = self.applied.lock();
            let last = applied.entry(id.to_string()).or_insert(0);
            if cycle < *last {
                superseded = true;
                return;
            }
            *last = cycle;

            let was = (st.service_reachable, st.host_reachable);
            apply_cycle(st, camera, host, OffsetDateTime::now_utc());
            if st.service_reachable != was.0 {
                flips.0 = Some(st.service_reachable);
            }
            if st.host_reachable != was.1 {
                flips.1 = Some(st.host_reachable);
            }
        })?;

        if superseded {
            debug!(device = id, cycle, "poll cycle overtaken by a newer one, result dropped");
            return Some(next);
        }

        match flips.0 {
            Some(true) => info!(device = id, "camera service reachable"),
            Some(false) => warn!(device = id, error = next.service_error.as_deref().unwrap_or(""), "camera service unreachable"),
            None => {}
        }
        match flips.1 {
            Some(true) => info!(device = id, "host reachable"),
            Some(false) => warn!(device = id, error = next.host_error.as_deref().unwrap_or(""), "host unreachable"),
            None => {}
        }
        debug!(
            device = id,
            service = next.service_reachable,
            host = next.host_reachable,
            "poll cycle complete"
        );

        Some(next)
    }

    /// Démarre une tâche de polling par device
    pub fn spawn(self: &Arc<Self>) -> PollerHandle {
        let tasks = self
            .store
            .configs()
            .into_iter()
            .map(|cam| {
                let poller = Arc::clone(self);
                tokio::spawn(async move { poller.run_device(cam.id.clone()).await })
            })
            .collect::<Vec<_>>();

        info!(
            devices = tasks.len(),
            interval_secs = self.settings.interval.as_secs(),
            "poller started"
        );
        PollerHandle { tasks }
    }

    async fn run_device(&self, id: String) {
        let mut interval = tokio::time::interval(self.settings.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            self.poll_device(&id).await;
        }
    }
}

/// Tâches de polling en cours ; `shutdown` les annule toutes
pub struct PollerHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl PollerHandle {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn running(&self) -> usize {
        self.tasks.iter().filter(|t| !t.is_finished()).count()
    }

    pub async fn shutdown(self) {
        for task in &self.tasks {
            task.abort();
        }
        for task in self.tasks {
            let _ = task.await;
        }
        info!("poller stopped");
    }
}

fn apply_cycle(
    st: &mut DeviceState,
    camera: Result<CameraStatus, String>,
    host: Result<HostInfo, String>,
    at: OffsetDateTime,
) {
    match camera {
        Ok(status) => {
            st.service_status = Some(status);
            st.service_reachable = true;
            st.service_error = None;
        }
        Err(e) => {
            st.service_status = None;
            st.service_reachable = false;
            st.service_error = Some(e);
        }
    }
    match host {
        Ok(info) => {
            st.host_info = Some(info);
            st.host_reachable = true;
            st.host_error = None;
        }
        Err(e) => {
            st.host_info = None;
            st.host_reachable = false;
            st.host_error = Some(e);
        }
    }
    st.last_checked = Some(at);
}

/// Champs manquants ou illisibles : "?", 0, 0.0
pub fn parse_host_line(output: &str) -> HostInfo {
    let line = output.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    let mut fields = line.split('|').map(str::trim);

    let load = match fields.next() {
        Some(l) if !l.is_empty() => l.to_string(),
        _ => "?".to_string(),
    };
    let mem_pct = fields
        .next()
        .and_then(|m| m.parse::<u32>().ok().or_else(|| m.parse::<f32>().ok().map(|f| f.round() as u32)))
        .unwrap_or(0);
    let temp_c = fields.next().and_then(|t| t.parse::<f32>().ok()).unwrap_or(0.0);

    HostInfo { load, mem_pct, temp_c }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_line() {
        let info = parse_host_line("0.42 0.35 0.30|37|51.5\n");
        assert_eq!(info, HostInfo { load: "0.42 0.35 0.30".into(), mem_pct: 37, temp_c: 51.5 });
    }

    #[test]
    fn test_parse_missing_fields_use_defaults() {
        assert_eq!(parse_host_line(""), HostInfo { load: "?".into(), mem_pct: 0, temp_c: 0.0 });
        assert_eq!(parse_host_line("1.00 0.90 0.80"), HostInfo { load: "1.00 0.90 0.80".into(), mem_pct: 0, temp_c: 0.0 });
        assert_eq!(parse_host_line("|abc|"), HostInfo { load: "?".into(), mem_pct: 0, temp_c: 0.0 });
    }

    #[test]
    fn test_parse_fractional_memory() {
        assert_eq!(parse_host_line("0.1|41.6|48.0").mem_pct, 42);
    }

    #[test]
    fn test_apply_cycle_keeps_probes_independent() {
        let mut st = DeviceState::new("cam");
        apply_cycle(
            &mut st,
            Err("Timeout fetching http://cam/status".into()),
            Ok(HostInfo { load: "0.1".into(), mem_pct: 10, temp_c: 40.0 }),
            OffsetDateTime::now_utc(),
        );
        assert!(!st.service_reachable);
        assert!(st.service_status.is_none());
        assert!(st.service_error.is_some());
        assert!(st.host_reachable);
        assert!(st.host_info.is_some());
        assert!(st.host_error.is_none());
        assert!(st.last_checked.is_some());
    }

    #[test]
    fn test_apply_cycle_host_failure_clears_info() {
        let mut st = DeviceState::new("cam");
        st.host_info = Some(HostInfo { load: "0.1".into(), mem_pct: 10, temp_c: 40.0 });
        st.host_reachable = true;
        apply_cycle(&mut st, Err("down".into()), Err("connection refused".into()), OffsetDateTime::now_utc());
        assert!(!st.host_reachable);
        assert!(st.host_info.is_none());
        assert_eq!(st.host_error.as_deref(), Some("connection refused"));
    }
}
