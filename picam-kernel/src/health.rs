use serde::{Deserialize, Serialize};
use std::time::Instant;
use crate::engine::FleetEngine;

#[derive(Debug, Serialize, Deserialize)]
pub struct KernelHealth {
    pub uptime_seconds: u64,
    pub cameras_tracked: u32,
    pub services_reachable: u32,
    pub hosts_reachable: u32,
    pub memory_usage_mb: f32,
}

#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthTracker {
    pub fn new() -> Self {
        Self { start_time: Instant::now() }
    }

    pub fn get_health(&self, engine: &FleetEngine) -> KernelHealth {
        let devices = engine.list_devices();
        let services_reachable = devices.iter().filter(|d| d.service_reachable).count() as u32;
        let hosts_reachable = devices.iter().filter(|d| d.host_reachable).count() as u32;

        KernelHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            cameras_tracked: devices.len() as u32,
            services_reachable,
            hosts_reachable,
            memory_usage_mb: get_memory_usage_mb(),
        }
    }
}

fn get_memory_usage_mb() -> f32 {
    #[cfg(target_os = "linux")]
    {
        let pid = std::process::id();
        if let Ok(status) = std::fs::read_to_string(format!("/proc/{}/status", pid)) {
            for line in status.lines() {
                if let Some(rest) = line.strip_prefix("VmRSS:") {
                    if let Some(kb) = rest.split_whitespace().next().and_then(|k| k.parse::<u64>().ok()) {
                        return (kb as f32) / 1024.0; // KB -> MB
                    }
                }
            }
        }
    }

    // pas de /proc : valeur inconnue
    0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_usage_is_non_negative() {
        assert!(get_memory_usage_mb() >= 0.0);
    }
}
