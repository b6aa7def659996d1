use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

/// Payload renvoyé par l'endpoint /status du Pi
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CameraStatus {
    pub name: String,
    pub uptime_seconds: u64,
    pub resolution: String,
    pub hdr: bool,
    pub clients: u32,
    pub timestamp: String,
}

/// Résultat de la sonde hôte : `load|mem_pct|temp_c`
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HostInfo {
    pub load: String,
    pub mem_pct: u32,
    pub temp_c: f32,
}

/// État vivant d'une caméra, remplacé en bloc à chaque mise à jour
#[derive(Debug, Serialize, Clone, Default)]
pub struct DeviceState {
    pub id: String,
    pub service_status: Option<CameraStatus>,
    pub service_reachable: bool,
    pub service_error: Option<String>,
    pub host_reachable: bool,
    pub host_info: Option<HostInfo>,
    pub host_error: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_checked: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub snapshot_fetched: Option<OffsetDateTime>,
    pub last_action_error: Option<String>,
}

impl DeviceState {
    pub fn new(id: &str) -> Self {
        Self { id: id.to_string(), ..Default::default() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    Start,
    Stop,
    Restart,
    EnableMode,
    DisableMode,
}

impl ActionKind {
    pub const ALL: [ActionKind; 5] = [
        ActionKind::Start,
        ActionKind::Stop,
        ActionKind::Restart,
        ActionKind::EnableMode,
        ActionKind::DisableMode,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Start => "start",
            ActionKind::Stop => "stop",
            ActionKind::Restart => "restart",
            ActionKind::EnableMode => "enable-mode",
            ActionKind::DisableMode => "disable-mode",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown action: {0}")]
pub struct UnknownAction(pub String);

impl FromStr for ActionKind {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(ActionKind::Start),
            "stop" => Ok(ActionKind::Stop),
            "restart" => Ok(ActionKind::Restart),
            // anciens noms de l'UI (toggle HDR)
            "enable-mode" | "hdr_on" => Ok(ActionKind::EnableMode),
            "disable-mode" | "hdr_off" => Ok(ActionKind::DisableMode),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

/// 45 -> "45s", 750 -> "12m", 11040 -> "3h 4m", 176700 -> "2d 1h 5m"
pub fn format_uptime(seconds: u64) -> String {
    if seconds < 60 {
        return format!("{seconds}s");
    }
    let m = (seconds / 60) % 60;
    let h = (seconds / 3600) % 24;
    let d = seconds / 86400;
    if d > 0 {
        format!("{d}d {h}h {m}m")
    } else if h > 0 {
        format!("{h}h {m}m")
    } else {
        format!("{m}m")
    }
}
