use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Erreurs de chargement / validation de la configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0} (copy config.example.yaml to config.yaml and fill in your details)")]
    NotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub poll: PollConf,
    pub cameras: Vec<CameraConfig>,
}

/// Une caméra = endpoint HTTP /status + hôte SSH (le Pi)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CameraConfig {
    pub id: String,
    pub name: String,
    pub status_url: String,
    pub stream_url: String,
    pub snapshot_url: String,
    pub ssh: SshConf,
    pub pi: PiConf,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SshConf {
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    pub username: String,
    pub private_key: PathBuf,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PiConf {
    pub env_file: String, // ex: "/home/pi/picamera/.env"
    pub service: String,  // ex: "picamera.service"
    #[serde(default = "default_mode_key")]
    pub mode_key: String,
}

/// Surcharges optionnelles de la cadence de polling
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct PollConf {
    pub interval_secs: Option<u64>,
    pub fetch_timeout_secs: Option<u64>,
}

impl PollConf {
    pub fn interval(&self) -> Option<Duration> {
        self.interval_secs.map(Duration::from_secs)
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_secs.map(Duration::from_secs)
    }
}

fn default_port() -> u16 { 3000 }
fn default_ssh_port() -> u16 { 22 }
fn default_mode_key() -> String { "HDR".into() }

/// Charge la config depuis `PICAM_CONFIG` (ou `config.yaml` dans le cwd)
pub async fn load_config() -> Result<AppConfig, ConfigError> {
    let path = std::env::var("PICAM_CONFIG").unwrap_or_else(|_| "config.yaml".into());
    load_config_from(path).await
}

pub async fn load_config_from<P: AsRef<Path>>(path: P) -> Result<AppConfig, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let txt = fs::read_to_string(path).await?;
    parse_config(&txt)
}

pub fn parse_config(txt: &str) -> Result<AppConfig, ConfigError> {
    let mut cfg: AppConfig = serde_yaml::from_str(txt)?;
    for cam in &mut cfg.cameras {
        cam.ssh.private_key = expand_home(&cam.ssh.private_key);
    }
    validate(&cfg)?;
    Ok(cfg)
}

fn validate(cfg: &AppConfig) -> Result<(), ConfigError> {
    if cfg.cameras.is_empty() {
        return Err(ConfigError::Invalid("no cameras configured".into()));
    }
    if cfg.poll.interval_secs == Some(0) {
        return Err(ConfigError::Invalid("poll.interval_secs must be > 0".into()));
    }

    let mut seen = HashSet::new();
    for cam in &cfg.cameras {
        if cam.id.trim().is_empty() {
            return Err(ConfigError::Invalid(format!("camera '{}' has an empty id", cam.name)));
        }
        if !seen.insert(cam.id.as_str()) {
            return Err(ConfigError::Invalid(format!("duplicate camera id '{}'", cam.id)));
        }
        if !is_env_key(&cam.pi.mode_key) {
            return Err(ConfigError::Invalid(format!(
                "{}.pi.mode_key must match [A-Za-z_][A-Za-z0-9_]*: {:?}",
                cam.id, cam.pi.mode_key
            )));
        }
        for (field, url) in [
            ("status_url", &cam.status_url),
            ("stream_url", &cam.stream_url),
            ("snapshot_url", &cam.snapshot_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::Invalid(format!("{}.{field} is not an http(s) URL: {url}", cam.id)));
            }
        }
    }
    Ok(())
}

/// Nom de variable shell : injecté tel quel dans le motif grep et le script sed
fn is_env_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => chars.all(|c| c.is_ascii_alphanumeric() || c == '_'),
        _ => false,
    }
}

/// `~/.ssh/id_ed25519` -> `/home/<user>/.ssh/id_ed25519`
fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}
