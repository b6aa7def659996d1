/*!
Fixtures : configs de caméras et payloads /status prêts à l'emploi
*/

use picam_kernel::config::{CameraConfig, PiConf, SshConf};
use serde_json::{json, Value};

pub const HOST_LINE: &str = "0.52 0.48 0.41|37|52.1";

pub fn camera(id: &str) -> CameraConfig {
    CameraConfig {
        id: id.to_string(),
        name: format!("Camera {id}"),
        status_url: status_url(id),
        stream_url: format!("https://{id}.local:8443/stream.mjpg"),
        snapshot_url: snapshot_url(id),
        ssh: SshConf {
            host: format!("{id}.local"),
            port: 22,
            username: "pi".into(),
            private_key: "/home/test/.ssh/id_ed25519".into(),
        },
        pi: PiConf {
            env_file: "/home/pi/picamera/.env".into(),
            service: "picamera".into(),
            mode_key: "HDR".into(),
        },
    }
}

pub fn status_url(id: &str) -> String {
    format!("https://{id}.local:8443/status")
}

pub fn snapshot_url(id: &str) -> String {
    format!("https://{id}.local:8443/snapshot.jpg")
}

/// Payload /status valide (contrat du Pi)
pub fn health_payload(name: &str, hdr: bool) -> Value {
    json!({
        "name": name,
        "uptime_seconds": 3723,
        "resolution": "1920x1080",
        "hdr": hdr,
        "clients": 1,
        "timestamp": "2026-10-18T12:00:00Z"
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use picam_kernel::models::CameraStatus;

    #[test]
    fn test_health_payload_matches_contract() {
        let st: CameraStatus = serde_json::from_value(health_payload("garden", true)).unwrap();
        assert_eq!(st.name, "garden");
        assert!(st.hdr);
    }

    #[test]
    fn test_camera_urls() {
        let cam = camera("porch");
        assert_eq!(cam.status_url, "https://porch.local:8443/status");
        assert_eq!(cam.ssh.host, "porch.local");
    }
}
