/*!
Mock CommandExecutor : remplace le client SSH dans les tests

Les réponses sont choisies par motif (sous-chaîne de la commande), optionnellement
restreintes à un device. La dernière règle ajoutée gagne. Chaque appel est
enregistré (device, commande) pour compter ce qui a réellement été envoyé.
*/

use async_trait::async_trait;
use picam_kernel::config::CameraConfig;
use picam_kernel::poller::HOST_PROBE_COMMAND;
use picam_kernel::remote::{CommandExecutor, RemoteExecutionError};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
struct Rule {
    device: Option<String>,
    pattern: String,
    result: Result<String, RemoteExecutionError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub device: String,
    pub command: String,
}

impl RecordedCall {
    pub fn is_host_probe(&self) -> bool {
        self.command == HOST_PROBE_COMMAND
    }
}

#[derive(Clone, Default)]
pub struct MockCommandExecutor {
    rules: Arc<Mutex<Vec<Rule>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl MockCommandExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toute commande contenant `pattern`, sur n'importe quel device
    pub fn respond(&self, pattern: &str, result: Result<String, RemoteExecutionError>) {
        self.rules.lock().unwrap().push(Rule { device: None, pattern: pattern.to_string(), result });
    }

    pub fn respond_for(&self, device: &str, pattern: &str, result: Result<String, RemoteExecutionError>) {
        self.rules.lock().unwrap().push(Rule {
            device: Some(device.to_string()),
            pattern: pattern.to_string(),
            result,
        });
    }

    pub fn host_up(&self, device: &str, line: &str) {
        self.respond_for(device, HOST_PROBE_COMMAND, Ok(line.to_string()));
    }

    pub fn host_down(&self, device: &str) {
        self.respond_for(
            device,
            HOST_PROBE_COMMAND,
            Err(RemoteExecutionError::Connection {
                host: format!("{device}.local"),
                message: "ssh: connect to host: No route to host".into(),
            }),
        );
    }

    /// systemctl / upsert .env réussissent partout
    pub fn actions_succeed(&self) {
        self.respond("systemctl", Ok(String::new()));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Appels hors sonde hôte (= commandes de contrôle)
    pub fn action_calls(&self) -> Vec<RecordedCall> {
        self.calls().into_iter().filter(|c| !c.is_host_probe()).collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl CommandExecutor for MockCommandExecutor {
    async fn execute(&self, device: &CameraConfig, command: &str) -> Result<String, RemoteExecutionError> {
        self.calls.lock().unwrap().push(RecordedCall {
            device: device.id.clone(),
            command: command.to_string(),
        });
        log::debug!("[mock-ssh] {} $ {}", device.id, command);

        let rules = self.rules.lock().unwrap();
        let rule = rules.iter().rev().find(|r| {
            command.contains(&r.pattern) && r.device.as_deref().map_or(true, |d| d == device.id)
        });
        match rule {
            Some(r) => r.result.clone(),
            None => Err(RemoteExecutionError::Connection {
                host: device.ssh.host.clone(),
                message: "no response scripted".into(),
            }),
        }
    }
}
