/**
 * ORCHESTRATEUR D'ACTIONS - start/stop/restart/toggle mode sur une caméra
 *
 * RÔLE :
 * Exécute la commande distante d'une action puis re-polle le device jusqu'à
 * ce que l'état observé reflète l'action (convergence) ou qu'un délai expire.
 *
 * FONCTIONNEMENT :
 * 1. device inconnu -> NotFound, action inconnue -> InvalidAction (aucun SSH)
 * 2. une seule commande shell par action (`&&` entre les étapes)
 * 3. succès : `stop` = pause courte + 1 poll ; autres = poll toutes les 3s
 *    jusqu'à service joignable ou 30s écoulées (retour normal dans les deux cas)
 * 4. échec : 1 poll best-effort, `last_action_error` posé, erreur remontée
 *
 * Pas de verrou par device : une action en vol par caméra, par convention.
 */

use crate::config::PiConf;
use crate::models::{ActionKind, DeviceState, UnknownAction};
use crate::poller::Poller;
use crate::remote::CommandExecutor;
use crate::state::FleetStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ConvergencePolicy {
    /// pause avant l'unique poll après un `stop`
    pub stop_settle: Duration,
    pub poll_every: Duration,
    pub deadline: Duration,
}

impl Default for ConvergencePolicy {
    fn default() -> Self {
        Self {
            stop_settle: Duration::from_millis(1500),
            poll_every: Duration::from_secs(3),
            deadline: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("Camera not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    InvalidAction(#[from] UnknownAction),
    #[error("Action failed: {message}")]
    Failed { message: String, state: Option<DeviceState> },
}

pub struct ActionOrchestrator {
    store: Arc<FleetStore>,
    poller: Arc<Poller>,
    executor: Arc<dyn CommandExecutor>,
    policy: ConvergencePolicy,
}

impl ActionOrchestrator {
    pub fn new(
        store: Arc<FleetStore>,
        poller: Arc<Poller>,
        executor: Arc<dyn CommandExecutor>,
        policy: ConvergencePolicy,
    ) -> Self {
        Self { store, poller, executor, policy }
    }

    pub async fn perform(&self, id: &str, action: &str) -> Result<DeviceState, ActionError> {
        let cam = self.store.config(id).ok_or_else(|| ActionError::NotFound(id.to_string()))?;
        let kind: ActionKind = action.parse()?;

        let action_id = Uuid::new_v4();
        info!(%action_id, device = id, action = %kind, "action requested");

        self.store.update(id, |st| st.last_action_error = None);

        let command = build_command(kind, &cam.pi);
        match self.executor.execute(&cam, &command).await {
            Ok(output) => {
                debug!(%action_id, device = id, %output, "command succeeded");
                let state = self.converge(id, kind).await;
                info!(
                    %action_id,
                    device = id,
                    action = %kind,
                    service_reachable = state.service_reachable,
                    "action complete"
                );
                Ok(state)
            }
            Err(e) => {
                let message = e.to_string();
                warn!(%action_id, device = id, action = %kind, error = %message, "action failed");
                // état courant pour l'appelant, le résultat du poll est déjà dans le store
                self.poller.poll_device(id).await;
                let state = self.store.update(id, |st| st.last_action_error = Some(message.clone()));
                Err(ActionError::Failed { message, state })
            }
        }
    }

    /// Sortie brute de `systemctl is-active` sur le device
    pub async fn unit_status(&self, id: &str) -> Result<String, ActionError> {
        let cam = self.store.config(id).ok_or_else(|| ActionError::NotFound(id.to_string()))?;
        let command = format!("systemctl is-active {} 2>&1 || true", shell_words::quote(&cam.pi.service));
        self.executor
            .execute(&cam, &command)
            .await
            .map_err(|e| ActionError::Failed { message: e.to_string(), state: None })
    }

    async fn converge(&self, id: &str, kind: ActionKind) -> DeviceState {
        if kind == ActionKind::Stop {
            sleep(self.policy.stop_settle).await;
            return self.poll_now(id).await;
        }

        let deadline = Instant::now() + self.policy.deadline;
        loop {
            let wait = self.policy.poll_every.min(deadline.saturating_duration_since(Instant::now()));
            sleep(wait).await;
            let state = self.poll_now(id).await;
            if state.service_reachable {
                return state;
            }
            if Instant::now() >= deadline {
                debug!(device = id, action = %kind, "convergence deadline reached");
                return state;
            }
        }
    }

    async fn poll_now(&self, id: &str) -> DeviceState {
        match self.poller.poll_device(id).await {
            Some(state) => state,
            None => self.store.get(id).unwrap_or_else(|| DeviceState::new(id)),
        }
    }
}

pub fn build_command(kind: ActionKind, pi: &PiConf) -> String {
    let service = shell_words::quote(&pi.service);
    let systemctl = |verb: &str| format!("sudo systemctl {verb} {service}");

    match kind {
        ActionKind::Start => systemctl("start"),
        ActionKind::Stop => systemctl("stop"),
        ActionKind::Restart => systemctl("restart"),
        ActionKind::EnableMode => [upsert_env_var(&pi.env_file, &pi.mode_key, "1"), systemctl("restart")].join(" && "),
        ActionKind::DisableMode => [upsert_env_var(&pi.env_file, &pi.mode_key, "0"), systemctl("restart")].join(" && "),
    }
}

/// Remplace `KEY=...` s'il existe, sinon l'ajoute en fin de fichier
fn upsert_env_var(env_file: &str, key: &str, value: &str) -> String {
    let file = shell_words::quote(env_file);
    let pattern = shell_words::quote(&format!("^{key}=")).into_owned();
    let script = shell_words::quote(&format!("s/^{key}=.*/{key}={value}/")).into_owned();
    let line = shell_words::quote(&format!("{key}={value}")).into_owned();
    format!("{{ grep -q {pattern} {file} && sed -i {script} {file} || echo {line} >> {file}; }}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pi() -> PiConf {
        PiConf {
            env_file: "/home/pi/picamera/.env".into(),
            service: "picamera".into(),
            mode_key: "HDR".into(),
        }
    }

    #[test]
    fn test_service_commands() {
        assert_eq!(build_command(ActionKind::Start, &pi()), "sudo systemctl start picamera");
        assert_eq!(build_command(ActionKind::Stop, &pi()), "sudo systemctl stop picamera");
        assert_eq!(build_command(ActionKind::Restart, &pi()), "sudo systemctl restart picamera");
    }

    #[test]
    fn test_mode_toggle_upserts_then_restarts() {
        let cmd = build_command(ActionKind::EnableMode, &pi());
        assert!(cmd.starts_with("{ grep -q "));
        assert!(cmd.contains("&& sed -i 's/^HDR=.*/HDR=1/' /home/pi/picamera/.env ||"));
        assert!(cmd.contains(">> /home/pi/picamera/.env; }"));
        assert!(cmd.ends_with("} && sudo systemctl restart picamera"));
        assert!(build_command(ActionKind::DisableMode, &pi()).contains("HDR=0"));
    }

    #[test]
    fn test_values_are_shell_quoted() {
        let mut conf = pi();
        conf.service = "cam service; rm -rf /".into();
        conf.env_file = "/home/pi/my env".into();
        let cmd = build_command(ActionKind::DisableMode, &conf);
        assert!(cmd.contains("'/home/pi/my env'"));
        assert!(cmd.ends_with("sudo systemctl restart 'cam service; rm -rf /'"));
    }

    #[test]
    fn test_default_policy() {
        let policy = ConvergencePolicy::default();
        assert_eq!(policy.poll_every, Duration::from_secs(3));
        assert_eq!(policy.deadline, Duration::from_secs(30));
        assert!(policy.stop_settle < policy.poll_every);
    }
}
