/**
 * PICAM KERNEL - Moteur d'état d'une flotte de caméras Raspberry Pi
 *
 * RÔLE : Suivre en continu chaque caméra (service HTTP + hôte SSH), piloter
 * le service à distance et servir un snapshot récent.
 *
 * ARCHITECTURE :
 * - state        : FleetStore, table d'état partagée (remplacement d'entrée entière)
 * - poller       : double sonde (caméra + hôte) par device, en parallèle
 * - remote       : exécution de commandes distantes (trait + client ssh)
 * - orchestrator : action distante puis re-poll jusqu'à convergence
 * - snapshot     : cache TTL avec repli sur l'image périmée
 * - engine       : façade consommée par l'API
 * - config / transport / http / health : couches d'infrastructure
 */

pub mod config;
pub mod models;
pub mod state;
pub mod transport;
pub mod remote;
pub mod poller;
pub mod orchestrator;
pub mod snapshot;
pub mod engine;
pub mod health;
pub mod http;

pub use config::{AppConfig, CameraConfig};
pub use engine::{EngineError, EngineSettings, FleetEngine};
pub use models::{ActionKind, CameraStatus, DeviceState, HostInfo};
pub use remote::{CommandExecutor, RemoteExecutionError};
pub use transport::{FetchedBytes, HttpTransport, TransportError};
