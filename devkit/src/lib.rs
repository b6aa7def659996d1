/*!
# Picam DevKit - Doubles de test pour le kernel

Bibliothèque facilitant les tests du moteur de flotte sans matériel :
- Mock du transport HTTP (sonde /status, snapshots)
- Mock de l'exécuteur SSH (sonde hôte, commandes systemctl)
- Fixtures de configs caméra et de payloads
- Harness câblant un `FleetEngine` complet
*/

pub mod mock_transport;
pub mod mock_executor;
pub mod fixtures;
pub mod test_utils;

pub use mock_transport::MockHttpTransport;
pub use mock_executor::{MockCommandExecutor, RecordedCall};
pub use test_utils::TestHarness;
