/**
 * FLEET STORE - Table d'état partagée de la flotte de caméras
 *
 * RÔLE :
 * Seul propriétaire des `DeviceState`. Le poller, l'orchestrateur et l'API
 * lisent/écrivent uniquement à travers ce store.
 *
 * FONCTIONNEMENT :
 * - Configs immuables (`Arc<CameraConfig>`) indexées par id, hors verrou
 * - États derrière un unique `RwLock` de collection (parking_lot)
 * - Toute mutation = read-modify-replace de l'entrée entière sous verrou,
 *   un lecteur ne voit jamais un état à moitié mis à jour
 * - Le verrou n'est jamais tenu à travers un `.await`
 */

use crate::config::CameraConfig;
use crate::models::DeviceState;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

pub struct FleetStore {
    configs: HashMap<String, Arc<CameraConfig>>,
    /// ordre de la config, pour des listings stables
    order: Vec<String>,
    states: RwLock<HashMap<String, DeviceState>>,
}

impl FleetStore {
    pub fn new(cameras: Vec<CameraConfig>) -> Self {
        let mut configs = HashMap::new();
        let mut order = Vec::new();
        let mut states = HashMap::new();

        for cam in cameras {
            if configs.contains_key(&cam.id) {
                continue;
            }
            order.push(cam.id.clone());
            states.insert(cam.id.clone(), DeviceState::new(&cam.id));
            configs.insert(cam.id.clone(), Arc::new(cam));
        }

        Self { configs, order, states: RwLock::new(states) }
    }

    pub fn config(&self, id: &str) -> Option<Arc<CameraConfig>> {
        self.configs.get(id).cloned()
    }

    pub fn configs(&self) -> Vec<Arc<CameraConfig>> {
        self.order.iter().filter_map(|id| self.configs.get(id).cloned()).collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.configs.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<DeviceState> {
        self.states.read().get(id).cloned()
    }

    /// Remplace l'état complet. Id inconnu : no-op, la table ne grandit jamais.
    pub fn set(&self, id: &str, state: DeviceState) -> Option<DeviceState> {
        let mut states = self.states.write();
        let slot = states.get_mut(id)?;
        *slot = state;
        Some(slot.clone())
    }

    /// Read-modify-replace atomique d'une entrée ; renvoie le nouvel état
    pub fn update<F>(&self, id: &str, f: F) -> Option<DeviceState>
    where
        F: FnOnce(&mut DeviceState),
    {
        let mut states = self.states.write();
        let current = states.get(id)?;
        let mut next = current.clone();
        f(&mut next);
        states.insert(id.to_string(), next.clone());
        Some(next)
    }

    pub fn list(&self) -> Vec<DeviceState> {
        let states = self.states.read();
        self.order.iter().filter_map(|id| states.get(id).cloned()).collect()
    }
}
