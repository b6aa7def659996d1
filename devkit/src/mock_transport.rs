/*!
Mock HTTP transport pour tester sans caméra réelle

Chaque URL reçoit une réponse scriptée (JSON ou octets), éventuellement
dépendante du temps (horloge tokio, compatible `start_paused`) ou retardée
pour simuler un device lent. Tous les appels sont enregistrés pour les assertions.
*/

use async_trait::async_trait;
use picam_kernel::transport::{FetchedBytes, HttpTransport, TransportError};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

type Responder<T> = Arc<dyn Fn() -> Result<T, TransportError> + Send + Sync>;

/// Mock qui implémente `HttpTransport`
#[derive(Clone, Default)]
pub struct MockHttpTransport {
    json: Arc<Mutex<HashMap<String, Responder<Value>>>>,
    bytes: Arc<Mutex<HashMap<String, Responder<FetchedBytes>>>>,
    delays: Arc<Mutex<HashMap<String, Duration>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockHttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_json(&self, url: &str, payload: Value) {
        self.json_with(url, move || Ok(payload.clone()));
    }

    pub fn set_json_error(&self, url: &str, error: TransportError) {
        self.json_with(url, move || Err(error.clone()));
    }

    /// Erreur réseau jusqu'à `delay` après l'appel, puis `payload`
    pub fn set_json_after(&self, url: &str, payload: Value, delay: Duration) {
        let ready_at = Instant::now() + delay;
        let target = url.to_string();
        self.json_with(url, move || {
            if Instant::now() >= ready_at {
                Ok(payload.clone())
            } else {
                Err(TransportError::Request { url: target.clone(), message: "connection refused".into() })
            }
        });
    }

    pub fn json_with<F>(&self, url: &str, f: F)
    where
        F: Fn() -> Result<Value, TransportError> + Send + Sync + 'static,
    {
        self.json.lock().unwrap().insert(url.to_string(), Arc::new(f));
    }

    pub fn set_bytes(&self, url: &str, data: &[u8], content_type: &str) {
        let fetched = FetchedBytes { data: data.to_vec(), content_type: content_type.to_string() };
        self.bytes.lock().unwrap().insert(url.to_string(), Arc::new(move || Ok(fetched.clone())));
    }

    pub fn set_bytes_error(&self, url: &str, error: TransportError) {
        self.bytes.lock().unwrap().insert(url.to_string(), Arc::new(move || Err(error.clone())));
    }

    /// Chaque appel sur `url` attend `delay` avant de répondre (`Duration::ZERO` pour annuler).
    /// La réponse est celle scriptée au moment de l'appel, pas à son retour.
    pub fn set_delay(&self, url: &str, delay: Duration) {
        let mut delays = self.delays.lock().unwrap();
        if delay.is_zero() {
            delays.remove(url);
        } else {
            delays.insert(url.to_string(), delay);
        }
    }

    /// Nombre d'appels (json + bytes) sur une URL
    pub fn fetch_count(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, url: &str) -> Option<Duration> {
        self.calls.lock().unwrap().push(url.to_string());
        log::debug!("[mock-http] GET {}", url);
        self.delays.lock().unwrap().get(url).copied()
    }
}

fn unscripted(url: &str) -> TransportError {
    TransportError::Request { url: url.to_string(), message: "no response scripted".into() }
}

#[async_trait]
impl HttpTransport for MockHttpTransport {
    async fn fetch_json(&self, url: &str, _timeout: Duration) -> Result<Value, TransportError> {
        let delay = self.record(url);
        let responder = self.json.lock().unwrap().get(url).cloned();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match responder {
            Some(f) => f(),
            None => Err(unscripted(url)),
        }
    }

    async fn fetch_bytes(&self, url: &str, _timeout: Duration) -> Result<FetchedBytes, TransportError> {
        let delay = self.record(url);
        let responder = self.bytes.lock().unwrap().get(url).cloned();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match responder {
            Some(f) => f(),
            None => Err(unscripted(url)),
        }
    }
}
