//! Configuración del motor.
//!
//! Los valores por defecto sirven para tests y uso embebido; `from_env`
//! permite a una aplicación ajustar la política vía variables de entorno
//! (cargando `.env` una sola vez).

use std::env;

use dotenvy::dotenv;
use once_cell::sync::Lazy;

use crate::constants::{ENV_RECORD_EVENTS, ENV_STALE_CONTEXT};

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

/// Qué hacer cuando un `StepContext` ya sellado intenta avanzar el pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StalePolicy {
    /// Aborta el run con `EngineError::StaleContext`.
    #[default]
    Fail,
    /// Descarta la llamada y deja un `warn!` en el log.
    Ignore,
}

impl StalePolicy {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "fail" => Some(Self::Fail),
            "ignore" => Some(Self::Ignore),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub stale_context: StalePolicy,
    /// Si es `false` el pipeline no escribe en el `EventStore`.
    pub record_events: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { stale_context: StalePolicy::Fail,
               record_events: true }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Lazy::force(&DOTENV_LOADED);
        let defaults = Self::default();
        let stale_context = env::var(ENV_STALE_CONTEXT).ok()
                                                        .and_then(|v| StalePolicy::parse(&v))
                                                        .unwrap_or(defaults.stale_context);
        let record_events = env::var(ENV_RECORD_EVENTS).ok()
                                                        .and_then(|v| v.trim().parse().ok())
                                                        .unwrap_or(defaults.record_events);
        Self { stale_context, record_events }
    }
}
