//! Configuración central de la aplicación.
//! Carga variables de entorno (.env) y expone una estructura inmutable (`CONFIG`)
//! con los parámetros del demo. La configuración del motor vive en
//! `stepify_core::EngineConfig`.
use std::env;
use std::path::PathBuf;

use once_cell::sync::Lazy;
use stepify_core::EngineConfig;

/// Demora por defecto de los steps con timer, en milisegundos.
pub const DEFAULT_DELAY_MS: u64 = 200;

/// Configuración global de la aplicación.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Parámetros del pipeline de demostración.
    pub demo: DemoConfig,
    /// Política del motor (ver `STEPIFY_STALE_CONTEXT`, `STEPIFY_RECORD_EVENTS`).
    pub engine: EngineConfig,
}

/// Parámetros del demo "timer" + "fs".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoConfig {
    /// Valor ligado al primer step del task "timer".
    pub delay_ms: u64,
    /// Directorio que lista y del que lee `Cargo.toml` el task "fs".
    pub dir: PathBuf,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self { delay_ms: DEFAULT_DELAY_MS,
               dir: PathBuf::from(".") }
    }
}

impl DemoConfig {
    /// Construye la configuración a partir de valores crudos; los inválidos
    /// caen al valor por defecto.
    pub fn from_values(delay_ms: Option<&str>, dir: Option<&str>) -> Self {
        let defaults = Self::default();
        let delay_ms = delay_ms.and_then(|v| v.trim().parse().ok())
                               .unwrap_or(defaults.delay_ms);
        let dir = dir.filter(|v| !v.trim().is_empty())
                     .map(PathBuf::from)
                     .unwrap_or(defaults.dir);
        Self { delay_ms, dir }
    }
}

/// Instancia global perezosa de configuración, evaluada una sola vez.
pub static CONFIG: Lazy<AppConfig> = Lazy::new(|| {
    // EngineConfig::from_env carga .env antes de leer cualquier variable.
    let engine = EngineConfig::from_env();
    let delay = env::var("STEPIFY_DEMO_DELAY_MS").ok();
    let dir = env::var("STEPIFY_DEMO_DIR").ok();
    AppConfig { demo: DemoConfig::from_values(delay.as_deref(), dir.as_deref()),
                engine }
});
