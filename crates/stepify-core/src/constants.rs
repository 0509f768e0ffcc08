//! Constantes del motor core.
//!
//! Valores estáticos que participan en el fingerprint de resultados y en los
//! nombres que el builder asigna a los steps sin nombre.

/// Versión lógica del motor. Se incluye en el fingerprint de resultados para
/// que un cambio incompatible del scheduler invalide fingerprints previos.
pub const ENGINE_VERSION: &str = "S1.0";

/// Prefijo de los nombres asignados a steps declarados sin nombre.
/// El sufijo es un contador global del pipeline (no por task).
pub const UNNAMED_STEP_PREFIX: &str = "_UNNAMED_STEP_";

/// Nombre de la variable de entorno que controla la política ante contextos
/// ya sellados (`fail` | `ignore`).
pub const ENV_STALE_CONTEXT: &str = "STEPIFY_STALE_CONTEXT";

/// Nombre de la variable de entorno que activa/desactiva el journal de eventos.
pub const ENV_RECORD_EVENTS: &str = "STEPIFY_RECORD_EVENTS";
