//! Stepify Rust
//!
//! Este crate agrupa la aplicación sobre `stepify-core`:
//! - `config`: configuración global cargada desde el entorno (`CONFIG`).
//! - `errors`: errores de la aplicación (`CoreError`).
//! - `demo`: pipeline de demostración "timer" + "fs".
//!
//! El motor (builder, contextos, parallel, journal) vive en `stepify-core`.

pub mod config;
pub mod demo;
pub mod errors;
