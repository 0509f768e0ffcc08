//! Binario de demostración: ejecuta el pipeline "timer" + "fs" e imprime los
//! valores publicados como JSON.
//!
//! Variables: `RUST_LOG` (filtro de logs), `STEPIFY_DEMO_DELAY_MS`,
//! `STEPIFY_DEMO_DIR`, `STEPIFY_STALE_CONTEXT`, `STEPIFY_RECORD_EVENTS`.
use std::io::Write;
use std::process::ExitCode;

use stepify_rust::config::CONFIG;
use stepify_rust::demo::run_demo;
use stepify_rust::errors::CoreError;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run() -> Result<(), CoreError> {
    let run = run_demo(&CONFIG).await?;
    writeln!(std::io::stdout().lock(), "{}", serde_json::to_string_pretty(&run.results)?)?;
    let labels: Vec<&str> = run.events.iter().map(|e| e.kind.label()).collect();
    log::info!("journal: {} event(s): {}", labels.len(), labels.join(", "));
    if let (Some(first), Some(last)) = (run.events.first(), run.events.last()) {
        let elapsed: chrono::TimeDelta = last.ts - first.ts;
        log::info!("run took {} ms", elapsed.num_milliseconds());
    }
    if let Some(fingerprint) = run.fingerprint() {
        log::info!("results fingerprint: {fingerprint}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("stepify-demo: {e}");
            ExitCode::FAILURE
        }
    }
}
