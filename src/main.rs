use std::process::ExitCode;
use std::sync::Arc;

use async_playground::config::{AppConfig, STORE_CONNECTION};
use async_playground::{MemoryStore, Orchestrator};

use env_logger::{Builder, Target};
use log::LevelFilter;

fn init_logger() {
    Builder::new()
        .target(Target::Stdout)
        .filter_level(LevelFilter::Warn)
        .filter_module("async_playground", LevelFilter::Debug)
        .init();
}

async fn run() -> async_playground::Result<()> {
    let config_path = AppConfig::default_path();
    let config = AppConfig::load(&config_path)?;
    let database = config.require_connection_string(STORE_CONNECTION)?;

    let settings = config.playground.clone();
    let store = Arc::new(MemoryStore::new(database).with_latency(settings.store_latency()));
    let orchestrator = Orchestrator::new(store, &config_path, settings)?;

    let report = orchestrator.run().await?;
    log::info!(
        "inserted {} row(s), {} department employee(s), loop {:?}",
        report.rows_inserted,
        report.department_employees.len(),
        report.loop_outcome
    );
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    if std::env::var("RUST_LOG").is_err() {
        init_logger();
    } else {
        env_logger::init();
    }

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("run failed: {}", err);
            ExitCode::FAILURE
        }
    }
}
