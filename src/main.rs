use anyhow::Context;
use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use wlr_interop::config::{Cli, Config};
use wlr_interop::probe::Probe;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logger
    env_logger::Builder::new()
        .filter_level(Config::log_level(&cli))
        .init();

    log::info!("Starting wlr-interop-probe v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_cli(&cli);
    log::debug!("Configuration: {:?}", config);

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        log::info!("Received Ctrl+C, exiting...");
        r.store(false, Ordering::SeqCst);
    })
    .context("Error setting Ctrl-C handler")?;

    let report = Probe::new(config, running).run()?;
    println!(
        "configured {}x{} (outputs: {})",
        report.width,
        report.height,
        report.outputs.join(", ")
    );

    log::info!("Exiting wlr-interop-probe");
    Ok(())
}
