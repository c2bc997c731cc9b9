mod config;
mod error;
mod messages;
mod monitor;
mod parser;
mod serial_processor;
mod serial_reader;
mod serial_utils;
mod stats;

use crate::config::Config;
use crate::monitor::Monitor;
use crate::serial_reader::{ReaderState, SerialSession};

use anyhow::{anyhow, Context, Result};

fn main() -> Result<()> {
    config::init_logging();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "--list-ports") {
        for port in serial_utils::list_serial_ports() {
            println!("{}", port);
        }
        return Ok(());
    }

    // Leer el argumento de línea de comandos (opcional)
    let config_path = args
        .first()
        .cloned()
        .unwrap_or_else(|| "config.toml".to_string());

    log::info!("📄 Cargando configuración desde {}", config_path);
    let config = Config::load_from_file(&config_path)?;
    config.log_config();

    let device = config.resolve_port()?;
    let (tx, rx) = flume::unbounded();
    let mut session = SerialSession::new(config.session_settings(device), tx);
    session.start(config.port_opener())?;

    // Ctrl-C pide la detención; el monitor la ejecuta en su próximo tick
    let (shutdown_tx, shutdown_rx) = flume::bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.try_send(());
    })
    .context("No se pudo instalar el manejador de Ctrl-C")?;

    let mut monitor = Monitor::new(config.window_size, config.log_capacity);
    let final_state = monitor.run(&mut session, &rx, &shutdown_rx, config.poll_interval());
    session.stop();

    match final_state {
        ReaderState::Error => Err(anyhow!(
            "{}",
            monitor.last_error().unwrap_or("serial session failed")
        )),
        _ => {
            log::info!(
                "🔌 Desconectado de {} ({} entradas de log, último estado: {})",
                session.settings().device,
                monitor.log_entries().count(),
                monitor.status().unwrap_or("—")
            );
            Ok(())
        }
    }
}
