use std::{fs, io::Write, time::Duration};

use anyhow::{bail, Context, Result};
use log::info;
use serde::Deserialize;
use serialport::{DataBits, Parity, StopBits};

use crate::serial_reader::{SerialPortOpener, SessionSettings};
use crate::serial_utils::list_serial_ports;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Vacío significa "primer puerto disponible".
    #[serde(default)]
    pub serial_port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(
        default = "default_data_bits",
        deserialize_with = "crate::serial_utils::deserialize_data_bits"
    )]
    pub data_bits: DataBits,
    #[serde(
        default = "default_parity",
        deserialize_with = "crate::serial_utils::deserialize_parity"
    )]
    pub parity: Parity,
    #[serde(
        default = "default_stop_bits",
        deserialize_with = "crate::serial_utils::deserialize_stop_bits"
    )]
    pub stop_bits: StopBits,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_join_timeout_ms")]
    pub join_timeout_ms: u64,
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
}

fn default_baud_rate() -> u32 { 9600 }
fn default_data_bits() -> DataBits { DataBits::Eight }
fn default_parity() -> Parity { Parity::None }
fn default_stop_bits() -> StopBits { StopBits::One }
fn default_read_timeout_ms() -> u64 { 1000 }
fn default_poll_interval_ms() -> u64 { 150 }
fn default_join_timeout_ms() -> u64 { 1500 }
fn default_window_size() -> usize { 50 }
fn default_log_capacity() -> usize { 500 }

impl Config {
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Error leyendo archivo de configuración {}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Error parseando archivo TOML {}", path))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.baud_rate == 0 {
            bail!("baud_rate debe ser mayor que cero");
        }
        if self.window_size == 0 {
            bail!("window_size debe ser al menos 1");
        }
        // stop() no interrumpe una lectura en curso
        if self.join_timeout_ms <= self.read_timeout_ms {
            bail!(
                "join_timeout_ms ({}) debe ser mayor que read_timeout_ms ({})",
                self.join_timeout_ms,
                self.read_timeout_ms
            );
        }
        Ok(())
    }

    /// El puerto configurado, o el primero que reporta el sistema si no hay ninguno.
    pub fn resolve_port(&self) -> Result<String> {
        if !self.serial_port.trim().is_empty() {
            return Ok(self.serial_port.trim().to_string());
        }
        list_serial_ports()
            .into_iter()
            .next()
            .context("No hay serial_port configurado ni puertos seriales disponibles")
    }

    pub fn session_settings(&self, device: impl Into<String>) -> SessionSettings {
        SessionSettings {
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            join_timeout: Duration::from_millis(self.join_timeout_ms),
            ..SessionSettings::new(device, self.baud_rate)
        }
    }

    pub fn port_opener(&self) -> SerialPortOpener {
        SerialPortOpener {
            data_bits: self.data_bits,
            parity: self.parity,
            stop_bits: self.stop_bits,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn log_config(&self) {
        let port = if self.serial_port.is_empty() { "(auto)" } else { self.serial_port.as_str() };
        info!("📦 Configuración cargada:");
        info!("  Puerto serial         : {}", port);
        info!("  Baudios               : {}", self.baud_rate);
        info!("  Bits de datos         : {:?}", self.data_bits);
        info!("  Paridad               : {:?}", self.parity);
        info!("  Bits de parada        : {:?}", self.stop_bits);
        info!("  Timeout lectura (ms)  : {}", self.read_timeout_ms);
        info!("  Intervalo sondeo (ms) : {}", self.poll_interval_ms);
        info!("  Timeout cierre (ms)   : {}", self.join_timeout_ms);
        info!("  Tamaño de ventana     : {}", self.window_size);
        info!("  Capacidad del log     : {}", self.log_capacity);
    }
}

pub fn init_logging() {
    use env_logger::Builder;
    Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter(None, log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
