//! Capa de presentación sin interfaz gráfica.
//!
//! Corre en el hilo principal: en cada tick drena el canal del lector,
//! alimenta la ventana con las lecturas válidas y guarda un log corto con
//! hora de todo lo recibido.

use std::collections::VecDeque;
use std::thread;
use std::time::Duration;

use chrono::Local;
use flume::Receiver;
use log::{info, warn};

use crate::messages::ChannelMessage;
use crate::parser::{parse_status_line, Reading};
use crate::serial_reader::{ReaderState, SerialSession};
use crate::stats::DataProcessor;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub processed: usize,
    pub readings: usize,
}

impl TickReport {
    pub fn updated(&self) -> bool {
        self.readings > 0
    }
}

pub struct Monitor {
    processor: DataProcessor,
    latest: Option<Reading>,
    status: Option<String>,
    last_error: Option<String>,
    log: VecDeque<String>,
    log_capacity: usize,
}

impl Monitor {
    pub fn new(window_size: usize, log_capacity: usize) -> Self {
        Self {
            processor: DataProcessor::new(window_size),
            latest: None,
            status: None,
            last_error: None,
            log: VecDeque::with_capacity(log_capacity.min(1024)),
            log_capacity,
        }
    }

    /// Sondea el canal cada `interval` hasta que la sesión termina y todos
    /// sus mensajes fueron procesados. Un mensaje en `shutdown` detiene la
    /// sesión; los mensajes finales se siguen drenando.
    pub fn run(
        &mut self,
        session: &mut SerialSession,
        rx: &Receiver<String>,
        shutdown: &Receiver<()>,
        interval: Duration,
    ) -> ReaderState {
        let mut stop_requested = false;

        loop {
            thread::sleep(interval);

            if !stop_requested && shutdown.try_recv().is_ok() {
                info!("🛑 Deteniendo sesión en {}", session.settings().device);
                stop_requested = true;
                session.stop();
            }

            if self.drain(rx).updated() {
                let (min, max) = self.processor.min_max();
                info!(
                    "📊 {} | {} | {} | min/max {}/{} | {}/{} {}",
                    self.latest_label(),
                    self.counts_label(),
                    self.average_label(),
                    min,
                    max,
                    self.processor.len(),
                    self.processor.capacity(),
                    self.render_strip()
                );
            }

            let state = session.state();
            if state.is_terminal() && rx.is_empty() {
                return state;
            }
        }
    }

    /// Procesa todo lo encolado, sin bloquear.
    pub fn drain(&mut self, rx: &Receiver<String>) -> TickReport {
        let mut report = TickReport::default();
        for raw in rx.try_iter() {
            report.processed += 1;
            if self.handle_line(&raw) {
                report.readings += 1;
            }
        }
        report
    }

    /// Devuelve `true` si `raw` era una lectura válida.
    pub fn handle_line(&mut self, raw: &str) -> bool {
        match ChannelMessage::classify(raw) {
            ChannelMessage::Info(text) => {
                self.status = Some(text.to_string());
                self.push_log(format!("INFO: {}", text));
                false
            }
            ChannelMessage::Error(text) => {
                warn!("❌ {}", text);
                self.last_error = Some(text.to_string());
                self.push_log(format!("ERROR: {}", text));
                false
            }
            ChannelMessage::Raw(line) => match parse_status_line(line) {
                Some(reading) => {
                    self.processor.push(i64::from(reading.status));
                    self.latest = Some(reading);
                    self.push_log(format!("RX: {}", line.trim()));
                    true
                }
                None => {
                    self.push_log(format!("RAW: {}", line.trim()));
                    false
                }
            },
        }
    }

    fn push_log(&mut self, text: String) {
        info!("{}", text);
        self.log.push_back(format!("{}  {}", Local::now().format("%H:%M:%S"), text));
        while self.log.len() > self.log_capacity {
            self.log.pop_front();
        }
    }

    pub fn processor(&self) -> &DataProcessor {
        &self.processor
    }

    pub fn latest(&self) -> Option<&Reading> {
        self.latest.as_ref()
    }

    /// Último aviso `INFO:` del lector.
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn log_entries(&self) -> impl Iterator<Item = &str> {
        self.log.iter().map(String::as_str)
    }

    pub fn latest_label(&self) -> String {
        match self.latest() {
            Some(r) => format!("Latest: {} @ {}", r.status, r.timestamp.format("%H:%M:%S")),
            None => "Latest: —".to_string(),
        }
    }

    pub fn counts_label(&self) -> String {
        format!("Counts: {:?}", self.processor.counts())
    }

    pub fn average_label(&self) -> String {
        format!("Moving avg: {:.3}", self.processor.moving_average())
    }

    /// Valores de la ventana sobre un eje x relativo que termina en 0 (el más reciente).
    pub fn chart_points(&self) -> Vec<(i64, u8)> {
        let values = self.processor.snapshot();
        let first = 1 - values.len() as i64;
        values
            .into_iter()
            .enumerate()
            .map(|(i, v)| (first + i as i64, v))
            .collect()
    }

    pub fn render_strip(&self) -> String {
        self.chart_points()
            .into_iter()
            .map(|(_, v)| if v == 1 { '█' } else { '▁' })
            .collect()
    }
}
