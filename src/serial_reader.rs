use std::io::{self, ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Context;
use flume::{Receiver, RecvTimeoutError, Sender};
use log::{debug, info, warn};
use parking_lot::Mutex;
use serialport::{DataBits, Parity, StopBits};

use crate::error::SessionError;
use crate::messages;
use crate::serial_processor::assemble_lines;
use crate::serial_utils::sanitize_log_data;

/// Margen que se suma al timeout de lectura para esperar la salida del hilo.
pub const JOIN_MARGIN: Duration = Duration::from_millis(500);

/// Ciclo de vida de una sesión serial.
///
/// `Stopped` y `Error` son terminales: para reconectar hay que construir
/// una nueva [`SerialSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Idle,
    Opening,
    Streaming,
    Stopped,
    Error,
}

impl ReaderState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ReaderState::Stopped | ReaderState::Error)
    }
}

pub type DeviceHandle = Box<dyn Read + Send>;

/// Abre el dispositivo de una sesión. El lector devuelto debe respetar
/// `timeout` fallando con `TimedOut` (o `WouldBlock`) cuando no llegan datos.
pub trait PortOpener: Send + 'static {
    fn open(&self, device: &str, baud_rate: u32, timeout: Duration) -> anyhow::Result<DeviceHandle>;
}

/// Abre puertos reales mediante `serialport`.
#[derive(Debug, Clone, Copy)]
pub struct SerialPortOpener {
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
}

impl PortOpener for SerialPortOpener {
    fn open(
        &self,
        device: &str,
        baud_rate: u32,
        timeout: Duration,
    ) -> anyhow::Result<DeviceHandle> {
        let port = serialport::new(device, baud_rate)
            .data_bits(self.data_bits)
            .parity(self.parity)
            .stop_bits(self.stop_bits)
            .timeout(timeout)
            .open()
            .with_context(|| format!("{}@{}", device, baud_rate))?;
        Ok(Box::new(port))
    }
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub device: String,
    pub baud_rate: u32,
    pub read_timeout: Duration,
    pub join_timeout: Duration,
}

impl SessionSettings {
    pub fn new(device: impl Into<String>, baud_rate: u32) -> Self {
        let read_timeout = Duration::from_secs(1);
        Self {
            device: device.into(),
            baud_rate,
            read_timeout,
            join_timeout: read_timeout + JOIN_MARGIN,
        }
    }
}

/// Compartido entre la sesión y su hilo de lectura.
#[derive(Clone)]
struct ReaderContext {
    settings: SessionSettings,
    out: Sender<String>,
    state: Arc<Mutex<ReaderState>>,
    cancel: Arc<AtomicBool>,
}

impl ReaderContext {
    fn emit(&self, message: String) {
        // Canal cerrado: nadie escucha, se sigue hasta la cancelación
        let _ = self.out.send(message);
    }

    fn set_state(&self, next: ReaderState) {
        let mut state = self.state.lock();
        debug!("🔁 {} : {:?} -> {:?}", self.settings.device, *state, next);
        *state = next;
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

struct Worker {
    handle: JoinHandle<()>,
    // Nunca recibe; se desconecta cuando termina el hilo
    done: Receiver<()>,
}

/// Un intento de conexión: dueño de la bandera de cancelación y del hilo
/// lector, que a su vez es dueño del puerto.
pub struct SerialSession {
    ctx: ReaderContext,
    worker: Option<Worker>,
}

impl SerialSession {
    pub fn new(settings: SessionSettings, out: Sender<String>) -> Self {
        Self {
            ctx: ReaderContext {
                settings,
                out,
                state: Arc::new(Mutex::new(ReaderState::Idle)),
                cancel: Arc::new(AtomicBool::new(false)),
            },
            worker: None,
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.ctx.settings
    }

    pub fn state(&self) -> ReaderState {
        *self.ctx.state.lock()
    }

    /// Lanza el hilo de lectura. Solo es válido una vez, desde `Idle`.
    pub fn start<O: PortOpener>(&mut self, opener: O) -> Result<(), SessionError> {
        let current = self.state();
        if current != ReaderState::Idle {
            return Err(SessionError::AlreadyStarted(current));
        }

        self.ctx.set_state(ReaderState::Opening);
        info!(
            "🟡 Conectando a {} a {} baudios...",
            self.ctx.settings.device, self.ctx.settings.baud_rate
        );

        let ctx = self.ctx.clone();
        let (done_tx, done_rx) = flume::bounded::<()>(1);
        let handle = thread::spawn(move || {
            let _done = done_tx;
            run_session(ctx, opener);
        });

        self.worker = Some(Worker {
            handle,
            done: done_rx,
        });
        Ok(())
    }

    /// Pide al lector que se detenga y espera hasta `join_timeout`.
    ///
    /// Se puede llamar varias veces, incluso antes de `start`. Si el hilo no
    /// termina a tiempo se deja que acabe por su cuenta.
    pub fn stop(&mut self) {
        self.ctx.cancel.store(true, Ordering::SeqCst);

        {
            let mut state = self.ctx.state.lock();
            if *state == ReaderState::Idle {
                *state = ReaderState::Stopped;
            }
        }

        let Some(worker) = self.worker.take() else {
            return;
        };

        match worker.done.recv_timeout(self.ctx.settings.join_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if worker.handle.join().is_err() {
                    let device = &self.ctx.settings.device;
                    warn!("❌ El lector serial de {} terminó en pánico", device);
                    self.ctx.set_state(ReaderState::Error);
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "⏱️ El lector serial de {} no terminó en {:?}; se deja desacoplado",
                    self.ctx.settings.device, self.ctx.settings.join_timeout
                );
            }
        }
    }
}

impl Drop for SerialSession {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_session<O: PortOpener>(ctx: ReaderContext, opener: O) {
    let SessionSettings {
        device,
        baud_rate,
        read_timeout,
        ..
    } = ctx.settings.clone();

    let port = match opener.open(&device, baud_rate, read_timeout) {
        Ok(port) => port,
        Err(e) => {
            let err = SessionError::DeviceOpen(e);
            warn!("❌ {}", err);
            ctx.emit(messages::error(&err));
            ctx.set_state(ReaderState::Error);
            return;
        }
    };

    ctx.set_state(ReaderState::Streaming);
    info!("✅ Puerto serial {} abierto a {} baudios", device, baud_rate);
    ctx.emit(messages::info(format_args!("serial opened {}@{}", device, baud_rate)));

    // El puerto se cierra (drop) al salir de `stream_lines`
    if let Err(err) = stream_lines(&ctx, port) {
        warn!("❌ {}", err);
        ctx.emit(messages::error(&err));
    }

    // Los mensajes van antes del cambio de estado: quien ve un estado
    // terminal ya tiene todo en el canal.
    info!("🔌 Hilo lector de {} finalizando", device);
    ctx.emit(messages::info("serial thread exiting"));
    ctx.set_state(ReaderState::Stopped);
}

fn is_read_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
    )
}

fn stream_lines(ctx: &ReaderContext, mut port: DeviceHandle) -> Result<(), SessionError> {
    let mut buffer = [0u8; 1024];
    let mut partial_data = Vec::new();

    while !ctx.cancelled() {
        match port.read(&mut buffer) {
            Ok(0) => {
                return Err(io::Error::new(
                    ErrorKind::UnexpectedEof,
                    "device reports readiness to read but returned no data",
                )
                .into());
            }
            Ok(bytes_read) => {
                let chunk = &buffer[..bytes_read];
                debug!("📥 Bytes leídos (crudo): {}", sanitize_log_data(chunk));

                for line in assemble_lines(chunk, &mut partial_data) {
                    ctx.emit(String::from_utf8_lossy(&line).into_owned());
                }
            }
            Err(ref e) if is_read_timeout(e) => {
                // Timeout esperado, continuar
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

/// Dispositivo en memoria con un guion de lecturas.
#[cfg(test)]
pub(crate) mod scripted {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    pub enum Step {
        Data(&'static [u8]),
        Fail(ErrorKind),
        Eof,
    }

    struct ScriptedDevice {
        steps: VecDeque<Step>,
        idle_read: Duration,
        reads: Arc<AtomicUsize>,
        closed: Arc<AtomicBool>,
    }

    impl Read for ScriptedDevice {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            match self.steps.pop_front() {
                Some(Step::Data(data)) => {
                    buf[..data.len()].copy_from_slice(data);
                    Ok(data.len())
                }
                Some(Step::Fail(kind)) => Err(io::Error::new(kind, "scripted failure")),
                Some(Step::Eof) => Ok(0),
                None => {
                    thread::sleep(self.idle_read);
                    Err(io::Error::new(ErrorKind::TimedOut, "Operation timed out"))
                }
            }
        }
    }

    impl Drop for ScriptedDevice {
        fn drop(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    /// Vista desde el test sobre el dispositivo entregado al hilo.
    pub struct DeviceWatch {
        reads: Arc<AtomicUsize>,
        closed: Arc<AtomicBool>,
    }

    impl DeviceWatch {
        pub fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }

        pub fn closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    pub struct ScriptedOpener(Mutex<Option<ScriptedDevice>>);

    impl ScriptedOpener {
        pub fn new(steps: Vec<Step>) -> (Self, DeviceWatch) {
            Self::with_idle_read(steps, Duration::from_millis(5))
        }

        pub fn with_idle_read(steps: Vec<Step>, idle_read: Duration) -> (Self, DeviceWatch) {
            let reads = Arc::new(AtomicUsize::new(0));
            let closed = Arc::new(AtomicBool::new(false));
            let device = ScriptedDevice {
                steps: steps.into(),
                idle_read,
                reads: reads.clone(),
                closed: closed.clone(),
            };
            (Self(Mutex::new(Some(device))), DeviceWatch { reads, closed })
        }
    }

    impl PortOpener for ScriptedOpener {
        fn open(&self, _: &str, _: u32, _: Duration) -> anyhow::Result<DeviceHandle> {
            let device = self
                .0
                .lock()
                .take()
                .ok_or_else(|| anyhow::anyhow!("Device or resource busy"))?;
            Ok(Box::new(device))
        }
    }

    pub struct MissingDevice;

    impl PortOpener for MissingDevice {
        fn open(&self, device: &str, _: u32, _: Duration) -> anyhow::Result<DeviceHandle> {
            Err(anyhow::anyhow!("No such file or directory")).with_context(|| device.to_string())
        }
    }

    pub fn session() -> (SerialSession, Receiver<String>) {
        let (tx, rx) = flume::unbounded();
        let mut settings = SessionSettings::new("/dev/ttyTEST0", 9600);
        settings.join_timeout = Duration::from_secs(2);
        (SerialSession::new(settings, tx), rx)
    }
}
