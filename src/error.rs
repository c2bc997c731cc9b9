use thiserror::Error;

use crate::serial_reader::ReaderState;

/// Fallos de una sesión serial. Su texto `Display` es lo que llega al
/// monitor como cuerpo de un mensaje `ERROR: `.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("could not open serial port: {0:#}")]
    DeviceOpen(anyhow::Error),

    #[error("serial read failed: {0}")]
    Transport(#[from] std::io::Error),

    #[error("session already started (state: {0:?})")]
    AlreadyStarted(ReaderState),
}
