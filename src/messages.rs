//! Categorías de mensajes en el canal lector → monitor.
//!
//! Cada mensaje es una línea de texto. Los avisos de ciclo de vida y de error
//! llevan un prefijo literal; la salida del dispositivo va sin prefijo.

use std::fmt::Display;

pub const INFO_PREFIX: &str = "INFO: ";
pub const ERROR_PREFIX: &str = "ERROR: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMessage<'a> {
    Info(&'a str),
    Error(&'a str),
    Raw(&'a str),
}

impl<'a> ChannelMessage<'a> {
    pub fn classify(line: &'a str) -> Self {
        if let Some(rest) = line.strip_prefix(INFO_PREFIX) {
            ChannelMessage::Info(rest.trim_end())
        } else if let Some(rest) = line.strip_prefix(ERROR_PREFIX) {
            ChannelMessage::Error(rest.trim_end())
        } else {
            ChannelMessage::Raw(line)
        }
    }
}

pub fn info(text: impl Display) -> String {
    format!("{INFO_PREFIX}{text}")
}

pub fn error(err: impl Display) -> String {
    format!("{ERROR_PREFIX}{err}")
}
