use chrono::{DateTime, Local};
use once_cell::sync::Lazy;
use regex::Regex;

/// Una observación de estado ya clasificada.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reading {
    pub status: u8,
    pub timestamp: DateTime<Local>,
}

static RE_STATUS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)^(?i-u:status):(.*)$").unwrap());

/// Clasifica una línea `Status:<0|1>`.
///
/// La palabra clave no distingue mayúsculas (solo ASCII) y se ignoran los
/// espacios alrededor, incluido el fin de línea. Cualquier otra cosa devuelve
/// `None`; quien llama la trata como salida cruda del dispositivo.
pub fn parse_status_line(line: &str) -> Option<Reading> {
    let caps = RE_STATUS.captures(line.trim())?;
    let value: i64 = caps.get(1)?.as_str().trim().parse().ok()?;

    match value {
        0 | 1 => Some(Reading {
            status: value as u8,
            timestamp: Local::now(),
        }),
        _ => None,
    }
}
