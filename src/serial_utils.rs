use serialport::{DataBits, Parity, StopBits};

use serde::{self, Deserialize, Deserializer};

pub fn deserialize_data_bits<'de, D>(deserializer: D) -> Result<DataBits, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    match s.as_str() {
        "5" => Ok(DataBits::Five),
        "6" => Ok(DataBits::Six),
        "7" => Ok(DataBits::Seven),
        "8" => Ok(DataBits::Eight),
        _ => Err(serde::de::Error::custom(format!("data_bits inválido: {s}"))),
    }
}

pub fn deserialize_parity<'de, D>(deserializer: D) -> Result<Parity, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    match s.to_lowercase().as_str() {
        "none" => Ok(Parity::None),
        "odd" => Ok(Parity::Odd),
        "even" => Ok(Parity::Even),
        _ => Err(serde::de::Error::custom(format!("parity inválido: {s}"))),
    }
}

pub fn deserialize_stop_bits<'de, D>(deserializer: D) -> Result<StopBits, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    match s.as_str() {
        "1" => Ok(StopBits::One),
        "2" => Ok(StopBits::Two),
        _ => Err(serde::de::Error::custom(format!("stop_bits inválido: {s}"))),
    }
}

/// Nombres de los puertos seriales visibles, ordenados.
/// Si la enumeración falla se registra y se devuelve una lista vacía.
pub fn list_serial_ports() -> Vec<String> {
    match serialport::available_ports() {
        Ok(ports) => {
            let mut names: Vec<String> = ports.into_iter().map(|p| p.port_name).collect();
            names.sort();
            names
        }
        Err(e) => {
            log::warn!("⚠️ No se pudieron enumerar los puertos seriales: {}", e);
            Vec::new()
        }
    }
}

/// Convierte datos binarios en una representación legible para logs.
pub fn sanitize_log_data(data: &[u8]) -> String {
    data.iter()
        .filter_map(|&byte| {
            // Ignorar completamente caracteres molestos como DEL
            if byte == 0x7F {
                None
            } else if byte.is_ascii_graphic() || byte == b' ' {
                Some((byte as char).to_string())
            } else if byte == b'\r' {
                Some("\\r".to_string())
            } else if byte == b'\n' {
                Some("\\n".to_string())
            } else {
                Some(format!("\\x{:02X}", byte))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_escapes_control_bytes() {
        assert_eq!(sanitize_log_data(b"Status:1\r\n"), "Status:1\\r\\n");
        assert_eq!(sanitize_log_data(&[0x02, b'A', 0x7F, 0xFF]), "\\x02A\\xFF");
    }
}
