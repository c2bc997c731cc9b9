/// Largo máximo de una línea parcial mientras se espera el terminador.
pub const MAX_PARTIAL_LEN: usize = 4096;

/// Ensambla fragmentos del puerto serial en líneas terminadas en `\n`.
/// Devuelve cada línea completa (con su terminador) tras agregar `buffer`;
/// el resto sin terminar queda en `partial_data` para la siguiente llamada.
pub fn assemble_lines(buffer: &[u8], partial_data: &mut Vec<u8>) -> Vec<Vec<u8>> {
    partial_data.extend_from_slice(buffer);

    let mut lines = Vec::new();
    while let Some(pos) = partial_data.iter().position(|&b| b == b'\n') {
        lines.push(partial_data.drain(..=pos).collect::<Vec<u8>>());
    }

    if partial_data.len() > MAX_PARTIAL_LEN {
        lines.push(std::mem::take(partial_data));
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_several_lines_in_one_chunk() {
        let mut partial = Vec::new();
        let lines = assemble_lines(b"Status:1\nStatus:0\r\nStat", &mut partial);
        assert_eq!(lines, vec![b"Status:1\n".to_vec(), b"Status:0\r\n".to_vec()]);
        assert_eq!(partial, b"Stat");
    }

    #[test]
    fn joins_fragments_across_reads() {
        let mut partial = Vec::new();
        assert!(assemble_lines(b"Sta", &mut partial).is_empty());
        assert!(assemble_lines(b"tus:", &mut partial).is_empty());
        let lines = assemble_lines(b"1\n", &mut partial);
        assert_eq!(lines, vec![b"Status:1\n".to_vec()]);
        assert!(partial.is_empty());
    }

    #[test]
    fn flushes_oversized_partial() {
        let mut partial = Vec::new();
        let junk = vec![b'x'; MAX_PARTIAL_LEN + 1];
        let lines = assemble_lines(&junk, &mut partial);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].len(), MAX_PARTIAL_LEN + 1);
        assert!(partial.is_empty());
    }
}
