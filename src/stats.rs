use std::collections::VecDeque;

pub const DEFAULT_WINDOW_SIZE: usize = 100;

/// Ventana de tamaño fijo con los últimos valores de estado (0/1).
///
/// La cantidad de unos se lleva junto al buffer para que `counts` y
/// `moving_average` sean O(1).
#[derive(Debug, Clone)]
pub struct DataProcessor {
    window: VecDeque<u8>,
    capacity: usize,
    ones: usize,
}

impl DataProcessor {
    pub fn new(capacity: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
            ones: 0,
        }
    }

    /// Guarda `value` como bit (distinto de cero es 1); si está llena descarta el más antiguo.
    pub fn push(&mut self, value: i64) {
        if self.capacity == 0 {
            return;
        }

        if self.window.len() == self.capacity {
            if let Some(evicted) = self.window.pop_front() {
                self.ones -= evicted as usize;
            }
        }

        let bit = u8::from(value != 0);
        self.window.push_back(bit);
        self.ones += bit as usize;
    }

    /// Contenido actual, del más antiguo al más reciente.
    pub fn snapshot(&self) -> Vec<u8> {
        self.window.iter().copied().collect()
    }

    /// `(ceros, unos)` de la ventana actual.
    pub fn counts(&self) -> (usize, usize) {
        (self.window.len() - self.ones, self.ones)
    }

    pub fn moving_average(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.ones as f64 / self.window.len() as f64
    }

    /// `(min, max)` de la ventana actual, `(0, 0)` si está vacía.
    ///
    /// Una ventana vacía y una llena de ceros devuelven el mismo par.
    pub fn min_max(&self) -> (u8, u8) {
        if self.is_empty() {
            return (0, 0);
        }
        let min = u8::from(self.ones == self.window.len());
        let max = u8::from(self.ones > 0);
        (min, max)
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for DataProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(capacity: usize, values: &[i64]) -> DataProcessor {
        let mut p = DataProcessor::new(capacity);
        for &v in values {
            p.push(v);
        }
        p
    }

    #[test]
    fn processor_basic_stats() {
        let p = filled(5, &[1, 0, 1, 1, 0]);
        assert_eq!(p.counts(), (2, 3));
        let avg = p.moving_average();
        assert!((0.4..=0.6).contains(&avg));
        assert!((avg - 0.6).abs() < f64::EPSILON);
        assert_eq!(p.min_max(), (0, 1));
    }

    #[test]
    fn empty_window_placeholders() {
        let p = DataProcessor::default();
        assert_eq!(p.capacity(), DEFAULT_WINDOW_SIZE);
        assert!(p.snapshot().is_empty());
        assert_eq!(p.counts(), (0, 0));
        assert_eq!(p.moving_average(), 0.0);
        assert_eq!(p.min_max(), (0, 0));
    }

    #[test]
    fn evicts_oldest_first() {
        let values = [1, 1, 0, 0, 1, 0, 1, 1, 1, 0, 0];
        let p = filled(4, &values);
        assert_eq!(p.len(), 4);
        assert_eq!(p.snapshot(), vec![1, 1, 0, 0]);

        let mut p = DataProcessor::new(3);
        for (i, &v) in values.iter().enumerate() {
            p.push(v);
            let (zeros, ones) = p.counts();
            assert_eq!(zeros + ones, p.len());
            assert_eq!(p.len(), (i + 1).min(3));
        }
    }

    #[test]
    fn coerces_non_zero_to_one() {
        let p = filled(10, &[7, -3, 0, 255]);
        assert_eq!(p.snapshot(), vec![1, 1, 0, 1]);
    }

    #[test]
    fn all_ones_average_is_one() {
        let p = filled(8, &[1; 20]);
        assert_eq!(p.moving_average(), 1.0);
        assert_eq!(p.min_max(), (1, 1));
    }

    #[test]
    fn all_zeros_min_max() {
        let p = filled(3, &[0, 0]);
        assert_eq!(p.min_max(), (0, 0));
        assert_eq!(p.counts(), (2, 0));
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let p = filled(0, &[1, 0, 1]);
        assert!(p.is_empty());
        assert_eq!(p.counts(), (0, 0));
    }
}
