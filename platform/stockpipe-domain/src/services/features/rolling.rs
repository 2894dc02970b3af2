use std::collections::VecDeque;

/// Trailing arithmetic mean over the last `window` values, current value included.
#[derive(Debug, Clone)]
pub struct RollingSma {
    window: usize,
    buf: VecDeque<f64>,
}

impl RollingSma {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            buf: VecDeque::with_capacity(window),
        }
    }

    pub fn update(&mut self, value: f64) -> Option<f64> {
        if self.window == 0 {
            return None;
        }

        self.buf.push_back(value);
        while self.buf.len() > self.window {
            self.buf.pop_front();
        }

        if self.buf.len() == self.window {
            Some(self.buf.iter().sum::<f64>() / self.window as f64)
        } else {
            None
        }
    }
}

/// Trailing sample standard deviation (N-1 denominator).
#[derive(Debug, Clone)]
pub struct RollingStd {
    window: usize,
    buf: VecDeque<f64>,
}

impl RollingStd {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            buf: VecDeque::with_capacity(window),
        }
    }

    pub fn update(&mut self, value: f64) -> Option<f64> {
        if self.window < 2 {
            return None;
        }

        self.buf.push_back(value);
        while self.buf.len() > self.window {
            self.buf.pop_front();
        }

        if self.buf.len() < self.window {
            return None;
        }

        let n = self.window as f64;
        let mean = self.buf.iter().sum::<f64>() / n;
        let sum_sq_dev: f64 = self.buf.iter().map(|v| (v - mean) * (v - mean)).sum();
        Some((sum_sq_dev / (n - 1.0)).sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::{RollingSma, RollingStd};

    #[test]
    fn sma_waits_for_full_window() {
        let mut sma = RollingSma::new(3);
        assert_eq!(sma.update(1.0), None);
        assert_eq!(sma.update(2.0), None);
        assert_eq!(sma.update(3.0), Some(2.0));
        assert_eq!(sma.update(6.0), Some(11.0 / 3.0));
    }

    #[test]
    fn std_uses_sample_denominator() {
        let mut std = RollingStd::new(4);
        let mut last = None;
        for value in [2.0, 4.0, 4.0, 6.0] {
            last = std.update(value);
        }
        // mean 4, squared deviations 4+0+0+4 = 8, 8 / 3
        let expected = (8.0f64 / 3.0).sqrt();
        assert!((last.unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn degenerate_windows_never_produce_values() {
        let mut sma = RollingSma::new(0);
        let mut std = RollingStd::new(1);
        for value in [1.0, 2.0, 3.0] {
            assert_eq!(sma.update(value), None);
            assert_eq!(std.update(value), None);
        }
    }
}
