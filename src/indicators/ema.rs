//! Exponential moving average.

/// Exponential Moving Average, fed one value at a time.
///
/// Same recursion as pandas `ewm(span=period, adjust=False).mean()`:
///   first value → seed
///   afterwards  → α·x + (1−α)·prev   where α = 2/(period+1)
#[derive(Debug, Clone)]
pub struct Ema {
    alpha: f64,
    value: Option<f64>,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Self {
            alpha: 2.0 / (period as f64 + 1.0),
            value: None,
        }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Feed one value, return the current EMA.
    pub fn update(&mut self, x: f64) -> f64 {
        let next = match self.value {
            None => x,
            Some(prev) => self.alpha * x + (1.0 - self.alpha) * prev,
        };
        self.value = Some(next);
        next
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }
}

/// EMA over a whole slice, aligned index-for-index with the input.
pub fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    let mut ema = Ema::new(period);
    values.iter().map(|&x| ema.update(x)).collect()
}
