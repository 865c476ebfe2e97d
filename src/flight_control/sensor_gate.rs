use crate::hardware::{SensorDriver, SensorQuantity};
use chrono::{DateTime, Utc};
use fixed::types::I32F32;
use itertools::Itertools;
use std::collections::{HashMap, VecDeque};

/// One sampling round across the whole sensor complement.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SampleSet {
    taken_at: DateTime<Utc>,
    readings: Vec<(SensorQuantity, I32F32)>,
}

impl SampleSet {
    pub fn taken_at(&self) -> DateTime<Utc> { self.taken_at }

    pub fn readings(&self) -> &[(SensorQuantity, I32F32)] { &self.readings }
}

/// Decides whether sensor data is trustworthy enough to proceed.
///
/// Keeps a sliding window of the last `window` readings per channel. The
/// array is ready once every channel's window is full, every reading sits
/// within `tolerance` of its channel mean, and redundant channels of the
/// same quantity agree on their means. Reads carry no error channel, so a
/// dead transducer shows up here as a reading the cross-check rejects.
pub struct SensorGate {
    drivers: Vec<Box<dyn SensorDriver + Send + Sync>>,
    history: Vec<VecDeque<I32F32>>,
    window: usize,
}

impl SensorGate {
    pub fn new(drivers: Vec<Box<dyn SensorDriver + Send + Sync>>, window: usize) -> Self {
        debug_assert!(window > 0, "sample window must hold at least one round");
        let history = drivers.iter().map(|_| VecDeque::with_capacity(window)).collect();
        Self { drivers, history, window }
    }

    /// Reads every configured channel once and appends to the history.
    pub async fn sample_all(&mut self, now: DateTime<Utc>) -> SampleSet {
        let mut readings = Vec::with_capacity(self.drivers.len());
        for (driver, hist) in self.drivers.iter().zip(self.history.iter_mut()) {
            let value = driver.read().await;
            if hist.len() == self.window {
                hist.pop_front();
            }
            hist.push_back(value);
            readings.push((driver.quantity(), value));
        }
        SampleSet { taken_at: now, readings }
    }

    /// Whether the history passes the full cross-check.
    pub fn is_ready(&self, tolerance: I32F32) -> bool {
        let mut means = Vec::with_capacity(self.drivers.len());
        for hist in &self.history {
            if hist.len() < self.window {
                return false;
            }
            let mean = Self::mean(hist);
            if hist.iter().any(|sample| (*sample - mean).abs() > tolerance) {
                return false;
            }
            means.push(mean);
        }

        let mut by_quantity: HashMap<SensorQuantity, Vec<I32F32>> = HashMap::new();
        for (driver, mean) in self.drivers.iter().zip(means) {
            by_quantity.entry(driver.quantity()).or_default().push(mean);
        }
        by_quantity.values().all(|group| {
            group.iter().tuple_combinations().all(|(a, b)| (*a - *b).abs() <= tolerance)
        })
    }

    /// Drops all held samples. Called when a new wake cycle begins, so
    /// readings never leak across a sleep interval.
    pub fn reset(&mut self) {
        for hist in &mut self.history {
            hist.clear();
        }
    }

    fn mean(hist: &VecDeque<I32F32>) -> I32F32 {
        let sum = hist.iter().copied().fold(I32F32::ZERO, |acc, sample| acc + sample);
        sum / I32F32::from_num(hist.len())
    }
}
