use log::info;

use crate::sample::{FrequencyPowerMap, Sample};

/// Whether the aggregator wants more samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Continue,
    Complete,
}

/// Running min/mean of the noise floor reported by the tool.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NoiseFloor {
    pub min: f64,
    pub sum: f64,
    pub count: usize,
}

impl NoiseFloor {
    fn record(&mut self, db: f64) {
        if self.count == 0 || db < self.min {
            self.min = db;
        }
        self.sum += db;
        self.count += 1;
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Folds decoded samples into a [`FrequencyPowerMap`] and decides when the
/// tool has swept the range often enough.
///
/// Tools emit frequencies in ascending order within a sweep, so a frequency
/// at or below the highest one seen so far marks the start of a new loop.
/// A tool that reorders bins within a sweep will complete early.
#[derive(Debug)]
pub struct SweepAggregator {
    frequencies: FrequencyPowerMap,
    max_seen_frequency: f64,
    loop_count: u32,
    loops: u32,
    samples: usize,
    noise_floor: NoiseFloor,
}

impl SweepAggregator {
    pub fn new(loops: u32) -> Self {
        Self {
            frequencies: FrequencyPowerMap::new(),
            max_seen_frequency: 0.0,
            loop_count: 0,
            loops,
            samples: 0,
            noise_floor: NoiseFloor::default(),
        }
    }

    pub fn push(&mut self, sample: Sample) -> Progress {
        if sample.frequency <= self.max_seen_frequency {
            self.loop_count += 1;
        } else {
            self.max_seen_frequency = sample.frequency;
        }

        self.frequencies
            .entry(sample.bucket)
            .or_default()
            .push(sample.power);
        self.samples += 1;
        if let Some(db) = sample.noise_floor {
            self.noise_floor.record(db);
        }

        if self.is_complete() {
            Progress::Complete
        } else {
            Progress::Continue
        }
    }

    pub fn is_complete(&self) -> bool {
        self.loop_count >= self.loops
    }

    pub fn loop_count(&self) -> u32 {
        self.loop_count
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn noise_floor(&self) -> &NoiseFloor {
        &self.noise_floor
    }

    pub fn frequencies(&self) -> &FrequencyPowerMap {
        &self.frequencies
    }

    pub fn pretty_print(&self) -> String {
        let mut out = format!(
            "{} samples over {} frequencies, {} of {} loops",
            self.samples,
            self.frequencies.len(),
            self.loop_count,
            self.loops
        );
        if let Some(mean) = self.noise_floor.mean() {
            out.push_str(&format!(
                ", noise floor min {:.2} dB, mean {:.2} dB",
                self.noise_floor.min, mean
            ));
        }
        out
    }

    pub fn finish(self) -> FrequencyPowerMap {
        info!("Scan statistics: {}", self.pretty_print());
        self.frequencies
    }
}
