use thiserror::Error;

use crate::sample::{Frequency, FrequencyPowerMap};

/// Smallest loss used in the SWR formula, keeps the ratio strictly above 1.
pub const MIN_LOSS_DB: f64 = 0.001;

#[derive(Debug, Error, PartialEq)]
pub enum SwrError {
    #[error("frequency {0} not found in measurement")]
    FrequencyNotFound(Frequency),

    #[error("no power readings recorded for frequency {0}")]
    NoReadings(Frequency),

    #[error("power readings for frequency {0} are not finite")]
    NonFinite(Frequency),
}

/// SWR at a single frequency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwrPair {
    pub frequency: f64,
    pub swr: f64,
}

/// SWR for a given return loss in dB. Loss is floored at [`MIN_LOSS_DB`].
pub fn swr_from_loss(loss: f64) -> f64 {
    let ratio = 10f64.powf(loss.max(MIN_LOSS_DB) / 20.0);
    (ratio + 1.0) / (ratio - 1.0)
}

fn mean(frequency: Frequency, readings: &[f64]) -> Result<f64, SwrError> {
    if readings.is_empty() {
        return Err(SwrError::NoReadings(frequency));
    }
    let mean = readings.iter().sum::<f64>() / readings.len() as f64;
    if !mean.is_finite() {
        return Err(SwrError::NonFinite(frequency));
    }
    Ok(mean)
}

/// Compare a measurement against a baseline, one pair per baseline frequency
/// in ascending order.
pub fn derive_swr(
    baseline: &FrequencyPowerMap,
    measurement: &FrequencyPowerMap,
) -> Result<Vec<SwrPair>, SwrError> {
    baseline
        .iter()
        .map(|(frequency, pre)| {
            let post = measurement
                .get(frequency)
                .ok_or(SwrError::FrequencyNotFound(*frequency))?;

            let loss = mean(*frequency, pre)? - mean(*frequency, post)?;
            Ok(SwrPair {
                frequency: frequency.hz(),
                swr: swr_from_loss(loss),
            })
        })
        .collect()
}
