use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// A frequency in Hz, usable as an exact-match map key.
///
/// Ordering uses `f64::total_cmp` so that a `BTreeMap<Frequency, _>` iterates
/// in ascending frequency order.
#[derive(Debug, Clone, Copy)]
pub struct Frequency(pub f64);

impl Frequency {
    pub fn hz(self) -> f64 {
        self.0
    }
}

impl PartialEq for Frequency {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frequency {}

impl PartialOrd for Frequency {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frequency {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl From<f64> for Frequency {
    fn from(hz: f64) -> Self {
        Self(hz)
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// Power readings collected per frequency during one scan.
pub type FrequencyPowerMap = BTreeMap<Frequency, Vec<f64>>;

/// A single decoded power reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Key the reading is recorded under. For the narrowband tool this is the
    /// center frequency of the capture, for the wideband tool the bin itself.
    pub bucket: Frequency,
    /// Frequency the tool reported, used for loop detection.
    pub frequency: f64,
    /// Power in dB.
    pub power: f64,
    /// Noise floor in dB, when the tool reports one.
    pub noise_floor: Option<f64>,
}

impl Sample {
    pub fn new(frequency: f64, power: f64) -> Self {
        Self {
            bucket: Frequency(frequency),
            frequency,
            power,
            noise_floor: None,
        }
    }
}

/// Requested scan range, in MHz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ScanMeta {
    pub start_frequency: u32,
    pub stop_frequency: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequency_map_iterates_ascending() {
        let mut map = FrequencyPowerMap::new();
        map.insert(Frequency(30.0), vec![1.0]);
        map.insert(Frequency(10.0), vec![2.0]);
        map.insert(Frequency(20.0), vec![3.0]);

        let keys: Vec<f64> = map.keys().map(|f| f.hz()).collect();
        assert_eq!(keys, vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn frequency_display_keeps_fraction() {
        assert_eq!(Frequency(765000000.0).to_string(), "765000000.0");
        assert_eq!(Frequency(750100000.5).to_string(), "750100000.5");
    }
}
