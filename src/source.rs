/*
osmocom_spectrum_sense (narrowband):
2015-08-17 20:32:17.464280 center_freq 765000000.0 freq 767993750.0 power_db 3.53722358601 noise_floor_db -75.9338252561

rtl_power (wideband):
2015-08-17, 20:32:17, 750000000, 950000000, 100000, 10, -70.1, -68.3, -65.0
*/

// Date, Time, Hz Low, Hz High, Hz step, Num Samples, dB, dB, dB, [...], dB

use log::{trace, warn};

use crate::sample::{Frequency, Sample};

/// Outcome of decoding one line of tool output.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Samples(Vec<Sample>),
    /// Header, banner or otherwise unusable line.
    Skip,
    /// The tool signalled the end of its output.
    EndOfStream,
}

/// The external scan tools we know how to drive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanSource {
    /// `osmocom_spectrum_sense`, one reading per line.
    Narrowband { path: String },
    /// `rtl_power`, one row of bins per line.
    Wideband { path: String },
}

impl ScanSource {
    pub fn path(&self) -> &str {
        match self {
            ScanSource::Narrowband { path } | ScanSource::Wideband { path } => path,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScanSource::Narrowband { .. } => "osmocom_spectrum_sense",
            ScanSource::Wideband { .. } => "rtl_power",
        }
    }

    /// Number of wrap-arounds to wait for before a scan is considered complete.
    /// The wideband tool already integrates over a wider step, so one pass is enough.
    pub fn default_loops(&self) -> u32 {
        match self {
            ScanSource::Narrowband { .. } => 5,
            ScanSource::Wideband { .. } => 1,
        }
    }

    /// Arguments passed to the tool, excluding the program itself.
    /// `start` and `stop` are in MHz.
    pub fn invoke_args(&self, start: u32, stop: u32) -> Vec<String> {
        match self {
            // osmocom_spectrum_sense --args=hackrf --gain=0 750e6 950e6
            ScanSource::Narrowband { .. } => vec![
                "--args=hackrf".to_string(),
                "--gain=0".to_string(),
                format!("{start}e6"),
                format!("{stop}e6"),
            ],
            // rtl_power -f 750M:950M:100k
            ScanSource::Wideband { .. } => {
                vec!["-f".to_string(), format!("{start}M:{stop}M:100k")]
            }
        }
    }

    /// Full argv, program first.
    pub fn argv(&self, start: u32, stop: u32) -> Vec<String> {
        let mut argv = vec![self.path().to_string()];
        argv.extend(self.invoke_args(start, stop));
        argv
    }

    pub fn decode_line(&self, raw: &str) -> Decoded {
        match self {
            ScanSource::Narrowband { .. } => decode_narrowband(raw),
            ScanSource::Wideband { .. } => decode_wideband(raw),
        }
    }
}

/// Parse a numeric field, refusing `nan` and `inf` which both tools can print
/// for a bin they failed to measure.
fn parse_finite(field: &str) -> Result<f64, String> {
    match field.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        Ok(_) => Err(format!("non-finite value {field:?}")),
        Err(e) => Err(format!("{field:?}: {e}")),
    }
}

// single reading of the narrowband tool
#[derive(Debug, PartialEq)]
struct SenseLine {
    center_freq: f64,
    freq: f64,
    power_db: f64,
    noise_floor_db: f64,
}

impl SenseLine {
    fn from_line(line: &str) -> Option<Self> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        // date, time, then four labelled values
        let [_date, _time, _, center_freq, _, freq, _, power_db, _, noise_floor_db] =
            parts.as_slice()
        else {
            return None;
        };
        Some(Self {
            center_freq: parse_finite(center_freq).ok()?,
            freq: parse_finite(freq).ok()?,
            power_db: parse_finite(power_db).ok()?,
            noise_floor_db: parse_finite(noise_floor_db).ok()?,
        })
    }
}

fn decode_narrowband(raw: &str) -> Decoded {
    // the first few lines out of the tool are always banners
    match SenseLine::from_line(raw.trim()) {
        Some(line) => Decoded::Samples(vec![Sample {
            bucket: Frequency(line.center_freq),
            frequency: line.freq,
            power: line.power_db,
            noise_floor: Some(line.noise_floor_db),
        }]),
        None => {
            trace!("skipping line: {raw}");
            Decoded::Skip
        }
    }
}

// single row of the wideband tool
// this is not the complete spectrum, only the bins of one hop
#[derive(Debug, PartialEq)]
struct PowerLine {
    hz_low: f64,
    hz_step: f64,
    db: Vec<f64>,
}

impl PowerLine {
    fn from_line(line: &str) -> Result<Self, String> {
        let parts: Vec<&str> = line.split(',').map(|x| x.trim()).collect();
        if parts.len() < 5 {
            return Err(format!("expected at least 5 fields, got {}", parts.len()));
        }
        let hz_low = parse_finite(parts[2]).map_err(|e| format!("bad base frequency {e}"))?;
        let hz_step = parse_finite(parts[4]).map_err(|e| format!("bad frequency step {e}"))?;
        // the sample count column is an unsigned integer, readings are printed
        // with decimals; some captures drop the column entirely
        let first_reading = match parts.get(5) {
            Some(count) if count.parse::<u64>().is_ok() => 6,
            _ => 5,
        };
        let db = parts[first_reading..]
            .iter()
            .map(|x| parse_finite(x).map_err(|e| format!("bad power reading {e}")))
            .collect::<Result<Vec<f64>, String>>()?;
        Ok(Self { hz_low, hz_step, db })
    }

    fn samples(&self) -> Vec<Sample> {
        self.db
            .iter()
            .enumerate()
            .map(|(idx, db)| Sample::new(self.hz_low + idx as f64 * self.hz_step, *db))
            .collect()
    }
}

fn decode_wideband(raw: &str) -> Decoded {
    let line = raw.trim();
    if line.is_empty() {
        return Decoded::EndOfStream;
    }
    match PowerLine::from_line(line) {
        Ok(line) => Decoded::Samples(line.samples()),
        Err(e) => {
            warn!("error encountered while parsing output ({e}): {line}");
            Decoded::Skip
        }
    }
}
