//! On-disk forms: baseline records as JSON and SWR results as
//! `frequency,swr` lines.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sample::{FrequencyPowerMap, ScanMeta};
use crate::swr::SwrPair;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid baseline record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("line {line}: expected `frequency,swr`, got {content:?}")]
    InvalidPair { line: usize, content: String },
}

/// A reference sweep together with the range it was captured over.
///
/// Fields are declared in key order so the JSON comes out sorted at the top
/// level. Frequency keys are written in ascending numeric order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineRecord {
    #[serde(with = "frequency_keys")]
    pub frequencies: FrequencyPowerMap,
    pub meta: ScanMeta,
}

/// JSON object keys are strings, so frequencies travel as `"765000000.0"`.
mod frequency_keys {
    use super::*;
    use crate::sample::Frequency;
    use serde::de::Error as _;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(map: &FrequencyPowerMap, s: S) -> Result<S::Ok, S::Error> {
        s.collect_map(map.iter().map(|(freq, readings)| (freq.to_string(), readings)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<FrequencyPowerMap, D::Error> {
        BTreeMap::<String, Vec<f64>>::deserialize(d)?
            .into_iter()
            .map(|(key, readings)| {
                key.trim()
                    .parse::<f64>()
                    .map(|hz| (Frequency(hz), readings))
                    .map_err(|e| D::Error::custom(format!("bad frequency key {key:?}: {e}")))
            })
            .collect()
    }
}

impl BaselineRecord {
    pub fn to_json(&self) -> Result<String, RecordError> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.serialize(&mut ser)?;
        // serde_json only ever writes valid UTF-8
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    pub fn from_json(json: &str) -> Result<Self, RecordError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, RecordError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), RecordError> {
        let mut out = BufWriter::new(File::create(path)?);
        writeln!(out, "{}", self.to_json()?)?;
        out.flush()?;
        Ok(())
    }
}

/// Write one `frequency,swr` line per pair, at full precision.
pub fn write_pairs<W: Write>(mut out: W, pairs: &[SwrPair]) -> io::Result<()> {
    for pair in pairs {
        writeln!(out, "{:?},{:?}", pair.frequency, pair.swr)?;
    }
    out.flush()
}

pub fn read_pairs<R: BufRead>(input: R) -> Result<Vec<SwrPair>, RecordError> {
    let mut pairs = Vec::new();
    for (idx, line) in input.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let invalid = || RecordError::InvalidPair {
            line: idx + 1,
            content: line.to_string(),
        };
        let (frequency, swr) = line.split_once(',').ok_or_else(invalid)?;
        pairs.push(SwrPair {
            frequency: frequency.trim().parse().map_err(|_| invalid())?,
            swr: swr.trim().parse().map_err(|_| invalid())?,
        });
    }
    Ok(pairs)
}

pub fn load_pairs(path: &Path) -> Result<Vec<SwrPair>, RecordError> {
    read_pairs(BufReader::new(File::open(path)?))
}

pub fn save_pairs(path: &Path, pairs: &[SwrPair]) -> Result<(), RecordError> {
    write_pairs(BufWriter::new(File::create(path)?), pairs)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::Frequency;

    fn record() -> BaselineRecord {
        let mut frequencies = FrequencyPowerMap::new();
        frequencies.insert(Frequency(765000000.0), vec![3.5, 3.7]);
        frequencies.insert(Frequency(750100000.0), vec![-68.3]);
        BaselineRecord {
            meta: ScanMeta {
                start_frequency: 750,
                stop_frequency: 950,
            },
            frequencies,
        }
    }

    #[test]
    fn baseline_json_layout() {
        let json = record().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["meta"]["start_frequency"], 750);
        assert_eq!(value["meta"]["stop_frequency"], 950);
        assert_eq!(value["frequencies"]["765000000.0"][1], 3.7);
        assert_eq!(value["frequencies"]["750100000.0"][0], -68.3);
        assert!(json.contains("\n    \"meta\""));
    }

    #[test]
    fn baseline_json_key_order() {
        let mut frequencies = FrequencyPowerMap::new();
        frequencies.insert(Frequency(1000000000.0), vec![-71.0]);
        frequencies.insert(Frequency(900000000.0), vec![-70.0]);
        let json = BaselineRecord {
            meta: ScanMeta {
                start_frequency: 900,
                stop_frequency: 1000,
            },
            frequencies,
        }
        .to_json()
        .unwrap();

        let position = |needle: &str| json.find(needle).unwrap();
        assert!(position("\"frequencies\"") < position("\"meta\""));
        assert!(position("\"start_frequency\"") < position("\"stop_frequency\""));
        // numeric, not lexical: 900 MHz comes before 1000 MHz
        assert!(position("\"900000000.0\"") < position("\"1000000000.0\""));
    }

    #[test]
    fn baseline_accepts_integer_keys() {
        let json = r#"{
            "frequencies": {"1000": [-70, -70.5], "2000.0": [-71]},
            "meta": {"start_frequency": 1, "stop_frequency": 2}
        }"#;

        let record = BaselineRecord::from_json(json).unwrap();
        assert_eq!(record.frequencies[&Frequency(1000.0)], vec![-70.0, -70.5]);
        assert_eq!(record.frequencies[&Frequency(2000.0)], vec![-71.0]);
    }

    #[test]
    fn baseline_rejects_bad_key() {
        let json = r#"{"meta": {"start_frequency": 1, "stop_frequency": 2}, "frequencies": {"abc": []}}"#;
        assert!(matches!(
            BaselineRecord::from_json(json),
            Err(RecordError::Json(_))
        ));
    }

    #[test]
    fn baseline_file_survives_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("baseline.json");

        record().save(&path).unwrap();
        assert_eq!(BaselineRecord::load(&path).unwrap(), record());
    }

    #[test]
    fn pairs_are_written_one_per_line() {
        let pairs = [
            SwrPair {
                frequency: 750000000.0,
                swr: 1.0000000000000002,
            },
            SwrPair {
                frequency: 750100000.0,
                swr: 1.925,
            },
        ];
        let mut out = Vec::new();
        write_pairs(&mut out, &pairs).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "750000000.0,1.0000000000000002\n750100000.0,1.925\n"
        );
    }

    #[test]
    fn pairs_read_back_skipping_blank_lines() {
        let input = "750000000.0,1.5\n\n750100000,2.25\n";
        let pairs = read_pairs(input.as_bytes()).unwrap();

        assert_eq!(
            pairs,
            vec![
                SwrPair {
                    frequency: 750000000.0,
                    swr: 1.5
                },
                SwrPair {
                    frequency: 750100000.0,
                    swr: 2.25
                },
            ]
        );
    }

    #[test]
    fn malformed_pair_reports_line() {
        let err = read_pairs("1.0,2.0\n3.0;4.0\n".as_bytes()).unwrap_err();
        assert!(matches!(err, RecordError::InvalidPair { line: 2, .. }));
    }
}
