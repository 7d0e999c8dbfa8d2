//! Antenna SWR measurement from power sweeps.
//!
//! A sweep is captured by driving `osmocom_spectrum_sense` or `rtl_power`,
//! and compared against a previously recorded baseline sweep. The drop in
//! power at each frequency is treated as return loss and converted to SWR.

pub mod aggregate;
mod cli;
pub mod harness;
pub mod plot;
pub mod record;
pub mod sample;
pub mod source;
pub mod swr;

pub use cli::{Command, SwrParams};
pub use harness::{run_scan, ScanConfig, ScanError, ScanResult, ScanState};
pub use record::BaselineRecord;
pub use sample::{Frequency, FrequencyPowerMap, Sample, ScanMeta};
pub use source::ScanSource;
pub use swr::{derive_swr, SwrError, SwrPair};
