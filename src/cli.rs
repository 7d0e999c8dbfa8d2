use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use log::info;

use crate::harness::ScanConfig;
use crate::source::ScanSource;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct SwrParams {
    /// Path to osmocom_spectrum_sense
    #[arg(long, default_value = "/usr/local/bin/osmocom_spectrum_sense")]
    pub osmocom_spectrum_sense_path: String,

    /// Path to rtl_power
    #[arg(long, default_value = "/usr/local/bin/rtl_power")]
    pub rtl_power_path: String,

    /// Scan with rtl_power instead of osmocom_spectrum_sense
    #[arg(long)]
    pub use_rtl_power: bool,

    /// Sweep loops to capture before stopping, defaults to 5 for
    /// osmocom_spectrum_sense and 1 for rtl_power
    #[arg(long)]
    pub loops: Option<u32>,

    /// Stop the scan tool after this many seconds and keep what it captured
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Log level, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    pub loglevel: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Record a reference sweep
    Baseline {
        /// Start frequency in MHz
        start_frequency: u32,

        /// Stop frequency in MHz
        stop_frequency: u32,

        /// Write the record here instead of stdout
        #[arg(short = 'o')]
        output: Option<PathBuf>,
    },

    /// Measure SWR against a recorded baseline
    Analyze {
        /// Baseline record produced by the baseline command
        baseline: PathBuf,

        /// Write `frequency,swr` lines here
        #[arg(short = 'o')]
        output: Option<PathBuf>,

        /// Write the pairs to stdout instead of the -o file
        #[arg(long)]
        stdout: bool,

        /// Use previously exported pairs instead of scanning
        #[arg(short = 'i')]
        input: Option<PathBuf>,

        /// Render the SWR curve to this image file
        #[arg(long)]
        image: Option<PathBuf>,
    },
}

impl SwrParams {
    pub fn source(&self) -> ScanSource {
        if self.use_rtl_power {
            ScanSource::Wideband {
                path: self.rtl_power_path.clone(),
            }
        } else {
            ScanSource::Narrowband {
                path: self.osmocom_spectrum_sense_path.clone(),
            }
        }
    }

    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            loops: self.loops,
            timeout: self.timeout.map(Duration::from_secs),
        }
    }

    pub fn pretty_print(&self) {
        let source = self.source();
        info!("Scan Parameters:");
        info!("Scan tool: {} ({})", source.name(), source.path());
        info!(
            "Loops: {}",
            self.loops.unwrap_or_else(|| source.default_loops())
        );
        match self.timeout {
            Some(secs) => info!("Timeout: {secs} s"),
            None => info!("Timeout: none"),
        }
    }
}
