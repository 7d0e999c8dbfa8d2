use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use hackrf_antenna_swr::{
    derive_swr, plot, record, run_scan, BaselineRecord, Command, FrequencyPowerMap, ScanMeta,
    SwrParams,
};
use log::info;

mod display;

fn scan(params: &SwrParams, meta: ScanMeta, cancel: &AtomicBool) -> Result<FrequencyPowerMap> {
    let source = params.source();
    let result = run_scan(&source, meta, &params.scan_config(), cancel)
        .wrap_err_with(|| format!("scan with {} failed", source.name()))?;
    Ok(result.frequencies)
}

fn baseline(
    params: &SwrParams,
    meta: ScanMeta,
    output: Option<&Path>,
    cancel: &AtomicBool,
) -> Result<()> {
    let record = BaselineRecord {
        meta,
        frequencies: scan(params, meta, cancel)?,
    };

    match output {
        Some(path) => {
            record
                .save(path)
                .wrap_err_with(|| format!("failed to write {}", path.display()))?;
            info!("Baseline written to {}", path.display());
        }
        None => println!("{}", record.to_json()?),
    }
    Ok(())
}

fn analyze(
    params: &SwrParams,
    baseline_path: &Path,
    output: Option<&Path>,
    stdout: bool,
    input: Option<&Path>,
    image: Option<&Path>,
    cancel: &AtomicBool,
) -> Result<()> {
    let pairs = match input {
        Some(path) => record::load_pairs(path)
            .wrap_err_with(|| format!("failed to read {}", path.display()))?,
        None => {
            let baseline = BaselineRecord::load(baseline_path)
                .wrap_err_with(|| format!("failed to read {}", baseline_path.display()))?;
            let measurement = scan(params, baseline.meta, cancel)?;
            derive_swr(&baseline.frequencies, &measurement)?
        }
    };

    if let Some(path) = image {
        plot::save_swr_image(&pairs, path)
            .wrap_err_with(|| format!("failed to write {}", path.display()))?;
        info!("SWR plot written to {}", path.display());
    }

    if stdout {
        record::write_pairs(io::stdout().lock(), &pairs)?;
    } else if let Some(path) = output {
        record::save_pairs(path, &pairs)
            .wrap_err_with(|| format!("failed to write {}", path.display()))?;
        info!("SWR written to {}", path.display());
    } else if image.is_none() {
        info!("Displaying analysis.");
        display::show(&pairs)?;
    }
    Ok(())
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let params = SwrParams::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&params.loglevel))
        .init();
    params.pretty_print();

    // the scan tool shares our process group and sees the same interrupt,
    // the harness still stops it explicitly and reports the cancellation
    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        ctrlc::set_handler(move || cancel.store(true, Ordering::SeqCst))
            .wrap_err("failed to install interrupt handler")?;
    }

    match &params.command {
        Command::Baseline {
            start_frequency,
            stop_frequency,
            output,
        } => {
            let meta = ScanMeta {
                start_frequency: *start_frequency,
                stop_frequency: *stop_frequency,
            };
            baseline(&params, meta, output.as_deref(), &cancel)
        }
        Command::Analyze {
            baseline,
            output,
            stdout,
            input,
            image,
        } => analyze(
            &params,
            baseline,
            output.as_deref(),
            *stdout,
            input.as_deref(),
            image.as_deref(),
            &cancel,
        ),
    }
}
