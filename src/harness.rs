use std::io::{self, BufRead, BufReader, Read};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use thiserror::Error;

use crate::aggregate::{Progress, SweepAggregator};
use crate::sample::{FrequencyPowerMap, Sample, ScanMeta};
use crate::source::{Decoded, ScanSource};

/// How often the read loop wakes up to check for cancellation and timeouts
/// while the tool is silent.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long the tool gets to exit after an interrupt before it is killed.
const STOP_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to start {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    #[error("{0} has no captured stdout")]
    NoStdout(String),

    #[error("scan cancelled")]
    Cancelled,

    #[error("failed to stop scan tool: {0}")]
    Stop(#[from] io::Error),
}

/// Where a scan is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Running,
    /// The aggregator saw enough loops.
    Completed,
    /// The user asked to abort.
    Cancelled,
    /// The tool finished its output on its own.
    Exhausted,
    /// The tool ran past the configured timeout.
    TimedOut,
}

#[derive(Debug, Clone, Default)]
pub struct ScanConfig {
    /// Loop threshold, the source's default when unset.
    pub loops: Option<u32>,
    /// Give up on the tool after this long and keep what was captured.
    pub timeout: Option<Duration>,
}

#[derive(Debug)]
pub struct ScanResult {
    pub state: ScanState,
    pub frequencies: FrequencyPowerMap,
}

/// Run the scan tool over the requested range until the sweep has looped
/// enough times, the tool exits, the timeout expires or `cancel` is set.
///
/// A partial sweep is returned as a normal result. Cancellation stops the
/// tool and is reported as [`ScanError::Cancelled`].
pub fn run_scan(
    source: &ScanSource,
    meta: ScanMeta,
    config: &ScanConfig,
    cancel: &AtomicBool,
) -> Result<ScanResult, ScanError> {
    info!(
        "Scanning power levels for {} to {} MHz with {}",
        meta.start_frequency,
        meta.stop_frequency,
        source.name()
    );

    let argv = source.argv(meta.start_frequency, meta.stop_frequency);
    debug!("{}", argv.join(" "));

    let mut command = Command::new(&argv[0]);
    command.args(&argv[1..]);
    scan_with(source, command, config, cancel)
}

/// Spawn `command` and read its output as `source` output.
fn scan_with(
    source: &ScanSource,
    mut command: Command,
    config: &ScanConfig,
    cancel: &AtomicBool,
) -> Result<ScanResult, ScanError> {
    let mut child = command
        .stdout(Stdio::piped())
        .spawn()
        .map_err(|e| ScanError::Spawn {
            tool: command.get_program().to_string_lossy().into_owned(),
            source: e,
        })?;

    let Some(stdout) = child.stdout.take() else {
        stop_child(&mut child)?;
        return Err(ScanError::NoStdout(source.path().to_string()));
    };
    let lines = spawn_reader(stdout);

    let mut aggregator =
        SweepAggregator::new(config.loops.unwrap_or_else(|| source.default_loops()));
    let deadline = config.timeout.map(|timeout| Instant::now() + timeout);

    let state = collect(source, &lines, &mut aggregator, cancel, deadline);
    let stopped = stop_child(&mut child);
    conclude(source, state, stopped, aggregator)
}

/// Turn the final scan state into the caller's result. A failure to stop the
/// tool is logged and never replaces the outcome of the scan.
fn conclude(
    source: &ScanSource,
    state: ScanState,
    stopped: io::Result<()>,
    aggregator: SweepAggregator,
) -> Result<ScanResult, ScanError> {
    if let Err(e) = stopped {
        warn!("failed to stop {}, it may still hold the radio: {e}", source.name());
    }

    match state {
        ScanState::Completed => info!("Scanning completed."),
        ScanState::Exhausted => info!(
            "{} finished after {} of the requested loops",
            source.name(),
            aggregator.loop_count()
        ),
        ScanState::TimedOut => warn!(
            "{} timed out, keeping {} samples",
            source.name(),
            aggregator.samples()
        ),
        ScanState::Cancelled => {
            warn!("Scan cancelled");
            return Err(ScanError::Cancelled);
        }
        ScanState::Running => unreachable!("collect only returns terminal states"),
    }

    Ok(ScanResult {
        state,
        frequencies: aggregator.finish(),
    })
}

/// Forward the tool's output line by line over a channel.
/// The channel disconnects when the output ends.
fn spawn_reader<R: Read + Send + 'static>(output: R) -> Receiver<String> {
    let (tx, rx) = channel();
    thread::spawn(move || {
        let mut reader = BufReader::new(output);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    if tx.send(String::from_utf8_lossy(&buf).into_owned()).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("error reading scan output: {e}");
                    break;
                }
            }
        }
    });
    rx
}

/// Drive decoded lines into the aggregator until the scan leaves
/// [`ScanState::Running`].
pub fn collect(
    source: &ScanSource,
    lines: &Receiver<String>,
    aggregator: &mut SweepAggregator,
    cancel: &AtomicBool,
    deadline: Option<Instant>,
) -> ScanState {
    let mut state = ScanState::Running;
    while state == ScanState::Running {
        state = match lines.recv_timeout(POLL_INTERVAL) {
            Ok(line) => {
                debug!("{}", line.trim_end());
                match source.decode_line(&line) {
                    Decoded::Samples(samples) => feed(aggregator, samples),
                    Decoded::Skip => ScanState::Running,
                    Decoded::EndOfStream => ScanState::Exhausted,
                }
            }
            Err(RecvTimeoutError::Timeout) => ScanState::Running,
            Err(RecvTimeoutError::Disconnected) => ScanState::Exhausted,
        };

        if cancel.load(Ordering::SeqCst) {
            state = ScanState::Cancelled;
        } else if state == ScanState::Running && deadline.is_some_and(|d| Instant::now() >= d) {
            state = ScanState::TimedOut;
        }
    }
    state
}

fn feed(aggregator: &mut SweepAggregator, samples: Vec<Sample>) -> ScanState {
    for sample in samples {
        if aggregator.push(sample) == Progress::Complete {
            return ScanState::Completed;
        }
    }
    ScanState::Running
}

/// Interrupt the tool so it releases the radio, then reap it.
/// Falls back to a kill if it ignores the interrupt.
pub fn stop_child(child: &mut Child) -> io::Result<()> {
    if child.try_wait()?.is_some() {
        return Ok(());
    }

    interrupt(child)?;
    let give_up = Instant::now() + STOP_GRACE;
    while Instant::now() < give_up {
        if let Some(status) = child.try_wait()? {
            debug!("scan tool exited with {status}");
            return Ok(());
        }
        thread::sleep(Duration::from_millis(20));
    }

    warn!("scan tool ignored interrupt, killing it");
    child.kill()?;
    child.wait()?;
    Ok(())
}

#[cfg(unix)]
fn interrupt(child: &Child) -> io::Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    kill(Pid::from_raw(child.id() as i32), Signal::SIGINT).map_err(io::Error::from)
}

#[cfg(not(unix))]
fn interrupt(child: &mut Child) -> io::Result<()> {
    child.kill()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::Frequency;
    use std::sync::mpsc::Sender;
    use std::sync::Arc;

    fn wideband() -> ScanSource {
        ScanSource::Wideband {
            path: "rtl_power".to_string(),
        }
    }

    fn narrowband() -> ScanSource {
        ScanSource::Narrowband {
            path: "osmocom_spectrum_sense".to_string(),
        }
    }

    fn feed_lines(lines: &[&str]) -> (Sender<String>, Receiver<String>) {
        let (tx, rx) = channel();
        for line in lines {
            tx.send(format!("{line}\n")).unwrap();
        }
        (tx, rx)
    }

    #[test]
    fn stops_on_loop_completion() {
        let (tx, rx) = feed_lines(&[
            "2015-08-17, 20:32:17, 100, 300, 100, -70.0, -71.0, -72.0",
            "2015-08-17, 20:32:18, 100, 300, 100, -73.0, -74.0, -75.0",
            "2015-08-17, 20:32:19, 100, 300, 100, -76.0, -77.0, -78.0",
        ]);
        drop(tx);

        let mut agg = SweepAggregator::new(1);
        let state = collect(&wideband(), &rx, &mut agg, &AtomicBool::new(false), None);

        assert_eq!(state, ScanState::Completed);
        let map = agg.finish();
        assert_eq!(map[&Frequency(100.0)], vec![-70.0, -73.0]);
        assert_eq!(map[&Frequency(200.0)], vec![-71.0]);
        // the last line is never read
        assert_eq!(
            rx.try_recv().unwrap().trim(),
            "2015-08-17, 20:32:19, 100, 300, 100, -76.0, -77.0, -78.0"
        );
    }

    #[test]
    fn blank_line_ends_wideband_scan() {
        let (_tx, rx) = feed_lines(&[
            "2015-08-17, 20:32:17, 100, 300, 100, -70.0, -71.0",
            "",
            "2015-08-17, 20:32:18, 100, 300, 100, -73.0, -74.0",
        ]);

        let mut agg = SweepAggregator::new(1);
        let state = collect(&wideband(), &rx, &mut agg, &AtomicBool::new(false), None);

        assert_eq!(state, ScanState::Exhausted);
        assert_eq!(agg.frequencies().len(), 2);
    }

    #[test]
    fn end_of_output_keeps_partial_sweep() {
        let (tx, rx) = feed_lines(&[
            "linux; GNU C++ version 4.8.4; Boost_105400; UHD_003.008.004",
            "gr-osmosdr 0.1.4 (0.1.4) gnuradio 3.7.5",
            "2015-08-17 20:32:17.464280 center_freq 765000000.0 freq 767993750.0 power_db 3.5 noise_floor_db -75.9",
            "2015-08-17 20:32:17.464281 center_freq 765000000.0 freq 768000000.0 power_db 3.7 noise_floor_db -75.1",
        ]);
        drop(tx);

        let mut agg = SweepAggregator::new(5);
        let state = collect(&narrowband(), &rx, &mut agg, &AtomicBool::new(false), None);

        assert_eq!(state, ScanState::Exhausted);
        assert_eq!(
            agg.frequencies()[&Frequency(765000000.0)],
            vec![3.5, 3.7]
        );
    }

    #[test]
    fn cancellation_wins() {
        let (_tx, rx) = feed_lines(&["2015-08-17, 20:32:17, 100, 300, 100, -70.0, -71.0"]);

        let mut agg = SweepAggregator::new(1);
        let state = collect(&wideband(), &rx, &mut agg, &AtomicBool::new(true), None);

        assert_eq!(state, ScanState::Cancelled);
    }

    #[test]
    fn silent_tool_times_out() {
        let (_tx, rx) = feed_lines(&[]);

        let mut agg = SweepAggregator::new(1);
        let deadline = Some(Instant::now());
        let state = collect(&wideband(), &rx, &mut agg, &AtomicBool::new(false), deadline);

        assert_eq!(state, ScanState::TimedOut);
        assert!(agg.frequencies().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn unusable_tool_output_is_exhausted() {
        // echo prints its arguments, which neither decoder accepts
        let source = ScanSource::Narrowband {
            path: "echo".to_string(),
        };
        let meta = ScanMeta {
            start_frequency: 750,
            stop_frequency: 950,
        };

        let cancel = AtomicBool::new(false);
        let result = run_scan(&source, meta, &ScanConfig::default(), &cancel).unwrap();

        assert_eq!(result.state, ScanState::Exhausted);
        assert!(result.frequencies.is_empty());
    }

    #[test]
    fn missing_tool_fails_to_spawn() {
        let source = ScanSource::Wideband {
            path: "/nonexistent/rtl_power".to_string(),
        };
        let meta = ScanMeta {
            start_frequency: 750,
            stop_frequency: 950,
        };

        let cancel = AtomicBool::new(false);
        let err = run_scan(&source, meta, &ScanConfig::default(), &cancel).unwrap_err();
        assert!(matches!(
            err,
            ScanError::Spawn { ref tool, .. } if tool == "/nonexistent/rtl_power"
        ));
    }

    #[test]
    fn stop_failure_keeps_cancellation() {
        let stopped = Err(io::Error::other("no such process"));
        let result = conclude(&wideband(), ScanState::Cancelled, stopped, SweepAggregator::new(1));

        assert!(matches!(result, Err(ScanError::Cancelled)));
    }

    #[test]
    fn stop_failure_keeps_captured_sweep() {
        let mut agg = SweepAggregator::new(1);
        agg.push(Sample::new(100.0, -70.0));
        agg.push(Sample::new(100.0, -71.0));
        let stopped = Err(io::Error::other("no such process"));

        let result = conclude(&wideband(), ScanState::Completed, stopped, agg).unwrap();

        assert_eq!(result.state, ScanState::Completed);
        assert_eq!(result.frequencies[&Frequency(100.0)], vec![-70.0, -71.0]);
    }

    /// Run `script` under `sh` as if it were the wideband tool. The script
    /// writes its pid to `$PIDFILE` so the test can check it was reaped.
    #[cfg(unix)]
    fn scan_script(
        script: &str,
        config: &ScanConfig,
        cancel: &AtomicBool,
    ) -> (Result<ScanResult, ScanError>, i32) {
        let dir = tempfile::tempdir().unwrap();
        let pidfile = dir.path().join("pid");
        let mut command = Command::new("sh");
        command.arg("-c").arg(script).env("PIDFILE", &pidfile);

        let result = scan_with(&wideband(), command, config, cancel);
        let pid = std::fs::read_to_string(&pidfile)
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        (result, pid)
    }

    #[cfg(unix)]
    fn is_alive(pid: i32) -> bool {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        // a reaped process no longer accepts signals
        kill(Pid::from_raw(pid), None).is_ok()
    }

    #[cfg(unix)]
    #[test]
    fn completion_reaps_tool_that_ignores_interrupt() {
        let script = r#"
            trap '' INT
            echo $$ > "$PIDFILE"
            while true; do
                echo "2015-08-17, 20:32:17, 100, 300, 100, -70.0, -71.0"
                sleep 0.05
            done
        "#;
        let cancel = AtomicBool::new(false);

        let started = Instant::now();
        let (result, pid) = scan_script(script, &ScanConfig::default(), &cancel);
        let result = result.unwrap();

        assert_eq!(result.state, ScanState::Completed);
        assert_eq!(result.frequencies[&Frequency(100.0)], vec![-70.0, -70.0]);
        // interrupt ignored, so the tool is killed after the grace period
        assert!(started.elapsed() >= STOP_GRACE);
        assert!(!is_alive(pid));
    }

    #[cfg(unix)]
    #[test]
    fn cancellation_interrupts_silent_tool() {
        let script = r#"
            echo $$ > "$PIDFILE"
            exec sleep 30
        "#;
        let cancel = Arc::new(AtomicBool::new(false));
        let canceller = {
            let cancel = Arc::clone(&cancel);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(300));
                cancel.store(true, Ordering::SeqCst);
            })
        };

        let (result, pid) = scan_script(script, &ScanConfig::default(), &cancel);
        canceller.join().unwrap();

        assert!(matches!(result, Err(ScanError::Cancelled)));
        assert!(!is_alive(pid));
    }
}
