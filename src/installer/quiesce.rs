use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::error::UpdaterError;

const MAX_PROBE_INTERVAL: Duration = Duration::from_secs(2);

/// How long the installer waits for the exiting application to release its
/// file handles before touching anything.
#[derive(Debug, Clone)]
pub struct QuiescePolicy {
    /// Delay between lock probes; doubles after each failed round.
    pub probe_interval: Duration,
    /// Give up probing after this long and report a timeout.
    pub probe_timeout: Duration,
    /// Blunt fixed wait used when there are no existing targets to probe.
    pub grace_period: Duration,
}

impl Default for QuiescePolicy {
    fn default() -> Self {
        Self {
            probe_interval: Duration::from_millis(250),
            probe_timeout: Duration::from_secs(30),
            grace_period: Duration::from_secs(5),
        }
    }
}

/// Block until every existing target file can be opened for writing.
///
/// The probe is advisory on platforms without mandatory file locking, but it
/// catches the case that matters: a not-yet-exited process still holding the
/// files open on Windows. When the payload names no existing files there is
/// nothing to probe, and the fixed grace period is the fallback.
///
/// # Errors
/// `QuiesceTimeout` if some target never becomes writable within the probe
/// window.
pub fn wait_for_quiescence(
    targets: &[PathBuf],
    policy: &QuiescePolicy,
) -> Result<(), UpdaterError> {
    let existing: Vec<&PathBuf> = targets.iter().filter(|t| t.exists()).collect();
    if existing.is_empty() {
        info!(
            "quiesce: no existing targets to probe; sleeping {:?}",
            policy.grace_period
        );
        thread::sleep(policy.grace_period);
        return Ok(());
    }

    let started = Instant::now();
    let mut interval = policy.probe_interval;
    loop {
        match first_locked_target(&existing) {
            None => {
                info!(
                    "quiesce: all {} targets writable after {:?}",
                    existing.len(),
                    started.elapsed()
                );
                return Ok(());
            }
            Some(locked) => {
                if started.elapsed() >= policy.probe_timeout {
                    warn!("quiesce: {} still locked at timeout", locked.display());
                    return Err(UpdaterError::QuiesceTimeout {
                        waited_secs: started.elapsed().as_secs(),
                    });
                }
                debug!(
                    "quiesce: {} still locked; retrying in {:?}",
                    locked.display(),
                    interval
                );
                thread::sleep(interval);
                interval = (interval * 2).min(MAX_PROBE_INTERVAL);
            }
        }
    }
}

fn first_locked_target<'a>(targets: &'a [&'a PathBuf]) -> Option<&'a Path> {
    targets
        .iter()
        .find(|target| !writable(target))
        .map(|target| target.as_path())
}

fn writable(path: &Path) -> bool {
    OpenOptions::new().write(true).open(path).is_ok()
}
