use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use log::{debug, error, info, warn};
use zip::read::ZipArchive;

use crate::error::UpdaterError;

pub mod quiesce;

pub use quiesce::QuiescePolicy;

/// Interval at which the main thread polls the install task's completion flag.
const COMPLETION_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Everything the helper process needs to perform one update. Constructed
/// from the process arguments; the installer holds the sole reference.
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    /// Locally staged update archive.
    pub payload: PathBuf,
    /// Optional executable to start once file replacement has finished.
    pub relaunch: Option<PathBuf>,
}

/// Install behavior knobs. The default is the single-attempt, best-effort
/// policy: no retries, and a relaunch is still attempted when file
/// replacement failed.
#[derive(Debug, Clone)]
pub struct InstallPolicy {
    pub attempts: u32,
    pub relaunch_on_failure: bool,
    pub quiesce: QuiescePolicy,
}

impl Default for InstallPolicy {
    fn default() -> Self {
        Self {
            attempts: 1,
            relaunch_on_failure: true,
            quiesce: QuiescePolicy::default(),
        }
    }
}

/// Per-file record of what the install task did.
#[derive(Debug, Default)]
pub struct InstallReport {
    pub replaced: Vec<String>,
    pub failed: Vec<(String, String)>,
}

/// Overall result of an installer run, mapped to the process exit status by
/// the binary: fully succeeded, partially succeeded, or failed.
#[derive(Debug)]
pub enum InstallOutcome {
    /// Files replaced and, where requested, the application relaunched.
    Succeeded(InstallReport),
    /// Files replaced but the relaunch attempt failed.
    RelaunchFailed(InstallReport, UpdaterError),
    /// File replacement failed, or quiescence never cleared.
    Failed(UpdaterError),
}

/// Run the full validate, quiesce, install, synchronize and relaunch
/// sequence against the given install root.
pub fn run(request: &UpdateRequest, root: &Path, policy: &InstallPolicy) -> InstallOutcome {
    run_with_launcher(request, root, policy, spawn_detached)
}

fn run_with_launcher(
    request: &UpdateRequest,
    root: &Path,
    policy: &InstallPolicy,
    launcher: impl Fn(&Path) -> Result<(), UpdaterError>,
) -> InstallOutcome {
    if !request.payload.exists() {
        return InstallOutcome::Failed(UpdaterError::ResourceNotFound {
            what: "update payload",
            path: request.payload.clone(),
        });
    }
    info!(
        "install: applying {} under {}",
        request.payload.display(),
        root.display()
    );

    let targets = match payload_targets(&request.payload, root) {
        Ok(targets) => targets,
        Err(err) => {
            warn!(
                "quiesce: unable to enumerate payload targets ({err}); falling back to the fixed grace period"
            );
            Vec::new()
        }
    };
    if let Err(err) = quiesce::wait_for_quiescence(&targets, &policy.quiesce) {
        return InstallOutcome::Failed(err);
    }

    let report = match run_install_task(&request.payload, root, policy) {
        Ok(report) => report,
        Err(err) => {
            error!("install: {err}");
            if policy.relaunch_on_failure
                && let Some(target) = &request.relaunch
            {
                // Best-effort relaunch of whatever is on disk.
                if let Err(relaunch_err) = launcher(target) {
                    error!("install: {relaunch_err}");
                }
            }
            return InstallOutcome::Failed(err);
        }
    };

    if let Some(target) = &request.relaunch {
        if let Err(err) = launcher(target) {
            error!("install: {err}");
            return InstallOutcome::RelaunchFailed(report, err);
        }
    }
    InstallOutcome::Succeeded(report)
}

/// Run the file-replacement work on a background thread while the main
/// thread polls the completion flag. The process must not get past this
/// point (and so must not exit) before replacement has fully finished or
/// fully failed.
fn run_install_task(
    payload: &Path,
    root: &Path,
    policy: &InstallPolicy,
) -> Result<InstallReport, UpdaterError> {
    let done = Arc::new(AtomicBool::new(false));
    let task_done = done.clone();
    let payload = payload.to_path_buf();
    let root = root.to_path_buf();
    let attempts = policy.attempts.max(1);

    let worker = thread::spawn(move || {
        let result = install_with_attempts(&payload, &root, attempts);
        task_done.store(true, Ordering::SeqCst);
        result
    });

    while !done.load(Ordering::SeqCst) {
        thread::sleep(COMPLETION_POLL_INTERVAL);
    }
    match worker.join() {
        Ok(result) => result,
        Err(_) => Err(UpdaterError::Install {
            reason: "install task panicked".into(),
        }),
    }
}

fn install_with_attempts(
    payload: &Path,
    root: &Path,
    attempts: u32,
) -> Result<InstallReport, UpdaterError> {
    let mut last_err = UpdaterError::Install {
        reason: "no install attempt was made".into(),
    };
    for attempt in 1..=attempts {
        if attempt > 1 {
            warn!("install: attempt {attempt} of {attempts}");
        }
        match apply_payload(payload, root) {
            Ok(report) if report.failed.is_empty() => return Ok(report),
            Ok(report) => {
                last_err = UpdaterError::Install {
                    reason: format!(
                        "{} of {} entries failed",
                        report.failed.len(),
                        report.replaced.len() + report.failed.len()
                    ),
                };
            }
            Err(err) => last_err = err,
        }
    }
    Err(last_err)
}

/// Replace every file named in the payload archive at its relative path
/// under the install root, creating parent directories as needed. Entry
/// failures are recorded and do not stop the remaining entries.
pub fn apply_payload(payload: &Path, root: &Path) -> Result<InstallReport, UpdaterError> {
    let file = fs::File::open(payload).map_err(|e| {
        UpdaterError::io(format!("failed to open payload {}", payload.display()), e)
    })?;
    let mut archive = ZipArchive::new(file).map_err(|e| UpdaterError::Install {
        reason: format!("payload parse error: {e}"),
    })?;

    let mut report = InstallReport::default();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| UpdaterError::Install {
            reason: format!("payload entry error: {e}"),
        })?;
        if entry.name().ends_with('/') {
            continue;
        }
        let name = entry.name().to_owned();
        let dest = root.join(entry.mangled_name());
        match replace_file(&mut entry, &dest) {
            Ok(()) => {
                debug!("install: replaced {name}");
                report.replaced.push(name);
            }
            Err(err) => {
                error!("install: failed to replace {name}: {err}");
                report.failed.push((name, err));
            }
        }
    }
    info!(
        "install: {} replaced, {} failed",
        report.replaced.len(),
        report.failed.len()
    );
    Ok(report)
}

fn replace_file(entry: &mut impl io::Read, dest: &Path) -> Result<(), String> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("parent dir error: {e}"))?;
    }
    let mut out = fs::File::create(dest).map_err(|e| format!("create error: {e}"))?;
    io::copy(entry, &mut out).map_err(|e| format!("write error: {e}"))?;
    Ok(())
}

/// Paths the payload will replace, for the quiesce probe.
fn payload_targets(payload: &Path, root: &Path) -> Result<Vec<PathBuf>, UpdaterError> {
    let file = fs::File::open(payload).map_err(|e| {
        UpdaterError::io(format!("failed to open payload {}", payload.display()), e)
    })?;
    let mut archive = ZipArchive::new(file).map_err(|e| UpdaterError::Install {
        reason: format!("payload parse error: {e}"),
    })?;

    let mut targets = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let entry = archive.by_index(i).map_err(|e| UpdaterError::Install {
            reason: format!("payload entry error: {e}"),
        })?;
        if entry.name().ends_with('/') {
            continue;
        }
        targets.push(root.join(entry.mangled_name()));
    }
    Ok(targets)
}

/// Start the relaunch target as a new, detached process through the
/// platform's native process-start mechanism. No verification that the
/// target stays up beyond the spawn itself.
fn spawn_detached(target: &Path) -> Result<(), UpdaterError> {
    info!("relaunch: starting {}", target.display());
    let mut cmd = if cfg!(target_os = "windows") {
        let mut command = Command::new("cmd");
        command.arg("/C").arg("start").arg("").arg(target);
        command
    } else if cfg!(target_os = "macos") {
        let mut command = Command::new("open");
        command.arg(target);
        command
    } else {
        Command::new(target)
    };

    #[cfg(target_os = "windows")]
    {
        use std::os::windows::process::CommandExt;
        // CREATE_NO_WINDOW | DETACHED_PROCESS
        cmd.creation_flags(0x08000000 | 0x00000008);
    }

    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::null());
    cmd.spawn()
        .map(|_| ())
        .map_err(|e| UpdaterError::Relaunch {
            reason: format!("failed to start {}: {e}", target.display()),
        })
}
