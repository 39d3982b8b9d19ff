use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use env_logger::Env;

use smol_updater::error::UpdaterError;
use smol_updater::installer::{self, InstallOutcome, InstallPolicy, QuiescePolicy, UpdateRequest};

#[derive(Parser, Debug)]
#[command(
    name = "smol-installer",
    author,
    version,
    about = "Replaces SMOL application files from a staged update archive after the main application exits"
)]
struct Cli {
    /// Locally staged update archive to apply.
    payload: Option<PathBuf>,
    /// Executable to start once the update has been applied.
    relaunch: Option<PathBuf>,
    /// Install attempt budget; the default is a single best-effort attempt.
    #[arg(long, default_value_t = 1)]
    attempts: u32,
    /// Do not attempt a relaunch when file replacement failed.
    #[arg(long)]
    no_relaunch_on_failure: bool,
    /// Fallback grace period in seconds when no target files exist to probe.
    #[arg(long, default_value_t = 5)]
    grace_secs: u64,
    /// Skip the operator prompts (for supervised invocations).
    #[arg(long)]
    no_pause: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let Some(payload) = cli.payload else {
        eprintln!("{}", UpdaterError::MissingInput("path to the update archive"));
        pause(cli.no_pause);
        return ExitCode::from(1);
    };

    // The main application launches the installer from its own install
    // directory right before exiting; that directory is the install root.
    let root = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(err) => {
            eprintln!("unable to determine install directory: {err}");
            pause(cli.no_pause);
            return ExitCode::from(1);
        }
    };

    let request = UpdateRequest {
        payload,
        relaunch: cli.relaunch,
    };
    let policy = InstallPolicy {
        attempts: cli.attempts,
        relaunch_on_failure: !cli.no_relaunch_on_failure,
        quiesce: QuiescePolicy {
            grace_period: Duration::from_secs(cli.grace_secs),
            ..QuiescePolicy::default()
        },
    };

    let code = match installer::run(&request, &root, &policy) {
        InstallOutcome::Succeeded(report) => {
            println!("Update applied: {} files replaced.", report.replaced.len());
            0
        }
        InstallOutcome::RelaunchFailed(report, err) => {
            println!("Update applied: {} files replaced.", report.replaced.len());
            eprintln!("{err}");
            2
        }
        InstallOutcome::Failed(err) => {
            eprintln!("Update failed: {err}");
            1
        }
    };

    pause(cli.no_pause);
    ExitCode::from(code)
}

/// Keep console output from the install readable when the installer was
/// launched attached to a visible console window.
fn pause(skip: bool) {
    if skip {
        return;
    }
    print!("Press Enter to close...");
    let _ = io::stdout().flush();
    let mut line = String::new();
    let _ = io::stdin().lock().read_line(&mut line);
}
