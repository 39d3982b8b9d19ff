use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use env_logger::Env;

use smol_updater::channel::Channel;
use smol_updater::stager;

#[derive(Parser, Debug)]
#[command(
    name = "smol-stager",
    author,
    version,
    about = "Builds and stages update manifests for each distributable SMOL artifact"
)]
struct Cli {
    /// Build output root containing the app/ and updater/ artifact directories.
    build_root: PathBuf,
    /// Release channel to publish under: stable, main, unstable or test.
    channel: String,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // An unrecognized channel must abort before any file I/O happens.
    let channel = match Channel::parse(&cli.channel) {
        Ok(channel) => channel,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(1);
        }
    };

    let mut failed = false;
    for report in stager::stage(&cli.build_root, channel) {
        if let Err(err) = report.result {
            failed = true;
            eprintln!("failed to stage {}: {err}", report.artifact);
        }
    }
    if failed {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}
