use std::path::{Path, PathBuf};

use log::{error, info};

use crate::channel::Channel;
use crate::error::UpdaterError;
use crate::manifest;

// Fixed sibling directories under the build root, one per distributable
// artifact. The updater bundle is staged independently of the application so
// a broken app build can never brick the updater that would fix it.
const APP_ARTIFACT_DIR: &str = "app";
const UPDATER_ARTIFACT_DIR: &str = "updater";

/// One stage-an-artifact unit of work: where the files live and the remote
/// root the resulting manifest points at.
#[derive(Debug, Clone)]
pub struct ArtifactStage {
    pub name: &'static str,
    pub root: PathBuf,
    pub base_uri: String,
}

/// Outcome of staging a single artifact.
#[derive(Debug)]
pub struct StageReport {
    pub artifact: &'static str,
    pub result: Result<PathBuf, UpdaterError>,
}

/// Stage a manifest for every distributable artifact under the build root.
///
/// Each artifact is an independent unit of work: a failure building one
/// manifest (say, a missing root directory) is reported but never prevents
/// the other artifact from being attempted.
pub fn stage(build_root: &Path, channel: Channel) -> Vec<StageReport> {
    artifact_stages(build_root, channel)
        .into_iter()
        .map(|artifact| {
            info!(
                "stage: {} from {} for channel {channel}",
                artifact.name,
                artifact.root.display()
            );
            let result = stage_artifact(&artifact);
            if let Err(err) = &result {
                error!("stage: {} failed: {err}", artifact.name);
            }
            StageReport {
                artifact: artifact.name,
                result,
            }
        })
        .collect()
}

fn artifact_stages(build_root: &Path, channel: Channel) -> [ArtifactStage; 2] {
    [
        ArtifactStage {
            name: "app",
            root: build_root.join(APP_ARTIFACT_DIR),
            base_uri: format!("{}/{APP_ARTIFACT_DIR}", channel.base_url()),
        },
        ArtifactStage {
            name: "updater",
            root: build_root.join(UPDATER_ARTIFACT_DIR),
            base_uri: format!("{}/{UPDATER_ARTIFACT_DIR}", channel.base_url()),
        },
    ]
}

fn stage_artifact(artifact: &ArtifactStage) -> Result<PathBuf, UpdaterError> {
    let built = manifest::build_manifest(&artifact.root, &artifact.base_uri)?;
    manifest::write_manifest(&artifact.root, &built)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn seed_artifact(build_root: &Path, dir: &str) {
        let root = build_root.join(dir);
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("bundle.jar"), dir).unwrap();
    }

    #[test]
    fn stages_both_artifacts_with_channel_specific_uris() {
        let dir = tempfile::tempdir().unwrap();
        seed_artifact(dir.path(), "app");
        seed_artifact(dir.path(), "updater");

        let reports = stage(dir.path(), Channel::Unstable);
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.result.is_ok()));

        let app = manifest::read_manifest(&dir.path().join("app")).unwrap();
        assert_eq!(
            app.base_uri,
            format!("{}/app", Channel::Unstable.base_url())
        );
        let updater = manifest::read_manifest(&dir.path().join("updater")).unwrap();
        assert_eq!(
            updater.base_uri,
            format!("{}/updater", Channel::Unstable.base_url())
        );
    }

    #[test]
    fn one_missing_artifact_does_not_block_the_other() {
        let dir = tempfile::tempdir().unwrap();
        seed_artifact(dir.path(), "updater");

        let reports = stage(dir.path(), Channel::Stable);
        let app = reports.iter().find(|r| r.artifact == "app").unwrap();
        let updater = reports.iter().find(|r| r.artifact == "updater").unwrap();

        assert!(matches!(
            app.result,
            Err(UpdaterError::ResourceNotFound { .. })
        ));
        assert!(updater.result.is_ok());
        assert!(dir
            .path()
            .join("updater")
            .join(manifest::MANIFEST_FILE_NAME)
            .exists());
    }

    #[test]
    fn each_manifest_lands_in_its_own_artifact_directory() {
        let dir = tempfile::tempdir().unwrap();
        seed_artifact(dir.path(), "app");
        seed_artifact(dir.path(), "updater");

        stage(dir.path(), Channel::Test);
        assert!(dir.path().join("app").join(manifest::MANIFEST_FILE_NAME).exists());
        assert!(dir
            .path()
            .join("updater")
            .join(manifest::MANIFEST_FILE_NAME)
            .exists());
        assert!(!dir.path().join(manifest::MANIFEST_FILE_NAME).exists());
    }
}
