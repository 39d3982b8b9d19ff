use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::error::UpdaterError;

pub const MANIFEST_FILE_NAME: &str = "update-manifest.json";
pub const VERSION_PROPERTIES_FILE: &str = "version.properties";
pub const VERSION_PROPERTY_KEY: &str = "smol-version";

const CLASSPATH_EXTENSION: &str = ".jar";
// Any relative path containing one of these fragments is dropped before it
// is ever hashed.
const EXCLUDED_PATH_FRAGMENTS: &[&str] = &[".git", ".hg", ".svn", ".log"];

/// One regular file under the artifact root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// POSIX-style path relative to the artifact root; unique within a manifest.
    pub path: String,
    /// Lowercase hex SHA-256 of the file content.
    pub checksum: String,
    pub size: u64,
    /// True iff the file belongs on the managed runtime's classpath.
    /// Advisory metadata for the launcher; the installer ignores it.
    pub classpath: bool,
}

/// The published artifact descriptor, written fresh on every staging run and
/// superseded (never merged) by the next run for the same channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    /// Remote root used to resolve each entry into a downloadable URL.
    pub base_uri: String,
    /// Local root the manifest was built from, recorded for diagnostics.
    pub base_path: String,
    /// Must contain the version identifier under `smol-version`.
    pub properties: BTreeMap<String, String>,
    /// Sorted by path so repeated runs produce diffable output.
    pub entries: Vec<FileEntry>,
}

/// Describe every regular file under `root`, minus exclusions.
///
/// A missing or unreadable `version.properties` degrades to an empty version
/// property rather than failing: downstream version comparison treats the
/// manifest as "unknown/oldest" and forces an update.
///
/// # Errors
/// Fails if `root` is not an existing directory or a file cannot be read.
pub fn build_manifest(root: &Path, base_uri: &str) -> Result<Manifest, UpdaterError> {
    if !root.is_dir() {
        return Err(UpdaterError::ResourceNotFound {
            what: "artifact root",
            path: root.to_path_buf(),
        });
    }
    info!("manifest: scanning {}", root.display());

    let mut entries = Vec::new();
    for item in WalkDir::new(root) {
        let item =
            item.map_err(|e| UpdaterError::io("failed to walk artifact root", e.into()))?;
        if !item.file_type().is_file() {
            continue;
        }
        let relative = relative_posix_path(root, item.path())?;
        // The manifest never lists itself; a stale copy from the previous
        // run would carry a checksum invalidated by the overwrite.
        if relative == MANIFEST_FILE_NAME || is_excluded(&relative) {
            debug!("manifest: excluding {relative}");
            continue;
        }
        let (checksum, size) = hash_file(item.path())?;
        entries.push(FileEntry {
            classpath: relative.ends_with(CLASSPATH_EXTENSION),
            path: relative,
            checksum,
            size,
        });
    }
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    debug!("manifest: {} entries under {}", entries.len(), root.display());

    let mut properties = BTreeMap::new();
    properties.insert(VERSION_PROPERTY_KEY.to_owned(), read_version_property(root));

    Ok(Manifest {
        base_uri: base_uri.to_owned(),
        base_path: root.display().to_string(),
        properties,
        entries,
    })
}

/// Serialize the manifest to its fixed filename inside the artifact root,
/// overwriting any previous manifest, and print the absolute path written.
pub fn write_manifest(root: &Path, manifest: &Manifest) -> Result<PathBuf, UpdaterError> {
    let path = root.join(MANIFEST_FILE_NAME);
    let bytes = serde_json::to_vec_pretty(manifest)
        .map_err(|e| UpdaterError::io("failed to serialize manifest", e.into()))?;
    fs::write(&path, &bytes).map_err(|e| {
        UpdaterError::io(format!("failed to write manifest to {}", path.display()), e)
    })?;

    let shown = path.canonicalize().unwrap_or_else(|_| path.clone());
    println!("{}", shown.display());
    info!(
        "manifest: wrote {} entries to {}",
        manifest.entries.len(),
        shown.display()
    );
    Ok(path)
}

/// Read a previously staged manifest back from an artifact root.
pub fn read_manifest(root: &Path) -> Result<Manifest, UpdaterError> {
    let path = root.join(MANIFEST_FILE_NAME);
    let bytes = fs::read(&path).map_err(|e| {
        UpdaterError::io(format!("failed to read manifest at {}", path.display()), e)
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        UpdaterError::io(format!("failed to parse manifest at {}", path.display()), e.into())
    })
}

fn relative_posix_path(root: &Path, path: &Path) -> Result<String, UpdaterError> {
    let relative = path
        .strip_prefix(root)
        .map_err(|e| UpdaterError::io("walked path outside artifact root", std::io::Error::other(e)))?;
    Ok(relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/"))
}

fn is_excluded(relative: &str) -> bool {
    EXCLUDED_PATH_FRAGMENTS
        .iter()
        .any(|fragment| relative.contains(fragment))
}

fn hash_file(path: &Path) -> Result<(String, u64), UpdaterError> {
    let mut file = fs::File::open(path).map_err(|e| {
        UpdaterError::io(format!("checksum open error for {}", path.display()), e)
    })?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    let mut size = 0u64;
    loop {
        let read = file.read(&mut buf).map_err(|e| {
            UpdaterError::io(format!("checksum read error for {}", path.display()), e)
        })?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
        size += read as u64;
    }
    Ok((format!("{:x}", hasher.finalize()), size))
}

fn read_version_property(root: &Path) -> String {
    let path = root.join(VERSION_PROPERTIES_FILE);
    let contents = match fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) => {
            warn!(
                "manifest: unable to read {} ({err}); continuing with empty version",
                path.display()
            );
            return String::new();
        }
    };
    parse_version_property(&contents).unwrap_or_else(|| {
        warn!(
            "manifest: no {VERSION_PROPERTY_KEY} key in {}; continuing with empty version",
            path.display()
        );
        String::new()
    })
}

fn parse_version_property(contents: &str) -> Option<String> {
    contents.lines().find_map(|line| {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        let (key, value) = line.split_once('=')?;
        (key.trim() == VERSION_PROPERTY_KEY).then(|| value.trim().to_owned())
    })
}
