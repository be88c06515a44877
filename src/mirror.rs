use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::MirrorError;

/// A remote directory of configuration files.
pub trait RemoteDirectory {
    fn describe(&self) -> String;
    fn list(&self) -> Result<Vec<String>, MirrorError>;
    fn fetch(&self, name: &str) -> Result<Vec<u8>, MirrorError>;
}

/// Remote directory reachable as a local path, e.g. a mounted share.
pub struct MountedDirectory {
    root: PathBuf,
}

impl MountedDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl RemoteDirectory for MountedDirectory {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    fn list(&self) -> Result<Vec<String>, MirrorError> {
        let remote_err = |source| MirrorError::Remote {
            name: self.describe(),
            source,
        };
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root).map_err(remote_err)? {
            let entry = entry.map_err(remote_err)?;
            if entry.file_type().map_err(remote_err)?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn fetch(&self, name: &str) -> Result<Vec<u8>, MirrorError> {
        std::fs::read(self.root.join(name)).map_err(|source| MirrorError::Remote {
            name: name.to_string(),
            source,
        })
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum MirrorOutcome {
    /// The local directory already held files; nothing was copied.
    Skipped,
    Downloaded(Vec<String>),
}

/// Copy every file of `remote` into `local_dir`, unless `local_dir` already
/// exists with something in it.
///
/// Files land in a sibling staging directory first, which is renamed to
/// `local_dir` once every file is copied. A failed run leaves `local_dir`
/// as it was.
pub fn mirror_once(
    remote: &dyn RemoteDirectory,
    local_dir: &Path,
) -> Result<MirrorOutcome, MirrorError> {
    let local_err = |source| MirrorError::Local {
        path: local_dir.to_path_buf(),
        source,
    };

    if local_dir.is_dir() {
        let mut entries = std::fs::read_dir(local_dir).map_err(local_err)?;
        if entries.next().is_some() {
            info!(
                "Local directory already exists and is not empty: {}",
                local_dir.display()
            );
            return Ok(MirrorOutcome::Skipped);
        }
    }

    let staging = staging_dir(local_dir);
    if staging.exists() {
        std::fs::remove_dir_all(&staging).map_err(local_err)?;
    }
    std::fs::create_dir_all(&staging).map_err(local_err)?;

    let names = match copy_all(remote, &staging) {
        Ok(names) => names,
        Err(e) => {
            if let Err(cleanup) = std::fs::remove_dir_all(&staging) {
                warn!(
                    path = %staging.display(),
                    error = %cleanup,
                    "could not remove staging directory"
                );
            }
            return Err(e);
        }
    };

    if local_dir.is_dir() {
        std::fs::remove_dir(local_dir).map_err(local_err)?;
    }
    std::fs::rename(&staging, local_dir).map_err(local_err)?;

    Ok(MirrorOutcome::Downloaded(names))
}

fn staging_dir(local_dir: &Path) -> PathBuf {
    let name = local_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    local_dir.with_file_name(format!(".{name}.partial"))
}

fn copy_all(remote: &dyn RemoteDirectory, staging: &Path) -> Result<Vec<String>, MirrorError> {
    let names = remote.list()?;
    info!("Files found in {}: {:?}", remote.describe(), names);
    for name in &names {
        let bytes = remote.fetch(name)?;
        std::fs::write(staging.join(name), bytes).map_err(|source| MirrorError::Local {
            path: staging.join(name),
            source,
        })?;
        info!("Downloaded: {name}");
    }
    Ok(names)
}
