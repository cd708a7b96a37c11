use crate::{
    cancel::CancelToken,
    error::{Error, Result, UpdateError},
    hashing,
    package::UpdateCandidate,
    transport::Transport,
};
use std::{
    ffi::OsString,
    fs::{self, File},
    io,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{info, warn};

const TEMP_SUFFIX: &str = ".tmp";
const DISABLED_SUFFIX: &str = ".disabled";

#[derive(Debug, Default)]
pub struct ApplyReport {
    pub succeeded: usize,
    pub failed: usize,
    pub installed: Vec<PathBuf>,
    pub errors: Vec<UpdateError>,
}

impl ApplyReport {
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

pub struct UpdateExecutor {
    transport: Arc<dyn Transport>,
    mods_dir: PathBuf,
}

impl UpdateExecutor {
    pub fn new(transport: Arc<dyn Transport>, mods_dir: impl Into<PathBuf>) -> Self {
        Self {
            transport,
            mods_dir: mods_dir.into(),
        }
    }

    pub fn apply_selected(
        &self,
        candidates: &[UpdateCandidate],
        cancel: &CancelToken,
    ) -> ApplyReport {
        self.apply_all(candidates, |candidate| candidate.selected, cancel)
    }

    pub fn apply_all<F>(
        &self,
        candidates: &[UpdateCandidate],
        select: F,
        cancel: &CancelToken,
    ) -> ApplyReport
    where
        F: Fn(&UpdateCandidate) -> bool,
    {
        let chosen: Vec<&UpdateCandidate> = candidates.iter().filter(|c| select(*c)).collect();
        let total = chosen.len();
        let mut report = ApplyReport::default();
        for (index, candidate) in chosen.into_iter().enumerate() {
            if cancel.is_cancelled() {
                info!(done = index, total, "update batch cancelled");
                break;
            }
            info!(
                "Updating {} ({}/{total})",
                candidate.display_name(),
                index + 1
            );
            match self.apply(candidate) {
                Ok(path) => {
                    report.succeeded += 1;
                    report.installed.push(path);
                }
                Err(err) => {
                    warn!("{err}");
                    report.failed += 1;
                    report.errors.push(err);
                }
            }
        }
        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            "update batch finished"
        );
        report
    }

    pub fn apply(&self, candidate: &UpdateCandidate) -> std::result::Result<PathBuf, UpdateError> {
        self.replace(candidate).map_err(|source| UpdateError {
            package: candidate.display_name(),
            file_name: candidate.file_name.clone(),
            source,
        })
    }

    fn replace(&self, candidate: &UpdateCandidate) -> Result<PathBuf> {
        let file_name = checked_file_name(&candidate.file_name)?;
        let destination = self.mods_dir.join(file_name);
        let temp_path = suffixed(&destination, TEMP_SUFFIX);

        let result = self
            .download_verified(candidate, &temp_path)
            .and_then(|()| swap_into_place(&temp_path, &destination, &candidate.current_file));
        if result.is_err() {
            if let Err(err) = remove_if_present(&temp_path) {
                warn!("Failed to clean up {}: {err}", temp_path.display());
            }
        }
        result.map(|()| destination)
    }

    fn download_verified(&self, candidate: &UpdateCandidate, temp_path: &Path) -> Result<()> {
        fs::create_dir_all(&self.mods_dir)?;
        let mut file = File::create(temp_path)?;
        let bytes = self.transport.download(&candidate.download_url, &mut file)?;
        file.sync_all()?;
        drop(file);

        if let Some(expected) = candidate.remote_digest.as_deref() {
            let actual = hashing::digest(temp_path)?;
            if !hashing::digests_match(expected, &actual) {
                return Err(Error::DigestMismatch {
                    file: candidate.file_name.clone(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }
        info!(bytes, "downloaded {}", candidate.file_name);
        Ok(())
    }
}

// Once the rename lands the update is live; leftovers are only reported.
fn swap_into_place(temp_path: &Path, destination: &Path, old_file: &Path) -> Result<()> {
    let replaces_old = same_path(old_file, destination);
    fs::rename(temp_path, destination)?;

    let marker = suffixed(old_file, DISABLED_SUFFIX);
    if !same_path(&marker, destination) {
        if let Err(err) = remove_if_present(&marker) {
            warn!(
                "Installed {} but could not remove {}: {err}",
                destination.display(),
                marker.display()
            );
        }
    }
    if !replaces_old {
        if let Err(err) = remove_if_present(old_file) {
            warn!(
                "Installed {} but could not remove {}: {err}",
                destination.display(),
                old_file.display()
            );
        }
    }
    Ok(())
}

fn checked_file_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    let plain = !trimmed.is_empty()
        && trimmed != "."
        && trimmed != ".."
        && !trimmed.contains(['/', '\\'])
        && Path::new(trimmed).file_name().map(|n| n == trimmed).unwrap_or(false);
    if plain {
        Ok(trimmed)
    } else {
        Err(Error::InvalidFileName(name.to_string()))
    }
}

fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let mut raw = OsString::from(path.as_os_str());
    raw.push(suffix);
    PathBuf::from(raw)
}

fn same_path(left: &Path, right: &Path) -> bool {
    if left == right {
        return true;
    }
    match (fs::canonicalize(left), fs::canonicalize(right)) {
        (Ok(left), Ok(right)) => left == right,
        _ => false,
    }
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
