//! Putting artifacts on disk and taking them off again
//!
//! Directory copies and deletes are plain depth-first walks; plugin trees
//! are small.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use plugdock_core::error::{Error, Result};
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::catalog::is_archive;

/// Place a downloaded artifact into `install_dir`
///
/// Archives are extracted into a fresh directory (stale contents are
/// deleted first); anything else is copied in as a single file, replacing a
/// file of the same name.
pub fn place_artifact(artifact: &Path, file_name: &str, install_dir: &Path) -> Result<()> {
    if is_archive(file_name) {
        if install_dir.exists() {
            remove_path(install_dir)?;
        }
        fs::create_dir_all(install_dir).map_err(|e| Error::fs(install_dir, e))?;

        if let Err(e) = extract_zip(artifact, install_dir) {
            if let Err(cleanup) = remove_path(install_dir) {
                warn!(dir = %install_dir.display(), error = %cleanup, "Could not remove partial extraction");
            }
            return Err(e);
        }
    } else {
        fs::create_dir_all(install_dir).map_err(|e| Error::fs(install_dir, e))?;
        let target = install_dir.join(file_name);
        fs::copy(artifact, &target).map_err(|e| Error::fs(&target, e))?;
    }

    debug!(artifact = %artifact.display(), dir = %install_dir.display(), "Artifact placed");
    Ok(())
}

/// Extract a zip archive, skipping entries that would escape `destination`
pub fn extract_zip(archive_path: &Path, destination: &Path) -> Result<()> {
    let file = File::open(archive_path).map_err(|e| Error::fs(archive_path, e))?;
    let mut archive = ZipArchive::new(file)
        .map_err(|e| Error::Archive(format!("{}: {}", archive_path.display(), e)))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| Error::Archive(format!("{}: {}", archive_path.display(), e)))?;

        let outpath = match entry.enclosed_name() {
            Some(path) => destination.join(path),
            None => {
                warn!(entry = %entry.name(), "Skipping archive entry with unsafe path");
                continue;
            }
        };

        if entry.is_dir() {
            fs::create_dir_all(&outpath).map_err(|e| Error::fs(&outpath, e))?;
        } else {
            if let Some(parent) = outpath.parent() {
                fs::create_dir_all(parent).map_err(|e| Error::fs(parent, e))?;
            }
            let mut outfile = File::create(&outpath).map_err(|e| Error::fs(&outpath, e))?;
            io::copy(&mut entry, &mut outfile).map_err(|e| Error::fs(&outpath, e))?;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                fs::set_permissions(&outpath, fs::Permissions::from_mode(mode))
                    .map_err(|e| Error::fs(&outpath, e))?;
            }
        }
    }

    Ok(())
}

/// Recursively copy `src` into `dst`, creating `dst`
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst).map_err(|e| Error::fs(dst, e))?;

    for entry in fs::read_dir(src).map_err(|e| Error::fs(src, e))? {
        let entry = entry.map_err(|e| Error::fs(src, e))?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        let file_type = entry.file_type().map_err(|e| Error::fs(&from, e))?;

        if file_type.is_dir() {
            copy_dir_recursive(&from, &to)?;
        } else {
            fs::copy(&from, &to).map_err(|e| Error::fs(&from, e))?;
        }
    }
    Ok(())
}

/// Delete a file or a directory tree
pub fn remove_path(path: &Path) -> Result<()> {
    let metadata = fs::symlink_metadata(path).map_err(|e| Error::fs(path, e))?;
    if metadata.is_dir() {
        fs::remove_dir_all(path).map_err(|e| Error::fs(path, e))
    } else {
        fs::remove_file(path).map_err(|e| Error::fs(path, e))
    }
}

/// True if anything (including a dangling symlink) exists at `path`
pub fn path_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Copy an installation to `<backup_root>/<name>-<timestamp>`
pub fn backup_installation(
    install_path: &Path,
    backup_root: &Path,
    name: &str,
    at: DateTime<Utc>,
) -> Result<PathBuf> {
    let target = backup_root.join(format!("{}-{}", name, at.format("%Y%m%d-%H%M%S-%3f")));
    if install_path.is_dir() {
        copy_dir_recursive(install_path, &target)?;
    } else {
        fs::create_dir_all(&target).map_err(|e| Error::fs(&target, e))?;
        let file_name = install_path
            .file_name()
            .ok_or_else(|| Error::InvalidInput(format!("{} has no file name", install_path.display())))?;
        let to = target.join(file_name);
        fs::copy(install_path, &to).map_err(|e| Error::fs(&to, e))?;
    }
    Ok(target)
}
