use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{OrganiseError, Result};

/// Move one file, creating the destination's parent directory.
///
/// Falls back to copy and remove when the rename crosses filesystems.
pub fn move_file(source: &Path, dest: &Path) -> io::Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    match fs::rename(source, dest) {
        Ok(()) => Ok(()),
        Err(err) if is_cross_device(&err) => {
            fs::copy(source, dest)?;
            fs::remove_file(source)
        }
        Err(err) => Err(err),
    }
}

/// Move a whole directory tree by rename.
pub fn move_dir(source: &Path, dest: &Path) -> io::Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::rename(source, dest)
}

/// First free `<stem>_<N><ext>` next to `dest`, or `dest` itself when vacant.
pub fn unique_destination(dest: &Path) -> PathBuf {
    if !dest.exists() {
        return dest.to_path_buf();
    }
    let dir = dest.parent().unwrap_or_else(|| Path::new(""));
    let stem = dest
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = dest
        .extension()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut counter = 1u32;
    loop {
        let candidate = if ext.is_empty() {
            format!("{}_{}", stem, counter)
        } else {
            format!("{}_{}.{}", stem, counter, ext)
        };
        let candidate = dir.join(candidate);
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Check `root` exists, is a directory, and is readable and writable.
pub fn validate_root(root: &Path) -> Result<()> {
    if !root.exists() {
        return Err(OrganiseError::MissingDirectory(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(OrganiseError::NotADirectory(root.to_path_buf()));
    }
    let readable = fs::read_dir(root).is_ok();
    let writable = root
        .metadata()
        .map(|m| !m.permissions().readonly())
        .unwrap_or(false);
    if !readable || !writable {
        return Err(OrganiseError::AccessDenied(root.to_path_buf()));
    }
    Ok(())
}

/// Require an existing directory, reporting it as missing otherwise.
pub fn require_dir(path: &Path) -> Result<()> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(OrganiseError::MissingDirectory(path.to_path_buf()))
    }
}

pub fn file_name_string(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string())
}

fn is_cross_device(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::CrossesDevices
}
