//! Removal of directories left empty after files have been moved out.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Debug, Default, Clone, Serialize)]
pub struct PruneReport {
    pub removed: usize,
    /// Empty directories that survived every removal strategy.
    pub stubborn: Vec<PathBuf>,
}

impl PruneReport {
    pub fn is_clean(&self) -> bool {
        self.stubborn.is_empty()
    }
}

/// Removal strategy for one directory; `true` when it is gone.
pub type Remover = fn(&Path) -> bool;

pub struct Pruner {
    keep: HashSet<PathBuf>,
    protected_name: Option<String>,
    max_passes: usize,
    remover: Remover,
}

impl Pruner {
    pub fn new(max_passes: usize) -> Self {
        Self {
            keep: HashSet::new(),
            protected_name: None,
            max_passes: max_passes.max(1),
            remover: force_remove_dir,
        }
    }

    /// Replace the default [`force_remove_dir`] escalation.
    pub fn remover(mut self, remover: Remover) -> Self {
        self.remover = remover;
        self
    }

    /// Never remove this exact directory.
    pub fn keep(mut self, dir: impl Into<PathBuf>) -> Self {
        self.keep.insert(dir.into());
        self
    }

    /// Never enter nor remove directories with this name.
    pub fn protect(mut self, name: impl Into<String>) -> Self {
        self.protected_name = Some(name.into());
        self
    }

    fn is_protected(&self, name: &std::ffi::OsStr) -> bool {
        self.protected_name
            .as_deref()
            .is_some_and(|protected| name == protected)
    }

    /// All directories below `root`, deepest first.
    fn collect_dirs(&self, root: &Path) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = WalkDir::new(root)
            .min_depth(1)
            .into_iter()
            .filter_entry(|entry| !self.is_protected(entry.file_name()))
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_dir())
            .map(|entry| entry.into_path())
            .collect();
        dirs.sort_by_key(|dir| std::cmp::Reverse(dir.components().count()));
        dirs
    }

    fn removable(&self, root: &Path, dir: &Path) -> bool {
        dir != root && !self.keep.contains(dir) && dir.exists() && is_truly_empty(dir)
    }

    /// Remove empty directories below `root` until a pass removes nothing, then
    /// verify and report the survivors.
    pub fn prune(&self, root: &Path) -> PruneReport {
        let mut report = PruneReport::default();

        for pass in 1..=self.max_passes {
            let mut removed_this_pass = 0;
            for dir in self.collect_dirs(root) {
                if !self.removable(root, &dir) {
                    continue;
                }
                if (self.remover)(&dir) {
                    info!("Removed empty folder: {}", relative(root, &dir).display());
                    removed_this_pass += 1;
                } else {
                    warn!("Failed to remove: {}", relative(root, &dir).display());
                }
            }
            report.removed += removed_this_pass;
            debug!("Prune pass {pass}/{} removed {removed_this_pass}", self.max_passes);
            if removed_this_pass == 0 {
                break;
            }
        }

        for dir in self.collect_dirs(root) {
            if !self.removable(root, &dir) {
                continue;
            }
            if (self.remover)(&dir) {
                info!("Final removal: {}", relative(root, &dir).display());
                report.removed += 1;
            } else {
                warn!("Stubborn directory: {}", relative(root, &dir).display());
                report.stubborn.push(dir);
            }
        }

        report
    }
}

/// No entries at all, hidden ones included. Unreadable directories count as non-empty.
pub fn is_truly_empty(dir: &Path) -> bool {
    fs::read_dir(dir).is_ok_and(|mut entries| entries.next().is_none())
}

/// Plain removal, then with write permission restored, then recursive removal.
pub fn force_remove_dir(dir: &Path) -> bool {
    if fs::remove_dir(dir).is_ok() {
        return true;
    }
    if make_writable(dir) && fs::remove_dir(dir).is_ok() {
        return true;
    }
    dir.exists() && fs::remove_dir_all(dir).is_ok()
}

#[cfg(unix)]
fn make_writable(dir: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(dir, fs::Permissions::from_mode(0o755)).is_ok()
}

#[cfg(not(unix))]
fn make_writable(dir: &Path) -> bool {
    let Ok(metadata) = fs::metadata(dir) else {
        return false;
    };
    let mut permissions = metadata.permissions();
    #[allow(clippy::permissions_set_readonly_false)]
    permissions.set_readonly(false);
    fs::set_permissions(dir, permissions).is_ok()
}

fn relative<'a>(root: &Path, dir: &'a Path) -> &'a Path {
    dir.strip_prefix(root).unwrap_or(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn removes_nested_empty_directories() {
        let root = TempDir::new().unwrap();
        let base = root.path();
        fs::create_dir_all(base.join("a/b/c")).unwrap();
        fs::create_dir_all(base.join("d/e")).unwrap();
        fs::write(base.join("d/keep.jpg"), b"x").unwrap();

        let report = Pruner::new(10).prune(base);

        assert!(report.is_clean());
        assert_eq!(report.removed, 4);
        assert!(!base.join("a").exists());
        assert!(base.join("d/keep.jpg").exists());
        assert!(!base.join("d/e").exists());
        assert!(base.exists());
    }

    #[test]
    fn hidden_files_keep_directories() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("a")).unwrap();
        fs::write(root.path().join("a/.keep"), b"").unwrap();

        let report = Pruner::new(10).prune(root.path());

        assert_eq!(report.removed, 0);
        assert!(root.path().join("a/.keep").exists());
    }

    #[test]
    fn kept_and_protected_directories_survive() {
        let root = TempDir::new().unwrap();
        let base = root.path();
        fs::create_dir_all(base.join("Needs Labeling")).unwrap();
        fs::create_dir_all(base.join("Acme/Old Images/WEBP")).unwrap();
        fs::create_dir_all(base.join("Acme/X1/JPEG")).unwrap();

        let report = Pruner::new(10)
            .keep(base.join("Needs Labeling"))
            .protect("Old Images")
            .prune(base);

        assert!(report.is_clean());
        assert!(base.join("Needs Labeling").exists());
        assert!(base.join("Acme/Old Images/WEBP").exists());
        assert!(!base.join("Acme/X1").exists());
    }

    #[test]
    fn survivors_are_reported_stubborn() {
        let root = TempDir::new().unwrap();
        let base = root.path();
        fs::create_dir_all(base.join("Acme/X1")).unwrap();

        let report = Pruner::new(10).remover(|_| false).prune(base);

        assert!(!report.is_clean());
        assert_eq!(report.removed, 0);
        assert_eq!(report.stubborn, vec![base.join("Acme/X1")]);
    }
}
