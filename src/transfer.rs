//! Move organised brand folders out of staging into same-named folders of the root.

use std::fs;
use std::path::{Path, PathBuf};

use indicatif::ProgressBar;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Layout;
use crate::error::{OrganiseError, Result};
use crate::fsops::{file_name_string, move_file, require_dir, unique_destination};
use crate::normalize::fold_separators;
use crate::scan::discover_files;

#[derive(Debug, Clone)]
pub struct TransferOptions {
    pub execute: bool,
    pub layout: Layout,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct TransferReport {
    pub matched_folders: usize,
    pub moved: usize,
    /// Moved under a `_N` name because the target was taken.
    pub renamed: usize,
    pub failed: usize,
    pub removed_folders: usize,
    pub unmatched: Vec<String>,
}

impl TransferReport {
    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

fn subdirectories(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| OrganiseError::io(dir, e))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
        .map(|entry| entry.path())
        .collect();
    dirs.sort();
    Ok(dirs)
}

/// First of `targets` whose folded name equals the folded name of `source`.
pub fn find_matching_folder<'t>(source: &str, targets: &'t [PathBuf]) -> Option<&'t PathBuf> {
    let wanted = fold_separators(source);
    targets
        .iter()
        .find(|target| fold_separators(&file_name_string(target)) == wanted)
}

/// Transfer every staging subfolder that has a counterpart in `root`.
///
/// # Errors
/// `OrganiseError::MissingDirectory` when `root` or its staging folder is absent.
pub fn transfer(
    root: &Path,
    options: &TransferOptions,
    progress: &ProgressBar,
) -> Result<TransferReport> {
    require_dir(root)?;
    let staging = options.layout.staging_dir(root);
    require_dir(&staging)?;
    let prefix = if options.execute { "" } else { "[DRY RUN] " };

    let targets: Vec<PathBuf> = subdirectories(root)?
        .into_iter()
        .filter(|dir| *dir != staging)
        .collect();
    debug!("Found {} folders in {}", targets.len(), root.display());

    let mut report = TransferReport::default();
    let sources = subdirectories(&staging)?;
    progress.set_length(sources.len() as u64);

    for source in sources {
        progress.inc(1);
        let name = file_name_string(&source);
        let Some(target) = find_matching_folder(&name, &targets) else {
            info!("No matching folder found for: {name}");
            report.unmatched.push(name);
            continue;
        };
        info!(
            "Found matching folder: '{name}' -> '{}'",
            file_name_string(target)
        );
        report.matched_folders += 1;

        for file in discover_files(&source) {
            let Ok(rel) = file.strip_prefix(&source) else {
                continue;
            };
            let wanted = target.join(rel);
            let dest = unique_destination(&wanted);
            if options.execute {
                if let Err(e) = move_file(&file, &dest) {
                    warn!("Error moving {}: {e}", file.display());
                    report.failed += 1;
                    continue;
                }
            }
            info!("{prefix}MOVE {} -> {}", file.display(), dest.display());
            report.moved += 1;
            if dest != wanted {
                report.renamed += 1;
            }
        }

        if options.execute {
            if discover_files(&source).is_empty() {
                match fs::remove_dir_all(&source) {
                    Ok(()) => {
                        info!("Removed folder: {}", source.display());
                        report.removed_folders += 1;
                    }
                    Err(e) => warn!("Error removing folder {}: {e}", source.display()),
                }
            } else {
                warn!("Folder {} still contains files, not removing", source.display());
            }
        }
    }
    progress.finish_and_clear();

    Ok(report)
}
