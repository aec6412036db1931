//! Folder Materializer: sorts a staging folder into
//! `<brand>/<product code>/<category>/` and prunes what is left empty.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use indicatif::ProgressBar;
use serde::Serialize;
use tracing::{info, warn};

use crate::collision::{self, Disposition};
use crate::config::Layout;
use crate::consolidate::{assign_product_codes, product_code_of};
use crate::error::{OrganiseError, Result};
use crate::extract::extract;
use crate::fsops::{move_file, require_dir};
use crate::normalize::split_name;
use crate::prune::{Pruner, Remover, force_remove_dir};
use crate::scan::{FileIndex, MediaCategory, category_dir};

#[derive(Debug, Clone)]
pub struct OrganiseOptions {
    pub execute: bool,
    pub layout: Layout,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct OrganiseReport {
    pub files: usize,
    pub brands: usize,
    /// Codes rewritten to a more specific representative.
    pub consolidated_codes: usize,
    pub moved: usize,
    pub quarantined: usize,
    /// Already at their destination.
    pub unchanged: usize,
    /// Brand or code not usable as a folder name, or superseded earlier in the run.
    pub skipped: usize,
    pub failed: usize,
    pub removed_dirs: usize,
    pub stubborn_dirs: Vec<PathBuf>,
}

impl OrganiseReport {
    /// Only leftover empty directories turn a run into a warning; per-file
    /// failures are reported through the counters.
    pub fn success(&self) -> bool {
        self.stubborn_dirs.is_empty()
    }
}

/// A single path component made from parsed text.
fn folder_name(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    match trimmed {
        "" | "." | ".." => None,
        _ => Some(trimmed),
    }
}

struct Placement<'a> {
    name: &'a str,
    /// Brand folder, or product folder when there is a code.
    product_dir: PathBuf,
    category: Option<MediaCategory>,
}

impl Placement<'_> {
    fn dest_dir(&self) -> PathBuf {
        category_dir(&self.product_dir, self.category)
    }

    fn quarantine_dir(&self, layout: &Layout) -> PathBuf {
        category_dir(&self.product_dir.join(&layout.quarantine), self.category)
    }
}

struct Organiser<'a> {
    staging: &'a Path,
    options: &'a OrganiseOptions,
    progress: &'a ProgressBar,
    timestamp: String,
    report: OrganiseReport,
}

impl Organiser<'_> {
    fn dry_run_prefix(&self) -> &'static str {
        if self.options.execute { "" } else { "[DRY RUN] " }
    }

    fn relative<'p>(&self, path: &'p Path) -> &'p Path {
        path.strip_prefix(self.staging).unwrap_or(path)
    }

    /// Names grouped by parsed brand, plus the names no brand came out of.
    fn group_by_brand(index: &FileIndex) -> (BTreeMap<String, Vec<String>>, Vec<String>) {
        let mut brands: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut unbranded = Vec::new();
        for name in index.names() {
            let (stem, _ext) = split_name(name);
            match extract(stem).brand {
                Some(brand) => brands.entry(brand).or_default().push(name.to_string()),
                None => unbranded.push(name.to_string()),
            }
        }
        (brands, unbranded)
    }

    fn run(&mut self, index: &FileIndex) {
        let (brands, unbranded) = Self::group_by_brand(index);
        self.report.brands = brands.len();
        for name in &unbranded {
            warn!("Skipping '{name}': no brand in file name");
        }
        self.skip(index, &unbranded);

        for (brand, names) in &brands {
            info!("Processing brand: {brand} ({} files)", names.len());
            let Some(brand_folder) = folder_name(brand) else {
                warn!("Skipping brand '{brand}': not a usable folder name");
                self.skip(index, names);
                continue;
            };

            let codes = assign_product_codes(names);
            self.report.consolidated_codes += names
                .iter()
                .filter_map(|name| {
                    let resolved = codes.get(name)?;
                    let raw = product_code_of(name)?;
                    (raw != *resolved).then_some(())
                })
                .count();

            let mut by_code: BTreeMap<Option<&str>, Vec<&str>> = BTreeMap::new();
            for name in names {
                by_code
                    .entry(codes.get(name).map(String::as_str))
                    .or_default()
                    .push(name);
            }

            let brand_dir = self.staging.join(brand_folder);
            for (code, group) in by_code {
                let product_dir = match code {
                    Some(code) => match folder_name(code) {
                        Some(code_folder) => brand_dir.join(code_folder),
                        None => {
                            warn!("Skipping product code '{code}': not a usable folder name");
                            self.skip(index, &group);
                            continue;
                        }
                    },
                    None => brand_dir.clone(),
                };
                info!(
                    "Product group {}: {} files",
                    self.relative(&product_dir).display(),
                    group.len()
                );

                for name in group {
                    let placement = Placement {
                        name,
                        product_dir: product_dir.clone(),
                        category: MediaCategory::from_file_name(name),
                    };
                    for path in index.paths(name) {
                        self.place(path, &placement);
                        self.progress.inc(1);
                    }
                }
            }
        }
    }

    fn skip<S: AsRef<str>>(&mut self, index: &FileIndex, names: &[S]) {
        for name in names {
            let count = index.paths(name.as_ref()).len();
            self.report.skipped += count;
            self.progress.inc(count as u64);
        }
    }

    fn place(&mut self, source: &Path, placement: &Placement<'_>) {
        let dest_dir = placement.dest_dir();
        let dest = dest_dir.join(placement.name);
        if source == dest {
            self.report.unchanged += 1;
            return;
        }
        if self.options.execute && !source.exists() {
            info!("Already quarantined: {}", self.relative(source).display());
            self.report.skipped += 1;
            return;
        }

        if self.options.execute {
            if let Err(e) = fs::create_dir_all(&dest_dir) {
                warn!("Failed to create {}: {e}", dest_dir.display());
                self.report.failed += 1;
                return;
            }
        }

        let disposition = match collision::decide(&dest_dir, placement.name, source) {
            Ok(disposition) => disposition,
            Err(e) => {
                warn!("Failed to inspect {}: {e}", dest_dir.display());
                self.report.failed += 1;
                return;
            }
        };

        match disposition {
            Disposition::Vacant => {}
            Disposition::ReplaceVariant(existing) | Disposition::ReplaceOccupant(existing) => {
                if !self.quarantine(&existing, placement) {
                    self.report.failed += 1;
                    return;
                }
                // The variant may sit under another name while `dest` itself is taken too.
                if existing != dest && dest.exists() && !self.quarantine(&dest, placement) {
                    self.report.failed += 1;
                    return;
                }
            }
        }

        if self.options.execute {
            if let Err(e) = move_file(source, &dest) {
                warn!("Error moving {}: {e}", source.display());
                self.report.failed += 1;
                return;
            }
        }
        info!(
            "{}MOVE {} -> {}",
            self.dry_run_prefix(),
            self.relative(source).display(),
            self.relative(&dest).display()
        );
        self.report.moved += 1;
    }

    fn quarantine(&mut self, existing: &Path, placement: &Placement<'_>) -> bool {
        let quarantine_dir = placement.quarantine_dir(&self.options.layout);
        info!(
            "{}Found existing file {} for {}",
            self.dry_run_prefix(),
            self.relative(existing).display(),
            placement.name
        );
        if self.options.execute {
            if let Err(e) = collision::quarantine(existing, &quarantine_dir, &self.timestamp) {
                warn!(
                    "Error moving existing file {} to quarantine: {e}",
                    existing.display()
                );
                return false;
            }
        }
        self.report.quarantined += 1;
        true
    }
}

/// Organise the staging folder in place.
///
/// # Errors
/// `OrganiseError::MissingDirectory` when `staging` does not exist.
pub fn organise(
    staging: &Path,
    options: &OrganiseOptions,
    progress: &ProgressBar,
) -> Result<OrganiseReport> {
    organise_with_remover(staging, options, progress, force_remove_dir)
}

fn organise_with_remover(
    staging: &Path,
    options: &OrganiseOptions,
    progress: &ProgressBar,
    remover: Remover,
) -> Result<OrganiseReport> {
    require_dir(staging)?;
    let folder = staging
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if !folder.starts_with("__webp") {
        warn!("The folder name doesn't start with '__webp'. Continuing anyway...");
    }
    info!("Organising files in: {}", staging.display());

    let index = FileIndex::build(staging, &options.layout.quarantine);
    if index.is_empty() {
        info!("No files to organise");
    }
    progress.set_length(index.file_count() as u64);

    let mut organiser = Organiser {
        staging,
        options,
        progress,
        timestamp: collision::replacement_timestamp(),
        report: OrganiseReport {
            files: index.file_count(),
            ..OrganiseReport::default()
        },
    };
    organiser.run(&index);
    progress.finish_and_clear();

    let mut report = organiser.report;
    if options.execute {
        let prune = Pruner::new(options.layout.max_prune_passes)
            .keep(staging)
            .protect(options.layout.quarantine.clone())
            .remover(remover)
            .prune(staging);
        if !prune.is_clean() {
            warn!("{} empty folders could not be removed", prune.stubborn.len());
        }
        report.removed_dirs = prune.removed;
        report.stubborn_dirs = prune.stubborn;
    }
    Ok(report)
}

/// Organise `<root>/<staging>`, reporting a missing staging folder by name.
pub fn organise_root(
    root: &Path,
    options: &OrganiseOptions,
    progress: &ProgressBar,
) -> Result<OrganiseReport> {
    let staging = options.layout.staging_dir(root);
    if !staging.is_dir() {
        return Err(OrganiseError::MissingDirectory(staging));
    }
    organise(&staging, options, progress)
}
