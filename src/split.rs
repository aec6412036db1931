//! Bucketing pass over raw contributor drops below the root.
//!
//! Media goes to the staging folder for the organise pass, unlabeled images
//! and non-media go to `Needs Labeling`, and `.gslisting` folders are moved
//! whole into `gslisting`.

use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use indicatif::ProgressBar;
use regex::Regex;
use serde::Serialize;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::collision::place_versioned;
use crate::config::Layout;
use crate::error::{OrganiseError, Result};
use crate::fsops::{file_name_string, move_dir, require_dir, unique_destination};
use crate::normalize::split_name;
use crate::prune::Pruner;
use crate::scan::{MediaFile, classify_file};

static CAMERA_TIMESTAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{8}_\d{6}").expect("valid timestamp regex"));

static SEQUENCE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-_\s][A-Za-z0-9]$").expect("valid suffix regex"));

static VERSION_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_v\d+").expect("valid version regex"));

const GSLISTING_SUFFIX: &str = ".gslisting";
const UNKNOWN_BRAND: &str = "UnknownBrand";
const UNKNOWN_PRODUCT: &str = "UnknownProduct";

#[derive(Debug, Clone)]
pub struct SplitOptions {
    pub execute: bool,
    pub layout: Layout,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct SplitReport {
    pub images: usize,
    pub mov: usize,
    pub media: usize,
    pub versioned: usize,
    pub needs_labeling: usize,
    pub gslisting: usize,
    pub failed: usize,
    pub removed_dirs: usize,
    pub stubborn_dirs: Vec<PathBuf>,
}

impl SplitReport {
    pub fn success(&self) -> bool {
        self.stubborn_dirs.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bucket {
    Mov,
    Image,
    Media,
    NonMedia,
}

fn bucket_of(path: &Path) -> Bucket {
    match classify_file(path) {
        MediaFile::Recognized { extension, .. } if extension == "mov" => Bucket::Mov,
        MediaFile::Recognized { .. } if is_unlabeled_image(&file_name_string(path)) => {
            Bucket::Image
        }
        MediaFile::Recognized { .. } => Bucket::Media,
        MediaFile::Unrecognized { .. } => Bucket::NonMedia,
    }
}

/// Camera names (`IMG_0042.jpg`, `20240301_140509.webp`) carry no product.
fn is_unlabeled_image(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    if lower.ends_with(".mov") {
        return false;
    }
    ["img", "images", "image"]
        .iter()
        .any(|prefix| lower.starts_with(prefix))
        || CAMERA_TIMESTAMP.is_match(file_name)
}

pub fn is_versioned(file_name: &str) -> bool {
    VERSION_MARKER.is_match(file_name)
}

/// Append `-0` to the stem unless it already ends in a sequence character.
pub fn ensure_sequence_suffix(file_name: &str) -> String {
    let (stem, ext) = split_name(file_name);
    if SEQUENCE_SUFFIX.is_match(stem) {
        file_name.to_string()
    } else {
        format!("{stem}-0{ext}")
    }
}

/// `A`..`Z` for the first 26 clips, then the 1-based position.
fn sequence_id(index: usize) -> String {
    match u8::try_from(index) {
        Ok(n) if n < 26 => char::from(b'A' + n).to_string(),
        _ => (index + 1).to_string(),
    }
}

fn relative_parts(rel: &Path) -> Vec<String> {
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

struct Splitter<'a> {
    root: &'a Path,
    options: &'a SplitOptions,
    staging: PathBuf,
    needs_labeling: PathBuf,
    gslisting: PathBuf,
    /// Clips named in a dry run, per `<brand>-<product>-` prefix.
    planned_clips: HashMap<String, usize>,
    report: SplitReport,
}

impl Splitter<'_> {
    fn dry_run_prefix(&self) -> &'static str {
        if self.options.execute { "" } else { "[DRY RUN] " }
    }

    fn is_kept(&self, path: &Path) -> bool {
        path == self.staging || path == self.needs_labeling || path == self.gslisting
    }

    fn relative<'p>(&self, path: &'p Path) -> &'p Path {
        path.strip_prefix(self.root).unwrap_or(path)
    }

    /// `.gslisting` folders outside the kept folders, outermost only.
    fn find_gslisting_dirs(&self) -> Vec<PathBuf> {
        let mut found = Vec::new();
        let mut walker = WalkDir::new(self.root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter();
        while let Some(entry) = walker.next() {
            let Ok(entry) = entry else { continue };
            if !entry.file_type().is_dir() {
                continue;
            }
            if entry.depth() == 1 && self.is_kept(entry.path()) {
                walker.skip_current_dir();
                continue;
            }
            if entry.file_name().to_string_lossy().ends_with(GSLISTING_SUFFIX) {
                found.push(entry.into_path());
                walker.skip_current_dir();
            }
        }
        found
    }

    /// Files in subfolders of the root, outside kept folders and `.gslisting` trees.
    fn find_loose_files(&self) -> Vec<PathBuf> {
        WalkDir::new(self.root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                if !entry.file_type().is_dir() {
                    return true;
                }
                let kept = entry.depth() == 1 && self.is_kept(entry.path());
                !kept && !entry.file_name().to_string_lossy().ends_with(GSLISTING_SUFFIX)
            })
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.depth() >= 2 && entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .collect()
    }

    fn move_gslisting(&mut self, dir: &Path) {
        let dest = unique_destination(&self.gslisting.join(file_name_string(dir)));
        if self.options.execute {
            if let Err(e) = move_dir(dir, &dest) {
                warn!("Error moving {}: {e}", dir.display());
                self.report.failed += 1;
                return;
            }
        }
        info!(
            "{}GSLISTING {} -> {}",
            self.dry_run_prefix(),
            self.relative(dir).display(),
            self.relative(&dest).display()
        );
        self.report.gslisting += 1;
    }

    fn clip_name(&mut self, source: &Path) -> String {
        let parts = relative_parts(self.relative(source));
        let brand = if parts.len() > 1 { parts[0].as_str() } else { UNKNOWN_BRAND };
        let product = if parts.len() > 2 { parts[1].as_str() } else { UNKNOWN_PRODUCT };
        let file_name = file_name_string(source);
        let (_stem, ext) = split_name(&file_name);
        let prefix = format!("{brand}-{product}-");

        let existing = fs::read_dir(&self.staging)
            .map(|entries| {
                entries
                    .filter_map(|entry| entry.ok())
                    .filter(|entry| {
                        let name = entry.file_name().to_string_lossy().into_owned();
                        name.starts_with(&prefix) && name.ends_with(ext)
                    })
                    .count()
            })
            .unwrap_or(0);
        let planned = self.planned_clips.entry(prefix.clone()).or_default();
        let name = format!("{prefix}{}{ext}", sequence_id(existing + *planned));
        if !self.options.execute {
            *planned += 1;
        }
        name
    }

    /// Move `source` to `dest`, versioning on conflict. Returns the final path.
    fn place(&mut self, source: &Path, dest: PathBuf, label: &str) -> Option<PathBuf> {
        let final_dest = if self.options.execute {
            match place_versioned(source, &dest) {
                Ok(path) => path,
                Err(e) => {
                    warn!("Error moving {}: {e}", source.display());
                    self.report.failed += 1;
                    return None;
                }
            }
        } else {
            dest
        };
        info!(
            "{}{label} {} -> {}",
            self.dry_run_prefix(),
            self.relative(source).display(),
            self.relative(&final_dest).display()
        );
        Some(final_dest)
    }

    fn bucket_file(&mut self, source: &Path) {
        let rel = self.relative(source).to_path_buf();
        match bucket_of(source) {
            Bucket::Mov => {
                let clip = self.clip_name(source);
                let dest = self.staging.join(clip);
                if self.place(source, dest, "MOV").is_some() {
                    self.report.mov += 1;
                }
            }
            Bucket::Image => {
                let dest = self.needs_labeling.join(&rel);
                if self.place(source, dest, "IMAGE").is_some() {
                    self.report.images += 1;
                }
            }
            Bucket::Media => {
                let dest = self
                    .staging
                    .join(ensure_sequence_suffix(&file_name_string(source)));
                let taken = dest.exists();
                if let Some(final_dest) = self.place(source, dest, "MEDIA") {
                    let versioned = if self.options.execute {
                        is_versioned(&file_name_string(&final_dest))
                    } else {
                        taken
                    };
                    if versioned {
                        self.report.versioned += 1;
                    } else {
                        self.report.media += 1;
                    }
                }
            }
            Bucket::NonMedia => {
                let dest = self.needs_labeling.join(&rel);
                if self.place(source, dest, "NON-MEDIA").is_some() {
                    self.report.needs_labeling += 1;
                }
            }
        }
    }
}

/// Bucket everything below `root`.
///
/// # Errors
/// `OrganiseError::MissingDirectory` when `root` does not exist, or `Io` when
/// a bucket folder cannot be created.
pub fn split(root: &Path, options: &SplitOptions, progress: &ProgressBar) -> Result<SplitReport> {
    require_dir(root)?;
    let layout = &options.layout;
    let mut splitter = Splitter {
        root,
        options,
        staging: layout.staging_dir(root),
        needs_labeling: layout.needs_labeling_dir(root),
        gslisting: layout.gslisting_dir(root),
        planned_clips: HashMap::new(),
        report: SplitReport::default(),
    };

    if options.execute {
        for dir in [&splitter.needs_labeling, &splitter.staging, &splitter.gslisting] {
            fs::create_dir_all(dir).map_err(|e| OrganiseError::io(dir, e))?;
        }
    }
    info!("Processing files in: {}", root.display());

    for dir in splitter.find_gslisting_dirs() {
        splitter.move_gslisting(&dir);
    }

    let files = splitter.find_loose_files();
    info!("Found {} files to process", files.len());
    progress.set_length(files.len() as u64);
    for source in &files {
        if source.exists() {
            splitter.bucket_file(source);
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    let mut report = splitter.report;
    if options.execute {
        let prune = Pruner::new(layout.max_prune_passes)
            .keep(root)
            .keep(layout.needs_labeling_dir(root))
            .keep(layout.staging_dir(root))
            .keep(layout.gslisting_dir(root))
            .protect(layout.quarantine.clone())
            .prune(root);
        if !prune.is_clean() {
            warn!("{} empty folders could not be removed", prune.stubborn.len());
        }
        report.removed_dirs = prune.removed;
        report.stubborn_dirs = prune.stubborn;
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn options(execute: bool) -> SplitOptions {
        SplitOptions {
            execute,
            layout: Layout::default(),
        }
    }

    fn write(path: &Path, content: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn sequence_suffix_is_added_once() {
        assert_eq!(ensure_sequence_suffix("Widget.webp"), "Widget-0.webp");
        assert_eq!(ensure_sequence_suffix("Widget-A.webp"), "Widget-A.webp");
        assert_eq!(ensure_sequence_suffix("Widget 2.jpg"), "Widget 2.jpg");
        assert_eq!(ensure_sequence_suffix("WidgetA.jpg"), "WidgetA-0.jpg");
    }

    #[test]
    fn sequence_ids_continue_past_z() {
        assert_eq!(sequence_id(0), "A");
        assert_eq!(sequence_id(25), "Z");
        assert_eq!(sequence_id(26), "27");
    }

    #[test]
    fn camera_names_are_unlabeled_images() {
        assert!(is_unlabeled_image("IMG_0042.jpg"));
        assert!(is_unlabeled_image("shot 20240301_140509.webp"));
        assert!(!is_unlabeled_image("img_0001.mov"));
        assert!(!is_unlabeled_image("Widget-A.jpg"));
    }

    #[test]
    fn files_are_bucketed() {
        let root = TempDir::new().unwrap();
        let root = root.path();
        write(&root.join("Acme/Drill/clip.MOV"), b"m");
        write(&root.join("Acme/Drill/IMG_0001.jpg"), b"i");
        write(&root.join("Acme/Drill/Acme Drill.webp"), b"w");
        write(&root.join("Acme/notes.txt"), b"n");
        write(&root.join("top-level.webp"), b"t");

        let report = split(root, &options(true), &ProgressBar::hidden()).unwrap();

        assert!(report.success());
        assert_eq!((report.mov, report.images, report.media, report.needs_labeling), (1, 1, 1, 1));
        let staging = root.join("__WEBP To be move to the right folders");
        assert!(staging.join("Acme-Drill-A.MOV").exists());
        assert!(staging.join("Acme Drill-0.webp").exists());
        assert!(root.join("Needs Labeling/Acme/Drill/IMG_0001.jpg").exists());
        assert!(root.join("Needs Labeling/Acme/notes.txt").exists());
        assert!(root.join("top-level.webp").exists());
        assert!(!root.join("Acme").exists());
    }

    #[test]
    fn clips_get_successive_letters() {
        let root = TempDir::new().unwrap();
        let root = root.path();
        write(&root.join("Acme/Drill/one.mov"), b"1");
        write(&root.join("Acme/Drill/two.mov"), b"2");
        write(&root.join("Acme/loose.mov"), b"3");

        split(root, &options(true), &ProgressBar::hidden()).unwrap();

        let staging = root.join("__WEBP To be move to the right folders");
        assert_eq!(fs::read(staging.join("Acme-Drill-A.mov")).unwrap(), b"1");
        assert_eq!(fs::read(staging.join("Acme-Drill-B.mov")).unwrap(), b"2");
        assert!(staging.join("Acme-UnknownProduct-A.mov").exists());
    }

    #[test]
    fn gslisting_folders_move_whole() {
        let root = TempDir::new().unwrap();
        let root = root.path();
        write(&root.join("Acme/shop.gslisting/listing.webp"), b"l");
        write(&root.join("gslisting/shop.gslisting/old.webp"), b"o");

        let report = split(root, &options(true), &ProgressBar::hidden()).unwrap();

        assert_eq!(report.gslisting, 1);
        assert_eq!(report.media, 0);
        assert!(root.join("gslisting/shop_1.gslisting/listing.webp").exists());
        assert!(root.join("gslisting/shop.gslisting/old.webp").exists());
    }

    #[test]
    fn conflicting_media_is_versioned() {
        let root = TempDir::new().unwrap();
        let root = root.path();
        let staging = root.join("__WEBP To be move to the right folders");
        write(&staging.join("Widget-A.webp"), b"old");
        write(&root.join("drop/Widget-A.webp"), b"new");

        let report = split(root, &options(true), &ProgressBar::hidden()).unwrap();

        assert_eq!(report.versioned, 1);
        let names: Vec<String> = fs::read_dir(&staging)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.iter().all(|name| is_versioned(name)));
    }

    #[test]
    fn dry_run_moves_nothing() {
        let root = TempDir::new().unwrap();
        let root = root.path();
        write(&root.join("Acme/Drill/a.mov"), b"1");
        write(&root.join("Acme/Drill/b.mov"), b"2");

        let report = split(root, &options(false), &ProgressBar::hidden()).unwrap();

        assert_eq!(report.mov, 2);
        assert!(root.join("Acme/Drill/a.mov").exists());
        assert!(!root.join("Needs Labeling").exists());
    }
}
