use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

pub enum MediaFile {
    Recognized { path: PathBuf, extension: String },
    Unrecognized { path: PathBuf, extension: String },
}

/// Destination folder of a file below its product folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaCategory {
    Webp,
    Jpeg,
    UneditedVideo,
    EditedVideo,
    Unedited,
}

impl MediaCategory {
    /// `img*` names are camera originals regardless of extension.
    pub fn from_file_name(name: &str) -> Option<Self> {
        if name.to_lowercase().starts_with("img") {
            return Some(Self::Unedited);
        }
        match lower_extension(Path::new(name)).as_str() {
            "webp" => Some(Self::Webp),
            "jpg" | "jpeg" | "png" => Some(Self::Jpeg),
            "mov" => Some(Self::UneditedVideo),
            "mp4" => Some(Self::EditedVideo),
            _ => None,
        }
    }

    pub fn components(self) -> &'static [&'static str] {
        match self {
            Self::Webp => &["WEBP"],
            Self::Jpeg => &["JPEG"],
            Self::UneditedVideo => &["Video", "Unedited video"],
            Self::EditedVideo => &["Video", "Edited video"],
            Self::Unedited => &["Unedited"],
        }
    }

    pub fn join_onto(self, base: &Path) -> PathBuf {
        self.components()
            .iter()
            .fold(base.to_path_buf(), |path, part| path.join(part))
    }
}

/// Join an optional category below `base`.
pub fn category_dir(base: &Path, category: Option<MediaCategory>) -> PathBuf {
    category.map_or_else(|| base.to_path_buf(), |c| c.join_onto(base))
}

fn lower_extension(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

pub fn discover_files(source: &Path) -> Vec<PathBuf> {
    WalkDir::new(source)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect()
}

pub fn classify_file(path: &Path) -> MediaFile {
    let extension = lower_extension(path);

    let recognized = matches!(
        extension.as_str(),
        "webp" | "jpg" | "jpeg" | "png" | "mov" | "mp4"
    );

    if recognized {
        MediaFile::Recognized {
            path: path.to_path_buf(),
            extension,
        }
    } else {
        MediaFile::Unrecognized {
            path: path.to_path_buf(),
            extension,
        }
    }
}

/// Name to paths index of every file below a staging folder, gathered in one walk.
///
/// Directories named `skip_dir` (the quarantine) are not entered and names
/// without a `.` are left out.
#[derive(Debug, Default)]
pub struct FileIndex {
    by_name: BTreeMap<String, Vec<PathBuf>>,
}

impl FileIndex {
    pub fn build(root: &Path, skip_dir: &str) -> Self {
        let mut by_name: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || entry.file_name() != skip_dir);

        for entry in walker.filter_map(|entry| entry.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.contains('.') {
                continue;
            }
            by_name.entry(name).or_default().push(entry.into_path());
        }
        Self { by_name }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    pub fn paths(&self, name: &str) -> &[PathBuf] {
        self.by_name.get(name).map_or(&[], Vec::as_slice)
    }

    pub fn file_count(&self) -> usize {
        self.by_name.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
