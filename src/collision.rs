//! What to do when a destination is already taken.
//!
//! While organising by product, an equivalent file already in the destination
//! is superseded: it moves into the `Old Images` quarantine under a
//! `_replaced_<timestamp>` name. While bucketing raw drops, where no copy is
//! known to be authoritative, every equivalent file is kept and numbered
//! `_v1`, `_v2`, … by modification time instead.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info, warn};

use crate::fsops::{file_name_string, move_file, unique_destination};
use crate::normalize::{EquivalenceKeys, normalize, split_name, strip_version};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Nothing in the way.
    Vacant,
    /// An equivalently named file is present and gets superseded.
    ReplaceVariant(PathBuf),
    /// The literal destination path is taken.
    ReplaceOccupant(PathBuf),
}

/// First regular file in `dir` (in name order) equivalent to `file_name`.
///
/// `ignore` is never reported, so a file already sitting in `dir` does not
/// match itself.
pub fn find_existing_variant(
    dir: &Path,
    file_name: &str,
    ignore: Option<&Path>,
) -> io::Result<Option<PathBuf>> {
    if !dir.is_dir() {
        return Ok(None);
    }
    let incoming = EquivalenceKeys::of(file_name);
    debug!(
        "Looking for matches of '{file_name}' (standard '{}', alpha-numeric '{}')",
        incoming.standard, incoming.alpha_numeric
    );

    let mut candidates: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
        .map(|entry| entry.path())
        .filter(|path| Some(path.as_path()) != ignore)
        .collect();
    candidates.sort();

    Ok(candidates.into_iter().find(|path| {
        let existing = EquivalenceKeys::of(&file_name_string(path));
        incoming.matches(&existing)
    }))
}

/// Decide how an incoming file named `file_name` enters `dir`.
pub fn decide(dir: &Path, file_name: &str, incoming: &Path) -> io::Result<Disposition> {
    if let Some(existing) = find_existing_variant(dir, file_name, Some(incoming))? {
        return Ok(Disposition::ReplaceVariant(existing));
    }
    let dest = dir.join(file_name);
    if dest.exists() && dest != incoming {
        return Ok(Disposition::ReplaceOccupant(dest));
    }
    Ok(Disposition::Vacant)
}

/// `photo.jpg` replaced at 2024-03-01 14:05:09 becomes `photo_replaced_20240301_140509.jpg`.
pub fn replaced_name(file_name: &str, timestamp: &str) -> String {
    let (stem, ext) = split_name(file_name);
    format!("{stem}_replaced_{timestamp}{ext}")
}

pub fn replacement_timestamp() -> String {
    jiff::Zoned::now().strftime("%Y%m%d_%H%M%S").to_string()
}

/// Move `existing` into `quarantine_dir` under its `_replaced_` name, with a
/// `_N` counter when an earlier copy already took that name.
pub fn quarantine(existing: &Path, quarantine_dir: &Path, timestamp: &str) -> io::Result<PathBuf> {
    let dest = unique_destination(
        &quarantine_dir.join(replaced_name(&file_name_string(existing), timestamp)),
    );
    move_file(existing, &dest)?;
    info!(
        "Moved existing file to quarantine: {} -> {}",
        existing.display(),
        dest.display()
    );
    Ok(dest)
}

/// `<stem without _vN>_v<version><ext>` in the same directory.
pub fn versioned_path(path: &Path, version: usize) -> PathBuf {
    let name = file_name_string(path);
    let (stem, ext) = split_name(&name);
    let (base, _old_version) = strip_version(stem);
    path.with_file_name(format!("{base}_v{version}{ext}"))
}

fn modified_time(path: &Path) -> SystemTime {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

/// Files judged to be successive versions of one asset, oldest first.
#[derive(Debug)]
pub struct VersionChain {
    dir: PathBuf,
    incoming: PathBuf,
    members: Vec<(SystemTime, PathBuf)>,
}

impl VersionChain {
    /// Gather everything in `dest`'s directory sharing its normalized key, plus `incoming`.
    pub fn collect(incoming: &Path, dest: &Path) -> io::Result<Self> {
        let dir = dest.parent().unwrap_or_else(|| Path::new("")).to_path_buf();
        let key = normalize(&file_name_string(dest));

        let mut members: Vec<(SystemTime, PathBuf)> = Vec::new();
        if dir.is_dir() {
            for entry in fs::read_dir(&dir)? {
                let entry = entry?;
                if !entry.file_type()?.is_file() {
                    continue;
                }
                let path = entry.path();
                if path != incoming && normalize(&file_name_string(&path)) == key {
                    members.push((modified_time(&path), path));
                }
            }
        }
        members.push((modified_time(incoming), incoming.to_path_buf()));
        members.sort();

        Ok(Self {
            dir,
            incoming: incoming.to_path_buf(),
            members,
        })
    }

    /// Final `_vN` names in chain order, all inside the destination directory.
    pub fn planned_names(&self) -> Vec<PathBuf> {
        self.members
            .iter()
            .enumerate()
            .map(|(idx, (_, path))| {
                let target = versioned_path(path, idx + 1);
                self.dir.join(file_name_string(&target))
            })
            .collect()
    }

    /// Rename every member to its `_vN` name and return where the incoming file ended up.
    ///
    /// Members go through temporary names first so no rename lands on a member
    /// that has not moved yet. On failure every member is moved back to its
    /// original path before the error is returned.
    pub fn apply(self) -> io::Result<PathBuf> {
        let targets = self.planned_names();
        let mut staged = Vec::with_capacity(self.members.len());
        for (idx, (_, path)) in self.members.iter().enumerate() {
            let temp = self.dir.join(format!(".versioning-{idx}-{}", file_name_string(path)));
            if let Err(e) = move_file(path, &temp) {
                self.roll_back(&staged, 0);
                return Err(e);
            }
            staged.push(temp);
        }

        let mut incoming_dest = None;
        for (idx, (temp, target)) in staged.iter().zip(&targets).enumerate() {
            if let Err(e) = move_file(temp, target) {
                self.roll_back(&targets[..idx], 0);
                self.roll_back(&staged[idx..], idx);
                return Err(e);
            }
            let original = &self.members[idx].1;
            info!(
                "  Versioned: {} -> {}",
                file_name_string(original),
                file_name_string(target)
            );
            if *original == self.incoming {
                incoming_dest = Some(target.clone());
            }
        }

        incoming_dest.ok_or_else(|| io::Error::other("incoming file missing from version chain"))
    }

    /// Move `current[i]` back to the original path of member `first + i`.
    fn roll_back(&self, current: &[PathBuf], first: usize) {
        for (offset, path) in current.iter().enumerate() {
            let original = &self.members[first + offset].1;
            if let Err(e) = move_file(path, original) {
                warn!(
                    "Could not restore {} to {}: {e}",
                    path.display(),
                    original.display()
                );
            }
        }
    }
}

/// Move `source` to `dest`, numbering every equivalent file by age when `dest` is taken.
pub fn place_versioned(source: &Path, dest: &Path) -> io::Result<PathBuf> {
    if !dest.exists() {
        move_file(source, dest)?;
        return Ok(dest.to_path_buf());
    }
    info!("  Conflict detected: {}", file_name_string(source));
    VersionChain::collect(source, dest)?.apply()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::Duration;
    use tempfile::TempDir;

    fn write_with_mtime(path: &Path, content: &[u8], secs: u64) {
        fs::write(path, content).unwrap();
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
    }

    #[test]
    fn finds_variant_with_different_separators() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("widget-a.jpg"), b"old").unwrap();

        let found = find_existing_variant(dir.path(), "Widget_A.jpg", None).unwrap();
        assert_eq!(found, Some(dir.path().join("widget-a.jpg")));
    }

    #[test]
    fn finds_variant_across_letter_and_number() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Widget-1.webp"), b"old").unwrap();

        let found = find_existing_variant(dir.path(), "Widget-A.webp", None).unwrap();
        assert_eq!(found, Some(dir.path().join("Widget-1.webp")));
        assert_eq!(
            find_existing_variant(dir.path(), "Widget-B.webp", None).unwrap(),
            None
        );
    }

    #[test]
    fn missing_directory_has_no_variants() {
        let dir = TempDir::new().unwrap();
        let found = find_existing_variant(&dir.path().join("nope"), "a.jpg", None).unwrap();
        assert_eq!(found, None);
    }

    #[test]
    fn decide_ignores_the_incoming_file() {
        let dir = TempDir::new().unwrap();
        let incoming = dir.path().join("Widget-A.jpg");
        fs::write(&incoming, b"new").unwrap();

        assert_eq!(
            decide(dir.path(), "Widget-A.jpg", &incoming).unwrap(),
            Disposition::Vacant
        );
    }

    #[test]
    fn quarantine_renames_with_timestamp() {
        let dir = TempDir::new().unwrap();
        let existing = dir.path().join("widget-a.jpg");
        fs::write(&existing, b"old").unwrap();
        let quarantine_dir = dir.path().join("Old Images/JPEG");

        let moved = quarantine(&existing, &quarantine_dir, "20240301_140509").unwrap();

        assert_eq!(moved, quarantine_dir.join("widget-a_replaced_20240301_140509.jpg"));
        assert!(!existing.exists());
        assert_eq!(fs::read(moved).unwrap(), b"old");
    }

    #[test]
    fn repeated_quarantine_keeps_every_copy() {
        let dir = TempDir::new().unwrap();
        let quarantine_dir = dir.path().join("Old Images/JPEG");
        let first = dir.path().join("a/Widget-A.jpg");
        let second = dir.path().join("b/Widget-A.jpg");
        fs::create_dir_all(first.parent().unwrap()).unwrap();
        fs::create_dir_all(second.parent().unwrap()).unwrap();
        fs::write(&first, b"orig").unwrap();
        fs::write(&second, b"one").unwrap();

        let a = quarantine(&first, &quarantine_dir, "20240301_140509").unwrap();
        let b = quarantine(&second, &quarantine_dir, "20240301_140509").unwrap();

        assert_eq!(a, quarantine_dir.join("Widget-A_replaced_20240301_140509.jpg"));
        assert_eq!(b, quarantine_dir.join("Widget-A_replaced_20240301_140509_1.jpg"));
        assert_eq!(fs::read(a).unwrap(), b"orig");
        assert_eq!(fs::read(b).unwrap(), b"one");
    }

    #[test]
    fn replacement_timestamp_shape() {
        let stamp = replacement_timestamp();
        assert_eq!(stamp.len(), 15);
        assert_eq!(stamp.as_bytes()[8], b'_');
    }

    #[test]
    fn version_chain_orders_by_modification_time() {
        let drop = TempDir::new().unwrap();
        let dest_dir = TempDir::new().unwrap();

        // Name order deliberately disagrees with age order.
        write_with_mtime(&dest_dir.path().join("Widget-A.webp"), b"newest", 3_000);
        write_with_mtime(&dest_dir.path().join("widget_a.webp"), b"oldest", 1_000);
        let incoming = drop.path().join("Widget A.webp");
        write_with_mtime(&incoming, b"middle", 2_000);

        let final_path = place_versioned(&incoming, &dest_dir.path().join("Widget-A.webp")).unwrap();

        assert_eq!(final_path, dest_dir.path().join("Widget A_v2.webp"));
        assert_eq!(fs::read(dest_dir.path().join("widget_a_v1.webp")).unwrap(), b"oldest");
        assert_eq!(fs::read(dest_dir.path().join("Widget A_v2.webp")).unwrap(), b"middle");
        assert_eq!(fs::read(dest_dir.path().join("Widget-A_v3.webp")).unwrap(), b"newest");
        assert!(!incoming.exists());
    }

    #[test]
    fn version_chain_does_not_overwrite_existing_versions() {
        let dir = TempDir::new().unwrap();
        write_with_mtime(&dir.path().join("Shot.jpg"), b"first", 100);
        write_with_mtime(&dir.path().join("Shot_v1.jpg"), b"second", 200);
        let drop = TempDir::new().unwrap();
        let incoming = drop.path().join("Shot.jpg");
        write_with_mtime(&incoming, b"third", 300);

        let chain = VersionChain::collect(&incoming, &dir.path().join("Shot.jpg")).unwrap();
        assert_eq!(chain.planned_names().len(), 3);
        chain.apply().unwrap();

        assert_eq!(fs::read(dir.path().join("Shot_v1.jpg")).unwrap(), b"first");
        assert_eq!(fs::read(dir.path().join("Shot_v2.jpg")).unwrap(), b"second");
        assert_eq!(fs::read(dir.path().join("Shot_v3.jpg")).unwrap(), b"third");
        assert!(!dir.path().join("Shot.jpg").exists());
    }

    #[test]
    fn failed_version_chain_restores_members() {
        let dir = TempDir::new().unwrap();
        write_with_mtime(&dir.path().join("Shot.jpg"), b"first", 100);
        // A directory squatting on the second version name makes that rename fail.
        fs::create_dir_all(dir.path().join("Shot_v2.jpg/inner")).unwrap();
        let drop = TempDir::new().unwrap();
        let incoming = drop.path().join("Shot.jpg");
        write_with_mtime(&incoming, b"second", 200);

        let result = place_versioned(&incoming, &dir.path().join("Shot.jpg"));

        assert!(result.is_err());
        assert_eq!(fs::read(dir.path().join("Shot.jpg")).unwrap(), b"first");
        assert_eq!(fs::read(&incoming).unwrap(), b"second");
        assert!(!dir.path().join("Shot_v1.jpg").exists());
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with(".versioning-"))
            .collect();
        assert!(leftovers.is_empty(), "temporary names left behind: {:?}", leftovers);
    }

    #[test]
    fn place_versioned_into_vacant_destination() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("in.jpg");
        fs::write(&source, b"x").unwrap();
        let dest = dir.path().join("out/in-0.jpg");

        assert_eq!(place_versioned(&source, &dest).unwrap(), dest);
        assert!(dest.exists());
    }
}
