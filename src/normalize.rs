//! Filename equivalence keys.
//!
//! Two spellings of one asset (`Widget-A.jpg`, `widget_a.JPG`, `Widget A_v3.jpg`)
//! collapse to the same key. The alpha-numeric key additionally treats a
//! trailing `-A` as `-1`, `-B` as `-2` and so on.

use std::sync::LazyLock;

use regex::Regex;

static VERSION_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_v\d+$").expect("valid version regex"));

static TRAILING_LETTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-_\s]([A-Za-z])$").expect("valid letter regex"));

/// Split a bare file name into stem and extension, the extension keeping its dot.
///
/// Leading dots never start an extension, so `.hidden` has none.
#[must_use]
pub fn split_name(name: &str) -> (&str, &str) {
    let leading_dots = name.len() - name.trim_start_matches('.').len();
    match name[leading_dots..].rfind('.') {
        Some(idx) => name.split_at(leading_dots + idx),
        None => (name, ""),
    }
}

/// Strip a trailing `_v<digits>` marker, returning the remaining stem and the marker.
#[must_use]
pub fn strip_version(stem: &str) -> (&str, &str) {
    match VERSION_SUFFIX.find(stem) {
        Some(found) => (&stem[..found.start()], found.as_str()),
        None => (stem, ""),
    }
}

fn is_separator(c: char) -> bool {
    c == '-' || c == '_' || c.is_whitespace()
}

/// Standard equivalence key: separators removed, version marker dropped, lowercased.
#[must_use]
pub fn normalize(name: &str) -> String {
    let (stem, ext) = split_name(name);
    let (stem, _version) = strip_version(stem);
    let mut key: String = stem.chars().filter(|c| !is_separator(*c)).collect();
    key = key.to_lowercase();
    key.push_str(&ext.to_lowercase());
    key
}

/// Rewrite a trailing separator-preceded letter to its alphabet position (A=1 … Z=26).
///
/// The version marker and extension are kept as they were.
#[must_use]
pub fn alpha_to_numeric(name: &str) -> String {
    let (stem, ext) = split_name(name);
    let (base, version) = strip_version(stem);
    let Some(caps) = TRAILING_LETTER.captures(base) else {
        return name.to_string();
    };
    let letter = caps[1].chars().next().unwrap_or('A').to_ascii_uppercase();
    let position = u32::from(letter) - u32::from('A') + 1;
    let cut = base.len() - 1;
    format!("{}{position}{version}{ext}", &base[..cut])
}

#[must_use]
pub fn normalize_with_alpha_numeric(name: &str) -> String {
    normalize(&alpha_to_numeric(name))
}

/// Both keys of one name, computed once for repeated comparisons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquivalenceKeys {
    pub standard: String,
    pub alpha_numeric: String,
}

impl EquivalenceKeys {
    #[must_use]
    pub fn of(name: &str) -> Self {
        Self {
            standard: normalize(name),
            alpha_numeric: normalize_with_alpha_numeric(name),
        }
    }

    /// Any of the four standard/alpha-numeric cross comparisons matching.
    ///
    /// A product whose name really ends in `-1` matches a different product ending
    /// in `-A`. That loss of precision is accepted to catch contributors switching
    /// between lettered and numbered variants.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        self.standard == other.standard
            || self.alpha_numeric == other.alpha_numeric
            || self.standard == other.alpha_numeric
            || self.alpha_numeric == other.standard
    }
}

/// Whether two file names denote the same logical asset.
#[must_use]
pub fn equivalent(a: &str, b: &str) -> bool {
    EquivalenceKeys::of(a).matches(&EquivalenceKeys::of(b))
}

/// Lowercase folder name with spaces, hyphens and underscores removed.
#[must_use]
pub fn fold_separators(name: &str) -> String {
    name.to_lowercase().replace([' ', '-', '_'], "")
}
