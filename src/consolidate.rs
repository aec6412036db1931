//! Product-code consolidation within one brand.
//!
//! Files of the same product are often parsed at different granularities
//! (`UNIO22`, `UNIO22-4`, `UNIO22-10`). Codes sharing a leading alphanumeric run
//! collapse onto the most specific one so they land in one folder.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::info;

use crate::extract::{extract, split_sequence_suffix};

/// Leading ASCII alphanumeric run of a code, if it has one.
fn code_base(code: &str) -> Option<&str> {
    let end = code
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(code.len());
    (end > 0).then(|| &code[..end])
}

/// Map every code to its representative: the longest code of its group, the
/// lexicographically later one on a tie.
#[must_use]
pub fn consolidate(codes: &BTreeSet<String>) -> BTreeMap<String, String> {
    let mut groups: BTreeMap<&str, Vec<&String>> = BTreeMap::new();
    let mut mapping = BTreeMap::new();

    for code in codes {
        match code_base(code) {
            Some(base) => groups.entry(base).or_default().push(code),
            None => {
                mapping.insert(code.clone(), code.clone());
            }
        }
    }

    for members in groups.values() {
        let Some(representative) = members
            .iter()
            .max_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
        else {
            continue;
        };
        if members.len() > 1 {
            info!("Consolidating codes {members:?} -> '{representative}'");
        }
        for code in members {
            mapping.insert((*code).clone(), (*representative).clone());
        }
    }

    mapping
}

/// Product code of a single file name, read from its basename without the
/// trailing sequence suffix.
#[must_use]
pub fn product_code_of(file_name: &str) -> Option<String> {
    let (basename, _suffix) = split_sequence_suffix(file_name);
    extract(&basename).product_code
}

/// Resolve the final product code of each file of one brand.
///
/// Files without any product code are absent from the result.
#[must_use]
pub fn assign_product_codes<S: AsRef<str>>(file_names: &[S]) -> HashMap<String, String> {
    let raw: Vec<(&str, String)> = file_names
        .iter()
        .filter_map(|name| {
            let name = name.as_ref();
            product_code_of(name).map(|code| (name, code))
        })
        .collect();

    let codes: BTreeSet<String> = raw.iter().map(|(_, code)| code.clone()).collect();
    let mapping = consolidate(&codes);

    raw.into_iter()
        .map(|(name, code)| {
            let resolved = mapping.get(&code).cloned().unwrap_or(code);
            (name.to_string(), resolved)
        })
        .collect()
}
