//! Brand, product code and variant extraction from bare filename stems.
//!
//! Contributors name files however they like (`Uniserve-UNIO22-4-A`,
//! `Acme Drill 2.5 Pro`, `ZX81_B`), so parsing is a best-effort cascade of
//! token-shape rules. It never fails: when nothing matches, the first token
//! becomes the brand.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::normalize::{split_name, strip_version};

static DISALLOWED_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s.\-]").expect("valid cleanup regex"));

static TOKEN_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-_\s]+").expect("valid separator regex"));

static DOTTED_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.\d+").expect("valid dotted version regex"));

static LETTERS_THEN_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-zA-Z]+)(\d.*)$").expect("valid brand+model regex"));

static SUFFIX_LETTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-_]([A-Za-z])$").expect("valid suffix regex"));

static SUFFIX_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-_](\d+)$").expect("valid suffix regex"));

static SUFFIX_LETTER_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-_]([A-Za-z]\d+)$").expect("valid suffix regex"));

/// What a filename says about the asset it holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedIdentity {
    pub brand: Option<String>,
    pub product_code: Option<String>,
    pub variant: Option<char>,
}

/// Brand and code tokens chosen by one of the split rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Split {
    pub brand: Vec<String>,
    pub code: Vec<String>,
}

impl Split {
    fn at(tokens: &[String], idx: usize) -> Self {
        Self {
            brand: tokens[..idx].to_vec(),
            code: tokens[idx..].to_vec(),
        }
    }

    fn brand_only(tokens: &[String]) -> Self {
        Self {
            brand: tokens.to_vec(),
            code: Vec::new(),
        }
    }
}

/// One row of the split decision table.
pub struct SplitRule {
    pub name: &'static str,
    pub applies: fn(&[String]) -> bool,
    pub split: fn(&[String]) -> Split,
}

/// Rules tried in order once the variant is gone; the first applicable one wins.
pub const SPLIT_RULES: &[SplitRule] = &[
    SplitRule {
        name: "dotted-version",
        applies: has_dotted_version,
        split: split_at_dotted_version,
    },
    SplitRule {
        name: "single-token",
        applies: is_single,
        split: split_single,
    },
    SplitRule {
        name: "two-tokens",
        applies: is_pair,
        split: split_pair,
    },
    SplitRule {
        name: "many-tokens",
        applies: is_many,
        split: split_many,
    },
];

fn is_single(tokens: &[String]) -> bool {
    tokens.len() == 1
}

fn is_pair(tokens: &[String]) -> bool {
    tokens.len() == 2
}

fn is_many(tokens: &[String]) -> bool {
    tokens.len() >= 3
}

fn is_separator(c: char) -> bool {
    c == '-' || c == '_' || c.is_whitespace()
}

fn is_alphabetic(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_alphabetic())
}

fn has_digit(token: &str) -> bool {
    token.chars().any(|c| c.is_ascii_digit())
}

fn is_digits(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_digit())
}

fn as_variant(token: &str) -> Option<char> {
    let mut chars = token.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphanumeric() => Some(c),
        _ => None,
    }
}

fn has_dotted_version(tokens: &[String]) -> bool {
    tokens.iter().any(|t| DOTTED_VERSION.is_match(t))
}

fn split_at_dotted_version(tokens: &[String]) -> Split {
    let idx = tokens
        .iter()
        .position(|t| DOTTED_VERSION.is_match(t))
        .unwrap_or_default();
    // A version in front still names the brand, the rest is the code.
    Split::at(tokens, idx.max(1).min(tokens.len()))
}

fn split_single(tokens: &[String]) -> Split {
    let token = &tokens[0];
    match LETTERS_THEN_DIGITS.captures(token) {
        Some(caps) => Split {
            brand: vec![caps[1].to_string()],
            code: vec![caps[2].to_string()],
        },
        None => Split::brand_only(tokens),
    }
}

fn split_pair(tokens: &[String]) -> Split {
    let (first, second) = (&tokens[0], &tokens[1]);
    if let Some(caps) = LETTERS_THEN_DIGITS.captures(first) {
        return Split {
            brand: vec![caps[1].to_string()],
            code: vec![caps[2].to_string(), second.clone()],
        };
    }
    if is_alphabetic(first) && has_digit(second) {
        return Split::at(tokens, 1);
    }
    if second.chars().count() >= 2 {
        return Split::at(tokens, 1);
    }
    Split::brand_only(tokens)
}

fn split_many(tokens: &[String]) -> Split {
    if is_alphabetic(&tokens[0]) {
        return Split::at(tokens, 1);
    }
    let code_start = tokens
        .iter()
        .skip(1)
        .position(|t| has_digit(t))
        .map_or(1, |idx| idx + 1);
    Split::at(tokens, code_start)
}

/// `Brand-ALNUM22-4…`: an alphabetic brand followed by an alphanumeric code and a
/// number keeps every remaining token in the code, variant included.
fn brand_with_compound_code(tokens: &[String]) -> Option<ParsedIdentity> {
    let [brand, code_head, code_number, ..] = tokens else {
        return None;
    };
    let head_is_alphanumeric =
        code_head.chars().any(|c| c.is_ascii_alphabetic()) && has_digit(code_head);
    if is_alphabetic(brand) && head_is_alphanumeric && is_digits(code_number) {
        return Some(ParsedIdentity {
            brand: Some(brand.clone()),
            product_code: Some(tokens[1..].join("-")),
            variant: None,
        });
    }
    None
}

/// Rebuild a multi-token code with the separator style of the original name.
fn assemble_code(original: &str, split: &Split, variant: Option<char>) -> String {
    let mut residual = original;
    for part in &split.brand {
        if let Some(rest) = residual.strip_prefix(part.as_str()) {
            residual = rest.trim_start_matches(is_separator);
        }
    }
    if let Some(rest) = variant.and_then(|v| residual.strip_suffix(v)) {
        residual = rest.trim_end_matches(is_separator);
    }
    if residual.contains('_') && !residual.contains('-') {
        split.code.join("_")
    } else {
        split.code.join("-")
    }
}

/// Parse a stem (no extension) into brand, product code and variant.
#[must_use]
pub fn extract(stem: &str) -> ParsedIdentity {
    let (basename, _version) = strip_version(stem);
    let cleaned = DISALLOWED_CHARS.replace_all(basename, "");
    let mut tokens: Vec<String> = TOKEN_SEPARATORS
        .split(&cleaned)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();

    if tokens.is_empty() {
        // Nothing but separators or stripped characters: the raw stem is the brand.
        let raw = basename.trim();
        return ParsedIdentity {
            brand: (!raw.is_empty()).then(|| raw.to_string()),
            ..ParsedIdentity::default()
        };
    }

    if let Some(identity) = brand_with_compound_code(&tokens) {
        debug!("Parsed '{stem}' as compound code: {identity:?}");
        return identity;
    }

    let mut variant = None;
    if tokens.len() > 1 {
        if let Some(last) = tokens.last().and_then(|t| as_variant(t)) {
            variant = Some(last);
            tokens.pop();
        }
    }

    let (rule, split) = SPLIT_RULES
        .iter()
        .find(|rule| (rule.applies)(&tokens))
        .map_or(("none", Split::default()), |rule| {
            (rule.name, (rule.split)(&tokens))
        });

    let brand = Some(split.brand.join(" ").trim().to_string()).filter(|b| !b.is_empty());
    let product_code = match split.code.len() {
        0 => None,
        1 => Some(split.code[0].clone()),
        _ => Some(assemble_code(basename, &split, variant)),
    };

    let mut identity = ParsedIdentity {
        brand,
        product_code,
        variant,
    };

    if identity.brand.is_none() {
        if let Some(code) = identity.product_code.take() {
            if !has_digit(&code) && !code.contains('-') {
                identity.brand = Some(code);
            } else {
                identity.product_code = Some(code);
            }
        }
    }
    if identity.brand.is_none() && identity.product_code.is_none() {
        identity.brand = Some(tokens[0].clone());
    }

    debug!("Parsed '{stem}' with rule {rule}: {identity:?}");
    identity
}

/// Split a file name into its basename and trailing sequence suffix.
///
/// The extension and any `_v<N>` marker are dropped first. A trailing single
/// letter wins over a trailing number, which wins over a letter+digits suffix.
#[must_use]
pub fn split_sequence_suffix(file_name: &str) -> (String, Option<String>) {
    let (stem, _ext) = split_name(file_name);
    let (stem, _version) = strip_version(stem);
    for pattern in [&*SUFFIX_LETTER, &*SUFFIX_DIGITS, &*SUFFIX_LETTER_DIGITS] {
        if let Some(caps) = pattern.captures(stem) {
            let start = caps.get(0).map_or(stem.len(), |m| m.start());
            return (stem[..start].to_string(), Some(caps[1].to_string()));
        }
    }
    (stem.to_string(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| (*p).to_string()).collect()
    }

    fn parsed(brand: Option<&str>, code: Option<&str>, variant: Option<char>) -> ParsedIdentity {
        ParsedIdentity {
            brand: brand.map(str::to_string),
            product_code: code.map(str::to_string),
            variant,
        }
    }

    #[test]
    fn compound_code_keeps_number_with_code() {
        assert_eq!(
            extract("Uniserve-UNIO22-4"),
            parsed(Some("Uniserve"), Some("UNIO22-4"), None)
        );
    }

    #[test]
    fn compound_code_absorbs_trailing_tokens() {
        assert_eq!(
            extract("Uniserve-UNIO22-4-A"),
            parsed(Some("Uniserve"), Some("UNIO22-4-A"), None)
        );
    }

    #[test]
    fn alphabetic_brand_and_digit_code() {
        assert_eq!(extract("Widget-A100"), parsed(Some("Widget"), Some("A100"), None));
        assert_eq!(extract("Widget A100"), parsed(Some("Widget"), Some("A100"), None));
        assert_eq!(extract("Widget_A100"), parsed(Some("Widget"), Some("A100"), None));
    }

    #[test]
    fn trailing_variant_is_popped() {
        assert_eq!(
            extract("Widget-A100-B"),
            parsed(Some("Widget"), Some("A100"), Some('B'))
        );
        assert_eq!(extract("Widget-A"), parsed(Some("Widget"), None, Some('A')));
    }

    #[test]
    fn version_marker_is_ignored() {
        assert_eq!(
            extract("Widget-A100_v3"),
            parsed(Some("Widget"), Some("A100"), None)
        );
    }

    #[test]
    fn single_token_letters_then_digits() {
        assert_eq!(extract("ZX81"), parsed(Some("ZX"), Some("81"), None));
        assert_eq!(extract("Gizmo"), parsed(Some("Gizmo"), None, None));
    }

    #[test]
    fn pair_with_brand_model_prefix() {
        assert_eq!(extract("ZX81 Plus"), parsed(Some("ZX"), Some("81-Plus"), None));
        assert_eq!(extract("ZX81_Plus"), parsed(Some("ZX"), Some("81_Plus"), None));
    }

    #[test]
    fn pair_of_words() {
        assert_eq!(extract("Acme Hammer"), parsed(Some("Acme"), Some("Hammer"), None));
    }

    #[test]
    fn dotted_version_splits_brand_and_code() {
        assert_eq!(
            extract("Acme Drill 2.5 Pro"),
            parsed(Some("Acme Drill"), Some("2.5-Pro"), None)
        );
        assert_eq!(
            extract("2.5-Turbo-Kit"),
            parsed(Some("2.5"), Some("Turbo-Kit"), None)
        );
    }

    #[test]
    fn many_tokens_with_alphabetic_brand() {
        assert_eq!(
            extract("Acme-Big-Hammer"),
            parsed(Some("Acme"), Some("Big-Hammer"), None)
        );
        assert_eq!(
            extract("Acme_Big_Hammer"),
            parsed(Some("Acme"), Some("Big_Hammer"), None)
        );
    }

    #[test]
    fn many_tokens_split_at_first_digit_token() {
        assert_eq!(
            extract("3M Super Tape 77"),
            parsed(Some("3M Super Tape"), Some("77"), None)
        );
    }

    #[test]
    fn punctuation_is_stripped() {
        assert_eq!(
            extract("Widget!-A100 (copy)"),
            parsed(Some("Widget"), Some("A100-copy"), None)
        );
    }

    #[test]
    fn empty_stem_yields_nothing() {
        assert_eq!(extract(""), ParsedIdentity::default());
        assert_eq!(extract("   "), ParsedIdentity::default());
    }

    #[test]
    fn separator_only_stem_becomes_brand() {
        assert_eq!(extract("--__"), parsed(Some("--__"), None, None));
        assert_eq!(extract("!!!"), parsed(Some("!!!"), None, None));
    }

    #[test]
    fn rule_table_order() {
        let names: Vec<_> = SPLIT_RULES.iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            ["dotted-version", "single-token", "two-tokens", "many-tokens"]
        );
    }

    #[test]
    fn dotted_version_rule_in_isolation() {
        let t = tokens(&["Acme", "v1.2", "Kit"]);
        assert!(has_dotted_version(&t));
        assert_eq!(
            split_at_dotted_version(&t),
            Split {
                brand: tokens(&["Acme"]),
                code: tokens(&["v1.2", "Kit"]),
            }
        );
    }

    #[test]
    fn pair_rule_short_second_token_joins_brand() {
        let t = tokens(&["1st", "X"]);
        assert_eq!(split_pair(&t), Split::brand_only(&t));
    }

    #[test]
    fn many_rule_defaults_to_index_one() {
        let t = tokens(&["1st", "Choice", "Deluxe"]);
        assert_eq!(split_many(&t), Split::at(&t, 1));
    }

    #[test]
    fn sequence_suffix_letter() {
        assert_eq!(
            split_sequence_suffix("Uniserve-UNIO22-4-A.webp"),
            ("Uniserve-UNIO22-4".to_string(), Some("A".to_string()))
        );
    }

    #[test]
    fn sequence_suffix_digits() {
        assert_eq!(
            split_sequence_suffix("Uniserve-UNIO22-4-10.jpg"),
            ("Uniserve-UNIO22-4".to_string(), Some("10".to_string()))
        );
        assert_eq!(
            split_sequence_suffix("Uniserve-UNIO22-4.jpg"),
            ("Uniserve-UNIO22".to_string(), Some("4".to_string()))
        );
    }

    #[test]
    fn sequence_suffix_letter_digits_and_none() {
        assert_eq!(
            split_sequence_suffix("Widget_B2_v1.png"),
            ("Widget".to_string(), Some("B2".to_string()))
        );
        assert_eq!(split_sequence_suffix("Widget.png"), ("Widget".to_string(), None));
    }
}
