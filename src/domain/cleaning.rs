//! Field cleaning for loosely formatted export values
//!
//! All functions are total: unparsable input yields `None` (or an empty
//! string) so a bad optional field degrades to omission.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static NON_TAG_CHAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\-]").expect("valid regex"));
static NON_SLUG_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));

/// Non-breaking and narrow non-breaking spaces become plain spaces
fn plain_spaces(value: &str) -> String {
    value.replace(['\u{00a0}', '\u{202f}'], " ")
}

fn parse_finite(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Collapse whitespace runs to one space and trim
pub fn normalize_whitespace(value: &str) -> String {
    WHITESPACE_RUN.replace_all(value, " ").trim().to_string()
}

/// `" 1 234,5 "` -> `"1234.50"`
pub fn clean_decimal(value: &str) -> Option<String> {
    let normalized = plain_spaces(value);
    let normalized = normalized.trim();
    if normalized.is_empty() {
        return None;
    }

    let compact: String = normalized
        .chars()
        .filter(|c| *c != ' ')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    parse_finite(&compact).map(|v| format!("{:.2}", v))
}

/// Weight in grams as a float, comma decimal separator tolerated
pub fn clean_weight_grams(value: &str) -> Option<f64> {
    let cleaned = plain_spaces(value).trim().replace(',', ".");
    if cleaned.is_empty() {
        return None;
    }
    parse_finite(&cleaned)
}

/// Integer tolerant of float-like input: `"12,0"` -> `12` (truncates)
pub fn clean_int(value: &str) -> Option<i64> {
    let cleaned = plain_spaces(value);
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }
    parse_finite(&cleaned.replace(',', ".")).map(|v| v.trunc() as i64)
}

/// Strip surrounding whitespace and a leading `#` marker
pub fn sanitize_identifier(value: &str) -> String {
    value.trim().trim_start_matches('#').trim().to_string()
}

/// Whitespace runs and non-word characters become underscores
pub fn sanitize_tag_value(value: &str) -> String {
    let collapsed = WHITESPACE_RUN.replace_all(value.trim(), "_");
    NON_TAG_CHAR.replace_all(&collapsed, "_").into_owned()
}

/// URL-safe handle: ASCII-folded, lower-case, hyphen-separated.
///
/// Idempotent: `slugify(&slugify(x)) == slugify(x)`.
pub fn slugify(value: &str) -> String {
    let ascii: String = value.nfkd().filter(char::is_ascii).collect();
    let lower = ascii.to_lowercase();
    NON_SLUG_RUN
        .replace_all(&lower, "-")
        .trim_matches('-')
        .to_string()
}

/// Split a `;`-separated list, dropping blank entries
pub fn split_to_list(value: &str) -> Vec<String> {
    value
        .split(';')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_decimal() {
        assert_eq!(clean_decimal(" 12,50 "), Some("12.50".to_string()));
        assert_eq!(clean_decimal("19,9"), Some("19.90".to_string()));
        assert_eq!(clean_decimal("1\u{a0}234,5"), Some("1234.50".to_string()));
        assert_eq!(clean_decimal("1\u{202f}000"), Some("1000.00".to_string()));
        assert_eq!(clean_decimal("7"), Some("7.00".to_string()));
        assert_eq!(clean_decimal("abc"), None);
        assert_eq!(clean_decimal(""), None);
        assert_eq!(clean_decimal("\u{a0} "), None);
        assert_eq!(clean_decimal("inf"), None);
    }

    #[test]
    fn test_clean_int() {
        assert_eq!(clean_int("12,0"), Some(12));
        assert_eq!(clean_int(" 7 "), Some(7));
        assert_eq!(clean_int("3.9"), Some(3));
        assert_eq!(clean_int("-2,5"), Some(-2));
        assert_eq!(clean_int("n/a"), None);
        assert_eq!(clean_int(""), None);
    }

    #[test]
    fn test_clean_weight_grams() {
        assert_eq!(clean_weight_grams("250,5"), Some(250.5));
        assert_eq!(clean_weight_grams(" 80 "), Some(80.0));
        assert_eq!(clean_weight_grams("lourd"), None);
    }

    #[test]
    fn test_sanitize_identifier() {
        assert_eq!(sanitize_identifier("  #123 "), "123");
        assert_eq!(sanitize_identifier("# 45"), "45");
        assert_eq!(sanitize_identifier(""), "");
    }

    #[test]
    fn test_sanitize_tag_value() {
        assert_eq!(sanitize_tag_value(" Linge  de maison "), "Linge_de_maison");
        assert_eq!(sanitize_tag_value("Déco & Cadeaux"), "Déco___Cadeaux");
        assert_eq!(sanitize_tag_value("bébé-enfant"), "bébé-enfant");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Écharpe Brodée!"), "echarpe-brodee");
        assert_eq!(slugify("  --Nappe  100% lin-- "), "nappe-100-lin");
        assert_eq!(slugify("日本"), "");
    }

    #[test]
    fn test_slugify_idempotent() {
        for input in ["Écharpe Brodée!", "a--b", "Ça & là", "-x-", "ÆØÅ œuvre"] {
            let once = slugify(input);
            assert_eq!(slugify(&once), once, "input {:?}", input);
            assert!(once.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        }
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  Nappe \t brodée\n main "), "Nappe brodée main");
    }

    #[test]
    fn test_split_to_list() {
        assert_eq!(split_to_list("lin; coton ;;  "), vec!["lin", "coton"]);
        assert!(split_to_list("").is_empty());
    }
}
