use crate::regex::Regex;
use std::sync::LazyLock;

#[cfg_attr(not(feature = "bibtex"), allow(dead_code))]
static WHITESPACE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Splits a comma-separated dimension cell into its labels.
///
/// Each token is trimmed of surrounding whitespace and stripped of literal
/// double quotes; empty tokens are dropped.
///
/// # Arguments
///
/// * `cell` - The raw dimension cell
pub fn split_dimension_values(cell: &str) -> Vec<String> {
    cell.split(',')
        .map(|token| token.trim().replace('"', ""))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Escapes the characters that break a LaTeX table cell.
pub fn escape_latex(text: &str) -> String {
    text.replace('&', "\\&").replace('%', "\\%")
}

/// Collapses every run of whitespace into one space and trims the ends.
#[cfg_attr(not(feature = "bibtex"), allow(dead_code))]
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_REGEX.replace_all(text.trim(), " ").into_owned()
}

/// Compares two cell values, numerically when both parse as integers.
pub fn compare_cell_values(a: &str, b: &str) -> std::cmp::Ordering {
    match (a.trim().parse::<i64>(), b.trim().parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}
