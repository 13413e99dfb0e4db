//! Acronym assignment for compact summary tables.
//!
//! Long dimension values are replaced by short tokens built from their words:
//!
//! - `N/A` (quoted or not) becomes `-`
//! - a word of at most two characters, or one already in upper case, is kept whole (upper-cased)
//! - any other word contributes its upper-cased first letter
//!
//! Hyphens separate words, so `"Model-Driven Engineering"` becomes `MDE`.
//!
//! Tokens are memoized per dimension for the lifetime of an [`AcronymTable`]. When
//! a new value's token is already taken by another value of the same dimension,
//! the lower-cased second character of the new value is appended once. The
//! result is not checked again, so three or more values competing for one token
//! can still collide.

use compact_str::{CompactString, ToCompactString};
use serde::Serialize;
use std::collections::HashMap;

/// Token used for values marked as not applicable.
pub const NOT_APPLICABLE_TOKEN: &str = "-";

/// Acronyms assigned within one dimension, in assignment order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DimensionAcronyms {
    assigned: Vec<(String, CompactString)>,
    #[serde(skip)]
    by_value: HashMap<String, usize>,
}

impl DimensionAcronyms {
    pub fn get(&self, value: &str) -> Option<&str> {
        self.by_value
            .get(value)
            .map(|&position| self.assigned[position].1.as_str())
    }

    /// `(value, token)` pairs in assignment order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.assigned
            .iter()
            .map(|(value, token)| (value.as_str(), token.as_str()))
    }

    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }

    fn is_taken(&self, token: &str) -> bool {
        self.assigned.iter().any(|(_, assigned)| assigned.as_str() == token)
    }

    fn assign(&mut self, value: &str) -> CompactString {
        if let Some(token) = self.get(value) {
            return token.to_compact_string();
        }

        let mut token = value_acronym(value);
        if self.is_taken(&token) {
            if let Some(second) = value.chars().nth(1) {
                token.extend(second.to_lowercase());
            }
        }

        self.by_value.insert(value.to_string(), self.assigned.len());
        self.assigned.push((value.to_string(), token.clone()));
        token
    }
}

/// Session-scoped acronym assignments, keyed by dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AcronymTable {
    dimensions: Vec<(String, DimensionAcronyms)>,
}

impl AcronymTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the token for `value` within `dimension`, assigning one on first use.
    ///
    /// # Examples
    ///
    /// ```
    /// use slrlib::AcronymTable;
    ///
    /// let mut table = AcronymTable::new();
    /// assert_eq!(table.acronym("Method", "Machine Learning"), "ML");
    /// assert_eq!(table.acronym("Method", "Model Learning"), "MLo");
    /// assert_eq!(table.acronym("Method", "Machine Learning"), "ML");
    /// ```
    pub fn acronym(&mut self, dimension: &str, value: &str) -> CompactString {
        let position = match self.dimensions.iter().position(|(d, _)| d == dimension) {
            Some(position) => position,
            None => {
                self.dimensions
                    .push((dimension.to_string(), DimensionAcronyms::default()));
                self.dimensions.len() - 1
            }
        };
        self.dimensions[position].1.assign(value)
    }

    /// Looks up an already assigned token without assigning.
    pub fn get(&self, dimension: &str, value: &str) -> Option<&str> {
        self.dimension(dimension)?.get(value)
    }

    pub fn dimension(&self, dimension: &str) -> Option<&DimensionAcronyms> {
        self.dimensions
            .iter()
            .find(|(d, _)| d == dimension)
            .map(|(_, acronyms)| acronyms)
    }

    /// Dimensions in order of first use.
    pub fn dimensions(&self) -> impl Iterator<Item = (&str, &DimensionAcronyms)> {
        self.dimensions
            .iter()
            .map(|(dimension, acronyms)| (dimension.as_str(), acronyms))
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.iter().all(|(_, acronyms)| acronyms.is_empty())
    }
}

/// Token for a whole value, before collision handling.
pub fn value_acronym(value: &str) -> CompactString {
    let spaced = value.replace('-', " ");
    let words: Vec<&str> = spaced.split_whitespace().collect();
    if words.is_empty() {
        return CompactString::const_new(NOT_APPLICABLE_TOKEN);
    }

    let mut token = CompactString::default();
    for word in words {
        token.push_str(&word_acronym(word));
    }
    token
}

/// Token for a single word.
pub fn word_acronym(word: &str) -> CompactString {
    if word == "N/A" || word == "\"N/A\"" {
        return CompactString::const_new(NOT_APPLICABLE_TOKEN);
    }

    let upper = word.to_uppercase();
    if word.chars().count() <= 2 || is_upper(word) {
        upper.to_compact_string()
    } else {
        upper.chars().take(1).collect()
    }
}

/// True when the word has a cased character and none of them is lower case.
fn is_upper(word: &str) -> bool {
    word.chars().any(char::is_uppercase) && !word.chars().any(char::is_lowercase)
}
