//! Dimension aggregation.
//!
//! Dimension cells hold free text with comma-separated labels. Counting is a
//! multi-label tally: a study labelled `"Cloud, Edge"` adds one to `Cloud` and
//! one to `Edge`.
//!
//! ## Ordering
//!
//! - `Year` tables are ordered ascending by value.
//! - Every other table is ordered by descending frequency.
//! - Horizontal bar charts use ascending frequency instead.
//!
//! Frequency sorts are stable, so equal counts keep the order in which their
//! values were first encountered.
//!
//! ```rust
//! use slrlib::dimension::count_dimension;
//! use slrlib::{BibliographicEntry, Person, Registry, StudyId};
//!
//! let entries: Vec<_> = ["First", "Second"]
//!     .iter()
//!     .map(|title| BibliographicEntry {
//!         key: title.to_lowercase(),
//!         entry_type: "article".to_string(),
//!         title: Some(title.to_string()),
//!         year: Some("2021".to_string()),
//!         authors: vec![Person::new(["Doe"], "Doe, Jane")],
//!         ..Default::default()
//!     })
//!     .collect();
//! let (mut registry, _) = Registry::new().reconcile(&entries);
//! registry.set_dimension(StudyId::new(1), "Platform", "Cloud, Edge").unwrap();
//! registry.set_dimension(StudyId::new(2), "Platform", "Cloud").unwrap();
//!
//! let table = count_dimension(&registry, "Platform").unwrap();
//! assert_eq!(table.get("Cloud"), Some(2));
//! assert_eq!(table.get("Edge"), Some(1));
//! ```

use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::registry::{Registry, StudyId};
use crate::utils::{compare_cell_values, split_dimension_values};
use crate::{Result, SlrError};

/// The dimension whose tables are ordered by value rather than frequency.
pub const TEMPORAL_DIMENSION: &str = "Year";

/// Presentation order of a [`CountTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableOrder {
    /// Order of first appearance
    Insertion,
    /// Ascending by value, numerically when values are integers
    AscendingValue,
    DescendingFrequency,
    AscendingFrequency,
}

impl TableOrder {
    /// The default order for a dimension.
    pub fn for_dimension(dimension: &str) -> Self {
        if dimension == TEMPORAL_DIMENSION {
            TableOrder::AscendingValue
        } else {
            TableOrder::DescendingFrequency
        }
    }
}

/// Ordered frequency table: dimension value to count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CountTable {
    entries: Vec<(String, usize)>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl CountTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `count` to a value, appending the value if it is new.
    pub fn add(&mut self, value: &str, count: usize) {
        match self.index.get(value) {
            Some(&position) => self.entries[position].1 += count,
            None => {
                self.index.insert(value.to_string(), self.entries.len());
                self.entries.push((value.to_string(), count));
            }
        }
    }

    pub fn increment(&mut self, value: &str) {
        self.add(value, 1);
    }

    pub fn get(&self, value: &str) -> Option<usize> {
        self.index.get(value).map(|&position| self.entries[position].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(value, count)| (value.as_str(), *count))
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(value, _)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all counts.
    pub fn total(&self) -> usize {
        self.entries.iter().map(|(_, count)| count).sum()
    }

    /// Returns a copy of the table in the requested order.
    #[must_use]
    pub fn ordered(&self, order: TableOrder) -> Self {
        let mut entries = self.entries.clone();
        match order {
            TableOrder::Insertion => {}
            TableOrder::AscendingValue => entries.sort_by(|a, b| compare_cell_values(&a.0, &b.0)),
            TableOrder::DescendingFrequency => entries.sort_by(|a, b| b.1.cmp(&a.1)),
            TableOrder::AscendingFrequency => entries.sort_by(|a, b| a.1.cmp(&b.1)),
        }
        Self::from_entries(entries)
    }

    fn from_entries(entries: Vec<(String, usize)>) -> Self {
        let index = entries
            .iter()
            .enumerate()
            .map(|(position, (value, _))| (value.clone(), position))
            .collect();
        Self { entries, index }
    }
}

impl<'a> FromIterator<(&'a str, usize)> for CountTable {
    fn from_iter<I: IntoIterator<Item = (&'a str, usize)>>(iter: I) -> Self {
        let mut table = CountTable::new();
        for (value, count) in iter {
            table.add(value, count);
        }
        table
    }
}

/// Dense two-level frequency matrix: primary value to secondary value to count.
///
/// Every primary row holds a count for every secondary value, zero when the
/// pair was never observed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StackedCountTable {
    secondary_values: Vec<String>,
    rows: Vec<(String, Vec<usize>)>,
}

impl StackedCountTable {
    /// Secondary values, in order of first appearance.
    pub fn secondary_values(&self) -> &[String] {
        &self.secondary_values
    }

    pub fn primary_values(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|(value, _)| value.as_str())
    }

    /// Rows as `(primary value, counts aligned with secondary_values())`.
    pub fn rows(&self) -> impl Iterator<Item = (&str, &[usize])> {
        self.rows
            .iter()
            .map(|(value, counts)| (value.as_str(), counts.as_slice()))
    }

    pub fn get(&self, primary: &str, secondary: &str) -> Option<usize> {
        let column = self.secondary_values.iter().position(|v| v == secondary)?;
        self.rows
            .iter()
            .find(|(value, _)| value == primary)
            .map(|(_, counts)| counts[column])
    }

    /// One primary row as a [`CountTable`] over the secondary values.
    pub fn row(&self, primary: &str) -> Option<CountTable> {
        self.rows
            .iter()
            .find(|(value, _)| value == primary)
            .map(|(_, counts)| {
                self.secondary_values
                    .iter()
                    .map(String::as_str)
                    .zip(counts.iter().copied())
                    .collect()
            })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Counts the labels of one dimension across all studies.
///
/// # Errors
///
/// Returns `DimensionNotFound` if the articles table has no such column.
pub fn count_dimension(registry: &Registry, dimension: &str) -> Result<CountTable> {
    if !registry.has_study_column(dimension) {
        return Err(SlrError::DimensionNotFound(dimension.to_string()));
    }

    let mut table = CountTable::new();
    for study in registry.studies() {
        if let Some(cell) = study.column(dimension) {
            for value in split_dimension_values(&cell) {
                table.increment(&value);
            }
        }
    }

    Ok(table.ordered(TableOrder::for_dimension(dimension)))
}

/// Counts studies by `(primary, secondary)` pair into a dense matrix.
///
/// Both cells are taken verbatim (no comma splitting); each study adds exactly
/// one to one cell. Rows are ordered ascending when the primary dimension is
/// `Year`, otherwise by first appearance.
///
/// # Errors
///
/// Returns `DimensionNotFound` if either column is missing.
pub fn count_stacked_dimension(
    registry: &Registry,
    primary: &str,
    secondary: &str,
) -> Result<StackedCountTable> {
    for dimension in [primary, secondary] {
        if !registry.has_study_column(dimension) {
            return Err(SlrError::DimensionNotFound(dimension.to_string()));
        }
    }

    let cell = |study: &crate::StudyRecord, column: &str| {
        study
            .column(column)
            .map(|value| value.into_owned())
            .unwrap_or_default()
    };

    let mut secondary_values: Vec<String> = Vec::new();
    for study in registry.studies() {
        let value = cell(study, secondary);
        if !secondary_values.contains(&value) {
            secondary_values.push(value);
        }
    }

    let mut rows: Vec<(String, Vec<usize>)> = Vec::new();
    for study in registry.studies() {
        let x = cell(study, primary);
        let y = cell(study, secondary);
        let column = secondary_values
            .iter()
            .position(|v| *v == y)
            .unwrap_or_default();

        let row = match rows.iter().position(|(value, _)| *value == x) {
            Some(position) => position,
            None => {
                rows.push((x, vec![0; secondary_values.len()]));
                rows.len() - 1
            }
        };
        rows[row].1[column] += 1;
    }

    if primary == TEMPORAL_DIMENSION {
        rows.sort_by(|a, b| compare_cell_values(&a.0, &b.0));
    }

    Ok(StackedCountTable {
        secondary_values,
        rows,
    })
}

/// Counts studies per geography value using the authors table.
///
/// A study contributes at most once to each value, however many of its authors
/// share it. Cells are trimmed before comparison, so `"USA "` and `"USA"` are
/// one value; cells that are empty after trimming are ignored. The result is
/// ordered by ascending frequency.
///
/// # Errors
///
/// Returns `DimensionNotFound` if the authors table has no such column.
pub fn count_geography(registry: &Registry, level: &str) -> Result<CountTable> {
    if !registry.has_author_column(level) {
        return Err(SlrError::DimensionNotFound(level.to_string()));
    }

    let mut seen: HashSet<(StudyId, String)> = HashSet::new();
    let mut table = CountTable::new();
    for author in registry.authors() {
        let Some(value) = author.column(level) else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        if seen.insert((author.study_id, value.to_string())) {
            table.increment(value);
        }
    }

    Ok(table.ordered(TableOrder::AscendingFrequency))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::AuthorRecord;
    use crate::{BibliographicEntry, Person};
    use pretty_assertions::assert_eq;

    fn registry_with(rows: &[(&str, &[(&str, &str)])]) -> Registry {
        let entries: Vec<_> = rows
            .iter()
            .enumerate()
            .map(|(i, (year, _))| BibliographicEntry {
                key: format!("k{}", i),
                entry_type: "article".to_string(),
                title: Some(format!("Title {}", i)),
                year: Some(year.to_string()),
                authors: vec![Person::new(["Doe"], "Doe, Jane")],
                ..Default::default()
            })
            .collect();
        let (mut registry, _) = Registry::new().reconcile(&entries);
        for (i, (_, cells)) in rows.iter().enumerate() {
            for (dimension, value) in cells.iter() {
                registry
                    .set_dimension(StudyId::new(i as u32 + 1), dimension, value)
                    .unwrap();
            }
        }
        registry
    }

    fn pairs(table: &CountTable) -> Vec<(&str, usize)> {
        table.iter().collect()
    }

    #[test]
    fn test_multi_label_counting() {
        let registry = registry_with(&[
            ("2020", &[("Platform", "Cloud, Edge")]),
            ("2020", &[("Platform", "Cloud")]),
        ]);
        let table = count_dimension(&registry, "Platform").unwrap();
        assert_eq!(pairs(&table), vec![("Cloud", 2), ("Edge", 1)]);
        assert_eq!(table.total(), 3);
    }

    #[test]
    fn test_tokens_are_trimmed_and_unquoted() {
        let registry = registry_with(&[
            ("2020", &[("Platform", " \"Cloud\" , ,Edge")]),
            ("2020", &[("Platform", "")]),
        ]);
        let table = count_dimension(&registry, "Platform").unwrap();
        assert_eq!(pairs(&table), vec![("Cloud", 1), ("Edge", 1)]);
    }

    #[test]
    fn test_year_is_ordered_by_value() {
        let registry = registry_with(&[("2019", &[]), ("2021", &[]), ("2020", &[])]);
        let table = count_dimension(&registry, "Year").unwrap();
        assert_eq!(pairs(&table), vec![("2019", 1), ("2020", 1), ("2021", 1)]);
    }

    #[test]
    fn test_frequency_ties_keep_first_appearance() {
        let registry = registry_with(&[
            ("2020", &[("Method", "Survey, Experiment")]),
            ("2020", &[("Method", "Case study, Experiment")]),
            ("2020", &[("Method", "Interview")]),
        ]);
        let table = count_dimension(&registry, "Method").unwrap();
        assert_eq!(
            pairs(&table),
            vec![
                ("Experiment", 2),
                ("Survey", 1),
                ("Case study", 1),
                ("Interview", 1)
            ]
        );

        let ascending = table.ordered(TableOrder::AscendingFrequency);
        assert_eq!(
            pairs(&ascending),
            vec![
                ("Survey", 1),
                ("Case study", 1),
                ("Interview", 1),
                ("Experiment", 2)
            ]
        );
        assert_eq!(ascending.get("Experiment"), Some(2));
    }

    #[test]
    fn test_missing_dimension_is_reported() {
        let registry = registry_with(&[("2020", &[])]);
        let result = count_dimension(&registry, "Methodology");
        assert!(matches!(result, Err(SlrError::DimensionNotFound(d)) if d == "Methodology"));
    }

    #[test]
    fn test_builtin_columns_can_be_counted() {
        let registry = registry_with(&[("2020", &[]), ("2021", &[])]);
        let table = count_dimension(&registry, "Venue").unwrap();
        assert_eq!(pairs(&table), vec![("Journal", 2)]);
    }

    #[test]
    fn test_stacked_matrix_is_dense() {
        let registry = registry_with(&[
            ("2021", &[("Type", "Tool")]),
            ("2020", &[("Type", "Method")]),
            ("2020", &[("Type", "Tool")]),
            ("2022", &[("Type", "Survey")]),
        ]);
        let stacked = count_stacked_dimension(&registry, "Year", "Type").unwrap();

        assert_eq!(stacked.secondary_values(), ["Tool", "Method", "Survey"]);
        assert_eq!(
            stacked.primary_values().collect::<Vec<_>>(),
            vec!["2020", "2021", "2022"]
        );
        for (_, counts) in stacked.rows() {
            assert_eq!(counts.len(), 3);
        }
        assert_eq!(stacked.get("2020", "Tool"), Some(1));
        assert_eq!(stacked.get("2020", "Method"), Some(1));
        assert_eq!(stacked.get("2020", "Survey"), Some(0));
        assert_eq!(stacked.get("2022", "Survey"), Some(1));
        assert_eq!(stacked.get("2022", "Tool"), Some(0));

        let row = stacked.row("2021").unwrap();
        assert_eq!(pairs(&row), vec![("Tool", 1), ("Method", 0), ("Survey", 0)]);
    }

    #[test]
    fn test_stacked_secondary_is_not_split() {
        let registry = registry_with(&[
            ("2020", &[("Type", "Tool, Method"), ("Domain", "Health")]),
            ("2020", &[("Type", "Tool"), ("Domain", "Health")]),
        ]);
        let stacked = count_stacked_dimension(&registry, "Domain", "Type").unwrap();
        assert_eq!(stacked.secondary_values(), ["Tool, Method", "Tool"]);
        assert_eq!(stacked.get("Health", "Tool, Method"), Some(1));
        assert_eq!(stacked.len(), 1);
    }

    #[test]
    fn test_stacked_missing_dimension() {
        let registry = registry_with(&[("2020", &[("Type", "Tool")])]);
        let result = count_stacked_dimension(&registry, "Year", "Domain");
        assert!(matches!(result, Err(SlrError::DimensionNotFound(d)) if d == "Domain"));
    }

    fn author(study: u32, country: &str) -> AuthorRecord {
        AuthorRecord {
            study_id: StudyId::new(study),
            citation_key: format!("k{}", study),
            year: 2020,
            venue: crate::normalize::Venue::Journal,
            title: format!("Title {}", study),
            publication: String::new(),
            author: "Doe, Jane".to_string(),
            department: "Blank".to_string(),
            institution: "Blank".to_string(),
            city: "Blank".to_string(),
            country: country.to_string(),
            continent: "Blank".to_string(),
            extra_columns: HashMap::new(),
        }
    }

    #[test]
    fn test_geography_counts_each_study_once() {
        let authors = vec![
            author(1, "USA"),
            author(1, "USA"),
            author(1, "USA"),
            author(2, "Spain"),
            author(2, "USA"),
            author(3, "Spain"),
            author(3, "Chile"),
        ];
        let registry = Registry::from_tables(Vec::new(), authors, Vec::new(), Vec::new()).unwrap();

        let table = count_geography(&registry, "Country").unwrap();
        assert_eq!(pairs(&table), vec![("Chile", 1), ("USA", 2), ("Spain", 2)]);
    }

    #[test]
    fn test_geography_merges_padded_cells() {
        let authors = vec![
            author(1, "USA "),
            author(2, " USA"),
            author(2, "USA"),
            author(3, "   "),
        ];
        let registry = Registry::from_tables(Vec::new(), authors, Vec::new(), Vec::new()).unwrap();

        let table = count_geography(&registry, "Country").unwrap();
        assert_eq!(pairs(&table), vec![("USA", 2)]);
    }

    #[test]
    fn test_geography_unknown_level() {
        let registry = Registry::new();
        let result = count_geography(&registry, "Planet");
        assert!(matches!(result, Err(SlrError::DimensionNotFound(_))));
    }

    #[test]
    fn test_count_table_from_iter_merges() {
        let table: CountTable = [("a", 1), ("b", 2), ("a", 3)].into_iter().collect();
        assert_eq!(pairs(&table), vec![("a", 4), ("b", 2)]);
        assert_eq!(table.values().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
