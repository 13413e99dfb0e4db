//! Study registry and reconciliation.
//!
//! The registry is the authoritative list of reviewed studies and their
//! authors. Studies enter it only through [`Registry::reconcile`], which skips
//! entries whose title is already registered and hands out study identifiers
//! in insertion order.
//!
//! ## Identifiers
//!
//! Study identifiers are `S` followed by the sequence number, zero-padded to two
//! digits (`S01` ... `S09`, `S10`, `S100`). A registry keeps an explicit
//! next-sequence counter; identifiers are never reassigned, including after a
//! rejected entry or after rows were edited outside the engine.
//!
//! ## Usage
//!
//! ```rust
//! use slrlib::{BibliographicEntry, Person, Registry};
//!
//! let entries = vec![BibliographicEntry {
//!     key: "doe2020".to_string(),
//!     entry_type: "article".to_string(),
//!     title: Some("A Study".to_string()),
//!     year: Some("2020".to_string()),
//!     authors: vec![Person::new(["Doe"], "Doe, Jane")],
//!     ..Default::default()
//! }];
//!
//! let (registry, report) = Registry::new().reconcile(&entries);
//! assert_eq!(report.accepted_count(), 1);
//!
//! // Reconciling the same export again changes nothing
//! let (again, report) = registry.clone().reconcile(&entries);
//! assert_eq!(report.accepted_count(), 0);
//! assert_eq!(again, registry);
//! ```

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::normalize::{Venue, normalize_entry, required_title};
use crate::{BibliographicEntry, Result, SlrError};

/// Built-in columns of the articles table, in storage order.
pub const STUDY_COLUMNS: [&str; 11] = [
    "Study",
    "Citation",
    "Year",
    "Venue",
    "Title",
    "Comments",
    "Publication",
    "Author",
    "Authors",
    "DOI",
    "Total",
];

/// Built-in columns of the authors table, in storage order.
pub const AUTHOR_COLUMNS: [&str; 12] = [
    "Study",
    "Citation",
    "Year",
    "Venue",
    "Title",
    "Publication",
    "Author",
    "Department",
    "Institution",
    "City",
    "Country",
    "Continent",
];

/// Stable identifier of a study (`S01`, `S02`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StudyId(u32);

impl StudyId {
    /// Creates an identifier from its 1-based sequence number.
    #[must_use]
    pub fn new(sequence: u32) -> Self {
        Self(sequence)
    }

    pub fn sequence(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for StudyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{:02}", self.0)
    }
}

impl FromStr for StudyId {
    type Err = SlrError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || SlrError::InvalidFieldValue {
            field: "Study".to_string(),
            message: format!("'{}' is not a study identifier", s),
        };

        let digits = s.trim().strip_prefix('S').ok_or_else(invalid)?;
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        match digits.parse::<u32>() {
            Ok(0) | Err(_) => Err(invalid()),
            Ok(sequence) => Ok(StudyId(sequence)),
        }
    }
}

impl TryFrom<String> for StudyId {
    type Error = SlrError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<StudyId> for String {
    fn from(id: StudyId) -> Self {
        id.to_string()
    }
}

/// One row of the articles table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyRecord {
    pub study_id: StudyId,
    pub citation_key: String,
    pub year: i32,
    pub venue: Venue,
    /// Title of the study, unique across the registry
    pub title: String,
    /// Analyst comments
    pub comments: String,
    /// Journal or proceedings name, empty when unresolved
    pub publication: String,
    /// `"<last name of first author> et al."`
    pub main_author: String,
    /// All author display forms joined by `#`
    pub all_authors: String,
    /// DOI, empty when the source had none
    pub doi: String,
    pub total_score: i64,
    /// Raw comma-separated cell per dimension column
    pub dimension_values: HashMap<String, String>,
}

impl StudyRecord {
    /// Looks up a cell by its column header.
    ///
    /// Built-in columns are resolved first, then dimension columns.
    pub fn column(&self, name: &str) -> Option<Cow<'_, str>> {
        let value = match name {
            "Study" => Cow::Owned(self.study_id.to_string()),
            "Citation" => Cow::Borrowed(self.citation_key.as_str()),
            "Year" => Cow::Owned(self.year.to_string()),
            "Venue" => Cow::Borrowed(self.venue.as_str()),
            "Title" => Cow::Borrowed(self.title.as_str()),
            "Comments" => Cow::Borrowed(self.comments.as_str()),
            "Publication" => Cow::Borrowed(self.publication.as_str()),
            "Author" => Cow::Borrowed(self.main_author.as_str()),
            "Authors" => Cow::Borrowed(self.all_authors.as_str()),
            "DOI" => Cow::Borrowed(self.doi.as_str()),
            "Total" => Cow::Owned(self.total_score.to_string()),
            _ => return self.dimension_values.get(name).map(|v| Cow::Borrowed(v.as_str())),
        };
        Some(value)
    }
}

/// One row of the authors table. Belongs to the study named by `study_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorRecord {
    pub study_id: StudyId,
    pub citation_key: String,
    pub year: i32,
    pub venue: Venue,
    pub title: String,
    pub publication: String,
    /// Display form of this author
    pub author: String,
    pub department: String,
    pub institution: String,
    pub city: String,
    pub country: String,
    pub continent: String,
    /// Additional analyst columns, kept verbatim
    pub extra_columns: HashMap<String, String>,
}

impl AuthorRecord {
    /// Looks up a cell by its column header.
    pub fn column(&self, name: &str) -> Option<Cow<'_, str>> {
        let value = match name {
            "Study" => Cow::Owned(self.study_id.to_string()),
            "Citation" => Cow::Borrowed(self.citation_key.as_str()),
            "Year" => Cow::Owned(self.year.to_string()),
            "Venue" => Cow::Borrowed(self.venue.as_str()),
            "Title" => Cow::Borrowed(self.title.as_str()),
            "Publication" => Cow::Borrowed(self.publication.as_str()),
            "Author" => Cow::Borrowed(self.author.as_str()),
            "Department" => Cow::Borrowed(self.department.as_str()),
            "Institution" => Cow::Borrowed(self.institution.as_str()),
            "City" => Cow::Borrowed(self.city.as_str()),
            "Country" => Cow::Borrowed(self.country.as_str()),
            "Continent" => Cow::Borrowed(self.continent.as_str()),
            _ => return self.extra_columns.get(name).map(|v| Cow::Borrowed(v.as_str())),
        };
        Some(value)
    }
}

/// An entry that could not be registered.
#[derive(Debug)]
pub struct EntryFailure {
    /// Citation key of the rejected entry
    pub key: String,
    pub error: SlrError,
}

/// Outcome of one reconciliation run.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Identifiers assigned to accepted entries, in acceptance order
    pub accepted: Vec<StudyId>,
    /// Citation keys skipped because their title was already registered
    pub duplicates: Vec<String>,
    /// Entries rejected during normalization
    pub failures: Vec<EntryFailure>,
}

impl ReconcileReport {
    pub fn accepted_count(&self) -> usize {
        self.accepted.len()
    }

    pub fn duplicate_count(&self) -> usize {
        self.duplicates.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// The study registry: ordered study rows and author rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Registry {
    studies: Vec<StudyRecord>,
    authors: Vec<AuthorRecord>,
    dimension_columns: Vec<String>,
    author_extra_columns: Vec<String>,
    titles: HashSet<String>,
    next_sequence: u32,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Creates an empty registry. The first accepted study becomes `S01`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            studies: Vec::new(),
            authors: Vec::new(),
            dimension_columns: Vec::new(),
            author_extra_columns: Vec::new(),
            titles: HashSet::new(),
            next_sequence: 1,
        }
    }

    /// Rebuilds a registry from stored tables.
    ///
    /// The next identifier continues after the highest stored sequence number.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFieldValue` if two study rows share an identifier.
    pub fn from_tables(
        studies: Vec<StudyRecord>,
        authors: Vec<AuthorRecord>,
        dimension_columns: Vec<String>,
        author_extra_columns: Vec<String>,
    ) -> Result<Self> {
        let mut seen = HashSet::new();
        for study in &studies {
            if !seen.insert(study.study_id) {
                return Err(SlrError::InvalidFieldValue {
                    field: "Study".to_string(),
                    message: format!("identifier {} appears more than once", study.study_id),
                });
            }
        }

        let next_sequence = studies
            .iter()
            .map(|s| s.study_id.sequence())
            .max()
            .unwrap_or(0)
            .checked_add(1)
            .ok_or_else(|| SlrError::InvalidFieldValue {
                field: "Study".to_string(),
                message: "no identifier left after the highest stored one".to_string(),
            })?;
        let titles = studies.iter().map(|s| s.title.clone()).collect();

        Ok(Self {
            studies,
            authors,
            dimension_columns,
            author_extra_columns,
            titles,
            next_sequence,
        })
    }

    pub fn studies(&self) -> &[StudyRecord] {
        &self.studies
    }

    pub fn authors(&self) -> &[AuthorRecord] {
        &self.authors
    }

    pub fn len(&self) -> usize {
        self.studies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.studies.is_empty()
    }

    pub fn study(&self, id: StudyId) -> Option<&StudyRecord> {
        self.studies.iter().find(|s| s.study_id == id)
    }

    /// Author rows owned by one study, in insertion order.
    pub fn authors_of(&self, id: StudyId) -> impl Iterator<Item = &AuthorRecord> {
        self.authors.iter().filter(move |a| a.study_id == id)
    }

    /// Whether a study with exactly this title is registered.
    pub fn contains_title(&self, title: &str) -> bool {
        self.titles.contains(title)
    }

    /// The identifier the next accepted entry will receive.
    pub fn next_study_id(&self) -> StudyId {
        StudyId::new(self.next_sequence)
    }

    /// Dimension columns of the articles table, in column order.
    pub fn dimension_columns(&self) -> &[String] {
        &self.dimension_columns
    }

    /// Extra analyst columns of the authors table, in column order.
    pub fn author_extra_columns(&self) -> &[String] {
        &self.author_extra_columns
    }

    /// Whether the articles table has a column with this header.
    pub fn has_study_column(&self, name: &str) -> bool {
        STUDY_COLUMNS.contains(&name) || self.dimension_columns.iter().any(|c| c == name)
    }

    /// Whether the authors table has a column with this header.
    pub fn has_author_column(&self, name: &str) -> bool {
        AUTHOR_COLUMNS.contains(&name) || self.author_extra_columns.iter().any(|c| c == name)
    }

    /// Sets a study's raw cell for a dimension, adding the column if it is new.
    ///
    /// # Errors
    ///
    /// Returns `Other` if no study has the given identifier, and
    /// `InvalidFieldValue` if `dimension` names a built-in column.
    pub fn set_dimension(&mut self, id: StudyId, dimension: &str, value: &str) -> Result<()> {
        if STUDY_COLUMNS.contains(&dimension) {
            return Err(SlrError::InvalidFieldValue {
                field: dimension.to_string(),
                message: "built-in columns are not dimensions".to_string(),
            });
        }

        let study = self
            .studies
            .iter_mut()
            .find(|s| s.study_id == id)
            .ok_or_else(|| SlrError::Other(format!("no study with identifier {}", id)))?;
        study
            .dimension_values
            .insert(dimension.to_string(), value.to_string());

        if !self.dimension_columns.iter().any(|c| c == dimension) {
            self.dimension_columns.push(dimension.to_string());
        }
        Ok(())
    }

    /// Merges incoming entries into the registry.
    ///
    /// Entries are processed in the order given. An entry whose title is
    /// already registered (exact, case-sensitive match, including titles
    /// accepted earlier in the same call) is skipped as a duplicate. Every other
    /// entry is normalized and appended under the next identifier; an entry that
    /// fails normalization is reported and does not consume an identifier.
    /// Studies accepted before a failure stay registered. Once the identifier
    /// space is used up, every further entry is reported as a failure.
    pub fn reconcile(mut self, entries: &[BibliographicEntry]) -> (Self, ReconcileReport) {
        let mut report = ReconcileReport::default();

        for entry in entries {
            let title = match required_title(entry) {
                Ok(title) => title,
                Err(error) => {
                    tracing::warn!(key = %entry.key, %error, "rejected entry");
                    report.failures.push(EntryFailure {
                        key: entry.key.clone(),
                        error,
                    });
                    continue;
                }
            };

            if self.contains_title(title) {
                tracing::debug!(key = %entry.key, title, "skipping: title already registered");
                report.duplicates.push(entry.key.clone());
                continue;
            }

            let Some(following) = self.next_sequence.checked_add(1) else {
                let error = SlrError::InvalidFieldValue {
                    field: "Study".to_string(),
                    message: "identifier space exhausted".to_string(),
                };
                tracing::warn!(key = %entry.key, %error, "rejected entry");
                report.failures.push(EntryFailure {
                    key: entry.key.clone(),
                    error,
                });
                continue;
            };

            let study_id = self.next_study_id();
            match normalize_entry(entry, study_id) {
                Ok(normalized) => {
                    self.titles.insert(normalized.study.title.clone());
                    self.studies.push(normalized.study);
                    self.authors.extend(normalized.authors);
                    self.next_sequence = following;
                    report.accepted.push(study_id);
                }
                Err(error) => {
                    tracing::warn!(key = %entry.key, %error, "rejected entry");
                    report.failures.push(EntryFailure {
                        key: entry.key.clone(),
                        error,
                    });
                }
            }
        }

        tracing::info!(
            accepted = report.accepted_count(),
            duplicates = report.duplicate_count(),
            failed = report.failures.len(),
            studies = self.len(),
            "reconciliation complete"
        );

        (self, report)
    }
}

/// Entries of a new export whose title does not occur in the previous export.
///
/// Titles are compared exactly. Entries without a title cannot be matched and
/// are kept. The order of `current` is preserved.
pub fn unseen_entries<'a>(
    previous: &[BibliographicEntry],
    current: &'a [BibliographicEntry],
) -> Vec<&'a BibliographicEntry> {
    let seen: HashSet<&str> = previous.iter().filter_map(|e| e.title.as_deref()).collect();

    current
        .iter()
        .filter(|e| e.title.as_deref().is_none_or(|t| !seen.contains(t)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Person;
    use pretty_assertions::assert_eq;
    use rstest::*;

    fn entry(key: &str, title: &str) -> BibliographicEntry {
        BibliographicEntry {
            key: key.to_string(),
            entry_type: "article".to_string(),
            title: Some(title.to_string()),
            year: Some("2020".to_string()),
            doi: Some("10.1/x".to_string()),
            journal: Some("J1".to_string()),
            booktitle: None,
            authors: vec![Person::new(["Doe"], "Doe, Jane")],
        }
    }

    #[rstest]
    #[case(1, "S01")]
    #[case(9, "S09")]
    #[case(10, "S10")]
    #[case(123, "S123")]
    fn test_study_id_display(#[case] sequence: u32, #[case] expected: &str) {
        assert_eq!(StudyId::new(sequence).to_string(), expected);
        assert_eq!(expected.parse::<StudyId>().unwrap(), StudyId::new(sequence));
    }

    #[rstest]
    #[case("")]
    #[case("S")]
    #[case("S00")]
    #[case("01")]
    #[case("S1a")]
    #[case("S-1")]
    fn test_study_id_rejects(#[case] input: &str) {
        assert!(input.parse::<StudyId>().is_err());
    }

    #[test]
    fn test_reconcile_into_empty_registry() {
        let (registry, report) = Registry::new().reconcile(&[entry("doe2020", "A Study")]);

        assert_eq!(report.accepted, vec![StudyId::new(1)]);
        assert_eq!(registry.len(), 1);
        let study = &registry.studies()[0];
        assert_eq!(study.study_id.to_string(), "S01");
        assert_eq!(study.venue, Venue::Journal);
        assert_eq!(study.main_author, "Doe et al.");
        assert_eq!(registry.authors().len(), 1);
        assert_eq!(registry.authors()[0].study_id, study.study_id);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let entries = vec![entry("a", "First"), entry("b", "Second")];
        let (registry, _) = Registry::new().reconcile(&entries);
        let (again, report) = registry.clone().reconcile(&entries);

        assert_eq!(report.accepted_count(), 0);
        assert_eq!(report.duplicates, vec!["a", "b"]);
        assert_eq!(again, registry);
    }

    #[test]
    fn test_identifiers_follow_insertion_order() {
        let entries: Vec<_> = (1..=12)
            .map(|i| entry(&format!("k{}", i), &format!("Title {}", i)))
            .collect();
        let (registry, _) = Registry::new().reconcile(&entries);

        let ids: Vec<String> = registry
            .studies()
            .iter()
            .map(|s| s.study_id.to_string())
            .collect();
        assert_eq!(ids[0], "S01");
        assert_eq!(ids[8], "S09");
        assert_eq!(ids[9], "S10");
        assert_eq!(ids[11], "S12");
        assert!(
            registry
                .studies()
                .windows(2)
                .all(|w| w[0].study_id < w[1].study_id)
        );
    }

    #[test]
    fn test_failed_entry_does_not_consume_identifier() {
        let mut broken = entry("broken", "Broken");
        broken.authors.clear();
        let entries = vec![entry("a", "First"), broken, entry("c", "Third")];

        let (registry, report) = Registry::new().reconcile(&entries);

        assert_eq!(report.accepted, vec![StudyId::new(1), StudyId::new(2)]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].key, "broken");
        assert!(matches!(report.failures[0].error, SlrError::MissingAuthorList));
        assert_eq!(registry.studies()[1].citation_key, "c");
        assert!(!registry.contains_title("Broken"));
    }

    fn registry_ending_at(sequence: u32) -> Result<Registry> {
        let (registry, _) = Registry::new().reconcile(&[entry("a", "First")]);
        let mut studies = registry.studies().to_vec();
        studies[0].study_id = StudyId::new(sequence);
        Registry::from_tables(studies, Vec::new(), Vec::new(), Vec::new())
    }

    #[test]
    fn test_loading_highest_identifier_is_rejected() {
        let result = registry_ending_at(u32::MAX);
        assert!(matches!(
            result,
            Err(SlrError::InvalidFieldValue { ref field, .. }) if field == "Study"
        ));
    }

    #[test]
    fn test_exhausted_identifiers_are_reported_per_entry() {
        let registry = registry_ending_at(u32::MAX - 1).unwrap();
        assert_eq!(registry.next_study_id(), StudyId::new(u32::MAX));

        let (registry, report) =
            registry.reconcile(&[entry("b", "Second"), entry("c", "Third")]);

        assert!(report.accepted.is_empty());
        assert_eq!(report.failures.len(), 2);
        assert!(matches!(
            report.failures[0].error,
            SlrError::InvalidFieldValue { ref field, .. } if field == "Study"
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_entry_without_title_is_reported() {
        let mut untitled = entry("untitled", "");
        untitled.title = None;
        let (registry, report) = Registry::new().reconcile(&[untitled]);

        assert!(registry.is_empty());
        assert!(!report.is_clean());
        assert!(matches!(
            report.failures[0].error,
            SlrError::MissingRequiredField(_)
        ));
    }

    #[test]
    fn test_duplicate_detection_is_exact() {
        let (registry, _) = Registry::new().reconcile(&[entry("a", "A Study")]);
        let (registry, report) = registry.reconcile(&[
            entry("b", "A Study"),
            entry("c", "a study"),
            entry("d", "A  Study"),
        ]);

        assert_eq!(report.duplicates, vec!["b"]);
        assert_eq!(report.accepted_count(), 2);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_duplicates_within_one_batch_are_skipped() {
        let (registry, report) =
            Registry::new().reconcile(&[entry("a", "Same"), entry("b", "Same")]);

        assert_eq!(registry.len(), 1);
        assert_eq!(report.duplicates, vec!["b"]);
    }

    #[test]
    fn test_from_tables_continues_after_highest_identifier() {
        let (registry, _) =
            Registry::new().reconcile(&[entry("a", "First"), entry("b", "Second")]);
        let mut studies = registry.studies().to_vec();
        studies.remove(0);

        let reloaded = Registry::from_tables(studies, Vec::new(), Vec::new(), Vec::new()).unwrap();
        assert_eq!(reloaded.next_study_id().to_string(), "S03");

        let (reloaded, report) = reloaded.reconcile(&[entry("c", "Third")]);
        assert_eq!(report.accepted, vec![StudyId::new(3)]);
        assert_eq!(reloaded.len(), 2);
    }

    #[test]
    fn test_from_tables_rejects_repeated_identifier() {
        let (registry, _) = Registry::new().reconcile(&[entry("a", "First")]);
        let studies = vec![registry.studies()[0].clone(), registry.studies()[0].clone()];

        let result = Registry::from_tables(studies, Vec::new(), Vec::new(), Vec::new());
        assert!(matches!(result, Err(SlrError::InvalidFieldValue { .. })));
    }

    #[test]
    fn test_set_dimension_registers_column() {
        let (mut registry, _) = Registry::new().reconcile(&[entry("a", "First")]);
        assert!(!registry.has_study_column("Methodology"));

        registry
            .set_dimension(StudyId::new(1), "Methodology", "Case study")
            .unwrap();

        assert!(registry.has_study_column("Methodology"));
        assert_eq!(registry.dimension_columns(), ["Methodology"]);
        assert_eq!(
            registry.studies()[0].column("Methodology").as_deref(),
            Some("Case study")
        );
        assert!(registry.set_dimension(StudyId::new(1), "Year", "1999").is_err());
        assert!(registry.set_dimension(StudyId::new(7), "Methodology", "x").is_err());
    }

    #[test]
    fn test_column_lookup() {
        let (registry, _) = Registry::new().reconcile(&[entry("a", "First")]);
        let study = &registry.studies()[0];
        assert_eq!(study.column("Study").as_deref(), Some("S01"));
        assert_eq!(study.column("Year").as_deref(), Some("2020"));
        assert_eq!(study.column("Venue").as_deref(), Some("Journal"));
        assert_eq!(study.column("Missing"), None);

        let author = &registry.authors()[0];
        assert_eq!(author.column("Country").as_deref(), Some("Blank"));
        assert_eq!(author.column("Author").as_deref(), Some("Doe, Jane"));
    }

    #[test]
    fn test_unseen_entries() {
        let previous = vec![entry("a", "First"), entry("b", "Second")];
        let mut untitled = entry("u", "");
        untitled.title = None;
        let current = vec![
            entry("b2", "Second"),
            entry("c", "Third"),
            untitled,
            entry("a2", "First"),
        ];

        let keys: Vec<&str> = unseen_entries(&previous, &current)
            .into_iter()
            .map(|e| e.key.as_str())
            .collect();
        assert_eq!(keys, vec!["c", "u"]);
    }
}
