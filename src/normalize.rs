//! Entry normalization.
//!
//! Turns one [`BibliographicEntry`] into the study row and author rows the
//! registry stores. Normalization is pure: the caller supplies the study
//! identifier and decides what to do with the result.
//!
//! # Example
//!
//! ```
//! use slrlib::normalize::{Venue, normalize_entry};
//! use slrlib::{BibliographicEntry, Person, StudyId};
//!
//! let entry = BibliographicEntry {
//!     key: "doe2020".to_string(),
//!     entry_type: "inproceedings".to_string(),
//!     title: Some("A Study".to_string()),
//!     year: Some("2020".to_string()),
//!     booktitle: Some("Proc. of Things".to_string()),
//!     authors: vec![Person::new(["Doe"], "Doe, Jane")],
//!     ..Default::default()
//! };
//!
//! let normalized = normalize_entry(&entry, StudyId::new(1)).unwrap();
//! assert_eq!(normalized.study.venue, Venue::Conference);
//! assert_eq!(normalized.study.publication, "Proc. of Things");
//! ```

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::registry::{AuthorRecord, StudyId, StudyRecord};
use crate::{BibliographicEntry, Person, Result, SlrError};

/// Separator between authors in the all-authors display. BibTeX person
/// display forms never contain it.
pub const AUTHORS_SEPARATOR: &str = "#";

/// Comment placed on every newly registered study.
pub const DEFAULT_COMMENT: &str = "Put your comments about this article here...";

/// Placeholder for affiliation fields the analyst has not filled in yet.
pub const BLANK_AFFILIATION: &str = "Blank";

/// Venue category of a study.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Venue {
    Conference,
    Journal,
    BookChapter,
    Book,
}

impl Venue {
    /// Maps a raw entry type onto a venue, `None` when the type is not recognized.
    pub fn from_entry_type(entry_type: &str) -> Option<Self> {
        match entry_type.trim().to_lowercase().as_str() {
            "inproceedings" | "conference" => Some(Venue::Conference),
            "article" => Some(Venue::Journal),
            "incollection" | "inbook" => Some(Venue::BookChapter),
            "book" => Some(Venue::Book),
            _ => None,
        }
    }

    /// Display label stored in the registry tables.
    pub fn as_str(&self) -> &'static str {
        match self {
            Venue::Conference => "Conference",
            Venue::Journal => "Journal",
            Venue::BookChapter => "Book Chapter",
            Venue::Book => "Book",
        }
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Venue {
    type Err = SlrError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "Conference" => Ok(Venue::Conference),
            "Journal" => Ok(Venue::Journal),
            "Book Chapter" => Ok(Venue::BookChapter),
            "Book" => Ok(Venue::Book),
            other => Err(SlrError::UnknownVenueKind(other.to_string())),
        }
    }
}

/// The rows produced for one accepted entry.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEntry {
    pub study: StudyRecord,
    pub authors: Vec<AuthorRecord>,
}

/// Normalizes one entry into a study row and one author row per listed author.
///
/// # Errors
///
/// - `MissingRequiredField` when the title or year is absent
/// - `InvalidFieldValue` when the year is not an integer
/// - `UnknownVenueKind` when the entry type has no venue label
/// - `MissingAuthorList` when the entry lists no authors
pub fn normalize_entry(entry: &BibliographicEntry, study_id: StudyId) -> Result<NormalizedEntry> {
    let title = required_title(entry)?.to_string();
    let year = parse_year(entry)?;
    let venue = Venue::from_entry_type(&entry.entry_type)
        .ok_or_else(|| SlrError::UnknownVenueKind(entry.entry_type.clone()))?;
    let main_author = main_author(&entry.authors)?;
    let publication = publication(entry).unwrap_or_default().to_string();
    let doi = entry.doi.clone().unwrap_or_default();

    let authors = entry
        .authors
        .iter()
        .map(|person| AuthorRecord {
            study_id,
            citation_key: entry.key.clone(),
            year,
            venue,
            title: title.clone(),
            publication: publication.clone(),
            author: person.full_display.clone(),
            department: BLANK_AFFILIATION.to_string(),
            institution: BLANK_AFFILIATION.to_string(),
            city: BLANK_AFFILIATION.to_string(),
            country: BLANK_AFFILIATION.to_string(),
            continent: BLANK_AFFILIATION.to_string(),
            extra_columns: Default::default(),
        })
        .collect();

    let study = StudyRecord {
        study_id,
        citation_key: entry.key.clone(),
        year,
        venue,
        title,
        comments: DEFAULT_COMMENT.to_string(),
        publication,
        main_author,
        all_authors: authors_display(&entry.authors),
        doi,
        total_score: 0,
        dimension_values: Default::default(),
    };

    Ok(NormalizedEntry { study, authors })
}

/// Returns the entry's title, the dedup key of the registry.
pub fn required_title(entry: &BibliographicEntry) -> Result<&str> {
    entry
        .title
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| SlrError::MissingRequiredField("title".to_string()))
}

fn parse_year(entry: &BibliographicEntry) -> Result<i32> {
    let raw = entry
        .year
        .as_deref()
        .map(str::trim)
        .filter(|y| !y.is_empty())
        .ok_or_else(|| SlrError::MissingRequiredField("year".to_string()))?;

    raw.parse().map_err(|_| SlrError::InvalidFieldValue {
        field: "year".to_string(),
        message: format!("'{}' is not a year", raw),
    })
}

/// Resolves the publication venue name for an entry.
///
/// The type-appropriate field wins (proceedings name for conference, chapter and
/// book types, journal name for articles); otherwise the journal field is used.
pub fn publication(entry: &BibliographicEntry) -> Option<&str> {
    let preferred = match entry.entry_type.trim().to_lowercase().as_str() {
        "inproceedings" | "conference" | "incollection" | "inbook" | "book" => {
            entry.booktitle.as_deref()
        }
        "article" => entry.journal.as_deref(),
        _ => None,
    };

    preferred
        .filter(|p| !p.is_empty())
        .or_else(|| entry.journal.as_deref().filter(|j| !j.is_empty()))
}

/// Last name of the first listed author followed by `" et al."`.
pub fn main_author(authors: &[Person]) -> Result<String> {
    let first = authors.first().ok_or(SlrError::MissingAuthorList)?;
    Ok(format!("{} et al.", first.last_names.join(" ")))
}

/// Full display forms of all authors joined by [`AUTHORS_SEPARATOR`].
pub fn authors_display(authors: &[Person]) -> String {
    authors
        .iter()
        .map(|a| a.full_display.as_str())
        .join(AUTHORS_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;

    fn article() -> BibliographicEntry {
        BibliographicEntry {
            key: "doe2020".to_string(),
            entry_type: "article".to_string(),
            title: Some("A Study".to_string()),
            year: Some("2020".to_string()),
            doi: Some("10.1/x".to_string()),
            journal: Some("J1".to_string()),
            booktitle: None,
            authors: vec![
                Person::new(["Doe"], "Doe, Jane"),
                Person::new(["van", "Gogh"], "van Gogh, Vincent"),
            ],
        }
    }

    #[rstest]
    #[case("inproceedings", Some(Venue::Conference))]
    #[case("conference", Some(Venue::Conference))]
    #[case("article", Some(Venue::Journal))]
    #[case("incollection", Some(Venue::BookChapter))]
    #[case("inbook", Some(Venue::BookChapter))]
    #[case("book", Some(Venue::Book))]
    #[case("Article", Some(Venue::Journal))]
    #[case("misc", None)]
    #[case("phdthesis", None)]
    fn test_venue_from_entry_type(#[case] entry_type: &str, #[case] expected: Option<Venue>) {
        assert_eq!(Venue::from_entry_type(entry_type), expected);
    }

    #[test]
    fn test_venue_labels_round_trip_through_table_cells() {
        for venue in [Venue::Conference, Venue::Journal, Venue::BookChapter, Venue::Book] {
            assert_eq!(venue.to_string().parse::<Venue>().unwrap(), venue);
        }
        assert!(matches!(
            "Workshop".parse::<Venue>(),
            Err(SlrError::UnknownVenueKind(_))
        ));
    }

    #[test]
    fn test_normalize_article() {
        let normalized = normalize_entry(&article(), StudyId::new(1)).unwrap();
        let study = &normalized.study;

        assert_eq!(study.study_id.to_string(), "S01");
        assert_eq!(study.citation_key, "doe2020");
        assert_eq!(study.year, 2020);
        assert_eq!(study.venue, Venue::Journal);
        assert_eq!(study.publication, "J1");
        assert_eq!(study.main_author, "Doe et al.");
        assert_eq!(study.all_authors, "Doe, Jane#van Gogh, Vincent");
        assert_eq!(study.doi, "10.1/x");
        assert_eq!(study.total_score, 0);
        assert_eq!(study.comments, DEFAULT_COMMENT);

        assert_eq!(normalized.authors.len(), 2);
        assert_eq!(normalized.authors[1].author, "van Gogh, Vincent");
        assert_eq!(normalized.authors[1].country, BLANK_AFFILIATION);
        assert!(normalized.authors.iter().all(|a| a.study_id == study.study_id));
    }

    #[test]
    fn test_main_author_joins_last_name_parts() {
        let authors = vec![Person::new(["van", "Gogh"], "van Gogh, Vincent")];
        assert_eq!(main_author(&authors).unwrap(), "van Gogh et al.");
    }

    #[test]
    fn test_missing_doi_degrades_to_empty() {
        let mut entry = article();
        entry.doi = None;
        let normalized = normalize_entry(&entry, StudyId::new(3)).unwrap();
        assert_eq!(normalized.study.doi, "");
    }

    #[test]
    fn test_missing_title_is_rejected() {
        let mut entry = article();
        entry.title = None;
        let result = normalize_entry(&entry, StudyId::new(1));
        assert!(matches!(result, Err(SlrError::MissingRequiredField(f)) if f == "title"));
    }

    #[test]
    fn test_missing_year_is_rejected() {
        let mut entry = article();
        entry.year = Some("  ".to_string());
        let result = normalize_entry(&entry, StudyId::new(1));
        assert!(matches!(result, Err(SlrError::MissingRequiredField(f)) if f == "year"));
    }

    #[test]
    fn test_non_numeric_year_is_rejected() {
        let mut entry = article();
        entry.year = Some("in press".to_string());
        let result = normalize_entry(&entry, StudyId::new(1));
        assert!(matches!(result, Err(SlrError::InvalidFieldValue { .. })));
    }

    #[test]
    fn test_unknown_entry_type_is_rejected() {
        let mut entry = article();
        entry.entry_type = "misc".to_string();
        let result = normalize_entry(&entry, StudyId::new(1));
        assert!(matches!(result, Err(SlrError::UnknownVenueKind(t)) if t == "misc"));
    }

    #[test]
    fn test_empty_author_list_is_rejected() {
        let mut entry = article();
        entry.authors.clear();
        let result = normalize_entry(&entry, StudyId::new(1));
        assert!(matches!(result, Err(SlrError::MissingAuthorList)));
    }

    #[rstest]
    #[case("inproceedings", Some("Proc"), Some("J"), Some("Proc"))]
    #[case("inproceedings", None, Some("J"), Some("J"))]
    #[case("article", Some("Proc"), Some("J"), Some("J"))]
    #[case("article", Some("Proc"), None, None)]
    #[case("book", Some("Series"), None, Some("Series"))]
    #[case("incollection", None, None, None)]
    fn test_publication_resolution(
        #[case] entry_type: &str,
        #[case] booktitle: Option<&str>,
        #[case] journal: Option<&str>,
        #[case] expected: Option<&str>,
    ) {
        let entry = BibliographicEntry {
            entry_type: entry_type.to_string(),
            booktitle: booktitle.map(String::from),
            journal: journal.map(String::from),
            ..Default::default()
        };
        assert_eq!(publication(&entry), expected);
    }
}
