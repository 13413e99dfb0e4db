//! Reconciliation and aggregation engine for systematic literature reviews.
//!
//! `slrlib` keeps a registry of reviewed studies in step with the bibliographic
//! exports an analyst collects, and turns the analyst's free-text classification
//! columns into frequency tables and compact LaTeX summaries.
//!
//! # Key Features
//!
//! - **Reconciliation**: merge parsed bibliographic entries into the registry,
//!   skipping entries whose title is already registered and assigning stable
//!   study identifiers (`S01`, `S02`, ...).
//! - **Dimension aggregation**: multi-label frequency counts over comma-separated
//!   dimension cells, dense stacked matrices, and per-study geography counts.
//! - **Acronyms**: short, collision-resistant tokens for summary tables.
//! - **Storage**: the articles and authors tables round-trip through CSV.
//! - **BibTeX input** (feature `bibtex`).
//!
//! # Basic Usage
//!
//! ```rust
//! use slrlib::{BibliographicEntry, Person, Registry};
//!
//! let entry = BibliographicEntry {
//!     key: "doe2020".to_string(),
//!     entry_type: "article".to_string(),
//!     title: Some("A Study".to_string()),
//!     year: Some("2020".to_string()),
//!     doi: Some("10.1/x".to_string()),
//!     journal: Some("J1".to_string()),
//!     booktitle: None,
//!     authors: vec![Person::new(["Doe"], "Doe, Jane")],
//! };
//!
//! let (registry, report) = Registry::new().reconcile(&[entry]);
//! assert_eq!(report.accepted_count(), 1);
//! assert_eq!(registry.studies()[0].study_id.to_string(), "S01");
//! ```
//!
//! # Dimension Counts
//!
//! ```rust
//! use slrlib::dimension::count_dimension;
//! # use slrlib::Registry;
//! # let registry = Registry::new();
//!
//! match count_dimension(&registry, "Methodology") {
//!     Ok(table) => {
//!         for (value, count) in table.iter() {
//!             println!("{value}: {count}");
//!         }
//!     }
//!     Err(e) => eprintln!("skipping: {e}"),
//! }
//! ```
//!
//! # Error Handling
//!
//! The library uses a custom [`Result`] type that wraps [`SlrError`]. Failures
//! tied to one entry or one dimension are reported back to the caller and never
//! abort the surrounding run.

use serde::{Deserialize, Serialize};
use thiserror::Error;

extern crate csv as csv_crate;

pub mod acronym;
#[cfg(feature = "bibtex")]
pub mod bibtex;
pub mod chart;
pub mod config;
pub mod csv;
pub mod dimension;
pub mod latex;
pub mod normalize;
mod regex;
pub mod registry;
pub mod session;
mod utils;

// Reexports
pub use acronym::AcronymTable;
#[cfg(feature = "bibtex")]
pub use bibtex::BibtexSource;
pub use config::SlrConfig;
pub use dimension::{CountTable, StackedCountTable};
pub use registry::{AuthorRecord, ReconcileReport, Registry, StudyId, StudyRecord};
pub use session::Session;

/// A specialized Result type for registry operations.
pub type Result<T> = std::result::Result<T, SlrError>;

/// Errors raised by the reconciliation and aggregation engine.
#[derive(Error, Debug)]
pub enum SlrError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    InvalidFormat(String),

    #[error("Missing required field: {0}")]
    MissingRequiredField(String),

    #[error("Invalid field value: {field} - {message}")]
    InvalidFieldValue { field: String, message: String },

    #[error("Malformed input: {message} at line {line}")]
    MalformedInput { message: String, line: usize },

    #[error("Unknown venue kind: {0}")]
    UnknownVenueKind(String),

    #[error("Entry has no authors")]
    MissingAuthorList,

    #[error("Dimension not found: {0}")]
    DimensionNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Error: {0}")]
    Other(String),
}

impl From<csv_crate::Error> for SlrError {
    fn from(err: csv_crate::Error) -> Self {
        SlrError::InvalidFormat(err.to_string())
    }
}

impl From<serde_json::Error> for SlrError {
    fn from(err: serde_json::Error) -> Self {
        SlrError::Config(err.to_string())
    }
}

/// A person listed on a bibliographic entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    /// Family name parts, in order (e.g. `["van", "Gogh"]`)
    pub last_names: Vec<String>,
    /// Full display form, e.g. `"van Gogh, Vincent"`
    pub full_display: String,
}

impl Person {
    pub fn new<I, S>(last_names: I, full_display: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            last_names: last_names.into_iter().map(Into::into).collect(),
            full_display: full_display.to_string(),
        }
    }
}

/// One parsed bibliographic record, as produced by an [`EntrySource`].
///
/// Fields are kept as the source delivered them; the normalizer decides what
/// is required and how absent values degrade.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BibliographicEntry {
    /// Unique citation key
    pub key: String,
    /// Raw lowercase entry type (`article`, `inproceedings`, ...)
    pub entry_type: String,
    pub title: Option<String>,
    /// Publication year as written in the source
    pub year: Option<String>,
    pub doi: Option<String>,
    /// Proceedings or collection name
    pub booktitle: Option<String>,
    /// Journal name
    pub journal: Option<String>,
    /// Authors in listed order
    pub authors: Vec<Person>,
}

/// Trait for bibliographic sources that produce entries for reconciliation.
pub trait EntrySource {
    /// Parse a string containing one or more bibliographic entries.
    ///
    /// # Errors
    ///
    /// Returns `SlrError` if the input cannot be parsed at all
    fn parse(&self, input: &str) -> Result<Vec<BibliographicEntry>>;
}
