//! One analyst session over a configured review.
//!
//! A [`Session`] owns the configuration and the in-memory registry. Operations
//! that change the registry write both tables back in full before returning.
//!
//! ```no_run
//! use slrlib::{Session, SlrConfig};
//!
//! let config = SlrConfig::load("config.json")?;
//! let mut session = Session::open_or_bootstrap(config)?;
//! let report = session.update_from_bibtex()?;
//! println!("{} new studies", report.accepted_count());
//! session.write_summary_table()?;
//! # Ok::<(), slrlib::SlrError>(())
//! ```

use std::path::PathBuf;

use crate::chart::{
    ChartRun, PresentationSink, render_dimension_charts, render_geography_charts,
    render_stacked_charts,
};
use crate::config::SlrConfig;
use crate::csv::{load_registry, save_registry};
use crate::latex::{SummaryTable, information_table, summary_table};
use crate::registry::{ReconcileReport, Registry};
use crate::{BibliographicEntry, Result};

#[cfg(feature = "bibtex")]
use crate::registry::unseen_entries;
#[cfg(feature = "bibtex")]
use crate::{BibtexSource, EntrySource};
#[cfg(feature = "bibtex")]
use std::collections::HashSet;

/// File the information table is written to, inside the review root.
pub const INFORMATION_TABLE_FILE: &str = "info.tex";

/// File the summary table is written to, inside the review root.
pub const SUMMARY_TABLE_FILE: &str = "summary.tex";

/// Outcome of comparing two exports of one database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseDiff {
    pub database: String,
    /// Entries of the new export already present in the previous one
    pub duplicates: usize,
    /// Entries written to `output`
    pub remaining: usize,
    pub output: PathBuf,
}

/// A loaded review: configuration plus registry.
#[derive(Debug, Clone)]
pub struct Session {
    config: SlrConfig,
    registry: Registry,
}

impl Session {
    /// Loads the articles and authors tables named by the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Io` if a table cannot be read and a row error if a table is
    /// malformed.
    pub fn open(config: SlrConfig) -> Result<Self> {
        let registry = load_registry(&config.articles_path(), &config.authors_path())?;
        Ok(Self { config, registry })
    }

    /// Opens the review, building it from BibTeX when neither table exists yet.
    #[cfg(feature = "bibtex")]
    pub fn open_or_bootstrap(config: SlrConfig) -> Result<Self> {
        if config.articles_path().exists() || config.authors_path().exists() {
            return Self::open(config);
        }
        tracing::info!(
            path = %config.articles_path().display(),
            "tables not found, building them from bibtex"
        );
        Ok(Self::bootstrap_from_bibtex(config)?.0)
    }

    /// Builds a fresh registry from the configured `.bib` file and saves both tables.
    #[cfg(feature = "bibtex")]
    pub fn bootstrap_from_bibtex(config: SlrConfig) -> Result<(Self, ReconcileReport)> {
        let mut session = Self::with_registry(config, Registry::new());
        let report = session.update_from_bibtex()?;
        Ok((session, report))
    }

    /// Wraps an existing registry without touching the filesystem.
    pub fn with_registry(config: SlrConfig, registry: Registry) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &SlrConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Mutable access for analyst edits such as [`Registry::set_dimension`].
    /// Call [`Session::save`] to persist them.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Writes both tables in full.
    pub fn save(&self) -> Result<()> {
        save_registry(
            &self.registry,
            &self.config.articles_path(),
            &self.config.authors_path(),
        )
    }

    /// Merges entries into the registry and saves both tables.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the tables cannot be written. The accepted studies stay
    /// in the in-memory registry, so memory is ahead of disk until a later
    /// [`Session::save`] succeeds. Per-entry outcomes of the failed call were
    /// already logged by [`Registry::reconcile`].
    pub fn reconcile(&mut self, entries: &[BibliographicEntry]) -> Result<ReconcileReport> {
        let (registry, report) = std::mem::take(&mut self.registry).reconcile(entries);
        self.registry = registry;
        self.save()?;
        Ok(report)
    }

    /// Reconciles the configured `.bib` file into the registry and saves both tables.
    ///
    /// # Errors
    ///
    /// Returns `Io` or `InvalidFormat` if the file cannot be read or parsed,
    /// and `Io` if the tables cannot be written; the latter leaves the registry
    /// as described on [`Session::reconcile`]. Per-entry problems are in the
    /// report instead.
    #[cfg(feature = "bibtex")]
    pub fn update_from_bibtex(&mut self) -> Result<ReconcileReport> {
        let input = std::fs::read_to_string(self.config.bibtex_path())?;
        let entries = BibtexSource::new().parse(&input)?;
        self.reconcile(&entries)
    }

    /// For every configured database, writes `<db>_new_entries.bib` with the
    /// entries of `<db>.bib` whose title is not in `<db>_old.bib`.
    #[cfg(feature = "bibtex")]
    pub fn reference_difference(&self) -> Result<Vec<DatabaseDiff>> {
        let source = BibtexSource::new();
        let folder = self.config.references_dir();
        let mut diffs = Vec::new();

        for database in &self.config.database_names {
            let previous = std::fs::read_to_string(folder.join(format!("{}_old.bib", database)))?;
            let current = std::fs::read_to_string(folder.join(format!("{}.bib", database)))?;
            let previous = source.parse(&previous)?;
            let current_entries = source.parse(&current)?;

            let unseen = unseen_entries(&previous, &current_entries);
            let keys: HashSet<&str> = unseen.iter().map(|e| e.key.as_str()).collect();
            let output = folder.join(format!("{}_new_entries.bib", database));
            std::fs::write(&output, source.retain_keys(&current, &keys)?)?;

            let diff = DatabaseDiff {
                database: database.clone(),
                duplicates: current_entries.len() - unseen.len(),
                remaining: unseen.len(),
                output,
            };
            tracing::info!(
                database = %diff.database,
                duplicates = diff.duplicates,
                remaining = diff.remaining,
                "reference difference written"
            );
            diffs.push(diff);
        }

        Ok(diffs)
    }

    pub fn dimension_charts(&self, sink: &mut dyn PresentationSink) -> ChartRun {
        render_dimension_charts(&self.registry, &self.config.dimensions, sink)
    }

    pub fn stacked_charts(&self, sink: &mut dyn PresentationSink) -> ChartRun {
        render_stacked_charts(&self.registry, &self.config.stacked_dimensions, sink)
    }

    pub fn geography_charts(&self, sink: &mut dyn PresentationSink) -> ChartRun {
        render_geography_charts(&self.registry, &self.config.geography_levels, sink)
    }

    pub fn information_table(&self) -> String {
        information_table(&self.registry)
    }

    /// Summary table over the configured table dimensions.
    pub fn summary_table(&self) -> SummaryTable {
        summary_table(&self.registry, &self.config.table_dimensions)
    }

    /// Writes [`INFORMATION_TABLE_FILE`] into the review root and returns its path.
    pub fn write_information_table(&self) -> Result<PathBuf> {
        let path = self.config.root_dir.join(INFORMATION_TABLE_FILE);
        std::fs::write(&path, self.information_table())?;
        Ok(path)
    }

    /// Writes [`SUMMARY_TABLE_FILE`] into the review root.
    ///
    /// The returned table carries the acronym legend and skipped dimensions.
    pub fn write_summary_table(&self) -> Result<SummaryTable> {
        let table = self.summary_table();
        std::fs::write(self.config.root_dir.join(SUMMARY_TABLE_FILE), &table.latex)?;
        Ok(table)
    }
}
