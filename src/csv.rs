//! CSV storage for the articles and authors tables.
//!
//! Both tables are written whole, one row per record, with the built-in
//! columns first ([`STUDY_COLUMNS`], [`AUTHOR_COLUMNS`]) followed by the
//! analyst's own columns in the order they were first seen. On read, any header
//! that is not a built-in column is an analyst column: a dimension for the
//! articles table, an extra column for the authors table.
//!
//! # Example
//!
//! ```
//! use slrlib::csv::read_articles;
//!
//! let input = "\
//! Study,Citation,Year,Venue,Title,Comments,Publication,Author,Authors,DOI,Total,Methodology
//! S01,doe2020,2020,Journal,A Study,,J1,Doe et al.,\"Doe, Jane\",10.1/x,3,\"Survey, Case study\"";
//!
//! let table = read_articles(input).unwrap();
//! assert_eq!(table.rows[0].study_id.to_string(), "S01");
//! assert_eq!(table.extra_columns, vec!["Methodology"]);
//! ```

use csv_crate::{ReaderBuilder, StringRecord, WriterBuilder};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use crate::normalize::Venue;
use crate::registry::{AUTHOR_COLUMNS, AuthorRecord, Registry, STUDY_COLUMNS, StudyId, StudyRecord};
use crate::{Result, SlrError};

/// Rows of one stored table plus its analyst columns, in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Table<R> {
    pub rows: Vec<R>,
    pub extra_columns: Vec<String>,
}

/// One data row with header-based cell access.
struct Row<'r> {
    record: &'r StringRecord,
    columns: &'r HashMap<String, usize>,
    line: usize,
}

impl<'r> Row<'r> {
    /// Raw cell, empty when the column or the cell is absent.
    fn get(&self, name: &str) -> &'r str {
        self.columns
            .get(name)
            .and_then(|&i| self.record.get(i))
            .unwrap_or("")
    }

    /// Cell text exactly as stored, untrimmed.
    fn text(&self, name: &str) -> String {
        self.get(name).to_string()
    }

    fn study_id(&self) -> Result<StudyId> {
        let cell = self.get("Study").trim();
        StudyId::from_str(cell).map_err(|_| SlrError::MalformedInput {
            message: format!("'{}' is not a study identifier", cell),
            line: self.line,
        })
    }

    fn year(&self) -> Result<i32> {
        let cell = self.get("Year").trim();
        cell.parse().map_err(|_| SlrError::InvalidFieldValue {
            field: "Year".to_string(),
            message: format!("'{}' is not a year (line {})", cell, self.line),
        })
    }

    fn venue(&self) -> Result<Venue> {
        self.get("Venue").trim().parse()
    }

    fn total(&self) -> Result<i64> {
        let cell = self.get("Total").trim();
        if cell.is_empty() {
            return Ok(0);
        }
        cell.parse().map_err(|_| SlrError::InvalidFieldValue {
            field: "Total".to_string(),
            message: format!("'{}' is not an integer (line {})", cell, self.line),
        })
    }

    fn extra(&self, extra_columns: &[String]) -> HashMap<String, String> {
        extra_columns
            .iter()
            .map(|column| (column.clone(), self.get(column).to_string()))
            .collect()
    }
}

/// Reads every record of a table, handing each row to `parse_row`.
fn read_table<R>(
    input: &str,
    builtin: &[&str],
    parse_row: impl Fn(&Row<'_>, &[String]) -> Result<R>,
) -> Result<Table<R>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if !headers.iter().any(|h| h == "Study") {
        return Err(SlrError::MalformedInput {
            message: "missing 'Study' column".to_string(),
            line: 1,
        });
    }

    let mut columns = HashMap::new();
    let mut extra_columns = Vec::new();
    for (i, header) in headers.iter().enumerate() {
        if header.is_empty() || columns.contains_key(header) {
            continue;
        }
        columns.insert(header.clone(), i);
        if !builtin.contains(&header.as_str()) {
            extra_columns.push(header.clone());
        }
    }

    let mut rows = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = result?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let line = record
            .position()
            .map_or(i + 2, |position| position.line() as usize);
        let row = Row {
            record: &record,
            columns: &columns,
            line,
        };
        rows.push(parse_row(&row, &extra_columns)?);
    }

    Ok(Table {
        rows,
        extra_columns,
    })
}

/// Parses the articles table.
///
/// # Errors
///
/// Returns `MalformedInput` for a row whose `Study` cell is not an identifier,
/// `InvalidFieldValue` for a non-integer `Year` or `Total`, and
/// `UnknownVenueKind` for an unrecognized `Venue`.
pub fn read_articles(input: &str) -> Result<Table<StudyRecord>> {
    read_table(input, &STUDY_COLUMNS, |row, dimensions| {
        Ok(StudyRecord {
            study_id: row.study_id()?,
            citation_key: row.text("Citation"),
            year: row.year()?,
            venue: row.venue()?,
            title: row.text("Title"),
            comments: row.text("Comments"),
            publication: row.text("Publication"),
            main_author: row.text("Author"),
            all_authors: row.text("Authors"),
            doi: row.text("DOI"),
            total_score: row.total()?,
            dimension_values: row.extra(dimensions),
        })
    })
}

/// Parses the authors table.
///
/// # Errors
///
/// Same row errors as [`read_articles`].
pub fn read_authors(input: &str) -> Result<Table<AuthorRecord>> {
    read_table(input, &AUTHOR_COLUMNS, |row, extra| {
        Ok(AuthorRecord {
            study_id: row.study_id()?,
            citation_key: row.text("Citation"),
            year: row.year()?,
            venue: row.venue()?,
            title: row.text("Title"),
            publication: row.text("Publication"),
            author: row.text("Author"),
            department: row.text("Department"),
            institution: row.text("Institution"),
            city: row.text("City"),
            country: row.text("Country"),
            continent: row.text("Continent"),
            extra_columns: row.extra(extra),
        })
    })
}

/// Writes a header line and one line per row.
fn write_table<'a, R: 'a>(
    builtin: &[&str],
    extra_columns: &[String],
    rows: impl Iterator<Item = &'a R>,
    cell: impl Fn(&'a R, &str) -> String,
) -> Result<String> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());

    let headers: Vec<&str> = builtin
        .iter()
        .copied()
        .chain(extra_columns.iter().map(String::as_str))
        .collect();
    writer.write_record(&headers)?;

    for row in rows {
        writer.write_record(headers.iter().map(|&header| cell(row, header)))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| SlrError::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| SlrError::InvalidFormat(e.to_string()))
}

/// Renders the whole articles table.
pub fn write_articles(registry: &Registry) -> Result<String> {
    write_table(
        &STUDY_COLUMNS,
        registry.dimension_columns(),
        registry.studies().iter(),
        |study, header| study.column(header).unwrap_or_default().into_owned(),
    )
}

/// Renders the whole authors table.
pub fn write_authors(registry: &Registry) -> Result<String> {
    write_table(
        &AUTHOR_COLUMNS,
        registry.author_extra_columns(),
        registry.authors().iter(),
        |author, header| author.column(header).unwrap_or_default().into_owned(),
    )
}

/// Loads a registry from the two table files.
///
/// # Errors
///
/// Returns `Io` if either file cannot be read, and any row error of
/// [`read_articles`] / [`read_authors`].
pub fn load_registry(articles_path: &Path, authors_path: &Path) -> Result<Registry> {
    let articles = read_articles(&std::fs::read_to_string(articles_path)?)?;
    let authors = read_authors(&std::fs::read_to_string(authors_path)?)?;

    let registry = Registry::from_tables(
        articles.rows,
        authors.rows,
        articles.extra_columns,
        authors.extra_columns,
    )?;
    tracing::info!(
        studies = registry.len(),
        authors = registry.authors().len(),
        path = %articles_path.display(),
        "loaded registry"
    );
    Ok(registry)
}

/// Writes both tables in full, replacing the files.
pub fn save_registry(registry: &Registry, articles_path: &Path, authors_path: &Path) -> Result<()> {
    std::fs::write(articles_path, write_articles(registry)?)?;
    std::fs::write(authors_path, write_authors(registry)?)?;
    tracing::info!(
        studies = registry.len(),
        authors = registry.authors().len(),
        path = %articles_path.display(),
        "saved registry"
    );
    Ok(())
}
