//! BibTeX input.
//!
//! [`BibtexSource`] turns a `.bib` file into [`BibliographicEntry`] values for
//! reconciliation. Field text has its LaTeX grouping removed and whitespace
//! collapsed; no other cleanup is done.
//!
//! # Example
//!
//! ```
//! use slrlib::{BibtexSource, EntrySource};
//!
//! let input = r#"
//! @article{doe2020,
//!   title = {A {Systematic} Study},
//!   author = {Doe, Jane and van Gogh, Vincent},
//!   journal = {Journal of Studies},
//!   year = {2020}
//! }
//! "#;
//!
//! let entries = BibtexSource::new().parse(input).unwrap();
//! assert_eq!(entries[0].title.as_deref(), Some("A Systematic Study"));
//! assert_eq!(entries[0].authors[1].full_display, "van Gogh, Vincent");
//! ```

use biblatex::{Bibliography, Chunk, Entry, EntryType, Spanned};
use itertools::Itertools;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::regex::Regex;
use crate::utils::collapse_whitespace;
use crate::{BibliographicEntry, EntrySource, Person, Result, SlrError};

/// Start of an `@type{key,` block.
static BLOCK_START_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*@[ \t]*([A-Za-z]+)[ \t]*[{(][ \t\r\n]*([^,\s{}()]*)").unwrap()
});

/// Parser for BibTeX files.
#[derive(Debug, Clone, Default)]
pub struct BibtexSource;

impl BibtexSource {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Returns the blocks of `input` whose citation key is in `keys`.
    ///
    /// Entries are copied verbatim. `@string` and `@preamble` blocks are kept so
    /// the result still resolves its macros; `@comment` blocks and text between
    /// entries are dropped.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` if `input` is not valid BibTeX.
    pub fn retain_keys(&self, input: &str, keys: &HashSet<&str>) -> Result<String> {
        parse_bibliography(input)?;

        let starts: Vec<_> = BLOCK_START_REGEX
            .captures_iter(input)
            .filter_map(|caps| {
                let start = caps.get(0)?.start();
                let kind = caps.get(1)?.as_str().to_lowercase();
                let key = caps.get(2).map_or("", |m| m.as_str());
                Some((start, kind, key))
            })
            .collect();

        let mut blocks = Vec::new();
        for (i, (start, kind, key)) in starts.iter().enumerate() {
            let end = starts.get(i + 1).map_or(input.len(), |next| next.0);
            let keep = match kind.as_str() {
                "string" | "preamble" => true,
                "comment" => false,
                _ => keys.contains(key),
            };
            if keep {
                blocks.push(input[*start..end].trim());
            }
        }

        if blocks.is_empty() {
            return Ok(String::new());
        }
        Ok(format!("{}\n", blocks.join("\n\n")))
    }
}

impl EntrySource for BibtexSource {
    fn parse(&self, input: &str) -> Result<Vec<BibliographicEntry>> {
        let bibliography = parse_bibliography(input)?;
        let entries: Vec<_> = bibliography.iter().map(convert_entry).collect();
        tracing::debug!(entries = entries.len(), "parsed bibtex");
        Ok(entries)
    }
}

fn parse_bibliography(input: &str) -> Result<Bibliography> {
    Bibliography::parse(input).map_err(|e| SlrError::InvalidFormat(e.to_string()))
}

fn convert_entry(entry: &Entry) -> BibliographicEntry {
    let year = field(entry, "year").or_else(|| {
        field(entry, "date").and_then(|date| date.split('-').next().map(str::to_string))
    });

    BibliographicEntry {
        key: entry.key.clone(),
        entry_type: entry_type_name(&entry.entry_type),
        title: entry
            .title()
            .ok()
            .map(chunks_to_string)
            .filter(|t| !t.is_empty()),
        year,
        doi: field(entry, "doi"),
        booktitle: field(entry, "booktitle"),
        journal: field(entry, "journal").or_else(|| field(entry, "journaltitle")),
        authors: entry
            .author()
            .unwrap_or_default()
            .iter()
            .filter(|p| p.name != "others")
            .filter(|p| !p.name.is_empty() || !p.given_name.is_empty())
            .map(convert_person)
            .collect(),
    }
}

/// A field's flattened text, `None` when absent or blank.
fn field(entry: &Entry, name: &str) -> Option<String> {
    entry
        .get(name)
        .map(chunks_to_string)
        .filter(|value| !value.is_empty())
}

fn entry_type_name(entry_type: &EntryType) -> String {
    match entry_type {
        EntryType::Unknown(name) => name.to_lowercase(),
        known => format!("{:?}", known).to_lowercase(),
    }
}

fn chunks_to_string(chunks: &[Spanned<Chunk>]) -> String {
    let text: String = chunks
        .iter()
        .map(|c| match &c.v {
            Chunk::Normal(s) => s.as_str(),
            Chunk::Verbatim(s) => s.as_str(),
            Chunk::Math(s) => s.as_str(),
        })
        .collect();
    collapse_whitespace(&text)
}

/// Converts a parsed name into last names and a `"von Last, Jr, First"` display form.
fn convert_person(p: &biblatex::Person) -> Person {
    let last_names: Vec<&str> = p
        .prefix
        .split_whitespace()
        .chain(p.name.split_whitespace())
        .collect();
    let family = last_names.join(" ");
    let display = [family.as_str(), p.suffix.trim(), p.given_name.trim()]
        .iter()
        .filter(|part| !part.is_empty())
        .join(", ");

    Person::new(last_names, &display)
}
