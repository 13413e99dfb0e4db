//! Review configuration.
//!
//! A review is described by one JSON file:
//!
//! ```json
//! {
//!   "root_dir": "review",
//!   "articles_file_name": "articles.csv",
//!   "authors_file_name": "authors.csv",
//!   "references_folder": "references",
//!   "references_file_name": "references.bib",
//!   "dimensions": { "Year": ["L"], "Methodology": ["B", "BH"] },
//!   "table_dimensions": { "Methodology": "", "Domain": "" },
//!   "stacked_dimensions": [["Year", "Methodology"]],
//!   "geography_levels": { "Country": ["BH"] },
//!   "database_names": ["scopus", "ieee"]
//! }
//! ```
//!
//! Object keys keep the order in which they appear in the file. Only the keys
//! of `table_dimensions` are used. Collections that are left out are empty.

use serde::de::{self, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;
use std::fmt;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::chart::ChartKind;
use crate::{Result, SlrError};

/// Settings of one literature review.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SlrConfig {
    /// Directory every other path is resolved against
    pub root_dir: PathBuf,
    pub articles_file_name: String,
    pub authors_file_name: String,
    /// Folder holding the per-database `.bib` exports
    #[serde(default)]
    pub references_folder: String,
    /// The merged `.bib` file studies are reconciled from
    pub references_file_name: String,
    /// Dimension to chart kinds, in file order
    #[serde(default, deserialize_with = "ordered_map")]
    pub dimensions: Vec<(String, Vec<ChartKind>)>,
    /// Columns of the summary table, in file order
    #[serde(default, deserialize_with = "ordered_keys")]
    pub table_dimensions: Vec<String>,
    #[serde(default)]
    pub stacked_dimensions: Vec<(String, String)>,
    /// Authors-table column to chart kinds, in file order
    #[serde(default, deserialize_with = "ordered_map")]
    pub geography_levels: Vec<(String, Vec<ChartKind>)>,
    #[serde(default)]
    pub database_names: Vec<String>,
}

impl SlrConfig {
    /// Reads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read and `Config` if it is not a
    /// valid configuration.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: Self = content.parse()?;
        tracing::debug!(path = %path.display(), root = %config.root_dir.display(), "loaded configuration");
        Ok(config)
    }

    pub fn articles_path(&self) -> PathBuf {
        self.root_dir.join(&self.articles_file_name)
    }

    pub fn authors_path(&self) -> PathBuf {
        self.root_dir.join(&self.authors_file_name)
    }

    pub fn references_dir(&self) -> PathBuf {
        self.root_dir.join(&self.references_folder)
    }

    pub fn bibtex_path(&self) -> PathBuf {
        self.root_dir.join(&self.references_file_name)
    }
}

impl FromStr for SlrConfig {
    type Err = SlrError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

/// Deserializes a JSON object into `(key, value)` pairs, keeping key order.
fn ordered_map<'de, D, V>(deserializer: D) -> std::result::Result<Vec<(String, V)>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    struct OrderedMapVisitor<V>(PhantomData<V>);

    impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedMapVisitor<V> {
        type Value = Vec<(String, V)>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("an object")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
            let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((key, value)) = map.next_entry::<String, V>()? {
                if entries.iter().any(|(k, _): &(String, V)| *k == key) {
                    return Err(de::Error::custom(format!("duplicate key '{}'", key)));
                }
                entries.push((key, value));
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
}

/// Deserializes the keys of a JSON object, or the items of a list of names.
fn ordered_keys<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct KeysVisitor;

    impl<'de> Visitor<'de> for KeysVisitor {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("an object or a list of names")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
            let mut keys = Vec::new();
            while let Some((key, IgnoredAny)) = map.next_entry::<String, IgnoredAny>()? {
                keys.push(key);
            }
            Ok(keys)
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Self::Value, A::Error> {
            let mut keys = Vec::new();
            while let Some(key) = seq.next_element::<String>()? {
                keys.push(key);
            }
            Ok(keys)
        }
    }

    deserializer.deserialize_any(KeysVisitor)
}
