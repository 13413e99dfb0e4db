//! LaTeX table rendering.
//!
//! Two `tabular` environments are produced from the registry: an information
//! table listing every study, and a summary table that abbreviates each
//! study's dimension labels through one [`AcronymTable`].

use itertools::Itertools;

use crate::acronym::AcronymTable;
use crate::registry::Registry;
use crate::utils::escape_latex;
use crate::SlrError;

/// Result of rendering the summary table.
#[derive(Debug)]
pub struct SummaryTable {
    /// The `tabular` environment
    pub latex: String,
    /// Acronyms assigned while rendering; the legend of the table
    pub acronyms: AcronymTable,
    /// Dimensions left out of the table and why
    pub skipped: Vec<(String, SlrError)>,
}

/// Renders the study information table (study, year, citation, title, publication).
pub fn information_table(registry: &Registry) -> String {
    let mut out = String::new();
    out.push_str("\\begin{tabular}{lllll}\n");
    out.push_str("\\toprule\n");
    out.push_str("Study & Year & Citation & Title & Publication \\\\[0.1cm]\n");
    out.push_str("\\midrule\n");

    for study in registry.studies() {
        out.push_str(&format!(
            "{} & {} & \\cite{{{}}} & {} & {} \\\\[0.2cm]\n",
            study.study_id,
            study.year,
            study.citation_key,
            escape_latex(&study.title),
            escape_latex(&study.publication),
        ));
    }

    out.push_str("\\bottomrule\n");
    out.push_str("\\end{tabular}\n");
    out
}

/// Renders the dimension summary table.
///
/// Each cell lists the study's labels for one dimension as sorted acronyms.
/// Dimensions missing from the registry are skipped and reported.
pub fn summary_table(registry: &Registry, dimensions: &[String]) -> SummaryTable {
    let mut skipped = Vec::new();
    let columns: Vec<&str> = dimensions
        .iter()
        .filter(|dimension| {
            let present = registry.has_study_column(dimension);
            if !present {
                tracing::warn!(dimension = %dimension, "dimension is missing, leaving it out of the summary table");
                skipped.push((
                    dimension.to_string(),
                    SlrError::DimensionNotFound(dimension.to_string()),
                ));
            }
            present
        })
        .map(String::as_str)
        .collect();

    let mut acronyms = AcronymTable::new();
    let mut out = String::new();
    out.push_str(&format!("\\begin{{tabular}}{{{}}}\n", "l".repeat(columns.len() + 1)));
    out.push_str("\\toprule\n");
    out.push_str(&format!("Study & {}\\\\[0.1cm]\n", columns.iter().join(" & ")));
    out.push_str("\\midrule\n");

    for study in registry.studies() {
        let mut cells = vec![format!("\\cite{{{}}}", study.citation_key)];
        for &dimension in &columns {
            let cell = study.column(dimension).unwrap_or_default();
            let mut tokens: Vec<_> = cell
                .split(',')
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(|value| acronyms.acronym(dimension, value))
                .collect();
            tokens.sort();
            cells.push(tokens.iter().join(", "));
        }
        out.push_str(&format!("{} \\\\[0.2cm]\n", cells.join(" & ")));
    }

    out.push_str("\\bottomrule\n");
    out.push_str("\\end{tabular}\n");

    SummaryTable {
        latex: out,
        acronyms,
        skipped,
    }
}
