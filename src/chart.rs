//! Chart requests for an external renderer.
//!
//! Rendering itself is done by a [`PresentationSink`]. The functions here
//! compute the frequency tables for every configured dimension, hand one
//! request per chart kind to the sink, and collect per-dimension failures into
//! a [`ChartRun`] instead of stopping.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::dimension::{
    CountTable, StackedCountTable, TableOrder, count_dimension, count_geography,
    count_stacked_dimension,
};
use crate::registry::Registry;
use crate::{Result, SlrError};

/// Chart types a renderer must support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChartKind {
    #[serde(rename = "B")]
    Bar,
    #[serde(rename = "BH")]
    HorizontalBar,
    #[serde(rename = "P")]
    Pie,
    #[serde(rename = "L")]
    Line,
}

impl ChartKind {
    /// Table order the chart is drawn with, given the dimension's default order.
    pub fn order(&self, default: TableOrder) -> TableOrder {
        match self {
            ChartKind::HorizontalBar => TableOrder::AscendingFrequency,
            _ => default,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ChartKind::Bar => "B",
            ChartKind::HorizontalBar => "BH",
            ChartKind::Pie => "P",
            ChartKind::Line => "L",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One frequency chart to render.
#[derive(Debug, Clone, Copy)]
pub struct ChartRequest<'a> {
    /// Dimension or geography level shown on the chart
    pub label: &'a str,
    pub table: &'a CountTable,
    pub kind: ChartKind,
    /// Number of studies in the registry (`n` in chart titles)
    pub studies: usize,
}

impl ChartRequest<'_> {
    /// Suggested output file stem, e.g. `Methodology_freq`.
    pub fn file_stem(&self) -> String {
        format!("{}_freq", self.label)
    }
}

/// One stacked bar chart to render.
#[derive(Debug, Clone, Copy)]
pub struct StackedChartRequest<'a> {
    pub primary: &'a str,
    pub secondary: &'a str,
    pub table: &'a StackedCountTable,
    pub studies: usize,
}

impl StackedChartRequest<'_> {
    pub fn file_stem(&self) -> String {
        format!("{}_{}_freq", self.primary, self.secondary)
    }
}

/// A renderer that persists one artifact per request.
pub trait PresentationSink {
    fn render_counts(&mut self, request: ChartRequest<'_>) -> Result<()>;

    fn render_stacked(&mut self, request: StackedChartRequest<'_>) -> Result<()>;
}

/// End-of-run summary of a chart run.
#[derive(Debug, Default)]
pub struct ChartRun {
    /// Number of requests the sink accepted
    pub rendered: usize,
    /// Labels that were skipped or failed, with the reason
    pub skipped: Vec<(String, SlrError)>,
}

impl ChartRun {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }

    fn skip(&mut self, label: &str, error: SlrError) {
        tracing::warn!(label, %error, "chart skipped");
        self.skipped.push((label.to_string(), error));
    }

    fn render(&mut self, sink: &mut dyn PresentationSink, request: ChartRequest<'_>) {
        match sink.render_counts(request) {
            Ok(()) => self.rendered += 1,
            Err(error) => self.skip(request.label, error),
        }
    }
}

/// Renders every configured dimension with each of its chart kinds.
pub fn render_dimension_charts(
    registry: &Registry,
    dimensions: &[(String, Vec<ChartKind>)],
    sink: &mut dyn PresentationSink,
) -> ChartRun {
    let mut run = ChartRun::default();

    for (dimension, kinds) in dimensions {
        let table = match count_dimension(registry, dimension) {
            Ok(table) => table,
            Err(error) => {
                run.skip(dimension, error);
                continue;
            }
        };
        let default = TableOrder::for_dimension(dimension);

        for &kind in kinds {
            let table = table.ordered(kind.order(default));
            run.render(
                sink,
                ChartRequest {
                    label: dimension,
                    table: &table,
                    kind,
                    studies: registry.len(),
                },
            );
        }
    }

    tracing::info!(rendered = run.rendered, skipped = run.skipped.len(), "dimension charts done");
    run
}

/// Renders one stacked bar chart per `(primary, secondary)` pair.
pub fn render_stacked_charts(
    registry: &Registry,
    pairs: &[(String, String)],
    sink: &mut dyn PresentationSink,
) -> ChartRun {
    let mut run = ChartRun::default();

    for (primary, secondary) in pairs {
        let label = format!("{}/{}", primary, secondary);
        let table = match count_stacked_dimension(registry, primary, secondary) {
            Ok(table) => table,
            Err(error) => {
                run.skip(&label, error);
                continue;
            }
        };
        let request = StackedChartRequest {
            primary,
            secondary,
            table: &table,
            studies: registry.len(),
        };
        match sink.render_stacked(request) {
            Ok(()) => run.rendered += 1,
            Err(error) => run.skip(&label, error),
        }
    }

    tracing::info!(rendered = run.rendered, skipped = run.skipped.len(), "stacked charts done");
    run
}

/// Renders every configured geography level with each of its chart kinds.
pub fn render_geography_charts(
    registry: &Registry,
    levels: &[(String, Vec<ChartKind>)],
    sink: &mut dyn PresentationSink,
) -> ChartRun {
    let mut run = ChartRun::default();

    for (level, kinds) in levels {
        let table = match count_geography(registry, level) {
            Ok(table) => table,
            Err(error) => {
                run.skip(level, error);
                continue;
            }
        };

        for &kind in kinds {
            run.render(
                sink,
                ChartRequest {
                    label: level,
                    table: &table,
                    kind,
                    studies: registry.len(),
                },
            );
        }
    }

    tracing::info!(rendered = run.rendered, skipped = run.skipped.len(), "geography charts done");
    run
}
