use std::collections::HashMap;
use tracing::debug;

use crate::blueprint::{ChartBlueprint, ChartOptions, ColumnRef};
use crate::data::{cell, RowSet};
use crate::error::ResolveError;
use crate::palette::ColorPalette;

/// Row-count ceiling under which a fully-populated value column is
/// treated as already aggregated (e.g. by a prior GROUP BY). At or
/// above it the engine always groups, since one chart point per raw
/// row is never valid at scale.
pub const RAW_MODE_MAX_ROWS: usize = 500;

/// Value-column key that switches a series to counting mode.
const COUNT_KEY: &str = "count";

/// How a series' values are derived from the rows. Decided once per
/// series during normalization, never re-inspected afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationMode {
    /// Rows are one-per-category already; summing passes them through.
    Raw,
    /// Multiple rows may share a category; values are summed per label.
    Sum,
    /// Series value is the number of rows sharing each label.
    Count,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSeries {
    pub name: String,
    pub values: Vec<f64>,
    pub color: String,
    pub mode: AggregationMode,
}

/// A blueprint with its column references replaced by materialized
/// label and value arrays, ready for the rendering sink. Constructed
/// once per request and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedChart {
    pub kind: String,
    pub labels: Vec<String>,
    pub series: Vec<ResolvedSeries>,
    pub options: ChartOptions,
}

/// Resolve a blueprint against raw result rows.
///
/// `Ok(None)` is the defined no-op for an empty row set: no chart is
/// produced and the caller shows its empty-state message instead.
pub fn resolve(
    blueprint: &ChartBlueprint,
    rows: &RowSet,
) -> Result<Option<ResolvedChart>, ResolveError> {
    if rows.is_empty() {
        return Ok(None);
    }

    // 1. Key extraction. Both reference shapes normalize through
    //    ColumnRef::key before any lookup.
    let label_key = blueprint
        .data
        .labels
        .as_ref()
        .and_then(ColumnRef::key)
        .ok_or_else(|| ResolveError::MalformedBlueprint {
            reason: "blueprint carries no label column reference".to_string(),
        })?;

    if blueprint.data.datasets.is_empty() {
        return Err(ResolveError::MalformedBlueprint {
            reason: "blueprint carries no datasets".to_string(),
        });
    }

    if !rows.rows.iter().any(|row| cell(row, label_key).is_some()) {
        return Err(ResolveError::MissingColumn {
            column: label_key.to_string(),
        });
    }

    // 2. Labels in first-encountered order, shared by every series so
    //    index i always describes the same category.
    let (labels, label_index) = collect_labels(rows, label_key);

    let palette = ColorPalette::category10();
    let mut series = Vec::with_capacity(blueprint.data.datasets.len());
    for (series_idx, spec) in blueprint.data.datasets.iter().enumerate() {
        let value_key =
            spec.data
                .key()
                .ok_or_else(|| ResolveError::MalformedBlueprint {
                    reason: format!("dataset {series_idx} carries no value column reference"),
                })?;

        let mode = decide_mode(value_key, rows);
        debug!(series = value_key, ?mode, rows = rows.len(), "aggregation mode decided");

        let values = accumulate(rows, label_key, value_key, &label_index, labels.len(), mode);

        let name = spec
            .label
            .clone()
            .unwrap_or_else(|| value_key.to_string());
        let color = spec
            .background_color
            .clone()
            .or_else(|| spec.border_color.clone())
            .unwrap_or_else(|| palette.color_for(series_idx));

        series.push(ResolvedSeries {
            name,
            values,
            color,
            mode,
        });
    }

    // 3. Defensive invariant: every series aligns with the labels.
    for resolved in &series {
        if resolved.values.len() != labels.len() {
            return Err(ResolveError::InternalInconsistency {
                detail: format!(
                    "series '{}' resolved {} values against {} labels",
                    resolved.name,
                    resolved.values.len(),
                    labels.len()
                ),
            });
        }
    }

    Ok(Some(ResolvedChart {
        kind: blueprint.kind.clone(),
        labels,
        series,
        options: blueprint.options.clone().unwrap_or_default(),
    }))
}

/// Collect distinct label values in first-seen order, plus the index
/// of each label for the accumulation pass.
fn collect_labels(rows: &RowSet, label_key: &str) -> (Vec<String>, HashMap<String, usize>) {
    let mut labels = Vec::new();
    let mut index = HashMap::new();
    for row in &rows.rows {
        let label = display_label(cell(row, label_key));
        if !index.contains_key(&label) {
            index.insert(label.clone(), labels.len());
            labels.push(label);
        }
    }
    (labels, index)
}

/// Choose the aggregation mode for one series.
fn decide_mode(value_key: &str, rows: &RowSet) -> AggregationMode {
    if value_key.eq_ignore_ascii_case(COUNT_KEY) {
        return AggregationMode::Count;
    }

    let every_row_has_value = rows
        .rows
        .iter()
        .all(|row| matches!(cell(row, value_key), Some(value) if !value.is_null()));

    if every_row_has_value && rows.len() < RAW_MODE_MAX_ROWS {
        AggregationMode::Raw
    } else {
        AggregationMode::Sum
    }
}

/// Fold rows into one value per label. Raw and Sum share the same
/// accumulation: summation is idempotent on already-unique labels, so
/// pre-aggregated data passes through unchanged.
fn accumulate(
    rows: &RowSet,
    label_key: &str,
    value_key: &str,
    label_index: &HashMap<String, usize>,
    label_count: usize,
    mode: AggregationMode,
) -> Vec<f64> {
    let mut values = vec![0.0; label_count];
    for row in &rows.rows {
        let label = display_label(cell(row, label_key));
        let Some(&idx) = label_index.get(&label) else {
            continue;
        };
        match mode {
            AggregationMode::Count => values[idx] += 1.0,
            AggregationMode::Raw | AggregationMode::Sum => {
                values[idx] += coerce_numeric(cell(row, value_key), value_key);
            }
        }
    }
    values
}

/// Best-effort numeric coercion: unparseable or missing cells become
/// zero so a single malformed cell cannot abort the whole chart.
fn coerce_numeric(value: Option<&serde_json::Value>, column: &str) -> f64 {
    use serde_json::Value;
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or_else(|_| {
            debug!(column, cell = %s, "non-numeric cell coerced to 0");
            0.0
        }),
        Some(Value::Bool(b)) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

/// Display form of a label cell. Grouping identity is this stringified
/// form, so numerically-equal labels with different formatting stay
/// distinct categories.
fn display_label(value: Option<&serde_json::Value>) -> String {
    use serde_json::Value;
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Null) | None => "null".to_string(),
        Some(other) => other.to_string(),
    }
}
