// Wire types for backend-issued chart blueprints.
//
// The blueprint generator is not consistent about whether a column
// reference arrives as a bare string or a one-element sequence, and
// optional blocks (datasets, options) may be missing outright. Every
// field here is therefore deserialization-tolerant; validation happens
// in the resolution engine, not in serde.

use serde::Deserialize;

/// A reference to a data column, as either `"city"` or `["city"]`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ColumnRef {
    Name(String),
    Names(Vec<String>),
}

impl ColumnRef {
    /// Normalize both shapes to the referenced column name.
    /// An empty sequence carries no reference at all.
    pub fn key(&self) -> Option<&str> {
        match self {
            ColumnRef::Name(name) => Some(name.as_str()),
            ColumnRef::Names(names) => names.first().map(|name| name.as_str()),
        }
    }
}

/// One series of the desired chart: a value-column reference plus
/// display styling that passes through unmodified.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SeriesSpec {
    #[serde(default)]
    pub label: Option<String>,
    pub data: ColumnRef,
    #[serde(default, rename = "backgroundColor")]
    pub background_color: Option<String>,
    #[serde(default, rename = "borderColor")]
    pub border_color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BlueprintData {
    #[serde(default)]
    pub labels: Option<ColumnRef>,
    #[serde(default)]
    pub datasets: Vec<SeriesSpec>,
}

/// A backend-issued description of a desired chart, not yet bound to
/// concrete data.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChartBlueprint {
    /// Chart kind identifier (bar, line, pie, ...). Opaque to the
    /// resolution engine; the rendering sink interprets it.
    #[serde(default = "default_kind", rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: BlueprintData,
    #[serde(default)]
    pub options: Option<ChartOptions>,
}

fn default_kind() -> String {
    "bar".to_string()
}

/// Rendering options passed through to the sink, with "responsive,
/// fill available container" semantics injected when absent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartOptions {
    #[serde(default = "default_responsive")]
    pub responsive: bool,
    #[serde(default)]
    pub maintain_aspect_ratio: bool,
    #[serde(default)]
    pub title: Option<TitleOptions>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TitleOptions {
    #[serde(default = "default_display")]
    pub display: bool,
    #[serde(default)]
    pub text: String,
}

fn default_responsive() -> bool {
    true
}

fn default_display() -> bool {
    true
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            responsive: true,
            maintain_aspect_ratio: false,
            title: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_column_ref_scalar_and_sequence() {
        let scalar: ColumnRef = serde_json::from_value(json!("city")).unwrap();
        let sequence: ColumnRef = serde_json::from_value(json!(["city"])).unwrap();
        assert_eq!(scalar.key(), Some("city"));
        assert_eq!(sequence.key(), Some("city"));
    }

    #[test]
    fn test_column_ref_empty_sequence_has_no_key() {
        let empty: ColumnRef = serde_json::from_value(json!([])).unwrap();
        assert_eq!(empty.key(), None);
    }

    #[test]
    fn test_blueprint_full_shape() {
        let blueprint: ChartBlueprint = serde_json::from_value(json!({
            "type": "bar",
            "data": {
                "labels": ["city"],
                "datasets": [
                    {"label": "Sales", "data": ["sales"], "backgroundColor": "#336699"}
                ]
            },
            "options": {"responsive": false, "title": {"text": "Sales by city"}}
        }))
        .unwrap();

        assert_eq!(blueprint.kind, "bar");
        assert_eq!(
            blueprint.data.labels.as_ref().and_then(ColumnRef::key),
            Some("city")
        );
        assert_eq!(blueprint.data.datasets.len(), 1);
        let options = blueprint.options.unwrap();
        assert!(!options.responsive);
        let title = options.title.unwrap();
        assert!(title.display);
        assert_eq!(title.text, "Sales by city");
    }

    #[test]
    fn test_blueprint_sparse_shape() {
        let blueprint: ChartBlueprint = serde_json::from_value(json!({})).unwrap();
        assert_eq!(blueprint.kind, "bar");
        assert!(blueprint.data.labels.is_none());
        assert!(blueprint.data.datasets.is_empty());
        assert!(blueprint.options.is_none());
    }

    #[test]
    fn test_options_defaults() {
        let options = ChartOptions::default();
        assert!(options.responsive);
        assert!(!options.maintain_aspect_ratio);

        let parsed: ChartOptions = serde_json::from_value(json!({})).unwrap();
        assert_eq!(parsed, options);
    }
}
