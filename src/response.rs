// The reply envelope the analysis backend sends for each prompt.
//
// Field placement has drifted across backend revisions: the chart
// blueprint and summary sometimes sit under an "analysis" object and
// sometimes at the top level. The accessors below accept both, so the
// rest of the pipeline never cares which revision produced a reply.

use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;

use crate::blueprint::ChartBlueprint;
use crate::data::RowSet;
use crate::error::ResolveError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentReply {
    #[serde(default)]
    pub sql: Option<String>,
    #[serde(default)]
    pub results: Option<Value>,
    #[serde(default)]
    pub analysis: Option<Analysis>,
    #[serde(default)]
    pub chat_response: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub chart_config: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Analysis {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub chart_config: Option<Value>,
}

impl AgentReply {
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// The chart blueprint, wherever this revision put it. A present
    /// but unparseable blueprint is a malformed blueprint, not a
    /// deserialization failure of the whole reply.
    pub fn blueprint(&self) -> Result<Option<ChartBlueprint>, ResolveError> {
        let raw = self
            .analysis
            .as_ref()
            .and_then(|analysis| analysis.chart_config.as_ref())
            .or(self.chart_config.as_ref());

        match raw {
            None => Ok(None),
            Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone()).map(Some).map_err(|e| {
                ResolveError::MalformedBlueprint {
                    reason: e.to_string(),
                }
            }),
        }
    }

    /// Result rows; a reply without results reads as an empty set.
    pub fn rows(&self) -> Result<RowSet> {
        match &self.results {
            Some(value) => RowSet::from_json(value),
            None => Ok(RowSet::default()),
        }
    }

    /// The text to show in the transcript for this reply.
    pub fn summary_text(&self) -> Option<&str> {
        self.analysis
            .as_ref()
            .and_then(|analysis| analysis.summary.as_deref())
            .or(self.summary.as_deref())
            .or(self.chat_response.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_blueprint_and_summary() {
        let reply: AgentReply = serde_json::from_value(json!({
            "sql": "SELECT city, SUM(sales) FROM sales GROUP BY city",
            "results": [{"city": "NY", "sales": 15}],
            "analysis": {
                "summary": "NY leads on sales.",
                "chart_config": {
                    "type": "bar",
                    "data": {"labels": "city", "datasets": [{"data": "sales"}]}
                }
            }
        }))
        .unwrap();

        assert_eq!(reply.summary_text(), Some("NY leads on sales."));
        let blueprint = reply.blueprint().unwrap().unwrap();
        assert_eq!(blueprint.kind, "bar");
        assert_eq!(reply.rows().unwrap().len(), 1);
    }

    #[test]
    fn test_top_level_blueprint() {
        let reply: AgentReply = serde_json::from_value(json!({
            "summary": "Top-level revision.",
            "chart_config": {
                "type": "line",
                "data": {"labels": ["month"], "datasets": [{"data": ["revenue"]}]}
            }
        }))
        .unwrap();

        assert_eq!(reply.summary_text(), Some("Top-level revision."));
        assert_eq!(reply.blueprint().unwrap().unwrap().kind, "line");
    }

    #[test]
    fn test_null_blueprint_reads_as_absent() {
        let reply: AgentReply = serde_json::from_value(json!({
            "analysis": {"summary": "Nothing to chart.", "chart_config": null}
        }))
        .unwrap();
        assert_eq!(reply.blueprint().unwrap(), None);
    }

    #[test]
    fn test_unparseable_blueprint_is_malformed() {
        let reply: AgentReply = serde_json::from_value(json!({
            "chart_config": {"type": "bar", "data": {"labels": 42}}
        }))
        .unwrap();
        assert!(matches!(
            reply.blueprint().unwrap_err(),
            ResolveError::MalformedBlueprint { .. }
        ));
    }

    #[test]
    fn test_chat_response_fallback() {
        let reply: AgentReply = serde_json::from_value(json!({
            "chat_response": "This table stores daily sales."
        }))
        .unwrap();
        assert_eq!(reply.summary_text(), Some("This table stores daily sales."));
        assert!(reply.rows().unwrap().is_empty());
    }
}
