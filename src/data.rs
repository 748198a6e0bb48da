use anyhow::{anyhow, Result};
use serde_json::{Map, Value};
use std::io::Read;

/// One result row: column name -> scalar value.
pub type Row = Map<String, Value>;

/// An ordered sequence of rows sharing (loosely) the same columns.
/// Rows are not forced onto a common schema; a column absent from a
/// row simply reads as null.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    /// Column names in first-observed order, for table display.
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl RowSet {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Create a RowSet from a JSON array of objects (the shape the
    /// backend's `results` field carries).
    pub fn from_json(value: &Value) -> Result<Self> {
        let array = value
            .as_array()
            .ok_or_else(|| anyhow!("Result rows must be a JSON array of objects"))?;

        let mut columns: Vec<String> = Vec::new();
        let mut rows = Vec::new();
        for item in array {
            let obj = item
                .as_object()
                .ok_or_else(|| anyhow!("Items in the row array must be objects"))?;
            for key in obj.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
            rows.push(obj.clone());
        }

        Ok(Self { columns, rows })
    }

    /// Create a RowSet from CSV with a header row. Cells are kept as
    /// strings; numeric coercion happens downstream.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let columns: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(|h| h.to_string())
            .collect();

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            let mut row = Row::new();
            for (idx, column) in columns.iter().enumerate() {
                let cell = record.get(idx).unwrap_or("");
                row.insert(column.clone(), Value::String(cell.to_string()));
            }
            rows.push(row);
        }

        Ok(Self { columns, rows })
    }

    /// Serialize back to the JSON array-of-objects wire shape.
    pub fn to_json(&self) -> Value {
        Value::Array(self.rows.iter().cloned().map(Value::Object).collect())
    }
}

/// Look up a cell by column name. Exact match first, then
/// case-insensitive, mirroring how column references are matched
/// against headers elsewhere in the pipeline.
pub fn cell<'a>(row: &'a Row, column: &str) -> Option<&'a Value> {
    row.get(column).or_else(|| {
        row.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(column))
            .map(|(_, value)| value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_collects_columns_in_order() {
        let rows = RowSet::from_json(&json!([
            {"city": "NY", "sales": 10},
            {"city": "LA", "sales": 7, "region": "west"},
        ]))
        .unwrap();
        assert_eq!(rows.columns, vec!["city", "sales", "region"]);
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_from_json_accepts_empty_array() {
        let rows = RowSet::from_json(&json!([])).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_from_json_rejects_non_array() {
        assert!(RowSet::from_json(&json!({"city": "NY"})).is_err());
        assert!(RowSet::from_json(&json!([1, 2])).is_err());
    }

    #[test]
    fn test_from_csv_reader() {
        let csv = "city,sales\nNY,10\nLA,7\n";
        let rows = RowSet::from_csv_reader(csv.as_bytes()).unwrap();
        assert_eq!(rows.columns, vec!["city", "sales"]);
        assert_eq!(rows.len(), 2);
        assert_eq!(
            cell(&rows.rows[0], "sales"),
            Some(&Value::String("10".to_string()))
        );
    }

    #[test]
    fn test_cell_is_case_insensitive() {
        let rows = RowSet::from_json(&json!([{"City": "NY"}])).unwrap();
        assert_eq!(
            cell(&rows.rows[0], "city"),
            Some(&Value::String("NY".to_string()))
        );
        assert_eq!(cell(&rows.rows[0], "sales"), None);
    }

    #[test]
    fn test_to_json_round_trips() {
        let value = json!([{"a": 1}, {"a": 2, "b": null}]);
        let rows = RowSet::from_json(&value).unwrap();
        assert_eq!(rows.to_json(), value);
    }
}
