//! Chart data contracts and per-type structural validation.
//!
//! The text model emits chart payloads as JSON. That output is untrusted:
//! a [`ChartData`] can only be constructed through [`ChartData::from_value`],
//! which checks the required keys for the requested [`DataType`] and that
//! every array-valued field actually is an array. Validation errors name the
//! offending key so the message survives into the dead-letter queue intact.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Kind of chart a work item asks for.
///
/// The snake_case string forms are the stable wire vocabulary shared with
/// callers and persisted in DLQ records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    BarChart,
    MultiSeriesBar,
    LineGraph,
    DataTable,
}

impl DataType {
    /// All supported data types, in round-robin order.
    pub const ALL: [DataType; 4] = [
        DataType::BarChart,
        DataType::MultiSeriesBar,
        DataType::LineGraph,
        DataType::DataTable,
    ];

    /// Stable string form used on the wire and in the DLQ.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::BarChart => "bar_chart",
            DataType::MultiSeriesBar => "multi_series_bar",
            DataType::LineGraph => "line_graph",
            DataType::DataTable => "data_table",
        }
    }

    /// Human-readable label used in prompts.
    pub fn label(&self) -> &'static str {
        match self {
            DataType::BarChart => "bar chart",
            DataType::MultiSeriesBar => "multi-series bar chart",
            DataType::LineGraph => "line graph",
            DataType::DataTable => "data table",
        }
    }

    /// Required top-level keys for this data type, paired with whether the
    /// key must hold an array.
    fn required_keys(&self) -> &'static [(&'static str, bool)] {
        match self {
            DataType::BarChart => &[
                ("title", false),
                ("categories", true),
                ("values", true),
                ("yAxisLabel", false),
            ],
            DataType::MultiSeriesBar => &[
                ("title", false),
                ("categories", true),
                ("series", true),
                ("yAxisLabel", false),
            ],
            DataType::LineGraph => &[
                ("title", false),
                ("xValues", true),
                ("series", true),
                ("xAxisLabel", false),
                ("yAxisLabel", false),
            ],
            DataType::DataTable => &[("title", false), ("columns", true), ("rows", true)],
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DataType {
    type Err = ChartDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bar_chart" => Ok(DataType::BarChart),
            "multi_series_bar" => Ok(DataType::MultiSeriesBar),
            "line_graph" => Ok(DataType::LineGraph),
            "data_table" => Ok(DataType::DataTable),
            other => Err(ChartDataError::UnknownDataType(other.to_string())),
        }
    }
}

/// Errors produced by chart data validation.
#[derive(Debug, Error)]
pub enum ChartDataError {
    #[error("chart data is not a JSON object")]
    NotAnObject,

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("field '{0}' must be an array")]
    NotAnArray(&'static str),

    #[error("field 'title' must be a non-empty string")]
    InvalidTitle,

    #[error("unknown data type '{0}'")]
    UnknownDataType(String),
}

/// A validated chart payload.
///
/// The raw JSON shape is kept verbatim: it is re-serialized into the question
/// prompt and into DLQ records exactly as the model produced it. Accessors
/// guaranteed by the validator (`title`) borrow from the stored value.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartData {
    data_type: DataType,
    value: Value,
}

impl ChartData {
    /// Validates `value` against the structural requirements of `data_type`
    /// and wraps it on success.
    pub fn from_value(data_type: DataType, value: Value) -> Result<Self, ChartDataError> {
        let obj = value.as_object().ok_or(ChartDataError::NotAnObject)?;

        for (key, must_be_array) in data_type.required_keys() {
            match obj.get(*key) {
                None => return Err(ChartDataError::MissingField(key)),
                Some(v) if *must_be_array && !v.is_array() => {
                    return Err(ChartDataError::NotAnArray(key));
                }
                Some(_) => {}
            }
        }

        match obj.get("title").and_then(Value::as_str) {
            Some(t) if !t.trim().is_empty() => {}
            _ => return Err(ChartDataError::InvalidTitle),
        }

        Ok(Self { data_type, value })
    }

    /// The data type this payload was validated against.
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Chart title, guaranteed present by the validator.
    pub fn title(&self) -> &str {
        self.value
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Borrows the raw validated JSON.
    pub fn as_value(&self) -> &Value {
        &self.value
    }

    /// Consumes the wrapper, returning the raw JSON for persistence.
    pub fn into_value(self) -> Value {
        self.value
    }

    /// Compact JSON text of the payload, as fed into prompts.
    pub fn to_json(&self) -> String {
        self.value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bar_chart_fixture() -> Value {
        json!({
            "title": "Test",
            "categories": ["A", "B"],
            "values": [1, 2],
            "yAxisLabel": "Y"
        })
    }

    #[test]
    fn test_data_type_round_trip() {
        for dt in DataType::ALL {
            assert_eq!(dt.as_str().parse::<DataType>().unwrap(), dt);
        }
        assert!(matches!(
            "pie_chart".parse::<DataType>(),
            Err(ChartDataError::UnknownDataType(_))
        ));
    }

    #[test]
    fn test_bar_chart_accepts_well_formed() {
        let chart = ChartData::from_value(DataType::BarChart, bar_chart_fixture()).unwrap();
        assert_eq!(chart.data_type(), DataType::BarChart);
        assert_eq!(chart.title(), "Test");
    }

    #[test]
    fn test_missing_field_named_in_error() {
        let mut v = bar_chart_fixture();
        v.as_object_mut().unwrap().remove("categories");
        let err = ChartData::from_value(DataType::BarChart, v).unwrap_err();
        assert_eq!(err.to_string(), "missing required field 'categories'");
    }

    #[test]
    fn test_array_field_must_be_array() {
        let mut v = bar_chart_fixture();
        v["values"] = json!("not an array");
        let err = ChartData::from_value(DataType::BarChart, v).unwrap_err();
        assert_eq!(err.to_string(), "field 'values' must be an array");
    }

    #[test]
    fn test_non_object_rejected() {
        let err = ChartData::from_value(DataType::BarChart, json!([1, 2])).unwrap_err();
        assert!(matches!(err, ChartDataError::NotAnObject));
    }

    #[test]
    fn test_empty_title_rejected() {
        let mut v = bar_chart_fixture();
        v["title"] = json!("  ");
        let err = ChartData::from_value(DataType::BarChart, v).unwrap_err();
        assert!(matches!(err, ChartDataError::InvalidTitle));
    }

    #[test]
    fn test_line_graph_required_keys() {
        let good = json!({
            "title": "Rainfall",
            "xValues": ["Jan", "Feb"],
            "series": [{"name": "2024", "values": [3.1, 2.8]}],
            "xAxisLabel": "Month",
            "yAxisLabel": "Inches"
        });
        assert!(ChartData::from_value(DataType::LineGraph, good.clone()).is_ok());

        for key in ["xValues", "series", "xAxisLabel", "yAxisLabel"] {
            let mut v = good.clone();
            v.as_object_mut().unwrap().remove(key);
            assert!(
                ChartData::from_value(DataType::LineGraph, v).is_err(),
                "expected rejection when '{key}' is missing"
            );
        }
    }

    #[test]
    fn test_data_table_required_keys() {
        let good = json!({
            "title": "Populations",
            "columns": ["City", "Population"],
            "rows": [["Springfield", 120000]]
        });
        assert!(ChartData::from_value(DataType::DataTable, good.clone()).is_ok());

        let mut v = good;
        v["rows"] = json!({"bad": true});
        let err = ChartData::from_value(DataType::DataTable, v).unwrap_err();
        assert_eq!(err.to_string(), "field 'rows' must be an array");
    }

    #[test]
    fn test_json_text_preserves_payload() {
        let chart = ChartData::from_value(DataType::BarChart, bar_chart_fixture()).unwrap();
        let reparsed: Value = serde_json::from_str(&chart.to_json()).unwrap();
        assert_eq!(reparsed, bar_chart_fixture());
    }
}
