//! Query parameters, result rows and the BigQuery REST wire format

use crate::error::WarehouseError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Named query parameter
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParameter {
    pub name: String,
    pub value: ParameterValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    Int64(i64),
    Int64Array(Vec<i64>),
}

impl QueryParameter {
    pub fn int64(name: &str, value: i64) -> Self {
        Self {
            name: name.to_string(),
            value: ParameterValue::Int64(value),
        }
    }

    pub fn int64_array(name: &str, values: &[i64]) -> Self {
        Self {
            name: name.to_string(),
            value: ParameterValue::Int64Array(values.to_vec()),
        }
    }
}

/// One result row, columns in select order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row(pub IndexMap<String, Value>);

impl Row {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column).filter(|v| !v.is_null())
    }

    pub fn get_i64(&self, column: &str) -> Result<Option<i64>, WarehouseError> {
        match self.get(column) {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_i64()
                .map(Some)
                .ok_or_else(|| decode_error(column, "integer")),
            Some(Value::String(s)) => s
                .parse::<i64>()
                .map(Some)
                .map_err(|_| decode_error(column, "integer")),
            Some(_) => Err(decode_error(column, "integer")),
        }
    }

    pub fn get_f64(&self, column: &str) -> Result<Option<f64>, WarehouseError> {
        match self.get(column) {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_f64()
                .map(Some)
                .ok_or_else(|| decode_error(column, "float")),
            // BigQuery spells these out as strings
            Some(Value::String(s)) => match s.as_str() {
                "NaN" => Ok(Some(f64::NAN)),
                "Infinity" => Ok(Some(f64::INFINITY)),
                "-Infinity" => Ok(Some(f64::NEG_INFINITY)),
                _ => s
                    .parse::<f64>()
                    .map(Some)
                    .map_err(|_| decode_error(column, "float")),
            },
            Some(_) => Err(decode_error(column, "float")),
        }
    }

    pub fn get_string(&self, column: &str) -> Result<Option<String>, WarehouseError> {
        match self.get(column) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Ok(Some(other.to_string())),
        }
    }
}

fn decode_error(column: &str, expected: &str) -> WarehouseError {
    WarehouseError::Decode(format!("column '{}' is not a valid {}", column, expected))
}

/// Body of `POST /projects/{project}/queries`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub query: String,
    pub use_legacy_sql: bool,
    pub parameter_mode: String,
    pub query_parameters: Vec<WireParameter>,
    pub timeout_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireParameter {
    pub name: String,
    pub parameter_type: WireParameterType,
    pub parameter_value: WireParameterValue,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireParameterType {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub array_type: Option<Box<WireParameterType>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireParameterValue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub array_values: Option<Vec<WireParameterValue>>,
}

impl From<&QueryParameter> for WireParameter {
    fn from(param: &QueryParameter) -> Self {
        let int64 = || WireParameterType {
            type_name: "INT64".to_string(),
            array_type: None,
        };

        let (parameter_type, parameter_value) = match &param.value {
            ParameterValue::Int64(v) => (
                int64(),
                WireParameterValue {
                    value: Some(v.to_string()),
                    array_values: None,
                },
            ),
            ParameterValue::Int64Array(values) => (
                WireParameterType {
                    type_name: "ARRAY".to_string(),
                    array_type: Some(Box::new(int64())),
                },
                WireParameterValue {
                    value: None,
                    array_values: Some(
                        values
                            .iter()
                            .map(|v| WireParameterValue {
                                value: Some(v.to_string()),
                                array_values: None,
                            })
                            .collect(),
                    ),
                },
            ),
        };

        Self {
            name: param.name.clone(),
            parameter_type,
            parameter_value,
        }
    }
}

/// Response of the `queries` endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    #[serde(default)]
    pub schema: Option<TableSchema>,

    #[serde(default)]
    pub rows: Vec<WireRow>,

    #[serde(default)]
    pub job_complete: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableSchema {
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldSchema {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireRow {
    #[serde(default)]
    pub f: Vec<WireCell>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireCell {
    #[serde(default)]
    pub v: Value,
}

/// Error envelope returned on non-2xx responses
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: String,
}

impl QueryResponse {
    /// Zip positional cells with schema field names
    pub fn into_rows(self) -> Result<Vec<Row>, WarehouseError> {
        let fields = match self.schema {
            Some(schema) => schema.fields,
            None if self.rows.is_empty() => return Ok(Vec::new()),
            None => {
                return Err(WarehouseError::Decode(
                    "response has rows but no schema".to_string(),
                ))
            }
        };

        self.rows
            .into_iter()
            .map(|row| {
                if row.f.len() != fields.len() {
                    return Err(WarehouseError::Decode(format!(
                        "row has {} cells, schema has {} fields",
                        row.f.len(),
                        fields.len()
                    )));
                }
                Ok(Row(fields
                    .iter()
                    .zip(row.f)
                    .map(|(field, cell)| (field.name.clone(), cell.v))
                    .collect()))
            })
            .collect()
    }
}
