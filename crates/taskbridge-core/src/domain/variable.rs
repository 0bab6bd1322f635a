use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::ExecutionError;
use super::messages::VariableResult;

/// A resolved variable. `value` is a JSON string unless it was decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub key: String,
    pub value: Value,
}

impl Variable {
    /// Builds a variable from the supervisor's answer.
    ///
    /// With `deserialize_json`, the payload must be valid JSON; a decode
    /// failure is returned to the caller rather than papered over.
    pub fn from_result(result: VariableResult, deserialize_json: bool) -> Result<Self, ExecutionError> {
        let value = match result.value {
            None => Value::Null,
            Some(raw) if deserialize_json => {
                serde_json::from_str(&raw).map_err(|source| ExecutionError::MalformedPayload {
                    what: format!("variable {}", result.key),
                    source,
                })?
            }
            Some(raw) => Value::String(raw),
        };

        Ok(Self {
            key: result.key,
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result(value: &str) -> VariableResult {
        VariableResult {
            key: "test_key".to_string(),
            value: Some(value.to_string()),
        }
    }

    #[test]
    fn plain_values_stay_strings() {
        let var = Variable::from_result(result("test_value"), false).unwrap();
        assert_eq!(
            var,
            Variable {
                key: "test_key".to_string(),
                value: json!("test_value"),
            }
        );
    }

    #[test]
    fn json_values_are_decoded() {
        let raw = "{\r\n  \"key1\": \"value1\",\r\n  \"key2\": \"value2\",\r\n  \"enabled\": true,\r\n  \"threshold\": 42\r\n}";
        let var = Variable::from_result(result(raw), true).unwrap();
        assert_eq!(
            var.value,
            json!({"key1": "value1", "key2": "value2", "enabled": true, "threshold": 42})
        );
    }

    #[test]
    fn undecodable_json_is_an_error() {
        let err = Variable::from_result(result("{not json"), true).unwrap_err();
        assert!(matches!(err, ExecutionError::MalformedPayload { .. }));
        assert!(err.to_string().starts_with("malformed payload for variable test_key"));
    }

    #[test]
    fn missing_value_is_null() {
        let var = Variable::from_result(
            VariableResult {
                key: "k".to_string(),
                value: None,
            },
            true,
        )
        .unwrap();
        assert_eq!(var.value, Value::Null);
    }
}
