//! Required-field validation for JSON records.

use serde_json::Value;

use super::traits::RecordValidator;

/// Requires each named top-level field to be present, non-null, and not an
/// empty string.
#[derive(Debug, Clone, Default)]
pub struct RequiredFields {
    fields: Vec<String>,
}

impl RequiredFields {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

impl RecordValidator<Value> for RequiredFields {
    fn validate(&self, payload: &Value) -> Vec<String> {
        let Some(record) = payload.as_object() else {
            return vec!["record is not a JSON object".to_string()];
        };

        self.fields
            .iter()
            .filter(|field| match record.get(field.as_str()) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.trim().is_empty(),
                Some(_) => false,
            })
            .map(|field| format!("missing required field '{}'", field))
            .collect()
    }
}
