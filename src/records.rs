//! Input and output records exchanged with the host runtime

use cache_system::CacheError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One item of a batch: a JSON object
pub type Record = Map<String, Value>;

/// Where an item's key comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySource {
    /// Same key for every record
    Literal(String),
    /// Read from a top-level field of each record
    Field(String),
}

impl KeySource {
    pub fn literal(key: impl Into<String>) -> Self {
        KeySource::Literal(key.into())
    }

    pub fn field(name: impl Into<String>) -> Self {
        KeySource::Field(name.into())
    }

    /// Resolve the key for `record`; numbers are accepted and stringified
    pub fn resolve(&self, record: &Record) -> Result<String, CacheError> {
        let key = match self {
            KeySource::Literal(key) => key.clone(),
            KeySource::Field(name) => match record.get(name) {
                Some(Value::String(key)) => key.clone(),
                Some(Value::Number(n)) => n.to_string(),
                Some(other) => {
                    return Err(CacheError::Validation(format!(
                        "Key field '{}' must be a string, got {}",
                        name, other
                    )));
                }
                None => {
                    return Err(CacheError::Validation(format!(
                        "Key field '{}' is missing from the record",
                        name
                    )));
                }
            },
        };

        type_mapping::validate_key(&key)?;
        Ok(key)
    }
}

/// Where an item's value comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    Literal(Value),
    Field(String),
}

impl ValueSource {
    pub fn literal(value: impl Into<Value>) -> Self {
        ValueSource::Literal(value.into())
    }

    pub fn field(name: impl Into<String>) -> Self {
        ValueSource::Field(name.into())
    }

    pub fn resolve<'a>(&'a self, record: &'a Record) -> Result<&'a Value, CacheError> {
        match self {
            ValueSource::Literal(value) => Ok(value),
            ValueSource::Field(name) => record.get(name).ok_or_else(|| {
                CacheError::Validation(format!("Value field '{}' is missing from the record", name))
            }),
        }
    }
}

/// Ordered output records per declared channel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchOutput {
    channels: Vec<(&'static str, Vec<Record>)>,
}

impl BatchOutput {
    pub fn new(channels: &[&'static str]) -> Self {
        Self {
            channels: channels.iter().map(|name| (*name, Vec::new())).collect(),
        }
    }

    /// Append to a declared channel; unknown names are ignored
    pub fn push(&mut self, channel: &str, record: Record) {
        match self.channels.iter_mut().find(|(name, _)| *name == channel) {
            Some((_, records)) => {
                crate::trace_log!("[BATCH] {} <- record {}", channel, records.len());
                records.push(record);
            }
            None => tracing::warn!(channel, "[BATCH] record sent to undeclared channel"),
        }
    }

    /// Records of a channel, empty for unknown names
    pub fn channel(&self, channel: &str) -> &[Record] {
        self.channels
            .iter()
            .find(|(name, _)| *name == channel)
            .map(|(_, records)| records.as_slice())
            .unwrap_or(&[])
    }

    pub fn channel_names(&self) -> Vec<&'static str> {
        self.channels.iter().map(|(name, _)| *name).collect()
    }

    /// Total records across all channels
    pub fn len(&self) -> usize {
        self.channels.iter().map(|(_, records)| records.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Array-of-arrays form, channels in declaration order
    pub fn into_arrays(self) -> Vec<Vec<Record>> {
        self.channels.into_iter().map(|(_, records)| records).collect()
    }
}

/// Copy of `input` with `fields` merged over it
pub(crate) fn merge(input: &Record, fields: Record) -> Record {
    let mut output = input.clone();
    output.extend(fields);
    output
}

pub(crate) fn timestamp() -> Value {
    Value::String(chrono::Utc::now().to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_key_from_field() {
        let input = record(json!({"id": "user:1", "n": 7, "flag": true}));
        assert_eq!(KeySource::field("id").resolve(&input).unwrap(), "user:1");
        assert_eq!(KeySource::field("n").resolve(&input).unwrap(), "7");
        assert!(KeySource::field("flag").resolve(&input).unwrap_err().is_validation());
        assert!(KeySource::field("missing").resolve(&input).unwrap_err().is_validation());
        assert!(KeySource::literal(" ").resolve(&input).unwrap_err().is_validation());
    }

    #[test]
    fn test_channels_keep_declaration_order() {
        let mut output = BatchOutput::new(&["valid", "invalid"]);
        output.push("invalid", record(json!({"k": 1})));
        output.push("valid", record(json!({"k": 2})));
        output.push("valid", record(json!({"k": 3})));

        assert_eq!(output.len(), 3);
        assert_eq!(output.channel("valid").len(), 2);
        let arrays = output.into_arrays();
        assert_eq!(arrays[0][1]["k"], json!(3));
        assert_eq!(arrays[1][0]["k"], json!(1));
    }

    #[test]
    fn test_merge_overrides_input_fields() {
        let input = record(json!({"key": "old", "keep": true}));
        let merged = merge(&input, record(json!({"key": "new"})));
        assert_eq!(merged["key"], json!("new"));
        assert_eq!(merged["keep"], json!(true));
    }
}
