use crate::constants::{
    DEFAULT_DESCRIPTION_PLACEHOLDER, DEFAULT_FIELD, DEFAULT_TEXT_PLACEHOLDER, DEFAULT_TIMEOUT_SECS,
    DEFAULT_TITLE_PLACEHOLDER, DEFAULT_TYPES,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Upload and placeholder settings for a text-image block.
///
/// Every field is optional on input; missing keys take the defaults from
/// [`crate::constants`]. The config is resolved once and never changes for the
/// lifetime of a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UploadConfig {
    pub endpoint: String,
    pub endpoint_by_url: Option<String>,
    pub field: String,
    pub types: String,
    pub additional_request_data: BTreeMap<String, Value>,
    pub additional_request_headers: BTreeMap<String, String>,
    pub text_placeholder: String,
    pub title_placeholder: String,
    pub description_placeholder: String,
    pub timeout_secs: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            endpoint_by_url: None,
            field: DEFAULT_FIELD.to_string(),
            types: DEFAULT_TYPES.to_string(),
            additional_request_data: BTreeMap::new(),
            additional_request_headers: BTreeMap::new(),
            text_placeholder: DEFAULT_TEXT_PLACEHOLDER.to_string(),
            title_placeholder: DEFAULT_TITLE_PLACEHOLDER.to_string(),
            description_placeholder: DEFAULT_DESCRIPTION_PLACEHOLDER.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl UploadConfig {
    /// Resolves a config from a JSON value. `null` and non-object values fall
    /// back to the defaults, and a field of the wrong type falls back alone.
    pub fn from_value(value: Value) -> Self {
        let fields = match value {
            Value::Object(fields) => fields,
            Value::Null => return Self::default(),
            other => {
                log::warn!("Ignoring block config that is not an object: {other}");
                return Self::default();
            }
        };

        let valid: Map<String, Value> = fields
            .into_iter()
            .filter(|(key, value)| {
                let single = Value::Object(Map::from_iter([(key.clone(), value.clone())]));
                match serde_json::from_value::<Self>(single) {
                    Ok(_) => true,
                    Err(err) => {
                        log::warn!("Ignoring invalid block config field '{key}': {err}");
                        false
                    }
                }
            })
            .collect();

        serde_json::from_value(Value::Object(valid)).unwrap_or_else(|err| {
            log::warn!("Ignoring invalid block config: {err}");
            Self::default()
        })
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let raw = fs::read_to_string(path)
            .map_err(|err| format!("Failed to read {}: {err}", path.display()))?;
        let value: Value = serde_json::from_str(&raw)
            .map_err(|err| format!("Failed to parse {}: {err}", path.display()))?;
        Ok(Self::from_value(value))
    }

    /// Loads the config at `path`, or the defaults when it is missing or broken.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("{err}; using default upload config");
                Self::default()
            }
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// Endpoint that receives remote-URL uploads.
    pub fn url_endpoint(&self) -> &str {
        self.endpoint_by_url
            .as_deref()
            .filter(|endpoint| !endpoint.is_empty())
            .unwrap_or(&self.endpoint)
    }
}
