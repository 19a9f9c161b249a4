use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// An uploaded file as reported by the upload endpoint.
///
/// Only `url` is interpreted; every other key the server sends is kept as-is
/// and written back on save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageFile {
    pub url: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ImageFile {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            extra: Map::new(),
        }
    }

    /// Accepts an object with a non-empty string `url`, rejects anything else.
    pub fn from_value(value: Value) -> Option<Self> {
        let Value::Object(mut fields) = value else {
            return None;
        };
        let url = match fields.remove("url") {
            Some(Value::String(url)) if !url.trim().is_empty() => url,
            _ => return None,
        };
        Some(Self { url, extra: fields })
    }
}

/// The persisted record of a text-image block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockData {
    #[serde(deserialize_with = "deserialize_text")]
    pub text: String,
    #[serde(deserialize_with = "deserialize_text")]
    pub title: String,
    #[serde(deserialize_with = "deserialize_text")]
    pub description: String,
    #[serde(deserialize_with = "deserialize_image")]
    pub image: Option<ImageFile>,
}

impl BlockData {
    /// Restores saved data, filling anything missing with defaults.
    ///
    /// Never fails: a non-object input yields an empty block, and each broken
    /// field falls back on its own. A non-string text becomes empty and a
    /// broken `image` record degrades to no image.
    pub fn from_value(value: Value) -> Self {
        if value.is_null() {
            return Self::default();
        }
        serde_json::from_value(value).unwrap_or_else(|err| {
            log::warn!("Restoring empty block from unreadable data: {err}");
            Self::default()
        })
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }
}

fn deserialize_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(text),
        Value::Null => Ok(String::new()),
        other => {
            log::warn!("Dropping saved text field of unexpected type: {other}");
            Ok(String::new())
        }
    }
}

fn deserialize_image<'de, D>(deserializer: D) -> Result<Option<ImageFile>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| {
        let image = ImageFile::from_value(value);
        if image.is_none() {
            log::warn!("Dropping saved image without a usable url");
        }
        image
    }))
}
