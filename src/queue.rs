use std::{
    io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

/// One entry of the run-of-show. Only the fields below are interpreted; anything
/// else the producer writes is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct QueueItem {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(default)]
    pub main_heading: Option<String>,
    #[serde(default)]
    pub content_text: Option<String>,
    #[serde(default)]
    pub extra_data: Option<ExtraData>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExtraData {
    #[serde(default)]
    pub video_url: Option<String>,
}

impl QueueItem {
    pub fn headline(&self) -> &str {
        self.main_heading.as_deref().unwrap_or_default()
    }

    pub fn summary(&self) -> &str {
        self.content_text.as_deref().unwrap_or_default()
    }

    pub fn video_url(&self) -> &str {
        self.extra_data
            .as_ref()
            .and_then(|extra| extra.video_url.as_deref())
            .unwrap_or_default()
    }
}

/// Producers have written both `"id": "abc"` and `"id": 42`; treat both as opaque strings.
fn lenient_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid json in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path} does not contain a json array")]
    NotAList { path: PathBuf },
    #[error("first entry of {path} is not a queue item: {source}")]
    InvalidItem {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Reads the head of the run-of-show at `path`.
///
/// A missing file or an empty list is the normal "nothing on air" state and yields
/// `Ok(None)`. Everything else that prevents producing an item is an error.
pub fn read_current(path: &Path) -> Result<Option<QueueItem>, QueueError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(QueueError::Io {
                path: path.to_owned(),
                source,
            });
        }
    };

    let value: Value = serde_json::from_str(&text).map_err(|source| QueueError::Json {
        path: path.to_owned(),
        source,
    })?;

    let Value::Array(mut entries) = value else {
        return Err(QueueError::NotAList {
            path: path.to_owned(),
        });
    };
    if entries.is_empty() {
        return Ok(None);
    }

    let first = entries.swap_remove(0);
    serde_json::from_value(first)
        .map(Some)
        .map_err(|source| QueueError::InvalidItem {
            path: path.to_owned(),
            source,
        })
}

/// Re-reads the queue file on every call. The file is tiny and polled every few
/// seconds, so there is nothing worth caching.
#[derive(Debug, Clone)]
pub struct QueueReader {
    path: PathBuf,
}

impl QueueReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current(&self) -> Result<Option<QueueItem>, QueueError> {
        read_current(&self.path)
    }
}
