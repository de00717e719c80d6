//! Asset sources as seen by the optimizer
//!
//! Mirrors the `webpack-sources` contract: every asset yields its text, and
//! some also expose a combined text + source map accessor.

use serde::{Deserialize, Serialize};
use std::rc::Rc;
use thiserror::Error;

/// Source map in its serializable plain-object form (revision 3).
///
/// Keys without a field of their own, such as `ignoreList` or the
/// `sections` of an index map, are kept in `extra` and written back as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    pub version: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_root: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources_content: Option<Vec<Option<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub names: Option<Vec<String>>,
    /// Absent on index maps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mappings: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SourceMap {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Text and map retrieved together.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceAndMap {
    pub source: String,
    pub map: Option<SourceMap>,
}

/// An asset's content could not be produced.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct SourceError(pub String);

/// Content of one build output asset.
pub trait Source {
    /// The asset's full text.
    fn source(&self) -> Result<String, SourceError>;

    /// Text and source map together, or `None` when the asset has no
    /// combined accessor.
    fn source_and_map(&self) -> Option<Result<SourceAndMap, SourceError>> {
        None
    }
}

impl<S: Source + ?Sized> Source for Rc<S> {
    fn source(&self) -> Result<String, SourceError> {
        (**self).source()
    }

    fn source_and_map(&self) -> Option<Result<SourceAndMap, SourceError>> {
        (**self).source_and_map()
    }
}

/// Plain text with no map attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSource {
    text: String,
}

impl RawSource {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl Source for RawSource {
    fn source(&self) -> Result<String, SourceError> {
        Ok(self.text.clone())
    }

    fn source_and_map(&self) -> Option<Result<SourceAndMap, SourceError>> {
        Some(Ok(SourceAndMap {
            source: self.text.clone(),
            map: None,
        }))
    }
}

/// Text paired with the map describing how it was generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMapSource {
    text: String,
    name: String,
    map: SourceMap,
}

impl SourceMapSource {
    pub fn new(text: impl Into<String>, name: impl Into<String>, map: SourceMap) -> Self {
        Self {
            text: text.into(),
            name: name.into(),
            map,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Asset path the map belongs to.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn map(&self) -> &SourceMap {
        &self.map
    }
}

impl Source for SourceMapSource {
    fn source(&self) -> Result<String, SourceError> {
        Ok(self.text.clone())
    }

    fn source_and_map(&self) -> Option<Result<SourceAndMap, SourceError>> {
        Some(Ok(SourceAndMap {
            source: self.text.clone(),
            map: Some(self.map.clone()),
        }))
    }
}

/// Replacement produced for one CSS asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MinifiedAsset {
    Raw(RawSource),
    Mapped(SourceMapSource),
}

impl MinifiedAsset {
    pub fn css(&self) -> &str {
        match self {
            Self::Raw(raw) => raw.text(),
            Self::Mapped(mapped) => mapped.text(),
        }
    }

    pub fn map(&self) -> Option<&SourceMap> {
        match self {
            Self::Raw(_) => None,
            Self::Mapped(mapped) => Some(mapped.map()),
        }
    }
}

impl Source for MinifiedAsset {
    fn source(&self) -> Result<String, SourceError> {
        match self {
            Self::Raw(raw) => raw.source(),
            Self::Mapped(mapped) => mapped.source(),
        }
    }

    fn source_and_map(&self) -> Option<Result<SourceAndMap, SourceError>> {
        match self {
            Self::Raw(raw) => raw.source_and_map(),
            Self::Mapped(mapped) => mapped.source_and_map(),
        }
    }
}
