//! Plugin configuration
//!
//! The JSON shape matches what a webpack config passes to the plugin:
//! `{ "postcssOptions": { "map": false | true | { "prev"?, "inline"?, "annotation"? } } }`.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Result;
use crate::source::SourceMap;

/// Options accepted by the plugin constructor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CssMinimizerOptions {
    #[serde(default)]
    pub postcss_options: PostcssOptions,
}

impl CssMinimizerOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Options forwarded to the minifier on every call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostcssOptions {
    #[serde(default)]
    pub map: MapSetting,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Keys this crate does not interpret, passed through as-is.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// `map: false`, `map: true`, or map generation options.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum MapSetting {
    #[default]
    Disabled,
    /// `map: true`; the minifier's own defaults apply
    On,
    Enabled(MapOptions),
}

impl MapSetting {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }

    /// Set `prev`, turning `map: true` into `{ prev }` so the rest of the
    /// configuration keeps its defaults.
    pub fn set_prev(&mut self, prev: PrevMap) {
        match self {
            Self::Disabled => {}
            Self::On => {
                *self = Self::Enabled(MapOptions {
                    prev: Some(prev),
                    ..MapOptions::default()
                })
            }
            Self::Enabled(options) => options.prev = Some(prev),
        }
    }
}

impl Serialize for MapSetting {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Disabled => serializer.serialize_bool(false),
            Self::On => serializer.serialize_bool(true),
            Self::Enabled(options) => options.serialize(serializer),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MapSettingRepr {
    Flag(bool),
    Options(MapOptions),
}

impl<'de> Deserialize<'de> for MapSetting {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match MapSettingRepr::deserialize(deserializer)? {
            MapSettingRepr::Flag(false) => Self::Disabled,
            MapSettingRepr::Flag(true) => Self::On,
            MapSettingRepr::Options(options) => Self::Enabled(options),
        })
    }
}

/// Map generation options. Unset keys stay unset when forwarded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapOptions {
    /// Map of the input, chained into the generated map.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev: Option<PrevMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The `prev` map: explicitly off, a serialized map, or a map object.
#[derive(Debug, Clone, PartialEq)]
pub enum PrevMap {
    Disabled,
    Text(String),
    Map(SourceMap),
}

impl Serialize for PrevMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Disabled => serializer.serialize_bool(false),
            Self::Text(text) => serializer.serialize_str(text),
            Self::Map(map) => map.serialize(serializer),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PrevMapRepr {
    Flag(bool),
    Text(String),
    Map(SourceMap),
}

impl<'de> Deserialize<'de> for PrevMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match PrevMapRepr::deserialize(deserializer)? {
            PrevMapRepr::Flag(false) => Ok(Self::Disabled),
            PrevMapRepr::Flag(true) => Err(D::Error::custom(
                "`prev` accepts a source map or `false`",
            )),
            PrevMapRepr::Text(text) => Ok(Self::Text(text)),
            PrevMapRepr::Map(map) => Ok(Self::Map(map)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_map_disabled() {
        let options = CssMinimizerOptions::from_json(r#"{"postcssOptions":{"map":false}}"#).unwrap();
        assert_eq!(options.postcss_options.map, MapSetting::Disabled);
        assert_eq!(
            serde_json::to_value(&options).unwrap(),
            json!({ "postcssOptions": { "map": false } })
        );
    }

    #[test]
    fn test_map_options() {
        let options = CssMinimizerOptions::from_json(
            r#"{"postcssOptions":{"map":{"inline":false,"annotation":true}}}"#,
        )
        .unwrap();
        let MapSetting::Enabled(map) = &options.postcss_options.map else {
            panic!("map should be enabled");
        };
        assert_eq!(map.inline, Some(false));
        assert_eq!(map.annotation, Some(true));
        assert!(map.prev.is_none());
    }

    #[test]
    fn test_map_true_is_forwarded_as_given() {
        let options: PostcssOptions = serde_json::from_value(json!({ "map": true })).unwrap();
        assert_eq!(options.map, MapSetting::On);
        assert!(options.map.is_enabled());
        assert_eq!(serde_json::to_value(&options).unwrap(), json!({ "map": true }));
    }

    #[test]
    fn test_unset_map_keys_stay_unset() {
        let options: PostcssOptions =
            serde_json::from_value(json!({ "map": { "annotation": false, "sourcesContent": false } }))
                .unwrap();
        let MapSetting::Enabled(map) = &options.map else {
            panic!("map should be enabled");
        };
        assert_eq!(map.inline, None);
        assert_eq!(
            serde_json::to_value(&options).unwrap(),
            json!({ "map": { "annotation": false, "sourcesContent": false } })
        );
    }

    #[test]
    fn test_set_prev() {
        let mut on = MapSetting::On;
        on.set_prev(PrevMap::Disabled);
        assert_eq!(serde_json::to_value(&on).unwrap(), json!({ "prev": false }));

        let mut off = MapSetting::Disabled;
        off.set_prev(PrevMap::Disabled);
        assert_eq!(off, MapSetting::Disabled);
    }

    #[test]
    fn test_prev_forms() {
        let off: MapOptions = serde_json::from_value(json!({ "prev": false })).unwrap();
        assert_eq!(off.prev, Some(PrevMap::Disabled));

        let text: MapOptions = serde_json::from_value(json!({ "prev": "{}" })).unwrap();
        assert_eq!(text.prev, Some(PrevMap::Text("{}".to_string())));

        let object: MapOptions = serde_json::from_value(json!({
            "prev": { "version": 3, "sources": ["a.css"], "names": [], "mappings": "AAAA" }
        }))
        .unwrap();
        assert!(matches!(object.prev, Some(PrevMap::Map(_))));

        assert!(serde_json::from_value::<MapOptions>(json!({ "prev": true })).is_err());
    }

    #[test]
    fn test_unknown_keys_pass_through() {
        let options: PostcssOptions =
            serde_json::from_value(json!({ "map": false, "syntax": "scss" })).unwrap();
        assert_eq!(options.extra.get("syntax"), Some(&json!("scss")));
        assert_eq!(
            serde_json::to_value(&options).unwrap(),
            json!({ "map": false, "syntax": "scss" })
        );
    }

    #[test]
    fn test_invalid_json() {
        assert!(CssMinimizerOptions::from_json("{").is_err());
    }
}
