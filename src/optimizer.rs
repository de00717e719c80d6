//! Per-asset CSS optimization
//!
//! Turns one asset into its minified replacement. Knows nothing about hook
//! families or host versions; the plugin decides which assets reach it.

use std::future::Future;
use tracing::{trace, warn};

use crate::error::{Error, Result};
use crate::minifier::Minifier;
use crate::options::{CssMinimizerOptions, PostcssOptions, PrevMap};
use crate::source::{MinifiedAsset, RawSource, Source, SourceMapSource};

/// Input for one minifier call, built fresh for every asset.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationRequest {
    pub path: String,
    pub input: String,
    pub options: PostcssOptions,
}

/// Minifies single assets with a fixed configuration.
pub struct AssetOptimizer<M> {
    postcss_options: PostcssOptions,
    minifier: M,
}

impl<M: Minifier> AssetOptimizer<M> {
    pub fn new(options: CssMinimizerOptions, minifier: M) -> Self {
        Self {
            postcss_options: options.postcss_options,
            minifier,
        }
    }

    pub fn postcss_options(&self) -> &PostcssOptions {
        &self.postcss_options
    }

    pub fn minifier(&self) -> &M {
        &self.minifier
    }

    /// Build the minifier input for `asset` stored at `path`.
    ///
    /// With maps enabled and a combined accessor available, text and map are
    /// read together and `prev` is set to the existing map, or to `false`
    /// when the asset has none. Otherwise only the text is read.
    pub fn request<S: Source + ?Sized>(&self, path: &str, asset: &S) -> Result<OptimizationRequest> {
        let mut options = self.postcss_options.clone();
        options.to = Some(path.to_string());
        options.from = Some(path.to_string());

        let joint = if options.map.is_enabled() {
            asset.source_and_map()
        } else {
            None
        };

        let input = match joint {
            Some(joint) => {
                let joint = joint.map_err(|source| Error::Source {
                    path: path.to_string(),
                    source,
                })?;
                options
                    .map
                    .set_prev(joint.map.map_or(PrevMap::Disabled, PrevMap::Map));
                joint.source
            }
            None => asset.source().map_err(|source| Error::Source {
                path: path.to_string(),
                source,
            })?,
        };

        Ok(OptimizationRequest {
            path: path.to_string(),
            input,
            options,
        })
    }

    /// Minify `asset` and wrap the result for the asset table.
    pub async fn optimize<S: Source + ?Sized>(&self, path: &str, asset: &S) -> Result<MinifiedAsset> {
        let request = self.request(path, asset)?;
        self.launch(&request).await
    }

    /// Start the minifier on `request` right away; the returned future
    /// yields the replacement asset.
    pub fn launch<'a>(
        &'a self,
        request: &'a OptimizationRequest,
    ) -> impl Future<Output = Result<MinifiedAsset>> + 'a {
        let minifying = self.minifier.minify(&request.input, &request.options);
        let path = request.path.as_str();

        async move {
            let output = match minifying.await {
                Ok(output) => output,
                Err(e) => {
                    warn!(path, error = %e, "css minification failed");
                    return Err(e.into());
                }
            };

            trace!(
                path,
                original_size = request.input.len(),
                minified_size = output.css.len(),
                has_map = output.map.is_some(),
                "minified css asset"
            );

            Ok(match output.map {
                Some(map) => MinifiedAsset::Mapped(SourceMapSource::new(output.css, path, map)),
                None => MinifiedAsset::Raw(RawSource::new(output.css)),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::minifier::testing::RecordingMinifier;
    use crate::options::{MapOptions, MapSetting};
    use crate::source::{SourceAndMap, SourceError, SourceMap};
    use futures::executor::block_on;
    use std::cell::Cell;

    /// Asset without a combined accessor that counts reads.
    struct TextOnly {
        text: &'static str,
        reads: Cell<usize>,
    }

    impl TextOnly {
        fn new(text: &'static str) -> Self {
            Self {
                text,
                reads: Cell::new(0),
            }
        }
    }

    impl Source for TextOnly {
        fn source(&self) -> Result<String, SourceError> {
            self.reads.set(self.reads.get() + 1);
            Ok(self.text.to_string())
        }
    }

    struct Unreadable;

    impl Source for Unreadable {
        fn source(&self) -> Result<String, SourceError> {
            Err(SourceError("buffer is not valid UTF-8".to_string()))
        }

        fn source_and_map(&self) -> Option<Result<SourceAndMap, SourceError>> {
            Some(Err(SourceError("map is corrupt".to_string())))
        }
    }

    fn sample_map(file: &str) -> SourceMap {
        SourceMap {
            version: 3,
            file: Some(file.to_string()),
            sources: Some(vec!["src/app.css".to_string()]),
            names: Some(vec![]),
            mappings: Some("AAAA,SAAS".to_string()),
            ..SourceMap::default()
        }
    }

    fn map_enabled() -> CssMinimizerOptions {
        CssMinimizerOptions {
            postcss_options: PostcssOptions {
                map: MapSetting::Enabled(MapOptions {
                    inline: Some(false),
                    annotation: Some(true),
                    ..MapOptions::default()
                }),
                ..PostcssOptions::default()
            },
        }
    }

    #[test]
    fn test_map_disabled_uses_plain_text() {
        let optimizer = AssetOptimizer::new(CssMinimizerOptions::default(), RecordingMinifier::default());
        let existing = SourceMapSource::new("a { color: red }", "a.css", sample_map("a.css"));

        let result = block_on(optimizer.optimize("a.css", &existing)).unwrap();
        assert_eq!(result, MinifiedAsset::Raw(RawSource::new("a{color:red}")));

        let calls = optimizer.minifier().calls.borrow();
        assert_eq!(calls.len(), 1);
        let (input, options) = &calls[0];
        assert_eq!(input, "a { color: red }");
        assert_eq!(options.map, MapSetting::Disabled);
        assert_eq!(options.to.as_deref(), Some("a.css"));
        assert_eq!(options.from.as_deref(), Some("a.css"));
    }

    #[test]
    fn test_existing_map_is_chained() {
        let returned = sample_map("a.min.css");
        let optimizer = AssetOptimizer::new(map_enabled(), RecordingMinifier::with_map(returned.clone()));
        let existing = SourceMapSource::new("a { color: red }", "a.css", sample_map("a.css"));

        let result = block_on(optimizer.optimize("a.css", &existing)).unwrap();
        let MinifiedAsset::Mapped(mapped) = &result else {
            panic!("expected a mapped asset, got {result:?}");
        };
        assert_eq!(mapped.text(), "a{color:red}");
        assert_eq!(mapped.name(), "a.css");
        assert_eq!(mapped.map(), &returned);

        let calls = optimizer.minifier().calls.borrow();
        let MapSetting::Enabled(map) = &calls[0].1.map else {
            panic!("map should stay enabled");
        };
        assert_eq!(map.prev, Some(PrevMap::Map(sample_map("a.css"))));
        assert_eq!(map.annotation, Some(true));
        assert_eq!(map.inline, Some(false));
    }

    #[test]
    fn test_missing_map_sets_prev_false() {
        let optimizer = AssetOptimizer::new(map_enabled(), RecordingMinifier::default());
        let request = optimizer.request("b.css", &RawSource::new("b {}")).unwrap();

        let MapSetting::Enabled(map) = &request.options.map else {
            panic!("map should stay enabled");
        };
        assert_eq!(map.prev, Some(PrevMap::Disabled));
        assert_eq!(
            serde_json::to_value(&request.options).unwrap()["map"]["prev"],
            serde_json::json!(false)
        );
    }

    #[test]
    fn test_map_true_gains_prev_only() {
        let options = CssMinimizerOptions {
            postcss_options: PostcssOptions {
                map: MapSetting::On,
                ..PostcssOptions::default()
            },
        };
        let optimizer = AssetOptimizer::new(options, RecordingMinifier::default());

        let existing = SourceMapSource::new("a {}", "a.css", sample_map("a.css"));
        let request = optimizer.request("a.css", &existing).unwrap();
        let forwarded = serde_json::to_value(&request.options).unwrap();
        assert_eq!(forwarded["map"]["prev"]["mappings"], serde_json::json!("AAAA,SAAS"));
        assert!(forwarded["map"].get("inline").is_none());
        assert!(forwarded["map"].get("annotation").is_none());

        let text_only = optimizer.request("c.css", &TextOnly::new("c {}")).unwrap();
        assert_eq!(text_only.options.map, MapSetting::On);
        assert_eq!(optimizer.postcss_options().map, MapSetting::On);
    }

    #[test]
    fn test_no_combined_accessor_reads_text_only() {
        let optimizer = AssetOptimizer::new(map_enabled(), RecordingMinifier::default());
        let asset = TextOnly::new("c { margin: 0 }");

        let request = optimizer.request("c.css", &asset).unwrap();
        assert_eq!(request.input, "c { margin: 0 }");
        assert_eq!(asset.reads.get(), 1);
        let MapSetting::Enabled(map) = &request.options.map else {
            panic!("map should stay enabled");
        };
        assert!(map.prev.is_none());
    }

    #[test]
    fn test_configuration_is_not_mutated() {
        let optimizer = AssetOptimizer::new(map_enabled(), RecordingMinifier::default());
        let existing = SourceMapSource::new("a {}", "a.css", sample_map("a.css"));

        block_on(optimizer.optimize("a.css", &existing)).unwrap();

        assert_eq!(optimizer.postcss_options(), &map_enabled().postcss_options);
        assert!(optimizer.postcss_options().to.is_none());
    }

    #[test]
    fn test_minifier_error_propagates() {
        let optimizer = AssetOptimizer::new(CssMinimizerOptions::default(), RecordingMinifier::default());
        let err = block_on(optimizer.optimize("bad.css", &RawSource::new("a { FAIL"))).unwrap_err();

        assert!(matches!(err, Error::Minify(_)));
        assert_eq!(err.to_string(), "Unclosed block");
        assert_eq!(optimizer.minifier().calls.borrow().len(), 1);
    }

    #[test]
    fn test_unreadable_asset() {
        let optimizer = AssetOptimizer::new(map_enabled(), RecordingMinifier::default());
        let err = block_on(optimizer.optimize("x.css", &Unreadable)).unwrap_err();

        assert!(matches!(err, Error::Source { ref path, .. } if path == "x.css"));
        assert!(optimizer.minifier().calls.borrow().is_empty());
    }
}
