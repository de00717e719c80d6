//! External CSS minifier seam
//!
//! The plugin never minifies by itself; it hands each asset to a
//! [`Minifier`]. A lightningcss-backed implementation ships behind the
//! `lightningcss` feature.

use futures::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::options::PostcssOptions;
use crate::source::SourceMap;

/// Output of one minifier call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinifyOutput {
    /// Minified stylesheet
    pub css: String,
    /// Generated map, already in plain-object form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<SourceMap>,
}

impl MinifyOutput {
    pub fn new(css: impl Into<String>) -> Self {
        Self {
            css: css.into(),
            map: None,
        }
    }

    pub fn with_map(mut self, map: SourceMap) -> Self {
        self.map = Some(map);
        self
    }
}

/// Failure reported by the minifier.
///
/// Carries the minifier's own error as `source` so callers can recover it
/// unchanged.
#[derive(Debug)]
pub struct MinifyError {
    message: String,
    source: Option<Box<dyn std::error::Error + 'static>>,
}

impl MinifyError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for MinifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for MinifyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_deref()
    }
}

/// Minifies CSS text.
///
/// Futures are not required to be `Send`: every call of one pass is polled
/// on the same thread.
pub trait Minifier {
    fn minify<'a>(
        &'a self,
        css: &'a str,
        options: &'a PostcssOptions,
    ) -> LocalBoxFuture<'a, Result<MinifyOutput, MinifyError>>;
}

#[cfg(feature = "lightningcss")]
pub use self::lightning::LightningCss;

#[cfg(feature = "lightningcss")]
mod lightning {
    use futures::future::{self, FutureExt, LocalBoxFuture};
    use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};

    use super::{MinifyError, MinifyOutput, Minifier};
    use crate::options::PostcssOptions;

    /// In-process minifier backed by lightningcss. Produces no source map.
    #[derive(Debug, Clone, Default)]
    pub struct LightningCss {
        /// Skip invalid rules instead of failing the asset
        pub error_recovery: bool,
    }

    impl LightningCss {
        pub fn new() -> Self {
            Self::default()
        }

        fn minify_sync(&self, css: &str, options: &PostcssOptions) -> Result<MinifyOutput, MinifyError> {
            let parser_options = ParserOptions {
                filename: options.from.clone().unwrap_or_default(),
                error_recovery: self.error_recovery,
                ..ParserOptions::default()
            };

            let mut stylesheet = StyleSheet::parse(css, parser_options)
                .map_err(|e| MinifyError::new(format!("CSS parse error: {e}")))?;

            stylesheet
                .minify(MinifyOptions::default())
                .map_err(|e| MinifyError::new(format!("CSS minify error: {e}")))?;

            let printed = stylesheet
                .to_css(PrinterOptions {
                    minify: true,
                    ..PrinterOptions::default()
                })
                .map_err(|e| MinifyError::new(format!("CSS print error: {e}")))?;

            Ok(MinifyOutput::new(printed.code))
        }
    }

    impl Minifier for LightningCss {
        fn minify<'a>(
            &'a self,
            css: &'a str,
            options: &'a PostcssOptions,
        ) -> LocalBoxFuture<'a, Result<MinifyOutput, MinifyError>> {
            future::ready(self.minify_sync(css, options)).boxed_local()
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_minify_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "worker crashed");
        let err = MinifyError::with_source("minifier failed", io);
        assert_eq!(err.to_string(), "minifier failed");
        assert_eq!(err.source().unwrap().to_string(), "worker crashed");
    }

    #[cfg(feature = "lightningcss")]
    #[test]
    fn test_lightningcss_minify() {
        let minifier = LightningCss::new();
        let css = r#"
            /* header */
            .foo {
                color: #ff0000;
                margin: 0px 0px 0px 0px;
            }
        "#;
        let options = PostcssOptions {
            from: Some("app.css".to_string()),
            ..PostcssOptions::default()
        };

        let output = futures::executor::block_on(minifier.minify(css, &options)).unwrap();
        assert!(output.css.len() < css.len());
        assert!(!output.css.contains("header"));
        assert!(output.css.starts_with(".foo{"));
        assert!(output.map.is_none());
    }

    #[cfg(feature = "lightningcss")]
    #[test]
    fn test_lightningcss_rejects_invalid_selector() {
        let minifier = LightningCss::new();
        let result = futures::executor::block_on(
            minifier.minify("..foo { color: red }", &PostcssOptions::default()),
        );
        assert!(result.is_err());
    }
}
