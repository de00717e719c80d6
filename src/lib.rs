//! Kona CSS Minimizer - CSS asset minimization for webpack builds
//!
//! Replaces every CSS output asset of a compilation with its minified form,
//! carrying source maps through when configured. Works with both the
//! webpack 5 `processAssets` hook and the webpack 4 `optimizeChunkAssets`
//! hook, and is exposed to JavaScript via WebAssembly.

mod bindings;
pub mod error;
pub mod filter;
pub mod host;
pub mod memory;
pub mod minifier;
pub mod optimizer;
pub mod options;
pub mod plugin;
pub mod source;

pub use bindings::*;
pub use error::{Error, Result};
pub use filter::is_css_asset;
pub use minifier::{Minifier, MinifyError, MinifyOutput};
pub use optimizer::{AssetOptimizer, OptimizationRequest};
pub use options::{CssMinimizerOptions, MapOptions, MapSetting, PostcssOptions, PrevMap};
pub use plugin::{CssMinimizerPlugin, HookStrategy, HostVersion, PLUGIN_NAME};
pub use source::{MinifiedAsset, RawSource, Source, SourceMap, SourceMapSource};

#[cfg(feature = "lightningcss")]
pub use minifier::LightningCss;
