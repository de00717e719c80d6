//! Plugin registration
//!
//! Wires the [`AssetOptimizer`] into whichever asset-optimization hook the
//! host exposes. The hook family is chosen once, from the host version, when
//! the plugin is constructed.

use futures::future::{FutureExt, LocalBoxFuture, TryFutureExt};
use futures::stream::{FuturesUnordered, TryStreamExt};
use std::rc::Rc;
use tracing::debug;

use crate::error::{Error, Result};
use crate::filter::{chunk_files, css_assets};
use crate::host::{
    AssetTable, Chunk, Compilation, Compiler, OptimizeChunkAssets, ProcessAssets, StageTap,
    PROCESS_ASSETS_STAGE_OPTIMIZE_SIZE,
};
use crate::minifier::Minifier;
use crate::optimizer::AssetOptimizer;
use crate::options::CssMinimizerOptions;

/// Name the plugin taps hooks with.
pub const PLUGIN_NAME: &str = "CssMinimizerPlugin";

/// Major version of the host build tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostVersion {
    major: Option<u32>,
}

impl HostVersion {
    pub fn new(major: u32) -> Self {
        Self { major: Some(major) }
    }

    /// Read the leading integer of a version string (`"5.0.0"` -> 5).
    /// Strings without one yield an unknown major.
    pub fn parse(version: &str) -> Self {
        let trimmed = version.trim_start();
        let digits = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .map_or(trimmed, |end| &trimmed[..end]);
        Self {
            major: digits.parse().ok(),
        }
    }

    pub fn major(&self) -> Option<u32> {
        self.major
    }

    /// webpack 5 gets `processAssets`; everything else, including unknown
    /// versions, falls back to `optimizeChunkAssets`.
    pub fn strategy(&self) -> HookStrategy {
        match self.major {
            Some(5) => HookStrategy::ProcessAssets,
            _ => HookStrategy::OptimizeChunkAssets,
        }
    }
}

impl From<&str> for HostVersion {
    fn from(version: &str) -> Self {
        Self::parse(version)
    }
}

/// Which asset-optimization hook the plugin listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStrategy {
    /// `processAssets` at the optimize-size stage
    ProcessAssets,
    /// `optimizeChunkAssets`
    OptimizeChunkAssets,
}

impl HookStrategy {
    fn register<C, M>(self, compilation: &mut C, optimizer: &Rc<AssetOptimizer<M>>) -> Result<()>
    where
        C: Compilation,
        M: Minifier + 'static,
    {
        debug!(strategy = ?self, "registering css minimizer");
        let listener = Rc::new(CssAssetsListener {
            optimizer: Rc::clone(optimizer),
        });
        match self {
            Self::ProcessAssets => compilation.tap_process_assets(
                StageTap::new(PLUGIN_NAME, PROCESS_ASSETS_STAGE_OPTIMIZE_SIZE),
                listener,
            ),
            Self::OptimizeChunkAssets => compilation.tap_optimize_chunk_assets(PLUGIN_NAME, listener),
        }
    }
}

/// Minifies the CSS assets of every compilation.
pub struct CssMinimizerPlugin<M> {
    optimizer: Rc<AssetOptimizer<M>>,
    strategy: HookStrategy,
}

impl<M: Minifier + 'static> CssMinimizerPlugin<M> {
    pub fn new(options: CssMinimizerOptions, minifier: M, host: HostVersion) -> Self {
        Self {
            optimizer: Rc::new(AssetOptimizer::new(options, minifier)),
            strategy: host.strategy(),
        }
    }

    /// Construct from the JSON form of [`CssMinimizerOptions`].
    pub fn from_json(options_json: &str, minifier: M, host: HostVersion) -> Result<Self> {
        Ok(Self::new(CssMinimizerOptions::from_json(options_json)?, minifier, host))
    }

    pub fn strategy(&self) -> HookStrategy {
        self.strategy
    }

    pub fn optimizer(&self) -> &AssetOptimizer<M> {
        &self.optimizer
    }

    /// Listen for compilations on `compiler`.
    pub fn apply<C: Compiler>(&self, compiler: &mut C) -> Result<()> {
        let optimizer = Rc::clone(&self.optimizer);
        let strategy = self.strategy;
        compiler.on_compilation(
            PLUGIN_NAME,
            Box::new(move |compilation: &mut C::Compilation| strategy.register(compilation, &optimizer)),
        )
    }
}

struct CssAssetsListener<M> {
    optimizer: Rc<AssetOptimizer<M>>,
}

impl<M: Minifier> CssAssetsListener<M> {
    /// Read every asset and start every minification, then write each
    /// result back as it completes. The first failure aborts the pass;
    /// results written before it stay written.
    async fn optimize_all<T: AssetTable>(&self, paths: Vec<String>, assets: &mut T) -> Result<()> {
        debug!(count = paths.len(), "minifying css assets");

        let requests = paths
            .iter()
            .map(|path| {
                let asset = assets
                    .get(path)
                    .ok_or_else(|| Error::MissingAsset { path: path.clone() })?;
                self.optimizer.request(path, &asset)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut in_flight: FuturesUnordered<_> = requests
            .iter()
            .map(|request| {
                self.optimizer
                    .launch(request)
                    .map_ok(move |minified| (request.path.as_str(), minified))
            })
            .collect();

        while let Some((path, minified)) = in_flight.try_next().await? {
            assets.replace(path, minified)?;
        }
        Ok(())
    }
}

impl<M: Minifier, T: AssetTable> ProcessAssets<T> for CssAssetsListener<M> {
    fn process_assets<'a>(&'a self, assets: &'a mut T) -> LocalBoxFuture<'a, Result<()>> {
        async move {
            let paths = css_assets(assets.paths());
            self.optimize_all(paths, assets).await
        }
        .boxed_local()
    }
}

impl<M: Minifier, T: AssetTable> OptimizeChunkAssets<T> for CssAssetsListener<M> {
    fn optimize_chunk_assets<'a>(
        &'a self,
        chunks: &'a [Chunk],
        assets: &'a mut T,
    ) -> LocalBoxFuture<'a, Result<()>> {
        async move {
            let paths = css_assets(chunk_files(chunks));
            self.optimize_all(paths, assets).await
        }
        .boxed_local()
    }
}
