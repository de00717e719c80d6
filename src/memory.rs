//! In-process build host
//!
//! Implements the [`crate::host`] traits over plain Rust collections so the
//! plugin can run inside a Rust-native pipeline without a JavaScript
//! compiler behind it.

use indexmap::IndexMap;
use std::rc::Rc;
use tracing::debug;

use crate::error::{Error, Result};
use crate::host::{
    AssetTable, Chunk, Compilation, CompilationCallback, Compiler, OptimizeChunkAssets,
    ProcessAssets, StageTap,
};
use crate::source::{MinifiedAsset, Source};

/// Ordered path -> asset table
#[derive(Clone, Default)]
pub struct MemoryAssets {
    entries: IndexMap<String, Rc<dyn Source>>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or overwrite an asset. Host-side only; plugins go through
    /// [`AssetTable::replace`].
    pub fn insert(&mut self, path: impl Into<String>, asset: impl Source + 'static) {
        self.entries.insert(path.into(), Rc::new(asset));
    }

    pub fn source(&self, path: &str) -> Option<&Rc<dyn Source>> {
        self.entries.get(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<P: Into<String>, S: Source + 'static> FromIterator<(P, S)> for MemoryAssets {
    fn from_iter<I: IntoIterator<Item = (P, S)>>(iter: I) -> Self {
        let mut assets = Self::new();
        for (path, asset) in iter {
            assets.insert(path, asset);
        }
        assets
    }
}

impl AssetTable for MemoryAssets {
    type Asset = Rc<dyn Source>;

    fn paths(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    fn get(&self, path: &str) -> Option<Self::Asset> {
        self.entries.get(path).cloned()
    }

    fn replace(&mut self, path: &str, asset: MinifiedAsset) -> Result<()> {
        match self.entries.get_mut(path) {
            Some(slot) => {
                *slot = Rc::new(asset);
                Ok(())
            }
            None => Err(Error::MissingAsset {
                path: path.to_string(),
            }),
        }
    }
}

/// Compilation holding its assets, chunks and tapped listeners.
pub struct MemoryCompilation {
    assets: MemoryAssets,
    chunks: Vec<Chunk>,
    process_assets: Vec<(StageTap, Rc<dyn ProcessAssets<MemoryAssets>>)>,
    optimize_chunk_assets: Vec<(&'static str, Rc<dyn OptimizeChunkAssets<MemoryAssets>>)>,
}

impl MemoryCompilation {
    pub fn new(assets: MemoryAssets, chunks: Vec<Chunk>) -> Self {
        Self {
            assets,
            chunks,
            process_assets: Vec::new(),
            optimize_chunk_assets: Vec::new(),
        }
    }

    pub fn assets(&self) -> &MemoryAssets {
        &self.assets
    }

    pub fn into_assets(self) -> MemoryAssets {
        self.assets
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Taps registered on `processAssets`, in registration order.
    pub fn process_assets_taps(&self) -> Vec<StageTap> {
        self.process_assets.iter().map(|(tap, _)| *tap).collect()
    }

    /// Names registered on `optimizeChunkAssets`, in registration order.
    pub fn optimize_chunk_assets_taps(&self) -> Vec<&'static str> {
        self.optimize_chunk_assets.iter().map(|(name, _)| *name).collect()
    }

    /// Run the asset optimization hooks: `optimizeChunkAssets` listeners in
    /// registration order, then `processAssets` listeners by stage.
    pub async fn seal(&mut self) -> Result<()> {
        let chunk_listeners: Vec<_> = self
            .optimize_chunk_assets
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        for listener in chunk_listeners {
            listener
                .optimize_chunk_assets(&self.chunks, &mut self.assets)
                .await?;
        }

        let mut stage_listeners: Vec<_> = self
            .process_assets
            .iter()
            .map(|(tap, listener)| (tap.stage, Rc::clone(listener)))
            .collect();
        stage_listeners.sort_by_key(|(stage, _)| *stage);
        for (stage, listener) in stage_listeners {
            debug!(stage, "running processAssets stage");
            listener.process_assets(&mut self.assets).await?;
        }

        Ok(())
    }
}

impl Compilation for MemoryCompilation {
    type Assets = MemoryAssets;

    fn tap_process_assets(
        &mut self,
        tap: StageTap,
        listener: Rc<dyn ProcessAssets<MemoryAssets>>,
    ) -> Result<()> {
        self.process_assets.push((tap, listener));
        Ok(())
    }

    fn tap_optimize_chunk_assets(
        &mut self,
        name: &'static str,
        listener: Rc<dyn OptimizeChunkAssets<MemoryAssets>>,
    ) -> Result<()> {
        self.optimize_chunk_assets.push((name, listener));
        Ok(())
    }
}

/// Compiler that fires its compilation callbacks on every [`compile`](Self::compile).
#[derive(Default)]
pub struct MemoryCompiler {
    callbacks: Vec<(&'static str, CompilationCallback<MemoryCompilation>)>,
}

impl MemoryCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the plugins listening for compilations.
    pub fn listeners(&self) -> Vec<&'static str> {
        self.callbacks.iter().map(|(name, _)| *name).collect()
    }

    /// Start a compilation over `assets` and `chunks`.
    pub fn compile(&mut self, assets: MemoryAssets, chunks: Vec<Chunk>) -> Result<MemoryCompilation> {
        let mut compilation = MemoryCompilation::new(assets, chunks);
        for (_, callback) in &mut self.callbacks {
            callback(&mut compilation)?;
        }
        Ok(compilation)
    }
}

impl Compiler for MemoryCompiler {
    type Compilation = MemoryCompilation;

    fn on_compilation(
        &mut self,
        name: &'static str,
        callback: CompilationCallback<MemoryCompilation>,
    ) -> Result<()> {
        self.callbacks.push((name, callback));
        Ok(())
    }
}
