//! Build host seam
//!
//! The plugin talks to the host through these traits only. Two hook
//! families exist because the two supported webpack generations expose
//! incompatible asset-optimization hooks:
//!
//! - `processAssets` (webpack 5): receives the asset table, tapped at a stage
//! - `optimizeChunkAssets` (webpack 4): receives the chunk list; assets are
//!   reached through the compilation
//!
//! See [`crate::memory`] for an in-process host and `bindings` for the
//! JavaScript one.

use futures::future::LocalBoxFuture;
use std::rc::Rc;

use crate::error::Result;
use crate::source::{MinifiedAsset, Source};

/// Stage that runs after content-altering transforms and before emission.
pub const PROCESS_ASSETS_STAGE_OPTIMIZE_SIZE: i32 = 400;

/// Name and ordering slot of a `processAssets` tap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTap {
    pub name: &'static str,
    pub stage: i32,
}

impl StageTap {
    pub fn new(name: &'static str, stage: i32) -> Self {
        Self { name, stage }
    }
}

/// A chunk as delivered to `optimizeChunkAssets`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chunk {
    files: Option<Vec<String>>,
}

impl Chunk {
    pub fn new<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            files: Some(files.into_iter().map(Into::into).collect()),
        }
    }

    /// A chunk whose file list is absent.
    pub fn without_files() -> Self {
        Self { files: None }
    }

    pub fn files(&self) -> &[String] {
        self.files.as_deref().unwrap_or_default()
    }
}

/// The compilation's path -> asset table.
///
/// Only existing entries may be replaced; the table never grows or shrinks
/// through this trait.
pub trait AssetTable {
    type Asset: Source;

    /// Every asset path, in table order.
    fn paths(&self) -> Vec<String>;

    fn get(&self, path: &str) -> Option<Self::Asset>;

    /// Overwrite the asset at an existing `path`.
    fn replace(&mut self, path: &str, asset: MinifiedAsset) -> Result<()>;
}

/// Listener for the stage-ordered `processAssets` hook.
pub trait ProcessAssets<T> {
    fn process_assets<'a>(&'a self, assets: &'a mut T) -> LocalBoxFuture<'a, Result<()>>;
}

/// Listener for the `optimizeChunkAssets` hook.
pub trait OptimizeChunkAssets<T> {
    fn optimize_chunk_assets<'a>(
        &'a self,
        chunks: &'a [Chunk],
        assets: &'a mut T,
    ) -> LocalBoxFuture<'a, Result<()>>;
}

/// One in-progress compilation.
pub trait Compilation {
    type Assets: AssetTable;

    fn tap_process_assets(
        &mut self,
        tap: StageTap,
        listener: Rc<dyn ProcessAssets<Self::Assets>>,
    ) -> Result<()>;

    fn tap_optimize_chunk_assets(
        &mut self,
        name: &'static str,
        listener: Rc<dyn OptimizeChunkAssets<Self::Assets>>,
    ) -> Result<()>;
}

pub type CompilationCallback<C> = Box<dyn FnMut(&mut C) -> Result<()>>;

/// The compiler handle a plugin is applied to.
pub trait Compiler {
    type Compilation: Compilation;

    /// Run `callback` each time a compilation starts.
    fn on_compilation(
        &mut self,
        name: &'static str,
        callback: CompilationCallback<Self::Compilation>,
    ) -> Result<()>;
}
