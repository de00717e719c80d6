//! WebAssembly bindings for webpack
//!
//! Exposes `CssMinimizerPlugin` to JavaScript. The webpack compiler, its
//! asset table and the external minifier all stay on the JS side; this
//! module adapts them to the [`crate::host`] and [`crate::minifier`] traits.

use futures::future::{FutureExt, LocalBoxFuture};
use js_sys::{Array, Function, Object, Promise, Reflect, Uint8Array};
use serde::Serialize;
use std::error::Error as StdError;
use std::fmt;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{future_to_promise, JsFuture};

use crate::error::{Error, Result};
use crate::host::{
    AssetTable, Chunk, Compilation, CompilationCallback, Compiler, OptimizeChunkAssets,
    ProcessAssets, StageTap,
};
use crate::minifier::{MinifyError, MinifyOutput, Minifier};
use crate::options::{CssMinimizerOptions, PostcssOptions};
use crate::plugin::{CssMinimizerPlugin, HookStrategy, HostVersion};
use crate::source::{MinifiedAsset, Source, SourceAndMap, SourceError, SourceMap};

/// Install the panic hook so Rust panics show up in the Node console
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Get the version of the WASM module
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// `new CssMinimizerPlugin(options, minify, webpack, sources)`
///
/// - `options`: `{ postcssOptions: { map } }`
/// - `minify`: `(css, postcssOptions) => Promise<{ css, map? }>`
/// - `webpack`: the webpack module; its `version` picks the hook family
/// - `sources`: module providing `RawSource` and `SourceMapSource`
#[wasm_bindgen(js_name = CssMinimizerPlugin)]
pub struct JsCssMinimizerPlugin {
    plugin: CssMinimizerPlugin<JsMinifier>,
    sources: Rc<JsSources>,
}

#[wasm_bindgen(js_class = CssMinimizerPlugin)]
impl JsCssMinimizerPlugin {
    #[wasm_bindgen(constructor)]
    pub fn new(
        options: JsValue,
        minify: Function,
        webpack: JsValue,
        sources: JsValue,
    ) -> Result<JsCssMinimizerPlugin, JsValue> {
        let options = if options.is_undefined() || options.is_null() {
            CssMinimizerOptions::default()
        } else {
            let json = String::from(js_sys::JSON::stringify(&options)?);
            CssMinimizerOptions::from_json(&json).map_err(into_js_error)?
        };
        let version = get(&webpack, "version")
            .map_err(into_js_error)?
            .as_string()
            .unwrap_or_default();
        let sources = JsSources::from_module(&sources).map_err(into_js_error)?;

        Ok(Self {
            plugin: CssMinimizerPlugin::new(
                options,
                JsMinifier { process: minify },
                HostVersion::parse(&version),
            ),
            sources: Rc::new(sources),
        })
    }

    /// Hook family this plugin taps: `"processAssets"` or `"optimizeChunkAssets"`
    #[wasm_bindgen(getter)]
    pub fn strategy(&self) -> String {
        match self.plugin.strategy() {
            HookStrategy::ProcessAssets => "processAssets".to_string(),
            HookStrategy::OptimizeChunkAssets => "optimizeChunkAssets".to_string(),
        }
    }

    #[wasm_bindgen]
    pub fn apply(&self, compiler: JsValue) -> Result<(), JsValue> {
        let mut compiler = JsCompiler {
            compiler,
            sources: Rc::clone(&self.sources),
        };
        self.plugin.apply(&mut compiler).map_err(into_js_error)
    }
}

/// A value the JS minifier rejected with, kept as-is.
#[derive(Debug)]
struct JsRejection(JsValue);

impl fmt::Display for JsRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&describe(&self.0))
    }
}

impl StdError for JsRejection {}

/// Minifier rejections go back to webpack untouched; everything else
/// becomes an `Error` carrying our message.
fn into_js_error(err: Error) -> JsValue {
    if let Error::Minify(minify) = &err {
        if let Some(rejection) = minify
            .source()
            .and_then(|source| source.downcast_ref::<JsRejection>())
        {
            return rejection.0.clone();
        }
    }
    js_sys::Error::new(&err.to_string()).into()
}

fn describe(value: &JsValue) -> String {
    if let Some(text) = value.as_string() {
        return text;
    }
    if let Some(error) = value.dyn_ref::<js_sys::Error>() {
        return String::from(error.message());
    }
    format!("{value:?}")
}

fn host_error(value: JsValue) -> Error {
    Error::Host(describe(&value))
}

fn get(target: &JsValue, key: &str) -> Result<JsValue> {
    Reflect::get(target, &JsValue::from_str(key)).map_err(host_error)
}

fn call_method(target: &JsValue, name: &str, args: &Array) -> Result<JsValue, JsValue> {
    let method: Function = Reflect::get(target, &JsValue::from_str(name))?.dyn_into()?;
    Reflect::apply(&method, target, args)
}

fn is_nullish(value: &JsValue) -> bool {
    value.is_undefined() || value.is_null()
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, serde_wasm_bindgen::Error> {
    value.serialize(&serde_wasm_bindgen::Serializer::json_compatible())
}

/// Source map objects may carry a `toJSON`; strings are parsed as JSON.
fn plain_map(map: &JsValue) -> Result<SourceMap, String> {
    let to_json = Reflect::get(map, &JsValue::from_str("toJSON")).map_err(|e| describe(&e))?;
    let plain = match to_json.dyn_ref::<Function>() {
        Some(to_json) => to_json.call0(map).map_err(|e| describe(&e))?,
        None => map.clone(),
    };
    match plain.as_string() {
        Some(json) => SourceMap::from_json(&json).map_err(|e| e.to_string()),
        None => serde_wasm_bindgen::from_value(plain).map_err(|e| e.to_string()),
    }
}

/// String or Buffer content
fn text_of(value: JsValue) -> Result<String, SourceError> {
    if let Some(text) = value.as_string() {
        return Ok(text);
    }
    match value.dyn_ref::<Uint8Array>() {
        Some(bytes) => String::from_utf8(bytes.to_vec())
            .map_err(|e| SourceError(format!("asset is not valid UTF-8: {e}"))),
        None => Err(SourceError(format!("asset source is not text: {}", describe(&value)))),
    }
}

struct JsMinifier {
    process: Function,
}

impl JsMinifier {
    fn rejected(value: JsValue) -> MinifyError {
        let rejection = JsRejection(value);
        MinifyError::with_source(rejection.to_string(), rejection)
    }

    fn start(&self, css: &str, options: &PostcssOptions) -> Result<Promise, MinifyError> {
        let options = to_js(options)
            .map_err(|e| MinifyError::new(format!("failed to pass options to the minifier: {e}")))?;
        let returned = self
            .process
            .call2(&JsValue::NULL, &JsValue::from_str(css), &options)
            .map_err(Self::rejected)?;
        Ok(Promise::resolve(&returned))
    }

    fn read_output(result: &JsValue) -> Result<MinifyOutput, MinifyError> {
        let css = get(result, "css")
            .ok()
            .and_then(|css| css.as_string())
            .ok_or_else(|| MinifyError::new("minifier result has no `css` string"))?;
        let map = get(result, "map").unwrap_or(JsValue::UNDEFINED);
        let output = MinifyOutput::new(css);
        if is_nullish(&map) {
            return Ok(output);
        }
        let map = plain_map(&map)
            .map_err(|e| MinifyError::new(format!("minifier returned an unreadable map: {e}")))?;
        Ok(output.with_map(map))
    }
}

impl Minifier for JsMinifier {
    fn minify<'a>(
        &'a self,
        css: &'a str,
        options: &'a PostcssOptions,
    ) -> LocalBoxFuture<'a, Result<MinifyOutput, MinifyError>> {
        // call into JS now so every asset of a pass is in flight together
        let started = self.start(css, options);
        async move {
            let result = JsFuture::from(started?).await.map_err(Self::rejected)?;
            Self::read_output(&result)
        }
        .boxed_local()
    }
}

/// `RawSource` / `SourceMapSource` constructors
struct JsSources {
    raw: Function,
    source_map: Function,
}

impl JsSources {
    fn from_module(module: &JsValue) -> Result<Self> {
        Ok(Self {
            raw: Self::constructor(module, "RawSource")?,
            source_map: Self::constructor(module, "SourceMapSource")?,
        })
    }

    fn constructor(module: &JsValue, name: &str) -> Result<Function> {
        get(module, name)?
            .dyn_into::<Function>()
            .map_err(|_| Error::Host(format!("`{name}` is not a constructor")))
    }

    fn build(&self, asset: &MinifiedAsset) -> Result<JsValue> {
        let (constructor, args) = match asset {
            MinifiedAsset::Raw(raw) => (&self.raw, Array::of1(&JsValue::from_str(raw.text()))),
            MinifiedAsset::Mapped(mapped) => {
                let map = to_js(mapped.map()).map_err(|e| Error::Host(e.to_string()))?;
                (
                    &self.source_map,
                    Array::of3(
                        &JsValue::from_str(mapped.text()),
                        &JsValue::from_str(mapped.name()),
                        &map,
                    ),
                )
            }
        };
        Reflect::construct(constructor, &args).map_err(host_error)
    }
}

struct JsAsset(JsValue);

impl JsAsset {
    fn read_source_and_map(&self, accessor: &Function) -> Result<SourceAndMap, SourceError> {
        let joint = accessor.call0(&self.0).map_err(|e| SourceError(describe(&e)))?;
        let source = Reflect::get(&joint, &JsValue::from_str("source"))
            .map_err(|e| SourceError(describe(&e)))?;
        let map = Reflect::get(&joint, &JsValue::from_str("map"))
            .map_err(|e| SourceError(describe(&e)))?;
        let map = if is_nullish(&map) {
            None
        } else {
            Some(plain_map(&map).map_err(SourceError)?)
        };
        Ok(SourceAndMap {
            source: text_of(source)?,
            map,
        })
    }
}

impl Source for JsAsset {
    fn source(&self) -> Result<String, SourceError> {
        let text = call_method(&self.0, "source", &Array::new()).map_err(|e| SourceError(describe(&e)))?;
        text_of(text)
    }

    fn source_and_map(&self) -> Option<Result<SourceAndMap, SourceError>> {
        let accessor = match Reflect::get(&self.0, &JsValue::from_str("sourceAndMap")) {
            Ok(accessor) => accessor,
            Err(e) => return Some(Err(SourceError(describe(&e)))),
        };
        let accessor = accessor.dyn_into::<Function>().ok()?;
        Some(self.read_source_and_map(&accessor))
    }
}

/// A webpack asset object (`compilation.assets` or the `processAssets` argument)
struct JsAssets {
    table: JsValue,
    sources: Rc<JsSources>,
}

impl AssetTable for JsAssets {
    type Asset = JsAsset;

    fn paths(&self) -> Vec<String> {
        Object::keys(self.table.unchecked_ref::<Object>())
            .iter()
            .filter_map(|key| key.as_string())
            .collect()
    }

    fn get(&self, path: &str) -> Option<JsAsset> {
        let asset = Reflect::get(&self.table, &JsValue::from_str(path)).ok()?;
        (!is_nullish(&asset)).then(|| JsAsset(asset))
    }

    fn replace(&mut self, path: &str, asset: MinifiedAsset) -> Result<()> {
        let key = JsValue::from_str(path);
        if !Reflect::has(&self.table, &key).map_err(host_error)? {
            return Err(Error::MissingAsset {
                path: path.to_string(),
            });
        }
        let value = self.sources.build(&asset)?;
        Reflect::set(&self.table, &key, &value).map_err(host_error)?;
        Ok(())
    }
}

fn read_chunks(chunks: &JsValue) -> Vec<Chunk> {
    Array::from(chunks)
        .iter()
        .map(|chunk| {
            let files = get(&chunk, "files").unwrap_or(JsValue::UNDEFINED);
            if is_nullish(&files) {
                Chunk::without_files()
            } else {
                // webpack 4 uses an array, later versions a Set
                Chunk::new(Array::from(&files).iter().filter_map(|file| file.as_string()))
            }
        })
        .collect()
}

struct JsCompilation {
    compilation: JsValue,
    sources: Rc<JsSources>,
}

impl JsCompilation {
    fn hook(&self, name: &str) -> Result<JsValue> {
        get(&get(&self.compilation, "hooks")?, name)
    }
}

impl Compilation for JsCompilation {
    type Assets = JsAssets;

    fn tap_process_assets(
        &mut self,
        tap: StageTap,
        listener: Rc<dyn ProcessAssets<JsAssets>>,
    ) -> Result<()> {
        let hook = self.hook("processAssets")?;
        let options = Object::new();
        Reflect::set(&options, &JsValue::from_str("name"), &JsValue::from_str(tap.name))
            .map_err(host_error)?;
        Reflect::set(&options, &JsValue::from_str("stage"), &JsValue::from(tap.stage))
            .map_err(host_error)?;

        let sources = Rc::clone(&self.sources);
        let callback = Closure::<dyn FnMut(JsValue) -> Promise>::new(move |assets: JsValue| {
            let listener = Rc::clone(&listener);
            let mut table = JsAssets {
                table: assets,
                sources: Rc::clone(&sources),
            };
            future_to_promise(async move {
                listener
                    .process_assets(&mut table)
                    .await
                    .map(|()| JsValue::UNDEFINED)
                    .map_err(into_js_error)
            })
        });

        // owned by the JS hook from here on, freed with the compilation
        let callback = callback.into_js_value();
        call_method(&hook, "tapPromise", &Array::of2(&options, &callback)).map_err(host_error)?;
        Ok(())
    }

    fn tap_optimize_chunk_assets(
        &mut self,
        name: &'static str,
        listener: Rc<dyn OptimizeChunkAssets<JsAssets>>,
    ) -> Result<()> {
        let hook = self.hook("optimizeChunkAssets")?;

        let compilation = self.compilation.clone();
        let sources = Rc::clone(&self.sources);
        let callback = Closure::<dyn FnMut(JsValue) -> Promise>::new(move |chunks: JsValue| {
            let listener = Rc::clone(&listener);
            let compilation = compilation.clone();
            let sources = Rc::clone(&sources);
            future_to_promise(async move {
                let chunks = read_chunks(&chunks);
                let table = get(&compilation, "assets").map_err(into_js_error)?;
                let mut table = JsAssets { table, sources };
                listener
                    .optimize_chunk_assets(&chunks, &mut table)
                    .await
                    .map(|()| JsValue::UNDEFINED)
                    .map_err(into_js_error)
            })
        });

        let callback = callback.into_js_value();
        call_method(&hook, "tapPromise", &Array::of2(&JsValue::from_str(name), &callback))
            .map_err(host_error)?;
        Ok(())
    }
}

struct JsCompiler {
    compiler: JsValue,
    sources: Rc<JsSources>,
}

impl Compiler for JsCompiler {
    type Compilation = JsCompilation;

    fn on_compilation(
        &mut self,
        name: &'static str,
        mut callback: CompilationCallback<JsCompilation>,
    ) -> Result<()> {
        let hook = get(&get(&self.compiler, "hooks")?, "compilation")?;

        let sources = Rc::clone(&self.sources);
        let listener = Closure::<dyn FnMut(JsValue) -> Result<(), JsValue>>::new(
            move |compilation: JsValue| {
                let mut compilation = JsCompilation {
                    compilation,
                    sources: Rc::clone(&sources),
                };
                callback(&mut compilation).map_err(into_js_error)
            },
        );

        let listener = listener.into_js_value();
        call_method(&hook, "tap", &Array::of2(&JsValue::from_str(name), &listener))
            .map_err(host_error)?;
        Ok(())
    }
}
