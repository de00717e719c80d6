//! Error types for CSS asset minimization.

use thiserror::Error;

use crate::minifier::MinifyError;
use crate::source::SourceError;

/// Errors raised while registering the plugin or optimizing assets.
#[derive(Debug, Error)]
pub enum Error {
    /// The external minifier rejected an asset. Passed through untouched.
    #[error(transparent)]
    Minify(#[from] MinifyError),

    /// The asset's text or source map could not be read.
    #[error("failed to read asset `{path}`")]
    Source {
        path: String,
        #[source]
        source: SourceError,
    },

    /// A chunk referenced a file that is not in the compilation's asset table.
    #[error("asset `{path}` is not present in the compilation")]
    MissingAsset { path: String },

    /// Plugin options could not be parsed.
    #[error("invalid plugin options: {0}")]
    Options(#[from] serde_json::Error),

    /// The host refused a hook registration or an asset write.
    #[error("host error: {0}")]
    Host(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
