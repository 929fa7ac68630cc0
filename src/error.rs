use std::path::PathBuf;
use thiserror::Error;

use crate::engine::EngineError;
use crate::handle::Phase;

/// One error kind per lifecycle step, each carrying the engine-level cause.
///
/// The orchestrator halts the pass on the first of these; nothing is
/// swallowed except branch listing, which degrades to an empty result
/// (see [`crate::handle::RepositoryHandle::branches`]).
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to initialize working copy at `{}`: {source}", .path.display())]
    Initialization {
        path: PathBuf,
        #[source]
        source: EngineError,
    },

    #[error("failed to stage working tree: {source}")]
    Staging {
        #[source]
        source: EngineError,
    },

    #[error("failed to commit staged tree: {source}")]
    Commit {
        #[source]
        source: EngineError,
    },

    #[error("failed to write reference `{name}`: {source}")]
    Reference {
        name: String,
        #[source]
        source: EngineError,
    },

    #[error("failed to publish to `{remote}`: {source}")]
    Publish {
        remote: String,
        #[source]
        source: EngineError,
    },

    /// A lifecycle step was invoked out of order. This is a caller bug,
    /// not an engine failure, and carries no underlying cause.
    #[error("`{op}` requires a handle in phase `{expected}`, but it is `{actual}`")]
    OutOfOrder {
        op: &'static str,
        expected: Phase,
        actual: Phase,
    },
}
