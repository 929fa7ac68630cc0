//! Crate entry point for **snapvault**.
//!
//! This library implements the repository lifecycle behind the `snapvault`
//! CLI: clone-or-resume a git working copy, stage and commit its current
//! contents, label the tip with a dated branch, and publish everything to
//! the remote with bearer credentials.
//!
//! Each submodule encapsulates one responsibility (configuration, the
//! engine boundary, the handle state machine, orchestration). The `pub use`
//! re-exports make the public surface accessible from `snapvault::*`.

mod engine;
mod error;
mod handle;
mod lifecycle;
mod lock;
mod settings;

pub use engine::{EngineError, Git2Engine, RevisionId, VersionControlEngine};
pub use error::LifecycleError;
pub use handle::{Credentials, InitKind, Phase, RepositoryHandle};
pub use lifecycle::{PassOutcome, dated_branch_name, list_branches, run_pass};
pub use lock::PassLock;
pub use settings::{Settings, TOKEN_ENV};
