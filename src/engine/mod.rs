//! Version-control engine boundary.
//!
//! This module defines the capability interface the lifecycle depends on
//! and re-exports the production backend (`git2_backend`).
//!
//! The idea is to hide the storage/transfer implementation (currently the
//! `git2` crate) behind [`VersionControlEngine`] so that the lifecycle state
//! machine can be exercised against a test double, and so that a future
//! backend could be swapped in without touching the rest of the codebase.

mod git2_backend;

pub use git2_backend::Git2Engine;

use std::path::Path;
use thiserror::Error;

/// Hex content address of a revision.
pub type RevisionId = String;

/// Failures surfaced by an engine operation.
///
/// `NothingToCommit` and `Unborn` are split out from the backend error
/// because the lifecycle treats them as distinct, deliberate conditions
/// rather than opaque backend failures.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Git(#[from] git2::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("nothing to commit (staged tree matches the current tip)")]
    NothingToCommit,
    #[error("working copy has no revisions yet")]
    Unborn,
}

/// Abstract capability over a git-compatible storage/transfer engine.
///
/// All operations act on an opaque working-copy association (`Repo`) owned
/// by exactly one [`crate::handle::RepositoryHandle`]. Mutating operations
/// take `&mut` so exclusivity is enforced at compile time.
pub trait VersionControlEngine {
    type Repo;

    /// Whether a working copy already exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Full clone of `url` into `path`, authenticating with `username`/`token`.
    fn clone_repo(
        &self,
        url: &str,
        path: &Path,
        username: &str,
        token: &str,
    ) -> Result<Self::Repo, EngineError>;

    /// Attach to an existing working copy at `path`. No network I/O.
    fn open_repo(&self, path: &Path) -> Result<Self::Repo, EngineError>;

    /// Stage the entire working tree, including deletions. Idempotent.
    fn stage_all(&self, repo: &mut Self::Repo) -> Result<(), EngineError>;

    /// Produce a revision from the staged tree, authored `author <email>`
    /// and timestamped at invocation.
    ///
    /// # Errors
    /// Returns [`EngineError::NothingToCommit`] if the staged tree is
    /// identical to the current tip's tree.
    fn commit(
        &self,
        repo: &mut Self::Repo,
        message: &str,
        author: &str,
        email: &str,
    ) -> Result<RevisionId, EngineError>;

    /// Resolve the revision the working copy's primary pointer references.
    ///
    /// # Errors
    /// Returns [`EngineError::Unborn`] if the working copy has no revisions.
    fn resolve_tip(&self, repo: &Self::Repo) -> Result<RevisionId, EngineError>;

    /// Write `refs/heads/<name>` pointing at `target`, overwriting any
    /// existing reference of that name (last-writer-wins).
    fn set_reference(
        &self,
        repo: &mut Self::Repo,
        name: &str,
        target: &RevisionId,
    ) -> Result<(), EngineError>;

    /// All local head reference names, engine-native order.
    fn list_references(&self, repo: &Self::Repo) -> Result<Vec<String>, EngineError>;

    /// Transfer all local heads and their reachable revisions to the
    /// remote, authenticating with `username`/`token`.
    fn push(
        &self,
        repo: &mut Self::Repo,
        username: &str,
        token: &str,
    ) -> Result<(), EngineError>;
}
