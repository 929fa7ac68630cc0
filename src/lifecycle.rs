use chrono::Local;
use log::{error, info};

use crate::engine::{EngineError, RevisionId, VersionControlEngine};
use crate::error::LifecycleError;
use crate::handle::{InitKind, RepositoryHandle};
use crate::lock::PassLock;

/// What one completed pass produced.
#[derive(Debug)]
pub struct PassOutcome {
    pub kind: InitKind,
    pub revision: RevisionId,
    pub branch: String,
}

/// Branch name for today, unique per day: `YYYY-MM-DD` in local time.
pub fn dated_branch_name() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

/// Emit the status line for one step and pass its result through.
fn logged<T>(
    step: &str,
    context: &str,
    res: Result<T, LifecycleError>,
) -> Result<T, LifecycleError> {
    match &res {
        Ok(_) => info!("[ Function: {} ] {} [ Status: Success ]", step, context),
        Err(e) => error!(
            "[ Function: {} ] {} [ Status: Failed ] [ Error: {} ]",
            step, context, e
        ),
    }
    res
}

/// Execute one full lifecycle pass: Initialize → Stage → Commit → Branch →
/// Publish.
///
/// The pass holds an advisory lock on the local path for its whole
/// duration and halts on the first failing step, leaving the handle in the
/// terminal failed phase. One status line is emitted per step.
///
/// `branch` overrides the dated branch name; `None` uses today's date.
///
/// # Errors
/// The typed error of whichever step failed; lock contention surfaces as an
/// initialization failure before any step runs.
pub fn run_pass<E: VersionControlEngine>(
    engine: &E,
    handle: &mut RepositoryHandle<E>,
    message: &str,
    branch: Option<&str>,
) -> Result<PassOutcome, LifecycleError> {
    let _lock = PassLock::acquire(handle.local_path()).map_err(|source| {
        let err = LifecycleError::Initialization {
            path: handle.local_path().to_path_buf(),
            source: EngineError::Io(source),
        };
        error!(
            "[ Function: Initialize ] [ Directory: {} ] [ Status: Failed ] [ Error: {} ]",
            handle.local_path().display(),
            err
        );
        err
    })?;

    let branch = match branch {
        Some(b) => b.to_string(),
        None => dated_branch_name(),
    };

    let dir_ctx = format!("[ Directory: {} ]", handle.local_path().display());
    let repo_ctx = format!("[ Repo: {} ]", handle.name());

    // the initialize line names the path actually taken (Clone or Open)
    let kind = match handle.initialize(engine) {
        Ok(kind) => {
            info!(
                "[ Function: {} ] {} [ Status: Success ]",
                kind.as_str(),
                dir_ctx
            );
            kind
        }
        Err(e) => {
            error!(
                "[ Function: Initialize ] {} [ Status: Failed ] [ Error: {} ]",
                dir_ctx, e
            );
            return Err(e);
        }
    };

    logged("Stage", &repo_ctx, handle.stage(engine))?;
    let revision = logged(
        "Commit",
        &format!("[ Message: {} ]", message),
        handle.commit(engine, message),
    )?;
    logged(
        "Branch",
        &format!("{} [ Branch: {} ]", repo_ctx, branch),
        handle.branch(engine, &branch),
    )?;
    logged("Publish", &repo_ctx, handle.publish(engine))?;

    Ok(PassOutcome {
        kind,
        revision,
        branch,
    })
}

/// Resume-only listing of local head names for an existing working copy.
///
/// Unlike [`run_pass`] this never clones: the handle resumes directly, so
/// a missing working copy is an initialization error, not an excuse to
/// contact the remote.
pub fn list_branches<E: VersionControlEngine>(
    engine: &E,
    handle: &mut RepositoryHandle<E>,
) -> Result<Vec<String>, LifecycleError> {
    handle.resume(engine)?;
    Ok(handle.branches(engine))
}
