use log::warn;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::engine::{RevisionId, VersionControlEngine};
use crate::error::LifecycleError;

/// Where a handle is within one lifecycle pass.
///
/// Each step requires the phase its predecessor establishes; any failure
/// moves the handle to the terminal `Failed` phase, which is distinguishable
/// from every success phase so a partial pass can never be mistaken for a
/// complete one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unbound,
    Bound,
    Staged,
    Committed,
    Branched,
    Published,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Unbound => "unbound",
            Phase::Bound => "bound",
            Phase::Staged => "staged",
            Phase::Committed => "committed",
            Phase::Branched => "branched",
            Phase::Published => "published",
            Phase::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// How Initialize associated the working copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitKind {
    /// Fresh clone of the remote; full history transfer happened.
    Cloned,
    /// Attached to an existing local working copy; no network I/O.
    Resumed,
}

impl InitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InitKind::Cloned => "Clone",
            InitKind::Resumed => "Open",
        }
    }
}

/// Bearer credentials plus the committer identity derived from them.
///
/// Used only at commit-authoring time (`username`/`email`) and at
/// clone/publish time (`username`/`token`). Held by value in the handle,
/// never copied out.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub token: String,
    pub email: String,
}

/// One managed working copy: identity, credentials, and lifecycle state.
///
/// A handle is created `Unbound`, transitions to `Bound` exactly once via
/// [`initialize`](RepositoryHandle::initialize), and walks the remaining
/// phases in order. All mutating operations take `&mut self`, so two steps
/// can never run concurrently against the same handle.
pub struct RepositoryHandle<E: VersionControlEngine> {
    name: String,
    local_path: PathBuf,
    remote_url: String,
    credentials: Credentials,
    phase: Phase,
    repo: Option<E::Repo>,
}

impl<E: VersionControlEngine> RepositoryHandle<E> {
    pub fn new(
        name: impl Into<String>,
        local_path: impl Into<PathBuf>,
        remote_url: impl Into<String>,
        credentials: Credentials,
    ) -> Self {
        RepositoryHandle {
            name: name.into(),
            local_path: local_path.into(),
            remote_url: remote_url.into(),
            credentials,
            phase: Phase::Unbound,
            repo: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    pub fn remote_url(&self) -> &str {
        &self.remote_url
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn require(&self, op: &'static str, expected: Phase) -> Result<(), LifecycleError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(LifecycleError::OutOfOrder {
                op,
                expected,
                actual: self.phase,
            })
        }
    }

    fn fail<T>(&mut self, err: LifecycleError) -> Result<T, LifecycleError> {
        self.phase = Phase::Failed;
        Err(err)
    }

    /// Associate a working copy: clone the remote if `local_path` holds no
    /// working copy, otherwise resume the existing one. The choice is made
    /// exactly once per handle; re-invoking on a bound handle is a
    /// precondition violation.
    pub fn initialize(&mut self, engine: &E) -> Result<InitKind, LifecycleError> {
        self.require("Initialize", Phase::Unbound)?;

        let existed = engine.exists(&self.local_path);
        let attempt = if existed {
            engine.open_repo(&self.local_path)
        } else {
            engine.clone_repo(
                &self.remote_url,
                &self.local_path,
                &self.credentials.username,
                &self.credentials.token,
            )
        };

        match attempt {
            Ok(repo) => {
                self.repo = Some(repo);
                self.phase = Phase::Bound;
                Ok(if existed {
                    InitKind::Resumed
                } else {
                    InitKind::Cloned
                })
            }
            Err(source) => self.fail(LifecycleError::Initialization {
                path: self.local_path.clone(),
                source,
            }),
        }
    }

    /// Associate an existing working copy without consulting the remote.
    ///
    /// Unlike [`initialize`](RepositoryHandle::initialize) this never
    /// falls back to cloning: a missing or corrupt working copy is an
    /// initialization failure. Used by read-only entrypoints.
    pub fn resume(&mut self, engine: &E) -> Result<(), LifecycleError> {
        self.require("Initialize", Phase::Unbound)?;

        match engine.open_repo(&self.local_path) {
            Ok(repo) => {
                self.repo = Some(repo);
                self.phase = Phase::Bound;
                Ok(())
            }
            Err(source) => self.fail(LifecycleError::Initialization {
                path: self.local_path.clone(),
                source,
            }),
        }
    }

    /// Mark the entire working tree for inclusion in the next revision.
    pub fn stage(&mut self, engine: &E) -> Result<(), LifecycleError> {
        self.require("Stage", Phase::Bound)?;
        let Some(repo) = self.repo.as_mut() else {
            return Err(LifecycleError::OutOfOrder {
                op: "Stage",
                expected: Phase::Bound,
                actual: Phase::Unbound,
            });
        };

        match engine.stage_all(repo) {
            Ok(()) => {
                self.phase = Phase::Staged;
                Ok(())
            }
            Err(source) => self.fail(LifecycleError::Staging { source }),
        }
    }

    /// Produce a revision from the staged tree, authored with the handle's
    /// committer identity and `message`.
    pub fn commit(&mut self, engine: &E, message: &str) -> Result<RevisionId, LifecycleError> {
        self.require("Commit", Phase::Staged)?;
        let Some(repo) = self.repo.as_mut() else {
            return Err(LifecycleError::OutOfOrder {
                op: "Commit",
                expected: Phase::Staged,
                actual: Phase::Unbound,
            });
        };

        match engine.commit(
            repo,
            message,
            &self.credentials.username,
            &self.credentials.email,
        ) {
            Ok(rev) => {
                self.phase = Phase::Committed;
                Ok(rev)
            }
            Err(source) => self.fail(LifecycleError::Commit { source }),
        }
    }

    /// Point `refs/heads/<name>` at the current tip, overwriting an
    /// existing reference of that name. Returns the tip it was pointed at.
    pub fn branch(&mut self, engine: &E, name: &str) -> Result<RevisionId, LifecycleError> {
        self.require("Branch", Phase::Committed)?;
        let Some(repo) = self.repo.as_mut() else {
            return Err(LifecycleError::OutOfOrder {
                op: "Branch",
                expected: Phase::Committed,
                actual: Phase::Unbound,
            });
        };

        let attempt = engine
            .resolve_tip(repo)
            .and_then(|tip| engine.set_reference(repo, name, &tip).map(|()| tip));

        match attempt {
            Ok(tip) => {
                self.phase = Phase::Branched;
                Ok(tip)
            }
            Err(source) => self.fail(LifecycleError::Reference {
                name: name.to_string(),
                source,
            }),
        }
    }

    /// Transfer all local heads and their revisions to the remote.
    pub fn publish(&mut self, engine: &E) -> Result<(), LifecycleError> {
        self.require("Publish", Phase::Branched)?;
        let Some(repo) = self.repo.as_mut() else {
            return Err(LifecycleError::OutOfOrder {
                op: "Publish",
                expected: Phase::Branched,
                actual: Phase::Unbound,
            });
        };

        match engine.push(repo, &self.credentials.username, &self.credentials.token) {
            Ok(()) => {
                self.phase = Phase::Published;
                Ok(())
            }
            Err(source) => self.fail(LifecycleError::Publish {
                remote: self.remote_url.clone(),
                source,
            }),
        }
    }

    /// Local head reference names.
    ///
    /// Read-only query; a failure degrades to an empty list with a warning
    /// so that listing never blocks the lifecycle.
    pub fn branches(&self, engine: &E) -> Vec<String> {
        let Some(repo) = self.repo.as_ref() else {
            warn!(
                "[ Function: Branches ] [ Repo: {} ] [ Status: Failed ] [ Error: handle is unbound ]",
                self.name
            );
            return Vec::new();
        };

        match engine.list_references(repo) {
            Ok(refs) => refs,
            Err(e) => {
                warn!(
                    "[ Function: Branches ] [ Repo: {} ] [ Status: Failed ] [ Error: {} ]",
                    self.name, e
                );
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineError;
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    /// In-memory engine double. `fail` names the single operation that
    /// should error; everything else succeeds.
    struct MockEngine {
        exists: bool,
        fail: Option<&'static str>,
        calls: RefCell<Vec<&'static str>>,
    }

    #[derive(Default)]
    struct MockRepo {
        staged: u32,
        commits: u32,
        tip: Option<String>,
        refs: BTreeMap<String, String>,
    }

    impl MockEngine {
        fn new(exists: bool) -> Self {
            MockEngine {
                exists,
                fail: None,
                calls: RefCell::new(Vec::new()),
            }
        }

        fn failing(exists: bool, op: &'static str) -> Self {
            MockEngine {
                exists,
                fail: Some(op),
                calls: RefCell::new(Vec::new()),
            }
        }

        fn check(&self, op: &'static str) -> Result<(), EngineError> {
            self.calls.borrow_mut().push(op);
            if self.fail == Some(op) {
                Err(EngineError::Git(git2::Error::from_str("injected")))
            } else {
                Ok(())
            }
        }
    }

    impl VersionControlEngine for MockEngine {
        type Repo = MockRepo;

        fn exists(&self, _path: &Path) -> bool {
            self.exists
        }

        fn clone_repo(
            &self,
            _url: &str,
            _path: &Path,
            _username: &str,
            _token: &str,
        ) -> Result<MockRepo, EngineError> {
            self.check("clone")?;
            Ok(MockRepo::default())
        }

        fn open_repo(&self, _path: &Path) -> Result<MockRepo, EngineError> {
            self.check("open")?;
            Ok(MockRepo::default())
        }

        fn stage_all(&self, repo: &mut MockRepo) -> Result<(), EngineError> {
            self.check("stage")?;
            repo.staged += 1;
            Ok(())
        }

        fn commit(
            &self,
            repo: &mut MockRepo,
            _message: &str,
            _author: &str,
            _email: &str,
        ) -> Result<RevisionId, EngineError> {
            self.check("commit")?;
            repo.commits += 1;
            let rev = format!("rev-{}", repo.commits);
            repo.tip = Some(rev.clone());
            Ok(rev)
        }

        fn resolve_tip(&self, repo: &MockRepo) -> Result<RevisionId, EngineError> {
            self.check("tip")?;
            repo.tip.clone().ok_or(EngineError::Unborn)
        }

        fn set_reference(
            &self,
            repo: &mut MockRepo,
            name: &str,
            target: &RevisionId,
        ) -> Result<(), EngineError> {
            self.check("set_ref")?;
            repo.refs.insert(name.to_string(), target.clone());
            Ok(())
        }

        fn list_references(&self, repo: &MockRepo) -> Result<Vec<String>, EngineError> {
            self.check("list")?;
            Ok(repo.refs.keys().cloned().collect())
        }

        fn push(
            &self,
            _repo: &mut MockRepo,
            _username: &str,
            _token: &str,
        ) -> Result<(), EngineError> {
            self.check("push")
        }
    }

    fn handle() -> RepositoryHandle<MockEngine> {
        RepositoryHandle::new(
            "backup",
            "/tmp/backup",
            "https://example.com/backup.git",
            Credentials {
                username: "user".into(),
                token: "secret".into(),
                email: "user@example.com".into(),
            },
        )
    }

    #[test]
    fn initialize_clones_when_path_absent() {
        let engine = MockEngine::new(false);
        let mut h = handle();
        assert_eq!(h.initialize(&engine).unwrap(), InitKind::Cloned);
        assert_eq!(h.phase(), Phase::Bound);
        assert_eq!(*engine.calls.borrow(), vec!["clone"]);
    }

    #[test]
    fn initialize_resumes_when_path_present() {
        let engine = MockEngine::new(true);
        let mut h = handle();
        assert_eq!(h.initialize(&engine).unwrap(), InitKind::Resumed);
        assert_eq!(*engine.calls.borrow(), vec!["open"]);
    }

    #[test]
    fn initialize_twice_is_a_precondition_violation() {
        let engine = MockEngine::new(true);
        let mut h = handle();
        h.initialize(&engine).unwrap();
        let err = h.initialize(&engine).unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::OutOfOrder {
                op: "Initialize",
                actual: Phase::Bound,
                ..
            }
        ));
        // the violation does not poison the handle
        assert_eq!(h.phase(), Phase::Bound);
    }

    #[test]
    fn steps_before_initialize_fail_fast() {
        let engine = MockEngine::new(true);
        let mut h = handle();
        assert!(matches!(
            h.stage(&engine).unwrap_err(),
            LifecycleError::OutOfOrder { op: "Stage", .. }
        ));
        assert!(matches!(
            h.commit(&engine, "m").unwrap_err(),
            LifecycleError::OutOfOrder { op: "Commit", .. }
        ));
        assert!(matches!(
            h.publish(&engine).unwrap_err(),
            LifecycleError::OutOfOrder { op: "Publish", .. }
        ));
        assert!(engine.calls.borrow().is_empty());
    }

    #[test]
    fn skipping_a_step_is_rejected() {
        let engine = MockEngine::new(true);
        let mut h = handle();
        h.initialize(&engine).unwrap();
        let err = h.commit(&engine, "m").unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::OutOfOrder {
                op: "Commit",
                expected: Phase::Staged,
                actual: Phase::Bound,
            }
        ));
    }

    #[test]
    fn full_pass_walks_all_phases() {
        let engine = MockEngine::new(false);
        let mut h = handle();
        h.initialize(&engine).unwrap();
        h.stage(&engine).unwrap();
        let rev = h.commit(&engine, "backup").unwrap();
        let tip = h.branch(&engine, "2024-01-01").unwrap();
        assert_eq!(rev, tip);
        h.publish(&engine).unwrap();
        assert_eq!(h.phase(), Phase::Published);
        assert_eq!(h.branches(&engine), vec!["2024-01-01".to_string()]);
    }

    #[test]
    fn failed_step_moves_handle_to_terminal_failed() {
        let engine = MockEngine::failing(false, "push");
        let mut h = handle();
        h.initialize(&engine).unwrap();
        h.stage(&engine).unwrap();
        h.commit(&engine, "backup").unwrap();
        h.branch(&engine, "2024-01-01").unwrap();
        let err = h.publish(&engine).unwrap_err();
        assert!(matches!(err, LifecycleError::Publish { .. }));
        assert_eq!(h.phase(), Phase::Failed);
        // a failed handle accepts no further steps
        assert!(matches!(
            h.publish(&engine).unwrap_err(),
            LifecycleError::OutOfOrder { .. }
        ));
    }

    #[test]
    fn unresolvable_tip_is_a_reference_error() {
        let engine = MockEngine::failing(true, "tip");
        let mut h = handle();
        h.initialize(&engine).unwrap();
        h.stage(&engine).unwrap();
        h.commit(&engine, "backup").unwrap();
        let err = h.branch(&engine, "2024-01-01").unwrap_err();
        assert!(matches!(err, LifecycleError::Reference { .. }));
        assert_eq!(h.phase(), Phase::Failed);
    }

    #[test]
    fn resume_opens_without_consulting_path_existence() {
        // exists() says there is nothing to open, but resume must go
        // straight to open rather than deciding to clone
        let engine = MockEngine::new(false);
        let mut h = handle();
        h.resume(&engine).unwrap();
        assert_eq!(h.phase(), Phase::Bound);
        assert_eq!(*engine.calls.borrow(), vec!["open"]);
    }

    #[test]
    fn resume_failure_is_an_initialization_error() {
        let engine = MockEngine::failing(true, "open");
        let mut h = handle();
        let err = h.resume(&engine).unwrap_err();
        assert!(matches!(err, LifecycleError::Initialization { .. }));
        assert_eq!(h.phase(), Phase::Failed);
    }

    #[test]
    fn branch_listing_degrades_to_empty_on_failure() {
        let engine = MockEngine::failing(true, "list");
        let mut h = handle();
        h.initialize(&engine).unwrap();
        assert!(h.branches(&engine).is_empty());
        // leniency must not disturb the lifecycle phase
        assert_eq!(h.phase(), Phase::Bound);
    }
}
