use chrono::Local;
use git2::{
    Cred, FetchOptions, IndexAddOption, PushOptions, RemoteCallbacks, Repository, Signature, Time,
    build::RepoBuilder,
};
use std::path::Path;
use std::time::{Duration, Instant};

use super::{EngineError, RevisionId, VersionControlEngine};

/// Production engine backed by the `git2` crate.
///
/// Holds no per-repository state; the working-copy association lives in the
/// handle. The only knob is an optional wall-clock limit applied to the two
/// network-bound operations (clone and push).
pub struct Git2Engine {
    network_limit: Option<Duration>,
}

impl Git2Engine {
    pub fn new(network_limit: Option<Duration>) -> Self {
        Git2Engine { network_limit }
    }
}

/// Build `RemoteCallbacks` that present `username`/`token` as plaintext
/// bearer credentials over the transport.
///
/// If `limit` is set, the callbacks abort the transfer once the elapsed
/// time exceeds it; `git2` then surfaces the abort as an error from the
/// surrounding clone/push call. The check runs from whichever hooks the
/// transport drives: indexer progress and sideband text on the fetch side,
/// reference negotiation on the push side. libgit2 exposes no cancellable
/// hook inside the pack-upload phase itself, so a push that stalls after
/// negotiation on a silent remote can still outlive the limit.
fn auth_callbacks(username: &str, token: &str, limit: Option<Duration>) -> RemoteCallbacks<'static> {
    let user = username.to_string();
    let pass = token.to_string();

    let mut cb = RemoteCallbacks::new();
    cb.credentials(move |_url, _username_from_url, _allowed| {
        Cred::userpass_plaintext(&user, &pass)
    });

    if let Some(limit) = limit {
        let started = Instant::now();
        cb.transfer_progress(move |_stats| started.elapsed() <= limit);
        cb.sideband_progress(move |_data| started.elapsed() <= limit);
        cb.push_negotiation(move |_updates| {
            if started.elapsed() <= limit {
                Ok(())
            } else {
                Err(git2::Error::from_str("network deadline exceeded"))
            }
        });
    }

    cb
}

impl VersionControlEngine for Git2Engine {
    type Repo = Repository;

    fn exists(&self, path: &Path) -> bool {
        path.join(".git").exists()
    }

    fn clone_repo(
        &self,
        url: &str,
        path: &Path,
        username: &str,
        token: &str,
    ) -> Result<Repository, EngineError> {
        let mut fo = FetchOptions::new();
        fo.remote_callbacks(auth_callbacks(username, token, self.network_limit));

        let mut builder = RepoBuilder::new();
        builder.fetch_options(fo);

        Ok(builder.clone(url, path)?)
    }

    fn open_repo(&self, path: &Path) -> Result<Repository, EngineError> {
        Ok(Repository::open(path)?)
    }

    fn stage_all(&self, repo: &mut Repository) -> Result<(), EngineError> {
        let mut index = repo.index()?;
        // add_all picks up new and modified entries, update_all records
        // deletions of files already tracked by the index.
        index.add_all(["*"], IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"], None)?;
        index.write()?;
        Ok(())
    }

    fn commit(
        &self,
        repo: &mut Repository,
        message: &str,
        author: &str,
        email: &str,
    ) -> Result<RevisionId, EngineError> {
        let mut index = repo.index()?;
        let tree_id = index.write_tree()?;
        let tree = repo.find_tree(tree_id)?;

        let parent = match repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(e)
                if e.code() == git2::ErrorCode::UnbornBranch
                    || e.code() == git2::ErrorCode::NotFound =>
            {
                None
            }
            Err(e) => return Err(e.into()),
        };

        match &parent {
            Some(p) if p.tree_id() == tree_id => return Err(EngineError::NothingToCommit),
            None if tree.is_empty() => return Err(EngineError::NothingToCommit),
            _ => {}
        }

        let now = Local::now();
        let when = Time::new(now.timestamp(), now.offset().local_minus_utc() / 60);
        let sig = Signature::new(author, email, &when)?;

        let parents: Vec<&git2::Commit> = parent.iter().collect();
        let oid = repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?;
        Ok(oid.to_string())
    }

    fn resolve_tip(&self, repo: &Repository) -> Result<RevisionId, EngineError> {
        match repo.head() {
            Ok(head) => Ok(head.peel_to_commit()?.id().to_string()),
            Err(e)
                if e.code() == git2::ErrorCode::UnbornBranch
                    || e.code() == git2::ErrorCode::NotFound =>
            {
                Err(EngineError::Unborn)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn set_reference(
        &self,
        repo: &mut Repository,
        name: &str,
        target: &RevisionId,
    ) -> Result<(), EngineError> {
        let oid = git2::Oid::from_str(target)?;
        repo.reference(
            &format!("refs/heads/{}", name),
            oid,
            true,
            &format!("snapvault: branch {}", name),
        )?;
        Ok(())
    }

    fn list_references(&self, repo: &Repository) -> Result<Vec<String>, EngineError> {
        let mut out = Vec::new();
        for reference in repo.references_glob("refs/heads/*")? {
            let reference = reference?;
            if let Some(name) = reference.name() {
                out.push(name.to_string());
            }
        }
        out.sort();
        Ok(out)
    }

    fn push(
        &self,
        repo: &mut Repository,
        username: &str,
        token: &str,
    ) -> Result<(), EngineError> {
        let mut remote = repo.find_remote("origin")?;

        let mut cb = auth_callbacks(username, token, self.network_limit);
        // The remote reports per-reference acceptance after the pack
        // transfer; a rejection of any single reference fails the push.
        cb.push_update_reference(|refname, status| match status {
            None => Ok(()),
            Some(msg) => Err(git2::Error::from_str(&format!(
                "remote rejected {}: {}",
                refname, msg
            ))),
        });

        let mut po = PushOptions::new();
        po.remote_callbacks(cb);

        remote.push(&["refs/heads/*:refs/heads/*"], Some(&mut po))?;
        Ok(())
    }
}
