use std::fs::{self, File, OpenOptions, TryLockError};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Advisory exclusive lock on a working-copy path for the duration of one
/// lifecycle pass.
///
/// The working copy has no internal locking, so two passes against the same
/// path must never overlap. The lock is an OS-level advisory lock on a
/// persistent sibling `<dir>.lock` file, so it dies with the process: a
/// crashed pass leaves the file behind but never wedges later passes. The
/// lock is released on drop, on every exit path including failure.
#[derive(Debug)]
pub struct PassLock {
    file: File,
}

impl PassLock {
    /// # Errors
    /// Returns `WouldBlock` if another pass holds the lock, or any other
    /// I/O error from opening or locking the lock file.
    pub fn acquire(target: &Path) -> io::Result<PassLock> {
        let path = lock_path(target);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        match file.try_lock() {
            Ok(()) => {}
            Err(TryLockError::WouldBlock) => {
                return Err(io::Error::new(
                    io::ErrorKind::WouldBlock,
                    format!("another pass holds {}", path.display()),
                ));
            }
            Err(TryLockError::Error(e)) => return Err(e),
        }
        // owner pid, for a human inspecting the lock file
        let _ = file.set_len(0);
        let _ = writeln!(&file, "{}", std::process::id());
        Ok(PassLock { file })
    }
}

impl Drop for PassLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

fn lock_path(target: &Path) -> PathBuf {
    match target.file_name() {
        Some(name) => target.with_file_name(format!("{}.lock", name.to_string_lossy())),
        None => target.join(".snapvault.lock"),
    }
}
