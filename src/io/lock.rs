use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::debug;

const LOCK_FILE: &str = ".lock";

/// How long a write waits for another `tt` process before giving up
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

const FIRST_POLL: Duration = Duration::from_millis(5);
const MAX_POLL: Duration = Duration::from_millis(80);

/// Exclusive hold on a workspace's `records.json` for one read-modify-write.
///
/// The lock file carries the holder's pid so a waiting process can say who
/// it is waiting on. Dropping the guard releases the flock and removes the
/// file.
#[derive(Debug)]
pub struct WriteLock {
    file: File,
    path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("could not open lock file {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{} is busy{}", path.display(), holder.map(|pid| format!(" (held by pid {pid})")).unwrap_or_default())]
    Busy { path: PathBuf, holder: Option<u32> },
}

impl WriteLock {
    /// Take the lock on `tasks_dir`, polling with a growing interval until
    /// `timeout` runs out
    pub fn acquire(tasks_dir: &Path, timeout: Duration) -> Result<Self, LockError> {
        let path = tasks_dir.join(LOCK_FILE);
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| LockError::Open {
                path: path.clone(),
                source,
            })?;

        let deadline = Instant::now() + timeout;
        let mut poll = FIRST_POLL;
        while !try_flock(&file) {
            let now = Instant::now();
            if now >= deadline {
                return Err(LockError::Busy {
                    holder: read_holder(&mut file),
                    path,
                });
            }
            std::thread::sleep(poll.min(deadline - now));
            poll = (poll * 2).min(MAX_POLL);
        }

        // Best effort: the pid only improves the error a waiter reports
        let _ = stamp_holder(&mut file);
        debug!(path = %path.display(), "write lock taken");
        Ok(WriteLock { file, path })
    }

    pub fn acquire_for_write(tasks_dir: &Path) -> Result<Self, LockError> {
        Self::acquire(tasks_dir, WRITE_TIMEOUT)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WriteLock {
    fn drop(&mut self) {
        let _ = self.file.set_len(0);
        let _ = fs::remove_file(&self.path);
    }
}

fn stamp_holder(file: &mut File) -> std::io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    write!(file, "{}", std::process::id())?;
    file.flush()
}

fn read_holder(file: &mut File) -> Option<u32> {
    let mut raw = String::new();
    file.seek(SeekFrom::Start(0)).ok()?;
    file.read_to_string(&mut raw).ok()?;
    raw.trim().parse().ok()
}

#[cfg(unix)]
fn try_flock(file: &File) -> bool {
    use std::os::unix::io::AsRawFd;
    // SAFETY: the descriptor stays owned by `file` for the whole call
    unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) == 0 }
}

#[cfg(not(unix))]
fn try_flock(_file: &File) -> bool {
    true
}
