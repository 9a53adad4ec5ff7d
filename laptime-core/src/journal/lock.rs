//! Exclusive access to the shared log file
//!
//! Cooperating processes (the timer, report generators, backup copiers) agree
//! on a sibling `<log>.lock` file. Whoever creates it owns the log until the
//! guard is dropped. A lock that is still held after the policy's timeout is
//! treated as stale and taken over, so recording never stalls behind a
//! crashed process.

use crate::types::Result;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

/// How long to wait for the lock and how often to retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3),
            poll_interval: Duration::from_millis(50),
        }
    }
}

impl LockPolicy {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }
}

/// Held lock on a log file; released on drop
#[derive(Debug)]
pub struct LogLock {
    path: PathBuf,
    forced: bool,
    waited: Duration,
}

impl LogLock {
    /// Lock `target`, breaking a stale lock once the timeout has passed
    pub fn acquire(target: &Path, policy: &LockPolicy) -> Result<LogLock> {
        let path = lock_path(target);
        let started = Instant::now();

        loop {
            match create_exclusive(&path) {
                Ok(()) => {
                    log::trace!("Acquired lock {:?}", path);
                    return Ok(LogLock {
                        path,
                        forced: false,
                        waited: started.elapsed(),
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if started.elapsed() >= policy.timeout {
                        break;
                    }
                    thread::sleep(policy.poll_interval);
                }
                Err(e) => return Err(e.into()),
            }
        }

        log::warn!(
            "Lock {:?} still held after {:?}, breaking it",
            path,
            policy.timeout
        );
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        match create_exclusive(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                // Lost the race after breaking the lock; take it over anyway.
                let mut file = OpenOptions::new().write(true).truncate(true).open(&path)?;
                write_owner(&mut file)?;
            }
            Err(e) => return Err(e.into()),
        }

        Ok(LogLock {
            path,
            forced: true,
            waited: started.elapsed(),
        })
    }

    /// True if the lock was taken over from another holder
    pub fn was_forced(&self) -> bool {
        self.forced
    }

    /// Time spent waiting for the lock
    pub fn waited(&self) -> Duration {
        self.waited
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LogLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!("Failed to release lock {:?}: {}", self.path, e);
        } else {
            log::trace!("Released lock {:?}", self.path);
        }
    }
}

/// Path of the lock file guarding `target`
pub fn lock_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}

fn create_exclusive(path: &Path) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    write_owner(&mut file)
}

fn write_owner(file: &mut File) -> io::Result<()> {
    writeln!(file, "{}", std::process::id())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick() -> LockPolicy {
        LockPolicy::new(Duration::from_millis(100), Duration::from_millis(10))
    }

    #[test]
    fn test_lock_path() {
        assert_eq!(
            lock_path(Path::new("/race/log.csv")),
            PathBuf::from("/race/log.csv.lock")
        );
    }

    #[test]
    fn test_acquire_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("log.csv");

        let lock = LogLock::acquire(&target, &quick()).unwrap();
        assert!(!lock.was_forced());
        assert!(lock_path(&target).exists());
        drop(lock);
        assert!(!lock_path(&target).exists());
    }

    #[test]
    fn test_stale_lock_is_taken_over() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("log.csv");
        fs::write(lock_path(&target), "99999\n").unwrap();

        let lock = LogLock::acquire(&target, &quick()).unwrap();
        assert!(lock.was_forced());
        assert!(lock.waited() >= Duration::from_millis(100));
        let owner = fs::read_to_string(lock.path()).unwrap();
        assert_eq!(owner.trim(), std::process::id().to_string());
    }

    #[test]
    fn test_waits_for_holder_to_release() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("log.csv");
        let policy = LockPolicy::new(Duration::from_secs(5), Duration::from_millis(10));

        let held = LogLock::acquire(&target, &policy).unwrap();
        let waiter = {
            let target = target.clone();
            thread::spawn(move || {
                let lock = LogLock::acquire(&target, &policy).unwrap();
                (lock.was_forced(), lock.waited())
            })
        };

        thread::sleep(Duration::from_millis(100));
        drop(held);
        let (forced, waited) = waiter.join().unwrap();

        assert!(!forced);
        assert!(waited > Duration::ZERO);
        assert!(waited < policy.timeout);
        assert!(!lock_path(&target).exists());
    }

    #[test]
    fn test_released_on_error_path() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("log.csv");

        let result = (|| -> Result<()> {
            let _lock = LogLock::acquire(&target, &quick())?;
            Err(io::Error::new(io::ErrorKind::Other, "write failed").into())
        })();

        assert!(result.is_err());
        assert!(!lock_path(&target).exists());
    }
}
