//! Backup copies for a standby timekeeping computer
//!
//! `backup` copies the race log and race file into a directory, both as
//! `<name>` (latest) and `<UTC stamp>_<name>` (history). `restore` copies a
//! backup set back into place. The log is only ever read or replaced while
//! holding its lock, so the timer never sees a torn file.

use anyhow::{Context, Result};
use chrono::Utc;
use laptime_core::{LockPolicy, LogLock};
use std::fs;
use std::path::{Path, PathBuf};

/// Format of the history prefix; sorts chronologically
const STAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// The files one backup set consists of
#[derive(Debug, Clone)]
pub struct BackupSet {
    pub log: PathBuf,
    pub race: PathBuf,
    pub policy: LockPolicy,
}

impl BackupSet {
    pub fn new(log: impl Into<PathBuf>, race: impl Into<PathBuf>, policy: LockPolicy) -> Self {
        Self {
            log: log.into(),
            race: race.into(),
            policy,
        }
    }

    /// Copy both files into `output` under the current UTC stamp
    pub fn backup(&self, output: &Path) -> Result<Vec<PathBuf>> {
        let stamp = Utc::now().format(STAMP_FORMAT).to_string();
        self.backup_stamped(output, &stamp)
    }

    /// Copy both files into `output` as `<name>` and `<stamp>_<name>`
    pub fn backup_stamped(&self, output: &Path, stamp: &str) -> Result<Vec<PathBuf>> {
        if !output.is_dir() {
            anyhow::bail!("No such directory: {:?}", output);
        }

        let mut written = Vec::new();
        {
            let lock = LogLock::acquire(&self.log, &self.policy)
                .with_context(|| format!("Failed to lock {:?}", self.log))?;
            if lock.was_forced() {
                log::warn!("Took over a stale lock on {:?} for backup", self.log);
            }
            if self.log.is_file() {
                written.extend(copy_with_stamp(&self.log, output, stamp)?);
            } else {
                log::warn!("Log file {:?} does not exist yet; not backed up", self.log);
            }
        }
        written.extend(copy_with_stamp(&self.race, output, stamp)?);

        log::info!("Backup {} written to {:?}", stamp, output);
        Ok(written)
    }

    /// Put a backup set from `source` back in place
    ///
    /// Without a stamp the latest copies (`<name>`) are used.
    pub fn restore(&self, source: &Path, stamp: Option<&str>) -> Result<()> {
        let log_source = backup_name(source, &self.log, stamp)?;
        let race_source = backup_name(source, &self.race, stamp)?;
        for file in [&log_source, &race_source] {
            if !file.is_file() {
                anyhow::bail!("Backup file {:?} not found", file);
            }
        }

        copy_replacing(&race_source, &self.race)?;

        let lock = LogLock::acquire(&self.log, &self.policy)
            .with_context(|| format!("Failed to lock {:?}", self.log))?;
        if lock.was_forced() {
            log::warn!("Took over a stale lock on {:?} for restore", self.log);
        }
        copy_replacing(&log_source, &self.log)?;
        drop(lock);

        log::info!("Restored {:?} and {:?} from {:?}", self.log, self.race, source);
        Ok(())
    }
}

fn file_name(path: &Path) -> Result<&str> {
    path.file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("No usable file name in {:?}", path))
}

fn backup_name(dir: &Path, original: &Path, stamp: Option<&str>) -> Result<PathBuf> {
    let name = file_name(original)?;
    Ok(match stamp {
        Some(stamp) => dir.join(format!("{}_{}", stamp, name)),
        None => dir.join(name),
    })
}

fn copy_with_stamp(source: &Path, output: &Path, stamp: &str) -> Result<[PathBuf; 2]> {
    let latest = backup_name(output, source, None)?;
    let stamped = backup_name(output, source, Some(stamp))?;
    for destination in [&latest, &stamped] {
        fs::copy(source, destination)
            .with_context(|| format!("Failed to copy {:?} to {:?}", source, destination))?;
        log::debug!("Copied {:?} to {:?}", source, destination);
    }
    Ok([latest, stamped])
}

/// Copy to a temporary sibling, then rename over `target`
fn copy_replacing(source: &Path, target: &Path) -> Result<()> {
    let mut temp = target.as_os_str().to_os_string();
    temp.push(".restore");
    let temp = PathBuf::from(temp);

    fs::copy(source, &temp).with_context(|| format!("Failed to copy {:?}", source))?;
    fs::rename(&temp, target).with_context(|| format!("Failed to replace {:?}", target))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use laptime_core::journal::lock_path;
    use std::thread;
    use std::time::Duration;

    fn files(dir: &Path) -> BackupSet {
        fs::write(dir.join("race.log"), "100,start all\n").unwrap();
        fs::write(dir.join("race.toml"), "# race\n").unwrap();
        BackupSet::new(
            dir.join("race.log"),
            dir.join("race.toml"),
            LockPolicy::new(Duration::from_secs(5), Duration::from_millis(10)),
        )
    }

    #[test]
    fn test_backup_writes_latest_and_stamped_copies() {
        let dir = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let set = files(dir.path());

        let written = set.backup_stamped(output.path(), "2024-05-01_10-00-00").unwrap();
        assert_eq!(written.len(), 4);
        for name in [
            "race.log",
            "2024-05-01_10-00-00_race.log",
            "race.toml",
            "2024-05-01_10-00-00_race.toml",
        ] {
            assert!(output.path().join(name).is_file(), "missing {}", name);
        }
        assert_eq!(
            fs::read_to_string(output.path().join("race.log")).unwrap(),
            "100,start all\n"
        );
        assert!(!lock_path(&set.log).exists());
    }

    #[test]
    fn test_backup_copies_log_under_lock() {
        let dir = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let set = files(dir.path());

        // The writer holds the lock while it rewrites the log.
        let writer = LogLock::acquire(&set.log, &set.policy).unwrap();
        let copier = {
            let set = set.clone();
            let output = output.path().to_path_buf();
            thread::spawn(move || set.backup_stamped(&output, "stamp").unwrap())
        };

        thread::sleep(Duration::from_millis(100));
        assert!(!output.path().join("race.log").exists());
        fs::write(&set.log, "100,start all\n160,7\n").unwrap();
        drop(writer);

        copier.join().unwrap();
        assert_eq!(
            fs::read_to_string(output.path().join("stamp_race.log")).unwrap(),
            "100,start all\n160,7\n"
        );
        assert!(!lock_path(&set.log).exists());
    }

    #[test]
    fn test_backup_requires_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let set = files(dir.path());
        assert!(set.backup(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_restore_latest_and_stamped() {
        let dir = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let set = files(dir.path());

        set.backup_stamped(output.path(), "first").unwrap();
        fs::write(&set.log, "100,start all\n160,7\n").unwrap();
        set.backup_stamped(output.path(), "second").unwrap();
        fs::write(&set.log, "garbage\n").unwrap();

        set.restore(output.path(), None).unwrap();
        assert_eq!(fs::read_to_string(&set.log).unwrap(), "100,start all\n160,7\n");

        set.restore(output.path(), Some("first")).unwrap();
        assert_eq!(fs::read_to_string(&set.log).unwrap(), "100,start all\n");
        assert!(!lock_path(&set.log).exists());

        assert!(set.restore(output.path(), Some("third")).is_err());
        assert_eq!(fs::read_to_string(&set.log).unwrap(), "100,start all\n");
    }
}
