//! On-disk layout of a database.
//!
//! ```text
//! <db_path>/
//! ├─ LOCK          # exclusive advisory lock
//! └─ nodes.ndb     # append-only node log
//! ```

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const NODE_LOG_FILE: &str = "nodes.ndb";

/// A locked database directory. Dropping it releases the lock.
#[derive(Debug)]
pub struct DatabaseDir {
    root: PathBuf,
    existed: bool,
    _lock: File,
}

impl DatabaseDir {
    /// Locks the directory at `root`, applying the existence policy of
    /// `config` (`create_if_missing`, `error_if_exists`).
    ///
    /// A second handle on the same directory fails with
    /// [`CoreError::DatabaseLocked`].
    pub fn open(root: &Path, config: &Config) -> CoreResult<Self> {
        match fs::metadata(root) {
            Ok(meta) if !meta.is_dir() => {
                return Err(CoreError::invalid_format(format!(
                    "{} is not a directory",
                    root.display()
                )));
            }
            Ok(_) => {}
            Err(_) if config.create_if_missing => fs::create_dir_all(root)?,
            Err(_) => {
                return Err(CoreError::invalid_format(format!(
                    "no database at {}",
                    root.display()
                )));
            }
        }

        let lock = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(root.join(LOCK_FILE))?;
        lock.try_lock_exclusive().map_err(|_| CoreError::DatabaseLocked)?;

        let existed = fs::metadata(root.join(NODE_LOG_FILE)).is_ok_and(|m| m.len() > 0);
        if existed && config.error_if_exists {
            return Err(CoreError::invalid_format(format!(
                "database at {} already exists",
                root.display()
            )));
        }
        if !existed && !config.create_if_missing {
            return Err(CoreError::invalid_format(format!(
                "no database at {}",
                root.display()
            )));
        }

        Ok(Self {
            root: root.to_path_buf(),
            existed,
            _lock: lock,
        })
    }

    /// Directory root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of the node log.
    pub fn node_log_path(&self) -> PathBuf {
        self.root.join(NODE_LOG_FILE)
    }

    /// True when the node log already held committed data at open.
    pub fn existed(&self) -> bool {
        self.existed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_directory_when_allowed() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().join("db");
        let dir = DatabaseDir::open(&root, &Config::default()).unwrap();
        assert!(root.is_dir());
        assert!(!dir.existed());
        assert_eq!(dir.root(), root.as_path());
        assert_eq!(dir.node_log_path(), root.join("nodes.ndb"));
    }

    #[test]
    fn missing_directory_without_create_fails() {
        let tmp = tempdir().unwrap();
        let config = Config::new().create_if_missing(false);
        let result = DatabaseDir::open(&tmp.path().join("absent"), &config);
        assert!(matches!(result, Err(CoreError::InvalidFormat { .. })));
    }

    #[test]
    fn existing_log_trips_error_if_exists() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join(NODE_LOG_FILE), b"x").unwrap();
        let config = Config::new().error_if_exists(true);
        assert!(matches!(
            DatabaseDir::open(tmp.path(), &config),
            Err(CoreError::InvalidFormat { .. })
        ));
        let dir = DatabaseDir::open(tmp.path(), &Config::default()).unwrap();
        assert!(dir.existed());
    }

    #[test]
    fn lock_excludes_second_handle_until_dropped() {
        let tmp = tempdir().unwrap();
        let first = DatabaseDir::open(tmp.path(), &Config::default()).unwrap();
        assert!(matches!(
            DatabaseDir::open(tmp.path(), &Config::default()),
            Err(CoreError::DatabaseLocked)
        ));
        drop(first);
        assert!(DatabaseDir::open(tmp.path(), &Config::default()).is_ok());
    }
}
