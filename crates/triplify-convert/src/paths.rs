//! Per-user working directories.
//!
//! Everything a user touches lives under `<files_dir>/<username>/`:
//! `upload/` for raw uploads, `rdf/` for generated ttl files, `result/`
//! for query result csv files. Directories are created on first access.

use std::path::{Path, PathBuf};

use triplify_common::Result;

#[derive(Debug, Clone)]
pub struct UserDirs {
    root: PathBuf,
    username: String,
}

impl UserDirs {
    pub fn new(files_dir: impl AsRef<Path>, username: &str) -> Self {
        let username = if username.is_empty() { "_guest" } else { username };
        Self {
            root: files_dir.as_ref().to_path_buf(),
            username: username.to_string(),
        }
    }

    fn dir(&self, name: &str) -> Result<PathBuf> {
        let path = self.root.join(&self.username).join(name);
        std::fs::create_dir_all(&path)?;
        Ok(path)
    }

    pub fn upload(&self) -> Result<PathBuf> {
        self.dir("upload")
    }

    pub fn rdf(&self) -> Result<PathBuf> {
        self.dir("rdf")
    }

    pub fn result(&self) -> Result<PathBuf> {
        self.dir("result")
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Refuse path components that would escape the user directory.
    pub fn safe_join(dir: &Path, name: &str) -> Result<PathBuf> {
        if name.is_empty()
            || name.contains('/')
            || name.contains('\\')
            || name.contains("..")
        {
            return Err(triplify_common::TriplifyError::NotFound(format!(
                "bad file name: {name}"
            )));
        }
        Ok(dir.join(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directories_are_created_on_demand() {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = UserDirs::new(tmp.path(), "alice");
        let upload = dirs.upload().unwrap();
        assert!(upload.is_dir());
        assert!(upload.ends_with("alice/upload"));
    }

    #[test]
    fn anonymous_users_share_the_guest_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = UserDirs::new(tmp.path(), "");
        assert_eq!(dirs.username(), "_guest");
    }

    #[test]
    fn safe_join_rejects_traversal() {
        let dir = Path::new("/tmp/triplify/alice/upload");
        assert!(UserDirs::safe_join(dir, "../../etc/passwd").is_err());
        assert!(UserDirs::safe_join(dir, "a/b").is_err());
        assert!(UserDirs::safe_join(dir, "data.tsv").is_ok());
    }
}
