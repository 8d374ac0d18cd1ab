use std::path::{Path, PathBuf};

use crate::error::DyadError;

/// One configured managed-directory prefix (producer or consumer side).
///
/// A file qualifies for coordination only if its canonicalized absolute path
/// has this prefix; the remainder is the user path shared across ranks
/// (spec §3, "Managed path").
#[derive(Debug, Clone)]
pub struct ManagedPath {
    prefix: PathBuf,
}

impl ManagedPath {
    pub fn new(prefix: impl Into<PathBuf>) -> Self {
        ManagedPath {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    /// Returns the user path (the suffix relative to this managed prefix)
    /// if `path` falls under it, canonicalizing both sides first.
    ///
    /// `path` itself is allowed not to exist yet — the common case is a
    /// consumer's subscribe target, which by definition has not been
    /// fetched and written locally at the moment this is called. Only the
    /// managed prefix and `path`'s parent directory need to exist.
    pub fn user_path(&self, path: &Path) -> Result<Option<String>, DyadError> {
        let canon_prefix = match self.prefix.canonicalize() {
            Ok(p) => p,
            Err(_) => return Ok(None),
        };
        let canon_path = self.canonicalize_tolerating_missing_leaf(path)?;
        match canon_path.strip_prefix(&canon_prefix) {
            Ok(suffix) if !suffix.as_os_str().is_empty() => {
                Ok(Some(suffix.to_string_lossy().into_owned()))
            }
            _ => Ok(None),
        }
    }

    /// Canonicalizes `path`, falling back to canonicalizing its parent and
    /// rejoining the file name when `path` itself does not exist.
    fn canonicalize_tolerating_missing_leaf(&self, path: &Path) -> Result<PathBuf, DyadError> {
        if let Ok(p) = path.canonicalize() {
            return Ok(p);
        }

        let file_name = path
            .file_name()
            .ok_or_else(|| DyadError::SysFail(format!("{path:?} has no file name component")))?;
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        let canon_parent = parent
            .canonicalize()
            .map_err(|e| DyadError::SysFail(format!("canonicalize {parent:?}: {e}")))?;
        Ok(canon_parent.join(file_name))
    }

    /// Composes the local output path for a fetched file: `prefix/user_path`
    /// (spec §4.4 step 7).
    pub fn local_path(&self, user_path: &str) -> PathBuf {
        self.prefix.join(user_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn user_path_strips_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("a/b");
        fs::create_dir_all(&sub).unwrap();
        let file = sub.join("c.dat");
        fs::write(&file, b"x").unwrap();

        let managed = ManagedPath::new(dir.path());
        let up = managed.user_path(&file).unwrap().unwrap();
        assert_eq!(up, "a/b/c.dat");
    }

    #[test]
    fn non_managed_path_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let file = other.path().join("z.dat");
        fs::write(&file, b"x").unwrap();

        let managed = ManagedPath::new(dir.path());
        assert!(managed.user_path(&file).unwrap().is_none());
    }

    #[test]
    fn user_path_of_not_yet_existing_file_still_resolves() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("a/b");
        fs::create_dir_all(&sub).unwrap();
        let not_yet_fetched = sub.join("c.dat");
        assert!(!not_yet_fetched.exists());

        let managed = ManagedPath::new(dir.path());
        let up = managed.user_path(&not_yet_fetched).unwrap().unwrap();
        assert_eq!(up, "a/b/c.dat");
    }

    #[test]
    fn user_path_errors_when_parent_of_missing_file_also_missing() {
        let dir = tempfile::tempdir().unwrap();
        let managed = ManagedPath::new(dir.path());
        let unreachable = dir.path().join("nope/c.dat");
        assert!(managed.user_path(&unreachable).is_err());
    }
}
