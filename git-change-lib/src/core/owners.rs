//! Resolving code owners from `OWNERS` files.
//!
//! An `OWNERS` file lists one Gerrit username per line. It applies to the
//! directory containing it and to all subdirectories, except those which have
//! an `OWNERS` file of their own. An empty `OWNERS` file still counts: it
//! means the directory has no owners, not that the parent's owners apply.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, instrument};

/// The name of an owners file.
pub const OWNERS_FILE_NAME: &str = "OWNERS";

/// Error type.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum Error {
    #[error("could not read owners file {path:?}: {source}")]
    ReadOwnersFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Looks up the owners of directories under a repository root, remembering the
/// answer for every directory visited.
#[derive(Debug)]
pub struct OwnersResolver {
    repo_root: PathBuf,
    cache: HashMap<PathBuf, Arc<BTreeSet<String>>>,
}

impl OwnersResolver {
    /// Constructor. `repo_root` should be the absolute path of the top of the
    /// working tree; the walk never goes above it.
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            cache: Default::default(),
        }
    }

    /// The owners of `directory`, which must be an absolute path.
    #[instrument]
    pub fn owners_for_dir(&mut self, directory: &Path) -> Result<Arc<BTreeSet<String>>> {
        let mut visited = Vec::new();
        let mut current = Some(directory);
        let owners = loop {
            let dir = match current {
                Some(dir) if dir.starts_with(&self.repo_root) => dir,
                _ => break Arc::new(BTreeSet::new()),
            };
            if let Some(owners) = self.cache.get(dir) {
                break Arc::clone(owners);
            }
            visited.push(dir.to_path_buf());

            let owners_path = dir.join(OWNERS_FILE_NAME);
            if owners_path.is_file() {
                break Arc::new(read_owners_file(&owners_path)?);
            }
            current = dir.parent();
        };

        for dir in visited {
            self.cache.insert(dir, Arc::clone(&owners));
        }
        Ok(owners)
    }

    /// The union of the owners of each of the given files. Paths are relative
    /// to the repository root.
    #[instrument(skip(changed_files))]
    pub fn resolve<P: AsRef<Path>>(
        &mut self,
        changed_files: impl IntoIterator<Item = P>,
    ) -> Result<BTreeSet<String>> {
        let mut all_owners = BTreeSet::new();
        for path in changed_files {
            let path = self.repo_root.join(path);
            let directory = match path.parent() {
                Some(directory) => directory.to_path_buf(),
                None => continue,
            };
            let owners = self.owners_for_dir(&directory)?;
            all_owners.extend(owners.iter().cloned());
        }
        Ok(all_owners)
    }
}

/// The owners of the given files (relative to `repo_root`), with duplicates
/// removed.
pub fn resolve_owners<P: AsRef<Path>>(
    changed_files: impl IntoIterator<Item = P>,
    repo_root: &Path,
) -> Result<BTreeSet<String>> {
    OwnersResolver::new(repo_root).resolve(changed_files)
}

fn read_owners_file(path: &Path) -> Result<BTreeSet<String>> {
    let contents = std::fs::read_to_string(path).map_err(|source| Error::ReadOwnersFile {
        path: path.to_path_buf(),
        source,
    })?;
    let owners: BTreeSet<String> = contents
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .map(|line| line.to_owned())
        .collect();
    if owners.is_empty() {
        debug!(?path, "Owners file is empty");
    }
    Ok(owners)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn write_file(root: &Path, path: &str, contents: &str) -> eyre::Result<()> {
        let path = root.join(path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        Ok(())
    }

    fn owners(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn test_nearest_owners_file_wins() -> eyre::Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let root = temp_dir.path();
        write_file(root, "OWNERS", "root-owner\n")?;
        write_file(root, "lib/OWNERS", "lib-owner\n  other-owner  \n\n")?;
        write_file(root, "lib/src/deep/file.rs", "")?;
        write_file(root, "bin/main.rs", "")?;

        assert_eq!(
            resolve_owners(["lib/src/deep/file.rs"], root)?,
            owners(&["lib-owner", "other-owner"])
        );
        assert_eq!(resolve_owners(["bin/main.rs"], root)?, owners(&["root-owner"]));
        assert_eq!(
            resolve_owners(["bin/main.rs", "lib/src/deep/file.rs", "README"], root)?,
            owners(&["lib-owner", "other-owner", "root-owner"])
        );
        Ok(())
    }

    #[test]
    fn test_empty_owners_file_stops_walk() -> eyre::Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let root = temp_dir.path();
        write_file(root, "OWNERS", "root-owner\n")?;
        write_file(root, "vendored/OWNERS", "\n   \n")?;
        write_file(root, "vendored/lib/file.c", "")?;

        assert_eq!(resolve_owners(["vendored/lib/file.c"], root)?, owners(&[]));
        Ok(())
    }

    #[test]
    fn test_no_owners_files() -> eyre::Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let root = temp_dir.path().join("repo");
        write_file(temp_dir.path(), "OWNERS", "outside-the-repo\n")?;
        write_file(&root, "src/lib.rs", "")?;

        assert_eq!(resolve_owners(["src/lib.rs"], &root)?, owners(&[]));
        Ok(())
    }

    #[test]
    fn test_deleted_file_uses_ancestor() -> eyre::Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let root = temp_dir.path();
        write_file(root, "OWNERS", "root-owner\n")?;

        assert_eq!(
            resolve_owners(["gone/entirely/file.txt"], root)?,
            owners(&["root-owner"])
        );
        Ok(())
    }

    #[test]
    fn test_resolution_is_idempotent() -> eyre::Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let root = temp_dir.path();
        write_file(root, "a/OWNERS", "alice\n")?;
        write_file(root, "b/OWNERS", "bob\nalice\n")?;
        let files = ["a/x/1.txt", "b/2.txt", "a/3.txt", "c/4.txt"];

        let mut resolver = OwnersResolver::new(root);
        let first = resolver.resolve(files)?;
        let second = resolver.resolve(files.iter().rev())?;
        assert_eq!(first, second);
        assert_eq!(first, resolve_owners(files, root)?);
        assert_eq!(first, owners(&["alice", "bob"]));
        Ok(())
    }

    #[test]
    fn test_cache_is_populated_for_intermediate_directories() -> eyre::Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let root = temp_dir.path();
        write_file(root, "OWNERS", "root-owner\n")?;
        write_file(root, "a/b/c/file.txt", "")?;

        let mut resolver = OwnersResolver::new(root);
        resolver.resolve(["a/b/c/file.txt"])?;

        // Removing the file shows that later lookups come from the cache.
        fs::remove_file(root.join("OWNERS"))?;
        assert_eq!(
            *resolver.owners_for_dir(&root.join("a/b"))?,
            owners(&["root-owner"])
        );
        Ok(())
    }
}
