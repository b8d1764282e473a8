//! # Library Resolution
//!
//! Maps a public suffix key to a sandboxed directory. The sandbox is the
//! canonicalized base image directory: a library root, and every file served
//! from it, must canonicalize to a path inside that base.
//!
//! Containment is checked component-wise with [`Path::starts_with`], so a
//! sibling such as `/srv/images-private` is not mistaken for a child of
//! `/srv/images`.

use std::borrow::Borrow;
use std::path::{Path, PathBuf};

use crate::candidate::ImageCandidate;
use crate::config::LibraryMap;
use crate::error::{ConfigError, ResolveError};

/// Longest accepted library key.
const MAX_KEY_LEN: usize = 32;

/// Names taken by other routes or by the statistics record.
const RESERVED_KEYS: &[&str] = &["stats", "health", "total"];

/// A validated library key (e.g. `"pc"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LibraryKey(String);

impl LibraryKey {
    /// Validate and wrap a key.
    ///
    /// Keys are 1-32 ASCII alphanumerics, `-` or `_`, and must not collide
    /// with a route segment or the stats `total` counter.
    pub fn new(key: impl Into<String>) -> Result<Self, ConfigError> {
        let key = key.into();
        let reason = if key.is_empty() {
            Some("must not be empty".to_string())
        } else if key.len() > MAX_KEY_LEN {
            Some(format!("longer than {MAX_KEY_LEN} characters"))
        } else if !key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            Some("only ASCII letters, digits, '-' and '_' are allowed".to_string())
        } else if RESERVED_KEYS.contains(&key.as_str()) {
            Some("reserved name".to_string())
        } else {
            None
        };
        match reason {
            Some(reason) => Err(ConfigError::InvalidLibraryKey { key, reason }),
            None => Ok(Self(key)),
        }
    }

    pub(crate) fn from_static(key: &'static str) -> Self {
        Self(key.to_string())
    }

    /// Return the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for LibraryKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LibraryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A resolved library: its key and canonical root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Library {
    key: LibraryKey,
    root: PathBuf,
}

impl Library {
    /// The library key.
    pub fn key(&self) -> &LibraryKey {
        &self.key
    }

    /// The canonical root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Canonicalize `path` and verify it lies within this library's root.
    ///
    /// Returns the canonical path on success. A path that cannot be
    /// canonicalized (dangling symlink, removed file) is treated as an
    /// escape: nothing outside the root may be served and nothing
    /// unresolvable may be trusted.
    pub fn contain(&self, path: &Path) -> Result<PathBuf, ResolveError> {
        contain_within(path, &self.root)
    }

    /// Contain `candidate` and pin its [`resolved_path`] to the validated
    /// canonical target.
    ///
    /// [`resolved_path`]: ImageCandidate::resolved_path
    pub fn contain_candidate(
        &self,
        candidate: ImageCandidate,
    ) -> Result<ImageCandidate, ResolveError> {
        let resolved = self.contain(candidate.path())?;
        Ok(candidate.with_resolved(resolved))
    }
}

/// Canonicalize `path` and require it to be `root` or a descendant of it.
/// `root` must already be canonical.
fn contain_within(path: &Path, root: &Path) -> Result<PathBuf, ResolveError> {
    let escape = || ResolveError::PathEscape {
        path: path.to_path_buf(),
        root: root.to_path_buf(),
    };
    let canonical = path.canonicalize().map_err(|_| escape())?;
    if canonical.starts_with(root) {
        Ok(canonical)
    } else {
        Err(escape())
    }
}

/// Resolves library keys against the configured table and base directory.
#[derive(Debug, Clone)]
pub struct LibraryResolver {
    base_dir: PathBuf,
    libraries: LibraryMap,
}

impl LibraryResolver {
    /// Create a resolver. The base directory is canonicalized per request,
    /// so it may be created or remounted after startup.
    pub fn new(base_dir: impl Into<PathBuf>, libraries: LibraryMap) -> Self {
        Self {
            base_dir: base_dir.into(),
            libraries,
        }
    }

    /// The configured (non-canonical) base directory.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// The configured library table.
    pub fn libraries(&self) -> &LibraryMap {
        &self.libraries
    }

    /// Resolve a request suffix to a sandboxed library.
    ///
    /// - Unknown key → [`ResolveError::InvalidLibrary`].
    /// - Missing base or library directory, or a library directory that
    ///   canonicalizes outside the base → [`ResolveError::PathEscape`].
    pub fn resolve(&self, key: &str) -> Result<Library, ResolveError> {
        let (key, subdir) = self
            .libraries
            .subdirectory(key)
            .ok_or_else(|| ResolveError::InvalidLibrary(key.to_string()))?;

        let base = self
            .base_dir
            .canonicalize()
            .map_err(|_| ResolveError::PathEscape {
                path: self.base_dir.clone(),
                root: self.base_dir.clone(),
            })?;

        let root = contain_within(&base.join(subdir), &base)?;
        if !root.is_dir() {
            return Err(ResolveError::PathEscape { path: root, root: base });
        }

        Ok(Library {
            key: key.clone(),
            root,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, LibraryResolver) {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().join("images");
        fs::create_dir_all(base.join("landscape")).unwrap();
        fs::create_dir_all(base.join("portrait")).unwrap();
        let map = LibraryMap::new([("pc", "landscape"), ("pe", "portrait"), ("gone", "missing")])
            .unwrap();
        let resolver = LibraryResolver::new(base, map);
        (tmp, resolver)
    }

    #[test]
    fn key_validation() {
        assert!(LibraryKey::new("pc").is_ok());
        assert!(LibraryKey::new("Hatsune_Miku-2").is_ok());
        assert!(LibraryKey::new("").is_err());
        assert!(LibraryKey::new("health").is_err());
        assert!(LibraryKey::new("a/b").is_err());
        assert!(LibraryKey::new("..").is_err());
        assert!(LibraryKey::new("x".repeat(33)).is_err());
    }

    #[test]
    fn resolves_known_key_to_canonical_child_of_base() {
        let (_tmp, resolver) = fixture();
        let lib = resolver.resolve("pc").unwrap();
        let base = resolver.base_dir().canonicalize().unwrap();
        assert_eq!(lib.key().as_str(), "pc");
        assert!(lib.root().starts_with(&base));
        assert_eq!(lib.root(), base.join("landscape"));
    }

    #[test]
    fn unknown_key_is_invalid_library() {
        let (_tmp, resolver) = fixture();
        assert!(matches!(
            resolver.resolve("zz"),
            Err(ResolveError::InvalidLibrary(k)) if k == "zz"
        ));
    }

    #[test]
    fn missing_directory_is_path_escape() {
        let (_tmp, resolver) = fixture();
        assert!(matches!(
            resolver.resolve("gone"),
            Err(ResolveError::PathEscape { .. })
        ));
    }

    #[test]
    fn missing_base_is_path_escape() {
        let tmp = TempDir::new().unwrap();
        let resolver = LibraryResolver::new(tmp.path().join("nope"), LibraryMap::default());
        assert!(matches!(
            resolver.resolve("pc"),
            Err(ResolveError::PathEscape { .. })
        ));
    }

    #[test]
    fn sibling_with_shared_prefix_is_not_contained() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("images");
        let sibling = tmp.path().join("images-private");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(&sibling).unwrap();
        let root = root.canonicalize().unwrap();
        assert!(contain_within(&sibling, &root).is_err());
        assert!(contain_within(&root, &root).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_library_escaping_base_is_rejected() {
        let (tmp, resolver) = fixture();
        let outside = tmp.path().join("outside");
        fs::create_dir_all(&outside).unwrap();
        std::os::unix::fs::symlink(&outside, resolver.base_dir().join("evil")).unwrap();

        let map = LibraryMap::new([("evil", "evil")]).unwrap();
        let resolver = LibraryResolver::new(resolver.base_dir().to_path_buf(), map);
        assert!(matches!(
            resolver.resolve("evil"),
            Err(ResolveError::PathEscape { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_library_inside_base_is_allowed() {
        let (_tmp, resolver) = fixture();
        std::os::unix::fs::symlink(
            resolver.base_dir().join("landscape"),
            resolver.base_dir().join("alias"),
        )
        .unwrap();
        let map = LibraryMap::new([("alias", "alias")]).unwrap();
        let resolver = LibraryResolver::new(resolver.base_dir().to_path_buf(), map);
        let lib = resolver.resolve("alias").unwrap();
        assert!(lib.root().ends_with("landscape"));
    }

    #[test]
    fn contain_rejects_files_outside_root() {
        let (tmp, resolver) = fixture();
        let lib = resolver.resolve("pc").unwrap();
        let inside = lib.root().join("a.jpg");
        fs::write(&inside, b"x").unwrap();
        let outside = tmp.path().join("b.jpg");
        fs::write(&outside, b"x").unwrap();

        assert!(lib.contain(&inside).is_ok());
        assert!(matches!(
            lib.contain(&outside),
            Err(ResolveError::PathEscape { .. })
        ));
        assert!(lib.contain(&lib.root().join("missing.jpg")).is_err());
    }
}
