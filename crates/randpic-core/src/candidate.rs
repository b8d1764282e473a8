//! # Eligible File Set
//!
//! Enumerates the image files directly inside a library root. The set is
//! recomputed on every request; there is no index to go stale.
//!
//! Matching follows shell-glob semantics for `*.{jpg,jpeg,png,gif}`:
//! extensions are matched case-sensitively, hidden files are skipped, and
//! subdirectories are not descended into. Entries are sorted by filename so
//! lookups are deterministic.

use std::path::{Path, PathBuf};

use crate::error::ResolveError;

/// Accepted image extensions (case-sensitive).
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];

/// An eligible image file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCandidate {
    path: PathBuf,
    file_name: String,
    resolved: PathBuf,
}

impl ImageCandidate {
    /// Absolute path of the file (as enumerated, not canonicalized).
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path to read the file from. After [`Library::contain_candidate`]
    /// this is the canonical target validated against the library root, so
    /// re-pointing the enumerated entry afterwards does not change it.
    /// Before that it equals [`path`](Self::path).
    ///
    /// [`Library::contain_candidate`]: crate::library::Library::contain_candidate
    pub fn resolved_path(&self) -> &Path {
        &self.resolved
    }

    pub(crate) fn with_resolved(self, resolved: PathBuf) -> Self {
        Self { resolved, ..self }
    }

    /// Base filename; the input to token derivation.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// The file extension.
    pub fn extension(&self) -> Option<&str> {
        self.path.extension().and_then(|e| e.to_str())
    }
}

/// Whether a base filename is eligible.
pub fn is_eligible_name(name: &str) -> bool {
    if name.starts_with('.') {
        return false;
    }
    match name.rsplit_once('.') {
        Some((stem, ext)) => !stem.is_empty() && IMAGE_EXTENSIONS.contains(&ext),
        None => false,
    }
}

/// List eligible images directly inside `dir`, sorted by filename.
///
/// Entries whose names are not valid UTF-8 are skipped: they could not be
/// named in a token or a `Content-Disposition` header anyway. Symlinks are
/// followed for the file-type check; containment is enforced by the caller.
pub fn eligible_images(dir: &Path) -> Result<Vec<ImageCandidate>, ResolveError> {
    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let Ok(file_name) = entry.file_name().into_string() else {
            continue;
        };
        if !is_eligible_name(&file_name) {
            continue;
        }
        let path = entry.path();
        // Follows symlinks; broken links are simply not files.
        if !path.is_file() {
            continue;
        }
        images.push(ImageCandidate {
            resolved: path.clone(),
            path,
            file_name,
        });
    }
    images.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn eligible_names() {
        for ok in ["a.jpg", "a.jpeg", "a.png", "a.gif", "a.b.png", "初音.jpg"] {
            assert!(is_eligible_name(ok), "{ok}");
        }
        for bad in ["a.JPG", "a.webp", "jpg", ".jpg", ".hidden.png", "a.", "a.jpg.txt"] {
            assert!(!is_eligible_name(bad), "{bad}");
        }
    }

    #[test]
    fn enumerates_only_eligible_files_sorted() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        for name in ["c.png", "a.jpg", "b.gif", "notes.txt", "d.JPEG", ".e.jpg"] {
            fs::write(dir.join(name), b"x").unwrap();
        }
        fs::create_dir(dir.join("folder.jpg")).unwrap();
        fs::create_dir(dir.join("nested")).unwrap();
        fs::write(dir.join("nested").join("f.jpg"), b"x").unwrap();

        let names: Vec<_> = eligible_images(dir)
            .unwrap()
            .into_iter()
            .map(|c| c.file_name().to_string())
            .collect();
        assert_eq!(names, ["a.jpg", "b.gif", "c.png"]);
    }

    #[test]
    fn empty_directory_yields_empty_set() {
        let tmp = TempDir::new().unwrap();
        assert!(eligible_images(tmp.path()).unwrap().is_empty());
    }

    #[test]
    fn missing_directory_is_io_error() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            eligible_images(&tmp.path().join("nope")),
            Err(ResolveError::Io(_))
        ));
    }

    #[test]
    fn candidate_accessors() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("x.png"), b"x").unwrap();
        let c = eligible_images(tmp.path()).unwrap().remove(0);
        assert_eq!(c.file_name(), "x.png");
        assert_eq!(c.extension(), Some("png"));
        assert_eq!(c.path(), tmp.path().join("x.png"));
        assert_eq!(c.resolved_path(), c.path());
    }
}
