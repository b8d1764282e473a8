//! # Service Configuration
//!
//! The configuration is an immutable value built once at startup and passed
//! explicitly to the resolver, the stats store and the HTTP state. Nothing
//! reads configuration ambiently after boot.
//!
//! Sources, lowest precedence first: built-in defaults, an optional YAML
//! file ([`ConfigFile`]), then CLI flags / environment (also expressed as a
//! [`ConfigFile`] and layered with [`ConfigFile::merge`]).
//!
//! ```yaml
//! image_base_dir: /srv/randpic/images
//! stats_file: /srv/randpic/stats/counter.json
//! secret: change-me
//! libraries:
//!   pc: landscape
//!   pe: portrait
//! ```

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::library::LibraryKey;
use crate::token::TokenKey;

/// Default base directory holding one subdirectory per library.
pub const DEFAULT_IMAGE_BASE_DIR: &str = "images";

/// Default location of the statistics file.
pub const DEFAULT_STATS_FILE: &str = "stats/counter.json";

/// Built-in library table used when no `libraries` section is configured.
pub const DEFAULT_LIBRARIES: &[(&str, &str)] = &[
    ("pc", "landscape"),
    ("pe", "portrait"),
    ("bs", "baisi"),
    ("miku", "Hatsune_Miku"),
];

/// Validated mapping from library key to subdirectory name under the base
/// directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryMap {
    entries: BTreeMap<LibraryKey, String>,
}

impl LibraryMap {
    /// Build a map, validating every key and subdirectory.
    pub fn new<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Result<Self, ConfigError>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = BTreeMap::new();
        for (key, subdir) in entries {
            let key = LibraryKey::new(key)?;
            let subdir = subdir.into();
            validate_subdirectory(&key, &subdir)?;
            map.insert(key, subdir);
        }
        Ok(Self { entries: map })
    }

    /// Look up the subdirectory for a request suffix.
    pub fn subdirectory(&self, key: &str) -> Option<(&LibraryKey, &str)> {
        self.entries
            .get_key_value(key)
            .map(|(k, v)| (k, v.as_str()))
    }

    /// Iterate configured keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &LibraryKey> {
        self.entries.keys()
    }

    /// Number of configured libraries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no library is configured.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for LibraryMap {
    fn default() -> Self {
        let entries = DEFAULT_LIBRARIES
            .iter()
            .map(|(k, v)| (LibraryKey::from_static(k), (*v).to_string()))
            .collect();
        Self { entries }
    }
}

fn validate_subdirectory(key: &LibraryKey, subdir: &str) -> Result<(), ConfigError> {
    let mut components = Path::new(subdir).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(ConfigError::InvalidSubdirectory {
            key: key.to_string(),
            subdir: subdir.to_string(),
        }),
    }
}

/// Raw, partially-specified configuration as read from YAML or assembled
/// from CLI flags.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Base directory holding one subdirectory per library.
    #[serde(default)]
    pub image_base_dir: Option<PathBuf>,
    /// Statistics file path.
    #[serde(default)]
    pub stats_file: Option<PathBuf>,
    /// Token secret.
    #[serde(default)]
    pub secret: Option<String>,
    /// Library key → subdirectory table.
    #[serde(default)]
    pub libraries: Option<BTreeMap<String, String>>,
}

impl ConfigFile {
    /// Parse a YAML document.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read and parse a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Layer `overrides` on top of `self`; every field set in `overrides`
    /// wins.
    pub fn merge(self, overrides: ConfigFile) -> Self {
        Self {
            image_base_dir: overrides.image_base_dir.or(self.image_base_dir),
            stats_file: overrides.stats_file.or(self.stats_file),
            secret: overrides.secret.or(self.secret),
            libraries: overrides.libraries.or(self.libraries),
        }
    }
}

/// Fully resolved service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Base directory holding one subdirectory per library.
    pub image_base_dir: PathBuf,
    /// Statistics file path.
    pub stats_file: PathBuf,
    /// Library key → subdirectory table.
    pub libraries: LibraryMap,
    /// Key for token derivation.
    pub token_key: TokenKey,
    /// Whether `token_key` was generated at startup rather than configured.
    pub ephemeral_key: bool,
}

impl ServiceConfig {
    /// Build a configuration from explicit parts.
    pub fn new(
        image_base_dir: impl Into<PathBuf>,
        stats_file: impl Into<PathBuf>,
        libraries: LibraryMap,
        token_key: TokenKey,
    ) -> Self {
        Self {
            image_base_dir: image_base_dir.into(),
            stats_file: stats_file.into(),
            libraries,
            token_key,
            ephemeral_key: false,
        }
    }

    /// Resolve a [`ConfigFile`] into a complete configuration, filling in
    /// defaults. A missing secret yields a generated per-process key with
    /// `ephemeral_key` set.
    pub fn from_file(file: ConfigFile) -> Result<Self, ConfigError> {
        let libraries = match file.libraries {
            Some(entries) => LibraryMap::new(entries)?,
            None => LibraryMap::default(),
        };
        let (token_key, ephemeral_key) = match file.secret {
            Some(secret) => (TokenKey::new(secret.into_bytes())?, false),
            None => (TokenKey::generate()?, true),
        };
        Ok(Self {
            image_base_dir: file
                .image_base_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_IMAGE_BASE_DIR)),
            stats_file: file
                .stats_file
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATS_FILE)),
            libraries,
            token_key,
            ephemeral_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_map_matches_builtin_table() {
        let map = LibraryMap::default();
        assert_eq!(map.len(), 4);
        assert_eq!(map.subdirectory("pc").map(|(_, d)| d), Some("landscape"));
        assert_eq!(map.subdirectory("pe").map(|(_, d)| d), Some("portrait"));
        assert_eq!(map.subdirectory("miku").map(|(_, d)| d), Some("Hatsune_Miku"));
        assert!(map.subdirectory("zz").is_none());
    }

    #[test]
    fn subdirectory_must_be_single_component() {
        for bad in ["../etc", "a/b", "/abs", "", ".", ".."] {
            let err = LibraryMap::new([("pc", bad)]).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidSubdirectory { .. }),
                "accepted {bad:?}"
            );
        }
        assert!(LibraryMap::new([("pc", "landscape")]).is_ok());
    }

    #[test]
    fn invalid_keys_rejected() {
        assert!(LibraryMap::new([("", "x")]).is_err());
        assert!(LibraryMap::new([("stats", "x")]).is_err());
        assert!(LibraryMap::new([("a b", "x")]).is_err());
    }

    #[test]
    fn parse_yaml_config() {
        let file = ConfigFile::parse(
            "image_base_dir: /srv/img\nsecret: s3cret\nlibraries:\n  pc: wide\n",
        )
        .unwrap();
        let config = ServiceConfig::from_file(file).unwrap();
        assert_eq!(config.image_base_dir, PathBuf::from("/srv/img"));
        assert_eq!(config.stats_file, PathBuf::from(DEFAULT_STATS_FILE));
        assert_eq!(config.libraries.len(), 1);
        assert!(!config.ephemeral_key);
    }

    #[test]
    fn unknown_fields_rejected() {
        assert!(matches!(
            ConfigFile::parse("bogus: 1\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn merge_prefers_overrides() {
        let base = ConfigFile {
            image_base_dir: Some("/a".into()),
            stats_file: Some("/a/stats.json".into()),
            secret: Some("one".into()),
            libraries: None,
        };
        let merged = base.merge(ConfigFile {
            image_base_dir: Some("/b".into()),
            ..ConfigFile::default()
        });
        assert_eq!(merged.image_base_dir, Some(PathBuf::from("/b")));
        assert_eq!(merged.stats_file, Some(PathBuf::from("/a/stats.json")));
        assert_eq!(merged.secret.as_deref(), Some("one"));
    }

    #[test]
    fn missing_secret_generates_ephemeral_key() {
        let config = ServiceConfig::from_file(ConfigFile::default()).unwrap();
        assert!(config.ephemeral_key);
        assert_eq!(config.libraries, LibraryMap::default());
    }

    #[test]
    fn empty_secret_rejected() {
        let file = ConfigFile {
            secret: Some(String::new()),
            ..ConfigFile::default()
        };
        assert!(matches!(
            ServiceConfig::from_file(file),
            Err(ConfigError::InvalidSecret(_))
        ));
    }
}
