//! # Error Hierarchy
//!
//! Structured error types for the randpic core, built with `thiserror`.
//! No `Box<dyn Error>`, no `.unwrap()` outside tests.
//!
//! Variants carry diagnostic context (keys, paths) for operator logs. The
//! HTTP layer is responsible for never echoing that context to clients.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from resolving a library or locating an image inside it.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// The requested suffix is not a configured library key.
    #[error("unknown library key: \"{0}\"")]
    InvalidLibrary(String),

    /// A resolved path lies outside its sandbox root, or could not be
    /// canonicalized at all.
    #[error("path escapes sandbox root {root}: {path}")]
    PathEscape {
        /// The path that failed the containment check.
        path: PathBuf,
        /// The root it was required to stay within.
        root: PathBuf,
    },

    /// The library directory contains no eligible image files.
    #[error("no eligible images in library \"{0}\"")]
    NoImages(String),

    /// No eligible image in the library matches the supplied token.
    #[error("no image in library \"{0}\" matches the supplied token")]
    NotFound(String),

    /// Filesystem failure while enumerating or inspecting files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the statistics store.
#[derive(Error, Debug)]
pub enum StatsError {
    /// Statistics were read before any increment created the record.
    #[error("statistics have not been initialized")]
    Uninitialized,

    /// The persisted record could not be parsed.
    #[error("statistics record is corrupt: {0}")]
    Corrupt(String),

    /// Filesystem failure while creating, locking, reading or writing the
    /// statistics file.
    #[error("statistics I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from building or loading the service configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A library key is empty, reserved, or contains forbidden characters.
    #[error("invalid library key \"{key}\": {reason}")]
    InvalidLibraryKey {
        /// The rejected key.
        key: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A library subdirectory is not a single plain path component.
    #[error("invalid subdirectory \"{subdir}\" for library \"{key}\": must be a single directory name")]
    InvalidSubdirectory {
        /// The library key the subdirectory belongs to.
        key: String,
        /// The rejected subdirectory.
        subdir: String,
    },

    /// The token secret is empty or cannot key the MAC.
    #[error("invalid token secret: {0}")]
    InvalidSecret(String),

    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// The configuration file path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML for [`crate::config::ConfigFile`].
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
}
