#![deny(missing_docs)]

//! # randpic-core: Domain Core of the randpic Image Service
//!
//! This crate holds everything the HTTP layer delegates to. It has no
//! knowledge of HTTP: handlers in `randpic-api` call into it and map its
//! errors onto status codes.
//!
//! ## Components
//!
//! | Module          | Role                                                      |
//! |-----------------|-----------------------------------------------------------|
//! | [`token`]       | Keyed HMAC-SHA256 re-fetch tokens, constant-time matching |
//! | [`library`]     | Library key → sandboxed canonical directory               |
//! | [`candidate`]   | Enumeration of the eligible image file set                |
//! | [`selector`]    | Uniform random pick from the eligible set                 |
//! | [`locator`]     | Token lookup with post-match containment re-check         |
//! | [`stats`]       | File-locked access counters and report formatting         |
//! | [`config`]      | Immutable service configuration                           |
//!
//! ## Design Principles
//!
//! 1. **Tokens are capabilities.** A token is HMAC(secret, filename). Holding
//!    one proves the server handed out that file; without the secret tokens
//!    cannot be enumerated or forged.
//!
//! 2. **Every filesystem path is contained.** Library roots and served files
//!    are canonicalized and checked component-wise against the base directory
//!    before any image byte is read.
//!
//! 3. **The stats file is the only shared mutable state.** All mutation goes
//!    through [`stats::StatsStore`], serialized by an exclusive file lock.

pub mod candidate;
pub mod config;
pub mod error;
pub mod library;
pub mod locator;
pub mod selector;
pub mod stats;
pub mod token;

pub use candidate::{eligible_images, ImageCandidate, IMAGE_EXTENSIONS};
pub use config::{LibraryMap, ServiceConfig};
pub use error::{ConfigError, ResolveError, StatsError};
pub use library::{Library, LibraryKey, LibraryResolver};
pub use locator::locate;
pub use selector::{pick_random, pick_random_with};
pub use stats::{FileStatsStore, MemoryStatsStore, StatsRecord, StatsReport, StatsStore};
pub use token::{AccessToken, TokenKey};
