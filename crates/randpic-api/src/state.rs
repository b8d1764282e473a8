//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers via
//! the `State` extractor.
//!
//! Everything here is immutable after startup except the statistics store,
//! which serializes its own mutations. The store is injected as a trait
//! object so tests can swap in [`MemoryStatsStore`].

use std::sync::Arc;

use randpic_core::{
    FileStatsStore, LibraryResolver, MemoryStatsStore, ServiceConfig, StatsStore, TokenKey,
};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Resolves request suffixes to sandboxed library directories.
    pub resolver: Arc<LibraryResolver>,
    /// Key for deriving and checking re-fetch tokens.
    pub token_key: Arc<TokenKey>,
    /// Access counters.
    pub stats: Arc<dyn StatsStore>,
}

impl AppState {
    /// Build state backed by the statistics file named in `config`.
    pub fn new(config: ServiceConfig) -> Self {
        let stats = Arc::new(FileStatsStore::new(config.stats_file.clone()));
        Self::with_stats(config, stats)
    }

    /// Build state with an explicit statistics store.
    pub fn with_stats(config: ServiceConfig, stats: Arc<dyn StatsStore>) -> Self {
        Self {
            resolver: Arc::new(LibraryResolver::new(
                config.image_base_dir,
                config.libraries,
            )),
            token_key: Arc::new(config.token_key),
            stats,
        }
    }

    /// Build state with a fresh in-memory statistics store.
    pub fn in_memory(config: ServiceConfig) -> Self {
        Self::with_stats(config, Arc::new(MemoryStatsStore::new()))
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("resolver", &self.resolver)
            .field("token_key", &self.token_key)
            .finish_non_exhaustive()
    }
}
