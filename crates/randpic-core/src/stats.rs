//! # Access Statistics
//!
//! A total request counter plus one counter per library, persisted as a
//! single flat JSON object:
//!
//! ```json
//! {"total":3,"pc":2,"pe":1}
//! ```
//!
//! ## Concurrency
//!
//! The statistics file is the only shared mutable state in the service.
//! [`FileStatsStore::increment`] performs its read-modify-write under an
//! exclusive OS file lock (`flock`), so concurrent requests, and concurrent
//! processes sharing the file, never lose updates. Reads take a shared lock.
//! Locks are held by a guard that releases them on drop, on every exit path.
//!
//! ## Lifecycle
//!
//! The file is created lazily by the first increment, together with its
//! parent directory. Reading before that reports
//! [`StatsError::Uninitialized`].

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::StatsError;

/// Persisted counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsRecord {
    /// Number of random images served across all libraries.
    #[serde(default)]
    pub total: u64,
    /// Per-library counters, keyed by library key.
    #[serde(flatten)]
    pub libraries: BTreeMap<String, u64>,
}

impl StatsRecord {
    /// Count one served image for `library`.
    pub fn record_hit(&mut self, library: &str) {
        self.total = self.total.saturating_add(1);
        let counter = self.libraries.entry(library.to_string()).or_insert(0);
        *counter = counter.saturating_add(1);
    }

    /// Counter for one library (0 when never served).
    pub fn count(&self, library: &str) -> u64 {
        self.libraries.get(library).copied().unwrap_or(0)
    }
}

/// Storage for access counters.
///
/// Injected into the HTTP state as `Arc<dyn StatsStore>` so tests can
/// substitute [`MemoryStatsStore`]. Implementations are blocking; async
/// callers run them on a blocking thread.
pub trait StatsStore: Send + Sync {
    /// Count one served image for `library`. Must be atomic with respect to
    /// concurrent calls.
    fn increment(&self, library: &str) -> Result<(), StatsError>;

    /// Read the current counters.
    fn read(&self) -> Result<StatsRecord, StatsError>;
}

// ---------------------------------------------------------------------------
// File-backed store
// ---------------------------------------------------------------------------

/// Statistics persisted in a JSON file guarded by `flock`.
#[derive(Debug, Clone)]
pub struct FileStatsStore {
    path: PathBuf,
}

impl FileStatsStore {
    /// Create a store for `path`. Nothing is touched on disk until the first
    /// increment.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The statistics file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_parent_dir(&self) -> Result<(), StatsError> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                std::fs::create_dir_all(parent)?;
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

impl StatsStore for FileStatsStore {
    fn increment(&self, library: &str) -> Result<(), StatsError> {
        self.ensure_parent_dir()?;
        // Creating without truncation is race-free: whoever creates the file
        // still has to take the lock before writing, and an empty file reads
        // as a fresh record.
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;
        let mut lock = FileLock::exclusive(file)?;

        let mut record = read_record(lock.file_mut())?.unwrap_or_default();
        record.record_hit(library);
        write_record(lock.file_mut(), &record)?;

        tracing::trace!(library, total = record.total, "statistics incremented");
        Ok(())
    }

    fn read(&self) -> Result<StatsRecord, StatsError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StatsError::Uninitialized)
            }
            Err(e) => return Err(e.into()),
        };
        let mut lock = FileLock::shared(file)?;
        read_record(lock.file_mut())?.ok_or(StatsError::Uninitialized)
    }
}

/// Holds an advisory lock on a file for as long as it lives.
struct FileLock {
    file: File,
}

impl FileLock {
    fn exclusive(file: File) -> std::io::Result<Self> {
        FileExt::lock_exclusive(&file)?;
        Ok(Self { file })
    }

    fn shared(file: File) -> std::io::Result<Self> {
        FileExt::lock_shared(&file)?;
        Ok(Self { file })
    }

    fn file_mut(&mut self) -> &mut File {
        &mut self.file
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            // Closing the descriptor releases the lock regardless.
            tracing::warn!(error = %e, "failed to release statistics file lock");
        }
    }
}

/// Read the whole file from the start. An empty file (just created, never
/// written) yields `None`.
fn read_record(file: &mut File) -> Result<Option<StatsRecord>, StatsError> {
    file.seek(SeekFrom::Start(0))?;
    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::InvalidData => StatsError::Corrupt("not valid UTF-8".into()),
            _ => StatsError::Io(e),
        })?;
    if content.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| StatsError::Corrupt(e.to_string()))
}

fn write_record(file: &mut File, record: &StatsRecord) -> Result<(), StatsError> {
    let bytes = serde_json::to_vec(record).map_err(|e| StatsError::Corrupt(e.to_string()))?;
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(&bytes)?;
    file.flush()?;
    file.sync_all()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// In-process store with the same observable semantics as
/// [`FileStatsStore`], minus persistence.
#[derive(Debug, Default)]
pub struct MemoryStatsStore {
    record: Mutex<Option<StatsRecord>>,
}

impl MemoryStatsStore {
    /// Create an uninitialized store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatsStore for MemoryStatsStore {
    fn increment(&self, library: &str) -> Result<(), StatsError> {
        self.record
            .lock()
            .get_or_insert_with(StatsRecord::default)
            .record_hit(library);
        Ok(())
    }

    fn read(&self) -> Result<StatsRecord, StatsError> {
        self.record.lock().clone().ok_or(StatsError::Uninitialized)
    }
}

// ---------------------------------------------------------------------------
// Reporting
// ---------------------------------------------------------------------------

/// Heading of the plain-text report.
pub const TEXT_REPORT_HEADER: &str = "=== 访问统计 ===";

/// Label of the total line in the plain-text report.
pub const TEXT_REPORT_TOTAL_LABEL: &str = "总请求数";

/// Counters shaped for the `/stats` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsReport {
    /// Total served images.
    pub total: u64,
    /// Per-library counters.
    pub details: BTreeMap<String, u64>,
}

impl From<StatsRecord> for StatsReport {
    fn from(record: StatsRecord) -> Self {
        Self {
            total: record.total,
            details: record.libraries,
        }
    }
}

impl StatsReport {
    /// Pretty-printed JSON. Non-ASCII characters are emitted as-is.
    pub fn to_json_pretty(&self) -> Result<String, StatsError> {
        serde_json::to_string_pretty(self).map_err(|e| StatsError::Corrupt(e.to_string()))
    }

    /// Human-readable report, one line per counter, library keys
    /// uppercased.
    pub fn to_text(&self) -> String {
        let mut out = format!(
            "{TEXT_REPORT_HEADER}\n{TEXT_REPORT_TOTAL_LABEL}: {}\n",
            group_thousands(self.total)
        );
        for (key, count) in &self.details {
            out.push_str(&format!(
                "{}: {}\n",
                key.to_uppercase(),
                group_thousands(*count)
            ));
        }
        out
    }
}

/// Format `n` with `,` between groups of three digits.
fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
