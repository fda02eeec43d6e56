//! JSON Document Backend
//!
//! Keeps every record of a project in one structured JSON document. Each
//! write produces a new version of the document, persists it through a
//! temporary file and an atomic rename, and only then publishes it to
//! readers. Readers hold an `Arc` to the version they started with.
//!
//! Several instances may share one file (a long-running host plus one-shot
//! calls). Writes hold an exclusive lock on a sidecar `.lock` file and
//! re-read the document inside it; snapshots re-read under a shared lock.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use project_memory_core::{EntityId, EntityKind, NaturalKey, Record};

use crate::storage::backend::{Modifier, RecordReader, Scan, StorageBackend, UpsertBuilder, Upserted};
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::ensure_parent_dir;

/// Current document layout version
pub const DOCUMENT_VERSION: u32 = 1;

/// On-disk shape of the document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryDocument {
    pub version: u32,
    /// Last id issued per kind; ids are never reused
    #[serde(default)]
    pub sequences: BTreeMap<EntityKind, EntityId>,
    #[serde(default)]
    pub records: Vec<Record>,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self {
            version: DOCUMENT_VERSION,
            sequences: BTreeMap::new(),
            records: Vec::new(),
        }
    }
}

impl MemoryDocument {
    fn position(&self, kind: EntityKind, id: EntityId) -> Option<usize> {
        self.records
            .iter()
            .position(|r| r.kind() == kind && r.id() == id)
    }

    fn position_by_key(&self, key: &NaturalKey) -> Option<usize> {
        self.records
            .iter()
            .position(|r| r.natural_key().as_ref() == Some(key))
    }

    /// Issue the next id for `kind`. Never below an id already present, so a
    /// hand-edited document cannot cause collisions.
    fn next_id(&mut self, kind: EntityKind) -> EntityId {
        let highest = self
            .records
            .iter()
            .filter(|r| r.kind() == kind)
            .map(|r| r.id())
            .max()
            .unwrap_or(0);
        let sequence = self.sequences.entry(kind).or_insert(0);
        *sequence = (*sequence).max(highest) + 1;
        *sequence
    }

    fn insert(&mut self, mut record: Record) -> Record {
        let id = self.next_id(record.kind());
        record.set_id(id);
        self.records.push(record.clone());
        record
    }
}

/// Document-backed storage for one project
pub struct DocumentBackend {
    /// `None` keeps the document in memory only
    path: Option<PathBuf>,
    current: RwLock<Loaded>,
}

/// The last version of the document this instance read or wrote, with the
/// exact file text it came from.
#[derive(Default)]
struct Loaded {
    raw: String,
    document: Arc<MemoryDocument>,
}

impl Loaded {
    /// Re-read the file and replace the cached version if its text changed.
    /// Other instances on the same project root may have written since.
    fn refresh(&mut self, path: &Path) -> AppResult<()> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        if raw != self.raw {
            self.document = Arc::new(parse_document(path, &raw)?);
            self.raw = raw;
        }
        Ok(())
    }
}

impl DocumentBackend {
    /// Open the document at `path`, starting empty if the file does not exist yet.
    pub fn open(path: &Path) -> AppResult<Self> {
        ensure_parent_dir(path)?;

        let mut loaded = Loaded::default();
        {
            let _lock = FileLock::acquire(path, LockMode::Exclusive)?;
            if path.exists() {
                loaded.refresh(path)?;
            } else {
                loaded.raw = write_atomic(path, &loaded.document)?;
            }
        }

        tracing::debug!(
            "[DocumentBackend] Opened {} ({} records)",
            path.display(),
            loaded.document.records.len()
        );

        Ok(Self {
            path: Some(path.to_path_buf()),
            current: RwLock::new(loaded),
        })
    }

    /// A document that is never written to disk.
    pub fn new_in_memory() -> Self {
        Self {
            path: None,
            current: RwLock::new(Loaded::default()),
        }
    }

    /// Latest version of the document, reloaded from disk under a shared lock.
    fn read_current(&self) -> AppResult<Arc<MemoryDocument>> {
        let mut guard = self
            .current
            .write()
            .map_err(|_| AppError::internal("document lock poisoned"))?;

        if let Some(ref path) = self.path {
            let _lock = FileLock::acquire(path, LockMode::Shared)?;
            guard.refresh(path)?;
        }
        Ok(Arc::clone(&guard.document))
    }

    /// Apply `f` to a copy of the latest document, persist the copy, then
    /// publish it. The file lock is held from the re-read to the rename, so
    /// writers in other processes never work from a stale copy. If `f` or the
    /// write fails, readers keep seeing the previous version.
    fn write<T>(&self, f: impl FnOnce(&mut MemoryDocument) -> AppResult<T>) -> AppResult<T> {
        let mut guard = self
            .current
            .write()
            .map_err(|_| AppError::internal("document lock poisoned"))?;

        let _lock = match self.path {
            Some(ref path) => {
                let lock = FileLock::acquire(path, LockMode::Exclusive)?;
                guard.refresh(path)?;
                Some(lock)
            }
            None => None,
        };

        let mut next = MemoryDocument::clone(&guard.document);
        let value = f(&mut next)?;
        if let Some(ref path) = self.path {
            guard.raw = write_atomic(path, &next)?;
        }
        guard.document = Arc::new(next);
        Ok(value)
    }
}

impl std::fmt::Debug for DocumentBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentBackend")
            .field("path", &self.path)
            .finish()
    }
}

impl StorageBackend for DocumentBackend {
    fn name(&self) -> &'static str {
        "document"
    }

    fn upsert(&self, key: &NaturalKey, build: &mut UpsertBuilder<'_>) -> AppResult<Upserted> {
        self.write(|doc| match doc.position_by_key(key) {
            Some(pos) => {
                let mut record = build(Some(&doc.records[pos]))?;
                record.set_id(doc.records[pos].id());
                doc.records[pos] = record.clone();
                Ok(Upserted {
                    record,
                    inserted: false,
                })
            }
            None => {
                let record = build(None)?;
                Ok(Upserted {
                    record: doc.insert(record),
                    inserted: true,
                })
            }
        })
    }

    fn append(&self, record: Record) -> AppResult<Record> {
        self.write(|doc| Ok(doc.insert(record)))
    }

    fn modify(&self, kind: EntityKind, id: EntityId, apply: &mut Modifier<'_>) -> AppResult<Record> {
        self.write(|doc| {
            let pos = doc
                .position(kind, id)
                .ok_or_else(|| AppError::not_found(format!("{} #{} not found", kind, id)))?;
            let mut record = doc.records[pos].clone();
            apply(&mut record)?;
            record.set_id(id);
            doc.records[pos] = record.clone();
            Ok(record)
        })
    }

    fn snapshot(&self) -> AppResult<Box<dyn RecordReader + '_>> {
        Ok(Box::new(DocumentSnapshot {
            document: self.read_current()?,
        }))
    }
}

/// One published version of the document
struct DocumentSnapshot {
    document: Arc<MemoryDocument>,
}

impl RecordReader for DocumentSnapshot {
    fn get(&self, kind: EntityKind, id: EntityId) -> AppResult<Option<Record>> {
        Ok(self
            .document
            .position(kind, id)
            .map(|pos| self.document.records[pos].clone()))
    }

    fn find(&self, key: &NaturalKey) -> AppResult<Option<Record>> {
        Ok(self
            .document
            .position_by_key(key)
            .map(|pos| self.document.records[pos].clone()))
    }

    fn scan(&self, scan: &Scan) -> AppResult<Vec<Record>> {
        let mut rows: Vec<&Record> = self
            .document
            .records
            .iter()
            .filter(|r| scan.admits(r))
            .collect();
        rows.sort_by(|a, b| scan.order.compare(a, b));
        if let Some(limit) = scan.limit {
            rows.truncate(limit);
        }
        Ok(rows.into_iter().cloned().collect())
    }

    fn count(&self, kind: EntityKind, statuses: &[&str]) -> AppResult<usize> {
        Ok(self
            .document
            .records
            .iter()
            .filter(|r| r.kind() == kind)
            .filter(|r| {
                statuses.is_empty()
                    || r.status_str().is_some_and(|status| statuses.contains(&status))
            })
            .count())
    }
}

fn parse_document(path: &Path, raw: &str) -> AppResult<MemoryDocument> {
    if raw.trim().is_empty() {
        return Ok(MemoryDocument::default());
    }
    let document: MemoryDocument = serde_json::from_str(raw)?;
    if document.version > DOCUMENT_VERSION {
        return Err(AppError::database(format!(
            "{} has document version {}, newer than supported version {}",
            path.display(),
            document.version,
            DOCUMENT_VERSION
        )));
    }
    Ok(document)
}

/// Write `document` next to `path` and rename it into place, returning the
/// text written.
fn write_atomic(path: &Path, document: &MemoryDocument) -> AppResult<String> {
    let mut raw = serde_json::to_string_pretty(document)?;
    raw.push('\n');

    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(raw.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| AppError::Io(e.error))?;
    Ok(raw)
}

// ============================================================================
// Cross-process locking
// ============================================================================

/// How long a caller waits for another process to release the lock
const LOCK_RETRIES: usize = 500;
const LOCK_RETRY_SLEEP: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockMode {
    Shared,
    Exclusive,
}

/// Advisory lock on `<document>.lock`, released on drop.
struct FileLock {
    file: File,
}

impl FileLock {
    fn acquire(document: &Path, mode: LockMode) -> AppResult<Self> {
        let path = lock_path(document);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        for _ in 0..LOCK_RETRIES {
            let attempt = match mode {
                LockMode::Shared => FileExt::try_lock_shared(&file),
                LockMode::Exclusive => FileExt::try_lock_exclusive(&file),
            };
            match attempt {
                Ok(()) => return Ok(Self { file }),
                Err(_) => std::thread::sleep(LOCK_RETRY_SLEEP),
            }
        }

        Err(AppError::database(format!(
            "Timed out waiting for {:?} lock on {}",
            mode,
            path.display()
        )))
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!("[DocumentBackend] Failed to release file lock: {}", e);
        }
    }
}

fn lock_path(document: &Path) -> PathBuf {
    let mut name = document
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    document.with_file_name(name)
}
