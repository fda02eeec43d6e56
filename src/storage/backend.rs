//! Storage Interface
//!
//! The capability set every persistence engine provides: upsert by natural
//! key, append with a fresh id, read-modify-write by id, and ordered reads
//! from a consistent snapshot. Entity rules live above this interface, so the
//! SQLite and JSON document backends are interchangeable.

use std::cmp::Ordering;

use project_memory_core::{EntityId, EntityKind, NaturalKey, Record};

use crate::utils::error::AppResult;

/// Result of an upsert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upserted {
    pub record: Record,
    /// `true` when no row shared the key and a new one was inserted
    pub inserted: bool,
}

/// Builds the row to store for an upsert, given the row currently holding the key.
pub type UpsertBuilder<'a> = dyn FnMut(Option<&Record>) -> AppResult<Record> + 'a;

/// Mutates an existing row in place; returning an error aborts the write.
pub type Modifier<'a> = dyn FnMut(&mut Record) -> AppResult<()> + 'a;

/// A persistence engine for one project's entities.
pub trait StorageBackend: Send + Sync + std::fmt::Debug {
    /// Short engine name for logs ("sqlite", "document")
    fn name(&self) -> &'static str;

    /// Replace the row holding `key`, or insert one if none does. The lookup
    /// and the write happen atomically with respect to other writers.
    fn upsert(&self, key: &NaturalKey, build: &mut UpsertBuilder<'_>) -> AppResult<Upserted>;

    /// Insert `record` under the next id for its kind and return it with that id.
    fn append(&self, record: Record) -> AppResult<Record>;

    /// Apply `apply` to the row `(kind, id)` and persist the result atomically.
    /// Fails with `NotFound` if the row does not exist.
    fn modify(&self, kind: EntityKind, id: EntityId, apply: &mut Modifier<'_>) -> AppResult<Record>;

    /// Open a reader that observes one consistent state of the store.
    fn snapshot(&self) -> AppResult<Box<dyn RecordReader + '_>>;
}

/// Read access to one consistent state of the store.
pub trait RecordReader {
    fn get(&self, kind: EntityKind, id: EntityId) -> AppResult<Option<Record>>;

    fn find(&self, key: &NaturalKey) -> AppResult<Option<Record>>;

    /// Rows of `scan.kind` that pass its filters, in its order, up to its limit.
    fn scan(&self, scan: &Scan) -> AppResult<Vec<Record>>;

    /// Number of rows of `kind`, restricted to `statuses` when non-empty.
    fn count(&self, kind: EntityKind, statuses: &[&str]) -> AppResult<usize>;
}

// ============================================================================
// Scans
// ============================================================================

/// Row ordering for scans. Ties always fall back to id so results are stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    /// Newest first
    #[default]
    CreatedDesc,
    /// Natural key ascending: (category, key), component, or environment
    KeyAsc,
    /// Priority ascending (1 first), then newest first
    PriorityThenCreatedDesc,
}

impl Order {
    /// In-memory equivalent of the SQL ordering each backend must honor.
    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        let newest_first = || {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id().cmp(&a.id()))
        };
        match self {
            Order::CreatedDesc => newest_first(),
            Order::KeyAsc => a
                .key_sort_tuple()
                .cmp(&b.key_sort_tuple())
                .then_with(|| a.id().cmp(&b.id())),
            Order::PriorityThenCreatedDesc => a
                .priority()
                .cmp(&b.priority())
                .then_with(newest_first),
        }
    }
}

/// An ordered, filtered read over one entity kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scan {
    pub kind: EntityKind,
    /// Wire names of admitted statuses; empty admits all
    pub statuses: Vec<&'static str>,
    /// Lowercased needle matched against title and body
    pub text: Option<String>,
    /// Exact, case-insensitive category match
    pub category: Option<String>,
    pub order: Order,
    pub limit: Option<usize>,
}

impl Scan {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            statuses: Vec::new(),
            text: None,
            category: None,
            order: Order::default(),
            limit: None,
        }
    }

    pub fn statuses(mut self, statuses: &[&'static str]) -> Self {
        self.statuses = statuses.to_vec();
        self
    }

    pub fn matching(mut self, needle: &str) -> Self {
        self.text = Some(needle.to_lowercase());
        self
    }

    pub fn in_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_lowercase());
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether some filter can only be evaluated in memory
    pub fn needs_post_filter(&self) -> bool {
        self.text.is_some() || self.category.is_some()
    }

    /// The full predicate: status, text, and category filters.
    pub fn admits(&self, record: &Record) -> bool {
        if record.kind() != self.kind {
            return false;
        }
        if !self.statuses.is_empty() {
            match record.status_str() {
                Some(status) if self.statuses.contains(&status) => {}
                _ => return false,
            }
        }
        self.admits_post_filter(record)
    }

    /// The text and category parts of the predicate, shared by both backends
    /// so matching semantics never diverge.
    pub fn admits_post_filter(&self, record: &Record) -> bool {
        if let Some(ref needle) = self.text {
            if !record.matches_text(needle) {
                return false;
            }
        }
        if let Some(ref category) = self.category {
            match record.category() {
                Some(c) if c.to_lowercase() == *category => {}
                _ => return false,
            }
        }
        true
    }
}
