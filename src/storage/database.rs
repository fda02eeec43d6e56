//! SQLite Database
//!
//! Embedded database backend using rusqlite with r2d2 connection pooling.
//! One table per entity kind; list fields are stored as JSON text and
//! timestamps as fixed-width RFC 3339 text so they sort in time order.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};

use project_memory_core::clock::{format_timestamp, parse_timestamp};
use project_memory_core::{
    ArchitectureNote, CoreError, Defect, DeploymentProcedure, EntityId, EntityKind,
    KnowledgeNote, Lesson, NaturalKey, Priority, Record, Setting, Story, Task, Timestamp,
};

use crate::storage::backend::{
    Modifier, Order, RecordReader, Scan, StorageBackend, UpsertBuilder, Upserted,
};
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::ensure_parent_dir;

/// Type alias for the connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// How long a writer waits on a lock held by another process
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed storage for one project
#[derive(Clone)]
pub struct SqliteBackend {
    pool: DbPool,
}

impl SqliteBackend {
    /// Open (or create) the database file at `path` and initialize its schema.
    pub fn open(path: &Path) -> AppResult<Self> {
        ensure_parent_dir(path)?;

        let manager = SqliteConnectionManager::file(path)
            .with_init(|conn| conn.busy_timeout(BUSY_TIMEOUT));
        let pool = Pool::builder()
            .max_size(8)
            .build(manager)
            .map_err(|e| AppError::database(format!("Failed to create connection pool: {}", e)))?;

        let db = Self { pool };
        db.init_schema(true)?;
        tracing::debug!("[SqliteBackend] Opened {}", path.display());
        Ok(db)
    }

    /// Create an in-memory database with the same schema as a file database.
    ///
    /// Each in-memory connection is its own database, so the pool holds one.
    pub fn new_in_memory() -> AppResult<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| AppError::database(format!("Failed to create connection pool: {}", e)))?;

        let db = Self { pool };
        db.init_schema(false)?;
        Ok(db)
    }

    /// Initialize the database schema
    fn init_schema(&self, wal: bool) -> AppResult<()> {
        let conn = self.get_connection()?;

        if wal {
            conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        }

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS settings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                category TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                description TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(category, key)
            );

            CREATE TABLE IF NOT EXISTS architecture_notes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                component TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL,
                tech_stack TEXT NOT NULL DEFAULT '[]',
                file_paths TEXT NOT NULL DEFAULT '[]',
                patterns TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS deployment_procedures (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                environment TEXT NOT NULL UNIQUE,
                target_host TEXT,
                steps TEXT NOT NULL,
                verification TEXT,
                rollback TEXT,
                last_deployed_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS stories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'active',
                priority INTEGER NOT NULL DEFAULT 3 CHECK (priority BETWEEN 1 AND 5),
                files_affected TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                completed_at TEXT
            );

            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                story_id INTEGER,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'todo',
                files_affected TEXT NOT NULL DEFAULT '[]',
                implementation_notes TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                completed_at TEXT
            );

            CREATE TABLE IF NOT EXISTS defects (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                story_id INTEGER,
                task_id INTEGER,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                severity TEXT NOT NULL DEFAULT 'medium',
                status TEXT NOT NULL DEFAULT 'open',
                files_affected TEXT NOT NULL DEFAULT '[]',
                fix_description TEXT,
                created_at TEXT NOT NULL,
                resolved_at TEXT
            );

            CREATE TABLE IF NOT EXISTS lessons (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                category TEXT NOT NULL,
                impact_level TEXT NOT NULL DEFAULT 'medium',
                related_files TEXT NOT NULL DEFAULT '[]',
                tags TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS knowledge_notes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                category TEXT NOT NULL DEFAULT 'general',
                tags TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_stories_status ON stories(status);
            CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
            CREATE INDEX IF NOT EXISTS idx_defects_status ON defects(status);
            CREATE INDEX IF NOT EXISTS idx_lessons_created ON lessons(created_at);",
        )?;

        Ok(())
    }

    /// Get a connection from the pool
    fn get_connection(&self) -> AppResult<PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| AppError::database(format!("Failed to get connection: {}", e)))
    }

    /// Run `f` inside an IMMEDIATE transaction, committing only if it succeeds.
    fn write<T>(&self, f: impl FnOnce(&Connection) -> AppResult<T>) -> AppResult<T> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("connections", &self.pool.state().connections)
            .finish()
    }
}

impl StorageBackend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn upsert(&self, key: &NaturalKey, build: &mut UpsertBuilder<'_>) -> AppResult<Upserted> {
        self.write(|conn| {
            let existing = find_by_key(conn, key)?;
            let mut record = build(existing.as_ref())?;
            let inserted = match existing {
                Some(ref current) => {
                    record.set_id(current.id());
                    update_record(conn, &record)?;
                    false
                }
                None => {
                    let id = insert_record(conn, &record)?;
                    record.set_id(id);
                    true
                }
            };
            Ok(Upserted { record, inserted })
        })
    }

    fn append(&self, mut record: Record) -> AppResult<Record> {
        self.write(|conn| {
            let id = insert_record(conn, &record)?;
            record.set_id(id);
            Ok(record)
        })
    }

    fn modify(&self, kind: EntityKind, id: EntityId, apply: &mut Modifier<'_>) -> AppResult<Record> {
        self.write(|conn| {
            let mut record = get_by_id(conn, kind, id)?
                .ok_or_else(|| AppError::not_found(format!("{} #{} not found", kind, id)))?;
            apply(&mut record)?;
            record.set_id(id);
            update_record(conn, &record)?;
            Ok(record)
        })
    }

    fn snapshot(&self) -> AppResult<Box<dyn RecordReader + '_>> {
        let conn = self.get_connection()?;
        conn.execute_batch("BEGIN DEFERRED")?;
        Ok(Box::new(SqliteSnapshot { conn }))
    }
}

// ============================================================================
// Snapshot reader
// ============================================================================

/// A pooled connection held inside a read transaction. Every read through it
/// sees the same committed state; the transaction ends when it is dropped.
struct SqliteSnapshot {
    conn: PooledConnection<SqliteConnectionManager>,
}

impl RecordReader for SqliteSnapshot {
    fn get(&self, kind: EntityKind, id: EntityId) -> AppResult<Option<Record>> {
        get_by_id(&self.conn, kind, id)
    }

    fn find(&self, key: &NaturalKey) -> AppResult<Option<Record>> {
        find_by_key(&self.conn, key)
    }

    fn scan(&self, scan: &Scan) -> AppResult<Vec<Record>> {
        scan_rows(&self.conn, scan)
    }

    fn count(&self, kind: EntityKind, statuses: &[&str]) -> AppResult<usize> {
        count_rows(&self.conn, kind, statuses)
    }
}

impl Drop for SqliteSnapshot {
    fn drop(&mut self) {
        if let Err(e) = self.conn.execute_batch("ROLLBACK") {
            tracing::warn!("[SqliteBackend] Failed to end read transaction: {}", e);
        }
    }
}

// ============================================================================
// Queries
// ============================================================================

fn table(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Setting => "settings",
        EntityKind::Architecture => "architecture_notes",
        EntityKind::Deployment => "deployment_procedures",
        EntityKind::Story => "stories",
        EntityKind::Task => "tasks",
        EntityKind::Defect => "defects",
        EntityKind::Lesson => "lessons",
        EntityKind::Knowledge => "knowledge_notes",
    }
}

/// Column list in the order the `row_to_*` helpers read it
fn columns(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Setting => "id, category, key, value, description, created_at, updated_at",
        EntityKind::Architecture => {
            "id, component, description, tech_stack, file_paths, patterns, created_at, updated_at"
        }
        EntityKind::Deployment => {
            "id, environment, target_host, steps, verification, rollback, last_deployed_at, created_at, updated_at"
        }
        EntityKind::Story => {
            "id, title, description, status, priority, files_affected, created_at, updated_at, completed_at"
        }
        EntityKind::Task => {
            "id, story_id, title, description, status, files_affected, implementation_notes, created_at, updated_at, completed_at"
        }
        EntityKind::Defect => {
            "id, story_id, task_id, title, description, severity, status, files_affected, fix_description, created_at, resolved_at"
        }
        EntityKind::Lesson => {
            "id, title, description, category, impact_level, related_files, tags, created_at"
        }
        EntityKind::Knowledge => "id, title, content, category, tags, created_at, updated_at",
    }
}

/// ORDER BY clause matching `Order::compare`
fn order_clause(kind: EntityKind, order: Order) -> &'static str {
    match (order, kind) {
        (Order::KeyAsc, EntityKind::Setting) => "category ASC, key ASC, id ASC",
        (Order::KeyAsc, EntityKind::Architecture) => "component ASC, id ASC",
        (Order::KeyAsc, EntityKind::Deployment) => "environment ASC, id ASC",
        (Order::KeyAsc, _) => "id ASC",
        (Order::PriorityThenCreatedDesc, EntityKind::Story) => {
            "priority ASC, created_at DESC, id DESC"
        }
        _ => "created_at DESC, id DESC",
    }
}

fn row_to_record(kind: EntityKind, row: &rusqlite::Row) -> rusqlite::Result<Record> {
    Ok(match kind {
        EntityKind::Setting => row_to_setting(row)?.into(),
        EntityKind::Architecture => row_to_architecture(row)?.into(),
        EntityKind::Deployment => row_to_deployment(row)?.into(),
        EntityKind::Story => row_to_story(row)?.into(),
        EntityKind::Task => row_to_task(row)?.into(),
        EntityKind::Defect => row_to_defect(row)?.into(),
        EntityKind::Lesson => row_to_lesson(row)?.into(),
        EntityKind::Knowledge => row_to_knowledge(row)?.into(),
    })
}

fn get_by_id(conn: &Connection, kind: EntityKind, id: EntityId) -> AppResult<Option<Record>> {
    let sql = format!(
        "SELECT {} FROM {} WHERE id = ?1",
        columns(kind),
        table(kind)
    );
    let record = conn
        .query_row(&sql, params![id], |row| row_to_record(kind, row))
        .optional()?;
    Ok(record)
}

fn find_by_key(conn: &Connection, key: &NaturalKey) -> AppResult<Option<Record>> {
    let kind = key.kind();
    let record = match key {
        NaturalKey::Setting { category, key } => {
            let sql = format!(
                "SELECT {} FROM settings WHERE category = ?1 AND key = ?2",
                columns(kind)
            );
            conn.query_row(&sql, params![category, key], |row| row_to_record(kind, row))
                .optional()?
        }
        NaturalKey::Component(component) => {
            let sql = format!(
                "SELECT {} FROM architecture_notes WHERE component = ?1",
                columns(kind)
            );
            conn.query_row(&sql, params![component], |row| row_to_record(kind, row))
                .optional()?
        }
        NaturalKey::Environment(environment) => {
            let sql = format!(
                "SELECT {} FROM deployment_procedures WHERE environment = ?1",
                columns(kind)
            );
            conn.query_row(&sql, params![environment], |row| row_to_record(kind, row))
                .optional()?
        }
    };
    Ok(record)
}

/// `status IN (?1, ?2, ...)` for `n` statuses, or nothing when `n` is zero
fn status_filter(kind: EntityKind, n: usize) -> AppResult<String> {
    if n == 0 {
        return Ok(String::new());
    }
    if !kind.has_status() {
        return Err(AppError::internal(format!("{} rows have no status", kind)));
    }
    let placeholders: Vec<String> = (1..=n).map(|i| format!("?{}", i)).collect();
    Ok(format!(" WHERE status IN ({})", placeholders.join(", ")))
}

fn scan_rows(conn: &Connection, scan: &Scan) -> AppResult<Vec<Record>> {
    let mut sql = format!(
        "SELECT {} FROM {}{} ORDER BY {}",
        columns(scan.kind),
        table(scan.kind),
        status_filter(scan.kind, scan.statuses.len())?,
        order_clause(scan.kind, scan.order)
    );
    // Text and category filters run after the query, so the limit must too.
    if let (Some(limit), false) = (scan.limit, scan.needs_post_filter()) {
        sql.push_str(&format!(" LIMIT {}", limit));
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(scan.statuses.iter()), |row| {
        row_to_record(scan.kind, row)
    })?;

    let mut records = Vec::new();
    for row in rows {
        let record = row?;
        if !scan.admits_post_filter(&record) {
            continue;
        }
        records.push(record);
        if scan.limit.is_some_and(|limit| records.len() >= limit) {
            break;
        }
    }
    Ok(records)
}

fn count_rows(conn: &Connection, kind: EntityKind, statuses: &[&str]) -> AppResult<usize> {
    let sql = format!(
        "SELECT COUNT(*) FROM {}{}",
        table(kind),
        status_filter(kind, statuses.len())?
    );
    let count: i64 = conn.query_row(&sql, params_from_iter(statuses.iter()), |row| row.get(0))?;
    Ok(count as usize)
}

// ============================================================================
// Writes
// ============================================================================

fn insert_record(conn: &Connection, record: &Record) -> AppResult<EntityId> {
    match record {
        Record::Setting(s) => {
            conn.execute(
                "INSERT INTO settings (category, key, value, description, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    s.category,
                    s.key,
                    s.value,
                    s.description,
                    format_timestamp(&s.created_at),
                    format_timestamp(&s.updated_at),
                ],
            )?;
        }
        Record::Architecture(a) => {
            conn.execute(
                "INSERT INTO architecture_notes (component, description, tech_stack, file_paths, patterns, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    a.component,
                    a.description,
                    json_list(&a.tech_stack)?,
                    json_list(&a.file_paths)?,
                    a.patterns,
                    format_timestamp(&a.created_at),
                    format_timestamp(&a.updated_at),
                ],
            )?;
        }
        Record::Deployment(d) => {
            conn.execute(
                "INSERT INTO deployment_procedures (environment, target_host, steps, verification, rollback, last_deployed_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    d.environment,
                    d.target_host,
                    d.steps,
                    d.verification,
                    d.rollback,
                    opt_text(&d.last_deployed_at),
                    format_timestamp(&d.created_at),
                    format_timestamp(&d.updated_at),
                ],
            )?;
        }
        Record::Story(s) => {
            conn.execute(
                "INSERT INTO stories (title, description, status, priority, files_affected, created_at, updated_at, completed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    s.title,
                    s.description,
                    s.status.as_str(),
                    s.priority.get(),
                    json_list(&s.files_affected)?,
                    format_timestamp(&s.created_at),
                    format_timestamp(&s.updated_at),
                    opt_text(&s.completed_at),
                ],
            )?;
        }
        Record::Task(t) => {
            conn.execute(
                "INSERT INTO tasks (story_id, title, description, status, files_affected, implementation_notes, created_at, updated_at, completed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    t.story_id,
                    t.title,
                    t.description,
                    t.status.as_str(),
                    json_list(&t.files_affected)?,
                    t.implementation_notes,
                    format_timestamp(&t.created_at),
                    format_timestamp(&t.updated_at),
                    opt_text(&t.completed_at),
                ],
            )?;
        }
        Record::Defect(d) => {
            conn.execute(
                "INSERT INTO defects (story_id, task_id, title, description, severity, status, files_affected, fix_description, created_at, resolved_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    d.story_id,
                    d.task_id,
                    d.title,
                    d.description,
                    d.severity.as_str(),
                    d.status.as_str(),
                    json_list(&d.files_affected)?,
                    d.fix_description,
                    format_timestamp(&d.created_at),
                    opt_text(&d.resolved_at),
                ],
            )?;
        }
        Record::Lesson(l) => {
            conn.execute(
                "INSERT INTO lessons (title, description, category, impact_level, related_files, tags, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    l.title,
                    l.description,
                    l.category,
                    l.impact_level.as_str(),
                    json_list(&l.related_files)?,
                    json_list(&l.tags)?,
                    format_timestamp(&l.created_at),
                ],
            )?;
        }
        Record::Knowledge(k) => {
            conn.execute(
                "INSERT INTO knowledge_notes (title, content, category, tags, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    k.title,
                    k.content,
                    k.category,
                    json_list(&k.tags)?,
                    format_timestamp(&k.created_at),
                    format_timestamp(&k.updated_at),
                ],
            )?;
        }
    }
    Ok(conn.last_insert_rowid())
}

fn update_record(conn: &Connection, record: &Record) -> AppResult<()> {
    let changed = match record {
        Record::Setting(s) => conn.execute(
            "UPDATE settings SET category = ?2, key = ?3, value = ?4, description = ?5,
                 created_at = ?6, updated_at = ?7 WHERE id = ?1",
            params![
                s.id,
                s.category,
                s.key,
                s.value,
                s.description,
                format_timestamp(&s.created_at),
                format_timestamp(&s.updated_at),
            ],
        )?,
        Record::Architecture(a) => conn.execute(
            "UPDATE architecture_notes SET component = ?2, description = ?3, tech_stack = ?4,
                 file_paths = ?5, patterns = ?6, created_at = ?7, updated_at = ?8 WHERE id = ?1",
            params![
                a.id,
                a.component,
                a.description,
                json_list(&a.tech_stack)?,
                json_list(&a.file_paths)?,
                a.patterns,
                format_timestamp(&a.created_at),
                format_timestamp(&a.updated_at),
            ],
        )?,
        Record::Deployment(d) => conn.execute(
            "UPDATE deployment_procedures SET environment = ?2, target_host = ?3, steps = ?4,
                 verification = ?5, rollback = ?6, last_deployed_at = ?7, created_at = ?8,
                 updated_at = ?9 WHERE id = ?1",
            params![
                d.id,
                d.environment,
                d.target_host,
                d.steps,
                d.verification,
                d.rollback,
                opt_text(&d.last_deployed_at),
                format_timestamp(&d.created_at),
                format_timestamp(&d.updated_at),
            ],
        )?,
        Record::Story(s) => conn.execute(
            "UPDATE stories SET title = ?2, description = ?3, status = ?4, priority = ?5,
                 files_affected = ?6, created_at = ?7, updated_at = ?8, completed_at = ?9
                 WHERE id = ?1",
            params![
                s.id,
                s.title,
                s.description,
                s.status.as_str(),
                s.priority.get(),
                json_list(&s.files_affected)?,
                format_timestamp(&s.created_at),
                format_timestamp(&s.updated_at),
                opt_text(&s.completed_at),
            ],
        )?,
        Record::Task(t) => conn.execute(
            "UPDATE tasks SET story_id = ?2, title = ?3, description = ?4, status = ?5,
                 files_affected = ?6, implementation_notes = ?7, created_at = ?8,
                 updated_at = ?9, completed_at = ?10 WHERE id = ?1",
            params![
                t.id,
                t.story_id,
                t.title,
                t.description,
                t.status.as_str(),
                json_list(&t.files_affected)?,
                t.implementation_notes,
                format_timestamp(&t.created_at),
                format_timestamp(&t.updated_at),
                opt_text(&t.completed_at),
            ],
        )?,
        Record::Defect(d) => conn.execute(
            "UPDATE defects SET story_id = ?2, task_id = ?3, title = ?4, description = ?5,
                 severity = ?6, status = ?7, files_affected = ?8, fix_description = ?9,
                 created_at = ?10, resolved_at = ?11 WHERE id = ?1",
            params![
                d.id,
                d.story_id,
                d.task_id,
                d.title,
                d.description,
                d.severity.as_str(),
                d.status.as_str(),
                json_list(&d.files_affected)?,
                d.fix_description,
                format_timestamp(&d.created_at),
                opt_text(&d.resolved_at),
            ],
        )?,
        Record::Lesson(l) => conn.execute(
            "UPDATE lessons SET title = ?2, description = ?3, category = ?4, impact_level = ?5,
                 related_files = ?6, tags = ?7, created_at = ?8 WHERE id = ?1",
            params![
                l.id,
                l.title,
                l.description,
                l.category,
                l.impact_level.as_str(),
                json_list(&l.related_files)?,
                json_list(&l.tags)?,
                format_timestamp(&l.created_at),
            ],
        )?,
        Record::Knowledge(k) => conn.execute(
            "UPDATE knowledge_notes SET title = ?2, content = ?3, category = ?4, tags = ?5,
                 created_at = ?6, updated_at = ?7 WHERE id = ?1",
            params![
                k.id,
                k.title,
                k.content,
                k.category,
                json_list(&k.tags)?,
                format_timestamp(&k.created_at),
                format_timestamp(&k.updated_at),
            ],
        )?,
    };

    if changed == 0 {
        return Err(AppError::not_found(format!(
            "{} #{} not found",
            record.kind(),
            record.id()
        )));
    }
    Ok(())
}

// ============================================================================
// Helper functions
// ============================================================================

fn json_list(items: &[String]) -> AppResult<String> {
    Ok(serde_json::to_string(items)?)
}

fn opt_text(ts: &Option<Timestamp>) -> Option<String> {
    ts.as_ref().map(format_timestamp)
}

fn conversion_error(idx: usize, err: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn ts_at(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Timestamp> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw).map_err(|e| conversion_error(idx, e))
}

fn opt_ts_at(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<Timestamp>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|r| parse_timestamp(&r).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn list_at(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn enum_at<T>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = CoreError>,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

fn row_to_setting(row: &rusqlite::Row) -> rusqlite::Result<Setting> {
    Ok(Setting {
        id: row.get(0)?,
        category: row.get(1)?,
        key: row.get(2)?,
        value: row.get(3)?,
        description: row.get(4)?,
        created_at: ts_at(row, 5)?,
        updated_at: ts_at(row, 6)?,
    })
}

fn row_to_architecture(row: &rusqlite::Row) -> rusqlite::Result<ArchitectureNote> {
    Ok(ArchitectureNote {
        id: row.get(0)?,
        component: row.get(1)?,
        description: row.get(2)?,
        tech_stack: list_at(row, 3)?,
        file_paths: list_at(row, 4)?,
        patterns: row.get(5)?,
        created_at: ts_at(row, 6)?,
        updated_at: ts_at(row, 7)?,
    })
}

fn row_to_deployment(row: &rusqlite::Row) -> rusqlite::Result<DeploymentProcedure> {
    Ok(DeploymentProcedure {
        id: row.get(0)?,
        environment: row.get(1)?,
        target_host: row.get(2)?,
        steps: row.get(3)?,
        verification: row.get(4)?,
        rollback: row.get(5)?,
        last_deployed_at: opt_ts_at(row, 6)?,
        created_at: ts_at(row, 7)?,
        updated_at: ts_at(row, 8)?,
    })
}

fn row_to_story(row: &rusqlite::Row) -> rusqlite::Result<Story> {
    let priority: u8 = row.get(4)?;
    Ok(Story {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        status: enum_at(row, 3)?,
        priority: Priority::new(priority).map_err(|e| conversion_error(4, e))?,
        files_affected: list_at(row, 5)?,
        created_at: ts_at(row, 6)?,
        updated_at: ts_at(row, 7)?,
        completed_at: opt_ts_at(row, 8)?,
    })
}

fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        story_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        status: enum_at(row, 4)?,
        files_affected: list_at(row, 5)?,
        implementation_notes: row.get(6)?,
        created_at: ts_at(row, 7)?,
        updated_at: ts_at(row, 8)?,
        completed_at: opt_ts_at(row, 9)?,
    })
}

fn row_to_defect(row: &rusqlite::Row) -> rusqlite::Result<Defect> {
    Ok(Defect {
        id: row.get(0)?,
        story_id: row.get(1)?,
        task_id: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        severity: enum_at(row, 5)?,
        status: enum_at(row, 6)?,
        files_affected: list_at(row, 7)?,
        fix_description: row.get(8)?,
        created_at: ts_at(row, 9)?,
        resolved_at: opt_ts_at(row, 10)?,
    })
}

fn row_to_lesson(row: &rusqlite::Row) -> rusqlite::Result<Lesson> {
    Ok(Lesson {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        category: row.get(3)?,
        impact_level: enum_at(row, 4)?,
        related_files: list_at(row, 5)?,
        tags: list_at(row, 6)?,
        created_at: ts_at(row, 7)?,
    })
}

fn row_to_knowledge(row: &rusqlite::Row) -> rusqlite::Result<KnowledgeNote> {
    Ok(KnowledgeNote {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        category: row.get(3)?,
        tags: list_at(row, 4)?,
        created_at: ts_at(row, 5)?,
        updated_at: ts_at(row, 6)?,
    })
}

// ============================================================================
// Tests
// ============================================================================
