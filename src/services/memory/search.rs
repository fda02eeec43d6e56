//! Memory Search
//!
//! Case-insensitive substring search across stories, tasks, lessons, and
//! knowledge notes. Each kind contributes at most `RESULTS_PER_KIND` hits,
//! newest first, and kinds appear in a fixed order.

use std::fmt;

use serde::Serialize;

use project_memory_core::text::{preview, require_text};
use project_memory_core::{EntityId, EntityKind, Record};

use crate::services::memory::store::ProjectMemoryStore;
use crate::storage::backend::Scan;
use crate::utils::error::AppResult;

/// Hits returned per entity kind
pub const RESULTS_PER_KIND: usize = 5;

/// Characters of the matched body kept in a hit's preview
pub const SEARCH_PREVIEW_CHARS: usize = 150;

/// Searched kinds, in report order
pub const SEARCH_KINDS: [EntityKind; 4] = [
    EntityKind::Story,
    EntityKind::Task,
    EntityKind::Lesson,
    EntityKind::Knowledge,
];

/// Kinds that carry a category and can be narrowed by one
const CATEGORIZED_KINDS: [EntityKind; 2] = [EntityKind::Lesson, EntityKind::Knowledge];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub kind: EntityKind,
    pub id: EntityId,
    pub title: String,
    pub preview: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchReport {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub hits: Vec<SearchHit>,
}

impl SearchReport {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// Search the store for `query`, optionally restricted to one category.
///
/// Only lessons and knowledge notes have a category, so a category filter
/// excludes stories and tasks.
pub fn search(
    store: &ProjectMemoryStore,
    query: &str,
    category: Option<&str>,
) -> AppResult<SearchReport> {
    // Blank queries are rejected, but the needle itself is matched verbatim.
    require_text("query", query)?;
    let category = category.map(str::trim).filter(|c| !c.is_empty());

    let kinds: &[EntityKind] = if category.is_some() {
        &CATEGORIZED_KINDS
    } else {
        &SEARCH_KINDS
    };

    let reader = store.reader()?;
    let mut hits = Vec::new();
    for &kind in kinds {
        let mut scan = Scan::new(kind).matching(query).limit(RESULTS_PER_KIND);
        if let Some(category) = category {
            scan = scan.in_category(category);
        }
        hits.extend(reader.scan(&scan)?.iter().filter_map(to_hit));
    }

    tracing::debug!(
        "[search] '{}' matched {} records",
        query,
        hits.len()
    );

    Ok(SearchReport {
        query: query.to_string(),
        category: category.map(str::to_string),
        hits,
    })
}

fn to_hit(record: &Record) -> Option<SearchHit> {
    let (title, body) = record.searchable_text()?;
    Some(SearchHit {
        kind: record.kind(),
        id: record.id(),
        title: title.to_string(),
        preview: preview(body, SEARCH_PREVIEW_CHARS),
    })
}

impl fmt::Display for SearchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits.is_empty() {
            return write!(f, "No results found for \"{}\"", self.query);
        }

        write!(f, "# Search Results for \"{}\"", self.query)?;
        if let Some(ref category) = self.category {
            write!(f, " in {}", category)?;
        }
        writeln!(f)?;
        writeln!(f)?;
        for hit in &self.hits {
            writeln!(f, "- [{} #{}] {}: {}", hit.kind, hit.id, hit.title, hit.preview)?;
        }
        Ok(())
    }
}
