//! Data merger module
//!
//! This module joins the three upstream collections into CSV rows. Each
//! collection is indexed by its integer `id`, and one row is produced for
//! every identifier from 1 up to the largest identifier seen in any source.

use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::error::GenerateError;

/// Value used when a source has nothing for an identifier
pub const PLACEHOLDER: &str = "N/A";

/// The three upstream collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Users,
    Posts,
    Comments,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [SourceKind::Users, SourceKind::Posts, SourceKind::Comments];

    /// Name used in logs and error messages
    pub fn label(self) -> &'static str {
        match self {
            SourceKind::Users => "users",
            SourceKind::Posts => "posts",
            SourceKind::Comments => "comments",
        }
    }

    /// JSON field carrying the value that ends up in the CSV
    pub fn field(self) -> &'static str {
        match self {
            SourceKind::Users => "name",
            SourceKind::Posts => "title",
            SourceKind::Comments => "body",
        }
    }
}

/// One output row, in `Name,Title,Body` column order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedRow {
    pub name: String,
    pub title: String,
    pub body: String,
}

impl JoinedRow {
    pub fn as_record(&self) -> [&str; 3] {
        [self.name.as_str(), self.title.as_str(), self.body.as_str()]
    }
}

/// Identifier lookup for one source. `None` marks an item whose field was
/// falsy; it still counts towards the identifier space.
type Lookup = BTreeMap<i64, Option<String>>;

/// Joins users, posts and comments by identifier
pub struct DataMerger {
    users: Lookup,
    posts: Lookup,
    comments: Lookup,
    /// Largest identifier space `joined_rows` accepts
    max_rows: usize,
}

impl DataMerger {
    pub fn new(max_rows: usize) -> Self {
        Self {
            users: Lookup::new(),
            posts: Lookup::new(),
            comments: Lookup::new(),
            max_rows,
        }
    }

    fn lookup(&self, kind: SourceKind) -> &Lookup {
        match kind {
            SourceKind::Users => &self.users,
            SourceKind::Posts => &self.posts,
            SourceKind::Comments => &self.comments,
        }
    }

    fn lookup_mut(&mut self, kind: SourceKind) -> &mut Lookup {
        match kind {
            SourceKind::Users => &mut self.users,
            SourceKind::Posts => &mut self.posts,
            SourceKind::Comments => &mut self.comments,
        }
    }

    /// Convert a JSON field into CSV text. Falsy values (null, `""`, `0`,
    /// `false`) count as absent. Strings are taken as-is, other values use
    /// their JSON rendering.
    pub fn field_text(value: Option<&Value>) -> Option<String> {
        match value? {
            Value::Null | Value::Bool(false) => None,
            Value::String(s) if s.is_empty() => None,
            Value::Number(n) if n.as_f64() == Some(0.0) => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Index the records of one source.
    /// Later duplicates of an identifier replace earlier ones.
    pub fn add_records(&mut self, kind: SourceKind, records: &[Value]) -> usize {
        let field = kind.field();
        let mut indexed = 0;
        let mut skipped = 0;

        for (idx, record) in records.iter().enumerate() {
            let Some(id) = record.get("id").and_then(Value::as_i64) else {
                warn!("Item {} from {} has no integer 'id', skipping", idx, kind.label());
                skipped += 1;
                continue;
            };

            let text = Self::field_text(record.get(field));
            if self.lookup_mut(kind).insert(id, text).is_some() {
                debug!("Duplicate id {} in {}, keeping the later item", id, kind.label());
            }
            indexed += 1;
        }

        info!(
            "Indexed {} records from {} ({} skipped)",
            indexed,
            kind.label(),
            skipped
        );
        indexed
    }

    /// Largest identifier across all sources, 0 when nothing was indexed
    pub fn max_id(&self) -> i64 {
        SourceKind::ALL
            .iter()
            .filter_map(|kind| self.lookup(*kind).keys().next_back().copied())
            .max()
            .unwrap_or(0)
    }

    fn value(&self, kind: SourceKind, id: i64) -> String {
        self.lookup(kind)
            .get(&id)
            .cloned()
            .flatten()
            .unwrap_or_else(|| PLACEHOLDER.to_string())
    }

    /// Produce one row per identifier in `1..=max_id`, ascending
    pub fn joined_rows(&self) -> Result<Vec<JoinedRow>, GenerateError> {
        let max_id = self.max_id();
        if max_id <= 0 {
            warn!("Largest identifier is {}, no rows to join", max_id);
            return Ok(Vec::new());
        }

        if max_id as u64 > self.max_rows as u64 {
            return Err(GenerateError::Unexpected(format!(
                "Identifier space too large: max id {} exceeds the limit of {} rows",
                max_id, self.max_rows
            )));
        }

        let rows: Vec<JoinedRow> = (1..=max_id)
            .map(|id| JoinedRow {
                name: self.value(SourceKind::Users, id),
                title: self.value(SourceKind::Posts, id),
                body: self.value(SourceKind::Comments, id),
            })
            .collect();

        info!("Joined {} rows", rows.len());
        Ok(rows)
    }
}
