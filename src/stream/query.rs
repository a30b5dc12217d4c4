//! Stream request parameters and their translation into per-family SQL.

use rusqlite::types::Value;
use serde::de::{value, DeserializeOwned, IntoDeserializer};
use serde::{Deserialize, Deserializer};

use crate::database::records::Family;

pub const DEFAULT_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 500;
const ALL_FOLDERS: &str = "ALL";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFilter {
    #[default]
    All,
    #[serde(alias = "pixiv")]
    Artwork,
    #[serde(alias = "tweet", alias = "tweets")]
    Post,
    #[serde(alias = "other", alias = "others")]
    Unclassified,
    /// Any name not listed above; selects nothing.
    #[serde(other)]
    Unknown,
}

impl SourceFilter {
    pub fn families(&self) -> &'static [Family] {
        match self {
            SourceFilter::All => &Family::ALL,
            SourceFilter::Artwork => &[Family::Artwork],
            SourceFilter::Post => &[Family::Post],
            SourceFilter::Unclassified => &[Family::Unclassified],
            SourceFilter::Unknown => &[],
        }
    }
}

/// Global display order of the feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    #[default]
    #[serde(alias = "newest")]
    Desc,
    #[serde(alias = "oldest")]
    Asc,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentFilter {
    #[default]
    All,
    Liked,
    #[serde(alias = "text-only", alias = "text_only")]
    Text,
    Video,
    Image,
    #[serde(other)]
    Unknown,
}

/// Which side of the anchor to page towards, in display terms: `Older`
/// continues downwards, `Newer` extends upwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Older,
    Newer,
    Around,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StreamQuery {
    pub limit: usize,
    pub offset: usize,
    pub source: SourceFilter,
    pub q: Option<String>,
    #[serde(deserialize_with = "or_default")]
    pub sort: SortMode,
    pub folder: Option<String>,
    pub filter_type: ContentFilter,
    pub target_date: Option<i64>,
    #[serde(deserialize_with = "or_default")]
    pub direction: Direction,
}

impl StreamQuery {
    /// Page size actually served.
    pub fn page_size(&self) -> usize {
        self.limit.min(MAX_LIMIT)
    }
}

/// Unrecognised names fall back to the default instead of rejecting the request.
fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let raw = String::deserialize(deserializer)?;
    let parsed = T::deserialize(IntoDeserializer::<value::Error>::into_deserializer(raw.as_str()));
    Ok(parsed.unwrap_or_default())
}

impl Default for StreamQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
            source: SourceFilter::All,
            q: None,
            sort: SortMode::Desc,
            folder: None,
            filter_type: ContentFilter::All,
            target_date: None,
            direction: Direction::Older,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Ascending,
    Descending,
}

impl Order {
    pub fn sql(&self) -> &'static str {
        match self {
            Order::Ascending => "ASC",
            Order::Descending => "DESC",
        }
    }
}

/// A single-sided fetch; `around` is built from one of each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetch {
    Older,
    Newer,
}

/// Comparison against the anchor and the per-family ordering for a fetch.
///
/// | sort | fetch | cmp  | order |
/// |------|-------|------|-------|
/// | desc | older | `<=` | desc  |
/// | desc | newer | `>`  | asc   |
/// | asc  | older | `>=` | asc   |
/// | asc  | newer | `<`  | desc  |
pub fn directional_bound(sort: SortMode, fetch: Fetch) -> (&'static str, Order) {
    match (sort, fetch) {
        (SortMode::Desc, Fetch::Older) => ("<=", Order::Descending),
        (SortMode::Desc, Fetch::Newer) => (">", Order::Ascending),
        (SortMode::Asc, Fetch::Older) => (">=", Order::Ascending),
        (SortMode::Asc, Fetch::Newer) => ("<", Order::Descending),
    }
}

/// A SQL `WHERE` body and its positional parameters.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Predicate {
    clauses: Vec<String>,
    pub params: Vec<Value>,
}

impl Predicate {
    fn push(&mut self, clause: impl Into<String>) {
        self.clauses.push(clause.into());
    }

    pub fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }
}

const NEVER: &str = "0";

pub fn family_predicate(family: Family, query: &StreamQuery, bound: Option<(&str, i64)>) -> Predicate {
    let mut pred = Predicate::default();

    if let Some(folder) = query.folder.as_deref().filter(|f| !f.is_empty() && *f != ALL_FOLDERS) {
        pred.push("folder_name = ?");
        pred.params.push(Value::Text(folder.to_string()));
    }

    if let Some(q) = query.q.as_deref().filter(|q| !q.is_empty()) {
        let pattern = Value::Text(format!("%{}%", escape_like(q)));
        let columns: &[&str] = match family {
            Family::Artwork => &["title", "author"],
            Family::Post => &["text", "user_name"],
            Family::Unclassified => &["filename"],
        };
        let ors: Vec<String> = columns
            .iter()
            .map(|c| format!("{} LIKE ? ESCAPE '\\'", c))
            .collect();
        pred.push(format!("({})", ors.join(" OR ")));
        pred.params.extend(std::iter::repeat(pattern).take(columns.len()));
    }

    match query.filter_type {
        ContentFilter::All => {}
        ContentFilter::Unknown => pred.push(NEVER),
        ContentFilter::Liked => pred.push("is_liked = 1"),
        ContentFilter::Text => match family {
            Family::Post => pred.push(
                "NOT EXISTS (SELECT 1 FROM post_media m WHERE m.post_id = posts.id)",
            ),
            _ => pred.push(NEVER),
        },
        ContentFilter::Video => pred.push(match family {
            Family::Artwork => "EXISTS (SELECT 1 FROM artwork_pages p WHERE p.work_id = artwork_works.id AND p.media_type = 'video')",
            Family::Post => "EXISTS (SELECT 1 FROM post_media m WHERE m.post_id = posts.id AND m.media_type = 'video')",
            Family::Unclassified => "media_type = 'video'",
        }),
        ContentFilter::Image => pred.push(match family {
            Family::Artwork => "EXISTS (SELECT 1 FROM artwork_pages p WHERE p.work_id = artwork_works.id AND p.media_type = 'image')",
            Family::Post => "EXISTS (SELECT 1 FROM post_media m WHERE m.post_id = posts.id) \
                AND NOT EXISTS (SELECT 1 FROM post_media m WHERE m.post_id = posts.id AND m.media_type = 'video')",
            Family::Unclassified => "media_type = 'image'",
        }),
    }

    if let Some((op, anchor)) = bound {
        pred.push(format!("file_mtime {} ?", op));
        pred.params.push(Value::Integer(anchor));
    }

    pred
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
