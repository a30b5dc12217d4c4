use std::path::{Path, PathBuf};

use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::database::records::Family;
use crate::media::mimetype::MediaKind;
use crate::stream::engine::FeedEntry;

pub const FILES_PREFIX: &str = "/files/";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaRef {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
}

/// A fully expanded feed record, tagged with its family on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FeedItem {
    Artwork {
        id: String,
        title: String,
        author: String,
        timestamp: i64,
        is_liked: bool,
        folder: String,
        total_pages: u32,
        media: Vec<MediaRef>,
        #[serde(skip_serializing_if = "Option::is_none")]
        artwork_url: Option<String>,
    },
    Post {
        id: String,
        timestamp: i64,
        posted_at: i64,
        user_name: String,
        text: String,
        post_url: String,
        avatar_url: String,
        folder: String,
        is_liked: bool,
        media: Vec<MediaRef>,
    },
    Unclassified {
        id: String,
        timestamp: i64,
        title: String,
        folder: String,
        is_liked: bool,
        media: Vec<MediaRef>,
    },
}

/// Maps stored absolute paths to URLs under the static file mount.
#[derive(Debug, Clone)]
pub struct UrlMapper {
    root: PathBuf,
}

impl UrlMapper {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Empty when the path does not live under the ingestion root.
    pub fn to_url(&self, path: &str) -> String {
        if self.root.as_os_str().is_empty() {
            return String::new();
        }
        let Ok(relative) = Path::new(path).strip_prefix(&self.root) else {
            return String::new();
        };

        let normalized = relative.to_string_lossy().replace('\\', "/");
        let encoded: Vec<String> = normalized
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| urlencoding::encode(s).into_owned())
            .collect();
        format!("{}{}", FILES_PREFIX, encoded.join("/"))
    }
}

pub fn hydrate(conn: &Connection, urls: &UrlMapper, entries: &[FeedEntry]) -> Result<Vec<FeedItem>> {
    let mut items = Vec::with_capacity(entries.len());
    for entry in entries {
        let item = match entry.family {
            Family::Artwork => hydrate_work(conn, urls, &entry.id)?,
            Family::Post => hydrate_post(conn, urls, &entry.id)?,
            Family::Unclassified => hydrate_unclassified(conn, urls, &entry.id)?,
        };
        // Rows can disappear between selection and hydration (reconciliation).
        if let Some(item) = item {
            items.push(item);
        }
    }
    Ok(items)
}

fn hydrate_work(conn: &Connection, urls: &UrlMapper, id: &str) -> Result<Option<FeedItem>> {
    let row = conn
        .query_row(
            "SELECT title, author, total_pages, is_liked, folder_name, file_mtime
             FROM artwork_works WHERE id = ?1",
            params![id],
            |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?, r.get::<_, u32>(2)?,
                    r.get::<_, bool>(3)?, r.get::<_, String>(4)?, r.get::<_, i64>(5)?)),
        )
        .optional()?;
    let Some((title, author, total_pages, is_liked, folder, timestamp)) = row else {
        return Ok(None);
    };

    let mut stmt = conn.prepare_cached(
        "SELECT page_index, file_path, media_type FROM artwork_pages WHERE work_id = ?1 ORDER BY page_index",
    )?;
    let media = stmt
        .query_map(params![id], |r| {
            let path: String = r.get(1)?;
            Ok(MediaRef { url: urls.to_url(&path), kind: r.get(2)?, index: Some(r.get(0)?) })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let artwork_url = id
        .chars()
        .all(|c| c.is_ascii_digit())
        .then(|| format!("https://www.pixiv.net/artworks/{}", id));

    Ok(Some(FeedItem::Artwork {
        id: id.to_string(),
        title,
        author,
        timestamp,
        is_liked,
        folder,
        total_pages,
        media,
        artwork_url,
    }))
}

fn hydrate_post(conn: &Connection, urls: &UrlMapper, id: &str) -> Result<Option<FeedItem>> {
    let row = conn
        .query_row(
            "SELECT timestamp, user_name, text, post_url, avatar_url, folder_name, file_mtime, is_liked
             FROM posts WHERE id = ?1",
            params![id],
            |r| Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?, r.get::<_, String>(2)?,
                    r.get::<_, String>(3)?, r.get::<_, String>(4)?, r.get::<_, String>(5)?,
                    r.get::<_, i64>(6)?, r.get::<_, bool>(7)?)),
        )
        .optional()?;
    let Some((posted_at, user_name, text, post_url, avatar_url, folder, timestamp, is_liked)) = row else {
        return Ok(None);
    };

    let mut stmt = conn.prepare_cached("SELECT file_path, media_type FROM post_media WHERE post_id = ?1")?;
    let media = stmt
        .query_map(params![id], |r| {
            let path: String = r.get(0)?;
            Ok(MediaRef { url: urls.to_url(&path), kind: r.get(1)?, index: None })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(Some(FeedItem::Post {
        id: id.to_string(),
        timestamp,
        posted_at,
        user_name,
        text,
        post_url,
        avatar_url,
        folder,
        is_liked,
        media,
    }))
}

fn hydrate_unclassified(conn: &Connection, urls: &UrlMapper, id: &str) -> Result<Option<FeedItem>> {
    let item = conn
        .query_row(
            "SELECT filename, folder_name, file_path, media_type, file_mtime, is_liked
             FROM unclassified_media WHERE id = ?1",
            params![id],
            |r| {
                let path: String = r.get(2)?;
                Ok(FeedItem::Unclassified {
                    id: id.to_string(),
                    timestamp: r.get(4)?,
                    title: r.get(0)?,
                    folder: r.get(1)?,
                    is_liked: r.get(5)?,
                    media: vec![MediaRef { url: urls.to_url(&path), kind: r.get(3)?, index: None }],
                })
            },
        )
        .optional()?;
    Ok(item)
}
