//! The unified feed: per-family selection, cross-family merge, hydration.

pub mod engine;
pub mod hydrate;
pub mod query;

use anyhow::Result;
use rusqlite::Connection;

use crate::stream::hydrate::{FeedItem, UrlMapper};
use crate::stream::query::StreamQuery;

pub fn get_stream(conn: &Connection, urls: &UrlMapper, query: &StreamQuery) -> Result<Vec<FeedItem>> {
    let entries = engine::select_page(conn, query)?;
    hydrate::hydrate(conn, urls, &entries)
}
