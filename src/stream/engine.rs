use anyhow::{Context, Result};
use rusqlite::{params_from_iter, Connection};

use crate::database::records::Family;
use crate::stream::query::{directional_bound, family_predicate, Direction, Fetch, Order, StreamQuery};

/// A selected feed position before hydration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub family: Family,
    pub id: String,
    pub sort_key: i64,
}

/// Picks the ordered `(family, id)` pairs for one page.
///
/// `older` pages come back in display order. `newer` and the upper half of
/// `around` are fetched walking away from the anchor and reversed, so the
/// result can always be stacked directly above what the caller already shows.
pub fn select_page(conn: &Connection, query: &StreamQuery) -> Result<Vec<FeedEntry>> {
    let limit = query.page_size();
    match (query.direction, query.target_date) {
        (Direction::Around, Some(anchor)) => {
            let half = limit / 2;
            let mut page = fetch(conn, query, Fetch::Newer, half, Some(anchor))?;
            page.reverse();
            page.extend(fetch(conn, query, Fetch::Older, half, Some(anchor))?);
            Ok(page)
        }
        (Direction::Newer, anchor) => {
            let mut page = fetch(conn, query, Fetch::Newer, limit, anchor)?;
            page.reverse();
            Ok(page)
        }
        (_, anchor) => fetch(conn, query, Fetch::Older, limit, anchor),
    }
}

fn fetch(
    conn: &Connection,
    query: &StreamQuery,
    direction: Fetch,
    limit: usize,
    anchor: Option<i64>,
) -> Result<Vec<FeedEntry>> {
    let (op, order) = directional_bound(query.sort, direction);
    let per_family = i64::try_from(query.offset.saturating_add(limit)).unwrap_or(i64::MAX);

    let mut lists = Vec::with_capacity(3);
    for &family in query.source.families() {
        let pred = family_predicate(family, query, anchor.map(|a| (op, a)));
        let sql = format!(
            "SELECT id, file_mtime FROM {}{} ORDER BY file_mtime {}, id {} LIMIT ?",
            family.table(),
            pred.where_sql(),
            order.sql(),
            order.sql(),
        );

        let mut params = pred.params;
        params.push(rusqlite::types::Value::Integer(per_family));

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(params), |row| {
                Ok(FeedEntry { family, id: row.get(0)?, sort_key: row.get(1)? })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("Failed to select {} entries", family))?;
        lists.push(rows);
    }

    Ok(merge(lists, order, query.offset, limit))
}

/// K-way merge of per-family lists that are each already sorted by
/// `sort_key` in `order`. Ties go to the earlier list.
pub fn merge(lists: Vec<Vec<FeedEntry>>, order: Order, offset: usize, limit: usize) -> Vec<FeedEntry> {
    let mut heads: Vec<std::iter::Peekable<std::vec::IntoIter<FeedEntry>>> =
        lists.into_iter().map(|l| l.into_iter().peekable()).collect();
    let available: usize = heads.iter().map(|h| h.len()).sum();
    let mut out = Vec::with_capacity(limit.min(available));
    let mut skipped = 0;

    while out.len() < limit {
        let mut best: Option<(usize, i64)> = None;
        for (i, head) in heads.iter_mut().enumerate() {
            let Some(entry) = head.peek() else { continue };
            let better = match best {
                None => true,
                Some((_, key)) => match order {
                    Order::Descending => entry.sort_key > key,
                    Order::Ascending => entry.sort_key < key,
                },
            };
            if better {
                best = Some((i, entry.sort_key));
            }
        }

        let Some((i, _)) = best else { break };
        let Some(entry) = heads[i].next() else { break };
        if skipped < offset {
            skipped += 1;
        } else {
            out.push(entry);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::records::{PageRecord, PostMediaRecord, PostRecord, UnclassifiedRecord, WorkRecord};
    use crate::database::repo::{open_in_memory, set_liked, TransactionManager};
    use crate::media::mimetype::MediaKind;
    use crate::stream::query::{ContentFilter, SortMode, SourceFilter};

    fn entry(family: Family, id: &str, key: i64) -> FeedEntry {
        FeedEntry { family, id: id.to_string(), sort_key: key }
    }

    fn work(id: &str, mtime: i64, kinds: &[MediaKind]) -> WorkRecord {
        WorkRecord {
            id: id.to_string(),
            title: format!("{} title", id),
            author: "painter".to_string(),
            timestamp: mtime,
            folder: "painter-4242".to_string(),
            file_mtime: mtime,
            pages: kinds
                .iter()
                .enumerate()
                .map(|(i, k)| PageRecord { page_index: i as u32, path: format!("/r/{}_{}", id, i), kind: *k })
                .collect(),
        }
    }

    fn post(id: &str, mtime: i64, kinds: &[MediaKind]) -> PostRecord {
        PostRecord {
            id: id.to_string(),
            timestamp: mtime,
            author: "alice".to_string(),
            text: format!("post {}", id),
            sidecar_path: format!("/r/t/{}.json", id),
            url: String::new(),
            avatar_url: String::new(),
            folder: "timeline".to_string(),
            file_mtime: mtime,
            media: kinds
                .iter()
                .enumerate()
                .map(|(i, k)| PostMediaRecord { path: format!("/r/t/{}_{}", id, i), kind: *k })
                .collect(),
        }
    }

    fn other(id: &str, mtime: i64, kind: MediaKind) -> UnclassifiedRecord {
        UnclassifiedRecord {
            id: id.to_string(),
            filename: format!("{}.bin", id),
            folder: "misc".to_string(),
            path: format!("/r/misc/{}", id),
            kind,
            file_mtime: mtime,
        }
    }

    /// Ten records with mtimes 10..=100 spread across the three families.
    fn seeded() -> Result<Connection> {
        use MediaKind::{Image, Video};
        let mut conn = open_in_memory()?;
        {
            let mut tm = TransactionManager::new(&mut conn);
            tm.add_work(work("a10", 10, &[Image]))?;
            tm.add_post(post("p20", 20, &[]))?;
            tm.add_unclassified(other("u30", 30, Video))?;
            tm.add_work(work("a40", 40, &[Image, Video]))?;
            tm.add_post(post("p50", 50, &[Image]))?;
            tm.add_unclassified(other("u60", 60, Image))?;
            tm.add_work(work("a70", 70, &[Image, Image]))?;
            tm.add_post(post("p80", 80, &[Image, Video]))?;
            tm.add_unclassified(other("u90", 90, Image))?;
            tm.add_post(post("p100", 100, &[]))?;
            tm.finish()?;
        }
        Ok(conn)
    }

    fn keys(entries: &[FeedEntry]) -> Vec<i64> {
        entries.iter().map(|e| e.sort_key).collect()
    }

    #[test]
    fn test_merge_interleaves_and_slices() {
        let lists = vec![
            vec![entry(Family::Artwork, "a", 9), entry(Family::Artwork, "b", 5)],
            vec![entry(Family::Post, "c", 9), entry(Family::Post, "d", 7)],
            vec![entry(Family::Unclassified, "e", 6)],
        ];
        let merged = merge(lists, Order::Descending, 1, 3);
        let ids: Vec<&str> = merged.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "d", "e"]);
    }

    #[test]
    fn test_first_page_newest_first() -> Result<()> {
        let conn = seeded()?;
        let page = select_page(&conn, &StreamQuery { limit: 4, ..Default::default() })?;
        assert_eq!(keys(&page), vec![100, 90, 80, 70]);
        assert_eq!(page[0].family, Family::Post);
        assert_eq!(page[1].family, Family::Unclassified);
        assert_eq!(page[3].family, Family::Artwork);

        let next = select_page(&conn, &StreamQuery { limit: 4, offset: 4, ..Default::default() })?;
        assert_eq!(keys(&next), vec![60, 50, 40, 30]);
        Ok(())
    }

    #[test]
    fn test_first_page_oldest_first() -> Result<()> {
        let conn = seeded()?;
        let page = select_page(&conn, &StreamQuery { limit: 3, sort: SortMode::Asc, ..Default::default() })?;
        assert_eq!(keys(&page), vec![10, 20, 30]);
        Ok(())
    }

    #[test]
    fn test_older_then_newer_round_trip() -> Result<()> {
        let conn = seeded()?;

        // Newest first: page down from 80, then page back up from the last item.
        let older = select_page(&conn, &StreamQuery { limit: 4, target_date: Some(80), ..Default::default() })?;
        assert_eq!(keys(&older), vec![80, 70, 60, 50]);
        let newer = select_page(&conn, &StreamQuery {
            limit: 3,
            target_date: Some(50),
            direction: Direction::Newer,
            ..Default::default()
        })?;
        assert_eq!(keys(&newer), vec![80, 70, 60]);
        assert_eq!(&older[..3], &newer[..]);

        // Oldest first: the same walk mirrored.
        let older = select_page(&conn, &StreamQuery {
            limit: 4,
            sort: SortMode::Asc,
            target_date: Some(30),
            ..Default::default()
        })?;
        assert_eq!(keys(&older), vec![30, 40, 50, 60]);
        let newer = select_page(&conn, &StreamQuery {
            limit: 3,
            sort: SortMode::Asc,
            target_date: Some(60),
            direction: Direction::Newer,
            ..Default::default()
        })?;
        assert_eq!(keys(&newer), vec![30, 40, 50]);
        assert_eq!(&older[..3], &newer[..]);
        Ok(())
    }

    #[test]
    fn test_around_straddles_anchor_in_both_modes() -> Result<()> {
        let conn = seeded()?;

        let desc = select_page(&conn, &StreamQuery {
            limit: 4,
            target_date: Some(50),
            direction: Direction::Around,
            ..Default::default()
        })?;
        assert_eq!(keys(&desc), vec![70, 60, 50, 40]);

        let asc = select_page(&conn, &StreamQuery {
            limit: 4,
            sort: SortMode::Asc,
            target_date: Some(50),
            direction: Direction::Around,
            ..Default::default()
        })?;
        assert_eq!(keys(&asc), vec![30, 40, 50, 60]);

        let odd = select_page(&conn, &StreamQuery {
            limit: 5,
            target_date: Some(50),
            direction: Direction::Around,
            ..Default::default()
        })?;
        assert!(odd.len() <= 5);
        Ok(())
    }

    #[test]
    fn test_oversized_limit_and_offset() -> Result<()> {
        let conn = seeded()?;
        let page = select_page(&conn, &StreamQuery { limit: 1 << 56, ..Default::default() })?;
        assert_eq!(page.len(), 10);

        let page = select_page(&conn, &StreamQuery { limit: usize::MAX, offset: usize::MAX, ..Default::default() })?;
        assert!(page.is_empty());

        let page = select_page(&conn, &StreamQuery { limit: 2, offset: usize::MAX - 1, ..Default::default() })?;
        assert!(page.is_empty());

        let merged = merge(vec![vec![entry(Family::Post, "p", 1)]], Order::Descending, 0, usize::MAX);
        assert_eq!(merged.len(), 1);
        Ok(())
    }

    #[test]
    fn test_around_without_anchor_pages_older() -> Result<()> {
        let conn = seeded()?;
        let page = select_page(&conn, &StreamQuery { limit: 2, direction: Direction::Around, ..Default::default() })?;
        assert_eq!(keys(&page), vec![100, 90]);
        Ok(())
    }

    #[test]
    fn test_content_filters_are_exact() -> Result<()> {
        let conn = seeded()?;
        let run = |filter: ContentFilter| -> Result<Vec<String>> {
            let page = select_page(&conn, &StreamQuery { filter_type: filter, ..Default::default() })?;
            Ok(page.into_iter().map(|e| e.id).collect())
        };

        assert_eq!(run(ContentFilter::Video)?, vec!["p80", "a40", "u30"]);
        assert_eq!(run(ContentFilter::Text)?, vec!["p100", "p20"]);
        assert_eq!(run(ContentFilter::Image)?, vec!["u90", "a70", "u60", "p50", "a40", "a10"]);

        set_liked(&conn, Family::Unclassified, "u60", true)?;
        set_liked(&conn, Family::Post, "p20", true)?;
        assert_eq!(run(ContentFilter::Liked)?, vec!["u60", "p20"]);
        Ok(())
    }

    #[test]
    fn test_source_folder_and_text_query() -> Result<()> {
        let conn = seeded()?;
        let posts = select_page(&conn, &StreamQuery { source: SourceFilter::Post, ..Default::default() })?;
        assert!(posts.iter().all(|e| e.family == Family::Post));
        assert_eq!(posts.len(), 4);

        let misc = select_page(&conn, &StreamQuery { folder: Some("misc".into()), ..Default::default() })?;
        assert_eq!(keys(&misc), vec![90, 60, 30]);

        let found = select_page(&conn, &StreamQuery { q: Some("A70 TIT".into()), ..Default::default() })?;
        assert_eq!(found, vec![entry(Family::Artwork, "a70", 70)]);

        let by_author = select_page(&conn, &StreamQuery { q: Some("alice".into()), ..Default::default() })?;
        assert_eq!(by_author.len(), 4);
        Ok(())
    }
}
