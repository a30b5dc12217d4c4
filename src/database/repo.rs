use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use rusqlite::{Connection, params};
use anyhow::{Result, Context};
use tracing::debug;

use crate::database::records::{Family, PostRecord, UnclassifiedRecord, WorkRecord};
use crate::database::schema::SCHEMA;

pub const BATCH_LIMIT: usize = 200;

pub fn open_database(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database {:?}", path))?;
    let mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    debug!("Database journal mode: {}", mode);
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "cache_size", -64000)?;
    conn.execute_batch(SCHEMA).context("Failed to initialize schema")?;
    Ok(conn)
}

#[cfg(test)]
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch(SCHEMA).context("Failed to initialize schema")?;
    Ok(conn)
}

/// Identifiers already stored, per family. Taken once at the start of a scan
/// pass and shared read-only with every worker.
#[derive(Debug, Default, Clone)]
pub struct ExistingIds {
    pub works: HashSet<String>,
    pub posts: HashSet<String>,
    pub unclassified: HashSet<String>,
}

impl ExistingIds {
    pub fn load(conn: &Connection) -> Result<Self> {
        Ok(Self {
            works: load_ids(conn, Family::Artwork)?,
            posts: load_ids(conn, Family::Post)?,
            unclassified: load_ids(conn, Family::Unclassified)?,
        })
    }
}

fn load_ids(conn: &Connection, family: Family) -> Result<HashSet<String>> {
    let mut stmt = conn.prepare(&format!("SELECT id FROM {}", family.table()))?;
    let ids = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<HashSet<_>>>()
        .with_context(|| format!("Failed to snapshot {} ids", family))?;
    Ok(ids)
}

/// Buffers classified records per family and commits each family in its own
/// transaction once its buffer reaches the batch limit.
pub struct TransactionManager<'c> {
    conn: &'c mut Connection,
    works: Vec<WorkRecord>,
    posts: Vec<PostRecord>,
    unclassified: Vec<UnclassifiedRecord>,
    buffer_limit: usize,
}

impl<'c> TransactionManager<'c> {
    pub fn new(conn: &'c mut Connection) -> Self {
        Self::with_limit(conn, BATCH_LIMIT)
    }

    pub fn with_limit(conn: &'c mut Connection, buffer_limit: usize) -> Self {
        Self {
            conn,
            works: Vec::new(),
            posts: Vec::new(),
            unclassified: Vec::new(),
            buffer_limit,
        }
    }

    pub fn add_work(&mut self, record: WorkRecord) -> Result<()> {
        self.works.push(record);
        if self.works.len() >= self.buffer_limit {
            self.flush_works()?;
        }
        Ok(())
    }

    pub fn add_post(&mut self, record: PostRecord) -> Result<()> {
        self.posts.push(record);
        if self.posts.len() >= self.buffer_limit {
            self.flush_posts()?;
        }
        Ok(())
    }

    pub fn add_unclassified(&mut self, record: UnclassifiedRecord) -> Result<()> {
        self.unclassified.push(record);
        if self.unclassified.len() >= self.buffer_limit {
            self.flush_unclassified()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.flush_works()?;
        self.flush_posts()?;
        self.flush_unclassified()?;
        Ok(())
    }

    fn flush_works(&mut self) -> Result<()> {
        if self.works.is_empty() {
            return Ok(());
        }

        let tx = self.conn.transaction().context("Failed to begin transaction")?;
        {
            let mut stmt_work = tx.prepare(
                "INSERT OR IGNORE INTO artwork_works
                 (id, title, author, timestamp, total_pages, is_liked, folder_name, file_mtime)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7)"
            )?;
            let mut stmt_page = tx.prepare(
                "INSERT OR IGNORE INTO artwork_pages (work_id, page_index, file_path, media_type)
                 VALUES (?1, ?2, ?3, ?4)"
            )?;

            for work in &self.works {
                let inserted = stmt_work.execute(params![
                    work.id,
                    work.title,
                    work.author,
                    work.timestamp,
                    work.pages.len() as i64,
                    work.folder,
                    work.file_mtime,
                ]).with_context(|| format!("Failed to insert work {}", work.id))?;

                // Pages belong to whichever row won the id.
                if inserted == 0 {
                    continue;
                }
                for page in &work.pages {
                    stmt_page.execute(params![work.id, page.page_index, page.path, page.kind])?;
                }
            }
        }
        tx.commit().context("Failed to commit artwork batch")?;

        debug!("Committed {} artwork works", self.works.len());
        self.works.clear();
        Ok(())
    }

    fn flush_posts(&mut self) -> Result<()> {
        if self.posts.is_empty() {
            return Ok(());
        }

        let tx = self.conn.transaction().context("Failed to begin transaction")?;
        {
            let mut stmt_post = tx.prepare(
                "INSERT OR IGNORE INTO posts
                 (id, timestamp, user_name, text, json_path, post_url, avatar_url, folder_name, file_mtime, is_liked)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0)"
            )?;
            let mut stmt_media = tx.prepare(
                "INSERT OR IGNORE INTO post_media (post_id, file_path, media_type) VALUES (?1, ?2, ?3)"
            )?;

            for post in &self.posts {
                stmt_post.execute(params![
                    post.id,
                    post.timestamp,
                    post.author,
                    post.text,
                    post.sidecar_path,
                    post.url,
                    post.avatar_url,
                    post.folder,
                    post.file_mtime,
                ]).with_context(|| format!("Failed to insert post {}", post.id))?;

                for media in &post.media {
                    stmt_media.execute(params![post.id, media.path, media.kind])?;
                }
            }
        }
        tx.commit().context("Failed to commit post batch")?;

        debug!("Committed {} posts", self.posts.len());
        self.posts.clear();
        Ok(())
    }

    fn flush_unclassified(&mut self) -> Result<()> {
        if self.unclassified.is_empty() {
            return Ok(());
        }

        let tx = self.conn.transaction().context("Failed to begin transaction")?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO unclassified_media
                 (id, filename, folder_name, file_path, media_type, file_mtime, is_liked)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)"
            )?;

            for record in &self.unclassified {
                stmt.execute(params![
                    record.id,
                    record.filename,
                    record.folder,
                    record.path,
                    record.kind,
                    record.file_mtime,
                ]).with_context(|| format!("Failed to insert unclassified {}", record.path))?;
            }
        }
        tx.commit().context("Failed to commit unclassified batch")?;

        debug!("Committed {} unclassified files", self.unclassified.len());
        self.unclassified.clear();
        Ok(())
    }

    /// Flushes what is left and removes unclassified rows whose file has been
    /// claimed by an artwork page or post medium. Returns the number removed.
    pub fn finish(mut self) -> Result<usize> {
        self.flush()?;
        reconcile(self.conn)
    }
}

pub fn reconcile(conn: &mut Connection) -> Result<usize> {
    let tx = conn.transaction()?;
    let removed = tx.execute(
        "DELETE FROM unclassified_media
         WHERE file_path IN (SELECT file_path FROM artwork_pages)
            OR file_path IN (SELECT file_path FROM post_media)",
        [],
    ).context("Failed to reconcile unclassified media")?;
    tx.commit()?;
    Ok(removed)
}

pub fn list_folders(conn: &Connection, families: &[Family]) -> Result<Vec<String>> {
    let mut folders = BTreeSet::new();
    for family in families {
        let mut stmt = conn.prepare(&format!("SELECT DISTINCT folder_name FROM {}", family.table()))?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        for folder in rows {
            folders.insert(folder?);
        }
    }
    Ok(folders.into_iter().collect())
}

/// Point update of the liked flag. Returns false when no row carries `id`.
pub fn set_liked(conn: &Connection, family: Family, id: &str, liked: bool) -> Result<bool> {
    let changed = conn.execute(
        &format!("UPDATE {} SET is_liked = ?1 WHERE id = ?2", family.table()),
        params![liked, id],
    ).with_context(|| format!("Failed to update liked flag on {} {}", family, id))?;
    Ok(changed > 0)
}

pub fn count(conn: &Connection, family: Family) -> Result<usize> {
    let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", family.table()), [], |row| row.get(0))?;
    Ok(n as usize)
}
