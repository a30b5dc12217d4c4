//! Per-directory classification.
//!
//! A directory's files are claimed in strict precedence: posts (JSON sidecar
//! plus the media sharing its id), then artwork pages when the directory is
//! an artwork folder, then everything left over as unclassified media. The
//! worker never touches the store; it only reads the existing-id snapshot.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::Path;
use std::time::UNIX_EPOCH;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::database::records::{PageRecord, PostMediaRecord, PostRecord, UnclassifiedRecord, WorkRecord};
use crate::database::repo::ExistingIds;
use crate::ingest::error::{SkipReason, Skipped};
use crate::ingest::hasher;
use crate::ingest::scanner::DirTask;
use crate::ingest::sidecar::SidecarMeta;
use crate::media::mimetype::{detect_role, FileRole, MediaKind};

static POST_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{14,}").expect("post id regex should compile"));
static ARTWORK_FOLDER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-_](\d{3,})$").expect("artwork folder regex should compile"));
static AUTHOR_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?)[\s\-_]*\d+$").expect("author name regex should compile"));
static ARTWORK_FILE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{5,})(?:_p(\d+))?").expect("artwork file regex should compile"));

/// Everything one directory contributed to a scan pass.
#[derive(Debug, Default)]
pub struct DirOutcome {
    pub posts: Vec<PostRecord>,
    pub works: Vec<WorkBucket>,
    pub unclassified: Vec<UnclassifiedRecord>,
    pub skipped: Vec<Skipped>,
}

/// An artwork work whose pages still carry the page number parsed from
/// their filenames.
#[derive(Debug, Clone)]
pub struct WorkBucket {
    pub id: String,
    pub title: String,
    pub author: String,
    pub folder: String,
    pub file_mtime: i64,
    pub pages: Vec<RawPage>,
}

#[derive(Debug, Clone)]
pub struct RawPage {
    pub raw_page: u64,
    pub path: String,
    pub kind: MediaKind,
}

impl WorkBucket {
    /// Orders pages by their parsed number (stable, so equal numbers keep
    /// discovery order) and renumbers them densely from 0.
    pub fn finalize(mut self) -> WorkRecord {
        self.pages.sort_by_key(|p| p.raw_page);
        let pages = self
            .pages
            .into_iter()
            .enumerate()
            .map(|(i, p)| PageRecord { page_index: i as u32, path: p.path, kind: p.kind })
            .collect();

        WorkRecord {
            id: self.id,
            title: self.title,
            author: self.author,
            timestamp: self.file_mtime,
            folder: self.folder,
            file_mtime: self.file_mtime,
            pages,
        }
    }
}

struct MediaFile<'a> {
    name: &'a str,
    kind: MediaKind,
}

pub fn classify_directory(task: &DirTask, existing: &ExistingIds) -> DirOutcome {
    let dir = task.dir.as_path();
    let folder = folder_name(dir);

    let mut sidecars = Vec::new();
    let mut media = Vec::new();
    for name in task.files.iter().filter(|f| !f.starts_with('.')) {
        match detect_role(name) {
            FileRole::Sidecar => sidecars.push(name.as_str()),
            FileRole::Media(kind) => media.push(MediaFile { name: name.as_str(), kind }),
            FileRole::Ignored => {}
        }
    }

    let mut outcome = DirOutcome::default();
    let mut consumed: HashSet<&str> = HashSet::new();

    collect_posts(dir, &folder, &sidecars, &media, existing, &mut consumed, &mut outcome);

    if let Some(author_id) = artwork_author_id(&folder) {
        collect_artwork(dir, &folder, &author_id, &media, existing, &mut consumed, &mut outcome);
    }

    for file in media.iter().filter(|m| !consumed.contains(m.name)) {
        let path = dir.join(file.name);
        let id = hasher::path_id(&path);
        if existing.unclassified.contains(&id) {
            continue;
        }
        match file_mtime_ms(&path) {
            Ok(file_mtime) => outcome.unclassified.push(UnclassifiedRecord {
                id,
                filename: file.name.to_string(),
                folder: folder.clone(),
                path: path.to_string_lossy().into_owned(),
                kind: file.kind,
                file_mtime,
            }),
            Err(e) => outcome.skipped.push(Skipped { path, reason: SkipReason::Stat(e) }),
        }
    }

    outcome
}

fn collect_posts<'a>(
    dir: &Path,
    folder: &str,
    sidecars: &[&'a str],
    media: &[MediaFile<'a>],
    existing: &ExistingIds,
    consumed: &mut HashSet<&'a str>,
    outcome: &mut DirOutcome,
) {
    if sidecars.is_empty() {
        return;
    }

    let mut media_by_id: HashMap<&str, Vec<&MediaFile<'a>>> = HashMap::new();
    for file in media {
        let mut seen = HashSet::new();
        for run in POST_ID_PATTERN.find_iter(file.name) {
            if seen.insert(run.as_str()) {
                media_by_id.entry(run.as_str()).or_default().push(file);
            }
        }
    }

    let mut seen_posts = HashSet::new();
    for &sidecar in sidecars {
        let Some(post_id) = POST_ID_PATTERN.find(sidecar).map(|m| m.as_str()) else {
            continue;
        };
        let matched = media_by_id.get(post_id).map(Vec::as_slice).unwrap_or_default();

        if existing.posts.contains(post_id) || !seen_posts.insert(post_id) {
            consumed.extend(matched.iter().map(|m| m.name));
            continue;
        }

        let sidecar_path = dir.join(sidecar);
        let meta = match fs::read(&sidecar_path)
            .map_err(SkipReason::Read)
            .and_then(|bytes| SidecarMeta::decode(&bytes, post_id))
        {
            Ok(meta) => meta,
            Err(reason) => {
                outcome.skipped.push(Skipped { path: sidecar_path, reason });
                continue;
            }
        };
        let file_mtime = match file_mtime_ms(&sidecar_path) {
            Ok(t) => t,
            Err(e) => {
                outcome.skipped.push(Skipped { path: sidecar_path, reason: SkipReason::Stat(e) });
                continue;
            }
        };

        let post_media = matched
            .iter()
            .map(|m| {
                consumed.insert(m.name);
                PostMediaRecord { path: dir.join(m.name).to_string_lossy().into_owned(), kind: m.kind }
            })
            .collect();

        outcome.posts.push(PostRecord {
            id: post_id.to_string(),
            timestamp: meta.timestamp,
            author: meta.author,
            text: meta.text,
            sidecar_path: sidecar_path.to_string_lossy().into_owned(),
            url: meta.url,
            avatar_url: meta.avatar_url,
            folder: folder.to_string(),
            file_mtime,
            media: post_media,
        });
    }
}

fn collect_artwork<'a>(
    dir: &Path,
    folder: &str,
    author_id: &str,
    media: &[MediaFile<'a>],
    existing: &ExistingIds,
    consumed: &mut HashSet<&'a str>,
    outcome: &mut DirOutcome,
) {
    let author = author_display_name(folder);
    let mut bucket_index: HashMap<String, usize> = HashMap::new();

    for file in media {
        if consumed.contains(file.name) {
            continue;
        }

        let (work_id, raw_page) = match ARTWORK_FILE_PATTERN.captures(file.name) {
            Some(caps) => {
                let page = caps
                    .get(2)
                    .map(|m| m.as_str().parse::<u64>().unwrap_or(u64::MAX))
                    .unwrap_or(0);
                (caps[1].to_string(), page)
            }
            None => (hasher::synthetic_work_id(author_id, file.name), 0),
        };

        consumed.insert(file.name);
        if existing.works.contains(&work_id) {
            continue;
        }

        let path = dir.join(file.name);
        let file_mtime = match file_mtime_ms(&path) {
            Ok(t) => t,
            Err(e) => {
                outcome.skipped.push(Skipped { path, reason: SkipReason::Stat(e) });
                continue;
            }
        };

        let idx = *bucket_index.entry(work_id.clone()).or_insert_with(|| {
            outcome.works.push(WorkBucket {
                id: work_id,
                title: file.name.to_string(),
                author: author.clone(),
                folder: folder.to_string(),
                file_mtime,
                pages: Vec::new(),
            });
            outcome.works.len() - 1
        });

        let bucket = &mut outcome.works[idx];
        bucket.file_mtime = bucket.file_mtime.max(file_mtime);
        bucket.pages.push(RawPage {
            raw_page,
            path: path.to_string_lossy().into_owned(),
            kind: file.kind,
        });
    }
}

pub fn folder_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.to_string_lossy().into_owned())
}

/// The author id of an artwork folder, i.e. the digits after the final
/// `-` or `_` of its name. `None` for any other directory.
pub fn artwork_author_id(folder: &str) -> Option<String> {
    ARTWORK_FOLDER_PATTERN
        .captures(folder)
        .map(|caps| caps[1].to_string())
}

pub fn author_display_name(folder: &str) -> String {
    AUTHOR_NAME_PATTERN
        .captures(folder)
        .map(|caps| caps[1].trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| folder.to_string())
}

fn file_mtime_ms(path: &Path) -> io::Result<i64> {
    let modified = fs::metadata(path)?.modified()?;
    Ok(modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0))
}
