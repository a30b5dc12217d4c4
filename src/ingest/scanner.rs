use std::collections::BTreeMap;
use walkdir::{WalkDir, DirEntry};
use std::path::{Path, PathBuf};
use anyhow::{Result, Context, ensure};
use tracing::warn;

/// One directory's worth of work: its path and the names of the non-hidden
/// regular files directly inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirTask {
    pub dir: PathBuf,
    pub files: Vec<String>,
}

/// Walks `root` and returns one task per directory holding at least one
/// visible file. Anything under a dot-prefixed directory is skipped.
pub fn scan_directory(root: &Path) -> Result<Vec<DirTask>> {
    let metadata = std::fs::metadata(root)
        .with_context(|| format!("Failed to read scan root {:?}", root))?;
    ensure!(metadata.is_dir(), "Scan root {:?} is not a directory", root);

    let mut by_dir: BTreeMap<PathBuf, Vec<String>> = BTreeMap::new();
    let walker = WalkDir::new(root).sort_by_file_name().into_iter();

    for entry in walker.filter_entry(|e| e.depth() == 0 || !is_hidden(e)) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(parent) = entry.path().parent() else {
            continue;
        };
        let name = entry.file_name().to_string_lossy().into_owned();
        by_dir.entry(parent.to_path_buf()).or_default().push(name);
    }

    Ok(by_dir
        .into_iter()
        .map(|(dir, files)| DirTask { dir, files })
        .collect())
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name()
         .to_str()
         .map(|s| s.starts_with('.'))
         .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_tasks_per_directory() -> Result<()> {
        let root = TempDir::new()?;
        let base = root.path();
        fs::create_dir_all(base.join("artist-123/sub"))?;
        fs::create_dir_all(base.join(".cache/inner"))?;
        fs::create_dir_all(base.join("empty"))?;
        fs::write(base.join("top.png"), b"x")?;
        fs::write(base.join("artist-123/b.png"), b"x")?;
        fs::write(base.join("artist-123/a.png"), b"x")?;
        fs::write(base.join("artist-123/.hidden.png"), b"x")?;
        fs::write(base.join("artist-123/sub/c.mp4"), b"x")?;
        fs::write(base.join(".cache/inner/d.png"), b"x")?;

        let tasks = scan_directory(base)?;
        assert_eq!(tasks, vec![
            DirTask { dir: base.to_path_buf(), files: vec!["top.png".to_string()] },
            DirTask { dir: base.join("artist-123"), files: vec!["a.png".to_string(), "b.png".to_string()] },
            DirTask { dir: base.join("artist-123/sub"), files: vec!["c.mp4".to_string()] },
        ]);
        Ok(())
    }

    #[test]
    fn test_missing_root_is_an_error() {
        assert!(scan_directory(Path::new("/definitely/not/here")).is_err());
    }
}
