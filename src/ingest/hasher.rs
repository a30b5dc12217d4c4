use std::path::Path;
use sha2::{Sha256, Digest};

const SYNTHETIC_SUFFIX_LEN: usize = 8;

pub fn calculate_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Identifier of an unclassified file. Stable across scans as long as the
/// absolute path does not change.
pub fn path_id(path: &Path) -> String {
    calculate_hash(&path.to_string_lossy())
}

/// Work id for a file in an artwork folder whose name carries no numeric id.
pub fn synthetic_work_id(author_id: &str, file_name: &str) -> String {
    let digest = calculate_hash(file_name);
    format!("folder_{}_{}", author_id, &digest[..SYNTHETIC_SUFFIX_LEN])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_synthetic_id_is_deterministic() {
        let a = synthetic_work_id("12345", "cover art.png");
        let b = synthetic_work_id("12345", "cover art.png");
        assert_eq!(a, b);
        assert!(a.starts_with("folder_12345_"));
        assert_eq!(a.len(), "folder_12345_".len() + 8);
        assert_ne!(a, synthetic_work_id("12345", "other.png"));
    }

    #[test]
    fn test_path_id() {
        let p = PathBuf::from("/data/misc/a.png");
        assert_eq!(path_id(&p), path_id(&p));
        assert_eq!(path_id(&p).len(), 64);
        assert_ne!(path_id(&p), path_id(&PathBuf::from("/data/misc/b.png")));
    }
}
