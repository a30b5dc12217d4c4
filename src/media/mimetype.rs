use std::fmt;
use std::path::Path;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::Serialize;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm"];
const SIDECAR_EXTENSION: &str = "json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for MediaKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for MediaKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "image" => Ok(MediaKind::Image),
            "video" => Ok(MediaKind::Video),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

/// What a directory entry is to the classifier, decided by extension alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRole {
    Sidecar,
    Media(MediaKind),
    Ignored,
}

pub fn detect_role(file_name: &str) -> FileRole {
    let ext = match Path::new(file_name).extension().and_then(|e| e.to_str()) {
        Some(ext) => ext.to_ascii_lowercase(),
        None => return FileRole::Ignored,
    };

    if ext == SIDECAR_EXTENSION {
        FileRole::Sidecar
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        FileRole::Media(MediaKind::Video)
    } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        FileRole::Media(MediaKind::Image)
    } else {
        FileRole::Ignored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_detection() {
        assert_eq!(detect_role("123_p0.JPG"), FileRole::Media(MediaKind::Image));
        assert_eq!(detect_role("clip.webm"), FileRole::Media(MediaKind::Video));
        assert_eq!(detect_role("clip.Mp4"), FileRole::Media(MediaKind::Video));
        assert_eq!(detect_role("tweet_20230101123456789.json"), FileRole::Sidecar);
        assert_eq!(detect_role("notes.txt"), FileRole::Ignored);
        assert_eq!(detect_role("README"), FileRole::Ignored);
    }

    #[test]
    fn test_kind_sql_text() {
        assert_eq!(MediaKind::Video.to_string(), "video");
        assert_eq!(MediaKind::Image.as_str(), "image");
        assert_eq!(serde_json::to_value(MediaKind::Video).unwrap(), "video");
    }
}
