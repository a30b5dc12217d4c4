use std::fmt;

use crate::media::mimetype::MediaKind;

#[derive(Debug, Clone, PartialEq)]
pub struct WorkRecord {
    pub id: String,
    pub title: String,
    pub author: String,
    pub timestamp: i64,
    pub folder: String,
    pub file_mtime: i64,
    pub pages: Vec<PageRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageRecord {
    pub page_index: u32,
    pub path: String,
    pub kind: MediaKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostRecord {
    pub id: String,
    pub timestamp: i64,
    pub author: String,
    pub text: String,
    pub sidecar_path: String,
    pub url: String,
    pub avatar_url: String,
    pub folder: String,
    pub file_mtime: i64,
    pub media: Vec<PostMediaRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostMediaRecord {
    pub path: String,
    pub kind: MediaKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnclassifiedRecord {
    pub id: String,
    pub filename: String,
    pub folder: String,
    pub path: String,
    pub kind: MediaKind,
    pub file_mtime: i64,
}

/// One of the three independently stored record families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Artwork,
    Post,
    Unclassified,
}

impl Family {
    pub const ALL: [Family; 3] = [Family::Artwork, Family::Post, Family::Unclassified];

    pub fn as_str(&self) -> &'static str {
        match self {
            Family::Artwork => "artwork",
            Family::Post => "post",
            Family::Unclassified => "unclassified",
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            Family::Artwork => "artwork_works",
            Family::Post => "posts",
            Family::Unclassified => "unclassified_media",
        }
    }

    /// Accepts the canonical names plus the legacy platform names older
    /// clients still send.
    pub fn parse(name: &str) -> Option<Family> {
        match name {
            "artwork" | "pixiv" => Some(Family::Artwork),
            "post" | "tweet" | "tweets" => Some(Family::Post),
            "unclassified" | "other" | "others" => Some(Family::Unclassified),
            _ => None,
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_names() {
        assert_eq!(Family::parse("pixiv"), Some(Family::Artwork));
        assert_eq!(Family::parse("tweets"), Some(Family::Post));
        assert_eq!(Family::parse("others"), Some(Family::Unclassified));
        assert_eq!(Family::parse("Artwork"), None);
        for family in Family::ALL {
            assert_eq!(Family::parse(family.as_str()), Some(family));
        }
    }
}
