pub const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS artwork_works (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        author TEXT NOT NULL,
        timestamp INTEGER NOT NULL,
        total_pages INTEGER NOT NULL,
        is_liked INTEGER NOT NULL DEFAULT 0,
        folder_name TEXT NOT NULL,
        file_mtime INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS artwork_pages (
        work_id TEXT NOT NULL,
        page_index INTEGER NOT NULL,
        file_path TEXT NOT NULL,
        media_type TEXT NOT NULL,
        FOREIGN KEY(work_id) REFERENCES artwork_works(id),
        UNIQUE(work_id, page_index)
    );

    CREATE TABLE IF NOT EXISTS posts (
        id TEXT PRIMARY KEY,
        timestamp INTEGER NOT NULL,
        user_name TEXT NOT NULL,
        text TEXT NOT NULL,
        json_path TEXT NOT NULL,
        post_url TEXT NOT NULL,
        avatar_url TEXT NOT NULL,
        folder_name TEXT NOT NULL,
        file_mtime INTEGER NOT NULL,
        is_liked INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS post_media (
        post_id TEXT NOT NULL,
        file_path TEXT NOT NULL,
        media_type TEXT NOT NULL,
        FOREIGN KEY(post_id) REFERENCES posts(id),
        UNIQUE(post_id, file_path)
    );

    CREATE TABLE IF NOT EXISTS unclassified_media (
        id TEXT PRIMARY KEY,
        filename TEXT NOT NULL,
        folder_name TEXT NOT NULL,
        file_path TEXT NOT NULL,
        media_type TEXT NOT NULL,
        file_mtime INTEGER NOT NULL,
        is_liked INTEGER NOT NULL DEFAULT 0
    );

    CREATE INDEX IF NOT EXISTS idx_artwork_works_ts ON artwork_works (file_mtime);
    CREATE INDEX IF NOT EXISTS idx_artwork_works_folder ON artwork_works (folder_name);
    CREATE INDEX IF NOT EXISTS idx_artwork_works_liked ON artwork_works (is_liked);
    CREATE INDEX IF NOT EXISTS idx_posts_ts ON posts (file_mtime);
    CREATE INDEX IF NOT EXISTS idx_posts_folder ON posts (folder_name);
    CREATE INDEX IF NOT EXISTS idx_posts_liked ON posts (is_liked);
    CREATE INDEX IF NOT EXISTS idx_unclassified_media_ts ON unclassified_media (file_mtime);
    CREATE INDEX IF NOT EXISTS idx_unclassified_media_folder ON unclassified_media (folder_name);
    CREATE INDEX IF NOT EXISTS idx_unclassified_media_liked ON unclassified_media (is_liked);

    CREATE INDEX IF NOT EXISTS idx_artwork_pages_wid ON artwork_pages (work_id);
    CREATE INDEX IF NOT EXISTS idx_post_media_pid ON post_media (post_id);
    CREATE INDEX IF NOT EXISTS idx_artwork_pages_path ON artwork_pages (file_path);
    CREATE INDEX IF NOT EXISTS idx_post_media_path ON post_media (file_path);
    CREATE INDEX IF NOT EXISTS idx_unclassified_media_path ON unclassified_media (file_path);
";
