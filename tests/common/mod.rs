//! Backup fixtures shared by the integration tests.

#![allow(dead_code)]

use backup_harness::config::Config;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const CAMERA_ID: &str = "ab0123456789abcdef0123456789abcdef012345";
pub const MISSING_ID: &str = "cd0123456789abcdef0123456789abcdef012345";
pub const PREFS_ID: &str = "ef0123456789abcdef0123456789abcdef012345";
pub const SMS_ID: &str = "3d0d7e5fb2ce288813306e4d4636395e047a3d28";

pub const EXAMPLE_URL: &str = "https://example.com/a/b?c=1";
pub const BLOCKED_URL: &str = "https://content.icloud.com/x";
pub const SMS_URL: &str = "https://sms.example.org/thread/42";

pub const JPEG_BYTES: &[u8] = &[0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

/// One row of the `Files` table.
pub struct FileRow {
    pub id: String,
    pub domain: String,
    pub path: String,
    pub flags: i64,
    pub file: Option<Vec<u8>>,
}

impl FileRow {
    pub fn new(id: &str, domain: &str, path: &str, file: Option<Vec<u8>>) -> Self {
        Self {
            id: id.to_string(),
            domain: domain.to_string(),
            path: path.to_string(),
            flags: 1,
            file,
        }
    }
}

pub struct Backup {
    pub tmp: TempDir,
    pub root: PathBuf,
    pub manifest: PathBuf,
}

impl Backup {
    /// Empty backup root under `tmp/backup`.
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("backup");
        fs::create_dir_all(&root).unwrap();
        let manifest = root.join("Manifest.db");
        Self {
            tmp,
            root,
            manifest,
        }
    }

    /// Store a blob under its two-character shard directory.
    pub fn write_blob(&self, id: &str, bytes: &[u8]) -> PathBuf {
        let dir = self.root.join(&id[..2]);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(id);
        fs::write(&path, bytes).unwrap();
        path
    }

    pub fn blob_path(&self, id: &str) -> PathBuf {
        self.root.join(&id[..2]).join(id)
    }

    /// Scratch directory outside the backup root.
    pub fn out_dir(&self) -> PathBuf {
        let dir = self.tmp.path().join("out");
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    pub fn urls_path(&self) -> PathBuf {
        self.out_dir().join("urls.txt")
    }

    /// Defaults, except content types come from the signature table and
    /// the URL file lands outside the backup root.
    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.content_type.backend = "signature".into();
        config.urls.output = self.urls_path();
        config
    }

    pub fn write_config(&self) -> PathBuf {
        let path = self.tmp.path().join("bkh.toml");
        fs::write(
            &path,
            format!(
                r#"[urls]
blocklist = ["content.icloud.com"]
output = "{}"

[content_type]
backend = "signature"
"#,
                self.urls_path().display()
            ),
        )
        .unwrap();
        path
    }

    pub async fn write_manifest(&self, rows: &[FileRow]) {
        let pool = open(&self.manifest).await;
        sqlx::query(
            "CREATE TABLE Files (fileID TEXT PRIMARY KEY, domain TEXT, relativePath TEXT, flags INTEGER, file BLOB)",
        )
        .execute(&pool)
        .await
        .unwrap();
        for row in rows {
            sqlx::query("INSERT INTO Files VALUES (?, ?, ?, ?, ?)")
                .bind(&row.id)
                .bind(&row.domain)
                .bind(&row.path)
                .bind(row.flags)
                .bind(row.file.as_deref())
                .execute(&pool)
                .await
                .unwrap();
        }
        pool.close().await;
    }
}

/// Create a SQLite database at `path` and run `statements` against it.
pub async fn create_db(path: &Path, statements: &[&str]) {
    let pool = open(path).await;
    for statement in statements {
        sqlx::query(statement).execute(&pool).await.unwrap();
    }
    pool.close().await;
}

async fn open(path: &Path) -> sqlx::SqlitePool {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Delete);
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap()
}

pub fn binary_plist(value: &plist::Value) -> Vec<u8> {
    let mut out = Vec::new();
    value.to_writer_binary(&mut out).unwrap();
    out
}

/// A preferences-style document with one reachable and one blocked URL.
pub fn prefs_payload() -> Vec<u8> {
    let mut dict = plist::Dictionary::new();
    dict.insert("homepage".into(), plist::Value::String(EXAMPLE_URL.into()));
    dict.insert("cdn".into(), plist::Value::String(BLOCKED_URL.into()));
    binary_plist(&plist::Value::Dictionary(dict))
}

/// The three-row backup: one blob on disk, one missing, one with an
/// embedded document payload.
pub async fn three_row_backup() -> Backup {
    let backup = Backup::new();
    backup.write_blob(CAMERA_ID, JPEG_BYTES);
    backup
        .write_manifest(&[
            FileRow::new(CAMERA_ID, "CameraRollDomain", "Media/DCIM/100APPLE/IMG 0001.JPG", None),
            FileRow::new(MISSING_ID, "HomeDomain", "Library/Notes/notes.sqlite", None),
            FileRow::new(
                PREFS_ID,
                "HomeDomain",
                "Library/Preferences/com.example.plist",
                Some(prefs_payload()),
            ),
        ])
        .await;
    backup
}

/// Read the URL file into lines.
pub fn url_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}
