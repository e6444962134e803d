//! Integration test for the local cache lifecycle.
//!
//! Exercises: LocalCache::open, migrate, namespaced get/set/remove, the typed
//! comment/config/mode/name accessors, and persistence across connections.

use pin_comments_core::cache::LocalCache;
use pin_comments_core::CacheError;
use pin_comments_core::types::{BackendConfig, Comment, Mode, Reply};

fn temp_db_path() -> String {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.keep().join("cache.db");
    path.to_string_lossy().to_string()
}

fn threaded_comment() -> Comment {
    Comment {
        id: "c-1".into(),
        x: 120.5,
        y: 3400.0,
        text: "Align this with the header".into(),
        timestamp: "2025-03-04T05:06:07.089Z".into(),
        page: "/pricing".into(),
        author: Some("Ada".into()),
        replies: vec![
            Reply {
                id: "r-1".into(),
                text: "Agreed".into(),
                author: None,
                timestamp: "2025-03-04T06:00:00.000Z".into(),
            },
            Reply {
                id: "r-2".into(),
                text: "Done in #42".into(),
                author: Some("Grace".into()),
                timestamp: "2025-03-05T06:00:00.000Z".into(),
            },
        ],
        created_at: Some("2025-03-04T05:06:08+00:00".into()),
    }
}

#[tokio::test]
async fn full_cache_lifecycle() {
    let path = temp_db_path();
    let cache = LocalCache::open(&path, "pin-comments:").await.unwrap();

    // Verify schema_version = 1 and WAL mode directly on the file.
    {
        let db = rusqlite::Connection::open(&path).unwrap();
        let version: i64 = db
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, 1, "schema_version should be 1");
        let journal: String = db.query_row("PRAGMA journal_mode", [], |r| r.get(0)).unwrap();
        assert_eq!(journal, "wal", "journal_mode should be wal");
    }

    // Empty cache reads as empty / absent.
    assert!(cache.load_comments().await.unwrap().is_empty());
    assert_eq!(cache.load_backend_config().await.unwrap(), None);
    assert_eq!(cache.load_mode().await.unwrap(), None);
    assert_eq!(cache.load_user_name().await.unwrap(), None);

    // Round-trip the full set, nested replies in order.
    let comments = vec![threaded_comment(), {
        let mut other = threaded_comment();
        other.id = "c-2".into();
        other.page = "/".into();
        other.author = None;
        other.replies.clear();
        other.created_at = None;
        other
    }];
    cache.save_comments(&comments).await.unwrap();
    assert_eq!(cache.load_comments().await.unwrap(), comments);

    // Overwrite, not append.
    cache.save_comments(&comments[1..]).await.unwrap();
    assert_eq!(cache.load_comments().await.unwrap(), &comments[1..]);

    let config = BackendConfig::new("https://db.example.com/", "secret");
    cache.save_backend_config(&config).await.unwrap();
    cache.save_mode(Mode::Remote).await.unwrap();
    cache.save_user_name("Ada").await.unwrap();

    // Verify persistence: open a second connection to the same file.
    let cache2 = LocalCache::open(&path, "pin-comments:").await.unwrap();
    assert_eq!(cache2.load_comments().await.unwrap(), &comments[1..]);
    assert_eq!(cache2.load_backend_config().await.unwrap(), Some(config));
    assert_eq!(cache2.load_mode().await.unwrap(), Some(Mode::Remote));
    assert_eq!(cache2.load_user_name().await.unwrap().as_deref(), Some("Ada"));

    // Reset clears setup but not comments or the name.
    cache2.clear_setup().await.unwrap();
    assert_eq!(cache.load_backend_config().await.unwrap(), None);
    assert_eq!(cache.load_mode().await.unwrap(), None);
    assert_eq!(cache.load_comments().await.unwrap().len(), 1);
    assert!(cache.load_user_name().await.unwrap().is_some());
}

#[tokio::test]
async fn prefixes_isolate_instances() {
    let path = temp_db_path();
    let site_a = LocalCache::open(&path, "site-a:").await.unwrap();
    let site_b = LocalCache::open(&path, "site-b:").await.unwrap();

    site_a.save_user_name("Ada").await.unwrap();
    site_a.save_comments(&[threaded_comment()]).await.unwrap();

    assert_eq!(site_b.load_user_name().await.unwrap(), None);
    assert!(site_b.load_comments().await.unwrap().is_empty());
    assert_eq!(site_a.get("user-name").await.unwrap().as_deref(), Some("Ada"));

    // Keys are stored with the prefix.
    let db = rusqlite::Connection::open(&path).unwrap();
    let count: i64 = db
        .query_row(
            "SELECT COUNT(*) FROM cache_entries WHERE key = 'site-a:user-name'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn corrupt_entry_is_reported() {
    let cache = LocalCache::open_in_memory("p:").await.unwrap();
    cache.set("comments-cache", "{not json".into()).await.unwrap();
    let err = cache.load_comments().await.unwrap_err();
    assert!(err.to_string().contains("p:comments-cache"), "{err}");

    cache.set("mode", "sideways".into()).await.unwrap();
    assert_eq!(cache.load_mode().await.unwrap(), None, "unknown mode reads as unset");

    cache.remove("comments-cache").await.unwrap();
    assert!(cache.load_comments().await.unwrap().is_empty());
}

#[tokio::test]
async fn unopenable_path_is_an_open_error() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("no-such-dir").join("cache.db");
    let err = LocalCache::open(&path, "p:").await.unwrap_err();
    assert!(matches!(err, CacheError::Open(_)), "{err}");
}
