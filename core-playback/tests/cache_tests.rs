//! Cache directory tests against an in-memory filesystem.

mod support;

use chrono::Duration;
use core_playback::cache::{CacheConfig, CacheDirectory, MIB};
use core_playback::PlaybackError;
use std::sync::Arc;
use support::{cache_root, documents, epoch, MemoryFileSystem};

fn directory(fs: &Arc<MemoryFileSystem>) -> CacheDirectory {
    CacheDirectory::new(fs.clone(), documents(), CacheConfig::default())
}

#[tokio::test]
async fn test_initialize_creates_cache_folder() {
    let fs = MemoryFileSystem::new();
    let cache = directory(&fs);

    cache.initialize().await.unwrap();

    assert_eq!(cache.root(), cache_root());
    assert!(cache.entries().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_initialize_reports_creation_failure() {
    let fs = MemoryFileSystem::new();
    fs.fail_create_dir();

    let err = directory(&fs).initialize().await.unwrap_err();
    assert!(matches!(err, PlaybackError::DirectoryCreationFailed { .. }));
}

#[tokio::test]
async fn test_local_path_uses_last_segment() {
    let fs = MemoryFileSystem::new();
    let cache = directory(&fs);

    let path = cache
        .local_path("https://cdn.example.com/blocks/2024/id-77.mp3?sig=abc")
        .unwrap();
    assert_eq!(path, cache_root().join("id-77.mp3"));

    let err = cache.local_path("https://cdn.example.com/").unwrap_err();
    assert!(matches!(err, PlaybackError::InvalidRemoteUrl(_)));
}

#[tokio::test]
async fn test_exists_checks_mapped_path() {
    let fs = MemoryFileSystem::new();
    fs.put_file(cache_root().join("a.mp3"), 10, epoch());
    let cache = directory(&fs);

    assert!(cache.exists("https://cdn.example.com/x/a.mp3").await.unwrap());
    assert!(!cache.exists("https://cdn.example.com/x/b.mp3").await.unwrap());
}

#[tokio::test]
async fn test_prune_deletes_only_oldest_file() {
    let fs = MemoryFileSystem::new();
    fs.put_file(cache_root().join("a.mp3"), 5 * MIB, epoch());
    fs.put_file(cache_root().join("b.mp3"), 5 * MIB, epoch() + Duration::hours(1));
    let cache = directory(&fs);

    let report = cache.prune(6 * MIB, &[]).await.unwrap();

    // 10 MiB - 6 MiB + 1 MiB buffer
    assert_eq!(report.bytes_to_free, 5 * MIB);
    assert_eq!(report.deleted, vec![cache_root().join("a.mp3")]);
    assert_eq!(report.shortfall(), 0);
    assert!(fs.has_file(&cache_root().join("b.mp3")));
}

#[tokio::test]
async fn test_prune_within_budget_is_noop() {
    let fs = MemoryFileSystem::new();
    fs.put_file(cache_root().join("a.mp3"), 2 * MIB, epoch());
    let cache = directory(&fs);

    let report = cache.prune(2 * MIB, &[]).await.unwrap();

    assert!(report.deleted.is_empty());
    assert_eq!(report.bytes_to_free, 0);
    assert!(fs.deleted().is_empty());
}

#[tokio::test]
async fn test_prune_skips_excluded_and_goes_oldest_first() {
    let fs = MemoryFileSystem::new();
    let root = cache_root();
    fs.put_file(root.join("oldest.mp3"), 3 * MIB, epoch());
    fs.put_file(root.join("middle.mp3"), 3 * MIB, epoch() + Duration::minutes(1));
    fs.put_file(root.join("newer.mp3"), 3 * MIB, epoch() + Duration::minutes(2));
    fs.put_file(root.join("newest.mp3"), 3 * MIB, epoch() + Duration::minutes(3));
    let cache = directory(&fs);

    // 12 MiB - 7 MiB + 1 MiB = 6 MiB to free, oldest is excluded
    let report = cache.prune(7 * MIB, &[root.join("oldest.mp3")]).await.unwrap();

    assert_eq!(
        fs.deleted(),
        vec![root.join("middle.mp3"), root.join("newer.mp3")]
    );
    assert_eq!(report.bytes_freed, 6 * MIB);
    assert!(fs.has_file(&root.join("oldest.mp3")));
}

#[tokio::test]
async fn test_prune_continues_past_failed_delete() {
    let fs = MemoryFileSystem::new();
    let root = cache_root();
    fs.put_file(root.join("a.mp3"), 4 * MIB, epoch());
    fs.put_file(root.join("b.mp3"), 4 * MIB, epoch() + Duration::minutes(1));
    fs.put_file(root.join("c.mp3"), 4 * MIB, epoch() + Duration::minutes(2));
    fs.fail_delete(root.join("a.mp3"));
    let cache = directory(&fs);

    let report = cache.prune(9 * MIB, &[]).await.unwrap();

    assert_eq!(report.deleted, vec![root.join("b.mp3")]);
    assert!(fs.has_file(&root.join("a.mp3")));
}

#[tokio::test]
async fn test_prune_reports_shortfall_when_everything_is_excluded() {
    let fs = MemoryFileSystem::new();
    let root = cache_root();
    fs.put_file(root.join("a.mp3"), 8 * MIB, epoch());
    let cache = directory(&fs);

    let report = cache.prune(MIB, &[root.join("a.mp3")]).await.unwrap();

    assert!(report.deleted.is_empty());
    assert_eq!(report.shortfall(), 8 * MIB);
}

#[tokio::test]
async fn test_prune_fails_when_folder_cannot_be_listed() {
    let fs = MemoryFileSystem::new();
    fs.fail_listing();

    let err = directory(&fs).prune(MIB, &[]).await.unwrap_err();
    assert!(matches!(err, PlaybackError::CachePruneFailed(_)));
}

#[tokio::test]
async fn test_current_size_skips_hidden_and_unreadable_entries() {
    let fs = MemoryFileSystem::new();
    let root = cache_root();
    fs.put_file(root.join("a.mp3"), 100, epoch());
    fs.put_file(root.join("b.mp3"), 200, epoch());
    fs.put_file(root.join(".DS_Store"), 4_000, epoch());
    fs.put_file(root.join(".partial").join("c.mp3.part"), 9_000, epoch());
    fs.put_file(root.join("broken.mp3"), 300, epoch());
    fs.fail_metadata(root.join("broken.mp3"));
    let cache = directory(&fs);

    assert_eq!(cache.current_size().await, 300);
}

#[tokio::test]
async fn test_current_size_of_missing_folder_is_zero() {
    let fs = MemoryFileSystem::new();
    assert_eq!(directory(&fs).current_size().await, 0);
}

#[tokio::test]
async fn test_clear_removes_visible_files() {
    let fs = MemoryFileSystem::new();
    let root = cache_root();
    fs.put_file(root.join("a.mp3"), 100, epoch());
    fs.put_file(root.join("b.mp3"), 100, epoch());
    fs.put_file(root.join(".partial").join("c.mp3.part"), 100, epoch());
    let cache = directory(&fs);

    cache.clear().await.unwrap();

    assert!(fs.files_under(&root).is_empty());
    assert!(fs.has_file(&root.join(".partial").join("c.mp3.part")));
}

#[tokio::test]
async fn test_clear_fails_on_first_delete_error() {
    let fs = MemoryFileSystem::new();
    let root = cache_root();
    fs.put_file(root.join("a.mp3"), 100, epoch());
    fs.fail_delete(root.join("a.mp3"));
    let cache = directory(&fs);

    let err = cache.clear().await.unwrap_err();
    assert!(matches!(err, PlaybackError::CachePruneFailed(_)));
}

#[tokio::test]
async fn test_available_space_degrades_to_none() {
    let fs = MemoryFileSystem::new();
    let cache = directory(&fs);
    assert_eq!(cache.available_space().await, Some(1024 * MIB));

    fs.set_available(None);
    assert_eq!(cache.available_space().await, None);
}
