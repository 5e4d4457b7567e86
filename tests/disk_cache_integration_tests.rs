//! Integration Tests for the Disk Cache
//!
//! Exercises the public facade end to end against a scratch directory.

use std::fs;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tempfile::TempDir;
use url_disk_cache::cache::{codec, CacheIndex, CacheKey, INDEX_FILE_NAME};
use url_disk_cache::{
    CacheProvider, CacheRequest, CachedResponse, Config, DiskCache, MaintenanceTrigger,
    SchedulerState, StoragePolicy,
};

// == Helper Functions ==

fn config(dir: &TempDir, capacity_bytes: u64) -> Config {
    Config {
        min_cache_interval: 300,
        capacity_bytes,
        cache_dir: dir.path().to_path_buf(),
        maintenance_interval: 60,
    }
}

fn response(url: &str, body_len: usize, expires_in_secs: i64) -> CachedResponse {
    CachedResponse::new(
        url,
        200,
        vec![b'x'; body_len],
        Utc::now() + Duration::seconds(expires_in_secs),
    )
    .with_header("Content-Type", "application/octet-stream")
    .with_header("Cache-Control", "max-age=3600")
}

fn entry_file(dir: &TempDir, request: &CacheRequest) -> std::path::PathBuf {
    dir.path().join(format!("{}.entry", CacheKey::from_request(request)))
}

// == Store / Fetch ==

#[tokio::test]
async fn test_store_then_fetch_roundtrip() {
    let dir = TempDir::new().unwrap();
    let cache = DiskCache::open(&config(&dir, 1 << 20)).unwrap();
    let req = CacheRequest::get("https://cdn.example.com/logo.png");
    let resp = response(&req.url, 2048, 3600);

    cache.store(&req, resp.clone());
    cache.flush().await;

    let fetched = cache.fetch(&req).expect("entry should be cached");
    assert_eq!(fetched, resp);
    assert_eq!(fetched.header("content-type"), Some("application/octet-stream"));
}

#[tokio::test]
async fn test_fetch_before_write_completes_is_miss_or_hit() {
    let dir = TempDir::new().unwrap();
    let cache = DiskCache::open(&config(&dir, 1 << 20)).unwrap();
    let req = CacheRequest::get("https://example.com/racing");
    let resp = response(&req.url, 64, 3600);

    cache.store(&req, resp.clone());
    // Index is only updated once the write is durable
    if let Some(seen) = cache.fetch(&req) {
        assert_eq!(seen, resp);
    }
    cache.flush().await;
    assert_eq!(cache.fetch(&req), Some(resp));
}

#[tokio::test]
async fn test_admission_respects_min_cache_interval() {
    let dir = TempDir::new().unwrap();
    let cache = DiskCache::open(&config(&dir, 1 << 20)).unwrap();
    let short = CacheRequest::get("https://example.com/short");
    let long = CacheRequest::get("https://example.com/long");

    assert!(!cache.store(&short, response(&short.url, 10, 100)));
    assert!(cache.store(&long, response(&long.url, 10, 1000)));
    cache.flush().await;

    assert!(cache.fetch(&short).is_none());
    assert!(cache.fetch(&long).is_some());
    assert_eq!(cache.stats().rejected, 1);
}

#[tokio::test]
async fn test_memory_only_responses_are_not_persisted() {
    let dir = TempDir::new().unwrap();
    let cache = DiskCache::open(&config(&dir, 1 << 20)).unwrap();
    let req = CacheRequest::get("https://example.com/private");
    let resp = response(&req.url, 10, 3600).with_storage_policy(StoragePolicy::AllowedInMemoryOnly);

    assert!(!cache.store(&req, resp));
    cache.flush().await;
    assert!(!entry_file(&dir, &req).exists());
}

#[tokio::test]
async fn test_overwrite_keeps_usage_consistent() {
    let dir = TempDir::new().unwrap();
    let cache = DiskCache::open(&config(&dir, 1 << 20)).unwrap();
    let req = CacheRequest::get("https://example.com/a");

    cache.store(&req, response(&req.url, 5000, 3600));
    cache.flush().await;
    let first_usage = cache.current_disk_usage();

    cache.store(&req, response(&req.url, 100, 3600));
    cache.flush().await;

    assert_eq!(cache.entry_count(), 1);
    assert!(cache.current_disk_usage() < first_usage);
    assert_eq!(
        cache.current_disk_usage(),
        fs::metadata(entry_file(&dir, &req)).unwrap().len()
    );
}

// == Self-Healing ==

#[tokio::test]
async fn test_out_of_band_delete_heals_index() {
    let dir = TempDir::new().unwrap();
    let cache = DiskCache::open(&config(&dir, 1 << 20)).unwrap();
    let req = CacheRequest::get("https://example.com/deleted");
    cache.store(&req, response(&req.url, 100, 3600));
    cache.flush().await;
    assert_eq!(cache.entry_count(), 1);

    fs::remove_file(entry_file(&dir, &req)).unwrap();

    assert!(cache.fetch(&req).is_none());
    assert_eq!(cache.entry_count(), 0);
    assert_eq!(cache.current_disk_usage(), 0);
}

#[tokio::test]
async fn test_truncated_file_is_miss() {
    let dir = TempDir::new().unwrap();
    let cache = DiskCache::open(&config(&dir, 1 << 20)).unwrap();
    let req = CacheRequest::get("https://example.com/truncated");
    cache.store(&req, response(&req.url, 1000, 3600));
    cache.flush().await;

    let path = entry_file(&dir, &req);
    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

    assert!(cache.fetch(&req).is_none());
    cache.flush().await;
    assert!(!path.exists());
    assert_eq!(cache.entry_count(), 0);
}

// == Maintenance ==

#[tokio::test]
async fn test_maintenance_evicts_least_recently_used() {
    let dir = TempDir::new().unwrap();
    let cache = DiskCache::open(&config(&dir, 2600)).unwrap();
    let reqs: Vec<_> = (0..3)
        .map(|i| CacheRequest::get(format!("https://example.com/{}", i)))
        .collect();

    for req in &reqs {
        cache.store(req, response(&req.url, 1000, 3600));
        cache.flush().await;
    }
    // Reading the first entry makes the second the least recently used
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    assert!(cache.fetch(&reqs[0]).is_some());

    let report = cache
        .run_maintenance(MaintenanceTrigger::LowStorage)
        .await
        .expect("maintenance should run");

    assert_eq!(report.evicted, 1);
    assert!(cache.current_disk_usage() <= 2600);
    assert!(cache.fetch(&reqs[0]).is_some());
    assert!(cache.fetch(&reqs[1]).is_none());
    assert!(cache.fetch(&reqs[2]).is_some());
}

#[tokio::test]
async fn test_periodic_maintenance_bounds_usage_without_wiring() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir, 1000);
    config.maintenance_interval = 1;
    let cache = DiskCache::open(&config).unwrap();

    for i in 0..3 {
        let req = CacheRequest::get(format!("https://example.com/{}", i));
        cache.store(&req, response(&req.url, 400, 3600));
    }
    cache.flush().await;
    assert!(cache.current_disk_usage() > 1000);

    tokio::time::sleep(std::time::Duration::from_millis(2500)).await;

    assert!(cache.current_disk_usage() <= 1000);
    assert!(cache.entry_count() < 3);
    assert!(dir.path().join(INDEX_FILE_NAME).exists());
}

#[tokio::test]
async fn test_low_storage_trigger_runs_in_background() {
    let dir = TempDir::new().unwrap();
    let cache = DiskCache::open(&config(&dir, 1000)).unwrap();
    for i in 0..3 {
        let req = CacheRequest::get(format!("https://example.com/{}", i));
        cache.store(&req, response(&req.url, 400, 3600));
    }
    cache.flush().await;

    assert!(cache.trigger_maintenance(MaintenanceTrigger::LowStorage));
    assert_eq!(cache.scheduler().state(), SchedulerState::Running);
    while cache.scheduler().state() == SchedulerState::Running {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    assert!(cache.current_disk_usage() <= 1000);
}

#[tokio::test]
async fn test_shutdown_persists_index_for_next_open() {
    let dir = TempDir::new().unwrap();
    let req = CacheRequest::get("https://example.com/persist");
    let resp = response(&req.url, 256, 3600);
    {
        let cache = DiskCache::open(&config(&dir, 1 << 20)).unwrap();
        cache.store(&req, resp.clone());
        cache.flush().await;
        let report = cache.shutdown().await.unwrap();
        assert!(report.checkpointed);
    }

    let index = CacheIndex::load(dir.path().join(INDEX_FILE_NAME));
    assert_eq!(index.len(), 1);

    let reopened = DiskCache::open(&config(&dir, 1 << 20)).unwrap();
    assert_eq!(reopened.fetch(&req), Some(resp));
}

#[tokio::test]
async fn test_reopen_applies_smaller_capacity() {
    let dir = TempDir::new().unwrap();
    {
        let cache = DiskCache::open(&config(&dir, 1 << 20)).unwrap();
        for i in 0..4 {
            let req = CacheRequest::get(format!("https://example.com/{}", i));
            cache.store(&req, response(&req.url, 1000, 3600));
        }
        cache.flush().await;
        cache.checkpoint().await.unwrap();
    }

    let reopened = DiskCache::open(&config(&dir, 2600)).unwrap();
    assert!(reopened.current_disk_usage() <= 2600);
    assert_eq!(reopened.entry_count(), 2);
}

// == Provider Trait ==

#[tokio::test]
async fn test_provider_trait_object() {
    let dir = TempDir::new().unwrap();
    let cache = DiskCache::open(&config(&dir, 1 << 20)).unwrap();
    let provider: Arc<dyn CacheProvider> = Arc::new(cache.clone());
    let req = CacheRequest::new("get", "https://example.com/trait");

    provider.store(&req, response(&req.url, 32, 3600));
    cache.flush().await;
    assert!(provider.fetch(&CacheRequest::get("https://example.com/trait")).is_some());

    provider.purge_all();
    cache.flush().await;
    assert!(provider.fetch(&req).is_none());
    assert!(!entry_file(&dir, &req).exists());
}

// == Codec ==

#[test]
fn test_entry_file_is_decodable_by_codec() {
    let resp = response("https://example.com/codec", 16, 3600);
    let bytes = codec::encode(&resp).unwrap();
    assert_eq!(codec::decode(&bytes).unwrap(), resp);
    assert!(codec::decode(&bytes[1..]).is_err());
}
