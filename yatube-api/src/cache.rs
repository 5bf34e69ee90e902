//! Time-bounded cache for rendered pages.
//!
//! Entries are served unchanged until their TTL passes or the cache is cleared, even when the
//! underlying data changed in the meantime. Concurrent misses for the same key may both render;
//! the later insert wins, and every read after it sees that one body until expiry.
//!
//! The number of entries is bounded; the least recently used entry is evicted first.

use crate::render::Rendered;
use lru::LruCache;
use std::{
    fmt::{Debug, Formatter},
    num::NonZeroUsize,
    sync::Arc,
};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, trace};
use yatube_common::util::PositiveDuration;

pub const INDEX_PAGE_KEY: &str = "index_page";

pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> OffsetDateTime;
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

#[derive(Clone, Debug)]
struct CacheEntry {
    rendered: Rendered,
    expires_at: OffsetDateTime,
}

pub struct PageCache {
    ttl: PositiveDuration,
    clock: Arc<dyn Clock>,
    entries: Mutex<LruCache<String, CacheEntry>>,
}

impl Debug for PageCache {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageCache")
            .field("ttl", &self.ttl)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl PageCache {
    #[must_use]
    pub fn new(ttl: PositiveDuration, capacity: NonZeroUsize, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// The key the global feed is stored under for a raw `page` query value.
    #[must_use]
    pub fn index_key(raw_page: Option<&str>) -> String {
        format!("{INDEX_PAGE_KEY}:{}", raw_page.unwrap_or_default())
    }

    pub async fn get(&self, key: &str) -> Option<Rendered> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().await;
        let entry = entries.get(key)?;

        if entry.expires_at <= now {
            trace!(key, "Cache entry expired");
            entries.pop(key);
            return None;
        }

        debug!(key, "Cache hit");
        Some(entry.rendered.clone())
    }

    pub async fn insert(&self, key: String, rendered: Rendered) {
        let now = self.clock.now();
        let expires_at = now + self.ttl.get();
        let entry = CacheEntry {
            rendered,
            expires_at,
        };

        let replaced = self.entries.lock().await.push(key.clone(), entry);
        if let Some((evicted, _)) = replaced.filter(|(evicted, _)| *evicted != key) {
            trace!(key = %evicted, "Evicted least recently used cache entry");
        }
    }

    /// Returns the cached body for `key`, rendering and storing it on a miss.
    pub async fn get_or_try_insert_with<F, Fut, E>(&self, key: String, render: F) -> Result<Rendered, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Rendered, E>>,
    {
        if let Some(rendered) = self.get(&key).await {
            return Ok(rendered);
        }

        let rendered = render().await?;
        self.insert(key, rendered.clone()).await;
        Ok(rendered)
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use crate::{
        cache::{Clock, PageCache},
        render::Rendered,
    };
    use bytes::Bytes;
    use std::{
        num::NonZeroUsize,
        sync::{Arc, Mutex},
    };
    use time::{Duration, OffsetDateTime, macros::datetime};
    use yatube_common::util::PositiveDuration;

    #[derive(Debug)]
    pub(crate) struct ManualClock(Mutex<OffsetDateTime>);

    impl ManualClock {
        pub(crate) fn new() -> Self {
            Self(Mutex::new(datetime!(2025-10-24 10:30 UTC)))
        }

        pub(crate) fn advance(&self, by: Duration) {
            *self.0.lock().unwrap() += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> OffsetDateTime {
            *self.0.lock().unwrap()
        }
    }

    fn body(text: &'static str) -> Rendered {
        Rendered {
            content_type: "text/plain",
            body: Bytes::from_static(text.as_bytes()),
        }
    }

    pub(crate) fn ttl() -> PositiveDuration {
        PositiveDuration::new_unchecked(Duration::seconds(20))
    }

    pub(crate) fn capacity(entries: usize) -> NonZeroUsize {
        NonZeroUsize::new(entries).unwrap()
    }

    fn cache(clock: &Arc<ManualClock>) -> PageCache {
        PageCache::new(ttl(), capacity(8), clock.clone())
    }

    #[tokio::test]
    async fn entries_stay_until_ttl_passes() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache(&clock);

        cache.insert("k".to_owned(), body("first")).await;
        clock.advance(Duration::seconds(19));
        assert_eq!(cache.get("k").await, Some(body("first")));

        clock.advance(Duration::seconds(1));
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn hits_skip_rendering() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache(&clock);

        let first = cache
            .get_or_try_insert_with::<_, _, ()>("k".to_owned(), || async { Ok(body("old")) })
            .await
            .unwrap();
        let second = cache
            .get_or_try_insert_with::<_, _, ()>("k".to_owned(), || async { Ok(body("new")) })
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(second.body, Bytes::from_static(b"old"));
    }

    #[tokio::test]
    async fn failed_renders_are_not_stored() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache(&clock);

        let failed = cache
            .get_or_try_insert_with("k".to_owned(), || async { Err::<Rendered, _>("boom") })
            .await;
        assert_eq!(failed, Err("boom"));
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn clear_drops_everything() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache(&clock);

        cache.insert(PageCache::index_key(None), body("a")).await;
        cache.insert(PageCache::index_key(Some("2")), body("b")).await;
        cache.clear().await;

        assert_eq!(cache.get(&PageCache::index_key(None)).await, None);
        assert_eq!(cache.get(&PageCache::index_key(Some("2"))).await, None);
    }

    #[tokio::test]
    async fn capacity_bounds_the_entry_count() {
        let clock = Arc::new(ManualClock::new());
        let cache = PageCache::new(ttl(), capacity(3), clock.clone());

        for i in 0..1000 {
            cache
                .insert(PageCache::index_key(Some(&format!("junk{i}"))), body("junk"))
                .await;
        }
        assert_eq!(cache.entries.lock().await.len(), 3);
        assert_eq!(cache.get(&PageCache::index_key(Some("junk0"))).await, None);
        assert_eq!(
            cache.get(&PageCache::index_key(Some("junk999"))).await,
            Some(body("junk"))
        );
    }

    #[tokio::test]
    async fn recently_read_entries_survive_eviction() {
        let clock = Arc::new(ManualClock::new());
        let cache = PageCache::new(ttl(), capacity(2), clock.clone());

        cache.insert("first".to_owned(), body("1")).await;
        cache.insert("second".to_owned(), body("2")).await;
        assert!(cache.get("first").await.is_some());
        cache.insert("third".to_owned(), body("3")).await;

        assert_eq!(cache.get("first").await, Some(body("1")));
        assert_eq!(cache.get("second").await, None);
    }

    #[tokio::test]
    async fn expired_entries_are_dropped_on_read() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache(&clock);

        cache.insert("k".to_owned(), body("old")).await;
        clock.advance(Duration::seconds(20));
        assert_eq!(cache.get("k").await, None);
        assert!(cache.entries.lock().await.is_empty());
    }

    #[test]
    fn index_keys_use_the_raw_page_value() {
        assert_eq!(PageCache::index_key(None), "index_page:");
        assert_eq!(PageCache::index_key(Some("2")), "index_page:2");
        assert_ne!(PageCache::index_key(Some("02")), PageCache::index_key(Some("2")));
    }
}
