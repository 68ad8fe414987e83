//! Content-Addressed Score Cache
//!
//! TTL- and capacity-bounded memoization of computed risk scores, keyed by
//! a SHA-256 digest over the scoring-relevant subset of the context. One
//! mutex guards reads and the purge/evict/insert write path, so the
//! capacity bound holds under concurrent use.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::ScoringContext;

/// Default entry lifetime.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
/// Default capacity bound.
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    score: u8,
    created_at: Instant,
    /// Insertion sequence, breaks creation-time ties on eviction.
    seq: u64,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    next_seq: u64,
}

/// TTL- and size-bounded score cache.
#[derive(Debug)]
pub struct ScoreCache {
    inner: Mutex<CacheInner>,
    ttl: Duration,
    capacity: usize,
}

impl ScoreCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            ttl,
            capacity,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_CACHE_TTL, DEFAULT_CACHE_CAPACITY)
    }

    /// Look up a fresh entry. An expired entry is removed and reported as a
    /// miss.
    pub fn get(&self, key: &str) -> Option<u8> {
        let mut inner = self.inner.lock();
        match inner.entries.get(key) {
            Some(entry) if entry.created_at.elapsed() < self.ttl => return Some(entry.score),
            Some(_) => {}
            None => return None,
        }
        inner.entries.remove(key);
        None
    }

    /// Insert a computed score. Expired entries are purged first; if the
    /// cache is still full, the single oldest entry is evicted.
    pub fn insert(&self, key: String, score: u8) {
        let mut inner = self.inner.lock();
        let ttl = self.ttl;
        inner.entries.retain(|_, entry| entry.created_at.elapsed() < ttl);

        if inner.entries.len() >= self.capacity && !inner.entries.contains_key(&key) {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| (entry.created_at, entry.seq))
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                inner.entries.remove(&oldest);
            }
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.insert(
            key,
            CacheEntry {
                score,
                created_at: Instant::now(),
                seq,
            },
        );
    }

    /// Number of resident entries, including any not yet purged as expired.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }
}

impl Default for ScoreCache {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Cache key for a scoring context: SHA-256 over the fields that can change
/// a computed score. Device type, os and browser, the source ip, the geo
/// country, the vpn/tor flags and the reputation and velocity scores
/// participate; nothing else does. Each field enters the hash as its label,
/// a presence tag and a length-prefixed value, so a value can neither shift
/// the boundary into a neighboring field nor pose as an absent one.
pub fn cache_key(ctx: &ScoringContext) -> String {
    fn field(hasher: &mut Sha256, label: &str, value: Option<&str>) {
        hasher.update(label.as_bytes());
        match value {
            Some(value) => {
                hasher.update([1u8]);
                hasher.update((value.len() as u64).to_be_bytes());
                hasher.update(value.as_bytes());
            }
            None => hasher.update([0u8]),
        }
    }

    fn flag(value: Option<bool>) -> Option<&'static str> {
        value.map(|set| if set { "1" } else { "0" })
    }

    let signals = ctx.signals.as_ref();
    let device_type = format!("{:?}", ctx.device.device_type);
    let reputation = signals
        .and_then(|s| s.reputation_score)
        .map(|score| score.to_string());
    let velocity = signals
        .and_then(|s| s.velocity_score)
        .map(|score| score.to_string());

    let mut hasher = Sha256::new();
    field(&mut hasher, "dt", Some(device_type.as_str()));
    field(&mut hasher, "os", ctx.device.os.as_deref());
    field(&mut hasher, "br", ctx.device.browser.as_deref());
    field(&mut hasher, "ip", ctx.ip.as_deref());
    field(
        &mut hasher,
        "cc",
        ctx.geo.as_ref().and_then(|geo| geo.country.as_deref()),
    );
    field(&mut hasher, "vpn", flag(signals.and_then(|s| s.is_vpn)));
    field(&mut hasher, "tor", flag(signals.and_then(|s| s.is_tor)));
    field(&mut hasher, "rep", reputation.as_deref());
    field(&mut hasher, "vel", velocity.as_deref());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DeviceInfo, DeviceType, GeoInfo, ScoringSignals};

    fn test_context(device_id: &str) -> ScoringContext {
        ScoringContext {
            device: DeviceInfo {
                device_id: device_id.to_string(),
                device_type: DeviceType::Desktop,
                os: Some("macOS".to_string()),
                browser: Some("Firefox".to_string()),
            },
            geo: None,
            ip: Some("8.8.8.8".to_string()),
            signals: None,
        }
    }

    #[test]
    fn test_insert_and_get() {
        let cache = ScoreCache::with_defaults();
        cache.insert("k1".to_string(), 42);
        assert_eq!(cache.get("k1"), Some(42));
        assert_eq!(cache.get("k2"), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_expired_entry_is_removed_on_read() {
        let cache = ScoreCache::new(Duration::from_millis(10), 10);
        cache.insert("k1".to_string(), 42);
        std::thread::sleep(Duration::from_millis(25));
        assert_eq!(cache.get("k1"), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_insert_purges_expired_before_evicting() {
        let cache = ScoreCache::new(Duration::from_millis(10), 2);
        cache.insert("old1".to_string(), 1);
        cache.insert("old2".to_string(), 2);
        std::thread::sleep(Duration::from_millis(25));

        // Both residents are expired: the purge makes room, no live entry
        // gets evicted.
        cache.insert("new".to_string(), 3);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("new"), Some(3));
    }

    #[test]
    fn test_capacity_evicts_single_oldest() {
        let cache = ScoreCache::new(Duration::from_secs(60), 3);
        cache.insert("a".to_string(), 1);
        cache.insert("b".to_string(), 2);
        cache.insert("c".to_string(), 3);
        cache.insert("d".to_string(), 4);

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.get("c"), Some(3));
        assert_eq!(cache.get("d"), Some(4));
    }

    #[test]
    fn test_thousand_and_first_insert_holds_capacity() {
        let cache = ScoreCache::with_defaults();
        for i in 0..=DEFAULT_CACHE_CAPACITY {
            cache.insert(format!("key-{i}"), (i % 100) as u8);
        }
        assert_eq!(cache.len(), DEFAULT_CACHE_CAPACITY);
        assert_eq!(cache.get("key-0"), None);
        assert_eq!(cache.get(&format!("key-{DEFAULT_CACHE_CAPACITY}")), Some(0));
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let cache = ScoreCache::new(Duration::from_secs(60), 2);
        cache.insert("a".to_string(), 1);
        cache.insert("b".to_string(), 2);
        cache.insert("a".to_string(), 9);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), Some(9));
        assert_eq!(cache.get("b"), Some(2));
    }

    #[test]
    fn test_clear() {
        let cache = ScoreCache::with_defaults();
        cache.insert("a".to_string(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_key_is_stable_and_selective() {
        let ctx = test_context("dev-1");
        assert_eq!(cache_key(&ctx), cache_key(&ctx));
        assert_eq!(cache_key(&ctx).len(), 64);

        // The device id does not participate in the key.
        let renamed = test_context("dev-2");
        assert_eq!(cache_key(&ctx), cache_key(&renamed));

        // Scoring-relevant fields do.
        let mut tor = test_context("dev-1");
        tor.signals = Some(ScoringSignals {
            is_tor: Some(true),
            ..ScoringSignals::default()
        });
        assert_ne!(cache_key(&ctx), cache_key(&tor));

        let mut other_ip = test_context("dev-1");
        other_ip.ip = Some("1.1.1.1".to_string());
        assert_ne!(cache_key(&ctx), cache_key(&other_ip));
    }

    #[test]
    fn test_cache_key_values_cannot_shift_field_boundaries() {
        // Separator-looking text inside one field vs the same text split
        // across two fields: distinct fingerprints, distinct keys.
        let mut merged = test_context("dev-1");
        merged.device.os = Some("a|br=b".to_string());
        merged.device.browser = None;
        let mut split = test_context("dev-1");
        split.device.os = Some("a".to_string());
        split.device.browser = Some("b|br=-".to_string());
        assert_ne!(cache_key(&merged), cache_key(&split));

        // Same shape across the ip and country fields.
        let mut ip_carries_country = test_context("dev-1");
        ip_carries_country.ip = Some("8.8.8.8|cc=KP".to_string());
        let mut country_set = test_context("dev-1");
        country_set.ip = Some("8.8.8.8".to_string());
        country_set.geo = Some(GeoInfo {
            country: Some("KP|cc=-".to_string()),
            ..GeoInfo::default()
        });
        assert_ne!(cache_key(&ip_carries_country), cache_key(&country_set));

        // An absent field never keys like a literal placeholder.
        let mut absent = test_context("dev-1");
        absent.device.os = None;
        let mut dash = test_context("dev-1");
        dash.device.os = Some("-".to_string());
        assert_ne!(cache_key(&absent), cache_key(&dash));
    }
}
