// ==========================================
// 尾程运价引擎 - 预览缓存
// ==========================================
// 职责: 解析结果/导入预览的临时存储（按 UUID 键）
// 约定: 惰性过期（读取时判断），不依赖后台定时器；容量有上限
// ==========================================

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

struct CacheEntry<T> {
    value: T,
    created_at: DateTime<Utc>,
}

/// 带 TTL 与容量上限的键值缓存
///
/// 所有操作都有显式 `now` 版本，便于测试
pub struct PreviewCache<T> {
    entries: Mutex<HashMap<String, CacheEntry<T>>>,
    ttl: Duration,
    capacity: usize,
}

impl<T: Clone> PreviewCache<T> {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry<T>>> {
        // 缓存内容不存在跨字段不变量，中毒后继续使用
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_expired(&self, entry: &CacheEntry<T>, now: DateTime<Utc>) -> bool {
        now - entry.created_at >= self.ttl
    }

    /// 写入并返回新键
    pub fn insert_at(&self, value: T, now: DateTime<Utc>) -> String {
        let key = Uuid::new_v4().to_string();
        self.put_at(key.clone(), value, now);
        key
    }

    /// 按调用方给定的键写入（值内需要携带自身键时使用）
    pub fn put_at(&self, key: String, value: T, now: DateTime<Utc>) {
        let mut entries = self.lock();

        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            let ttl = self.ttl;
            entries.retain(|_, e| now - e.created_at < ttl);
        }
        while entries.len() >= self.capacity && !entries.contains_key(&key) {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.created_at)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(k) => {
                    debug!(key = %k, "预览缓存已满，淘汰最早条目");
                    entries.remove(&k);
                }
                None => break,
            }
        }

        entries.insert(
            key,
            CacheEntry {
                value,
                created_at: now,
            },
        );
    }

    pub fn put(&self, key: String, value: T) {
        self.put_at(key, value, Utc::now())
    }

    pub fn insert(&self, value: T) -> String {
        self.insert_at(value, Utc::now())
    }

    /// 读取（过期视为不存在并顺带移除）
    pub fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<T> {
        let mut entries = self.lock();
        let expired = match entries.get(key) {
            None => return None,
            Some(entry) => self.is_expired(entry, now),
        };
        if expired {
            entries.remove(key);
            return None;
        }
        entries.get(key).map(|e| e.value.clone())
    }

    pub fn get(&self, key: &str) -> Option<T> {
        self.get_at(key, Utc::now())
    }

    pub fn remove(&self, key: &str) -> Option<T> {
        self.lock().remove(key).map(|e| e.value)
    }

    /// 清理过期条目，返回清理数量
    pub fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        let ttl = self.ttl;
        entries.retain(|_, e| now - e.created_at < ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-03-01T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_get_before_and_after_ttl() {
        let cache = PreviewCache::new(Duration::minutes(30), 8);
        let key = cache.insert_at("preview".to_string(), t0());

        assert_eq!(cache.get_at(&key, t0() + Duration::minutes(29)), Some("preview".to_string()));
        assert_eq!(cache.get_at(&key, t0() + Duration::minutes(30)), None);
        // 过期条目读取后被移除
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_purges_expired_first() {
        let cache = PreviewCache::new(Duration::minutes(30), 2);
        let stale = cache.insert_at(1, t0());
        let fresh = cache.insert_at(2, t0() + Duration::minutes(25));
        let newest = cache.insert_at(3, t0() + Duration::minutes(31));

        assert_eq!(cache.len(), 2);
        let now = t0() + Duration::minutes(32);
        assert_eq!(cache.get_at(&stale, now), None);
        assert_eq!(cache.get_at(&fresh, now), Some(2));
        assert_eq!(cache.get_at(&newest, now), Some(3));
    }

    #[test]
    fn test_capacity_evicts_oldest_when_nothing_expired() {
        let cache = PreviewCache::new(Duration::minutes(30), 2);
        let first = cache.insert_at("a", t0());
        let second = cache.insert_at("b", t0() + Duration::minutes(1));
        let third = cache.insert_at("c", t0() + Duration::minutes(2));

        let now = t0() + Duration::minutes(3);
        assert_eq!(cache.get_at(&first, now), None);
        assert_eq!(cache.get_at(&second, now), Some("b"));
        assert_eq!(cache.get_at(&third, now), Some("c"));
    }

    #[test]
    fn test_purge_and_remove() {
        let cache = PreviewCache::new(Duration::seconds(10), 8);
        let a = cache.insert_at(1u8, t0());
        cache.insert_at(2u8, t0() + Duration::seconds(8));

        assert_eq!(cache.purge_expired_at(t0() + Duration::seconds(12)), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.remove(&a), None);
    }

    #[test]
    fn test_put_existing_key_replaces_without_eviction() {
        let cache = PreviewCache::new(Duration::minutes(30), 2);
        cache.put_at("k1".to_string(), 1, t0());
        cache.put_at("k2".to_string(), 2, t0() + Duration::minutes(1));
        cache.put_at("k1".to_string(), 10, t0() + Duration::minutes(2));

        let now = t0() + Duration::minutes(3);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get_at("k1", now), Some(10));
        assert_eq!(cache.get_at("k2", now), Some(2));
    }
}
