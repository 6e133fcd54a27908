//! # 内存缓存
//!
//! 按字节预算淘汰的 LRU 缓存。`lru::LruCache` 负责最近使用顺序，
//! 这里额外维护已用字节数：插入后从最久未使用的一端弹出，直到回到预算内。
//! 单个条目超过整个预算时不缓存。

use std::sync::Arc;

use lru::LruCache;
use serde::Serialize;

use crate::page_loader::{DecodedPage, RequestKey};

/// 缓存统计。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub size_bytes: usize,
    pub max_bytes: usize,
    pub entries: usize,
}

pub(crate) struct MemoryCache {
    entries: LruCache<RequestKey, Arc<DecodedPage>>,
    max_bytes: usize,
    size_bytes: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl MemoryCache {
    pub(crate) fn new(max_bytes: usize) -> Self {
        Self {
            entries: LruCache::unbounded(),
            max_bytes,
            size_bytes: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    /// 查询并刷新最近使用顺序。未命中不计数，由管线在真正发起解码时记录。
    pub(crate) fn get(&mut self, key: &RequestKey) -> Option<Arc<DecodedPage>> {
        let page = self.entries.get(key).map(Arc::clone)?;
        self.hits += 1;
        Some(page)
    }

    pub(crate) fn record_miss(&mut self) {
        self.misses += 1;
    }

    /// 写入条目，返回是否实际缓存。
    pub(crate) fn insert(&mut self, page: Arc<DecodedPage>) -> bool {
        let bytes = page.byte_size();
        if bytes > self.max_bytes {
            log::debug!(
                "📦 页面位图超过缓存预算，不缓存：{}（{} 字节 > {} 字节）",
                page.key,
                bytes,
                self.max_bytes
            );
            return false;
        }

        if let Some(previous) = self.entries.put(page.key.clone(), page) {
            self.size_bytes -= previous.byte_size();
        }
        self.size_bytes += bytes;

        while self.size_bytes > self.max_bytes {
            let Some((evicted_key, evicted)) = self.entries.pop_lru() else {
                break;
            };
            self.size_bytes -= evicted.byte_size();
            self.evictions += 1;
            log::debug!("♻️ 淘汰缓存页面：{}（{} 字节）", evicted_key, evicted.byte_size());
        }

        true
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.size_bytes = 0;
    }

    pub(crate) fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            size_bytes: self.size_bytes,
            max_bytes: self.max_bytes,
            entries: self.entries.len(),
        }
    }
}
