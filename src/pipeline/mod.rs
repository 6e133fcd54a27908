//! # 图片管线模块（pipeline）
//!
//! ## 设计思路
//!
//! 管线负责与“怎么解码”无关的部分：
//!
//! 1. **路由**：按注册顺序找到第一个 `can_handle` 的处理器
//! 2. **缓存**：按字节预算淘汰的 LRU 内存缓存，命中时同步投递
//! 3. **合并**：同一请求键同时只有一次在途解码，其余请求等待同一结果
//! 4. **调度**：解码在自有 tokio 运行时的阻塞线程池上执行，信号量限制并发
//! 5. **绑定校验**：视图已回收时放弃请求或丢弃结果
//! 6. **关闭**：清空缓存、拒绝新请求、等待在途解码一段宽限期
//!
//! ## 实现思路
//!
//! - 在途表 `key → Arc<OnceCell<结果>>`，`OnceCell::get_or_init` 保证只初始化一次。
//! - 查缓存与登记在途在同一把锁内完成；解码成功后先写缓存再移出在途表，
//!   因此任何时刻一个已完成的结果要么在缓存里、要么在在途表里。
//! - 锁顺序固定为“在途表 → 缓存”，解码任务内只单独持有缓存锁。

mod binding;
mod cache;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::runtime::{Handle, Runtime};
use tokio::sync::{OnceCell, Semaphore};

use crate::page_loader::{
    DecodedPage, LoadedFrom, LoaderConfig, PageDelivery, PageError, RequestHandler, RequestKey,
};

pub use binding::{BindingTicket, ViewBinding};
pub use cache::CacheStats;

use cache::MemoryCache;

type SharedResult = Result<Arc<DecodedPage>, PageError>;

/// `request` 的分发结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestDispatch {
    /// 缓存命中，回调已在调用线程上执行。
    Immediate,
    /// 已交给工作线程，回调稍后在工作线程上执行。
    Queued,
    /// 管线已关闭，回调已收到 `PageError::Shutdown`。
    Rejected,
}

struct PipelineInner {
    handlers: Vec<RequestHandler>,
    cache: Mutex<MemoryCache>,
    in_flight: Mutex<HashMap<RequestKey, Arc<OnceCell<SharedResult>>>>,
    decode_permits: Semaphore,
    shut_down: AtomicBool,
}

impl PipelineInner {
    fn lock_cache(&self) -> Result<MutexGuard<'_, MemoryCache>, PageError> {
        self.cache
            .lock()
            .map_err(|_| PageError::ResourceLimit("内存缓存锁已中毒".to_string()))
    }

    fn lock_in_flight(
        &self,
    ) -> Result<MutexGuard<'_, HashMap<RequestKey, Arc<OnceCell<SharedResult>>>>, PageError> {
        self.in_flight
            .lock()
            .map_err(|_| PageError::ResourceLimit("在途请求表锁已中毒".to_string()))
    }

    fn cached(&self, key: &RequestKey) -> Result<Option<Arc<DecodedPage>>, PageError> {
        Ok(self.lock_cache()?.get(key))
    }

    async fn fetch(self: &Arc<Self>, key: &RequestKey) -> Result<PageDelivery, PageError> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(PageError::Shutdown);
        }

        let cell = {
            let mut in_flight = self.lock_in_flight()?;
            if let Some(page) = self.cached(key)? {
                log::debug!("⚡ 缓存命中：{}", key);
                return Ok(PageDelivery {
                    page,
                    loaded_from: LoadedFrom::Memory,
                });
            }

            match in_flight.get(key) {
                Some(cell) => {
                    log::debug!("🔗 合并在途请求：{}", key);
                    Arc::clone(cell)
                }
                None => {
                    self.lock_cache()?.record_miss();
                    let cell = Arc::new(OnceCell::new());
                    in_flight.insert(key.clone(), Arc::clone(&cell));
                    cell
                }
            }
        };

        let result = cell
            .get_or_init(|| self.decode_and_cache(key.clone()))
            .await
            .clone();
        self.release_in_flight(key, &cell);

        result.map(|page| PageDelivery {
            page,
            loaded_from: LoadedFrom::Disk,
        })
    }

    async fn decode_and_cache(self: &Arc<Self>, key: RequestKey) -> SharedResult {
        let _permit = self
            .decode_permits
            .acquire()
            .await
            .map_err(|_| PageError::Shutdown)?;
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(PageError::Shutdown);
        }

        let inner = Arc::clone(self);
        let task_key = key.clone();
        let page = tokio::task::spawn_blocking(move || inner.load_with_handler(&task_key))
            .await
            .map_err(|e| PageError::Decode(format!("解码任务异常终止：{}", e)))??;

        let page = Arc::new(page);
        self.lock_cache()?.insert(Arc::clone(&page));
        Ok(page)
    }

    fn load_with_handler(&self, key: &RequestKey) -> Result<DecodedPage, PageError> {
        let handler = self
            .handlers
            .iter()
            .find(|handler| handler.can_handle(key))
            .ok_or_else(|| PageError::NoHandler(key.to_string()))?;

        let started = Instant::now();
        let result = handler.load(key);
        match &result {
            Ok(page) => log::debug!(
                "📄 {} 处理器完成 {} - {}x{} 耗时 {}ms",
                handler.name(),
                key,
                page.width(),
                page.height(),
                started.elapsed().as_millis()
            ),
            Err(err) => log::warn!(
                "❌ {} 处理器加载失败 {} - [{}] {}",
                handler.name(),
                key,
                err.code(),
                err
            ),
        }
        result
    }

    fn release_in_flight(&self, key: &RequestKey, cell: &Arc<OnceCell<SharedResult>>) {
        if let Ok(mut in_flight) = self.in_flight.lock() {
            if in_flight.get(key).is_some_and(|current| Arc::ptr_eq(current, cell)) {
                in_flight.remove(key);
            }
        }
    }
}

/// 图片管线构建器。
pub struct ImagePipelineBuilder {
    handlers: Vec<RequestHandler>,
    memory_cache_bytes: usize,
    max_parallel_decodes: usize,
    shutdown_grace: Duration,
}

impl Default for ImagePipelineBuilder {
    fn default() -> Self {
        let config = LoaderConfig::default();
        Self {
            handlers: Vec::new(),
            memory_cache_bytes: config.memory_cache_bytes,
            max_parallel_decodes: config.max_parallel_decodes,
            shutdown_grace: config.shutdown_grace,
        }
    }
}

impl ImagePipelineBuilder {
    /// 注册处理器。路由时按注册顺序匹配。
    pub fn handler(mut self, handler: impl Into<RequestHandler>) -> Self {
        self.handlers.push(handler.into());
        self
    }

    /// 从加载配置中读取缓存预算、并发度与关闭宽限期。
    pub fn config(mut self, config: &LoaderConfig) -> Self {
        self.memory_cache_bytes = config.memory_cache_bytes;
        self.max_parallel_decodes = config.max_parallel_decodes;
        self.shutdown_grace = config.shutdown_grace;
        self
    }

    pub fn memory_cache_bytes(mut self, bytes: usize) -> Self {
        self.memory_cache_bytes = bytes;
        self
    }

    pub fn max_parallel_decodes(mut self, permits: usize) -> Self {
        self.max_parallel_decodes = permits;
        self
    }

    pub fn build(self) -> Result<ImagePipeline, PageError> {
        let permits = self.max_parallel_decodes.max(1);
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .max_blocking_threads(permits)
            .thread_name("comic-pager-worker")
            .enable_time()
            .build()
            .map_err(|e| PageError::ResourceLimit(format!("无法创建解码线程池：{}", e)))?;

        log::info!(
            "🚀 图片管线已启动 - 处理器: {} 缓存预算: {:.2} MB 解码并发: {}",
            self.handlers.len(),
            self.memory_cache_bytes as f64 / 1024.0 / 1024.0,
            permits
        );

        Ok(ImagePipeline {
            inner: Arc::new(PipelineInner {
                handlers: self.handlers,
                cache: Mutex::new(MemoryCache::new(self.memory_cache_bytes)),
                in_flight: Mutex::new(HashMap::new()),
                decode_permits: Semaphore::new(permits),
                shut_down: AtomicBool::new(false),
            }),
            handle: runtime.handle().clone(),
            runtime: Mutex::new(Some(runtime)),
            shutdown_grace: self.shutdown_grace,
        })
    }
}

/// 带缓存、请求合并与工作线程调度的图片管线。
pub struct ImagePipeline {
    inner: Arc<PipelineInner>,
    handle: Handle,
    runtime: Mutex<Option<Runtime>>,
    shutdown_grace: Duration,
}

impl ImagePipeline {
    pub fn builder() -> ImagePipelineBuilder {
        ImagePipelineBuilder::default()
    }

    /// 发起异步请求。
    ///
    /// 缓存命中时回调在当前线程同步执行；否则在工作线程上执行。
    /// 票据失效时请求被放弃、结果被丢弃，回调不会执行。
    pub fn request<F>(&self, key: RequestKey, ticket: BindingTicket, on_complete: F) -> RequestDispatch
    where
        F: FnOnce(Result<PageDelivery, PageError>) + Send + 'static,
    {
        if self.is_shutdown() {
            on_complete(Err(PageError::Shutdown));
            return RequestDispatch::Rejected;
        }

        match self.inner.cached(&key) {
            Ok(Some(page)) => {
                log::debug!("⚡ 缓存命中（同步投递）：{}", key);
                on_complete(Ok(PageDelivery {
                    page,
                    loaded_from: LoadedFrom::Memory,
                }));
                return RequestDispatch::Immediate;
            }
            Ok(None) => {}
            Err(err) => {
                on_complete(Err(err));
                return RequestDispatch::Rejected;
            }
        }

        let inner = Arc::clone(&self.inner);
        self.handle.spawn(async move {
            if !ticket.is_current() {
                log::debug!("🗑️ 视图已回收，放弃请求：{}", key);
                return;
            }

            let result = inner.fetch(&key).await;

            if !ticket.is_current() {
                log::debug!("🗑️ 视图已重新绑定，丢弃结果：{}", key);
                return;
            }
            on_complete(result);
        });

        RequestDispatch::Queued
    }

    /// 异步获取（共享缓存与合并逻辑）。
    pub async fn fetch(&self, key: &RequestKey) -> Result<PageDelivery, PageError> {
        self.inner.fetch(key).await
    }

    /// 阻塞当前线程直到拿到结果。
    ///
    /// 不能在异步上下文中调用（tokio 会 panic）。
    pub fn load_blocking(&self, key: &RequestKey) -> Result<PageDelivery, PageError> {
        self.handle.block_on(self.inner.fetch(key))
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.inner
            .cache
            .lock()
            .map(|cache| cache.stats())
            .unwrap_or_default()
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.shut_down.load(Ordering::SeqCst)
    }

    /// 关闭管线：拒绝新请求、清空缓存、在宽限期内等待在途解码结束。
    ///
    /// 重复调用无副作用。
    pub fn shutdown(&self) {
        if self.inner.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }

        self.inner.decode_permits.close();
        if let Ok(mut cache) = self.inner.cache.lock() {
            cache.clear();
        }
        if let Ok(mut in_flight) = self.inner.in_flight.lock() {
            in_flight.clear();
        }

        let runtime = self.runtime.lock().ok().and_then(|mut guard| guard.take());
        if let Some(runtime) = runtime {
            if Handle::try_current().is_ok() {
                runtime.shutdown_background();
            } else {
                runtime.shutdown_timeout(self.shutdown_grace);
            }
        }

        log::info!("🛑 图片管线已关闭");
    }
}

impl Drop for ImagePipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}
