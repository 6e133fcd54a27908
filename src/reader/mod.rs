//! # 阅读会话模块（reader）
//!
//! ## 设计思路
//!
//! `ReaderSession` 相当于一本漫画打开期间的“宿主”：
//!
//! - 持有页面来源、本地漫画处理器与图片管线，决定它们的生命周期
//! - 维护当前页附近的一组页面视图（离屏窗口），离开窗口的视图被回收
//! - 维护显示模式：切换时同步更新所有已创建视图并持久化，新视图在创建时读取
//! - 处理点击翻页与全屏切换
//!
//! ## 实现思路
//!
//! - 视图以 `Arc<Mutex<PageView>>` 与管线回调共享；发起请求前先在视图上
//!   `begin_load` 拿到绑定票据，视图回收后票据失效，结果不再投递。
//!   写入结果时在视图锁内再校验一次票据，与 `begin_load` / `recycle` 互斥。
//! - 调用 `pipeline.request` 时不持有视图锁：缓存命中会在当前线程同步回调。
//! - 关闭顺序：回收视图 → 关闭管线 → 释放页面来源（只调用一次，错误只记日志）。

mod page_view;
mod touch;
mod view_mode;

use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex};

use crate::page_loader::{FileHandler, LoaderConfig, LocalComicHandler, PageError, RequestKey};
use crate::page_source::PageSource;
use crate::pipeline::ImagePipeline;
use crate::settings::{SETTINGS_PAGE_VIEW_MODE, SettingsStore};

pub use page_view::{PageContent, PageView, SharedPageView};
pub use touch::{TapAction, classify_tap};
pub use view_mode::{MenuAction, PageLayout, PageViewMode};

/// 一本漫画的阅读会话。
pub struct ReaderSession {
    source: Arc<dyn PageSource>,
    handler: LocalComicHandler,
    pipeline: ImagePipeline,
    settings: Arc<SettingsStore>,
    view_mode: PageViewMode,
    views: BTreeMap<usize, SharedPageView>,
    current_page: usize,
    offscreen_page_limit: usize,
    fullscreen: bool,
    closed: bool,
}

impl ReaderSession {
    /// 打开会话并定位到 `saved_page`（从 1 开始；0 表示没有阅读记录）。
    pub fn open(
        source: Arc<dyn PageSource>,
        config: &LoaderConfig,
        settings: Arc<SettingsStore>,
        saved_page: usize,
    ) -> Result<Self, PageError> {
        let handler = LocalComicHandler::new(Arc::clone(&source), config);
        let pipeline = ImagePipeline::builder()
            .config(config)
            .handler(handler.clone())
            .handler(FileHandler::new(config))
            .build()?;

        let stored_mode = settings.get_int(SETTINGS_PAGE_VIEW_MODE, PageViewMode::AspectFit.ordinal());
        let view_mode = PageViewMode::from_ordinal(stored_mode).unwrap_or_else(|| {
            log::warn!("⚠️ 未知的显示模式设置 {}，使用默认值", stored_mode);
            PageViewMode::default()
        });

        let mut session = Self {
            source,
            handler,
            pipeline,
            settings,
            view_mode,
            views: BTreeMap::new(),
            current_page: 0,
            offscreen_page_limit: config.offscreen_page_limit,
            fullscreen: true,
            closed: false,
        };

        let page = session.set_current_page(saved_page.saturating_sub(1));
        log::info!(
            "📖 打开漫画 - 共 {} 页，从第 {} 页开始，显示模式 {:?}，目标尺寸 {}",
            session.page_count(),
            page + 1,
            session.view_mode,
            session.handler.target_size()
        );

        Ok(session)
    }

    pub fn page_count(&self) -> usize {
        self.handler.page_count()
    }

    /// 当前页（从 0 开始）。
    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn key_for(&self, index: usize) -> RequestKey {
        self.handler.key_for(index)
    }

    pub fn view_mode(&self) -> PageViewMode {
        self.view_mode
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    pub fn pipeline(&self) -> &ImagePipeline {
        &self.pipeline
    }

    pub fn view(&self, index: usize) -> Option<SharedPageView> {
        self.views.get(&index).cloned()
    }

    /// 当前已创建视图的页码（升序）。
    pub fn instantiated_pages(&self) -> Vec<usize> {
        self.views.keys().copied().collect()
    }

    /// 翻到 `index`（越界时夹到有效范围），并调整离屏窗口。返回实际页码。
    pub fn set_current_page(&mut self, index: usize) -> usize {
        let count = self.page_count();
        if count == 0 {
            self.current_page = 0;
            return 0;
        }

        self.current_page = index.min(count - 1);

        let window = self.offscreen_window();
        let stale: Vec<usize> = self
            .views
            .keys()
            .copied()
            .filter(|position| !window.contains(position))
            .collect();
        for position in stale {
            self.destroy_page(position);
        }

        for position in window {
            if let Err(err) = self.instantiate_page(position) {
                log::warn!("⚠️ 创建第 {} 页视图失败: {}", position, err);
            }
        }

        self.current_page
    }

    fn offscreen_window(&self) -> RangeInclusive<usize> {
        let last = self.page_count().saturating_sub(1);
        let start = self.current_page.saturating_sub(self.offscreen_page_limit);
        let end = self.current_page.saturating_add(self.offscreen_page_limit).min(last);
        start..=end
    }

    /// 创建第 `index` 页的视图并发起加载。已存在时直接返回。
    pub fn instantiate_page(&mut self, index: usize) -> Result<SharedPageView, PageError> {
        let count = self.page_count();
        if index >= count {
            return Err(PageError::PageIndexOutOfRange { index, count });
        }
        if let Some(view) = self.views.get(&index) {
            return Ok(Arc::clone(view));
        }

        let view: SharedPageView = Arc::new(Mutex::new(PageView::new(index, self.view_mode)));
        self.views.insert(index, Arc::clone(&view));
        self.request_into(&view, index);
        Ok(view)
    }

    /// 回收第 `index` 页的视图。在途请求的结果不会再投递给它。
    pub fn destroy_page(&mut self, index: usize) {
        if let Some(view) = self.views.remove(&index) {
            if let Ok(mut view) = view.lock() {
                view.recycle();
            }
        }
    }

    /// 对显示重试占位图的页面重新发起加载。返回是否发起了请求。
    pub fn retry_page(&mut self, index: usize) -> bool {
        let Some(view) = self.views.get(&index).cloned() else {
            return false;
        };
        let needs_reload = view.lock().map(|v| v.needs_reload()).unwrap_or(false);
        if !needs_reload {
            return false;
        }

        log::info!("🔄 重试加载第 {} 页", index);
        self.request_into(&view, index);
        true
    }

    fn request_into(&self, view: &SharedPageView, index: usize) {
        let ticket = match view.lock() {
            Ok(mut view) => view.begin_load(),
            Err(_) => {
                log::warn!("⚠️ 第 {} 页视图锁已中毒，跳过加载", index);
                return;
            }
        };

        let target = Arc::clone(view);
        let delivery_ticket = ticket.clone();
        self.pipeline.request(self.key_for(index), ticket, move |result| {
            if let Ok(mut view) = target.lock() {
                view.apply(&delivery_ticket, result);
            }
        });
    }

    /// 切换显示模式：持久化，并同步应用到所有已创建的视图。
    pub fn set_view_mode(&mut self, mode: PageViewMode) {
        self.view_mode = mode;
        if let Err(err) = self.settings.put_int(SETTINGS_PAGE_VIEW_MODE, mode.ordinal()) {
            log::warn!("⚠️ 保存显示模式失败: {}", err);
        }

        for view in self.views.values() {
            if let Ok(mut view) = view.lock() {
                view.set_view_mode(mode);
            }
        }
        log::debug!("🖼️ 显示模式切换为 {:?}，更新 {} 个视图", mode, self.views.len());
    }

    pub fn on_menu_item(&mut self, action: MenuAction) {
        self.set_view_mode(action.view_mode());
    }

    /// 处理页面点击，返回执行的动作。
    pub fn on_page_clicked(&mut self, x: f32, width: f32) -> TapAction {
        let action = classify_tap(x, width, self.fullscreen);
        match action {
            TapAction::EnterFullscreen => self.fullscreen = true,
            TapAction::ExitFullscreen => self.fullscreen = false,
            TapAction::PreviousPage => {
                if self.current_page > 0 {
                    self.set_current_page(self.current_page - 1);
                }
            }
            TapAction::NextPage => {
                self.set_current_page(self.current_page + 1);
            }
        }
        action
    }

    /// 结束会话，返回要写回书库的当前页（从 1 开始）。
    pub fn close(mut self) -> usize {
        self.teardown();
        self.current_page + 1
    }

    fn teardown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        for view in self.views.values() {
            if let Ok(mut view) = view.lock() {
                view.recycle();
            }
        }
        self.views.clear();

        self.pipeline.shutdown();

        if let Err(err) = self.source.dispose() {
            log::warn!("⚠️ 释放页面来源失败（已忽略）: {}", err);
        }
        log::info!("📕 阅读会话已结束，停在第 {} 页", self.current_page + 1);
    }
}

impl Drop for ReaderSession {
    fn drop(&mut self) {
        self.teardown();
    }
}
