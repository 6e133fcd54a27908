//! 单页视图状态。
//!
//! 视图由会话创建并持有，同时被在途请求的回调共享（`Arc<Mutex<PageView>>`）。
//! 回调只在票据仍有效时才会写入内容。

use std::sync::{Arc, Mutex};

use super::view_mode::{PageLayout, PageViewMode};
use crate::page_loader::{DecodedPage, LoadedFrom, PageDelivery, PageError};
use crate::pipeline::{BindingTicket, ViewBinding};

/// 会话与回调共享的页面视图。
pub type SharedPageView = Arc<Mutex<PageView>>;

/// 视图当前显示的内容。
#[derive(Debug, Clone)]
pub enum PageContent {
    Loading,
    Image(Arc<DecodedPage>),
    /// 加载失败，显示“点击重试”占位图。
    ReloadPlaceholder,
}

#[derive(Debug)]
pub struct PageView {
    position: usize,
    view_mode: PageViewMode,
    content: PageContent,
    loaded_from: Option<LoadedFrom>,
    last_error: Option<PageError>,
    binding: ViewBinding,
}

impl PageView {
    pub fn new(position: usize, view_mode: PageViewMode) -> Self {
        Self {
            position,
            view_mode,
            content: PageContent::Loading,
            loaded_from: None,
            last_error: None,
            binding: ViewBinding::new(),
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn view_mode(&self) -> PageViewMode {
        self.view_mode
    }

    pub fn set_view_mode(&mut self, mode: PageViewMode) {
        self.view_mode = mode;
    }

    pub fn content(&self) -> &PageContent {
        &self.content
    }

    pub fn loaded_from(&self) -> Option<LoadedFrom> {
        self.loaded_from
    }

    pub fn last_error(&self) -> Option<&PageError> {
        self.last_error.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.content, PageContent::Image(_))
    }

    pub fn needs_reload(&self) -> bool {
        matches!(self.content, PageContent::ReloadPlaceholder)
    }

    /// 按当前显示模式计算位图布局。没有位图时返回 `None`。
    pub fn layout(&self, viewport: (u32, u32)) -> Option<PageLayout> {
        match &self.content {
            PageContent::Image(page) => Some(self.view_mode.layout(page.dimensions(), viewport)),
            _ => None,
        }
    }

    /// 开始一次新加载，之前的请求结果不再投递到本视图。
    pub(crate) fn begin_load(&mut self) -> BindingTicket {
        self.content = PageContent::Loading;
        self.loaded_from = None;
        self.last_error = None;
        self.binding.bind()
    }

    pub(crate) fn recycle(&mut self) {
        self.binding.unbind();
    }

    /// 写入加载结果。票据已失效（视图被回收或重新发起加载）时丢弃结果并返回 `false`。
    ///
    /// 调用方持有视图锁，而 `begin_load` / `recycle` 也只在视图锁内改变绑定，
    /// 因此这里的检查与写入之间不会插入新的绑定。
    pub(crate) fn apply(&mut self, ticket: &BindingTicket, result: Result<PageDelivery, PageError>) -> bool {
        if !ticket.is_current() {
            log::debug!("🗑️ 第 {} 页结果已过期，丢弃", self.position);
            return false;
        }

        match result {
            Ok(delivery) => {
                self.loaded_from = Some(delivery.loaded_from);
                self.content = PageContent::Image(delivery.page);
            }
            Err(err) => {
                log::warn!("⚠️ 第 {} 页加载失败，显示重试占位图: {}", self.position, err);
                self.last_error = Some(err);
                self.content = PageContent::ReloadPlaceholder;
            }
        }
        true
    }
}
