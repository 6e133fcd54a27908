//! # 页面来源模块
//!
//! `PageSource` 是漫画档案的抽象：报告页数、按页码打开一条新的字节流、
//! 在会话结束时释放资源。压缩包格式解析不在本 crate 范围内，
//! 这里只提供目录实现（一张图片一页）。
//!
//! ## 并发前置条件
//!
//! 解码在多个工作线程上并发进行，唯一共享的依赖就是 `PageSource`。
//! 实现方必须满足以下之一：
//! - 支持并发、相互独立的 `open_page` 调用；
//! - 在内部对 `open_page` 串行化（例如用 `Mutex` 包住非线程安全的读取器）。
//!
//! 加载器不会替实现方加锁。

mod directory;

use std::io::Read;

use crate::page_loader::PageError;

pub use directory::DirectoryPageSource;

/// 单页字节流。每次 `open_page` 都返回新流，流只读一遍，`drop` 即关闭。
pub type PageStream = Box<dyn Read + Send>;

/// 随机访问的页面来源。
pub trait PageSource: Send + Sync {
    /// 总页数。
    fn page_count(&self) -> usize;

    /// 打开第 `index` 页（0 起始）。
    ///
    /// 页码越界返回 `PageError::PageIndexOutOfRange`，
    /// 释放后调用返回 `PageError::SourceDisposed`。
    fn open_page(&self, index: usize) -> Result<PageStream, PageError>;

    /// 释放档案资源。由会话在结束时调用恰好一次。
    fn dispose(&self) -> Result<(), PageError>;
}
