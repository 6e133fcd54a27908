//! # 漫画阅读器页面加载 — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  reader ── ReaderSession（宿主：视图窗口 / 显示模式 / 翻页）│
//! │     │  request(key, ticket, callback)                     │
//! │     ↓                                                    │
//! │  pipeline ── ImagePipeline                               │
//! │     │  LRU 内存缓存 · 请求合并 · 解码并发限制 · 绑定校验   │
//! │     ↓  RequestHandler::can_handle                        │
//! │  page_loader ── LocalComicHandler / FileHandler          │
//! │     │  探测尺寸 → 采样系数 → 有界解码                      │
//! │     ↓  open_page(index) × 2                              │
//! │  page_source ── PageSource（目录 / 压缩包解析器）          │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 应用级错误类型 `AppError` |
//! | [`page_source`] | 页面来源接口与目录实现 |
//! | [`page_loader`] | 请求键、采样系数、两阶段有界解码、处理器 |
//! | [`pipeline`] | 缓存、请求合并、工作线程调度、关闭 |
//! | [`reader`] | 阅读会话、页面视图、显示模式、点击翻页 |
//! | [`settings`] | 显示模式偏好的 JSON 存储 |

pub mod error;
pub mod page_loader;
pub mod page_source;
pub mod pipeline;
pub mod reader;
pub mod settings;
