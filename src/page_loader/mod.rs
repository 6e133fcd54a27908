//! # 页面加载模块（page_loader）
//!
//! ## 设计思路
//!
//! 把“页码 → 内存安全的位图”拆成若干职责单一的子模块：
//!
//! - `key`：请求键（缓存键 + 路由依据）的生成与解析
//! - `sampling`：2 的幂采样系数计算
//! - `decode`：两阶段有界解码（探测尺寸 → 采样解码）
//! - `handler`：按 scheme 路由的处理器（本地漫画页 / 本地文件）
//! - `config/error/page`：配置、错误、结果模型
//!
//! ## 调用链
//!
//! ```text
//! ImagePipeline（缓存 / 合并 / 工作线程）
//!    ↓ RequestHandler::can_handle
//! handler.rs（解析键 + 页码校验）
//!    ↓
//! decode.rs
//!    ├─ 第一次 open_page：只读图片头
//!    ├─ sampling.rs：计算采样系数
//!    └─ 第二次 open_page：按系数解码
//!    ↓
//! DecodedPage（LoadedFrom::Disk）
//! ```

mod config;
mod decode;
mod error;
mod handler;
mod key;
mod page;
mod sampling;

pub use config::{DEFAULT_CACHE_PERCENT, LoaderConfig, memory_cache_budget, target_size_for_display};
pub use error::PageError;
pub use handler::{FileHandler, LocalComicHandler, RequestHandler};
pub use key::{FILE_SCHEME, LOCAL_COMIC_SCHEME, RequestKey};
pub use page::{DecodedPage, LoadedFrom, PageDelivery, ProbedBounds};
pub use sampling::{calculate_sample_size, sampled_dimensions};
