//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 页面加载链路内部使用 `PageError`（可克隆，便于合并请求时共享同一结果），
//! 应用层（设置存储、命令行、输出文件）统一返回 `AppError`。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 为 `PageError` 与 `std::io::Error` 提供 `From` 转换，调用处直接 `?`。

use crate::page_loader::PageError;

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 页面加载失败（解码 / 越界 / 来源已释放等）
    #[error("{0}")]
    Page(#[from] PageError),

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),

    /// 设置读写失败
    #[error("设置存储错误: {0}")]
    Settings(String),

    /// 输出图片编码失败
    #[error("图片编码失败: {0}")]
    Encode(String),
}

impl From<AppError> for String {
    fn from(err: AppError) -> Self {
        err.to_string()
    }
}
