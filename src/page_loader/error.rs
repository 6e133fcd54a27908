//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 页面加载链路（取流 → 探测尺寸 → 采样解码 → 缓存分发）中的所有失败
//! 统一收敛到 `PageError`。
//! 同一页面的并发请求会合并为一次解码，错误需要分发给每个等待者，因此
//! 该类型实现 `Clone`，所有负载均为可复制的字符串或整数。

/// 页面加载统一错误类型。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PageError {
    /// 请求键不是本加载器生成的（缺少片段或片段非数字）。
    #[error("请求键格式错误：{0}")]
    MalformedKey(String),

    #[error("页码越界：第 {index} 页（共 {count} 页）")]
    PageIndexOutOfRange { index: usize, count: usize },

    /// 读取页面流或解码图片失败（包括图片损坏、格式不支持、I/O 错误）。
    #[error("解码错误：{0}")]
    Decode(String),

    #[error("页面来源已释放")]
    SourceDisposed,

    /// 页面来源本身无法打开（目录不存在、无读取权限等）。
    #[error("页面来源不可用：{0}")]
    SourceUnavailable(String),

    #[error("资源限制：{0}")]
    ResourceLimit(String),

    #[error("没有可处理该请求的处理器：{0}")]
    NoHandler(String),

    #[error("图片管线已关闭")]
    Shutdown,
}

impl PageError {
    /// 稳定的错误码，用于日志与宿主侧分支判断。
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedKey(_) => "E_MALFORMED_KEY",
            Self::PageIndexOutOfRange { .. } => "E_PAGE_OUT_OF_RANGE",
            Self::Decode(_) => "E_DECODE",
            Self::SourceDisposed => "E_SOURCE_DISPOSED",
            Self::SourceUnavailable(_) => "E_SOURCE_UNAVAILABLE",
            Self::ResourceLimit(_) => "E_RESOURCE_LIMIT",
            Self::NoHandler(_) => "E_NO_HANDLER",
            Self::Shutdown => "E_SHUTDOWN",
        }
    }
}

impl From<std::io::Error> for PageError {
    fn from(error: std::io::Error) -> Self {
        Self::Decode(format!("读取页面流失败：{}", error))
    }
}

impl From<PageError> for String {
    fn from(error: PageError) -> Self {
        error.to_string()
    }
}
